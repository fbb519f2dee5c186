//! A local file prepared for upload

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};

use super::UploadError;
use crate::models::MediaKind;

/// Default size of one upload chunk (512 KiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 524_288;

/// How a file of a given length splits into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub total_len: u64,
    pub chunk_size: u64,
    /// Number of chunks; at least 1, even for an empty file
    pub count: u64,
}

impl ChunkPlan {
    pub fn new(total_len: u64, chunk_size: u64) -> Self {
        let chunk_size = chunk_size.max(1);
        let count = if total_len == 0 {
            1
        } else {
            total_len.div_ceil(chunk_size)
        };
        Self {
            total_len,
            chunk_size,
            count,
        }
    }

    /// Byte offset and length of a 1-based chunk
    pub fn range(&self, chunk: u64) -> (u64, u64) {
        let start = (chunk.saturating_sub(1) * self.chunk_size).min(self.total_len);
        let len = self.chunk_size.min(self.total_len - start);
        (start, len)
    }

    /// Whether the form must carry `chunk`/`chunks` fields
    pub fn is_chunked(&self) -> bool {
        self.count > 1
    }
}

/// One file to upload, with its checksum computed up front
#[derive(Debug)]
pub struct UploadJob {
    file: File,
    pub path: PathBuf,
    pub file_name: String,
    pub total_len: u64,
    /// `md5:<hex>` digest of the whole file
    pub checksum: String,
    pub to_user: String,
    pub kind: MediaKind,
    pub last_modified: DateTime<Utc>,
}

impl UploadJob {
    /// Open a file and hash it
    ///
    /// The file handle is kept for the lifetime of the job and read chunk by
    /// chunk during upload.
    pub fn open(
        path: impl AsRef<Path>,
        to_user: impl Into<String>,
        kind: MediaKind,
    ) -> Result<Self, UploadError> {
        let path = path.as_ref().to_path_buf();
        let file_error = |source| UploadError::File {
            path: path.clone(),
            source,
        };

        let mut file = File::open(&path).map_err(file_error)?;
        let mut hasher = Md5::new();
        let total_len = io::copy(&mut file, &mut hasher).map_err(file_error)?;
        file.seek(SeekFrom::Start(0)).map_err(file_error)?;

        let last_modified = file
            .metadata()
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            file,
            file_name,
            total_len,
            checksum: format!("md5:{}", hex::encode(hasher.finalize())),
            to_user: to_user.into(),
            kind,
            last_modified,
            path,
        })
    }

    pub fn plan(&self, chunk_size: u64) -> ChunkPlan {
        ChunkPlan::new(self.total_len, chunk_size)
    }

    /// Read one 1-based chunk
    pub fn read_chunk(&mut self, plan: &ChunkPlan, chunk: u64) -> io::Result<Vec<u8>> {
        let (start, len) = plan.range(chunk);
        self.file.seek(SeekFrom::Start(start))?;

        let mut data = Vec::with_capacity(len as usize);
        (&mut self.file).take(len).read_to_end(&mut data)?;
        if (data.len() as u64) < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} shrank while uploading", self.path.display()),
            ));
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_plan_counts() {
        assert_eq!(ChunkPlan::new(0, 10).count, 1);
        assert_eq!(ChunkPlan::new(1, 10).count, 1);
        assert_eq!(ChunkPlan::new(10, 10).count, 1);
        assert_eq!(ChunkPlan::new(11, 10).count, 2);
        assert_eq!(ChunkPlan::new(2 * DEFAULT_CHUNK_SIZE + 1, DEFAULT_CHUNK_SIZE).count, 3);
    }

    #[test]
    fn test_plan_ranges() {
        let plan = ChunkPlan::new(25, 10);
        assert_eq!(plan.range(1), (0, 10));
        assert_eq!(plan.range(2), (10, 10));
        assert_eq!(plan.range(3), (20, 5));
        assert!(plan.is_chunked());

        let empty = ChunkPlan::new(0, 10);
        assert_eq!(empty.range(1), (0, 0));
        assert!(!empty.is_chunked());
    }

    #[test]
    fn test_open_hashes_file() {
        let file = temp_file(b"hello world");
        let job = UploadJob::open(file.path(), "@bob", MediaKind::Document).unwrap();

        assert_eq!(job.total_len, 11);
        assert_eq!(job.checksum, "md5:5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(job.to_user, "@bob");
        assert!(!job.file_name.is_empty());
    }

    #[test]
    fn test_read_chunks_cover_file() {
        let content: Vec<u8> = (0..=255u8).cycle().take(25).collect();
        let file = temp_file(&content);
        let mut job = UploadJob::open(file.path(), "@bob", MediaKind::Image).unwrap();
        let plan = job.plan(10);

        let mut joined = Vec::new();
        for chunk in 1..=plan.count {
            joined.extend(job.read_chunk(&plan, chunk).unwrap());
        }
        assert_eq!(joined, content);
        assert_eq!(job.read_chunk(&plan, 3).unwrap().len(), 5);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = UploadJob::open(dir.path().join("nope.bin"), "@bob", MediaKind::Video).unwrap_err();
        assert!(matches!(err, UploadError::File { .. }));
    }
}
