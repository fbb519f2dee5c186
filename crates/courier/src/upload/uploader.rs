//! Sequential chunked upload

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};

use super::job::{ChunkPlan, DEFAULT_CHUNK_SIZE, UploadJob};
use crate::gateway::api::{UploadMediaRequest, UploadMediaResponse};
use crate::gateway::upload_url;
use crate::models::{Credentials, MediaKind, UploadResult};
use crate::session::SessionState;
use crate::transport::{MultipartForm, Transport, TransportError};

/// Cookie the gateway sets at login and requires on every upload
pub const DATA_TICKET_COOKIE: &str = "webwx_data_ticket";

/// Default bound on a single chunk request
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

const FILE_FIELD: &str = "filename";
const FILE_ID: &str = "WU_FILE_0";
const OCTET_STREAM: &str = "application/octet-stream";
const UPLOAD_TYPE: u32 = 2;
const MEDIA_TYPE_ATTACHMENT: u32 = 4;

/// An upload that did not produce a media id
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("missing webwx_data_ticket cookie")]
    MissingTicket,
    #[error("cannot read {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("chunk {chunk} failed: {source}")]
    Chunk {
        chunk: u64,
        #[source]
        source: TransportError,
    },
    #[error("chunk {chunk} returned an undecodable response: {source}")]
    Malformed {
        chunk: u64,
        #[source]
        source: serde_json::Error,
    },
    #[error("gateway rejected upload with status {}", .0.status)]
    Rejected(UploadResult),
}

/// Uploads files in fixed-size chunks, one request at a time
///
/// Chunk `k` is only sent after chunk `k - 1` got a response, and the first
/// failure aborts the upload. There is no resume: retrying starts again from
/// the first chunk.
pub struct ChunkUploader {
    transport: Arc<dyn Transport>,
    state: Arc<SessionState>,
    chunk_size: u64,
    timeout: Duration,
}

impl ChunkUploader {
    pub fn new(transport: Arc<dyn Transport>, state: Arc<SessionState>) -> Self {
        Self {
            transport,
            state,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the ticket, open the file, then upload it
    pub fn upload_file(
        &self,
        path: impl AsRef<Path>,
        to_user: impl Into<String>,
        kind: MediaKind,
    ) -> Result<UploadResult, UploadError> {
        self.data_ticket()?;
        let job = UploadJob::open(path, to_user, kind)?;
        self.upload(job)
    }

    /// Upload an opened file
    ///
    /// The result is taken from the last chunk's response; a non-zero status
    /// there is [`UploadError::Rejected`].
    pub fn upload(&self, mut job: UploadJob) -> Result<UploadResult, UploadError> {
        let ticket = self.data_ticket()?;
        let credentials = self.state.credentials();
        let plan = job.plan(self.chunk_size);

        let url = upload_url(&credentials).map_err(|source| UploadError::Chunk { chunk: 1, source })?;
        let descriptor = descriptor(&credentials, &job)
            .map_err(|source| UploadError::Malformed { chunk: 1, source })?;

        info!(
            "Uploading {} ({} bytes, {} chunks) to {}",
            job.file_name, job.total_len, plan.count, job.to_user
        );

        let mut result = UploadResult::not_sent();
        for chunk in 1..=plan.count {
            let data = job.read_chunk(&plan, chunk).map_err(|source| UploadError::File {
                path: job.path.clone(),
                source,
            })?;
            debug!("Sending chunk {}/{} ({} bytes)", chunk, plan.count, data.len());

            let form = chunk_form(&job, &plan, chunk, data, &descriptor, &ticket, &credentials.pass_ticket);
            let body = self
                .transport
                .post_multipart(&url, form, self.timeout)
                .map_err(|source| UploadError::Chunk { chunk, source })?;
            let response: UploadMediaResponse =
                serde_json::from_str(&body).map_err(|source| UploadError::Malformed { chunk, source })?;
            result = response.into();
        }

        if !result.is_success() {
            warn!("Upload of {} rejected with status {}", job.file_name, result.status);
            return Err(UploadError::Rejected(result));
        }

        info!("Uploaded {}", job.file_name);
        Ok(result)
    }

    /// The upload ticket cookie, if the session has one
    pub(crate) fn data_ticket(&self) -> Result<String, UploadError> {
        self.transport
            .cookie(DATA_TICKET_COOKIE)
            .filter(|ticket| !ticket.is_empty())
            .ok_or(UploadError::MissingTicket)
    }
}

/// JSON sent as the `uploadmediarequest` field of every chunk
fn descriptor(credentials: &Credentials, job: &UploadJob) -> serde_json::Result<String> {
    serde_json::to_string(&UploadMediaRequest {
        upload_type: UPLOAD_TYPE,
        base_request: &credentials.base_request,
        client_media_id: Utc::now().timestamp(),
        total_len: job.total_len,
        start_pos: 0,
        data_len: job.total_len,
        media_type: MEDIA_TYPE_ATTACHMENT,
        from_user_name: &credentials.self_user_name,
        to_user_name: &job.to_user,
        file_md5: &job.checksum,
    })
}

fn chunk_form(
    job: &UploadJob,
    plan: &ChunkPlan,
    chunk: u64,
    data: Vec<u8>,
    descriptor: &str,
    ticket: &str,
    pass_ticket: &str,
) -> MultipartForm {
    let mut form = MultipartForm::new()
        .text("id", FILE_ID)
        .text("name", job.file_name.as_str())
        .text("type", OCTET_STREAM)
        .text(
            "lastModifiedDate",
            job.last_modified.format("%a %b %d %Y %H:%M:%S GMT+0000").to_string(),
        )
        .text("size", job.total_len.to_string())
        .text("mediatype", job.kind.form_value())
        .text("uploadmediarequest", descriptor)
        .text(DATA_TICKET_COOKIE, ticket)
        .text("pass_ticket", pass_ticket);

    if plan.is_chunked() {
        form = form
            .text("chunk", chunk.to_string())
            .text("chunks", plan.count.to_string());
    }

    form.file(FILE_FIELD, job.file_name.as_str(), OCTET_STREAM, data)
}
