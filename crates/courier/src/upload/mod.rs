//! Chunked media upload

mod job;
mod uploader;

pub use job::{ChunkPlan, DEFAULT_CHUNK_SIZE, UploadJob};
pub use uploader::{ChunkUploader, DATA_TICKET_COOKIE, DEFAULT_UPLOAD_TIMEOUT, UploadError};
