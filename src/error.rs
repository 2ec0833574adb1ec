use packed_struct::PackingError;

/// Errors from resource container parsing and DIB transcoding.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("resource container truncated at offset {offset:#x}: {reason}")]
    TruncatedContainer { offset: usize, reason: &'static str },

    #[error("malformed bitmap: {0}")]
    MalformedBitmap(String),
}

impl From<PackingError> for Error {
    fn from(e: PackingError) -> Self {
        Error::MalformedBitmap(format!("header packing failed: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
