// Error types shared by every format reader

use thiserror::Error;

/// Errors raised while opening, decoding or encoding a media tree
#[derive(Error, Debug)]
pub enum Error {
    /// The byte source could not be opened or read
    #[error("source access error: {0}")]
    SourceAccess(#[from] std::io::Error),

    /// The top-level signature does not belong to the requested format
    #[error("not a valid {format} source: {reason}")]
    SignatureMismatch { format: &'static str, reason: String },

    #[error("unsupported {format} version {version}")]
    UnsupportedVersion { format: &'static str, version: String },

    /// A length, boundary or truncated read that cannot be navigated
    #[error("malformed structure at offset {offset}: {reason}")]
    Malformed { offset: u64, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        Error::Malformed {
            offset,
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Error::InvalidArgument(reason.into())
    }

    pub fn signature(format: &'static str, reason: impl Into<String>) -> Self {
        Error::SignatureMismatch {
            format,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_carries_offset() {
        let err = Error::malformed(42, "declared length 3 is smaller than header");
        assert_eq!(
            err.to_string(),
            "malformed structure at offset 42: declared length 3 is smaller than header"
        );
    }

    #[test]
    fn test_io_error_converts_to_source_access() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.wma");
        let err: Error = io.into();
        assert!(matches!(err, Error::SourceAccess(_)));
    }
}
