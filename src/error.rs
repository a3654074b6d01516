use crate::codec::Coding;
use std::io;

/// Errors returned by the compression middleware.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying response sink doesn't support connection hijacking.
    #[error("underlying response sink doesn't support connection hijacking")]
    Unhijackable,

    /// An encoder couldn't be constructed with the configured level.
    #[error("invalid compression level {0}, expected 0..=9")]
    InvalidLevel(i32),

    /// The coding has no encoder (only gzip and deflate are pooled).
    #[error("no encoder for the {0} coding")]
    NoEncoder(Coding),

    /// An I/O error from the underlying sink or connection.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A malformed token in an `Accept-Encoding` header.
///
/// These never abort negotiation; the offending token is dropped (or keeps
/// its default weight) and parsing continues with the next one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A token with nothing before the first `;`.
    #[error("empty content-coding in {0:?}")]
    EmptyCoding(String),

    /// A `q` parameter whose value isn't a number.
    #[error("invalid qvalue {value:?} for {coding:?}")]
    InvalidQuality {
        /// The lower-cased coding name.
        coding: String,
        /// The raw parameter value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhijackable_message() {
        assert_eq!(
            Error::Unhijackable.to_string(),
            "underlying response sink doesn't support connection hijacking"
        );
    }

    #[test]
    fn test_io_error_is_transparent() {
        let err = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert_eq!(err.to_string(), "gone");
    }

    #[test]
    fn test_no_encoder_names_coding() {
        assert_eq!(
            Error::NoEncoder(Coding::Identity).to_string(),
            "no encoder for the identity coding"
        );
    }
}
