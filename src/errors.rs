//! Error types

use core::fmt;

#[derive(Debug, PartialEq)]
pub enum Error {
    /// Not enough bytes to decode a header.
    TooShort {
        required: usize,
        available: usize,
        data: String,
    },
    ParseError(String),
    RegisterError(String),
    SculptingError(String),
    /// Declared field widths of a packet do not add up to the bytes available.
    LengthMismatch {
        layer: String,
        declared: usize,
        available: usize,
    },
    PermissionDenied(String),
    Network(String),
    Capture(String),
    Io(String),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TooShort {
                required,
                available,
                data,
            } => write!(
                f,
                "too short: required {} bytes, available {} bytes (data: {})",
                required, available, data
            ),
            Error::ParseError(s) => write!(f, "parse error: {}", s),
            Error::RegisterError(s) => write!(f, "register error: {}", s),
            Error::SculptingError(s) => write!(f, "sculpting error: {}", s),
            Error::LengthMismatch {
                layer,
                declared,
                available,
            } => write!(
                f,
                "length mismatch at {}: fields declare {} bytes but the buffer holds {} bytes",
                layer, declared, available
            ),
            Error::PermissionDenied(s) => write!(f, "permission denied: {}", s),
            Error::Network(s) => write!(f, "network error: {}", s),
            Error::Capture(s) => write!(f, "capture error: {}", s),
            Error::Io(s) => write!(f, "I/O error: {}", s),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<fmt::Error> for Error {
    fn from(e: fmt::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_mismatch_names_layer_and_sizes() {
        let e = Error::LengthMismatch {
            layer: "TCP".to_string(),
            declared: 40,
            available: 35,
        };
        let msg = format!("{}", e);
        assert!(msg.contains("TCP"), "{}", msg);
        assert!(msg.contains("40"), "{}", msg);
        assert!(msg.contains("35"), "{}", msg);
    }
}
