use thiserror::Error;

use tabula_model::ColumnType;

/// Errors raised while serializing a table into its binary image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("column '{column}': value {value} does not fit a 32-bit integer")]
    IntOutOfRange { column: String, value: i64 },
    #[error("column '{column}': cannot encode {value} as {ty}")]
    ValueMismatch {
        column: String,
        value: String,
        ty: ColumnType,
    },
}

/// Errors raised while reading a binary container back.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("missing or invalid container magic")]
    BadMagic,
    #[error("unsupported container format version {0}")]
    UnsupportedVersion(u8),
    #[error("container declares {declared} payload bytes but {actual} are present")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("payload too short for the initialization vector")]
    MissingIv,
    #[error("ciphertext length {0} is not a multiple of 16 bytes")]
    InvalidCiphertextLength(usize),
    #[error("invalid padding (wrong key or corrupted payload)")]
    InvalidPadding,
    #[error("unexpected end of row data at byte {offset}")]
    Truncated { offset: usize },
    #[error("invalid presence flag {flag} at byte {offset}")]
    BadFlag { flag: u8, offset: usize },
    #[error("row data has {0} trailing bytes")]
    TrailingBytes(usize),
    #[error("invalid UTF-8 in string field")]
    Utf8(#[from] std::string::FromUtf8Error),
}
