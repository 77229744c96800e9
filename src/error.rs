//! Error types for binding, caching and decoding images.

use std::fmt;
use std::io;
use thiserror::Error;

/// Bit set on every error code that leaves the decoder unusable.
const UNRECOVERABLE: u16 = 0x8000;

/// Stable numeric error codes returned by [`crate::ImageWidget::cache`].
///
/// `Ok` is zero; every failure is nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum ErrorCode {
    #[default]
    Ok = 0,
    /// The image decoded but some feature of it was ignored.
    UnsupportedOk = 3,
    BadFormat = UNRECOVERABLE + 1,
    BadData = UNRECOVERABLE + 2,
    Unsupported = UNRECOVERABLE + 3,
    NoMemory = UNRECOVERABLE + 4,
    NoSuchFile = UNRECOVERABLE + 5,
    /// Operation on a widget that has no bound source.
    NotOpen = UNRECOVERABLE + 6,
    /// Operation on a window that is not an image widget.
    TypeMismatch = UNRECOVERABLE + 7,
}

impl ErrorCode {
    pub fn value(self) -> u16 {
        self as u16
    }

    pub fn is_ok(self) -> bool {
        self == ErrorCode::Ok
    }

    /// True for codes that describe a failed operation.
    pub fn is_fatal(self) -> bool {
        self.value() & UNRECOVERABLE != 0
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Ok => "Ok",
            ErrorCode::UnsupportedOk => "UnsupportedOk",
            ErrorCode::BadFormat => "BadFormat",
            ErrorCode::BadData => "BadData",
            ErrorCode::Unsupported => "Unsupported",
            ErrorCode::NoMemory => "NoMemory",
            ErrorCode::NoSuchFile => "NoSuchFile",
            ErrorCode::NotOpen => "NotOpen",
            ErrorCode::TypeMismatch => "TypeMismatch",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#06x})", self.as_str(), self.value())
    }
}

/// Failure while binding, caching or decoding an image.
#[derive(Error, Debug)]
pub enum ImageError {
    /// Signature not recognised by any codec
    #[error("unrecognised image format")]
    BadFormat,

    /// Header or pixel data is malformed
    #[error("malformed image data: {0}")]
    BadData(String),

    /// Recognised format using a feature no codec implements
    #[error("unsupported image feature: {0}")]
    Unsupported(String),

    /// Decoded frame does not fit the memory budget
    #[error("frame needs {needed} bytes, limit is {limit}")]
    NoMemory { needed: usize, limit: usize },

    #[error("no such file: {0}")]
    NoSuchFile(String),

    #[error("widget has no bound image source")]
    NotOpen,

    #[error("window is not an image widget")]
    TypeMismatch,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("image decoder error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("TIFF decoder error: {0}")]
    Tiff(#[from] tiff::TiffError),
}

impl ImageError {
    /// Numeric code reported to callers of the widget API.
    pub fn code(&self) -> ErrorCode {
        match self {
            ImageError::BadFormat => ErrorCode::BadFormat,
            ImageError::BadData(_) => ErrorCode::BadData,
            ImageError::Unsupported(_) => ErrorCode::Unsupported,
            ImageError::NoMemory { .. } => ErrorCode::NoMemory,
            ImageError::NoSuchFile(_) => ErrorCode::NoSuchFile,
            ImageError::NotOpen => ErrorCode::NotOpen,
            ImageError::TypeMismatch => ErrorCode::TypeMismatch,
            ImageError::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => ErrorCode::NoSuchFile,
                io::ErrorKind::OutOfMemory => ErrorCode::NoMemory,
                // Truncated sources are data errors, not I/O failures
                _ => ErrorCode::BadData,
            },
            ImageError::Decode(e) => match e {
                image::ImageError::Unsupported(_) => ErrorCode::Unsupported,
                image::ImageError::Limits(_) => ErrorCode::NoMemory,
                image::ImageError::IoError(io) if io.kind() == io::ErrorKind::NotFound => {
                    ErrorCode::NoSuchFile
                }
                _ => ErrorCode::BadData,
            },
            ImageError::Tiff(e) => match e {
                tiff::TiffError::UnsupportedError(_) => ErrorCode::Unsupported,
                tiff::TiffError::LimitsExceeded => ErrorCode::NoMemory,
                _ => ErrorCode::BadData,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ImageError>;
