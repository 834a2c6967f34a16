/*!
    Error types for the hwdec crates.
*/

use thiserror::Error;

use crate::Pts;

/**
    Error type for the hwdec crates.

    Empty queues and the end of a stream are never errors; they are
    reported as `None` or empty results by the operations that see them.
*/
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied argument or stream parameter is invalid
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// Valid, but not handled by the selected backend
    #[error("unsupported: {message}")]
    Unsupported { message: String },

    /// A backend or device operation failed
    #[error("runtime error: {message}")]
    Runtime { message: String },

    /// A frame was released out of display order
    #[error("frame released out of order: expected pts {expected}, got {got}")]
    OutOfOrderRelease { expected: Pts, got: Pts },

    /// An allocation of the given size failed
    #[error("resource exhausted: could not allocate {requested} bytes")]
    ResourceExhausted { requested: usize },

    /// I/O error (output file, reference checksum file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /**
        Create an invalid parameter error with the given message.
    */
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /**
        Create an unsupported error with the given message.
    */
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /**
        Create a runtime error with the given message.
    */
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /**
        Returns true if this is an unsupported error.
    */
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /**
        Returns true if this is an out-of-order release error.
    */
    pub fn is_out_of_order(&self) -> bool {
        matches!(self, Self::OutOfOrderRelease { .. })
    }
}

/**
    Result type alias for the hwdec crates.
*/
pub type Result<T> = std::result::Result<T, Error>;

static_assertions::assert_impl_all!(Error: Send, Sync);
