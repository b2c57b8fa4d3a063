use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Source too small, dimensions not a multiple of 8, tile count over the
    /// cap, or an argument out of range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Indexed source with an unsupported bit depth, a pixel whose color is
    /// missing from the declared palette, or an unreadable file layout.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The data does not fit the requested encoding.
    #[error("Capacity exceeded: {what} needs {count}, limit is {limit}")]
    CapacityExceeded {
        what: &'static str,
        count: usize,
        limit: usize,
    },

    /// A call made in the wrong lifecycle state, e.g. writing to an
    /// unlocked sprite.
    #[error("State violation: {0}")]
    StateViolation(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG decode error: {0}")]
    Png(#[from] png::DecodingError),
}

pub type Result<T> = std::result::Result<T, Error>;
