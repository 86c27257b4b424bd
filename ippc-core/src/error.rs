use thiserror::Error;

/// Main error type for pack/unpack operations
#[derive(Error, Debug)]
pub enum PackError {
    #[error("Ran out of input")]
    OutOfInput,

    #[error("invalid type tag: '0x{0:02x}'")]
    InvalidTag(u8),

    #[error("invalid length: {0}")]
    InvalidLength(i64),

    #[error("invalid text payload: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),

    #[error("cannot pack '{0}' objects")]
    Unencodable(String),

    #[error("bad reconstruction: {0}")]
    BadReconstruction(String),

    #[error("cannot unpack {0}")]
    UnknownIdentity(String),

    #[error("{0}")]
    State(String),

    #[error("maximum recursion depth exceeded while {0}")]
    RecursionLimit(&'static str),

    #[error("buffer allocation failed")]
    Allocation,

    #[error("int too big to convert")]
    IntegerOverflow,
}

/// Result type alias for pack/unpack operations
pub type PackResult<T> = Result<T, PackError>;
