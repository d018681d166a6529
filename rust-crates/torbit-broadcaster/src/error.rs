use thiserror::Error;
use tokio_util::codec::LinesCodecError;

#[derive(Error, Debug)]
pub enum BroadcasterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line decoding error: {0}")]
    Codec(#[from] LinesCodecError),

    #[error("Connection closed before a display name was received")]
    HandshakeAborted,

    #[error("Name {0} is already taken")]
    NameTaken(String),

    #[error("Coordinator is not running")]
    CoordinatorClosed,

    #[error("Bridge has already run")]
    AlreadyRun,
}

pub type Result<T> = std::result::Result<T, BroadcasterError>;
