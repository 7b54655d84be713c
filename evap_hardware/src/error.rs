use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("link unavailable on {port}: {reason}")]
    LinkUnavailable { port: String, reason: String },
    #[error("link timeout")]
    Timeout,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "hardware")]
impl From<serialport::Error> for HwError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::Io(kind) => HwError::Io(std::io::Error::new(kind, e.description)),
            _ => HwError::Protocol(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, HwError>;
