use std::error::Error;
use std::fmt;

/// Errors that abort the translation of a single packet. Nothing in here is
/// fatal to the process; the connection layer decides whether to drop the
/// packet or close the connection.
#[derive(Debug)]
pub enum TranslateError {
    IoError(std::io::Error),
    /// The packet's bytes do not satisfy the wire format: a short buffer, a
    /// length prefix overrunning the buffer, or an impossible field value.
    MalformedPacket(String),
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslateError::IoError(err) => write!(f, "IO error: {}", err),
            TranslateError::MalformedPacket(msg) => write!(f, "Malformed packet: {}", msg),
        }
    }
}

impl Error for TranslateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TranslateError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TranslateError {
    fn from(err: std::io::Error) -> Self {
        TranslateError::IoError(err)
    }
}

impl TranslateError {
    /// Classifies a codec-layer error. Buffer-shape violations (short reads,
    /// overrunning length prefixes) are malformed packets; anything else
    /// stays an IO error.
    pub fn from_wire(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData => {
                TranslateError::MalformedPacket(err.to_string())
            }
            _ => TranslateError::IoError(err),
        }
    }
}
