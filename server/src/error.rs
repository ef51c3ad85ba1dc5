use shared::FrameError;
use thiserror::Error;

/// Failures inside a single client session.
///
/// None of these ever leave the session task; they decide whether the
/// session keeps running or closes.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connection error: {0}")]
    Connection(#[from] FrameError),
    #[error("Malformed message: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("Send timed out")]
    SendTimeout,
}

impl SessionError {
    /// Protocol errors drop the offending message; everything else ends the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SessionError::Protocol(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_fatality() {
        let protocol = SessionError::Protocol(serde_json::from_str::<u32>("x").unwrap_err());
        assert!(!protocol.is_fatal());

        assert!(SessionError::SendTimeout.is_fatal());
        assert!(SessionError::Connection(FrameError::ConnectionReset).is_fatal());
    }

    #[test]
    fn test_error_message_formatting() {
        let err = SessionError::Connection(FrameError::FrameLength(2000, 1024));
        assert_eq!(
            err.to_string(),
            "Connection error: Frame of 2000 bytes exceeds the limit of 1024 bytes"
        );
        assert_eq!(SessionError::SendTimeout.to_string(), "Send timed out");
    }
}
