#![allow(dead_code)]

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    //SDP errors
    #[error("sdp: syntax error: {0}")]
    ErrSdpSyntax(String),
    #[error("sdp: missing origin line")]
    ErrSdpMissingOrigin,
    #[error("sdp: missing ice parameters")]
    ErrSdpMissingIce,
    #[error("sdp: missing dtls parameters")]
    ErrSdpMissingDtls,
    #[error("sdp: no compatible codec for media {0}")]
    ErrIncompatibleCapability(String),

    //Stream/track errors
    #[error("stream {0} already exists")]
    ErrStreamAlreadyExists(String),
    #[error("track {0} already exists")]
    ErrTrackAlreadyExists(String),
    #[error("track {0} has no ssrc")]
    ErrTrackWithoutSsrc(String),
    #[error("ssrc allocator exhausted")]
    ErrSsrcExhausted,

    //Generic
    #[error("invalid argument: {0}")]
    ErrInvalidArgument(String),
    #[error("already closed")]
    ErrClosed,
    #[error("json: {0}")]
    Json(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_display() {
        let tests = vec![
            (Error::ErrSdpSyntax("m=audio".to_owned()), "sdp: syntax error: m=audio"),
            (Error::ErrStreamAlreadyExists("camera".to_owned()), "stream camera already exists"),
            (Error::ErrClosed, "already closed"),
        ];

        for (err, expected) in tests {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn test_json_error_conversion() {
        let err: Error = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }
}
