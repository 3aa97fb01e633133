use std::fmt;

/// State of the DTLS handshake of a transport, as reported by the engine.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum DtlsState {
    Unspecified = 0,

    /// No handshake started yet.
    #[default]
    New,

    /// The handshake is in progress.
    Connecting,

    /// Keys are negotiated, media can flow.
    Connected,

    /// The association was shut down.
    Closed,

    /// The handshake or the certificate check failed.
    Failed,
}

const DTLS_STATE_NEW_STR: &str = "new";
const DTLS_STATE_CONNECTING_STR: &str = "connecting";
const DTLS_STATE_CONNECTED_STR: &str = "connected";
const DTLS_STATE_CLOSED_STR: &str = "closed";
const DTLS_STATE_FAILED_STR: &str = "failed";

impl From<&str> for DtlsState {
    fn from(raw: &str) -> Self {
        match raw {
            DTLS_STATE_NEW_STR => DtlsState::New,
            DTLS_STATE_CONNECTING_STR => DtlsState::Connecting,
            DTLS_STATE_CONNECTED_STR => DtlsState::Connected,
            DTLS_STATE_CLOSED_STR => DtlsState::Closed,
            DTLS_STATE_FAILED_STR => DtlsState::Failed,
            _ => DtlsState::Unspecified,
        }
    }
}

impl fmt::Display for DtlsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            DtlsState::New => DTLS_STATE_NEW_STR,
            DtlsState::Connecting => DTLS_STATE_CONNECTING_STR,
            DtlsState::Connected => DTLS_STATE_CONNECTED_STR,
            DtlsState::Closed => DTLS_STATE_CLOSED_STR,
            DtlsState::Failed => DTLS_STATE_FAILED_STR,
            DtlsState::Unspecified => crate::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl DtlsState {
    /// No further transition is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DtlsState::Closed | DtlsState::Failed)
    }
}
