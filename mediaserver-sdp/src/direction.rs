use std::fmt;

use crate::UNSPECIFIED_STR;

/// Direction of media flow of a media section.
///
/// # Specification
///
/// See [RFC 8866 section 6.7](https://datatracker.ietf.org/doc/html/rfc8866#section-6.7).
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Direction is not specified (internal use only).
    Unspecified,

    /// Media is both sent and received.
    #[default]
    Sendrecv,

    /// Media is only sent.
    Sendonly,

    /// Media is only received.
    Recvonly,

    /// Media is neither sent nor received.
    Inactive,
}

const DIRECTION_SENDRECV_STR: &str = "sendrecv";
const DIRECTION_SENDONLY_STR: &str = "sendonly";
const DIRECTION_RECVONLY_STR: &str = "recvonly";
const DIRECTION_INACTIVE_STR: &str = "inactive";

impl From<&str> for Direction {
    fn from(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            DIRECTION_SENDRECV_STR => Direction::Sendrecv,
            DIRECTION_SENDONLY_STR => Direction::Sendonly,
            DIRECTION_RECVONLY_STR => Direction::Recvonly,
            DIRECTION_INACTIVE_STR => Direction::Inactive,
            _ => Direction::Unspecified,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Direction::Sendrecv => write!(f, "{DIRECTION_SENDRECV_STR}"),
            Direction::Sendonly => write!(f, "{DIRECTION_SENDONLY_STR}"),
            Direction::Recvonly => write!(f, "{DIRECTION_RECVONLY_STR}"),
            Direction::Inactive => write!(f, "{DIRECTION_INACTIVE_STR}"),
            _ => write!(f, "{UNSPECIFIED_STR}"),
        }
    }
}

impl Direction {
    /// Returns the direction seen from the other peer.
    ///
    /// Swaps sendonly with recvonly, sendrecv and inactive remain unchanged.
    pub fn reverse(&self) -> Direction {
        match *self {
            Direction::Sendonly => Direction::Recvonly,
            Direction::Recvonly => Direction::Sendonly,
            _ => *self,
        }
    }

    /// Returns the intersection of two directions.
    pub fn intersect(&self, other: Direction) -> Direction {
        Self::from_send_recv(
            self.has_send() && other.has_send(),
            self.has_recv() && other.has_recv(),
        )
    }

    pub fn from_send_recv(send: bool, recv: bool) -> Direction {
        match (send, recv) {
            (true, true) => Self::Sendrecv,
            (true, false) => Self::Sendonly,
            (false, true) => Self::Recvonly,
            (false, false) => Self::Inactive,
        }
    }

    pub fn has_send(&self) -> bool {
        matches!(self, Self::Sendrecv | Self::Sendonly)
    }

    pub fn has_recv(&self) -> bool {
        matches!(self, Self::Sendrecv | Self::Recvonly)
    }
}

/// Direction of a restriction identifier (`a=rid`) or of a simulcast list.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DirectionWay {
    #[default]
    Unspecified,
    Send,
    Recv,
}

const DIRECTION_WAY_SEND_STR: &str = "send";
const DIRECTION_WAY_RECV_STR: &str = "recv";

impl From<&str> for DirectionWay {
    fn from(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            DIRECTION_WAY_SEND_STR => DirectionWay::Send,
            DIRECTION_WAY_RECV_STR => DirectionWay::Recv,
            _ => DirectionWay::Unspecified,
        }
    }
}

impl fmt::Display for DirectionWay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DirectionWay::Send => write!(f, "{DIRECTION_WAY_SEND_STR}"),
            DirectionWay::Recv => write!(f, "{DIRECTION_WAY_RECV_STR}"),
            _ => write!(f, "{UNSPECIFIED_STR}"),
        }
    }
}

impl DirectionWay {
    pub fn reverse(&self) -> DirectionWay {
        match *self {
            DirectionWay::Send => DirectionWay::Recv,
            DirectionWay::Recv => DirectionWay::Send,
            DirectionWay::Unspecified => DirectionWay::Unspecified,
        }
    }
}
