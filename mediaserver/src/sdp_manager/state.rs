use std::fmt;

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum StateChangeOp {
    #[default]
    CreateLocal,
    ProcessRemote,
}

impl fmt::Display for StateChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            StateChangeOp::CreateLocal => write!(f, "CreateLocal"),
            StateChangeOp::ProcessRemote => write!(f, "ProcessRemote"),
        }
    }
}

/// Progress of the offer/answer exchange driven by an [`SdpManager`](super::SdpManager).
///
/// The offerer goes `initial → local-offer → stable`, the answerer
/// `initial → remote-offer → stable`. From `stable` either side may start a
/// new exchange.
///
/// ```
/// use mediaserver::SdpManagerState;
///
/// assert_eq!(SdpManagerState::LocalOffer.to_string(), "local-offer");
/// assert_eq!(SdpManagerState::from("stable"), SdpManagerState::Stable);
/// ```
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum SdpManagerState {
    Unspecified = 0,

    /// Nothing has been exchanged yet.
    #[default]
    Initial,

    /// A local offer was created, waiting for the remote answer.
    LocalOffer,

    /// A remote offer was processed, the local answer is still to be created.
    RemoteOffer,

    /// The last exchange completed.
    Stable,
}

const SDP_MANAGER_STATE_INITIAL_STR: &str = "initial";
const SDP_MANAGER_STATE_LOCAL_OFFER_STR: &str = "local-offer";
const SDP_MANAGER_STATE_REMOTE_OFFER_STR: &str = "remote-offer";
const SDP_MANAGER_STATE_STABLE_STR: &str = "stable";

impl From<&str> for SdpManagerState {
    fn from(raw: &str) -> Self {
        match raw {
            SDP_MANAGER_STATE_INITIAL_STR => SdpManagerState::Initial,
            SDP_MANAGER_STATE_LOCAL_OFFER_STR => SdpManagerState::LocalOffer,
            SDP_MANAGER_STATE_REMOTE_OFFER_STR => SdpManagerState::RemoteOffer,
            SDP_MANAGER_STATE_STABLE_STR => SdpManagerState::Stable,
            _ => SdpManagerState::Unspecified,
        }
    }
}

impl fmt::Display for SdpManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SdpManagerState::Initial => write!(f, "{SDP_MANAGER_STATE_INITIAL_STR}"),
            SdpManagerState::LocalOffer => write!(f, "{SDP_MANAGER_STATE_LOCAL_OFFER_STR}"),
            SdpManagerState::RemoteOffer => write!(f, "{SDP_MANAGER_STATE_REMOTE_OFFER_STR}"),
            SdpManagerState::Stable => write!(f, "{SDP_MANAGER_STATE_STABLE_STR}"),
            _ => write!(f, "{}", crate::UNSPECIFIED_STR),
        }
    }
}

impl SdpManagerState {
    /// Whether no exchange is in flight, so a new offer may be started.
    pub fn is_quiescent(&self) -> bool {
        matches!(self, SdpManagerState::Initial | SdpManagerState::Stable)
    }
}

/// State reached after applying `op` in `cur`.
///
/// Repeating the side that is already pending keeps the state.
pub(crate) fn next_state(cur: SdpManagerState, op: StateChangeOp) -> SdpManagerState {
    match (cur, op) {
        // initial|stable->CreateLocal->local-offer
        (SdpManagerState::Initial | SdpManagerState::Stable, StateChangeOp::CreateLocal) => {
            SdpManagerState::LocalOffer
        }
        // initial|stable->ProcessRemote->remote-offer
        (SdpManagerState::Initial | SdpManagerState::Stable, StateChangeOp::ProcessRemote) => {
            SdpManagerState::RemoteOffer
        }
        // remote-offer->CreateLocal->stable
        (SdpManagerState::RemoteOffer, StateChangeOp::CreateLocal) => SdpManagerState::Stable,
        // local-offer->ProcessRemote->stable
        (SdpManagerState::LocalOffer, StateChangeOp::ProcessRemote) => SdpManagerState::Stable,
        (cur, _) => cur,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_sdp_manager_state() {
        let tests = vec![
            ("Unspecified", SdpManagerState::Unspecified),
            ("initial", SdpManagerState::Initial),
            ("local-offer", SdpManagerState::LocalOffer),
            ("remote-offer", SdpManagerState::RemoteOffer),
            ("stable", SdpManagerState::Stable),
        ];

        for (state_string, expected_state) in tests {
            assert_eq!(SdpManagerState::from(state_string), expected_state);
        }
    }

    #[test]
    fn test_sdp_manager_state_string() {
        let tests = vec![
            (SdpManagerState::Unspecified, "Unspecified"),
            (SdpManagerState::Initial, "initial"),
            (SdpManagerState::LocalOffer, "local-offer"),
            (SdpManagerState::RemoteOffer, "remote-offer"),
            (SdpManagerState::Stable, "stable"),
        ];

        for (state, expected_string) in tests {
            assert_eq!(state.to_string(), expected_string);
        }
    }

    #[test]
    fn test_sdp_manager_state_transitions() {
        let tests = vec![
            (
                "initial->CreateLocal->local-offer",
                SdpManagerState::Initial,
                StateChangeOp::CreateLocal,
                SdpManagerState::LocalOffer,
            ),
            (
                "initial->ProcessRemote->remote-offer",
                SdpManagerState::Initial,
                StateChangeOp::ProcessRemote,
                SdpManagerState::RemoteOffer,
            ),
            (
                "stable->CreateLocal->local-offer",
                SdpManagerState::Stable,
                StateChangeOp::CreateLocal,
                SdpManagerState::LocalOffer,
            ),
            (
                "stable->ProcessRemote->remote-offer",
                SdpManagerState::Stable,
                StateChangeOp::ProcessRemote,
                SdpManagerState::RemoteOffer,
            ),
            (
                "local-offer->ProcessRemote->stable",
                SdpManagerState::LocalOffer,
                StateChangeOp::ProcessRemote,
                SdpManagerState::Stable,
            ),
            (
                "remote-offer->CreateLocal->stable",
                SdpManagerState::RemoteOffer,
                StateChangeOp::CreateLocal,
                SdpManagerState::Stable,
            ),
            (
                "local-offer->CreateLocal->local-offer",
                SdpManagerState::LocalOffer,
                StateChangeOp::CreateLocal,
                SdpManagerState::LocalOffer,
            ),
            (
                "remote-offer->ProcessRemote->remote-offer",
                SdpManagerState::RemoteOffer,
                StateChangeOp::ProcessRemote,
                SdpManagerState::RemoteOffer,
            ),
        ];

        for (desc, cur, op, expected) in tests {
            assert_eq!(next_state(cur, op), expected, "{desc}");
        }
    }

    #[test]
    fn test_sdp_manager_state_quiescent() {
        assert!(SdpManagerState::Initial.is_quiescent());
        assert!(SdpManagerState::Stable.is_quiescent());
        assert!(!SdpManagerState::LocalOffer.is_quiescent());
        assert!(!SdpManagerState::RemoteOffer.is_quiescent());
    }
}
