//! Offer/answer negotiation on top of a [`Transport`].
//!
//! Two flavours share the [`SdpManager`] contract: [`SdpManagerPlanB`] keeps
//! one media section per kind and multiplexes every track into it, while
//! [`SdpManagerUnified`] gives each track its own media section through an
//! ordered list of transceivers.

pub mod plan_b;
pub mod state;
pub mod unified;

pub use plan_b::SdpManagerPlanB;
pub use unified::SdpManagerUnified;

use std::sync::Arc;

use log::debug;
use sdp::{Capabilities, MediaKind, SessionInfo};
use shared::error::{Error, Result};

use crate::configuration::{SdpManagerConfiguration, SdpSemantics};
use crate::endpoint::Endpoint;
use crate::listener::ListenerId;
use crate::transport::Transport;
use state::SdpManagerState;

/// Invoked with the session transport when a new offer should be created.
pub type OnRenegotiationFn = dyn Fn(&Arc<Transport>) + Send + Sync;

/// Negotiation of one session with a remote peer.
///
/// Calls must be serialized by the caller; the manager only guards itself
/// against renegotiation triggers fired from the transport.
pub trait SdpManager: Send + Sync {
    fn state(&self) -> SdpManagerState;

    /// Transport created by the first processed remote description.
    fn transport(&self) -> Option<Arc<Transport>>;

    /// Builds the local offer, or the answer when a remote offer is pending.
    fn create_local_description(&self) -> Result<SessionInfo>;

    /// Parses and applies a remote offer or answer and returns it parsed.
    fn process_remote_description(&self, sdp: &str) -> Result<SessionInfo>;

    /// Registers a renegotiation-needed callback.
    ///
    /// Callbacks only fire while no exchange is in flight, i.e. in the
    /// `initial` and `stable` states.
    fn on_renegotiation(&self, f: Arc<OnRenegotiationFn>) -> ListenerId;
}

/// Creates the manager selected by `configuration`.
pub fn create_sdp_manager(
    endpoint: &Arc<Endpoint>,
    configuration: SdpManagerConfiguration,
) -> Result<Arc<dyn SdpManager>> {
    let SdpManagerConfiguration {
        sdp_semantics,
        capabilities,
    } = configuration;

    let manager: Arc<dyn SdpManager> = match sdp_semantics {
        SdpSemantics::PlanB => SdpManagerPlanB::new(Arc::clone(endpoint), capabilities),
        SdpSemantics::UnifiedPlan => SdpManagerUnified::new(Arc::clone(endpoint), capabilities),
        SdpSemantics::Unspecified => {
            return Err(Error::ErrInvalidArgument(format!(
                "unsupported sdp semantics {sdp_semantics}"
            )));
        }
    };
    debug!("created {sdp_semantics} sdp manager");

    Ok(manager)
}

/// Answers `remote` with the ICE and DTLS parameters of `transport`.
pub(crate) fn answer(remote: &SessionInfo, transport: &Transport, capabilities: &Capabilities) -> SessionInfo {
    remote.answer(
        transport.local_ice(),
        transport.local_dtls(),
        transport.local_candidates(),
        capabilities,
    )
}

/// Pushes the codec tables of the first audio and video sections of both
/// descriptions into the transport.
pub(crate) fn push_properties(transport: &Transport, local: &SessionInfo, remote: &SessionInfo) -> Result<()> {
    transport.set_local_properties(
        local.first_media(MediaKind::Audio),
        local.first_media(MediaKind::Video),
    )?;
    transport.set_remote_properties(
        remote.first_media(MediaKind::Audio),
        remote.first_media(MediaKind::Video),
    )
}

/// Calls every renegotiation callback when `state` allows a new offer.
pub(crate) fn renegotiate(
    state: SdpManagerState,
    transport: Option<Arc<Transport>>,
    callbacks: Vec<Arc<OnRenegotiationFn>>,
) {
    let Some(transport) = transport else {
        return;
    };
    if !state.is_quiescent() {
        debug!("renegotiation deferred while in {state}");
        return;
    }

    debug!("renegotiation needed on transport {}", transport.username());
    for f in callbacks {
        f(&transport);
    }
}
