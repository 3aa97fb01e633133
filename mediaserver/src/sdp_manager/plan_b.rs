use std::sync::{Arc, Mutex, Weak};

use log::{debug, warn};
use sdp::{Capabilities, SessionInfo};
use shared::error::Result;

use super::state::{SdpManagerState, StateChangeOp, next_state};
use super::{OnRenegotiationFn, SdpManager};
use crate::endpoint::Endpoint;
use crate::listener::{ListenerId, Listeners};
use crate::lock;
use crate::transport::Transport;

struct SdpManagerPlanBInternal {
    state: SdpManagerState,
    transport: Option<Arc<Transport>>,
    local: Option<SessionInfo>,
    remote: Option<SessionInfo>,
    on_renegotiation: Listeners<OnRenegotiationFn>,
}

/// Plan B negotiation: a single media section per kind carries every track
/// of that kind for the whole life of the session.
pub struct SdpManagerPlanB {
    endpoint: Arc<Endpoint>,
    capabilities: Capabilities,
    weak_self: Weak<SdpManagerPlanB>,
    internal: Mutex<SdpManagerPlanBInternal>,
}

impl SdpManagerPlanB {
    pub fn new(endpoint: Arc<Endpoint>, capabilities: Capabilities) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| SdpManagerPlanB {
            endpoint,
            capabilities,
            weak_self: weak_self.clone(),
            internal: Mutex::new(SdpManagerPlanBInternal {
                state: SdpManagerState::Initial,
                transport: None,
                local: None,
                remote: None,
                on_renegotiation: Listeners::new(),
            }),
        })
    }

    /// Last local description created or answered.
    pub fn local_description(&self) -> Option<SessionInfo> {
        lock(&self.internal).local.clone()
    }

    /// Last remote description processed.
    pub fn remote_description(&self) -> Option<SessionInfo> {
        lock(&self.internal).remote.clone()
    }

    fn transition(&self, op: StateChangeOp) {
        let mut internal = lock(&self.internal);
        let state = next_state(internal.state, op);
        debug!("plan-b: {} -> {} on {}", internal.state, state, op);
        internal.state = state;
    }

    fn renegotiate(&self) {
        let (state, transport, callbacks) = {
            let internal = lock(&self.internal);
            (
                internal.state,
                internal.transport.clone(),
                internal.on_renegotiation.snapshot(),
            )
        };
        super::renegotiate(state, transport, callbacks);
    }

    /// Creates the transport on the first remote description, together with
    /// the local answer when no local offer exists yet.
    fn connect(&self, remote: &SessionInfo, local: Option<SessionInfo>) -> Result<(Arc<Transport>, SessionInfo)> {
        let transport = self.endpoint.create_transport(remote, local.as_ref())?;
        let local = match local {
            Some(local) => local,
            None => super::answer(remote, &transport, &self.capabilities),
        };

        if let Err(err) = super::push_properties(&transport, &local, remote) {
            transport.stop();
            return Err(err);
        }

        let weak_self = self.weak_self.clone();
        transport.on_outgoing_track(move |track, _| {
            let weak_manager = weak_self.clone();
            track.on_stopped(move || {
                if let Some(manager) = weak_manager.upgrade() {
                    manager.renegotiate();
                }
            });
            if let Some(manager) = weak_self.upgrade() {
                manager.renegotiate();
            }
        });

        lock(&self.internal).transport = Some(Arc::clone(&transport));
        Ok((transport, local))
    }

    /// Aligns the incoming streams of `transport` with the streams announced
    /// by `remote`.
    fn reconcile(transport: &Transport, remote: &SessionInfo) {
        for stream in transport.incoming_streams() {
            let Some(info) = remote.stream(stream.id()) else {
                debug!("plan-b: stopping incoming stream {} gone from remote", stream.id());
                stream.stop();
                continue;
            };
            for track in stream.tracks() {
                if info.track(track.id()).is_none() {
                    debug!("plan-b: stopping incoming track {} gone from remote", track.id());
                    track.stop();
                }
            }
        }

        for info in remote.streams.values() {
            let Some(stream) = transport.incoming_stream(&info.id) else {
                if let Err(err) = transport.create_incoming_stream(info) {
                    warn!("plan-b: cannot receive stream {}: {}", info.id, err);
                }
                continue;
            };
            for track in info.tracks.values() {
                if stream.track(&track.id).is_some() {
                    continue;
                }
                if let Err(err) = stream.create_track(track) {
                    warn!("plan-b: cannot receive track {} of stream {}: {}", track.id, info.id, err);
                }
            }
        }
    }
}

impl SdpManager for SdpManagerPlanB {
    fn state(&self) -> SdpManagerState {
        lock(&self.internal).state
    }

    fn transport(&self) -> Option<Arc<Transport>> {
        lock(&self.internal).transport.clone()
    }

    fn create_local_description(&self) -> Result<SessionInfo> {
        let (local, transport) = {
            let internal = lock(&self.internal);
            (internal.local.clone(), internal.transport.clone())
        };

        let mut local = local.unwrap_or_else(|| self.endpoint.create_offer(&self.capabilities));
        local.remove_all_streams();
        if let Some(transport) = &transport {
            for stream in transport.outgoing_streams() {
                local.add_stream(stream.info());
            }
        }

        lock(&self.internal).local = Some(local.clone());
        self.transition(StateChangeOp::CreateLocal);

        Ok(local)
    }

    fn process_remote_description(&self, sdp: &str) -> Result<SessionInfo> {
        let remote = SessionInfo::parse(sdp)?;

        let (state, local, transport) = {
            let internal = lock(&self.internal);
            (internal.state, internal.local.clone(), internal.transport.clone())
        };

        let (transport, local) = match transport {
            Some(transport) => (transport, local),
            None => {
                let (transport, local) = self.connect(&remote, local)?;
                (transport, Some(local))
            }
        };

        // a pending local offer is completed by this answer, anything else is an offer
        let local = match local {
            Some(local) if state == SdpManagerState::LocalOffer => local,
            _ => super::answer(&remote, &transport, &self.capabilities),
        };

        Self::reconcile(&transport, &remote);

        {
            let mut internal = lock(&self.internal);
            internal.local = Some(local);
            internal.remote = Some(remote.clone());
        }
        self.transition(StateChangeOp::ProcessRemote);

        Ok(remote)
    }

    fn on_renegotiation(&self, f: Arc<OnRenegotiationFn>) -> ListenerId {
        lock(&self.internal).on_renegotiation.add(f)
    }
}
