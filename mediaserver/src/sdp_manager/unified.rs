use std::sync::{Arc, Mutex, Weak};

use log::{debug, warn};
use sdp::{Capabilities, Direction, MediaInfo, MediaKind, SessionInfo, StreamInfo, TrackInfo};
use shared::error::Result;

use super::state::{SdpManagerState, StateChangeOp, next_state};
use super::{OnRenegotiationFn, SdpManager};
use crate::endpoint::Endpoint;
use crate::listener::{ListenerId, Listeners};
use crate::lock;
use crate::stream::{IncomingStream, IncomingStreamTrack, OutgoingStream, OutgoingStreamTrack};
use crate::transport::Transport;

/// Outgoing track waiting for, or bound to, a transceiver.
#[derive(Clone)]
struct LocalTrack {
    track: Arc<OutgoingStreamTrack>,
    stream: Option<Arc<OutgoingStream>>,
}

impl LocalTrack {
    /// Announced stream id, a track sent outside of any stream is announced
    /// in a stream of its own.
    fn stream_id(&self) -> String {
        match &self.stream {
            Some(stream) => stream.id().to_owned(),
            None => self.track.id().to_owned(),
        }
    }
}

/// One media section of the session with the tracks bound to it.
#[derive(Clone)]
pub struct Transceiver {
    mid: String,
    kind: MediaKind,
    remote: Option<Arc<IncomingStreamTrack>>,
    local: Option<LocalTrack>,
}

impl Transceiver {
    fn new(mid: &str, kind: MediaKind) -> Self {
        Transceiver {
            mid: mid.to_owned(),
            kind,
            remote: None,
            local: None,
        }
    }

    pub fn mid(&self) -> &str {
        &self.mid
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Track received on this media section.
    pub fn remote_track(&self) -> Option<Arc<IncomingStreamTrack>> {
        self.remote.clone()
    }

    /// Track sent on this media section.
    pub fn local_track(&self) -> Option<Arc<OutgoingStreamTrack>> {
        self.local.as_ref().map(|l| Arc::clone(&l.track))
    }
}

struct SdpManagerUnifiedInternal {
    state: SdpManagerState,
    transport: Option<Arc<Transport>>,
    local: Option<SessionInfo>,
    remote: Option<SessionInfo>,
    transceivers: Vec<Transceiver>,
    pending: Vec<LocalTrack>,
    on_renegotiation: Listeners<OnRenegotiationFn>,
}

/// Unified Plan negotiation: every track owns a media section, tracked by
/// an ordered list of transceivers whose position matches the media
/// sections of both descriptions.
pub struct SdpManagerUnified {
    endpoint: Arc<Endpoint>,
    capabilities: Capabilities,
    weak_self: Weak<SdpManagerUnified>,
    internal: Mutex<SdpManagerUnifiedInternal>,
}

impl SdpManagerUnified {
    pub fn new(endpoint: Arc<Endpoint>, capabilities: Capabilities) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| SdpManagerUnified {
            endpoint,
            capabilities,
            weak_self: weak_self.clone(),
            internal: Mutex::new(SdpManagerUnifiedInternal {
                state: SdpManagerState::Initial,
                transport: None,
                local: None,
                remote: None,
                transceivers: vec![],
                pending: vec![],
                on_renegotiation: Listeners::new(),
            }),
        })
    }

    pub fn transceivers(&self) -> Vec<Transceiver> {
        lock(&self.internal).transceivers.clone()
    }

    /// Number of outgoing tracks still waiting for a media section.
    pub fn pending_tracks(&self) -> usize {
        lock(&self.internal).pending.len()
    }

    pub fn local_description(&self) -> Option<SessionInfo> {
        lock(&self.internal).local.clone()
    }

    pub fn remote_description(&self) -> Option<SessionInfo> {
        lock(&self.internal).remote.clone()
    }

    fn transition(&self, op: StateChangeOp) -> SdpManagerState {
        let mut internal = lock(&self.internal);
        let state = next_state(internal.state, op);
        debug!("unified: {} -> {} on {}", internal.state, state, op);
        internal.state = state;
        state
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

    /// Offer with one media section per capability, mids being the
    /// transceiver positions.
    fn initial_offer(&self) -> (SessionInfo, Vec<Transceiver>) {
        let mut offer = self.endpoint.create_offer(&Capabilities::new());
        let mut transceivers = vec![];
        for (kind, capability) in &self.capabilities {
            if *kind == MediaKind::Unspecified {
                continue;
            }
            let mid = transceivers.len().to_string();
            offer.add_media(MediaInfo::from_capability(&mid, *kind, capability));
            transceivers.push(Transceiver::new(&mid, *kind));
        }
        (offer, transceivers)
    }

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
        transport.on_outgoing_track(move |track, stream| {
            let Some(manager) = weak_self.upgrade() else {
                return;
            };
            lock(&manager.internal).pending.push(LocalTrack {
                track: Arc::clone(track),
                stream: stream.cloned(),
            });

            let weak_manager = weak_self.clone();
            track.on_stopped(move || {
                if let Some(manager) = weak_manager.upgrade() {
                    manager.renegotiate();
                }
            });
            manager.renegotiate();
        });

        lock(&self.internal).transport = Some(Arc::clone(&transport));
        Ok((transport, local))
    }

    /// Media section announced for a transceiver sending `kind`: the one
    /// carrying `mid`, or a copy of the first section of that kind.
    fn sending_media(&self, local: &SessionInfo, mid: &str, kind: MediaKind) -> Option<MediaInfo> {
        if let Some(media) = local.media_by_id(mid) {
            let mut media = media.clone();
            if media.direction != Direction::Sendrecv {
                media.direction = Direction::Sendonly;
            }
            return Some(media);
        }

        let mut media = match local.first_media(kind) {
            Some(template) => template.clone(),
            None => MediaInfo::from_capability(mid, kind, self.capabilities.get(&kind)?),
        };
        media.id = mid.to_owned();
        media.direction = Direction::Sendrecv;
        Some(media)
    }

    /// Binds the remote media section `media` to `transceiver`, starting
    /// or stopping the matching incoming track.
    fn apply_remote_media(transport: &Transport, remote: &SessionInfo, media: &MediaInfo, transceiver: &mut Transceiver) {
        let stream_info = remote.stream_by_media_id(&media.id);
        let track_info = remote.track_by_media_id(&media.id);

        let stream = stream_info.and_then(|s| transport.incoming_stream(&s.id));
        let track = match (&stream, track_info) {
            (Some(stream), Some(info)) => stream.track(&info.id),
            _ => None,
        };

        match media.direction {
            Direction::Sendrecv | Direction::Sendonly => {
                if let Some(bound) = &transceiver.remote {
                    if !track.as_ref().is_some_and(|t| Arc::ptr_eq(t, bound)) {
                        debug!("unified: mid {} replaces incoming track {}", media.id, bound.id());
                        bound.stop();
                    }
                }
                transceiver.remote = match (stream, stream_info, track_info) {
                    (_, _, None) => None,
                    (Some(_), _, _) if track.is_some() => track,
                    (Some(stream), _, Some(info)) => receive_track(&stream, info),
                    (None, Some(stream_info), Some(info)) => match transport.create_incoming_stream(stream_info) {
                        Ok(stream) => stream.track(&info.id),
                        Err(err) => {
                            warn!("unified: cannot receive stream {}: {}", stream_info.id, err);
                            None
                        }
                    },
                    (None, None, Some(_)) => None,
                };
            }
            Direction::Recvonly | Direction::Inactive => {
                if let Some(track) = track {
                    track.stop();
                }
                if let Some(bound) = transceiver.remote.take() {
                    debug!("unified: mid {} stops receiving track {}", media.id, bound.id());
                    bound.stop();
                }
            }
            Direction::Unspecified => {}
        }
    }
}

fn receive_track(stream: &IncomingStream, info: &TrackInfo) -> Option<Arc<IncomingStreamTrack>> {
    match stream.create_track(info) {
        Ok(track) => Some(track),
        Err(err) => {
            warn!("unified: cannot receive track {} of stream {}: {}", info.id, stream.id(), err);
            None
        }
    }
}

impl SdpManager for SdpManagerUnified {
    fn state(&self) -> SdpManagerState {
        lock(&self.internal).state
    }

    fn transport(&self) -> Option<Arc<Transport>> {
        lock(&self.internal).transport.clone()
    }

    fn create_local_description(&self) -> Result<SessionInfo> {
        let (mut local, mut transceivers) = {
            let mut internal = lock(&self.internal);
            let local = internal.local.take();
            let mut transceivers = std::mem::take(&mut internal.transceivers);

            // stopped tracks free their media section
            internal.pending.retain(|pending| !pending.track.is_stopped());
            for transceiver in &mut transceivers {
                if transceiver.local.as_ref().is_some_and(|l| l.track.is_stopped()) {
                    debug!("unified: mid {} stops sending", transceiver.mid);
                    transceiver.local = None;
                }
            }

            if internal.state.is_quiescent() {
                for pending in internal.pending.drain(..) {
                    let mid = transceivers.len().to_string();
                    let mut transceiver = Transceiver::new(&mid, pending.track.kind());
                    transceiver.local = Some(pending);
                    transceivers.push(transceiver);
                }
            }
            (local, transceivers)
        };

        if local.is_none() && transceivers.is_empty() {
            let (offer, created) = self.initial_offer();
            local = Some(offer);
            transceivers = created;
        }
        let mut local = match local {
            Some(local) => local,
            None => self.endpoint.create_offer(&Capabilities::new()),
        };

        local.remove_all_streams();
        for transceiver in &transceivers {
            match &transceiver.local {
                Some(sending) => {
                    let Some(media) = self.sending_media(&local, &transceiver.mid, transceiver.kind) else {
                        warn!("unified: no {} capability to send mid {}", transceiver.kind, transceiver.mid);
                        continue;
                    };
                    match local.media_by_id_mut(&media.id) {
                        Some(existing) => *existing = media,
                        None => local.add_media(media),
                    }

                    let stream_id = sending.stream_id();
                    if local.stream(&stream_id).is_none() {
                        local.add_stream(StreamInfo::new(&stream_id));
                    }
                    let mut track = sending.track.info();
                    track.media_id = Some(transceiver.mid.clone());
                    if let Some(stream) = local.stream_mut(&stream_id) {
                        stream.add_track(track);
                    }
                }
                None => {
                    if let Some(media) = local.media_by_id_mut(&transceiver.mid) {
                        media.direction = match media.direction {
                            Direction::Sendrecv => Direction::Recvonly,
                            Direction::Sendonly => Direction::Inactive,
                            direction => direction,
                        };
                    }
                }
            }
        }

        let pending = {
            let mut internal = lock(&self.internal);
            internal.local = Some(local.clone());
            internal.transceivers = transceivers;
            !internal.pending.is_empty()
        };
        self.transition(StateChangeOp::CreateLocal);

        if pending {
            self.renegotiate();
        }

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

        let local = match local {
            Some(local) if state == SdpManagerState::LocalOffer => local,
            _ => super::answer(&remote, &transport, &self.capabilities),
        };

        let mut transceivers = std::mem::take(&mut lock(&self.internal).transceivers);
        for (i, media) in remote.medias.iter().enumerate() {
            if i == transceivers.len() {
                transceivers.push(Transceiver::new(&media.id, media.kind));
            }
            Self::apply_remote_media(&transport, &remote, media, &mut transceivers[i]);
        }

        {
            let mut internal = lock(&self.internal);
            internal.transceivers = transceivers;
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
