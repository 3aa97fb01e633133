use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use log::{debug, warn};
use sdp::track::{SOURCE_GROUP_FEC_FR, SOURCE_GROUP_FID};
use sdp::{CandidateInfo, DtlsInfo, IceInfo, MediaInfo, MediaKind, SSRC, SourceGroupInfo, StreamInfo, TrackInfo};
use shared::error::{Error, Result};
use shared::util::math_rand_alpha_number;

use crate::dtls_state::DtlsState;
use crate::engine::{OnDtlsStateFn, SourceGroupSsrcs, TransportEngine};
use crate::listener::{ListenerId, Listeners, OnEventFn};
use crate::lock;
use crate::ssrc::SsrcAllocator;
use crate::stream::{IncomingStream, IncomingStreamTrack, OutgoingStream, OutgoingStreamTrack};

const GENERATED_TRACK_ID_LEN: usize = 16;

pub type OnTransportIncomingTrackFn =
    dyn Fn(&Arc<IncomingStreamTrack>, Option<&Arc<IncomingStream>>) + Send + Sync;
pub type OnTransportOutgoingTrackFn =
    dyn Fn(&Arc<OutgoingStreamTrack>, Option<&Arc<OutgoingStream>>) + Send + Sync;

/// ICE and DTLS parameters of both sides of a transport.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct TransportParameters {
    pub local_ice: IceInfo,
    pub local_dtls: DtlsInfo,
    pub local_candidates: Vec<CandidateInfo>,
    pub remote_ice: IceInfo,
    pub remote_dtls: DtlsInfo,
    pub remote_candidates: Vec<CandidateInfo>,
}

struct TransportInternal {
    params: TransportParameters,
    incoming_streams: BTreeMap<String, Arc<IncomingStream>>,
    outgoing_streams: BTreeMap<String, Arc<OutgoingStream>>,
    dtls_state: DtlsState,
    stopped: bool,
    on_stopped: Listeners<OnEventFn>,
    on_dtls_state: Listeners<OnDtlsStateFn>,
    on_incoming_track: Listeners<OnTransportIncomingTrackFn>,
    on_outgoing_track: Listeners<OnTransportOutgoingTrackFn>,
}

/// One ICE/DTLS connection with a remote peer and the streams flowing on it.
pub struct Transport {
    /// `local ufrag:remote ufrag`, identifies the transport inside the bundle
    username: String,
    engine: Arc<dyn TransportEngine>,
    ssrcs: Arc<SsrcAllocator>,
    weak_self: Weak<Transport>,
    internal: Mutex<TransportInternal>,
}

impl Transport {
    pub(crate) fn new(
        engine: Arc<dyn TransportEngine>,
        params: TransportParameters,
        ssrcs: Arc<SsrcAllocator>,
    ) -> Arc<Self> {
        let username = format!("{}:{}", params.local_ice.ufrag, params.remote_ice.ufrag);

        let mut remote_candidates = vec![];
        for candidate in &params.remote_candidates {
            match engine.add_remote_candidate(candidate) {
                Ok(()) => remote_candidates.push(candidate.clone()),
                Err(err) => warn!("transport {username}: ignoring remote candidate {candidate}: {err}"),
            }
        }

        let transport = Arc::new_cyclic(|weak_self| Transport {
            username,
            engine: Arc::clone(&engine),
            ssrcs,
            weak_self: weak_self.clone(),
            internal: Mutex::new(TransportInternal {
                params: TransportParameters {
                    remote_candidates,
                    ..params
                },
                incoming_streams: BTreeMap::new(),
                outgoing_streams: BTreeMap::new(),
                dtls_state: DtlsState::New,
                stopped: false,
                on_stopped: Listeners::new(),
                on_dtls_state: Listeners::new(),
                on_incoming_track: Listeners::new(),
                on_outgoing_track: Listeners::new(),
            }),
        });

        let weak_transport = Arc::downgrade(&transport);
        engine.on_dtls_state(Box::new(move |state| {
            if let Some(transport) = weak_transport.upgrade() {
                transport.set_dtls_state(state);
            }
        }));

        transport
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn check_running(&self) -> Result<()> {
        if lock(&self.internal).stopped {
            Err(Error::ErrClosed)
        } else {
            Ok(())
        }
    }

    pub fn dtls_state(&self) -> DtlsState {
        lock(&self.internal).dtls_state
    }

    /// Records a DTLS state reported by the engine, listeners only hear
    /// about changes of a running transport.
    fn set_dtls_state(&self, state: DtlsState) {
        let callbacks = {
            let mut internal = lock(&self.internal);
            if internal.stopped || internal.dtls_state == state {
                return;
            }
            internal.dtls_state = state;
            internal.on_dtls_state.snapshot()
        };
        debug!("transport {}: dtls state {state}", self.username);

        for f in callbacks {
            f(state);
        }
    }

    /// Pushes the remote codec tables negotiated for audio and video.
    pub fn set_remote_properties(&self, audio: Option<&MediaInfo>, video: Option<&MediaInfo>) -> Result<()> {
        self.check_running()?;
        self.engine.set_remote_properties(audio, video)
    }

    /// Pushes the local codec tables negotiated for audio and video.
    pub fn set_local_properties(&self, audio: Option<&MediaInfo>, video: Option<&MediaInfo>) -> Result<()> {
        self.check_running()?;
        self.engine.set_local_properties(audio, video)
    }

    pub fn local_ice(&self) -> IceInfo {
        lock(&self.internal).params.local_ice.clone()
    }

    pub fn local_dtls(&self) -> DtlsInfo {
        lock(&self.internal).params.local_dtls.clone()
    }

    pub fn local_candidates(&self) -> Vec<CandidateInfo> {
        lock(&self.internal).params.local_candidates.clone()
    }

    pub fn remote_ice(&self) -> IceInfo {
        lock(&self.internal).params.remote_ice.clone()
    }

    pub fn remote_dtls(&self) -> DtlsInfo {
        lock(&self.internal).params.remote_dtls.clone()
    }

    pub fn remote_candidates(&self) -> Vec<CandidateInfo> {
        lock(&self.internal).params.remote_candidates.clone()
    }

    /// Adds a trickled remote candidate. Candidates the engine rejects are not kept.
    pub fn add_remote_candidate(&self, candidate: CandidateInfo) -> Result<()> {
        self.check_running()?;
        self.engine.add_remote_candidate(&candidate)?;

        let mut internal = lock(&self.internal);
        if !internal.params.remote_candidates.contains(&candidate) {
            internal.params.remote_candidates.push(candidate);
        }
        Ok(())
    }

    /// Starts sending a stream described by `info`.
    pub fn create_outgoing_stream(&self, info: &StreamInfo) -> Result<Arc<OutgoingStream>> {
        {
            let internal = lock(&self.internal);
            if internal.stopped {
                return Err(Error::ErrClosed);
            }
            if internal.outgoing_streams.contains_key(&info.id) {
                return Err(Error::ErrStreamAlreadyExists(info.id.clone()));
            }
        }

        let stream = OutgoingStream::new(info, Arc::clone(&self.engine))?;

        let callbacks = {
            let mut internal = lock(&self.internal);
            internal
                .outgoing_streams
                .insert(stream.id().to_owned(), Arc::clone(&stream));
            internal.on_outgoing_track.snapshot()
        };

        let weak_self = self.weak_self.clone();
        let id = stream.id().to_owned();
        stream.on_stopped(move || {
            if let Some(transport) = weak_self.upgrade() {
                lock(&transport.internal).outgoing_streams.remove(&id);
            }
        });

        let weak_self = self.weak_self.clone();
        let weak_stream = Arc::downgrade(&stream);
        stream.on_track(move |track| {
            if let (Some(transport), Some(stream)) = (weak_self.upgrade(), weak_stream.upgrade()) {
                transport.emit_outgoing_track(track, Some(&stream));
            }
        });

        for track in stream.tracks() {
            for f in &callbacks {
                f(&track, Some(&stream));
            }
        }
        debug!("transport {}: outgoing stream {} created", self.username, stream.id());

        Ok(stream)
    }

    fn generated_track(&self, kind: MediaKind) -> Result<TrackInfo> {
        let mut track = TrackInfo::new(&math_rand_alpha_number(GENERATED_TRACK_ID_LEN), kind);
        track.add_ssrc(self.ssrcs.allocate()?);
        Ok(track)
    }

    /// Creates an outgoing stream with freshly allocated audio and/or video tracks.
    pub fn create_outgoing_stream_with_id(&self, id: &str, audio: bool, video: bool) -> Result<Arc<OutgoingStream>> {
        let mut info = StreamInfo::new(id);
        let mut allocated: Vec<SSRC> = vec![];
        for (wanted, kind) in [(audio, MediaKind::Audio), (video, MediaKind::Video)] {
            if !wanted {
                continue;
            }
            let track = match self.generated_track(kind) {
                Ok(track) => track,
                Err(err) => {
                    self.release_ssrcs(&allocated);
                    return Err(err);
                }
            };
            allocated.extend(&track.ssrcs);
            info.add_track(track);
        }

        match self.create_outgoing_stream(&info) {
            Ok(stream) => {
                for track in stream.tracks() {
                    self.release_on_stop(&track, track.ssrcs());
                }
                Ok(stream)
            }
            Err(err) => {
                self.release_ssrcs(&allocated);
                Err(err)
            }
        }
    }

    /// Creates an outgoing track outside of any stream.
    ///
    /// SSRCs not given in `ssrcs` are allocated, media, rtx and fec alike.
    pub fn create_outgoing_stream_track(
        &self,
        kind: MediaKind,
        id: Option<&str>,
        ssrcs: SourceGroupSsrcs,
    ) -> Result<Arc<OutgoingStreamTrack>> {
        self.check_running()?;

        let mut allocated = vec![];
        let mut filled = SourceGroupSsrcs::default();
        for (given, slot) in [
            (ssrcs.media, &mut filled.media),
            (ssrcs.rtx, &mut filled.rtx),
            (ssrcs.fec, &mut filled.fec),
        ] {
            let ssrc = match given {
                Some(ssrc) => ssrc,
                None => match self.ssrcs.allocate() {
                    Ok(ssrc) => {
                        allocated.push(ssrc);
                        ssrc
                    }
                    Err(err) => {
                        self.release_ssrcs(&allocated);
                        return Err(err);
                    }
                },
            };
            *slot = Some(ssrc);
        }

        let id = match id {
            Some(id) => id.to_owned(),
            None => math_rand_alpha_number(GENERATED_TRACK_ID_LEN),
        };
        let info = track_info_from_ssrcs(&id, kind, &filled);

        let track = match OutgoingStreamTrack::create(&info, Arc::clone(&self.engine)) {
            Ok(track) => track,
            Err(err) => {
                self.release_ssrcs(&allocated);
                return Err(err);
            }
        };
        self.release_on_stop(&track, SourceGroupSsrcs {
            media: filled.media.filter(|s| allocated.contains(s)),
            rtx: filled.rtx.filter(|s| allocated.contains(s)),
            fec: filled.fec.filter(|s| allocated.contains(s)),
        });

        self.emit_outgoing_track(&track, None);
        Ok(track)
    }

    fn release_on_stop(&self, track: &Arc<OutgoingStreamTrack>, ssrcs: SourceGroupSsrcs) {
        let allocator = Arc::clone(&self.ssrcs);
        track.on_stopped(move || {
            for ssrc in ssrcs.all() {
                allocator.release(ssrc);
            }
        });
    }

    fn release_ssrcs(&self, ssrcs: &[SSRC]) {
        for ssrc in ssrcs {
            self.ssrcs.release(*ssrc);
        }
    }

    fn emit_outgoing_track(&self, track: &Arc<OutgoingStreamTrack>, stream: Option<&Arc<OutgoingStream>>) {
        let callbacks = lock(&self.internal).on_outgoing_track.snapshot();
        for f in callbacks {
            f(track, stream);
        }
    }

    fn emit_incoming_track(&self, track: &Arc<IncomingStreamTrack>, stream: Option<&Arc<IncomingStream>>) {
        let callbacks = lock(&self.internal).on_incoming_track.snapshot();
        for f in callbacks {
            f(track, stream);
        }
    }

    /// Starts receiving a stream described by `info`.
    pub fn create_incoming_stream(&self, info: &StreamInfo) -> Result<Arc<IncomingStream>> {
        {
            let internal = lock(&self.internal);
            if internal.stopped {
                return Err(Error::ErrClosed);
            }
            if internal.incoming_streams.contains_key(&info.id) {
                return Err(Error::ErrStreamAlreadyExists(info.id.clone()));
            }
        }

        let stream = IncomingStream::new(info, Arc::clone(&self.engine))?;
        lock(&self.internal)
            .incoming_streams
            .insert(stream.id().to_owned(), Arc::clone(&stream));

        let weak_self = self.weak_self.clone();
        let id = stream.id().to_owned();
        stream.on_stopped(move || {
            if let Some(transport) = weak_self.upgrade() {
                lock(&transport.internal).incoming_streams.remove(&id);
            }
        });

        let weak_self = self.weak_self.clone();
        let weak_stream = Arc::downgrade(&stream);
        stream.on_track(move |track| {
            if let (Some(transport), Some(stream)) = (weak_self.upgrade(), weak_stream.upgrade()) {
                transport.emit_incoming_track(track, Some(&stream));
            }
        });

        for track in stream.tracks() {
            self.emit_incoming_track(&track, Some(&stream));
        }
        debug!("transport {}: incoming stream {} created", self.username, stream.id());

        Ok(stream)
    }

    /// Starts receiving a single track outside of any stream.
    pub fn create_incoming_stream_track(
        &self,
        kind: MediaKind,
        id: Option<&str>,
        ssrcs: SourceGroupSsrcs,
    ) -> Result<Arc<IncomingStreamTrack>> {
        self.check_running()?;

        let id = match id {
            Some(id) => id.to_owned(),
            None => math_rand_alpha_number(GENERATED_TRACK_ID_LEN),
        };
        let info = track_info_from_ssrcs(&id, kind, &ssrcs);
        let track = IncomingStreamTrack::create(&info, Arc::clone(&self.engine))?;

        self.emit_incoming_track(&track, None);
        Ok(track)
    }

    /// Forgets `id` without stopping it.
    pub fn remove_incoming_stream(&self, id: &str) -> Option<Arc<IncomingStream>> {
        lock(&self.internal).incoming_streams.remove(id)
    }

    pub fn incoming_streams(&self) -> Vec<Arc<IncomingStream>> {
        lock(&self.internal).incoming_streams.values().cloned().collect()
    }

    pub fn incoming_stream(&self, id: &str) -> Option<Arc<IncomingStream>> {
        lock(&self.internal).incoming_streams.get(id).cloned()
    }

    pub fn outgoing_streams(&self) -> Vec<Arc<OutgoingStream>> {
        lock(&self.internal).outgoing_streams.values().cloned().collect()
    }

    pub fn outgoing_stream(&self, id: &str) -> Option<Arc<OutgoingStream>> {
        lock(&self.internal).outgoing_streams.get(id).cloned()
    }

    pub fn on_stopped<F>(&self, f: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.internal).on_stopped.add(Arc::new(f))
    }

    pub fn on_dtls_state<F>(&self, f: F) -> ListenerId
    where
        F: Fn(DtlsState) + Send + Sync + 'static,
    {
        lock(&self.internal).on_dtls_state.add(Arc::new(f))
    }

    pub fn remove_dtls_state_listener(&self, id: ListenerId) -> bool {
        lock(&self.internal).on_dtls_state.remove(id)
    }

    pub fn on_incoming_track<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&Arc<IncomingStreamTrack>, Option<&Arc<IncomingStream>>) + Send + Sync + 'static,
    {
        lock(&self.internal).on_incoming_track.add(Arc::new(f))
    }

    pub fn on_outgoing_track<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&Arc<OutgoingStreamTrack>, Option<&Arc<OutgoingStream>>) + Send + Sync + 'static,
    {
        lock(&self.internal).on_outgoing_track.add(Arc::new(f))
    }

    pub fn is_stopped(&self) -> bool {
        lock(&self.internal).stopped
    }

    /// Stops every stream and the engine transport. Idempotent.
    ///
    /// The DTLS state reads `closed` afterwards, without notification.
    pub fn stop(&self) {
        let (incoming, outgoing, callbacks) = {
            let mut internal = lock(&self.internal);
            if internal.stopped {
                return;
            }
            internal.stopped = true;
            internal.dtls_state = DtlsState::Closed;
            internal.on_dtls_state.take();
            internal.on_incoming_track.take();
            internal.on_outgoing_track.take();
            (
                std::mem::take(&mut internal.incoming_streams),
                std::mem::take(&mut internal.outgoing_streams),
                internal.on_stopped.take(),
            )
        };

        for stream in incoming.values() {
            stream.stop();
        }
        for stream in outgoing.values() {
            stream.stop();
        }
        self.engine.stop();
        debug!("transport {} stopped", self.username);

        for f in callbacks {
            f();
        }
    }
}

/// Track description announcing `ssrcs` with their FID and FEC-FR groups.
fn track_info_from_ssrcs(id: &str, kind: MediaKind, ssrcs: &SourceGroupSsrcs) -> TrackInfo {
    let mut info = TrackInfo::new(id, kind);
    for ssrc in ssrcs.all() {
        info.add_ssrc(ssrc);
    }
    if let Some(media) = ssrcs.media {
        if let Some(rtx) = ssrcs.rtx {
            info.add_source_group(SourceGroupInfo::new(SOURCE_GROUP_FID, vec![media, rtx]));
        }
        if let Some(fec) = ssrcs.fec {
            info.add_source_group(SourceGroupInfo::new(SOURCE_GROUP_FEC_FR, vec![media, fec]));
        }
    }
    info
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_track_info_from_ssrcs() {
        let info = track_info_from_ssrcs("t", MediaKind::Video, &SourceGroupSsrcs::new(1).with_rtx(2).with_fec(3));
        assert_eq!(info.ssrcs, vec![1, 2, 3]);
        assert_eq!(info.source_group_for(SOURCE_GROUP_FID, 1).and_then(|g| g.secondary()), Some(2));
        assert_eq!(info.source_group_for(SOURCE_GROUP_FEC_FR, 1).and_then(|g| g.secondary()), Some(3));

        let info = track_info_from_ssrcs("t", MediaKind::Audio, &SourceGroupSsrcs::new(4));
        assert_eq!(info.ssrcs, vec![4]);
        assert!(info.groups.is_empty());
    }
}
