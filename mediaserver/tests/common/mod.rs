#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mediaserver::engine::{
    Bundle, IncomingSource, IncomingSourceGroup, LayerStats, OnDtlsStateFn, OutgoingSource,
    OutgoingSourceGroup, OutgoingSourceStats, TransponderEngine, TransportEngine,
};
use mediaserver::{DtlsState, Endpoint};
use sdp::{CandidateInfo, Capabilities, Capability, DtlsInfo, IceInfo, MediaInfo, MediaKind, RtcpFeedbackInfo, SSRC};
use shared::error::Result;

pub const FINGERPRINT: &str =
    "5C:4E:65:9C:0F:2A:6F:12:6A:95:77:83:19:2F:AE:39:33:45:9C:2E:75:52:60:2B:E7:42:5D:7A:2E:80:38:E1";

pub fn init_log() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init()
        .ok();
}

pub fn capabilities() -> Capabilities {
    let mut capabilities = Capabilities::new();
    capabilities.insert(
        MediaKind::Audio,
        Capability {
            codecs: vec!["opus".to_owned()],
            ..Default::default()
        },
    );
    capabilities.insert(
        MediaKind::Video,
        Capability {
            codecs: vec!["vp8".to_owned(), "h264;packetization-mode=1".to_owned()],
            rtx: true,
            rtcpfbs: vec![
                RtcpFeedbackInfo::new("goog-remb", &[]),
                RtcpFeedbackInfo::new("transport-cc", &[]),
                RtcpFeedbackInfo::new("ccm", &["fir"]),
                RtcpFeedbackInfo::new("nack", &[]),
                RtcpFeedbackInfo::new("nack", &["pli"]),
            ],
            extensions: vec![
                "urn:ietf:params:rtp-hdrext:sdes:mid".to_owned(),
                "urn:ietf:params:rtp-hdrext:sdes:rtp-stream-id".to_owned(),
            ],
            simulcast: true,
        },
    );
    capabilities
}

/// Command received by a [`FakeTransponder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransponderCall {
    /// true when a source was given
    SetIncoming(bool),
    SelectLayer(u8, u8),
    Mute(bool),
    Close,
}

pub type TransponderCalls = Arc<Mutex<Vec<TransponderCall>>>;

pub struct FakeTransponder {
    calls: TransponderCalls,
}

impl TransponderEngine for FakeTransponder {
    fn set_incoming(&mut self, source: Option<Arc<dyn IncomingSource>>) {
        self.calls.lock().unwrap().push(TransponderCall::SetIncoming(source.is_some()));
    }

    fn select_layer(&mut self, spatial_layer_id: u8, temporal_layer_id: u8) {
        self.calls
            .lock()
            .unwrap()
            .push(TransponderCall::SelectLayer(spatial_layer_id, temporal_layer_id));
    }

    fn mute(&mut self, muting: bool) {
        self.calls.lock().unwrap().push(TransponderCall::Mute(muting));
    }

    fn close(&mut self) {
        self.calls.lock().unwrap().push(TransponderCall::Close);
    }
}

/// Creates a transponder engine recording its commands.
pub fn fake_transponder() -> (Box<dyn TransponderEngine>, TransponderCalls) {
    let calls = TransponderCalls::default();
    (
        Box::new(FakeTransponder {
            calls: Arc::clone(&calls),
        }),
        calls,
    )
}

pub struct FakeIncomingSource {
    pub group: IncomingSourceGroup,
    bitrate: AtomicU64,
    layers: Mutex<Vec<LayerStats>>,
    attached: AtomicUsize,
    detached: AtomicUsize,
    key_frames: AtomicUsize,
}

impl FakeIncomingSource {
    fn new(group: IncomingSourceGroup) -> Self {
        FakeIncomingSource {
            group,
            bitrate: AtomicU64::new(0),
            layers: Mutex::new(vec![]),
            attached: AtomicUsize::new(0),
            detached: AtomicUsize::new(0),
            key_frames: AtomicUsize::new(0),
        }
    }

    pub fn set_bitrate(&self, bitrate: u64) {
        self.bitrate.store(bitrate, Ordering::SeqCst);
    }

    pub fn set_layers(&self, layers: Vec<LayerStats>) {
        *self.layers.lock().unwrap() = layers;
    }

    pub fn attached_count(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn detached_count(&self) -> usize {
        self.detached.load(Ordering::SeqCst)
    }

    pub fn key_frames(&self) -> usize {
        self.key_frames.load(Ordering::SeqCst)
    }
}

impl IncomingSource for FakeIncomingSource {
    fn bitrate(&self) -> u64 {
        self.bitrate.load(Ordering::SeqCst)
    }

    fn layers(&self) -> Vec<LayerStats> {
        self.layers.lock().unwrap().clone()
    }

    fn request_key_frame(&self) {
        self.key_frames.fetch_add(1, Ordering::SeqCst);
    }

    fn attached(&self) {
        self.attached.fetch_add(1, Ordering::SeqCst);
    }

    fn detached(&self) {
        self.detached.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeOutgoingSource {
    pub group: OutgoingSourceGroup,
    calls: TransponderCalls,
    stats: Mutex<OutgoingSourceStats>,
}

impl FakeOutgoingSource {
    pub fn set_stats(&self, stats: OutgoingSourceStats) {
        *self.stats.lock().unwrap() = stats;
    }
}

impl OutgoingSource for FakeOutgoingSource {
    fn create_transponder(&self) -> Box<dyn TransponderEngine> {
        Box::new(FakeTransponder {
            calls: Arc::clone(&self.calls),
        })
    }

    fn stats(&self) -> OutgoingSourceStats {
        *self.stats.lock().unwrap()
    }
}

type Properties = (Option<MediaInfo>, Option<MediaInfo>);

#[derive(Default)]
pub struct FakeTransportEngine {
    incoming: Mutex<Vec<Arc<FakeIncomingSource>>>,
    outgoing: Mutex<Vec<Arc<FakeOutgoingSource>>>,
    local_properties: Mutex<Option<Properties>>,
    remote_properties: Mutex<Option<Properties>>,
    candidates: Mutex<Vec<CandidateInfo>>,
    dtls_state_handler: Mutex<Option<Box<OnDtlsStateFn>>>,
    stopped: AtomicBool,
}

impl FakeTransportEngine {
    /// Source registered for the media SSRC `ssrc`.
    pub fn incoming_source(&self, ssrc: SSRC) -> Option<Arc<FakeIncomingSource>> {
        self.incoming
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.group.ssrcs.media == Some(ssrc))
            .cloned()
    }

    pub fn incoming_sources(&self) -> Vec<Arc<FakeIncomingSource>> {
        self.incoming.lock().unwrap().clone()
    }

    pub fn outgoing_sources(&self) -> Vec<Arc<FakeOutgoingSource>> {
        self.outgoing.lock().unwrap().clone()
    }

    /// Commands sent to the transponders of the outgoing source `ssrc`.
    pub fn transponder_calls(&self, ssrc: SSRC) -> Option<TransponderCalls> {
        self.outgoing
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.group.ssrcs.media == Some(ssrc))
            .map(|s| Arc::clone(&s.calls))
    }

    pub fn local_properties(&self) -> Option<Properties> {
        self.local_properties.lock().unwrap().clone()
    }

    pub fn remote_properties(&self) -> Option<Properties> {
        self.remote_properties.lock().unwrap().clone()
    }

    pub fn candidates(&self) -> Vec<CandidateInfo> {
        self.candidates.lock().unwrap().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Reports `state` the way the DTLS stack of an engine would.
    pub fn report_dtls_state(&self, state: DtlsState) {
        if let Some(f) = self.dtls_state_handler.lock().unwrap().as_ref() {
            f(state);
        }
    }
}

impl TransportEngine for FakeTransportEngine {
    fn set_local_properties(&self, audio: Option<&MediaInfo>, video: Option<&MediaInfo>) -> Result<()> {
        *self.local_properties.lock().unwrap() = Some((audio.cloned(), video.cloned()));
        Ok(())
    }

    fn set_remote_properties(&self, audio: Option<&MediaInfo>, video: Option<&MediaInfo>) -> Result<()> {
        *self.remote_properties.lock().unwrap() = Some((audio.cloned(), video.cloned()));
        Ok(())
    }

    fn add_remote_candidate(&self, candidate: &CandidateInfo) -> Result<()> {
        if candidate.transport.eq_ignore_ascii_case("tcp") {
            return Err(shared::error::Error::ErrInvalidArgument("tcp candidates are not supported".to_owned()));
        }
        self.candidates.lock().unwrap().push(candidate.clone());
        Ok(())
    }

    fn add_incoming_source_group(&self, group: &IncomingSourceGroup) -> Result<Arc<dyn IncomingSource>> {
        let source = Arc::new(FakeIncomingSource::new(group.clone()));
        self.incoming.lock().unwrap().push(Arc::clone(&source));
        Ok(source)
    }

    fn remove_incoming_source_group(&self, group: &IncomingSourceGroup) {
        self.incoming.lock().unwrap().retain(|s| &s.group != group);
    }

    fn add_outgoing_source_group(&self, group: &OutgoingSourceGroup) -> Result<Arc<dyn OutgoingSource>> {
        let source = Arc::new(FakeOutgoingSource {
            group: group.clone(),
            calls: TransponderCalls::default(),
            stats: Mutex::new(OutgoingSourceStats::default()),
        });
        self.outgoing.lock().unwrap().push(Arc::clone(&source));
        Ok(source)
    }

    fn remove_outgoing_source_group(&self, group: &OutgoingSourceGroup) {
        self.outgoing.lock().unwrap().retain(|s| &s.group != group);
    }

    fn on_dtls_state(&self, f: Box<OnDtlsStateFn>) {
        *self.dtls_state_handler.lock().unwrap() = Some(f);
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeBundle {
    transports: Mutex<Vec<Arc<FakeTransportEngine>>>,
}

impl FakeBundle {
    /// Engine transports created so far, in creation order.
    pub fn transports(&self) -> Vec<Arc<FakeTransportEngine>> {
        self.transports.lock().unwrap().clone()
    }

    pub fn last_transport(&self) -> Option<Arc<FakeTransportEngine>> {
        self.transports.lock().unwrap().last().cloned()
    }
}

impl Bundle for FakeBundle {
    fn create_transport(
        &self,
        _remote_ice: &IceInfo,
        _remote_dtls: &DtlsInfo,
        _local_ice: &IceInfo,
        _local_dtls: &DtlsInfo,
    ) -> Result<Arc<dyn TransportEngine>> {
        let transport = Arc::new(FakeTransportEngine::default());
        self.transports.lock().unwrap().push(Arc::clone(&transport));
        Ok(transport)
    }

    fn local_candidates(&self) -> Vec<CandidateInfo> {
        vec![CandidateInfo::new("1", 1, "udp", 2130706431, "127.0.0.1", 5000, "host")]
    }

    fn dtls_fingerprint(&self) -> String {
        FINGERPRINT.to_owned()
    }
}

/// Endpoint backed by a fresh fake bundle.
pub fn endpoint() -> (Arc<Endpoint>, Arc<FakeBundle>) {
    let bundle = Arc::new(FakeBundle::default());
    let endpoint = Arc::new(Endpoint::new(Arc::clone(&bundle) as Arc<dyn Bundle>));
    (endpoint, bundle)
}
