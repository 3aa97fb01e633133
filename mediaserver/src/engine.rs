//! Contract between the negotiation core and the media engine.
//!
//! The engine owns sockets, ICE/DTLS, RTP packetization and bandwidth
//! estimation. The core only configures it through these traits, every call
//! is expected to return immediately.

use std::sync::Arc;

use sdp::{CandidateInfo, DtlsInfo, IceInfo, MediaInfo, MediaKind, SSRC};
use shared::error::Result;

use crate::dtls_state::DtlsState;

/// Layer id meaning "no layer information" or "unbounded" in maxima.
pub const MAX_LAYER_ID: u8 = 0xFF;

/// Statistics of one spatial/temporal layer of an incoming encoding.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct LayerStats {
    pub spatial_layer_id: u8,
    pub temporal_layer_id: u8,
    pub total_bytes: u64,
    pub num_packets: u64,
    /// bits per second
    pub bitrate: u64,
}

impl LayerStats {
    pub fn new(spatial_layer_id: u8, temporal_layer_id: u8, bitrate: u64) -> Self {
        LayerStats {
            spatial_layer_id,
            temporal_layer_id,
            bitrate,
            ..Default::default()
        }
    }
}

/// Counters of one received encoding.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct IncomingSourceStats {
    pub lost_packets: u64,
    pub dropped_packets: u64,
    pub num_packets: u64,
    pub num_rtcp_packets: u64,
    pub total_bytes: u64,
    pub total_rtcp_bytes: u64,
    pub total_plis: u64,
    pub total_nacks: u64,
    /// bits per second
    pub bitrate: u64,
}

/// Counters of one sent track.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct OutgoingSourceStats {
    pub num_packets: u64,
    pub num_rtcp_packets: u64,
    pub total_bytes: u64,
    pub total_rtcp_bytes: u64,
    /// bits per second
    pub bitrate: u64,
}

/// SSRCs of one RTP source: the media stream plus its repair streams.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SourceGroupSsrcs {
    /// None while the SSRC is still to be learned from a RID/MID header extension
    pub media: Option<SSRC>,
    pub rtx: Option<SSRC>,
    pub fec: Option<SSRC>,
}

impl SourceGroupSsrcs {
    pub fn new(media: SSRC) -> Self {
        SourceGroupSsrcs {
            media: Some(media),
            ..Default::default()
        }
    }

    pub fn with_rtx(mut self, rtx: SSRC) -> Self {
        self.rtx = Some(rtx);
        self
    }

    pub fn with_fec(mut self, fec: SSRC) -> Self {
        self.fec = Some(fec);
        self
    }

    /// All SSRCs that are set, media first.
    pub fn all(&self) -> Vec<SSRC> {
        [self.media, self.rtx, self.fec].into_iter().flatten().collect()
    }
}

/// Source group the engine demultiplexes received packets into.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct IncomingSourceGroup {
    pub kind: MediaKind,
    pub mid: Option<String>,
    pub rid: Option<String>,
    pub ssrcs: SourceGroupSsrcs,
}

/// Source group the engine sends packets from.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct OutgoingSourceGroup {
    pub kind: MediaKind,
    pub ssrcs: SourceGroupSsrcs,
}

/// Engine side of one received encoding.
pub trait IncomingSource: Send + Sync {
    /// Current bitrate of the whole encoding in bits per second.
    fn bitrate(&self) -> u64;

    /// Active spatial/temporal layers, empty when the codec is not scalable.
    fn layers(&self) -> Vec<LayerStats>;

    /// Asks the sender for a key frame (PLI).
    fn request_key_frame(&self);

    /// Packet counters, only the bitrate is known by default.
    fn stats(&self) -> IncomingSourceStats {
        IncomingSourceStats {
            bitrate: self.bitrate(),
            ..Default::default()
        }
    }

    /// The encoding got its first consumer.
    fn attached(&self) {}

    /// The encoding lost its last consumer.
    fn detached(&self) {}
}

/// Engine side of one sent track.
pub trait OutgoingSource: Send + Sync {
    fn create_transponder(&self) -> Box<dyn TransponderEngine>;

    fn stats(&self) -> OutgoingSourceStats {
        OutgoingSourceStats::default()
    }
}

/// Engine resource rewriting packets of an incoming source onto an outgoing one.
pub trait TransponderEngine: Send {
    /// Switches the forwarded encoding, None stops forwarding.
    fn set_incoming(&mut self, source: Option<Arc<dyn IncomingSource>>);

    fn select_layer(&mut self, spatial_layer_id: u8, temporal_layer_id: u8);

    fn mute(&mut self, muting: bool);

    fn close(&mut self);
}

pub type OnDtlsStateFn = dyn Fn(DtlsState) + Send + Sync;

/// One ICE/DTLS transport inside the engine.
pub trait TransportEngine: Send + Sync {
    /// Pushes the negotiated local codec and extension tables.
    fn set_local_properties(&self, audio: Option<&MediaInfo>, video: Option<&MediaInfo>) -> Result<()>;

    /// Pushes the negotiated remote codec and extension tables.
    fn set_remote_properties(&self, audio: Option<&MediaInfo>, video: Option<&MediaInfo>) -> Result<()>;

    fn add_remote_candidate(&self, candidate: &CandidateInfo) -> Result<()>;

    fn add_incoming_source_group(&self, group: &IncomingSourceGroup) -> Result<Arc<dyn IncomingSource>>;

    fn remove_incoming_source_group(&self, group: &IncomingSourceGroup);

    fn add_outgoing_source_group(&self, group: &OutgoingSourceGroup) -> Result<Arc<dyn OutgoingSource>>;

    fn remove_outgoing_source_group(&self, group: &OutgoingSourceGroup);

    /// Registers the handler the engine calls on every DTLS state change,
    /// replacing the previous one. Engines that never report keep the
    /// transport in `new`.
    fn on_dtls_state(&self, _f: Box<OnDtlsStateFn>) {}

    fn stop(&self);
}

/// Shared UDP socket multiplexing every transport of an endpoint.
pub trait Bundle: Send + Sync {
    fn create_transport(
        &self,
        remote_ice: &IceInfo,
        remote_dtls: &DtlsInfo,
        local_ice: &IceInfo,
        local_dtls: &DtlsInfo,
    ) -> Result<Arc<dyn TransportEngine>>;

    /// Host candidates the bundle listens on.
    fn local_candidates(&self) -> Vec<CandidateInfo>;

    /// sha-256 fingerprint of the local DTLS certificate.
    fn dtls_fingerprint(&self) -> String;
}
