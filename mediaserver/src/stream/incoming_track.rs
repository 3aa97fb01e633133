use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use sdp::track::{SOURCE_GROUP_FEC_FR, SOURCE_GROUP_FID, SOURCE_GROUP_SIM};
use sdp::{MediaKind, SSRC, TrackInfo};
use shared::error::{Error, Result};

use crate::engine::{
    IncomingSource, IncomingSourceGroup, IncomingSourceStats, LayerStats, MAX_LAYER_ID,
    SourceGroupSsrcs, TransportEngine,
};
use crate::listener::{ListenerId, Listeners, OnEventFn};
use crate::lock;

/// One received encoding of a track.
///
/// Simulcast tracks have one encoding per RID (or per `SIM` SSRC), plain
/// tracks a single encoding with an empty id.
pub struct TrackEncoding {
    id: String,
    group: IncomingSourceGroup,
    source: Arc<dyn IncomingSource>,
}

impl TrackEncoding {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn group(&self) -> &IncomingSourceGroup {
        &self.group
    }

    pub fn source(&self) -> &Arc<dyn IncomingSource> {
        &self.source
    }
}

/// Encoding entry of an [`ActiveLayers`] snapshot.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ActiveEncoding {
    pub id: String,
    pub simulcast_index: usize,
    pub bitrate: u64,
    pub layers: Vec<LayerStats>,
}

/// One selectable {encoding, spatial, temporal} combination.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ActiveLayer {
    pub encoding_id: String,
    pub simulcast_index: usize,
    pub spatial_layer_id: u8,
    pub temporal_layer_id: u8,
    pub bitrate: u64,
}

/// Snapshot of what an incoming track is currently receiving.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ActiveLayers {
    pub encodings: Vec<ActiveEncoding>,
    /// every layer of every active encoding, encodings without SVC layers
    /// contribute a single entry with [`MAX_LAYER_ID`] ids
    pub layers: Vec<ActiveLayer>,
    /// ids of encodings not receiving anything
    pub inactive: Vec<String>,
}

fn repair_ssrcs(info: &TrackInfo, media: SSRC) -> SourceGroupSsrcs {
    SourceGroupSsrcs {
        media: Some(media),
        rtx: info
            .source_group_for(SOURCE_GROUP_FID, media)
            .and_then(|g| g.secondary()),
        fec: info
            .source_group_for(SOURCE_GROUP_FEC_FR, media)
            .and_then(|g| g.secondary()),
    }
}

/// Source groups needed to receive `info`, keyed by encoding id.
///
/// Encodings come from the RIDs announced for the track, then from a
/// legacy `SIM` group, and otherwise the first SSRC forms the only encoding.
pub(crate) fn source_groups(info: &TrackInfo) -> Result<Vec<(String, IncomingSourceGroup)>> {
    let mut groups = vec![];

    if info.has_encodings() {
        for encoding in info.encodings.iter().flatten() {
            let ssrcs = match encoding.param("ssrc") {
                Some(raw) => match raw.parse::<SSRC>() {
                    Ok(ssrc) => repair_ssrcs(info, ssrc),
                    Err(err) => {
                        warn!("track {} encoding {}: invalid ssrc {raw}: {err}", info.id, encoding.id);
                        continue;
                    }
                },
                None => SourceGroupSsrcs::default(),
            };
            groups.push((
                encoding.id.clone(),
                IncomingSourceGroup {
                    kind: info.kind,
                    mid: info.media_id.clone(),
                    rid: Some(encoding.id.clone()),
                    ssrcs,
                },
            ));
        }
    } else if let Some(sim) = info.source_group(SOURCE_GROUP_SIM) {
        for (i, ssrc) in sim.ssrcs.iter().enumerate() {
            groups.push((
                i.to_string(),
                IncomingSourceGroup {
                    kind: info.kind,
                    mid: info.media_id.clone(),
                    rid: None,
                    ssrcs: repair_ssrcs(info, *ssrc),
                },
            ));
        }
    } else {
        let Some(media) = info.ssrcs.first() else {
            return Err(Error::ErrTrackWithoutSsrc(info.id.clone()));
        };
        let ssrcs = SourceGroupSsrcs {
            media: Some(*media),
            rtx: info.source_group(SOURCE_GROUP_FID).and_then(|g| g.secondary()),
            fec: info.source_group(SOURCE_GROUP_FEC_FR).and_then(|g| g.secondary()),
        };
        groups.push((
            String::new(),
            IncomingSourceGroup {
                kind: info.kind,
                mid: info.media_id.clone(),
                rid: None,
                ssrcs,
            },
        ));
    }

    Ok(groups)
}

struct IncomingStreamTrackInternal {
    encodings: Vec<Arc<TrackEncoding>>,
    counter: usize,
    stopped: bool,
    on_attached: Listeners<OnEventFn>,
    on_detached: Listeners<OnEventFn>,
    on_stopped: Listeners<OnEventFn>,
}

/// A track received from the remote peer.
///
/// The attach counter tracks how many outgoing tracks forward this one, the
/// engine is told when it gains its first and loses its last consumer.
pub struct IncomingStreamTrack {
    id: String,
    kind: MediaKind,
    info: TrackInfo,
    transport: Arc<dyn TransportEngine>,
    internal: Mutex<IncomingStreamTrackInternal>,
}

impl IncomingStreamTrack {
    /// Registers the source groups of `info` with the engine and wraps them.
    pub(crate) fn create(info: &TrackInfo, transport: Arc<dyn TransportEngine>) -> Result<Arc<Self>> {
        let mut encodings = vec![];
        for (id, group) in source_groups(info)? {
            match transport.add_incoming_source_group(&group) {
                Ok(source) => encodings.push(Arc::new(TrackEncoding { id, group, source })),
                Err(err) => {
                    for encoding in &encodings {
                        transport.remove_incoming_source_group(&encoding.group);
                    }
                    return Err(err);
                }
            }
        }
        debug!("incoming track {} created with {} encodings", info.id, encodings.len());

        Ok(Arc::new(IncomingStreamTrack {
            id: info.id.clone(),
            kind: info.kind,
            info: info.clone(),
            transport,
            internal: Mutex::new(IncomingStreamTrackInternal {
                encodings,
                counter: 0,
                stopped: false,
                on_attached: Listeners::new(),
                on_detached: Listeners::new(),
                on_stopped: Listeners::new(),
            }),
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn media_id(&self) -> Option<&str> {
        self.info.media_id.as_deref()
    }

    /// Description of the track as negotiated.
    pub fn info(&self) -> TrackInfo {
        self.info.clone()
    }

    pub fn encodings(&self) -> Vec<Arc<TrackEncoding>> {
        lock(&self.internal).encodings.clone()
    }

    pub fn encoding(&self, id: &str) -> Option<Arc<TrackEncoding>> {
        lock(&self.internal)
            .encodings
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub fn ssrcs(&self) -> Vec<SourceGroupSsrcs> {
        lock(&self.internal)
            .encodings
            .iter()
            .map(|e| e.group.ssrcs)
            .collect()
    }

    /// Queries the engine for the layers currently received.
    pub fn active_layers(&self) -> ActiveLayers {
        let encodings = self.encodings();

        let mut active = ActiveLayers::default();
        for (simulcast_index, encoding) in encodings.iter().enumerate() {
            let bitrate = encoding.source.bitrate();
            if bitrate == 0 {
                active.inactive.push(encoding.id.clone());
                continue;
            }

            let layers = encoding.source.layers();
            if layers.is_empty() {
                active.layers.push(ActiveLayer {
                    encoding_id: encoding.id.clone(),
                    simulcast_index,
                    spatial_layer_id: MAX_LAYER_ID,
                    temporal_layer_id: MAX_LAYER_ID,
                    bitrate,
                });
            }
            for layer in &layers {
                active.layers.push(ActiveLayer {
                    encoding_id: encoding.id.clone(),
                    simulcast_index,
                    spatial_layer_id: layer.spatial_layer_id,
                    temporal_layer_id: layer.temporal_layer_id,
                    bitrate: layer.bitrate,
                });
            }

            active.encodings.push(ActiveEncoding {
                id: encoding.id.clone(),
                simulcast_index,
                bitrate,
                layers,
            });
        }
        active
    }

    /// Engine counters of every encoding, keyed by encoding id.
    pub fn stats(&self) -> BTreeMap<String, IncomingSourceStats> {
        self.encodings()
            .iter()
            .map(|e| (e.id.clone(), e.source.stats()))
            .collect()
    }

    /// Requests a key frame on every encoding.
    pub fn refresh(&self) {
        for encoding in self.encodings() {
            encoding.source.request_key_frame();
        }
    }

    pub fn attach_count(&self) -> usize {
        lock(&self.internal).counter
    }

    /// A consumer started forwarding this track.
    pub fn attached(&self) {
        let (encodings, callbacks) = {
            let mut internal = lock(&self.internal);
            internal.counter += 1;
            if internal.counter != 1 {
                return;
            }
            (internal.encodings.clone(), internal.on_attached.snapshot())
        };

        for encoding in &encodings {
            encoding.source.attached();
        }
        for f in callbacks {
            f();
        }
    }

    /// A consumer stopped forwarding this track.
    pub fn detached(&self) {
        let (encodings, callbacks) = {
            let mut internal = lock(&self.internal);
            if internal.counter == 0 {
                return;
            }
            internal.counter -= 1;
            if internal.counter != 0 {
                return;
            }
            (internal.encodings.clone(), internal.on_detached.snapshot())
        };

        for encoding in &encodings {
            encoding.source.detached();
        }
        for f in callbacks {
            f();
        }
    }

    pub fn on_attached<F>(&self, f: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.internal).on_attached.add(Arc::new(f))
    }

    pub fn on_detached<F>(&self, f: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.internal).on_detached.add(Arc::new(f))
    }

    pub fn on_stopped<F>(&self, f: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.internal).on_stopped.add(Arc::new(f))
    }

    pub fn remove_stopped_listener(&self, id: ListenerId) -> bool {
        lock(&self.internal).on_stopped.remove(id)
    }

    pub fn is_stopped(&self) -> bool {
        lock(&self.internal).stopped
    }

    /// Stops receiving, releases the engine source groups. Idempotent.
    ///
    /// Consumers are notified first so they detach while the encodings are
    /// still known, any attachment left afterwards is released here.
    pub fn stop(&self) {
        let callbacks = {
            let mut internal = lock(&self.internal);
            if internal.stopped {
                return;
            }
            internal.stopped = true;
            internal.on_stopped.take()
        };
        debug!("incoming track {} stopped", self.id);

        for f in callbacks {
            f();
        }

        let (encodings, attached) = {
            let mut internal = lock(&self.internal);
            let attached = internal.counter > 0;
            internal.counter = 0;
            (std::mem::take(&mut internal.encodings), attached)
        };
        for encoding in &encodings {
            if attached {
                encoding.source.detached();
            }
            self.transport.remove_incoming_source_group(&encoding.group);
        }
    }
}
