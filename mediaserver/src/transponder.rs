use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use shared::error::{Error, Result};

use crate::UNSPECIFIED_STR;
use crate::engine::{MAX_LAYER_ID, TransponderEngine};
use crate::listener::{ListenerId, Listeners, OnEventFn, OnMuteFn};
use crate::lock;
use crate::stream::incoming_track::{ActiveLayer, IncomingStreamTrack};

/// Radix of each component of a layer ordering key, larger than any
/// spatial + temporal sum.
const LAYER_KEY_BASE: u64 = 1024;

/// Order in which the layers of an incoming track are walked when looking
/// for the best one fitting a target bitrate.
///
/// Simulcast encodings are always walked in order, the traversal only
/// decides how the spatial and temporal layers of one encoding are ranked.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerTraversal {
    #[serde(rename = "unspecified")]
    Unspecified,
    /// all temporal layers of a spatial layer before the next spatial layer
    #[default]
    #[serde(rename = "spatial-temporal")]
    SpatialTemporal,
    /// diagonals of increasing spatial + temporal, lower spatial layer first
    #[serde(rename = "zig-zag-spatial-temporal")]
    ZigZagSpatialTemporal,
    /// all spatial layers of a temporal layer before the next temporal layer
    #[serde(rename = "temporal-spatial")]
    TemporalSpatial,
    /// diagonals of increasing spatial + temporal, lower temporal layer first
    #[serde(rename = "zig-zag-temporal-spatial")]
    ZigZagTemporalSpatial,
}

const LAYER_TRAVERSAL_SPATIAL_TEMPORAL_STR: &str = "spatial-temporal";
const LAYER_TRAVERSAL_ZIG_ZAG_SPATIAL_TEMPORAL_STR: &str = "zig-zag-spatial-temporal";
const LAYER_TRAVERSAL_TEMPORAL_SPATIAL_STR: &str = "temporal-spatial";
const LAYER_TRAVERSAL_ZIG_ZAG_TEMPORAL_SPATIAL_STR: &str = "zig-zag-temporal-spatial";

impl From<&str> for LayerTraversal {
    fn from(raw: &str) -> Self {
        match raw {
            LAYER_TRAVERSAL_SPATIAL_TEMPORAL_STR => LayerTraversal::SpatialTemporal,
            LAYER_TRAVERSAL_ZIG_ZAG_SPATIAL_TEMPORAL_STR => LayerTraversal::ZigZagSpatialTemporal,
            LAYER_TRAVERSAL_TEMPORAL_SPATIAL_STR => LayerTraversal::TemporalSpatial,
            LAYER_TRAVERSAL_ZIG_ZAG_TEMPORAL_SPATIAL_STR => LayerTraversal::ZigZagTemporalSpatial,
            _ => LayerTraversal::Unspecified,
        }
    }
}

impl fmt::Display for LayerTraversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            LayerTraversal::SpatialTemporal => LAYER_TRAVERSAL_SPATIAL_TEMPORAL_STR,
            LayerTraversal::ZigZagSpatialTemporal => LAYER_TRAVERSAL_ZIG_ZAG_SPATIAL_TEMPORAL_STR,
            LayerTraversal::TemporalSpatial => LAYER_TRAVERSAL_TEMPORAL_SPATIAL_STR,
            LayerTraversal::ZigZagTemporalSpatial => LAYER_TRAVERSAL_ZIG_ZAG_TEMPORAL_SPATIAL_STR,
            LayerTraversal::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl LayerTraversal {
    /// Position of `layer` in this traversal. Distinct layers get distinct keys.
    pub fn key(&self, layer: &ActiveLayer) -> u64 {
        let s = u64::from(layer.spatial_layer_id);
        let t = u64::from(layer.temporal_layer_id);
        let (major, minor) = match *self {
            LayerTraversal::SpatialTemporal | LayerTraversal::Unspecified => (s, t),
            LayerTraversal::ZigZagSpatialTemporal => (s + t, s),
            LayerTraversal::TemporalSpatial => (t, s),
            LayerTraversal::ZigZagTemporalSpatial => (s + t, t),
        };
        (layer.simulcast_index as u64 * LAYER_KEY_BASE + major) * LAYER_KEY_BASE + minor
    }
}

fn within_maximum(layer: &ActiveLayer, max_spatial: u8, max_temporal: u8) -> bool {
    let fits = |id: u8, max: u8| id == MAX_LAYER_ID || id <= max;
    fits(layer.spatial_layer_id, max_spatial) && fits(layer.temporal_layer_id, max_temporal)
}

/// Picks the layer to forward for `target` bps among `layers`.
///
/// Returns the highest bitrate layer not above the target and within the
/// maxima, ties going to the one walked last. Without such a layer the
/// lowest bitrate one within the maxima is returned unless `strict` is set.
pub(crate) fn select_layer_for<'a>(
    layers: &'a [ActiveLayer],
    target: u64,
    traversal: LayerTraversal,
    max_spatial: u8,
    max_temporal: u8,
    strict: bool,
) -> Option<&'a ActiveLayer> {
    let mut candidates: Vec<&ActiveLayer> = layers.iter().filter(|l| l.bitrate > 0).collect();
    candidates.sort_by_key(|l| traversal.key(l));

    let mut selected: Option<&ActiveLayer> = None;
    for layer in candidates.iter().copied() {
        if layer.bitrate > target || !within_maximum(layer, max_spatial, max_temporal) {
            continue;
        }
        if selected.is_none_or(|best| layer.bitrate >= best.bitrate) {
            selected = Some(layer);
        }
    }

    if selected.is_some() || strict {
        return selected;
    }
    candidates
        .into_iter()
        .filter(|l| within_maximum(l, max_spatial, max_temporal))
        .min_by_key(|l| l.bitrate)
}

struct TransponderInternal {
    track: Option<Arc<IncomingStreamTrack>>,
    track_listener: Option<ListenerId>,
    encoding_id: Option<String>,
    spatial_layer_id: u8,
    temporal_layer_id: u8,
    max_spatial_layer_id: u8,
    max_temporal_layer_id: u8,
    muted: bool,
    stopped: bool,
    on_muted: Listeners<OnMuteFn>,
    on_stopped: Listeners<OnEventFn>,
}

/// Forwards one layer of an incoming track onto an outgoing track.
///
/// The selection state lives behind one lock; the engine resource behind
/// another one so engine calls never happen with the selection locked.
pub struct Transponder {
    weak_self: Weak<Transponder>,
    engine: Mutex<Option<Box<dyn TransponderEngine>>>,
    internal: Mutex<TransponderInternal>,
}

impl Transponder {
    pub fn new(engine: Box<dyn TransponderEngine>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Transponder {
            weak_self: weak_self.clone(),
            engine: Mutex::new(Some(engine)),
            internal: Mutex::new(TransponderInternal {
                track: None,
                track_listener: None,
                encoding_id: None,
                spatial_layer_id: MAX_LAYER_ID,
                temporal_layer_id: MAX_LAYER_ID,
                max_spatial_layer_id: MAX_LAYER_ID,
                max_temporal_layer_id: MAX_LAYER_ID,
                muted: false,
                stopped: false,
                on_muted: Listeners::new(),
                on_stopped: Listeners::new(),
            }),
        })
    }

    fn with_engine(&self, f: impl FnOnce(&mut dyn TransponderEngine)) {
        if let Some(engine) = lock(&self.engine).as_mut() {
            f(engine.as_mut());
        }
    }

    /// Starts forwarding `track`, replacing the previous one.
    ///
    /// The selection is reset to the first encoding with unbounded layers,
    /// and stopping `track` stops this transponder.
    pub fn set_incoming_track(&self, track: Option<Arc<IncomingStreamTrack>>) -> Result<()> {
        if self.is_stopped() {
            return Err(Error::ErrClosed);
        }
        let Some(track) = track else {
            return Err(Error::ErrInvalidArgument("incoming track is required".to_owned()));
        };
        if track.is_stopped() {
            return Err(Error::ErrInvalidArgument(format!("incoming track {} is stopped", track.id())));
        }

        let first = track.encodings().into_iter().next();

        // attached before being published, so a concurrent stop always detaches it
        track.attached();
        let replaced = {
            let mut internal = lock(&self.internal);
            if internal.stopped {
                None
            } else {
                let previous = internal.track.replace(Arc::clone(&track));
                let previous_listener = internal.track_listener.take();
                internal.encoding_id = first.as_ref().map(|e| e.id().to_owned());
                internal.spatial_layer_id = MAX_LAYER_ID;
                internal.temporal_layer_id = MAX_LAYER_ID;
                internal.max_spatial_layer_id = MAX_LAYER_ID;
                internal.max_temporal_layer_id = MAX_LAYER_ID;
                Some((previous, previous_listener))
            }
        };
        let Some((previous, previous_listener)) = replaced else {
            track.detached();
            return Err(Error::ErrClosed);
        };

        if let Some(previous) = previous {
            if let Some(id) = previous_listener {
                previous.remove_stopped_listener(id);
            }
            previous.detached();
        }

        let weak_self = self.weak_self.clone();
        let listener = track.on_stopped(move || {
            if let Some(transponder) = weak_self.upgrade() {
                transponder.stop();
            }
        });
        {
            let mut internal = lock(&self.internal);
            if internal.track.as_ref().is_some_and(|t| Arc::ptr_eq(t, &track)) {
                internal.track_listener = Some(listener);
            } else {
                track.remove_stopped_listener(listener);
            }
        }
        if track.is_stopped() && self.incoming_track().is_some_and(|t| Arc::ptr_eq(&t, &track)) {
            // stopped before the listener was in place
            self.stop();
            return Err(Error::ErrClosed);
        }

        debug!("transponder forwarding track {}", track.id());
        self.with_engine(|engine| engine.set_incoming(first.map(|e| Arc::clone(e.source()))));
        Ok(())
    }

    pub fn incoming_track(&self) -> Option<Arc<IncomingStreamTrack>> {
        lock(&self.internal).track.clone()
    }

    pub fn encoding_id(&self) -> Option<String> {
        lock(&self.internal).encoding_id.clone()
    }

    pub fn spatial_layer_id(&self) -> u8 {
        lock(&self.internal).spatial_layer_id
    }

    pub fn temporal_layer_id(&self) -> u8 {
        lock(&self.internal).temporal_layer_id
    }

    /// Configured (spatial, temporal) maxima.
    pub fn maximum_layers(&self) -> (u8, u8) {
        let internal = lock(&self.internal);
        (internal.max_spatial_layer_id, internal.max_temporal_layer_id)
    }

    /// Selects the layer matching `target` bps best and returns its bitrate.
    ///
    /// In strict mode the transponder is muted and 0 returned when every
    /// layer exceeds the target. Returns 0 when no track is bound.
    pub fn set_target_bitrate(&self, target: u64, traversal: LayerTraversal, strict: bool) -> Result<u64> {
        let (track, max_spatial, max_temporal) = {
            let internal = lock(&self.internal);
            if internal.stopped {
                return Err(Error::ErrClosed);
            }
            match &internal.track {
                Some(track) => (
                    Arc::clone(track),
                    internal.max_spatial_layer_id,
                    internal.max_temporal_layer_id,
                ),
                None => return Ok(0),
            }
        };

        let active = track.active_layers();
        let Some(layer) = select_layer_for(&active.layers, target, traversal, max_spatial, max_temporal, strict) else {
            if strict {
                debug!("no layer of track {} fits {target} bps, muting", track.id());
                self.mute(true);
            }
            return Ok(0);
        };
        trace!(
            "track {}: target {target} bps selects encoding {:?} layer {}/{} at {} bps",
            track.id(),
            layer.encoding_id,
            layer.spatial_layer_id,
            layer.temporal_layer_id,
            layer.bitrate
        );

        if !self.switch_encoding(Some(&track), &layer.encoding_id)? {
            debug!("track {} replaced while selecting a layer", track.id());
            return Ok(0);
        }
        self.select_layer(layer.spatial_layer_id, layer.temporal_layer_id)?;
        self.mute(false);

        Ok(layer.bitrate)
    }

    /// Switches to the encoding `id` of the bound track.
    pub fn select_encoding(&self, id: &str) -> Result<()> {
        self.switch_encoding(None, id).map(|_| ())
    }

    /// Switches encoding when the bound track is still `expected`, returns
    /// false without touching anything otherwise.
    fn switch_encoding(&self, expected: Option<&Arc<IncomingStreamTrack>>, id: &str) -> Result<bool> {
        let source = {
            let mut internal = lock(&self.internal);
            if internal.stopped {
                return Err(Error::ErrClosed);
            }
            let Some(track) = &internal.track else {
                return Err(Error::ErrInvalidArgument("no incoming track".to_owned()));
            };
            if expected.is_some_and(|expected| !Arc::ptr_eq(expected, track)) {
                return Ok(false);
            }
            if internal.encoding_id.as_deref() == Some(id) {
                return Ok(true);
            }
            let Some(encoding) = track.encoding(id) else {
                return Err(Error::ErrInvalidArgument(format!("unknown encoding {id:?}")));
            };
            internal.encoding_id = Some(id.to_owned());
            Arc::clone(encoding.source())
        };

        self.with_engine(|engine| engine.set_incoming(Some(source)));
        Ok(true)
    }

    /// Selects spatial and temporal layers, clamped to the maxima.
    pub fn select_layer(&self, spatial_layer_id: u8, temporal_layer_id: u8) -> Result<()> {
        let (spatial, temporal) = {
            let mut internal = lock(&self.internal);
            if internal.stopped {
                return Err(Error::ErrClosed);
            }
            let spatial = spatial_layer_id.min(internal.max_spatial_layer_id);
            let temporal = temporal_layer_id.min(internal.max_temporal_layer_id);
            if internal.spatial_layer_id == spatial && internal.temporal_layer_id == temporal {
                return Ok(());
            }
            internal.spatial_layer_id = spatial;
            internal.temporal_layer_id = temporal;
            (spatial, temporal)
        };

        self.with_engine(|engine| engine.select_layer(spatial, temporal));
        Ok(())
    }

    pub fn set_maximum_layers(&self, max_spatial_layer_id: u8, max_temporal_layer_id: u8) -> Result<()> {
        let mut internal = lock(&self.internal);
        if internal.stopped {
            return Err(Error::ErrClosed);
        }
        internal.max_spatial_layer_id = max_spatial_layer_id;
        internal.max_temporal_layer_id = max_temporal_layer_id;
        Ok(())
    }

    pub fn is_muted(&self) -> bool {
        lock(&self.internal).muted
    }

    /// Mutes or unmutes forwarding, listeners only hear about changes.
    pub fn mute(&self, muting: bool) {
        let callbacks = {
            let mut internal = lock(&self.internal);
            if internal.stopped || internal.muted == muting {
                return;
            }
            internal.muted = muting;
            internal.on_muted.snapshot()
        };

        self.with_engine(|engine| engine.mute(muting));
        for f in callbacks {
            f(muting);
        }
    }

    pub fn on_muted<F>(&self, f: F) -> ListenerId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        lock(&self.internal).on_muted.add(Arc::new(f))
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

    /// Detaches the bound track and releases the engine resource. Idempotent.
    pub fn stop(&self) {
        let (track, listener, callbacks) = {
            let mut internal = lock(&self.internal);
            if internal.stopped {
                return;
            }
            internal.stopped = true;
            (
                internal.track.take(),
                internal.track_listener.take(),
                internal.on_stopped.take(),
            )
        };

        if let Some(track) = track {
            if let Some(id) = listener {
                track.remove_stopped_listener(id);
            }
            track.detached();
        }

        if let Some(mut engine) = lock(&self.engine).take() {
            engine.set_incoming(None);
            engine.close();
        }
        debug!("transponder stopped");

        for f in callbacks {
            f();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn layer(simulcast_index: usize, spatial_layer_id: u8, temporal_layer_id: u8, bitrate: u64) -> ActiveLayer {
        ActiveLayer {
            encoding_id: simulcast_index.to_string(),
            simulcast_index,
            spatial_layer_id,
            temporal_layer_id,
            bitrate,
        }
    }

    #[test]
    fn test_layer_traversal_string() {
        let tests = vec![
            (LayerTraversal::Unspecified, "Unspecified"),
            (LayerTraversal::SpatialTemporal, "spatial-temporal"),
            (LayerTraversal::ZigZagSpatialTemporal, "zig-zag-spatial-temporal"),
            (LayerTraversal::TemporalSpatial, "temporal-spatial"),
            (LayerTraversal::ZigZagTemporalSpatial, "zig-zag-temporal-spatial"),
        ];

        for (traversal, expected_string) in tests {
            assert_eq!(traversal.to_string(), expected_string);
            if traversal != LayerTraversal::Unspecified {
                assert_eq!(LayerTraversal::from(expected_string), traversal);
            }
        }
        assert_eq!(LayerTraversal::from("bogus"), LayerTraversal::Unspecified);
    }

    #[test]
    fn test_layer_traversal_order() {
        let layers: Vec<ActiveLayer> = [(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
            .into_iter()
            .map(|(s, t)| layer(0, s, t, 1))
            .collect();

        let tests = vec![
            (LayerTraversal::SpatialTemporal, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]),
            (LayerTraversal::ZigZagSpatialTemporal, vec![(0, 0), (0, 1), (1, 0), (0, 2), (1, 1), (1, 2)]),
            (LayerTraversal::TemporalSpatial, vec![(0, 0), (1, 0), (0, 1), (1, 1), (0, 2), (1, 2)]),
            (LayerTraversal::ZigZagTemporalSpatial, vec![(0, 0), (1, 0), (0, 1), (1, 1), (0, 2), (1, 2)]),
        ];

        for (traversal, expected) in tests {
            let mut sorted = layers.clone();
            sorted.sort_by_key(|l| traversal.key(l));
            let order: Vec<(u8, u8)> = sorted
                .iter()
                .map(|l| (l.spatial_layer_id, l.temporal_layer_id))
                .collect();
            assert_eq!(order, expected, "{traversal}");
        }
    }

    #[test]
    fn test_layer_keys_encoding_major() {
        let low = layer(0, MAX_LAYER_ID, MAX_LAYER_ID, 1);
        let high = layer(1, 0, 0, 1);
        for traversal in [
            LayerTraversal::SpatialTemporal,
            LayerTraversal::ZigZagSpatialTemporal,
            LayerTraversal::TemporalSpatial,
            LayerTraversal::ZigZagTemporalSpatial,
        ] {
            assert!(traversal.key(&low) < traversal.key(&high), "{traversal}");
        }
    }

    #[test]
    fn test_select_layer_for_target() {
        let layers = vec![
            layer(0, MAX_LAYER_ID, MAX_LAYER_ID, 100_000),
            layer(1, MAX_LAYER_ID, MAX_LAYER_ID, 300_000),
            layer(2, MAX_LAYER_ID, MAX_LAYER_ID, 800_000),
            layer(3, MAX_LAYER_ID, MAX_LAYER_ID, 0),
        ];

        let tests = vec![
            (500_000, false, Some(300_000)),
            (300_000, false, Some(300_000)),
            (1_000_000, false, Some(800_000)),
            (50_000, false, Some(100_000)),
            (50_000, true, None),
            (100_000, true, Some(100_000)),
        ];
        for (target, strict, expected) in tests {
            let selected = select_layer_for(
                &layers,
                target,
                LayerTraversal::SpatialTemporal,
                MAX_LAYER_ID,
                MAX_LAYER_ID,
                strict,
            );
            assert_eq!(selected.map(|l| l.bitrate), expected, "target {target} strict {strict}");
        }
    }

    #[test]
    fn test_select_layer_for_respects_maximum() {
        let layers = vec![
            layer(0, 0, 0, 100_000),
            layer(0, 0, 1, 150_000),
            layer(0, 1, 0, 200_000),
            layer(0, 1, 1, 400_000),
        ];

        let selected = select_layer_for(&layers, 1_000_000, LayerTraversal::SpatialTemporal, 0, MAX_LAYER_ID, false);
        assert_eq!(selected.map(|l| l.bitrate), Some(150_000));

        let selected = select_layer_for(&layers, 1_000_000, LayerTraversal::SpatialTemporal, 1, 0, false);
        assert_eq!(selected.map(|l| l.bitrate), Some(200_000));
    }

    #[test]
    fn test_select_layer_for_fallback_respects_maximum() {
        let layers = vec![layer(0, 1, 0, 50_000), layer(0, 0, 0, 100_000), layer(0, 0, 1, 150_000)];

        let tests = vec![
            (MAX_LAYER_ID, Some((1, 0, 50_000))),
            (0, Some((0, 0, 100_000))),
        ];
        for (max_spatial, expected) in tests {
            let selected = select_layer_for(&layers, 10_000, LayerTraversal::SpatialTemporal, max_spatial, MAX_LAYER_ID, false)
                .map(|l| (l.spatial_layer_id, l.temporal_layer_id, l.bitrate));
            assert_eq!(selected, expected, "max spatial {max_spatial}");
        }
    }

    #[test]
    fn test_select_layer_for_ties_follow_traversal() {
        let layers = vec![layer(0, 0, 1, 200_000), layer(0, 1, 0, 200_000)];

        let tests = vec![
            (LayerTraversal::SpatialTemporal, (1, 0)),
            (LayerTraversal::TemporalSpatial, (0, 1)),
        ];
        for (traversal, expected) in tests {
            let selected = select_layer_for(&layers, 250_000, traversal, MAX_LAYER_ID, MAX_LAYER_ID, false).unwrap();
            assert_eq!((selected.spatial_layer_id, selected.temporal_layer_id), expected, "{traversal}");
        }
    }

    #[test]
    fn test_select_layer_for_monotonic() {
        let layers = vec![
            layer(0, 0, 0, 80_000),
            layer(0, 0, 1, 120_000),
            layer(0, 1, 0, 250_000),
            layer(0, 1, 1, 390_000),
            layer(1, 0, 0, 600_000),
            layer(1, 0, 1, 900_000),
        ];

        for traversal in [
            LayerTraversal::SpatialTemporal,
            LayerTraversal::ZigZagSpatialTemporal,
            LayerTraversal::TemporalSpatial,
            LayerTraversal::ZigZagTemporalSpatial,
        ] {
            let mut last = 0;
            for target in (0..1_000_000).step_by(10_000) {
                let achieved = select_layer_for(&layers, target, traversal, MAX_LAYER_ID, MAX_LAYER_ID, false)
                    .map(|l| l.bitrate)
                    .unwrap_or(0);
                assert!(achieved >= last, "{traversal}: {target} gave {achieved} < {last}");
                last = achieved;
            }
        }
    }
}
