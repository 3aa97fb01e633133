use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use log::debug;
use sdp::{MediaKind, StreamInfo, TrackInfo};
use shared::error::{Error, Result};

use super::incoming::IncomingStream;
use super::outgoing_track::OutgoingStreamTrack;
use crate::engine::TransportEngine;
use crate::listener::{ListenerId, Listeners, OnEventFn};
use crate::lock;
use crate::transponder::Transponder;

pub type OnOutgoingTrackFn = dyn Fn(&Arc<OutgoingStreamTrack>) + Send + Sync;

struct OutgoingStreamInternal {
    tracks: BTreeMap<String, Arc<OutgoingStreamTrack>>,
    muted: bool,
    stopped: bool,
    on_track: Listeners<OnOutgoingTrackFn>,
    on_stopped: Listeners<OnEventFn>,
}

/// A media stream sent to the remote peer.
pub struct OutgoingStream {
    id: String,
    transport: Arc<dyn TransportEngine>,
    weak_self: Weak<OutgoingStream>,
    internal: Mutex<OutgoingStreamInternal>,
}

impl OutgoingStream {
    /// Creates the stream and one track per track of `info`.
    pub(crate) fn new(info: &StreamInfo, transport: Arc<dyn TransportEngine>) -> Result<Arc<Self>> {
        let stream = Arc::new_cyclic(|weak_self| OutgoingStream {
            id: info.id.clone(),
            transport,
            weak_self: weak_self.clone(),
            internal: Mutex::new(OutgoingStreamInternal {
                tracks: BTreeMap::new(),
                muted: false,
                stopped: false,
                on_track: Listeners::new(),
                on_stopped: Listeners::new(),
            }),
        });

        for track in info.tracks.values() {
            if let Err(err) = stream.create_track(track) {
                stream.stop();
                return Err(err);
            }
        }

        Ok(stream)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Description of the stream built from its live tracks.
    pub fn info(&self) -> StreamInfo {
        let mut info = StreamInfo::new(&self.id);
        for track in self.tracks() {
            info.add_track(track.info());
        }
        info
    }

    pub fn track(&self, id: &str) -> Option<Arc<OutgoingStreamTrack>> {
        lock(&self.internal).tracks.get(id).cloned()
    }

    pub fn tracks(&self) -> Vec<Arc<OutgoingStreamTrack>> {
        lock(&self.internal).tracks.values().cloned().collect()
    }

    pub fn tracks_of(&self, kind: MediaKind) -> Vec<Arc<OutgoingStreamTrack>> {
        lock(&self.internal)
            .tracks
            .values()
            .filter(|t| t.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn audio_tracks(&self) -> Vec<Arc<OutgoingStreamTrack>> {
        self.tracks_of(MediaKind::Audio)
    }

    pub fn video_tracks(&self) -> Vec<Arc<OutgoingStreamTrack>> {
        self.tracks_of(MediaKind::Video)
    }

    /// Adds a track to the stream, `info` must carry at least one SSRC.
    pub fn create_track(&self, info: &TrackInfo) -> Result<Arc<OutgoingStreamTrack>> {
        {
            let internal = lock(&self.internal);
            if internal.stopped {
                return Err(Error::ErrClosed);
            }
            if internal.tracks.contains_key(&info.id) {
                return Err(Error::ErrTrackAlreadyExists(info.id.clone()));
            }
        }

        let track = OutgoingStreamTrack::create(info, Arc::clone(&self.transport))?;

        let callbacks = {
            let mut internal = lock(&self.internal);
            internal.tracks.insert(info.id.clone(), Arc::clone(&track));
            internal.on_track.snapshot()
        };

        let weak_self = self.weak_self.clone();
        let id = info.id.clone();
        track.on_stopped(move || {
            if let Some(stream) = weak_self.upgrade() {
                lock(&stream.internal).tracks.remove(&id);
            }
        });

        for f in callbacks {
            f(&track);
        }
        Ok(track)
    }

    pub fn is_muted(&self) -> bool {
        lock(&self.internal).muted
    }

    pub fn mute(&self, muting: bool) {
        let tracks = {
            let mut internal = lock(&self.internal);
            internal.muted = muting;
            internal.tracks.values().cloned().collect::<Vec<_>>()
        };
        for track in tracks {
            track.mute(muting);
        }
    }

    /// Forwards the tracks of `incoming`, pairing tracks of the same kind in order.
    pub fn attach_to(&self, incoming: &IncomingStream) -> Result<Vec<Arc<Transponder>>> {
        self.detach();

        let mut transponders = vec![];
        for kind in [MediaKind::Audio, MediaKind::Video] {
            for (outgoing, source) in self.tracks_of(kind).iter().zip(incoming.tracks_of(kind)) {
                transponders.push(outgoing.attach_to(&source)?);
            }
        }
        Ok(transponders)
    }

    pub fn detach(&self) {
        for track in self.tracks() {
            track.detach();
        }
    }

    pub fn on_track<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&Arc<OutgoingStreamTrack>) + Send + Sync + 'static,
    {
        lock(&self.internal).on_track.add(Arc::new(f))
    }

    pub fn on_stopped<F>(&self, f: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.internal).on_stopped.add(Arc::new(f))
    }

    pub fn is_stopped(&self) -> bool {
        lock(&self.internal).stopped
    }

    /// Stops every track and the stream itself. Idempotent.
    pub fn stop(&self) {
        let (tracks, callbacks) = {
            let mut internal = lock(&self.internal);
            if internal.stopped {
                return;
            }
            internal.stopped = true;
            let tracks: Vec<_> = internal.tracks.values().cloned().collect();
            (tracks, internal.on_stopped.take())
        };
        debug!("outgoing stream {} stopped", self.id);

        for track in tracks {
            track.stop();
        }
        for f in callbacks {
            f();
        }
    }
}
