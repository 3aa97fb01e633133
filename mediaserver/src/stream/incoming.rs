use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use log::debug;
use sdp::{MediaKind, StreamInfo, TrackInfo};
use shared::error::{Error, Result};

use super::incoming_track::IncomingStreamTrack;
use crate::engine::TransportEngine;
use crate::listener::{ListenerId, Listeners, OnEventFn};
use crate::lock;

pub type OnIncomingTrackFn = dyn Fn(&Arc<IncomingStreamTrack>) + Send + Sync;

struct IncomingStreamInternal {
    tracks: BTreeMap<String, Arc<IncomingStreamTrack>>,
    stopped: bool,
    on_track: Listeners<OnIncomingTrackFn>,
    on_stopped: Listeners<OnEventFn>,
}

/// A media stream received from the remote peer.
pub struct IncomingStream {
    id: String,
    transport: Arc<dyn TransportEngine>,
    weak_self: Weak<IncomingStream>,
    internal: Mutex<IncomingStreamInternal>,
}

impl IncomingStream {
    /// Creates the stream and one track per track of `info`.
    pub(crate) fn new(info: &StreamInfo, transport: Arc<dyn TransportEngine>) -> Result<Arc<Self>> {
        let stream = Arc::new_cyclic(|weak_self| IncomingStream {
            id: info.id.clone(),
            transport,
            weak_self: weak_self.clone(),
            internal: Mutex::new(IncomingStreamInternal {
                tracks: BTreeMap::new(),
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

    pub fn track(&self, id: &str) -> Option<Arc<IncomingStreamTrack>> {
        lock(&self.internal).tracks.get(id).cloned()
    }

    pub fn tracks(&self) -> Vec<Arc<IncomingStreamTrack>> {
        lock(&self.internal).tracks.values().cloned().collect()
    }

    pub fn tracks_of(&self, kind: MediaKind) -> Vec<Arc<IncomingStreamTrack>> {
        lock(&self.internal)
            .tracks
            .values()
            .filter(|t| t.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn audio_tracks(&self) -> Vec<Arc<IncomingStreamTrack>> {
        self.tracks_of(MediaKind::Audio)
    }

    pub fn video_tracks(&self) -> Vec<Arc<IncomingStreamTrack>> {
        self.tracks_of(MediaKind::Video)
    }

    /// Starts receiving a new track of this stream.
    pub fn create_track(&self, info: &TrackInfo) -> Result<Arc<IncomingStreamTrack>> {
        {
            let internal = lock(&self.internal);
            if internal.stopped {
                return Err(Error::ErrClosed);
            }
            if internal.tracks.contains_key(&info.id) {
                return Err(Error::ErrTrackAlreadyExists(info.id.clone()));
            }
        }

        let track = IncomingStreamTrack::create(info, Arc::clone(&self.transport))?;
        self.add_track(Arc::clone(&track))?;
        Ok(track)
    }

    /// Adopts a track created elsewhere on the same transport.
    pub fn add_track(&self, track: Arc<IncomingStreamTrack>) -> Result<()> {
        let callbacks = {
            let mut internal = lock(&self.internal);
            if internal.tracks.contains_key(track.id()) {
                return Err(Error::ErrTrackAlreadyExists(track.id().to_owned()));
            }
            internal.tracks.insert(track.id().to_owned(), Arc::clone(&track));
            internal.on_track.snapshot()
        };

        let weak_self = self.weak_self.clone();
        let id = track.id().to_owned();
        track.on_stopped(move || {
            if let Some(stream) = weak_self.upgrade() {
                lock(&stream.internal).tracks.remove(&id);
            }
        });

        for f in callbacks {
            f(&track);
        }
        Ok(())
    }

    pub fn on_track<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&Arc<IncomingStreamTrack>) + Send + Sync + 'static,
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
        debug!("incoming stream {} stopped", self.id);

        for track in tracks {
            track.stop();
        }
        for f in callbacks {
            f();
        }
    }
}
