use std::collections::BTreeMap;

use crate::codec::MediaKind;
use crate::track::TrackInfo;

/// A media stream (`msid` stream id) grouping tracks.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub id: String,
    pub tracks: BTreeMap<String, TrackInfo>,
}

impl StreamInfo {
    pub fn new(id: &str) -> Self {
        StreamInfo {
            id: id.to_owned(),
            tracks: BTreeMap::new(),
        }
    }

    pub fn add_track(&mut self, track: TrackInfo) {
        self.tracks.insert(track.id.clone(), track);
    }

    pub fn track(&self, id: &str) -> Option<&TrackInfo> {
        self.tracks.get(id)
    }

    pub fn track_mut(&mut self, id: &str) -> Option<&mut TrackInfo> {
        self.tracks.get_mut(id)
    }

    pub fn remove_track(&mut self, id: &str) -> Option<TrackInfo> {
        self.tracks.remove(id)
    }

    pub fn tracks_of(&self, kind: MediaKind) -> impl Iterator<Item = &TrackInfo> {
        self.tracks.values().filter(move |t| t.kind == kind)
    }

    pub fn first_track(&self, kind: MediaKind) -> Option<&TrackInfo> {
        self.tracks_of(kind).next()
    }
}
