
mod marshal;
mod unmarshal;

use std::collections::BTreeMap;

use log::debug;
use shared::util::math_rand_u64;

use crate::candidate::CandidateInfo;
use crate::capability::Capabilities;
use crate::codec::MediaKind;
use crate::dtls::DtlsInfo;
use crate::ice::IceInfo;
use crate::media::MediaInfo;
use crate::stream::StreamInfo;
use crate::track::TrackInfo;

/// Typed view of a whole session description.
///
/// `SessionInfo` is what both negotiation flavours work on: remote
/// descriptions are [parsed](SessionInfo::parse) into it, local ones are
/// built with [`SessionInfo::create`] or [`SessionInfo::answer`] and
/// [written](SessionInfo::write) back to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// origin session id
    pub id: u64,
    /// origin session version
    pub version: u64,
    pub medias: Vec<MediaInfo>,
    pub streams: BTreeMap<String, StreamInfo>,
    pub candidates: Vec<CandidateInfo>,
    pub ice: Option<IceInfo>,
    pub dtls: Option<DtlsInfo>,
}

impl Default for SessionInfo {
    fn default() -> Self {
        SessionInfo {
            id: math_rand_u64(),
            version: 1,
            medias: vec![],
            streams: BTreeMap::new(),
            candidates: vec![],
            ice: None,
            dtls: None,
        }
    }
}

impl SessionInfo {
    pub fn new() -> Self {
        SessionInfo::default()
    }

    /// Creates an offer with one media section per capability, the media
    /// kind being used as mid.
    pub fn create(
        ice: IceInfo,
        dtls: DtlsInfo,
        candidates: Vec<CandidateInfo>,
        capabilities: &Capabilities,
    ) -> SessionInfo {
        let mut offer = SessionInfo::new();
        offer.ice = Some(ice);
        offer.dtls = Some(dtls);
        offer.add_candidates(candidates);

        for (kind, capability) in capabilities {
            if *kind == MediaKind::Unspecified {
                continue;
            }
            let mid = kind.to_string();
            offer.add_media(MediaInfo::from_capability(&mid, *kind, capability));
        }

        offer
    }

    /// Answers every media section of this (remote) session.
    ///
    /// Media kinds without local capability are answered rejected. The
    /// answer carries no streams, local tracks are added by the caller.
    pub fn answer(
        &self,
        ice: IceInfo,
        dtls: DtlsInfo,
        candidates: Vec<CandidateInfo>,
        capabilities: &Capabilities,
    ) -> SessionInfo {
        let mut answer = SessionInfo::new();
        answer.ice = Some(ice);
        answer.dtls = Some(dtls);
        answer.add_candidates(candidates);

        for media in &self.medias {
            let answered = match capabilities.get(&media.kind) {
                Some(capability) => media.answer(capability),
                None => {
                    debug!("rejecting media {} of kind {}", media.id, media.kind);
                    media.rejected()
                }
            };
            answer.add_media(answered);
        }

        answer
    }

    /// Converts a session carrying several tracks per media section into one
    /// where every track owns its own media section.
    ///
    /// Each track reuses a spare media section of its kind, preferring the
    /// one whose mid is the track's media id, and only when none is left a
    /// copy of the first media section of that kind is minted with the track
    /// id as mid. Tracks of a kind without any media section are dropped.
    pub fn unify(&self) -> SessionInfo {
        let mut unified = self.clone();
        let mut used = vec![false; self.medias.len()];

        for stream in unified.streams.values_mut() {
            let mut dropped = vec![];
            for track in stream.tracks.values_mut() {
                let spare = |m: &(usize, &MediaInfo)| !used[m.0] && m.1.kind == track.kind;

                let reused = self
                    .medias
                    .iter()
                    .enumerate()
                    .filter(spare)
                    .find(|(_, m)| track.media_id.as_deref() == Some(m.id.as_str()))
                    .or_else(|| self.medias.iter().enumerate().find(spare))
                    .map(|(i, _)| i);

                if let Some(i) = reused {
                    used[i] = true;
                    track.media_id = Some(self.medias[i].id.clone());
                    continue;
                }

                match self.first_media(track.kind) {
                    Some(template) => {
                        let mut media = template.clone();
                        media.id = track.id.clone();
                        track.media_id = Some(media.id.clone());
                        unified.medias.push(media);
                    }
                    None => {
                        debug!("dropping track {}: no {} media to carry it", track.id, track.kind);
                        dropped.push(track.id.clone());
                    }
                }
            }
            for id in dropped {
                stream.remove_track(&id);
            }
        }

        unified
    }

    pub fn add_media(&mut self, media: MediaInfo) {
        self.medias.push(media);
    }

    pub fn media_by_id(&self, id: &str) -> Option<&MediaInfo> {
        self.medias.iter().find(|m| m.id == id)
    }

    pub fn media_by_id_mut(&mut self, id: &str) -> Option<&mut MediaInfo> {
        self.medias.iter_mut().find(|m| m.id == id)
    }

    pub fn first_media(&self, kind: MediaKind) -> Option<&MediaInfo> {
        self.medias.iter().find(|m| m.kind == kind)
    }

    pub fn medias_of(&self, kind: MediaKind) -> impl Iterator<Item = &MediaInfo> {
        self.medias.iter().filter(move |m| m.kind == kind)
    }

    pub fn add_stream(&mut self, stream: StreamInfo) {
        self.streams.insert(stream.id.clone(), stream);
    }

    pub fn stream(&self, id: &str) -> Option<&StreamInfo> {
        self.streams.get(id)
    }

    pub fn stream_mut(&mut self, id: &str) -> Option<&mut StreamInfo> {
        self.streams.get_mut(id)
    }

    pub fn remove_stream(&mut self, id: &str) -> Option<StreamInfo> {
        self.streams.remove(id)
    }

    pub fn remove_all_streams(&mut self) {
        self.streams.clear();
    }

    /// Stream owning the track carried by media section `mid`.
    pub fn stream_by_media_id(&self, mid: &str) -> Option<&StreamInfo> {
        self.streams
            .values()
            .find(|s| s.tracks.values().any(|t| t.media_id.as_deref() == Some(mid)))
    }

    /// Track carried by media section `mid`.
    pub fn track_by_media_id(&self, mid: &str) -> Option<&TrackInfo> {
        self.streams
            .values()
            .flat_map(|s| s.tracks.values())
            .find(|t| t.media_id.as_deref() == Some(mid))
    }

    pub(crate) fn track_mut(&mut self, stream_id: &str, track_id: &str) -> Option<&mut TrackInfo> {
        self.streams.get_mut(stream_id)?.track_mut(track_id)
    }

    /// Adds a candidate unless an identical one is already known.
    pub fn add_candidate(&mut self, candidate: CandidateInfo) {
        if !self.candidates.contains(&candidate) {
            self.candidates.push(candidate);
        }
    }

    pub fn add_candidates(&mut self, candidates: impl IntoIterator<Item = CandidateInfo>) {
        for candidate in candidates {
            self.add_candidate(candidate);
        }
    }
}
