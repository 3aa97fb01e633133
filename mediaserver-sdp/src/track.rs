use std::collections::BTreeMap;

use crate::codec::{CodecInfo, MediaKind, PayloadType};

pub type SSRC = u32;

/// `a=ssrc-group` semantics pairing a media SSRC with its RTX SSRC.
pub const SOURCE_GROUP_FID: &str = "FID";
/// `a=ssrc-group` semantics pairing a media SSRC with its FEC SSRC.
pub const SOURCE_GROUP_FEC_FR: &str = "FEC-FR";
/// `a=ssrc-group` semantics listing the media SSRCs of SSRC based simulcast.
pub const SOURCE_GROUP_SIM: &str = "SIM";

/// An SSRC group, the first SSRC is always the primary one.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct SourceGroupInfo {
    pub semantics: String,
    pub ssrcs: Vec<SSRC>,
}

impl SourceGroupInfo {
    pub fn new(semantics: &str, ssrcs: Vec<SSRC>) -> Self {
        SourceGroupInfo {
            semantics: semantics.to_owned(),
            ssrcs,
        }
    }

    pub fn primary(&self) -> Option<SSRC> {
        self.ssrcs.first().copied()
    }

    /// The paired SSRC of a FID or FEC-FR group.
    pub fn secondary(&self) -> Option<SSRC> {
        self.ssrcs.get(1).copied()
    }
}

/// One encoding of a track, identified by its RID when simulcast is negotiated.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct TrackEncodingInfo {
    pub id: String,
    pub paused: bool,
    pub codecs: BTreeMap<PayloadType, CodecInfo>,
    pub params: BTreeMap<String, String>,
}

impl TrackEncodingInfo {
    pub fn new(id: &str, paused: bool) -> Self {
        TrackEncodingInfo {
            id: id.to_owned(),
            paused,
            ..Default::default()
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// A media track announced in a session description.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub id: String,
    /// mid of the media section carrying this track in per-track sessions
    pub media_id: Option<String>,
    pub kind: MediaKind,
    pub ssrcs: Vec<SSRC>,
    pub groups: Vec<SourceGroupInfo>,
    /// simulcast alternatives, each inner list being the alternatives of one stream
    pub encodings: Vec<Vec<TrackEncodingInfo>>,
}

impl TrackInfo {
    pub fn new(id: &str, kind: MediaKind) -> Self {
        TrackInfo {
            id: id.to_owned(),
            kind,
            ..Default::default()
        }
    }

    pub fn add_ssrc(&mut self, ssrc: SSRC) {
        if !self.ssrcs.contains(&ssrc) {
            self.ssrcs.push(ssrc);
        }
    }

    pub fn has_ssrc(&self, ssrc: SSRC) -> bool {
        self.ssrcs.contains(&ssrc)
    }

    pub fn add_source_group(&mut self, group: SourceGroupInfo) {
        if !self.groups.contains(&group) {
            self.groups.push(group);
        }
    }

    pub fn source_group(&self, semantics: &str) -> Option<&SourceGroupInfo> {
        self.groups.iter().find(|g| g.semantics == semantics)
    }

    /// Group of the given semantics whose primary SSRC is `ssrc`.
    pub fn source_group_for(&self, semantics: &str, ssrc: SSRC) -> Option<&SourceGroupInfo> {
        self.groups
            .iter()
            .find(|g| g.semantics == semantics && g.primary() == Some(ssrc))
    }

    pub fn add_alternative_encodings(&mut self, alternatives: Vec<TrackEncodingInfo>) {
        self.encodings.push(alternatives);
    }

    pub fn has_encodings(&self) -> bool {
        self.encodings.iter().any(|alternatives| !alternatives.is_empty())
    }
}
