use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use unicase::UniCase;

use crate::UNSPECIFIED_STR;
use crate::transform::{format_params, parse_params};

pub type PayloadType = u8;

pub(crate) const CODEC_RTX: &str = "rtx";
pub(crate) const CODEC_RED: &str = "red";
pub(crate) const CODEC_ULPFEC: &str = "ulpfec";
pub(crate) const CODEC_FLEXFEC: &str = "flexfec-03";
pub(crate) const CODEC_H264: &str = "h264";
pub(crate) const CODEC_OPUS: &str = "opus";

const PARAM_PACKETIZATION_MODE: &str = "packetization-mode";
const PARAM_PROFILE_LEVEL_ID: &str = "profile-level-id";
const PARAM_APT: &str = "apt";

/// Kind of media carried by a media section.
#[derive(
    Default, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum MediaKind {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,
    #[serde(rename = "audio")]
    Audio,
    #[serde(rename = "video")]
    Video,
}

impl From<&str> for MediaKind {
    fn from(raw: &str) -> Self {
        match raw {
            "audio" => MediaKind::Audio,
            "video" => MediaKind::Video,
            _ => MediaKind::Unspecified,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// One `a=rtcp-fb` capability, e.g. `nack pli` is id `nack` with params `["pli"]`.
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RtcpFeedbackInfo {
    pub id: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl RtcpFeedbackInfo {
    pub fn new(id: &str, params: &[&str]) -> Self {
        RtcpFeedbackInfo {
            id: id.to_owned(),
            params: params.iter().map(|p| (*p).to_owned()).collect(),
        }
    }
}

/// A negotiated RTP codec of a media section.
///
/// Retransmission is not a codec of its own in this model, a primary codec
/// carries the payload type of its RTX stream in [`CodecInfo::rtx`].
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct CodecInfo {
    pub name: String,
    pub payload_type: PayloadType,
    pub rtx: Option<PayloadType>,
    pub clock_rate: Option<u32>,
    pub channels: Option<u16>,
    pub params: BTreeMap<String, String>,
    pub rtcp_fbs: Vec<RtcpFeedbackInfo>,
}

impl CodecInfo {
    pub fn new(name: &str, payload_type: PayloadType) -> Self {
        CodecInfo {
            name: name.to_owned(),
            payload_type,
            ..Default::default()
        }
    }

    /// Builds a codec from a capability name which may carry fmtp style
    /// parameters, e.g. `h264;packetization-mode=1`.
    pub fn from_name(spec: &str, payload_type: PayloadType) -> Self {
        let (name, params) = match spec.split_once(';') {
            Some((name, params)) => (name.trim(), parse_params(params)),
            None => (spec.trim(), BTreeMap::new()),
        };
        CodecInfo {
            name: name.to_owned(),
            payload_type,
            params,
            ..Default::default()
        }
    }

    pub fn has_rtx(&self) -> bool {
        self.rtx.is_some()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn add_param(&mut self, key: &str, value: &str) {
        self.params.insert(key.to_owned(), value.to_owned());
    }

    pub fn add_rtcp_fb(&mut self, fb: RtcpFeedbackInfo) {
        if !self.rtcp_fbs.contains(&fb) {
            self.rtcp_fbs.push(fb);
        }
    }

    pub fn is(&self, name: &str) -> bool {
        UniCase::new(self.name.as_str()) == UniCase::new(name)
    }

    /// fmtp line content, None when the codec has no parameters.
    pub fn fmtp(&self) -> Option<String> {
        if self.params.is_empty() {
            None
        } else {
            Some(format_params(&self.params))
        }
    }

    /// Whether `other` describes the same codec for negotiation purposes.
    ///
    /// Names compare case-insensitively. H264 also needs the same
    /// packetization mode (absent means 0) and, when both sides declare one,
    /// the same profile-level-id.
    pub fn is_compatible(&self, other: &CodecInfo) -> bool {
        if UniCase::new(self.name.as_str()) != UniCase::new(other.name.as_str()) {
            return false;
        }
        if !self.is(CODEC_H264) {
            return true;
        }

        let mode = |c: &CodecInfo| c.param(PARAM_PACKETIZATION_MODE).unwrap_or("0").to_owned();
        if mode(self) != mode(other) {
            return false;
        }

        match (
            self.param(PARAM_PROFILE_LEVEL_ID),
            other.param(PARAM_PROFILE_LEVEL_ID),
        ) {
            (Some(a), Some(b)) => UniCase::new(a) == UniCase::new(b),
            _ => true,
        }
    }

    /// H264 parameters which identify the codec variant and must survive an answer.
    pub(crate) fn identity_params(&self) -> Vec<(&str, &str)> {
        [PARAM_PACKETIZATION_MODE, PARAM_PROFILE_LEVEL_ID]
            .into_iter()
            .filter_map(|k| self.param(k).map(|v| (k, v)))
            .collect()
    }

    /// Clock rate written in `a=rtpmap` when none was negotiated.
    pub fn clock_rate_or_default(&self, kind: MediaKind) -> u32 {
        self.clock_rate.unwrap_or(match kind {
            MediaKind::Video => 90000,
            _ if self.is(CODEC_OPUS) => 48000,
            _ => 8000,
        })
    }

    /// Channel count written in `a=rtpmap` when none was negotiated.
    pub fn channels_or_default(&self) -> Option<u16> {
        if self.channels.is_some() {
            self.channels
        } else if self.is(CODEC_OPUS) {
            Some(2)
        } else {
            None
        }
    }

    /// RED and FEC streams are not modelled as codecs.
    pub(crate) fn is_redundancy(name: &str) -> bool {
        let name = UniCase::new(name);
        name == UniCase::new(CODEC_RED)
            || name == UniCase::new(CODEC_ULPFEC)
            || name == UniCase::new(CODEC_FLEXFEC)
    }
}

/// Payload type referenced by an RTX fmtp line, `apt=96` gives 96.
pub(crate) fn find_apt(params: &BTreeMap<String, String>) -> Option<PayloadType> {
    params.get(PARAM_APT).and_then(|apt| apt.parse().ok())
}
