use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared::error::Result;

use crate::codec::{MediaKind, RtcpFeedbackInfo};

/// What the local side supports for one media kind.
///
/// Codec names may carry fmtp style parameters which become part of the
/// codec identity, e.g. `h264;packetization-mode=1;profile-level-id=42e01f`.
///
/// ```
/// use mediaserver_sdp::capability::Capability;
///
/// let capability = Capability::from_json(r#"{
///     "codecs": ["vp8", "h264;packetization-mode=1"],
///     "rtx": true,
///     "rtcpfbs": [{"id": "nack"}, {"id": "nack", "params": ["pli"]}],
///     "extensions": ["urn:3gpp:video-orientation"]
/// }"#).unwrap();
///
/// assert!(capability.rtx);
/// assert!(!capability.simulcast);
/// assert_eq!(capability.rtcpfbs[1].params, vec!["pli".to_owned()]);
/// ```
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capability {
    pub codecs: Vec<String>,
    pub rtx: bool,
    pub rtcpfbs: Vec<RtcpFeedbackInfo>,
    pub extensions: Vec<String>,
    pub simulcast: bool,
}

/// Capabilities of every media kind the local side is willing to negotiate.
pub type Capabilities = BTreeMap<MediaKind, Capability>;

impl Capability {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a `{"audio": {...}, "video": {...}}` document.
    pub fn capabilities_from_json(json: &str) -> Result<Capabilities> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn supports_extension(&self, uri: &str) -> bool {
        self.extensions.iter().any(|e| e == uri)
    }
}
