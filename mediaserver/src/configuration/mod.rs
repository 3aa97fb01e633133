pub mod sdp_semantics;

pub use sdp_semantics::SdpSemantics;

use sdp::{Capabilities, Capability, MediaKind};
use serde::{Deserialize, Serialize};
use shared::error::Result;

/// Configuration of one negotiation session: which semantics it speaks and
/// what the local side is able to send and receive.
///
/// ```
/// use mediaserver::configuration::{SdpManagerConfiguration, SdpSemantics};
///
/// let configuration = SdpManagerConfiguration::from_json(r#"{
///     "sdp_semantics": "plan-b",
///     "capabilities": {"audio": {"codecs": ["opus"]}}
/// }"#).unwrap();
/// assert_eq!(configuration.sdp_semantics(), SdpSemantics::PlanB);
/// ```
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdpManagerConfiguration {
    /// sdp_semantics selects the Plan B or Unified Plan manager.
    pub(crate) sdp_semantics: SdpSemantics,

    /// capabilities lists, per media kind, the codecs, feedback mechanisms
    /// and header extensions offered or accepted. Kinds missing here are
    /// rejected in answers.
    pub(crate) capabilities: Capabilities,
}

impl SdpManagerConfiguration {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn sdp_semantics(&self) -> SdpSemantics {
        self.sdp_semantics
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }
}

#[derive(Default)]
pub struct SdpManagerConfigurationBuilder {
    /// sdp_semantics selects the Plan B or Unified Plan manager.
    pub(crate) sdp_semantics: SdpSemantics,

    /// capabilities lists, per media kind, what the local side supports.
    pub(crate) capabilities: Capabilities,
}

impl SdpManagerConfigurationBuilder {
    pub fn new() -> Self {
        SdpManagerConfigurationBuilder::default()
    }

    pub fn with_sdp_semantics(mut self, sdp_semantics: SdpSemantics) -> Self {
        self.sdp_semantics = sdp_semantics;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_capability(mut self, kind: MediaKind, capability: Capability) -> Self {
        self.capabilities.insert(kind, capability);
        self
    }

    pub fn build(self) -> SdpManagerConfiguration {
        SdpManagerConfiguration {
            sdp_semantics: self.sdp_semantics,
            capabilities: self.capabilities,
        }
    }
}
