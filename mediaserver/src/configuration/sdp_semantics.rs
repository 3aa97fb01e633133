use std::fmt;

use serde::{Deserialize, Serialize};

/// SDP semantics determining how tracks are laid out in media sections.
///
/// # Unified Plan vs Plan B
///
/// - **Unified Plan** - one m= line per track, media sections are paired
///   with transceivers.
///
/// - **Plan B** - one m= line per media kind, every track of that kind
///   announced through its SSRCs.
///
/// # Examples
///
/// ```
/// use mediaserver::configuration::SdpSemantics;
///
/// let semantics = SdpSemantics::from("plan-b");
/// assert_eq!(semantics, SdpSemantics::PlanB);
/// assert_eq!(SdpSemantics::default().to_string(), "unified-plan");
/// ```
///
/// ## Specifications
///
/// * [Unified Plan](https://tools.ietf.org/html/draft-roach-mmusic-unified-plan-00)
/// * [Plan B](https://tools.ietf.org/html/draft-uberti-rtcweb-plan-00)
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum SdpSemantics {
    /// Unspecified - not a valid semantic
    #[serde(rename = "unspecified")]
    Unspecified = 0,

    /// Unified Plan, the default.
    #[serde(rename = "unified-plan")]
    #[default]
    UnifiedPlan = 1,

    /// Plan B, still spoken by legacy browsers.
    #[serde(rename = "plan-b")]
    PlanB = 2,
}

const SDP_SEMANTICS_UNIFIED_PLAN: &str = "unified-plan";
const SDP_SEMANTICS_PLAN_B: &str = "plan-b";

impl From<&str> for SdpSemantics {
    fn from(raw: &str) -> Self {
        match raw {
            SDP_SEMANTICS_UNIFIED_PLAN => SdpSemantics::UnifiedPlan,
            SDP_SEMANTICS_PLAN_B => SdpSemantics::PlanB,
            _ => SdpSemantics::Unspecified,
        }
    }
}

impl fmt::Display for SdpSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            SdpSemantics::UnifiedPlan => SDP_SEMANTICS_UNIFIED_PLAN,
            SdpSemantics::PlanB => SDP_SEMANTICS_PLAN_B,
            SdpSemantics::Unspecified => crate::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}
