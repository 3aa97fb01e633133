use std::fmt;

use crate::UNSPECIFIED_STR;

/// DTLS role negotiation attribute (`a=setup`).
///
/// ## Specifications
///
/// * [RFC 4145 section 4](https://datatracker.ietf.org/doc/html/rfc4145#section-4)
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Setup {
    Unspecified,
    Active,
    Passive,
    #[default]
    Actpass,
    Inactive,
}

const SETUP_ACTIVE_STR: &str = "active";
const SETUP_PASSIVE_STR: &str = "passive";
const SETUP_ACTPASS_STR: &str = "actpass";
const SETUP_INACTIVE_STR: &str = "inactive";

impl From<&str> for Setup {
    fn from(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            SETUP_ACTIVE_STR => Setup::Active,
            SETUP_PASSIVE_STR => Setup::Passive,
            SETUP_ACTPASS_STR => Setup::Actpass,
            SETUP_INACTIVE_STR => Setup::Inactive,
            _ => Setup::Unspecified,
        }
    }
}

impl fmt::Display for Setup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Setup::Active => write!(f, "{SETUP_ACTIVE_STR}"),
            Setup::Passive => write!(f, "{SETUP_PASSIVE_STR}"),
            Setup::Actpass => write!(f, "{SETUP_ACTPASS_STR}"),
            Setup::Inactive => write!(f, "{SETUP_INACTIVE_STR}"),
            _ => write!(f, "{UNSPECIFIED_STR}"),
        }
    }
}

impl Setup {
    /// Role to answer with when the remote side announced `self`.
    pub fn reverse(&self) -> Setup {
        match *self {
            Setup::Active => Setup::Passive,
            Setup::Passive => Setup::Active,
            Setup::Actpass => Setup::Passive,
            _ => *self,
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DtlsInfo {
    pub setup: Setup,
    pub hash: String,
    pub fingerprint: String,
}

impl DtlsInfo {
    pub fn new(setup: Setup, hash: &str, fingerprint: &str) -> Self {
        DtlsInfo {
            setup,
            hash: hash.to_owned(),
            fingerprint: fingerprint.to_owned(),
        }
    }
}
