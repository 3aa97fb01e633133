use shared::util::math_rand_alpha_number;

/// Length of a generated ICE username fragment, RFC 8445 requires at least 4 characters.
const ICE_UFRAG_LEN: usize = 8;
/// Length of a generated ICE password, RFC 8445 requires at least 22 characters.
const ICE_PWD_LEN: usize = 24;

/// ICE credentials and flags of one side of the session.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct IceInfo {
    pub ufrag: String,
    pub pwd: String,
    pub lite: bool,
    pub end_of_candidates: bool,
}

impl IceInfo {
    pub fn new(ufrag: &str, pwd: &str) -> Self {
        IceInfo {
            ufrag: ufrag.to_owned(),
            pwd: pwd.to_owned(),
            ..Default::default()
        }
    }

    /// Generates random credentials.
    pub fn generate(lite: bool) -> Self {
        IceInfo {
            ufrag: math_rand_alpha_number(ICE_UFRAG_LEN),
            pwd: math_rand_alpha_number(ICE_PWD_LEN),
            lite,
            end_of_candidates: false,
        }
    }
}
