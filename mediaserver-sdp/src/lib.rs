#![warn(rust_2018_idioms)]
#![allow(dead_code)]

#[macro_use]
extern crate lazy_static;

pub mod candidate;
pub mod capability;
pub mod codec;
pub mod direction;
pub mod dtls;
pub mod grammar;
pub mod ice;
pub mod media;
pub mod rid;
pub mod session;
pub mod simulcast;
pub mod stream;
pub mod track;
pub mod transform;

pub use candidate::CandidateInfo;
pub use capability::{Capabilities, Capability};
pub use codec::{CodecInfo, MediaKind, PayloadType, RtcpFeedbackInfo};
pub use direction::{Direction, DirectionWay};
pub use dtls::{DtlsInfo, Setup};
pub use ice::IceInfo;
pub use media::MediaInfo;
pub use rid::RidInfo;
pub use session::SessionInfo;
pub use simulcast::{SimulcastInfo, SimulcastStreamInfo};
pub use stream::StreamInfo;
pub use track::{SSRC, SourceGroupInfo, TrackEncodingInfo, TrackInfo};

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";
