//! Facades over the engine sources of received and sent media.

pub mod incoming;
pub mod incoming_track;
pub mod outgoing;
pub mod outgoing_track;

pub use incoming::IncomingStream;
pub use incoming_track::{ActiveLayer, ActiveLayers, IncomingStreamTrack, TrackEncoding};
pub use outgoing::OutgoingStream;
pub use outgoing_track::OutgoingStreamTrack;
