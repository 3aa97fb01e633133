#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod configuration;
pub mod dtls_state;
pub mod endpoint;
pub mod engine;
pub mod listener;
pub mod refresher;
pub mod sdp_manager;
pub mod ssrc;
pub mod stream;
pub mod transponder;
pub mod transport;

pub use configuration::{SdpManagerConfiguration, SdpManagerConfigurationBuilder, SdpSemantics};
pub use dtls_state::DtlsState;
pub use endpoint::Endpoint;
pub use refresher::Refresher;
pub use sdp_manager::{SdpManager, SdpManagerPlanB, SdpManagerUnified, create_sdp_manager, state::SdpManagerState};
pub use transponder::{LayerTraversal, Transponder};
pub use transport::Transport;

use std::sync::{Mutex, MutexGuard};

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";

/// Locks `mutex`, recovering the data of a poisoned lock.
///
/// Listener callbacks run outside of every lock, so a poisoned mutex only
/// means a panic happened between two plain field updates.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
