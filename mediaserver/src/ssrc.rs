use std::collections::HashSet;
use std::sync::Mutex;

use log::trace;
use sdp::SSRC;
use shared::error::{Error, Result};

use crate::lock;

/// First SSRC handed out, keeps generated SSRCs clear of small values
/// commonly picked by hand.
pub const SSRC_MIN: SSRC = 1_000_000_000;
pub const SSRC_MAX: SSRC = SSRC::MAX;

#[derive(Debug)]
struct SsrcAllocatorInternal {
    next: SSRC,
    in_use: HashSet<SSRC>,
}

/// Hands out SSRCs for locally originated sources.
///
/// Values increase monotonically from [`SSRC_MIN`] and wrap back to it past
/// [`SSRC_MAX`]. SSRCs still in use are skipped until [released](SsrcAllocator::release).
#[derive(Debug)]
pub struct SsrcAllocator {
    internal: Mutex<SsrcAllocatorInternal>,
}

impl Default for SsrcAllocator {
    fn default() -> Self {
        SsrcAllocator::starting_at(SSRC_MIN)
    }
}

impl SsrcAllocator {
    pub fn new() -> Self {
        SsrcAllocator::default()
    }

    /// Allocator whose first candidate is `first`, clamped into the range.
    pub fn starting_at(first: SSRC) -> Self {
        SsrcAllocator {
            internal: Mutex::new(SsrcAllocatorInternal {
                next: first.max(SSRC_MIN),
                in_use: HashSet::new(),
            }),
        }
    }

    pub fn allocate(&self) -> Result<SSRC> {
        let mut internal = lock(&self.internal);

        let range = u64::from(SSRC_MAX - SSRC_MIN) + 1;
        if internal.in_use.len() as u64 >= range {
            return Err(Error::ErrSsrcExhausted);
        }

        loop {
            let candidate = internal.next;
            internal.next = if candidate == SSRC_MAX {
                trace!("ssrc allocator wrapped around");
                SSRC_MIN
            } else {
                candidate + 1
            };
            if internal.in_use.insert(candidate) {
                return Ok(candidate);
            }
        }
    }

    /// Marks an externally chosen SSRC as used, returns false if it already was.
    pub fn reserve(&self, ssrc: SSRC) -> bool {
        lock(&self.internal).in_use.insert(ssrc)
    }

    pub fn release(&self, ssrc: SSRC) {
        lock(&self.internal).in_use.remove(&ssrc);
    }

    pub fn is_in_use(&self, ssrc: SSRC) -> bool {
        lock(&self.internal).in_use.contains(&ssrc)
    }
}
