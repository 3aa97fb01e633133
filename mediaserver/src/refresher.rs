use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use log::{debug, trace};
use sdp::MediaKind;
use shared::error::{Error, Result};

use crate::stream::{IncomingStream, IncomingStreamTrack};

/// Periodically requests key frames on a set of incoming video tracks.
///
/// The refresher does no I/O and owns no timer: the caller asks
/// [`poll_timeout`](Refresher::poll_timeout) when to wake up next and drives
/// it with [`handle_timeout`](Refresher::handle_timeout). Tracks are held
/// weakly and forgotten once stopped or dropped.
pub struct Refresher {
    period: Duration,
    tracks: BTreeMap<String, Weak<IncomingStreamTrack>>,
    deadline: Option<Instant>,
    closed: bool,
}

impl Refresher {
    pub fn new(period: Duration) -> Self {
        Refresher {
            period,
            tracks: BTreeMap::new(),
            deadline: None,
            closed: false,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Adds `track`, returns false when it is not a running video track.
    ///
    /// The first track arms the timer one period after `now`.
    pub fn add(&mut self, track: &Arc<IncomingStreamTrack>, now: Instant) -> Result<bool> {
        if self.closed {
            return Err(Error::ErrClosed);
        }
        if track.kind() != MediaKind::Video || track.is_stopped() {
            trace!("refresher skips track {}", track.id());
            return Ok(false);
        }

        self.tracks.insert(track.id().to_owned(), Arc::downgrade(track));
        if self.deadline.is_none() {
            self.deadline = Some(now + self.period);
        }
        Ok(true)
    }

    /// Adds every video track of `stream`, returns how many were added.
    pub fn add_stream(&mut self, stream: &IncomingStream, now: Instant) -> Result<usize> {
        let mut added = 0;
        for track in stream.video_tracks() {
            if self.add(&track, now)? {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.tracks.remove(id).is_some();
        if self.tracks.is_empty() {
            self.deadline = None;
        }
        removed
    }

    /// Tracks still refreshed.
    pub fn tracks(&self) -> Vec<Arc<IncomingStreamTrack>> {
        self.tracks
            .values()
            .filter_map(Weak::upgrade)
            .filter(|t| !t.is_stopped())
            .collect()
    }

    pub fn poll_timeout(&self) -> Option<Instant> {
        self.deadline
    }

    /// Refreshes every track when the deadline passed and rearms the timer.
    /// Returns the number of tracks refreshed.
    pub fn handle_timeout(&mut self, now: Instant) -> usize {
        match self.deadline {
            Some(deadline) if deadline <= now => {}
            _ => return 0,
        }

        let mut live = vec![];
        self.tracks.retain(|_, track| match track.upgrade() {
            Some(track) if !track.is_stopped() => {
                live.push(track);
                true
            }
            _ => false,
        });
        self.deadline = if self.tracks.is_empty() {
            None
        } else {
            Some(now + self.period)
        };

        for track in &live {
            track.refresh();
        }
        trace!("refreshed {} tracks", live.len());
        live.len()
    }

    /// Forgets every track and disarms the timer. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.tracks.clear();
        self.deadline = None;
        debug!("refresher closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
