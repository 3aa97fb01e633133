use std::sync::{Arc, Mutex, Weak};

use log::debug;
use sdp::track::{SOURCE_GROUP_FEC_FR, SOURCE_GROUP_FID};
use sdp::{MediaKind, TrackInfo};
use shared::error::{Error, Result};

use super::incoming_track::IncomingStreamTrack;
use crate::engine::{
    OutgoingSource, OutgoingSourceGroup, OutgoingSourceStats, SourceGroupSsrcs, TransportEngine,
};
use crate::listener::{ListenerId, Listeners, OnEventFn, OnMuteFn};
use crate::lock;
use crate::transponder::Transponder;

struct OutgoingStreamTrackInternal {
    muted: bool,
    stopped: bool,
    transponder: Option<Arc<Transponder>>,
    transponder_listener: Option<ListenerId>,
    on_muted: Listeners<OnMuteFn>,
    on_stopped: Listeners<OnEventFn>,
}

/// A track sent to the remote peer, fed by at most one transponder.
pub struct OutgoingStreamTrack {
    id: String,
    kind: MediaKind,
    info: TrackInfo,
    group: OutgoingSourceGroup,
    source: Arc<dyn OutgoingSource>,
    transport: Arc<dyn TransportEngine>,
    weak_self: Weak<OutgoingStreamTrack>,
    internal: Mutex<OutgoingStreamTrackInternal>,
}

impl OutgoingStreamTrack {
    /// Registers the source group announced by `info` with the engine.
    pub(crate) fn create(info: &TrackInfo, transport: Arc<dyn TransportEngine>) -> Result<Arc<Self>> {
        let Some(media) = info.ssrcs.first().copied() else {
            return Err(Error::ErrTrackWithoutSsrc(info.id.clone()));
        };
        let group = OutgoingSourceGroup {
            kind: info.kind,
            ssrcs: SourceGroupSsrcs {
                media: Some(media),
                rtx: info
                    .source_group_for(SOURCE_GROUP_FID, media)
                    .and_then(|g| g.secondary()),
                fec: info
                    .source_group_for(SOURCE_GROUP_FEC_FR, media)
                    .and_then(|g| g.secondary()),
            },
        };
        let source = transport.add_outgoing_source_group(&group)?;
        debug!("outgoing track {} created with ssrcs {:?}", info.id, group.ssrcs.all());

        Ok(Arc::new_cyclic(|weak_self| OutgoingStreamTrack {
            id: info.id.clone(),
            kind: info.kind,
            info: info.clone(),
            group,
            source,
            transport,
            weak_self: weak_self.clone(),
            internal: Mutex::new(OutgoingStreamTrackInternal {
                muted: false,
                stopped: false,
                transponder: None,
                transponder_listener: None,
                on_muted: Listeners::new(),
                on_stopped: Listeners::new(),
            }),
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn info(&self) -> TrackInfo {
        self.info.clone()
    }

    pub fn ssrcs(&self) -> SourceGroupSsrcs {
        self.group.ssrcs
    }

    pub fn stats(&self) -> OutgoingSourceStats {
        self.source.stats()
    }

    pub fn is_muted(&self) -> bool {
        lock(&self.internal).muted
    }

    /// Mutes the track and its transponder, listeners only hear about changes.
    pub fn mute(&self, muting: bool) {
        let (transponder, callbacks) = {
            let mut internal = lock(&self.internal);
            let callbacks = if internal.muted != muting {
                internal.muted = muting;
                internal.on_muted.snapshot()
            } else {
                vec![]
            };
            (internal.transponder.clone(), callbacks)
        };

        if let Some(transponder) = transponder {
            transponder.mute(muting);
        }
        for f in callbacks {
            f(muting);
        }
    }

    /// Starts forwarding `incoming` on this track, replacing any previous source.
    pub fn attach_to(&self, incoming: &Arc<IncomingStreamTrack>) -> Result<Arc<Transponder>> {
        if self.is_stopped() {
            return Err(Error::ErrClosed);
        }
        self.detach();

        let transponder = Transponder::new(self.source.create_transponder());
        if self.is_muted() {
            transponder.mute(true);
        }
        if let Err(err) = transponder.set_incoming_track(Some(Arc::clone(incoming))) {
            transponder.stop();
            return Err(err);
        }

        let weak_self = self.weak_self.clone();
        let weak_transponder = Arc::downgrade(&transponder);
        let listener = transponder.on_stopped(move || {
            let Some(track) = weak_self.upgrade() else {
                return;
            };
            let mut internal = lock(&track.internal);
            let current = internal
                .transponder
                .as_ref()
                .is_some_and(|t| Weak::ptr_eq(&Arc::downgrade(t), &weak_transponder));
            if current {
                internal.transponder = None;
                internal.transponder_listener = None;
            }
        });

        {
            let mut internal = lock(&self.internal);
            internal.transponder = Some(Arc::clone(&transponder));
            internal.transponder_listener = Some(listener);
        }
        debug!("outgoing track {} attached to {}", self.id, incoming.id());

        Ok(transponder)
    }

    /// Stops the current transponder, if any.
    pub fn detach(&self) {
        let (transponder, listener) = {
            let mut internal = lock(&self.internal);
            (internal.transponder.take(), internal.transponder_listener.take())
        };

        if let Some(transponder) = transponder {
            if let Some(id) = listener {
                transponder.remove_stopped_listener(id);
            }
            transponder.stop();
        }
    }

    pub fn transponder(&self) -> Option<Arc<Transponder>> {
        lock(&self.internal).transponder.clone()
    }

    pub fn on_muted<F>(&self, f: F) -> ListenerId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        lock(&self.internal).on_muted.add(Arc::new(f))
    }

    pub fn on_stopped<F>(&self, f: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.internal).on_stopped.add(Arc::new(f))
    }

    pub fn remove_stopped_listener(&self, id: ListenerId) -> bool {
        lock(&self.internal).on_stopped.remove(id)
    }

    pub fn is_stopped(&self) -> bool {
        lock(&self.internal).stopped
    }

    /// Detaches, notifies listeners and releases the engine source. Idempotent.
    pub fn stop(&self) {
        let callbacks = {
            let mut internal = lock(&self.internal);
            if internal.stopped {
                return;
            }
            internal.stopped = true;
            internal.on_stopped.take()
        };

        self.detach();
        debug!("outgoing track {} stopped", self.id);

        for f in callbacks {
            f();
        }
        self.transport.remove_outgoing_source_group(&self.group);
    }
}
