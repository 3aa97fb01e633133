use std::sync::Arc;

/// Handle returned when registering a listener, used to remove it again.
pub type ListenerId = u64;

/// Ordered list of callbacks registered for one event.
///
/// Callbacks are invoked in registration order. Owners keep a `Listeners`
/// behind their own lock and [snapshot](Listeners::snapshot) it before
/// emitting, so a callback may freely call back into its owner.
pub struct Listeners<F: ?Sized> {
    next_id: ListenerId,
    entries: Vec<(ListenerId, Arc<F>)>,
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Listeners {
            next_id: 1,
            entries: vec![],
        }
    }
}

impl<F: ?Sized> Listeners<F> {
    pub fn new() -> Self {
        Listeners::default()
    }

    pub fn add(&mut self, f: Arc<F>) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, f));
        id
    }

    /// Removes the listener `id`, returns false if it was not registered.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(i, _)| *i != id);
        self.entries.len() != before
    }

    pub fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries.iter().map(|(_, f)| Arc::clone(f)).collect()
    }

    /// Drains every listener, used when the owner emits its last event.
    pub fn take(&mut self) -> Vec<Arc<F>> {
        self.entries.drain(..).map(|(_, f)| f).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Callback without payload, e.g. `stopped`.
pub type OnEventFn = dyn Fn() + Send + Sync;
/// Callback receiving the new mute state.
pub type OnMuteFn = dyn Fn(bool) + Send + Sync;
