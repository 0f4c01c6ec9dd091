use crate::boundary::Boundary;
use crate::session::Session;
use std::sync::Arc;

/// Receives lifecycle and membership notifications from a
/// [`BoundaryManager`](crate::BoundaryManager).
///
/// Callbacks run synchronously on the thread that performed the operation,
/// with the manager lock held and the registry lock released. Read-only
/// manager queries (`application_for`, `helper_for`,
/// `for_each_participant_in`, ...) are safe to call from a callback. Mutating
/// manager operations are not and will deadlock.
///
/// `suspending` and `resuming` are only emitted for prompt boundaries.
pub trait Listener: Send + Sync {
    fn starting(&self, _boundary: &Arc<Boundary>) {}

    fn stopping(&self, _boundary: &Arc<Boundary>) {}

    fn suspending(&self, _boundary: &Arc<Boundary>) {}

    fn resuming(&self, _boundary: &Arc<Boundary>) {}

    fn participant_added(&self, _boundary: &Arc<Boundary>, _session: &Arc<dyn Session>) {}

    fn participant_removed(&self, _boundary: &Arc<Boundary>, _session: &Arc<dyn Session>) {}
}

/// Listener for hosts that do not care about notifications.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullListener;

impl Listener for NullListener {}

/// Forwards every notification to each registered listener in turn.
#[derive(Clone, Default)]
pub struct ListenerFanout {
    listeners: Vec<Arc<dyn Listener>>,
}

impl ListenerFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, listener: Arc<dyn Listener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn push(&mut self, listener: Arc<dyn Listener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl Listener for ListenerFanout {
    fn starting(&self, boundary: &Arc<Boundary>) {
        self.listeners.iter().for_each(|listener| listener.starting(boundary));
    }

    fn stopping(&self, boundary: &Arc<Boundary>) {
        self.listeners.iter().for_each(|listener| listener.stopping(boundary));
    }

    fn suspending(&self, boundary: &Arc<Boundary>) {
        self.listeners.iter().for_each(|listener| listener.suspending(boundary));
    }

    fn resuming(&self, boundary: &Arc<Boundary>) {
        self.listeners.iter().for_each(|listener| listener.resuming(boundary));
    }

    fn participant_added(&self, boundary: &Arc<Boundary>, session: &Arc<dyn Session>) {
        self.listeners.iter().for_each(|listener| listener.participant_added(boundary, session));
    }

    fn participant_removed(&self, boundary: &Arc<Boundary>, session: &Arc<dyn Session>) {
        self.listeners.iter().for_each(|listener| listener.participant_removed(boundary, session));
    }
}
