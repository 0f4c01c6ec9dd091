//! Lifecycle orchestration for trust and prompt boundaries.
//!
//! [`BoundaryManager`] is the only writer of its [`ParticipantRegistry`]. Every
//! mutating operation runs under one manager-level lock, distinct from the
//! registry's internal lock, and dispatches [`Listener`] callbacks while still
//! holding it. The registry lock is never held across a callback.
//!
//! Read-only queries ([`application_for`](BoundaryManager::application_for),
//! [`helper_for`](BoundaryManager::helper_for),
//! [`for_each_participant_in`](BoundaryManager::for_each_participant_in) and
//! friends) never take the manager lock, so listeners may call them
//! reentrantly. A listener that calls a mutating operation from inside a
//! callback deadlocks.

use crate::boundary::{Boundary, CreationParams};
use crate::config::{at_limit, ManagerConfig};
use crate::error::TrustError;
use crate::listener::Listener;
use crate::registry::{ParticipantRegistry, RegistrySnapshot};
use crate::session::{Session, SessionDirectory};
use crate::types::{BoundaryId, BoundaryKind, Pid, Role};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

pub struct BoundaryManager {
    registry: ParticipantRegistry,
    listener: Arc<dyn Listener>,
    config: ManagerConfig,
    next_id: AtomicU64,
    serial: Mutex<()>,
    live: RwLock<BTreeMap<BoundaryId, Arc<Boundary>>>,
}

impl BoundaryManager {
    pub fn new(listener: Arc<dyn Listener>) -> Self {
        Self::with_config(ManagerConfig::default(), listener)
    }

    pub fn with_config(config: ManagerConfig, listener: Arc<dyn Listener>) -> Self {
        Self {
            registry: ParticipantRegistry::new(),
            listener,
            config,
            next_id: AtomicU64::new(1),
            serial: Mutex::new(()),
            live: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn lock_serial(&self) -> MutexGuard<'_, ()> {
        self.serial.lock().expect("manager mutex poisoned")
    }

    /// Creates a boundary owned by `helper`.
    ///
    /// Prompt boundaries require a session with the target application pid to
    /// already be present in `sessions`; otherwise nothing is created, no
    /// listener is called and [`TrustError::TargetNotFound`] is returned.
    /// Trust boundaries always start and then trust `base_pid` as if by
    /// [`add_trusted_process`](Self::add_trusted_process). If that step fails
    /// the boundary is stopped again before the error is returned.
    pub fn start_for<D>(
        &self,
        helper: &Arc<dyn Session>,
        params: CreationParams,
        sessions: &D,
    ) -> Result<Arc<Boundary>, TrustError>
    where
        D: SessionDirectory + ?Sized,
    {
        let _serial = self.lock_serial();

        let owned = self.registry.boundaries_with_participant(helper, Some(Role::Helper)).len();
        if at_limit(owned, self.config.max_boundaries_per_helper) {
            log::warn!(
                "helper pid {} already owns {owned} boundaries, refusing another",
                helper.process_id()
            );
            return Err(TrustError::limit_exceeded(
                "max_boundaries_per_helper",
                self.config.max_boundaries_per_helper,
            ));
        }

        let application = match &params {
            CreationParams::Prompt(prompt) => {
                let Some(target) =
                    sessions.sessions_with_pid(prompt.application_pid).into_iter().next()
                else {
                    log::debug!(
                        "prompt for helper pid {}: no session with pid {}",
                        helper.process_id(),
                        prompt.application_pid
                    );
                    return Err(TrustError::TargetNotFound { pid: prompt.application_pid });
                };
                Some(target)
            }
            CreationParams::Trust(_) => None,
        };

        let id = BoundaryId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let boundary = Arc::new(Boundary::new(id, helper, params));
        self.registry.register_boundary(id);
        if let Err(err) = self.commit_founders(id, helper, application.as_ref()) {
            self.registry.unregister_boundary(id);
            return Err(err);
        }
        self.live
            .write()
            .expect("live boundaries lock poisoned")
            .insert(id, Arc::clone(&boundary));

        log::debug!(
            "boundary({id}): {} started by helper pid {} {:?}",
            boundary.kind(),
            helper.process_id(),
            helper.name()
        );
        self.listener.starting(&boundary);

        if let CreationParams::Trust(trust) = boundary.params() {
            if let Err(err) = self.trust_process_locked(&boundary, trust.base_pid, sessions) {
                log::warn!("boundary({id}): trusting base pid {} failed: {err}", trust.base_pid);
                self.stop_locked(&boundary);
                return Err(err);
            }
        }
        Ok(boundary)
    }

    fn commit_founders(
        &self,
        id: BoundaryId,
        helper: &Arc<dyn Session>,
        application: Option<&Arc<dyn Session>>,
    ) -> Result<(), TrustError> {
        self.registry.insert_participant(id, helper, Role::Helper)?;
        if let Some(application) = application {
            self.registry.insert_participant(id, application, Role::Application)?;
        }
        Ok(())
    }

    /// Trusts `pid` on `boundary`: records a waiting entry, then adds every
    /// session in `sessions` with that pid as a provider.
    ///
    /// Returns how many providers were added now. Sessions connecting later
    /// are picked up by [`notify_session_connected`](Self::notify_session_connected).
    pub fn add_trusted_process<D>(
        &self,
        boundary: &Arc<Boundary>,
        pid: Pid,
        sessions: &D,
    ) -> Result<usize, TrustError>
    where
        D: SessionDirectory + ?Sized,
    {
        let _serial = self.lock_serial();
        if !self.owns(boundary) {
            log::debug!("boundary({}): not live, ignoring trusted pid {pid}", boundary.id());
            return Ok(0);
        }
        self.trust_process_locked(boundary, pid, sessions)
    }

    fn trust_process_locked<D>(
        &self,
        boundary: &Arc<Boundary>,
        pid: Pid,
        sessions: &D,
    ) -> Result<usize, TrustError>
    where
        D: SessionDirectory + ?Sized,
    {
        let id = boundary.id();
        if at_limit(self.registry.waiting_count(id), self.config.max_waiting_per_boundary) {
            log::warn!("boundary({id}): waiting limit reached, refusing pid {pid}");
            return Err(TrustError::limit_exceeded(
                "max_waiting_per_boundary",
                self.config.max_waiting_per_boundary,
            ));
        }
        self.registry.insert_waiting_process(id, pid)?;

        let mut added = 0;
        for session in sessions.sessions_with_pid(pid) {
            if self.admit_matched_provider(boundary, &session)? {
                added += 1;
            }
        }
        if added == 0 {
            log::trace!("boundary({id}): pid {pid} not connected yet, waiting");
        }
        Ok(added)
    }

    /// Adds `session` to `boundary` as a provider, without pid matching.
    ///
    /// Returns `Ok(false)` if it already is one or the boundary is not live.
    pub fn add_participant(
        &self,
        boundary: &Arc<Boundary>,
        session: &Arc<dyn Session>,
    ) -> Result<bool, TrustError> {
        let _serial = self.lock_serial();
        if !self.owns(boundary) {
            log::debug!("boundary({}): not live, ignoring participant", boundary.id());
            return Ok(false);
        }
        self.insert_provider_locked(boundary, session)
    }

    /// Trigger from the session layer: a new client has connected.
    ///
    /// Every live boundary waiting for the session's pid gains it as a
    /// provider. Returns the number of boundaries it joined.
    pub fn notify_session_connected(
        &self,
        session: &Arc<dyn Session>,
    ) -> Result<usize, TrustError> {
        let _serial = self.lock_serial();
        let pid = session.process_id();
        let mut joined = 0;
        for id in self.registry.boundaries_waiting_for(pid) {
            let Some(boundary) = self.boundary(id) else {
                continue;
            };
            if self.admit_matched_provider(&boundary, session)? {
                joined += 1;
            }
        }
        Ok(joined)
    }

    /// Provider insertion on behalf of pid matching. Hitting the participant
    /// limit is logged and skipped, leaving the waiting entry in place.
    fn admit_matched_provider(
        &self,
        boundary: &Arc<Boundary>,
        session: &Arc<dyn Session>,
    ) -> Result<bool, TrustError> {
        match self.insert_provider_locked(boundary, session) {
            Err(TrustError::LimitExceeded { .. }) => Ok(false),
            other => other,
        }
    }

    fn insert_provider_locked(
        &self,
        boundary: &Arc<Boundary>,
        session: &Arc<dyn Session>,
    ) -> Result<bool, TrustError> {
        let id = boundary.id();
        let already = self
            .registry
            .boundaries_with_participant(session, Some(Role::Provider))
            .iter()
            .any(|(existing, _)| *existing == id);
        if already {
            return Ok(false);
        }

        let members = self.non_helper_count(id);
        if at_limit(members, self.config.max_participants_per_boundary) {
            log::warn!(
                "boundary({id}): participant limit reached, refusing pid {}",
                session.process_id()
            );
            return Err(TrustError::limit_exceeded(
                "max_participants_per_boundary",
                self.config.max_participants_per_boundary,
            ));
        }

        if !self.registry.insert_participant(id, session, Role::Provider)? {
            return Ok(false);
        }
        log::debug!(
            "boundary({id}): provider pid {} {:?} added",
            session.process_id(),
            session.name()
        );
        self.listener.participant_added(boundary, session);
        Ok(true)
    }

    fn non_helper_count(&self, id: BoundaryId) -> usize {
        self.registry
            .participants(id, None)
            .iter()
            .filter(|(_, role)| *role != Role::Helper)
            .count()
    }

    /// `Started -> Suspended` for prompt boundaries. Returns whether the state
    /// changed; trust boundaries never suspend.
    pub fn suspend(&self, boundary: &Arc<Boundary>) -> bool {
        let _serial = self.lock_serial();
        if boundary.kind() != BoundaryKind::Prompt || !self.owns(boundary) {
            return false;
        }
        if !boundary.mark_suspended() {
            return false;
        }
        log::debug!("boundary({}): suspended", boundary.id());
        self.listener.suspending(boundary);
        true
    }

    /// `Suspended -> Started` for prompt boundaries. Returns whether the state
    /// changed.
    pub fn resume(&self, boundary: &Arc<Boundary>) -> bool {
        let _serial = self.lock_serial();
        if boundary.kind() != BoundaryKind::Prompt || !self.owns(boundary) {
            return false;
        }
        if !boundary.mark_resumed() {
            return false;
        }
        log::debug!("boundary({}): resumed", boundary.id());
        self.listener.resuming(boundary);
        true
    }

    /// Stops `boundary`, notifying removal of each provider before purging it
    /// from the registry. Idempotent; returns `false` if it was already stopped.
    pub fn stop(&self, boundary: &Arc<Boundary>) -> bool {
        let _serial = self.lock_serial();
        if !self.owns(boundary) {
            return false;
        }
        self.stop_locked(boundary)
    }

    fn stop_locked(&self, boundary: &Arc<Boundary>) -> bool {
        if !boundary.mark_stopped() {
            return false;
        }
        let id = boundary.id();
        let providers = self.registry.participants(id, Some(Role::Provider));
        for (session, _) in &providers {
            self.listener.participant_removed(boundary, session);
        }
        let purged = self.registry.unregister_boundary(id);
        self.live.write().expect("live boundaries lock poisoned").remove(&id);

        log::debug!(
            "boundary({id}): stopped, {} providers released, {purged} entries purged",
            providers.len()
        );
        self.listener.stopping(boundary);
        true
    }

    /// Detaches a departing session from everything.
    ///
    /// Boundaries it owns as helper are stopped. On boundaries where it was
    /// any other participant it is removed and the boundary stays alive.
    pub fn remove_session(&self, session: &Arc<dyn Session>) -> Result<(), TrustError> {
        let _serial = self.lock_serial();
        let memberships = self.registry.boundaries_with_participant(session, None);

        for (id, _) in memberships.iter().filter(|(_, role)| *role == Role::Helper) {
            let Some(boundary) = self.boundary(*id) else {
                continue;
            };
            if !boundary.is_helper(session) {
                log::warn!(
                    "boundary({id}): helper entry for pid {} does not match its owner",
                    session.process_id()
                );
                continue;
            }
            self.stop_locked(&boundary);
        }

        for (id, role) in memberships.iter().filter(|(_, role)| *role != Role::Helper) {
            let Some(boundary) = self.boundary(*id) else {
                continue;
            };
            if self.registry.remove_participant(*id, session, *role)? {
                log::debug!(
                    "boundary({id}): {role} pid {} {:?} removed",
                    session.process_id(),
                    session.name()
                );
                self.listener.participant_removed(&boundary, session);
            }
        }
        Ok(())
    }

    fn owns(&self, boundary: &Arc<Boundary>) -> bool {
        self.boundary(boundary.id()).is_some_and(|live| Arc::ptr_eq(&live, boundary))
    }

    /// The live boundary with `id`, if any.
    pub fn boundary(&self, id: BoundaryId) -> Option<Arc<Boundary>> {
        self.live.read().expect("live boundaries lock poisoned").get(&id).cloned()
    }

    pub fn live_boundaries(&self) -> usize {
        self.live.read().expect("live boundaries lock poisoned").len()
    }

    /// Live boundaries `session` owns as helper, oldest first.
    pub fn boundaries_for_helper(&self, session: &Arc<dyn Session>) -> Vec<Arc<Boundary>> {
        self.registry
            .boundaries_with_participant(session, Some(Role::Helper))
            .into_iter()
            .filter_map(|(id, _)| self.boundary(id))
            .collect()
    }

    /// The prompt target of `boundary`. `None` for trust boundaries, once the
    /// boundary has stopped, or if the application has gone away.
    pub fn application_for(&self, boundary: &Boundary) -> Option<Arc<dyn Session>> {
        self.registry
            .participants(boundary.id(), Some(Role::Application))
            .into_iter()
            .next()
            .map(|(session, _)| session)
    }

    /// The helper of `boundary`. `None` once the boundary has stopped or the
    /// helper has gone away.
    pub fn helper_for(&self, boundary: &Boundary) -> Option<Arc<dyn Session>> {
        self.registry
            .participants(boundary.id(), Some(Role::Helper))
            .into_iter()
            .next()
            .map(|(session, _)| session)
    }

    pub fn participants_in(
        &self,
        boundary: &Boundary,
        role_filter: Option<Role>,
    ) -> Vec<(Arc<dyn Session>, Role)> {
        self.registry.participants(boundary.id(), role_filter)
    }

    /// Invokes `f` for each participant of `boundary` in the order they joined.
    pub fn for_each_participant_in<F>(&self, boundary: &Boundary, f: F)
    where
        F: FnMut(&Arc<dyn Session>, Role),
    {
        self.registry.for_each_participant(boundary.id(), None, f);
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }
}
