//! Participant relationship registry.
//!
//! Tracks `(boundary, session, role)` associations and the pids each boundary
//! is still waiting to see connect. Every entry, participant or waiting, is
//! stamped with a sequence number from one counter shared across boundaries;
//! enumeration is always in ascending sequence order.
//!
//! The registry holds [`BoundaryId`]s and [`Weak`] session references only.
//! It never keeps a boundary or a session alive. Associations whose session
//! has been dropped are pruned lazily the next time an enumeration touches
//! them.
//!
//! All methods take the internal lock for a bounded critical section. Callback
//! variants copy what they need out first and invoke the callback with the
//! lock released, so callbacks may re-enter the registry.

use crate::error::TrustError;
use crate::session::{Session, SessionKey};
use crate::sync::Mutex;
use crate::types::{BoundaryId, Pid, Role};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Weak};

struct Participant {
    session: Weak<dyn Session>,
    key: SessionKey,
    pid: Pid,
    role: Role,
}

#[derive(Default)]
struct Indexes {
    next_seq: u64,
    registered: HashSet<BoundaryId>,
    by_boundary: HashMap<BoundaryId, BTreeMap<u64, Participant>>,
    by_session: HashMap<SessionKey, BTreeMap<u64, (BoundaryId, Role)>>,
    unique: HashMap<(BoundaryId, SessionKey, Role), u64>,
    waiting: BTreeMap<u64, (BoundaryId, Pid)>,
    waiting_by_boundary: HashMap<BoundaryId, BTreeSet<u64>>,
    waiting_by_pid: HashMap<Pid, BTreeSet<u64>>,
}

impl Indexes {
    fn allocate_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn ensure_registered(&self, boundary: BoundaryId) -> Result<(), TrustError> {
        if self.registered.contains(&boundary) {
            Ok(())
        } else {
            Err(TrustError::InvalidBoundary { id: boundary })
        }
    }

    fn detach_participant(&mut self, boundary: BoundaryId, seq: u64) -> Option<Participant> {
        let entries = self.by_boundary.get_mut(&boundary)?;
        let participant = entries.remove(&seq)?;
        self.unique.remove(&(boundary, participant.key, participant.role));
        if let Some(sessions) = self.by_session.get_mut(&participant.key) {
            sessions.remove(&seq);
            if sessions.is_empty() {
                self.by_session.remove(&participant.key);
            }
        }
        Some(participant)
    }

    fn detach_waiting(&mut self, seq: u64) -> Option<(BoundaryId, Pid)> {
        let (boundary, pid) = self.waiting.remove(&seq)?;
        if let Some(seqs) = self.waiting_by_boundary.get_mut(&boundary) {
            seqs.remove(&seq);
            if seqs.is_empty() {
                self.waiting_by_boundary.remove(&boundary);
            }
        }
        if let Some(seqs) = self.waiting_by_pid.get_mut(&pid) {
            seqs.remove(&seq);
            if seqs.is_empty() {
                self.waiting_by_pid.remove(&pid);
            }
        }
        Some((boundary, pid))
    }

    /// Consumes the oldest waiting entry for `(boundary, pid)`, if any.
    fn consume_waiting(&mut self, boundary: BoundaryId, pid: Pid) -> bool {
        let oldest = self.waiting_by_pid.get(&pid).and_then(|seqs| {
            seqs.iter()
                .copied()
                .find(|seq| self.waiting.get(seq).is_some_and(|(owner, _)| *owner == boundary))
        });
        match oldest {
            Some(seq) => self.detach_waiting(seq).is_some(),
            None => false,
        }
    }
}

pub struct ParticipantRegistry {
    inner: Mutex<Indexes>,
}

impl Default for ParticipantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Indexes::default()) }
    }

    /// Records that `boundary` exists. Idempotent; returns `true` only on the
    /// first registration.
    pub fn register_boundary(&self, boundary: BoundaryId) -> bool {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        inner.registered.insert(boundary)
    }

    /// Removes `boundary` together with every association and waiting entry
    /// keyed by it. Returns the number of index entries removed.
    pub fn unregister_boundary(&self, boundary: BoundaryId) -> usize {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        inner.registered.remove(&boundary);

        let mut removed = 0;
        if let Some(entries) = inner.by_boundary.remove(&boundary) {
            for (seq, participant) in entries {
                inner.unique.remove(&(boundary, participant.key, participant.role));
                if let Some(sessions) = inner.by_session.get_mut(&participant.key) {
                    sessions.remove(&seq);
                    if sessions.is_empty() {
                        inner.by_session.remove(&participant.key);
                    }
                }
                removed += 1;
            }
        }
        if let Some(seqs) = inner.waiting_by_boundary.remove(&boundary) {
            for seq in seqs {
                if let Some((_, pid)) = inner.waiting.remove(&seq) {
                    if let Some(by_pid) = inner.waiting_by_pid.get_mut(&pid) {
                        by_pid.remove(&seq);
                        if by_pid.is_empty() {
                            inner.waiting_by_pid.remove(&pid);
                        }
                    }
                    removed += 1;
                }
            }
        }
        removed
    }

    pub fn is_registered(&self, boundary: BoundaryId) -> bool {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.registered.contains(&boundary)
    }

    /// Associates `session` with `boundary` in `role`.
    ///
    /// Returns `Ok(false)` without side effects if the triple already exists.
    /// On success the oldest waiting entry for `(boundary, session pid)`, if
    /// any, is consumed.
    pub fn insert_participant(
        &self,
        boundary: BoundaryId,
        session: &Arc<dyn Session>,
        role: Role,
    ) -> Result<bool, TrustError> {
        let key = SessionKey::of(session);
        let pid = session.process_id();
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        inner.ensure_registered(boundary)?;
        if inner.unique.contains_key(&(boundary, key, role)) {
            return Ok(false);
        }

        let seq = inner.allocate_seq();
        inner.unique.insert((boundary, key, role), seq);
        inner.by_boundary.entry(boundary).or_default().insert(
            seq,
            Participant { session: Arc::downgrade(session), key, pid, role },
        );
        inner.by_session.entry(key).or_default().insert(seq, (boundary, role));
        if inner.consume_waiting(boundary, pid) {
            log::trace!("boundary({boundary}): waiting entry for pid {pid} satisfied");
        }
        Ok(true)
    }

    /// Removes the `(boundary, session, role)` association. Returns whether
    /// anything was removed.
    pub fn remove_participant(
        &self,
        boundary: BoundaryId,
        session: &Arc<dyn Session>,
        role: Role,
    ) -> Result<bool, TrustError> {
        let key = SessionKey::of(session);
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        inner.ensure_registered(boundary)?;
        let Some(seq) = inner.unique.get(&(boundary, key, role)).copied() else {
            return Ok(false);
        };
        Ok(inner.detach_participant(boundary, seq).is_some())
    }

    /// Live participants of `boundary` in insertion order, optionally limited
    /// to one role. Expired sessions are pruned and skipped.
    pub fn participants(
        &self,
        boundary: BoundaryId,
        role_filter: Option<Role>,
    ) -> Vec<(Arc<dyn Session>, Role)> {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        let Some(entries) = inner.by_boundary.get(&boundary) else {
            return Vec::new();
        };

        let mut live = Vec::new();
        let mut expired = Vec::new();
        for (seq, participant) in entries {
            match participant.session.upgrade() {
                Some(session) => {
                    if role_filter.map_or(true, |role| role == participant.role) {
                        live.push((session, participant.role));
                    }
                }
                None => expired.push(*seq),
            }
        }
        for seq in expired {
            if let Some(pruned) = inner.detach_participant(boundary, seq) {
                log::trace!(
                    "boundary({boundary}): pruned expired {} pid {}",
                    pruned.role,
                    pruned.pid
                );
            }
        }
        live
    }

    /// Invokes `f` for every live participant of `boundary`, in insertion
    /// order, with the registry lock released.
    pub fn for_each_participant<F>(&self, boundary: BoundaryId, role_filter: Option<Role>, mut f: F)
    where
        F: FnMut(&Arc<dyn Session>, Role),
    {
        for (session, role) in self.participants(boundary, role_filter) {
            f(&session, role);
        }
    }

    /// Boundaries `session` participates in, in association order.
    pub fn boundaries_with_participant(
        &self,
        session: &Arc<dyn Session>,
        role_filter: Option<Role>,
    ) -> Vec<(BoundaryId, Role)> {
        let key = SessionKey::of(session);
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner
            .by_session
            .get(&key)
            .map(|entries| {
                entries
                    .values()
                    .filter(|(_, role)| role_filter.map_or(true, |filter| filter == *role))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn for_each_boundary_with_participant<F>(
        &self,
        session: &Arc<dyn Session>,
        role_filter: Option<Role>,
        mut f: F,
    ) where
        F: FnMut(BoundaryId, Role),
    {
        for (boundary, role) in self.boundaries_with_participant(session, role_filter) {
            f(boundary, role);
        }
    }

    /// Records that `boundary` expects a session with `pid` to appear.
    /// Duplicates are kept and consumed one at a time.
    pub fn insert_waiting_process(&self, boundary: BoundaryId, pid: Pid) -> Result<(), TrustError> {
        let mut inner = self.inner.lock().expect("registry mutex poisoned");
        inner.ensure_registered(boundary)?;
        let seq = inner.allocate_seq();
        inner.waiting.insert(seq, (boundary, pid));
        inner.waiting_by_boundary.entry(boundary).or_default().insert(seq);
        inner.waiting_by_pid.entry(pid).or_default().insert(seq);
        Ok(())
    }

    /// Boundaries with at least one pending waiting entry for `pid`, each
    /// listed once, ordered by their oldest such entry. Does not consume.
    pub fn boundaries_waiting_for(&self, pid: Pid) -> Vec<BoundaryId> {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        let mut seen = HashSet::new();
        inner
            .waiting_by_pid
            .get(&pid)
            .into_iter()
            .flatten()
            .filter_map(|seq| inner.waiting.get(seq).map(|(boundary, _)| *boundary))
            .filter(|boundary| seen.insert(*boundary))
            .collect()
    }

    pub fn for_each_boundary_waiting_for<F>(&self, pid: Pid, mut f: F)
    where
        F: FnMut(BoundaryId),
    {
        for boundary in self.boundaries_waiting_for(pid) {
            f(boundary);
        }
    }

    /// Number of live participants of `boundary`, optionally for one role.
    pub fn participant_count(&self, boundary: BoundaryId, role_filter: Option<Role>) -> usize {
        self.participants(boundary, role_filter).len()
    }

    /// Number of pending waiting entries of `boundary`, duplicates included.
    pub fn waiting_count(&self, boundary: BoundaryId) -> usize {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        inner.waiting_by_boundary.get(&boundary).map_or(0, BTreeSet::len)
    }

    /// Point-in-time dump of every registered boundary. Does not prune.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let inner = self.inner.lock().expect("registry mutex poisoned");
        let mut ids = inner.registered.iter().copied().collect::<Vec<_>>();
        ids.sort_unstable();

        let boundaries = ids
            .into_iter()
            .map(|id| BoundarySnapshot {
                id,
                participants: inner
                    .by_boundary
                    .get(&id)
                    .into_iter()
                    .flatten()
                    .map(|(seq, participant)| ParticipantSnapshot {
                        seq: *seq,
                        pid: participant.pid,
                        role: participant.role,
                        alive: participant.session.strong_count() > 0,
                    })
                    .collect(),
                waiting: inner
                    .waiting_by_boundary
                    .get(&id)
                    .into_iter()
                    .flatten()
                    .filter_map(|seq| inner.waiting.get(seq).map(|(_, pid)| *pid))
                    .collect(),
            })
            .collect();
        RegistrySnapshot { boundaries }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub boundaries: Vec<BoundarySnapshot>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BoundarySnapshot {
    pub id: BoundaryId,
    pub participants: Vec<ParticipantSnapshot>,
    pub waiting: Vec<Pid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParticipantSnapshot {
    pub seq: u64,
    pub pid: Pid,
    pub role: Role,
    pub alive: bool,
}
