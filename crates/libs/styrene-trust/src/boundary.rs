//! Trust and prompt session objects.
//!
//! A [`Boundary`] is the single tagged variant standing in for both kinds of
//! session. The kind is fixed by its [`CreationParams`]; the helper and the
//! params are immutable, only [`BoundaryState`] moves.

use crate::session::{Session, SessionKey};
use crate::types::{BoundaryId, BoundaryKind, BoundaryState, Pid};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

/// Parameters for a prompt session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptParams {
    /// Process id of the application the prompt is shown for. A session with
    /// this pid must already be connected.
    pub application_pid: Pid,
}

/// Parameters for a trust session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustParams {
    /// First process to trust. More may be added later with
    /// [`BoundaryManager::add_trusted_process`](crate::BoundaryManager::add_trusted_process).
    pub base_pid: Pid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreationParams {
    Prompt(PromptParams),
    Trust(TrustParams),
}

impl CreationParams {
    pub fn prompt(application_pid: impl Into<Pid>) -> Self {
        Self::Prompt(PromptParams { application_pid: application_pid.into() })
    }

    pub fn trust(base_pid: impl Into<Pid>) -> Self {
        Self::Trust(TrustParams { base_pid: base_pid.into() })
    }

    pub fn kind(&self) -> BoundaryKind {
        match self {
            Self::Prompt(_) => BoundaryKind::Prompt,
            Self::Trust(_) => BoundaryKind::Trust,
        }
    }

    /// The pid this boundary targets at creation time.
    pub fn target_pid(&self) -> Pid {
        match self {
            Self::Prompt(params) => params.application_pid,
            Self::Trust(params) => params.base_pid,
        }
    }
}

pub struct Boundary {
    id: BoundaryId,
    helper: Weak<dyn Session>,
    helper_key: SessionKey,
    helper_pid: Pid,
    params: CreationParams,
    state: Mutex<BoundaryState>,
}

impl Boundary {
    pub(crate) fn new(id: BoundaryId, helper: &Arc<dyn Session>, params: CreationParams) -> Self {
        Self {
            id,
            helper: Arc::downgrade(helper),
            helper_key: SessionKey::of(helper),
            helper_pid: helper.process_id(),
            params,
            state: Mutex::new(BoundaryState::Started),
        }
    }

    pub fn id(&self) -> BoundaryId {
        self.id
    }

    pub fn kind(&self) -> BoundaryKind {
        self.params.kind()
    }

    pub fn params(&self) -> &CreationParams {
        &self.params
    }

    /// The owning helper, if it has not been destroyed.
    pub fn helper(&self) -> Option<Arc<dyn Session>> {
        self.helper.upgrade()
    }

    pub fn helper_pid(&self) -> Pid {
        self.helper_pid
    }

    pub fn is_helper(&self, session: &Arc<dyn Session>) -> bool {
        SessionKey::of(session) == self.helper_key
    }

    pub fn state(&self) -> BoundaryState {
        *self.state.lock().expect("boundary state mutex poisoned")
    }

    pub fn is_live(&self) -> bool {
        self.state().is_live()
    }

    /// `Started -> Suspended`. Returns `false` if the boundary was not started.
    pub(crate) fn mark_suspended(&self) -> bool {
        self.transition(BoundaryState::Started, BoundaryState::Suspended)
    }

    /// `Suspended -> Started`. Returns `false` if the boundary was not suspended.
    pub(crate) fn mark_resumed(&self) -> bool {
        self.transition(BoundaryState::Suspended, BoundaryState::Started)
    }

    /// Any live state -> `Stopped`. Returns `false` if already stopped.
    pub(crate) fn mark_stopped(&self) -> bool {
        let mut state = self.state.lock().expect("boundary state mutex poisoned");
        if *state == BoundaryState::Stopped {
            return false;
        }
        *state = BoundaryState::Stopped;
        true
    }

    fn transition(&self, from: BoundaryState, to: BoundaryState) -> bool {
        let mut state = self.state.lock().expect("boundary state mutex poisoned");
        if *state != from {
            return false;
        }
        *state = to;
        true
    }
}

impl fmt::Debug for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Boundary")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("helper_pid", &self.helper_pid)
            .field("params", &self.params)
            .field("state", &self.state())
            .finish()
    }
}
