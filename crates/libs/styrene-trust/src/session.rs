//! The externally owned client session and the directory of live sessions.
//!
//! Sessions are owned by the host's connection layer. This crate only ever
//! holds [`Weak`](std::sync::Weak) references to them, so a session torn down elsewhere simply
//! stops appearing in enumerations.

use crate::types::Pid;
use std::sync::Arc;

/// A connected client, as seen by the trust core.
pub trait Session: Send + Sync {
    fn process_id(&self) -> Pid;

    /// Human-readable name, shown next to the pid in log lines.
    fn name(&self) -> &str {
        ""
    }
}

/// Stable identity of a session allocation.
///
/// Derived from the allocation address. A [`Weak`](std::sync::Weak) pins the allocation
/// (though not the value), so the address cannot be reused while the
/// registry still holds an entry keyed by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionKey(usize);

impl SessionKey {
    pub fn of(session: &Arc<dyn Session>) -> Self {
        Self(Arc::as_ptr(session) as *const () as usize)
    }
}

/// Read-only view of the sessions currently connected to the host.
///
/// Consumed for pid matching when a boundary is created or extended.
pub trait SessionDirectory {
    fn for_each_session(&self, f: &mut dyn FnMut(&Arc<dyn Session>));

    /// Live sessions whose process id equals `pid`, in directory order.
    fn sessions_with_pid(&self, pid: Pid) -> Vec<Arc<dyn Session>> {
        let mut matches = Vec::new();
        self.for_each_session(&mut |session| {
            if session.process_id() == pid {
                matches.push(Arc::clone(session));
            }
        });
        matches
    }
}

impl SessionDirectory for [Arc<dyn Session>] {
    fn for_each_session(&self, f: &mut dyn FnMut(&Arc<dyn Session>)) {
        self.iter().for_each(f);
    }
}

impl SessionDirectory for Vec<Arc<dyn Session>> {
    fn for_each_session(&self, f: &mut dyn FnMut(&Arc<dyn Session>)) {
        self.as_slice().for_each_session(f);
    }
}
