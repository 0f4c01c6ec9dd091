use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating-system process id of a client session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(pub i32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Pid {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Opaque identity of a boundary.
///
/// The registry only ever stores this key, never the [`Boundary`](crate::Boundary)
/// itself, so indexing cannot keep a boundary alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundaryId(pub u64);

impl fmt::Display for BoundaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role a session plays within a boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Owner and initiator of the boundary.
    Helper,
    /// Target application of a prompt session.
    Application,
    /// Trusted or spawned participant acting on the helper's behalf.
    Provider,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Helper => "helper",
            Self::Application => "application",
            Self::Provider => "provider",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    /// Scoped, interactive exchange (e.g. an authentication prompt).
    Prompt,
    /// Standing trust granted to processes identified by pid.
    Trust,
}

impl BoundaryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Trust => "trust",
        }
    }
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryState {
    Stopped,
    Started,
    Suspended,
}

impl BoundaryState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Started => "started",
            Self::Suspended => "suspended",
        }
    }

    /// `Started` and `Suspended` boundaries are live; `Stopped` is terminal.
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

impl fmt::Display for BoundaryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_snake_case() {
        let encoded = serde_json::to_string(&Role::Provider).expect("serialize role");
        assert_eq!(encoded, "\"provider\"");
        let decoded: Role = serde_json::from_str("\"application\"").expect("deserialize role");
        assert_eq!(decoded, Role::Application);
    }

    #[test]
    fn only_stopped_is_not_live() {
        assert!(BoundaryState::Started.is_live());
        assert!(BoundaryState::Suspended.is_live());
        assert!(!BoundaryState::Stopped.is_live());
    }

    #[test]
    fn pid_is_transparent_on_the_wire() {
        assert_eq!(serde_json::to_string(&Pid(42)).expect("serialize pid"), "42");
        assert_eq!(Pid::from(7).to_string(), "7");
    }
}
