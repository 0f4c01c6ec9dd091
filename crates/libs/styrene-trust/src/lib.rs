//! Trust and prompt session core.
//!
//! Lets one client session (the *helper*) extend limited trust to other,
//! separately authenticated clients so they can act on its behalf, without
//! granting them full access to the host.
//!
//! - **Prompt sessions** scope newly spawned provider connections to a single
//!   interactive exchange with an existing application.
//! - **Trust sessions** grant standing trust to processes identified by pid,
//!   including ones that have not connected yet.
//!
//! Both are a [`Boundary`] tagged with a [`BoundaryKind`]. The
//! [`ParticipantRegistry`] records who belongs to which boundary, in which
//! [`Role`] and in what order; the [`BoundaryManager`] drives every change to
//! it and reports transitions to a [`Listener`].
//!
//! The client [`Session`] object, the wire protocol, and authorization policy
//! belong to the host and are consumed through traits.

mod boundary;
mod config;
mod error;
mod listener;
mod manager;
mod registry;
mod session;
mod sync;
mod types;

pub use boundary::{Boundary, CreationParams, PromptParams, TrustParams};
pub use config::ManagerConfig;
pub use error::TrustError;
pub use listener::{Listener, ListenerFanout, NullListener};
pub use manager::BoundaryManager;
pub use registry::{BoundarySnapshot, ParticipantRegistry, ParticipantSnapshot, RegistrySnapshot};
pub use session::{Session, SessionDirectory, SessionKey};
pub use types::{BoundaryId, BoundaryKind, BoundaryState, Pid, Role};
