//! Synchronisation primitives used by the registry.
//!
//! With the `loom-tests` feature the registry lock is swapped for loom's
//! model-checked mutex so `tests/loom_registry.rs` can explore interleavings.

#[cfg(feature = "loom-tests")]
pub(crate) use loom::sync::Mutex;

#[cfg(not(feature = "loom-tests"))]
pub(crate) use std::sync::Mutex;
