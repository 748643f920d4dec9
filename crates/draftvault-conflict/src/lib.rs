//! Version-conflict detection and resolution.
//!
//! A save request passes through [`ConflictResolver`] before being persisted.
//! Detection compares the client's base change id (or the stored version
//! marker) against the version currently observed at the vendor; resolution
//! diverts the save into a conflict-named copy beside the original, then
//! reconciles edit sessions and emits best-effort notifications.
//!
//! The resolver performs no inter-request locking: a detected conflict always
//! produces a new file identity, never an in-place mutation, so two racing
//! detections at worst yield two distinct conflict copies.

mod naming;
mod resolver;
mod sideeffects;

pub use naming::{conflict_name, CONFLICT_MARKER};
pub use resolver::{ConflictResolver, ResolverConfig, SaveProbe, SessionContext};
pub use sideeffects::{SideEffect, SideEffects};
