//! Authorization module - Permission Model
//!
//! Pure decision logic over (action, resource) pairs:
//! - verbatim permission match
//! - `manage` supremacy: manage on a resource implies every other action on it
//! - `any_of` / `all_of` composite checks
//!
//! This module performs no I/O; record-scoped entitlement lives in
//! `crate::db::memberships` and is sequenced by the gate.

mod model;
mod principal;

pub use model::{all_of, allowed, any_of, Action, Permission, Resource};
pub use principal::Principal;
