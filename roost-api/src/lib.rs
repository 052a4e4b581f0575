//! # Roost API
//!
//! Contracts shared between the roost thread-affinity pool and its users.
//! The pool itself lives in the `roost` crate; this crate defines what a
//! poolable object looks like and the identities and errors the pool speaks
//! in terms of.
//!
//! ## Core Components
//!
//! - [`resident::Resident`]: the capability an object must provide to be
//!   housed on a pool worker — identity plus two lifecycle hooks that run
//!   on the object's own worker thread.
//! - [`identity`]: `ResidentId` (handle equality between objects) and
//!   `WorkerId` (creation-ordered worker identity).
//! - [`errors`]: the error enums surfaced by pool operations.
//!
//! ## Module Organization
//!
//! - [`resident`]: the managed-object trait and boxed alias
//! - [`identity`]: identity newtypes
//! - [`errors`]: error types

pub mod errors;
pub mod identity;
pub mod resident;

pub use errors::{AdoptError, VisitError};
pub use identity::{ResidentId, WorkerId};
pub use resident::{BoxedResident, Resident};
