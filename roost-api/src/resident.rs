use std::fmt::Debug;

use crate::identity::ResidentId;

/// Capability an object must provide to live on a pool worker.
///
/// A resident is bound to exactly one worker at a time. After adoption every
/// interaction with it — the [`attached`](Resident::attached) hook, closures
/// submitted through the pool's `visit`, the [`detaching`](Resident::detaching)
/// hook and finally its drop — runs on that worker's thread, in the order the
/// requests were enqueued. The resident itself never needs to be `Sync`;
/// it is moved onto its worker once and stays there.
pub trait Resident: Send + Debug {
    /// Stable identity of this object. Must return the same value for the
    /// object's whole lifetime.
    fn id(&self) -> ResidentId;

    /// Runs on the home worker right after the resident arrives there.
    fn attached(&mut self) {}

    /// Runs on the home worker just before the resident is dropped there.
    fn detaching(&mut self) {}
}

pub type BoxedResident = Box<dyn Resident>;
