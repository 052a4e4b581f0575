use std::fmt;

use uuid::Uuid;

/// Identity of a managed object. Two handles naming the same resident
/// compare equal; the pool rejects a second adoption under an id it already
/// tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResidentId(Uuid);

impl ResidentId {
    /// Mint a fresh id. Typically called once in a resident's constructor
    /// and returned from [`crate::resident::Resident::id`] thereafter.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResidentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a pool worker. Ids are issued in creation order, so ordering
/// two `WorkerId`s tells you which worker was spawned first; the pool uses
/// this as its deterministic tie-break when several workers carry the same
/// load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Creation-order index of this worker.
    pub const fn index(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}
