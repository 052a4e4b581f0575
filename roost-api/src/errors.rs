use std::io;

use thiserror::Error;

use crate::identity::ResidentId;
use crate::resident::BoxedResident;

/// Errors from adopting an object into the pool.
///
/// Both variants hand the rejected object back to the caller: the pool took
/// ownership of nothing, and dropping the object is the caller's call.
#[derive(Error, Debug)]
pub enum AdoptError {
    /// An object with this id is already housed in the pool.
    #[error("resident {id} is already managed by the pool")]
    AlreadyManaged {
        id: ResidentId,
        resident: BoxedResident,
    },

    /// The OS refused to spawn a worker thread for the new resident.
    #[error("failed to spawn a worker thread: {source}")]
    SpawnFailed {
        resident: BoxedResident,
        source: io::Error,
    },

    /// The selected worker's task queue is disconnected, meaning its thread
    /// died (a resident panicked on it).
    #[error("worker for resident {id} is no longer accepting tasks")]
    WorkerUnavailable {
        id: ResidentId,
        resident: BoxedResident,
    },
}

impl AdoptError {
    /// Recover the object the pool refused to take.
    pub fn into_resident(self) -> BoxedResident {
        match self {
            AdoptError::AlreadyManaged { resident, .. }
            | AdoptError::SpawnFailed { resident, .. }
            | AdoptError::WorkerUnavailable { resident, .. } => resident,
        }
    }
}

/// Errors from submitting a closure to run against a resident.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VisitError {
    #[error("resident {0} is not managed by the pool")]
    NotManaged(ResidentId),
    /// The resident's worker thread died before the closure could be
    /// enqueued.
    #[error("worker for resident {0} is no longer accepting tasks")]
    WorkerGone(ResidentId),
}
