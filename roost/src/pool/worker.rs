//! # Pool Worker
//!
//! One OS thread running a FIFO task loop. The loop owns the residents that
//! were moved onto it and is the only place their code ever runs: lifecycle
//! hooks, visit closures and the final drop all execute here, in the order
//! the pool enqueued them.

use std::collections::HashMap;
use std::io;
use std::thread::JoinHandle;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};
use tracing::{error, warn};

use roost_api::identity::{ResidentId, WorkerId};
use roost_api::resident::{BoxedResident, Resident};

/// Closure run against a resident on its home worker.
pub(crate) type VisitFn = Box<dyn FnOnce(&mut dyn Resident) + Send>;

/// Work items the pool feeds a worker. FIFO order on the channel is the
/// ordering guarantee the pool's API documents.
pub(crate) enum Task {
    /// House a resident on this worker.
    Adopt(ResidentId, BoxedResident),
    /// Run a closure against a housed resident.
    Visit(ResidentId, VisitFn),
    /// Drop a housed resident, on this thread.
    Evict(ResidentId),
    /// Leave the loop. Everything enqueued earlier has already run.
    Quit,
}

/// Pool-side handle to one worker thread.
pub(crate) struct Worker {
    id: WorkerId,
    tasks: Sender<Task>,
    done: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn the worker thread and hand back the pool-side handle.
    pub(crate) fn spawn(id: WorkerId, thread_name: String) -> io::Result<Worker> {
        let (task_tx, task_rx) = flume::unbounded();
        let (done_tx, done_rx) = flume::bounded(1);

        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                worker_main(id, task_rx);
                let _ = done_tx.send(());
            })?;

        Ok(Worker {
            id,
            tasks: task_tx,
            done: done_rx,
            handle: Some(handle),
        })
    }

    /// Enqueue a task. Fails only if the thread has already exited, which
    /// happens when resident code panicked on it; the task comes back so
    /// the caller can salvage whatever it carried.
    pub(crate) fn enqueue(&self, task: Task) -> Result<(), Task> {
        self.tasks.send(task).map_err(|e| e.into_inner())
    }

    /// Ask the loop to quit and wait for the thread to finish. All tasks
    /// enqueued before the quit request run first, so by the time this
    /// returns `true` every pending deferred drop has happened. Returns
    /// `false` if the thread did not finish within `timeout`; the handle is
    /// abandoned in that case and the thread left to its fate.
    pub(crate) fn stop(mut self, timeout: Duration) -> bool {
        let _ = self.tasks.send(Task::Quit);

        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        error!(worker = %self.id, "worker thread panicked while draining");
                    }
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                self.handle.take();
                false
            }
        }
    }
}

fn worker_main(id: WorkerId, tasks: Receiver<Task>) {
    let mut residents: HashMap<ResidentId, BoxedResident> = HashMap::new();

    for task in tasks.iter() {
        match task {
            Task::Adopt(rid, mut resident) => {
                resident.attached();
                residents.insert(rid, resident);
            }
            Task::Visit(rid, visit) => match residents.get_mut(&rid) {
                Some(resident) => visit(resident.as_mut()),
                None => {
                    warn!(worker = %id, resident = %rid, "visit for a resident not housed here");
                }
            },
            Task::Evict(rid) => match residents.remove(&rid) {
                Some(mut resident) => {
                    resident.detaching();
                    drop(resident);
                }
                None => {
                    warn!(worker = %id, resident = %rid, "eviction for a resident not housed here");
                }
            },
            Task::Quit => break,
        }
    }

    // Residents still housed at this point (pool dropped without evicting
    // them through us) go down with the map, still on their own thread.
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread::ThreadId;

    #[derive(Debug)]
    struct Probe {
        id: ResidentId,
        seen: Arc<Mutex<Vec<(&'static str, ThreadId)>>>,
    }

    impl Probe {
        fn new(seen: Arc<Mutex<Vec<(&'static str, ThreadId)>>>) -> Self {
            Self {
                id: ResidentId::new(),
                seen,
            }
        }

        fn record(&self, event: &'static str) {
            self.seen
                .lock()
                .unwrap()
                .push((event, std::thread::current().id()));
        }
    }

    impl Resident for Probe {
        fn id(&self) -> ResidentId {
            self.id
        }

        fn attached(&mut self) {
            self.record("attached");
        }

        fn detaching(&mut self) {
            self.record("detaching");
        }
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            self.record("dropped");
        }
    }

    #[test]
    fn lifecycle_runs_on_the_worker_thread_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let probe = Probe::new(Arc::clone(&seen));
        let rid = probe.id;

        let worker = Worker::spawn(WorkerId::new(0), "worker-under-test".to_string()).unwrap();
        assert!(worker.enqueue(Task::Adopt(rid, Box::new(probe))).is_ok());
        {
            let seen = Arc::clone(&seen);
            assert!(worker
                .enqueue(Task::Visit(
                    rid,
                    Box::new(move |_| {
                        seen.lock()
                            .unwrap()
                            .push(("visited", std::thread::current().id()));
                    })
                ))
                .is_ok());
        }
        assert!(worker.enqueue(Task::Evict(rid)).is_ok());
        assert!(worker.stop(Duration::from_secs(5)));

        let seen = seen.lock().unwrap();
        let events: Vec<&str> = seen.iter().map(|(e, _)| *e).collect();
        assert_eq!(events, vec!["attached", "visited", "detaching", "dropped"]);

        let caller = std::thread::current().id();
        for (_, thread) in seen.iter() {
            assert_ne!(*thread, caller);
        }
        // everything ran on the one worker thread
        assert!(seen.iter().all(|(_, t)| *t == seen[0].1));
    }

    #[test]
    fn stop_drains_tasks_enqueued_before_the_quit_request() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let probe = Probe::new(Arc::clone(&seen));
        let rid = probe.id;

        let worker = Worker::spawn(WorkerId::new(1), "worker-under-test".to_string()).unwrap();
        assert!(worker.enqueue(Task::Adopt(rid, Box::new(probe))).is_ok());
        for _ in 0..100 {
            let seen = Arc::clone(&seen);
            assert!(worker
                .enqueue(Task::Visit(
                    rid,
                    Box::new(move |_| {
                        seen.lock()
                            .unwrap()
                            .push(("visited", std::thread::current().id()));
                    })
                ))
                .is_ok());
        }
        assert!(worker.enqueue(Task::Evict(rid)).is_ok());
        assert!(worker.stop(Duration::from_secs(5)));

        let seen = seen.lock().unwrap();
        let visits = seen.iter().filter(|(e, _)| *e == "visited").count();
        assert_eq!(visits, 100);
        assert_eq!(seen.last().unwrap().0, "dropped");
    }

    #[test]
    fn residents_left_behind_drop_on_the_worker_during_quit() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let probe = Probe::new(Arc::clone(&seen));
        let rid = probe.id;

        let worker = Worker::spawn(WorkerId::new(2), "worker-under-test".to_string()).unwrap();
        assert!(worker.enqueue(Task::Adopt(rid, Box::new(probe))).is_ok());
        assert!(worker.stop(Duration::from_secs(5)));

        let seen = seen.lock().unwrap();
        let caller = std::thread::current().id();
        assert!(seen.iter().any(|(e, t)| *e == "dropped" && *t != caller));
    }
}
