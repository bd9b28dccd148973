//! Shard lanes
//!
//! A lane is one worker thread draining a private FIFO queue. Work submitted
//! to a lane runs in submission order and never overlaps with other work on
//! the same lane; different lanes run in parallel. Callers get a [`Pending`]
//! handle and block on it for the task's result.

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A single-threaded execution lane
pub(crate) struct ShardLane {
    index: usize,
    sender: flume::Sender<Job>,
    /// Disconnects when the worker thread exits
    finished: flume::Receiver<()>,
}

impl ShardLane {
    /// Start the worker thread for lane `index`
    pub(crate) fn spawn(index: usize) -> Result<Self> {
        let (sender, receiver) = flume::unbounded::<Job>();
        let (finished_tx, finished) = flume::bounded::<()>(1);

        thread::Builder::new()
            .name(format!("lanecache-shard-{index}"))
            .spawn(move || {
                let _finished = finished_tx;
                debug!(shard = index, "lane started");
                // Ends once every sender is dropped and the queue is empty
                for job in receiver.iter() {
                    job();
                }
                debug!(shard = index, "lane drained");
            })
            .map_err(|source| Error::LaneSpawn {
                shard: index,
                source,
            })?;

        Ok(Self {
            index,
            sender,
            finished,
        })
    }

    /// Queue `task` on this lane
    pub(crate) fn submit<T, F>(&self, task: F) -> Result<Pending<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = flume::bounded(1);
        let shard = self.index;

        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(task));
            if outcome.is_err() {
                warn!(shard, "task panicked");
            }
            // The caller may have given up waiting
            let _ = reply_tx.send(outcome);
        });

        self.sender.send(job).map_err(|_| Error::ShutDown)?;

        Ok(Pending {
            shard,
            reply: reply_rx,
        })
    }

    /// Stop accepting work. The returned handle disconnects once the lane
    /// has finished everything already queued.
    pub(crate) fn close(self) -> Drained {
        Drained {
            shard: self.index,
            finished: self.finished,
        }
    }
}

/// Result of a task that has been queued on a lane
#[must_use = "a pending task must be waited on to observe its result"]
pub(crate) struct Pending<T> {
    shard: usize,
    reply: flume::Receiver<thread::Result<T>>,
}

impl<T> Pending<T> {
    /// Block until the task has run
    pub(crate) fn wait(self) -> Result<T> {
        match self.reply.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(Error::TaskPanicked { shard: self.shard }),
            Err(flume::RecvError::Disconnected) => Err(Error::ShutDown),
        }
    }
}

/// Handle on a closed lane that is draining its queue
pub(crate) struct Drained {
    shard: usize,
    finished: flume::Receiver<()>,
}

impl Drained {
    /// Wait until the lane is empty or `deadline` passes.
    ///
    /// Returns false if the lane was still busy at the deadline.
    pub(crate) fn wait_until(&self, deadline: Instant) -> bool {
        match self.finished.recv_deadline(deadline) {
            Err(flume::RecvTimeoutError::Timeout) => {
                warn!(shard = self.shard, "lane still busy at shutdown deadline");
                false
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_submit_returns_result() {
        let lane = ShardLane::spawn(0).unwrap();

        let pending = lane.submit(|| 40 + 2).unwrap();
        assert_eq!(pending.wait().unwrap(), 42);
    }

    #[test]
    fn test_tasks_run_in_submission_order() {
        let lane = ShardLane::spawn(0).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let pending: Vec<_> = (0..100)
            .map(|i| {
                let seen = Arc::clone(&seen);
                lane.submit(move || seen.lock().push(i)).unwrap()
            })
            .collect();

        for p in pending {
            p.wait().unwrap();
        }
        assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_panic_is_reported_and_lane_survives() {
        let lane = ShardLane::spawn(3).unwrap();

        let result = lane.submit(|| panic!("boom")).unwrap().wait();
        assert!(matches!(result, Err(Error::TaskPanicked { shard: 3 })));

        assert_eq!(lane.submit(|| "still alive").unwrap().wait().unwrap(), "still alive");
    }

    #[test]
    fn test_close_drains_queue() {
        let lane = ShardLane::spawn(0).unwrap();
        let counter = Arc::new(Mutex::new(0));

        let pending: Vec<_> = (0..5)
            .map(|_| {
                let counter = Arc::clone(&counter);
                lane.submit(move || {
                    thread::sleep(Duration::from_millis(5));
                    *counter.lock() += 1;
                })
                .unwrap()
            })
            .collect();

        let drained = lane.close();
        assert!(drained.wait_until(Instant::now() + Duration::from_secs(5)));
        assert_eq!(*counter.lock(), 5);

        for p in pending {
            p.wait().unwrap();
        }
    }

    #[test]
    fn test_close_reports_busy_lane() {
        let lane = ShardLane::spawn(0).unwrap();
        let slow = lane
            .submit(|| thread::sleep(Duration::from_millis(200)))
            .unwrap();

        let drained = lane.close();
        assert!(!drained.wait_until(Instant::now() + Duration::from_millis(10)));

        slow.wait().unwrap();
        assert!(drained.wait_until(Instant::now() + Duration::from_secs(5)));
    }
}
