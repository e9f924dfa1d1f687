//! Background worker pool for network jobs.
//!
//! Backend calls (landmark commits, task analysis, plot recompute, autosave)
//! must not block the UI thread. Jobs are pushed onto a shared injector queue
//! and picked up by a handful of named threads; each job reports its outcome
//! through its own channel, so workers never touch UI state.

use crossbeam::deque::{Injector, Steal};
use log::trace;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
}

impl Workers {
    /// Spawn `num_threads` workers (at least one).
    pub fn new(num_threads: usize) -> std::io::Result<Self> {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(num_threads);

        for worker_id in 0..num_threads {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);
            let in_flight = Arc::clone(&in_flight);

            let handle = thread::Builder::new()
                .name(format!("kinemark-net-{}", worker_id))
                .spawn(move || {
                    trace!("Worker {} started", worker_id);
                    loop {
                        match injector.steal() {
                            Steal::Success(job) => {
                                job();
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                                continue;
                            }
                            Steal::Retry => continue,
                            Steal::Empty => {}
                        }
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                        thread::sleep(Duration::from_millis(2));
                    }
                    trace!("Worker {} stopped", worker_id);
                })?;
            handles.push(handle);
        }

        trace!("Workers initialized: {} threads", num_threads);
        Ok(Self {
            injector,
            handles,
            shutdown,
            in_flight,
        })
    }

    /// Default sizing: a quarter of the cores, at least two.
    pub fn with_default_threads() -> std::io::Result<Self> {
        Self::new((num_cpus::get() / 4).max(2))
    }

    /// Run closure on a worker thread. Fire-and-forget.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.injector.push(Box::new(f));
    }

    /// Jobs queued or running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);
        self.shutdown.store(true, Ordering::SeqCst);

        // Requests in flight are not cancelled; give them a short grace period.
        let deadline = Instant::now() + Duration::from_millis(500);
        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, detaching remaining workers");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }
        trace!("All {} workers stopped", num_threads);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_jobs_run_and_report() {
        let workers = Workers::new(2).unwrap();
        let (tx, rx) = unbounded();
        for i in 0..8u32 {
            let tx = tx.clone();
            workers.execute(move || {
                tx.send(i * 2).ok();
            });
        }
        let mut got: Vec<u32> = (0..8)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        got.sort();
        assert_eq!(got, vec![0, 2, 4, 6, 8, 10, 12, 14]);
    }

    #[test]
    fn test_in_flight_drains() {
        let workers = Workers::new(1).unwrap();
        let (tx, rx) = unbounded();
        workers.execute(move || {
            tx.send(()).ok();
        });
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while workers.in_flight() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(workers.in_flight(), 0);
    }
}
