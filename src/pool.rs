//! Process pool supervision.
//!
//! [`Pool`] owns one orchestrator run: it starts one monitor thread per
//! worker (each with a one-shot init handshake so a failed spawn can never
//! block startup), polls the registered processes until every worker has
//! been confirmed exited or one has failed, and tears the whole pool down
//! on every exit path so no worker process is ever orphaned.

use std::collections::HashMap;
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::output;
use crate::stat::Stat;
use crate::worker::{monitor_worker, MonitorShared, WorkerSpec};

/// Sleep between liveness sweeps of the registered processes.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// pid → process handle for every worker spawned in one run.
///
/// Handles are only ever touched under the internal mutex: monitors insert
/// at spawn time and confirm exits, the supervisor sweeps liveness, and
/// teardown kills and reaps. Entries are never removed, so a handle is
/// terminated at most once and its cached exit status stays readable.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    procs: Mutex<HashMap<u32, Child>>,
}

impl ProcessRegistry {
    fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Child>> {
        self.procs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a freshly spawned child, keyed by its pid.
    pub(crate) fn insert(&self, child: Child) -> u32 {
        let pid = child.id();
        self.lock().insert(pid, child);
        pid
    }

    /// Non-blocking exit check for one registered process.
    ///
    /// `None` means the pid was never registered.
    pub(crate) fn try_wait(&self, pid: u32) -> Option<std::io::Result<Option<ExitStatus>>> {
        self.lock().get_mut(&pid).map(|child| child.try_wait())
    }

    /// Non-blocking exit sweep across every registered process.
    fn poll_statuses(&self) -> Vec<std::io::Result<Option<ExitStatus>>> {
        self.lock()
            .values_mut()
            .map(|child| child.try_wait())
            .collect()
    }

    /// Terminate and reap every registered process.
    ///
    /// Runs on every pool exit path. Killing an already-exited child is a
    /// no-op error that is deliberately ignored; the wait reaps the child
    /// (or returns its cached status) either way.
    fn terminate_all(&self) {
        let mut procs = self.lock();
        for (pid, child) in procs.iter_mut() {
            output::print_finishing_process(*pid);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// How one orchestrator run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolOutcome {
    /// Every worker exited with status 0.
    Completed,
    /// At least one worker failed to spawn or exited non-zero.
    Failed,
    /// SIGINT stopped the run before completion.
    Interrupted,
}

impl PoolOutcome {
    pub fn success(self) -> bool {
        matches!(self, PoolOutcome::Completed)
    }

    /// Process exit code for this outcome: 0 only on full success.
    pub fn exit_code(self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }
}

/// Supervises one run of N crawl worker processes.
pub struct Pool {
    stat: Arc<Stat>,
    interrupt: Arc<AtomicBool>,
}

impl Pool {
    pub fn new() -> Self {
        Self::with_interrupt(Arc::new(AtomicBool::new(false)))
    }

    /// Pool whose poll loop additionally stops when `interrupt` becomes
    /// true (typically [`crate::SignalHandler::flag`]).
    pub fn with_interrupt(interrupt: Arc<AtomicBool>) -> Self {
        Self {
            stat: Arc::new(Stat::new()),
            interrupt,
        }
    }

    /// The shared stat aggregator, for the final report.
    pub fn stat(&self) -> Arc<Stat> {
        Arc::clone(&self.stat)
    }

    /// Run `workers` instances of the worker described by `spec`.
    pub fn run(&self, spec: &WorkerSpec, workers: usize) -> Result<PoolOutcome> {
        let commands = (0..workers).map(|_| spec.to_command()).collect();
        self.run_commands(commands)
    }

    /// Run one monitor per prebuilt command. This is the primitive `run`
    /// delegates to; it exists separately so embedders (and tests) can
    /// supervise arbitrary worker invocations.
    pub fn run_commands(&self, commands: Vec<Command>) -> Result<PoolOutcome> {
        let worker_count = commands.len();
        let registry = Arc::new(ProcessRegistry::new());
        let error_flag = Arc::new(AtomicBool::new(false));
        let mut monitors = Vec::with_capacity(worker_count);

        for command in commands {
            let (init_tx, init_rx) = mpsc::channel();
            let shared = MonitorShared {
                stat: Arc::clone(&self.stat),
                registry: Arc::clone(&registry),
                error_flag: Arc::clone(&error_flag),
            };
            monitors.push(thread::spawn(move || monitor_worker(command, shared, init_tx)));
            // Start workers one at a time: block until this monitor has
            // attempted its spawn so the registry is populated before
            // polling begins. A hung-up channel means the monitor thread is
            // already gone, which is just as much "init complete".
            let _ = init_rx.recv();
        }

        let outcome = self.poll_until_stopped(&registry, &error_flag, worker_count);

        // Unconditional teardown, whatever ended the poll loop.
        registry.terminate_all();
        for monitor in monitors {
            let _ = monitor.join();
        }

        Ok(outcome)
    }

    /// Poll registered processes until every worker has been confirmed
    /// exited cleanly, or any worker has failed, or SIGINT arrived.
    fn poll_until_stopped(
        &self,
        registry: &ProcessRegistry,
        error_flag: &AtomicBool,
        worker_count: usize,
    ) -> PoolOutcome {
        loop {
            if self.interrupt.load(Ordering::SeqCst) {
                return PoolOutcome::Interrupted;
            }
            if error_flag.load(Ordering::SeqCst) {
                return PoolOutcome::Failed;
            }

            let mut num_done = 0;
            for status in registry.poll_statuses() {
                match status {
                    Ok(Some(status)) if status.success() => num_done += 1,
                    // A non-zero exit may be observed here before the
                    // worker's own monitor has confirmed it; either sighting
                    // stops the pool.
                    Ok(Some(_)) | Err(_) => {
                        error_flag.store(true, Ordering::SeqCst);
                    }
                    Ok(None) => {}
                }
            }
            if error_flag.load(Ordering::SeqCst) {
                return PoolOutcome::Failed;
            }
            if num_done == worker_count {
                return PoolOutcome::Completed;
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}
