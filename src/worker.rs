//! Worker invocation and per-worker monitoring.
//!
//! Each worker is one subprocess running a complete crawl, launched with
//! flags that force its logging and stat reports into the JSON line format
//! decoded by [`crate::stream`]. One monitor thread owns each worker: it
//! spawns the process, consumes its combined stdout/stderr stream, feeds
//! baseline-corrected counter deltas into the shared [`Stat`], and confirms
//! the exit status once the stream closes.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufRead, BufReader, PipeReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use crate::error::{CrawlPoolError, Result};
use crate::output;
use crate::pool::ProcessRegistry;
use crate::stat::Stat;
use crate::stream::{decode_line, LogEvent};

/// Sleep between exit-status polls after the worker's stream has closed.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Describes how to launch one crawl worker.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    /// Program to invoke; defaults to the current executable so `multi`
    /// spawns `crawl` instances of itself, as the embedding binary does.
    pub program: PathBuf,
    /// Crawler identifier passed to the `crawl` subcommand.
    pub crawler_id: String,
    /// Network-thread count for each worker.
    pub threads: usize,
}

impl WorkerSpec {
    /// Spec that runs the current executable's own `crawl` subcommand.
    pub fn new(crawler_id: impl Into<String>, threads: usize) -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|e| CrawlPoolError::WorkerProgram(e.to_string()))?;
        Ok(Self::with_program(program, crawler_id, threads))
    }

    /// Spec that runs an explicit worker program.
    pub fn with_program(
        program: impl Into<PathBuf>,
        crawler_id: impl Into<String>,
        threads: usize,
    ) -> Self {
        Self {
            program: program.into(),
            crawler_id: crawler_id.into(),
            threads,
        }
    }

    /// Build the subprocess invocation for one worker.
    ///
    /// The JSON format flags are what make the worker's stream decodable;
    /// without them the worker logs human-readable text.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("crawl")
            .arg(&self.crawler_id)
            .arg(format!("-t{}", self.threads))
            .arg("--logging-format=json")
            .arg("--stat-logging-format=json");
        cmd
    }
}

/// Shared state handed to every monitor thread.
pub(crate) struct MonitorShared {
    pub(crate) stat: Arc<Stat>,
    pub(crate) registry: Arc<ProcessRegistry>,
    pub(crate) error_flag: Arc<AtomicBool>,
}

/// Fold one counter snapshot into the shared stat.
///
/// `baselines` is the monitor's private last-seen snapshot; unseen keys
/// start at 0. A value lower than the previous one means the worker has
/// restarted its counting, so the new value becomes a fresh baseline rather
/// than producing a negative delta.
pub(crate) fn apply_counter_report(
    baselines: &mut HashMap<String, u64>,
    counters: BTreeMap<String, u64>,
    stat: &Stat,
) {
    for (key, value) in counters {
        let last = baselines.entry(key.clone()).or_insert(0);
        let delta = if value < *last { value } else { value - *last };
        *last = value;
        stat.inc(&key, delta);
    }
}

/// Monitor thread body: spawn the worker, decode its stream until EOF, then
/// confirm its exit status.
///
/// Decode failures never terminate the monitor; only the worker's own exit
/// status decides failure. A failed worker is never retried here — the pool
/// supervisor reacts to the shared error flag instead.
pub(crate) fn monitor_worker(mut cmd: Command, shared: MonitorShared, init_tx: mpsc::Sender<()>) {
    let spawned = spawn_combined(&mut cmd, &shared.registry);
    // The supervisor blocks on this signal before starting the next worker;
    // it must fire whether or not the spawn succeeded.
    let _ = init_tx.send(());
    // The Command retains its copies of the pipe write ends; drop them so
    // the stream reaches EOF once the child exits.
    drop(cmd);

    let (pid, reader) = match spawned {
        Ok(pair) => pair,
        Err(err) => {
            output::print_error(&err.to_string());
            shared.error_flag.store(true, Ordering::SeqCst);
            return;
        }
    };

    let mut baselines: HashMap<String, u64> = HashMap::new();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                output::print_error(&format!("read from worker pid={pid} failed: {err}"));
                break;
            }
        }
        match decode_line(&line) {
            LogEvent::Counter {
                counters,
                speed_keys,
            } => {
                shared.stat.register_speed_keys(speed_keys);
                apply_counter_report(&mut baselines, counters, &shared.stat);
            }
            LogEvent::Text(msg) => output::print_worker_text(pid, &msg),
            LogEvent::Json(msg) => output::print_worker_json(pid, &msg),
            LogEvent::Raw(raw) => output::print_worker_raw(pid, &raw),
        }
    }

    // Stream closed: the worker is exiting. Poll until the status is known.
    let clean = loop {
        match shared.registry.try_wait(pid) {
            Some(Ok(Some(status))) => break status.success(),
            Some(Ok(None)) => thread::sleep(EXIT_POLL_INTERVAL),
            // Wait failed or the registry no longer knows the pid; the exit
            // cannot be confirmed clean.
            Some(Err(_)) | None => break false,
        }
    };
    if !clean {
        shared.error_flag.store(true, Ordering::SeqCst);
    }
}

/// Spawn the worker with stdout and stderr merged into one pipe, and
/// register the child for teardown.
fn spawn_combined(cmd: &mut Command, registry: &ProcessRegistry) -> Result<(u32, PipeReader)> {
    let (reader, stdout_writer) = io::pipe()?;
    let stderr_writer = stdout_writer.try_clone()?;
    let child = cmd
        .stdin(Stdio::null())
        .stdout(stdout_writer)
        .stderr(stderr_writer)
        .spawn()
        .map_err(|e| {
            CrawlPoolError::WorkerSpawn(
                cmd.get_program().to_string_lossy().into_owned(),
                e.to_string(),
            )
        })?;
    Ok((registry.insert(child), reader))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_sequence_accumulates_latest_value() {
        let stat = Stat::new();
        let mut baselines = HashMap::new();
        for value in [5u64, 5, 12, 12, 20] {
            let mut snapshot = BTreeMap::new();
            snapshot.insert("request".to_string(), value);
            apply_counter_report(&mut baselines, snapshot, &stat);
        }
        assert_eq!(stat.totals().get("request"), Some(&20));
    }

    #[test]
    fn test_decreasing_value_is_fresh_baseline() {
        let stat = Stat::new();
        let mut baselines = HashMap::new();
        for value in [20u64, 3] {
            let mut snapshot = BTreeMap::new();
            snapshot.insert("request".to_string(), value);
            apply_counter_report(&mut baselines, snapshot, &stat);
        }
        // The drop to 3 contributes 3, not -17: the total stays monotone.
        assert_eq!(stat.totals().get("request"), Some(&23));
        assert_eq!(baselines.get("request"), Some(&3));
    }

    #[test]
    fn test_unseen_key_baseline_is_zero() {
        let stat = Stat::new();
        let mut baselines = HashMap::new();
        let mut snapshot = BTreeMap::new();
        snapshot.insert("page".to_string(), 7u64);
        apply_counter_report(&mut baselines, snapshot, &stat);
        assert_eq!(stat.totals().get("page"), Some(&7));
    }

    #[test]
    fn test_multiple_keys_tracked_independently() {
        let stat = Stat::new();
        let mut baselines = HashMap::new();

        let mut first = BTreeMap::new();
        first.insert("request".to_string(), 10u64);
        first.insert("error".to_string(), 2u64);
        apply_counter_report(&mut baselines, first, &stat);

        let mut second = BTreeMap::new();
        second.insert("request".to_string(), 15u64);
        apply_counter_report(&mut baselines, second, &stat);

        assert_eq!(stat.totals().get("request"), Some(&15));
        assert_eq!(stat.totals().get("error"), Some(&2));
    }

    #[test]
    fn test_worker_spec_command_shape() {
        let spec = WorkerSpec::with_program("/usr/bin/crawler", "news", 4);
        let cmd = spec.to_command();
        assert_eq!(cmd.get_program(), "/usr/bin/crawler");
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "crawl",
                "news",
                "-t4",
                "--logging-format=json",
                "--stat-logging-format=json",
            ]
        );
    }

    #[test]
    fn test_worker_spec_new_uses_current_exe() {
        let spec = WorkerSpec::new("news", 1).unwrap();
        assert_eq!(spec.program, std::env::current_exe().unwrap());
        assert_eq!(spec.crawler_id, "news");
        assert_eq!(spec.threads, 1);
    }
}
