//! Terminal output for crawlpool.
//!
//! Worker diagnostics go to stderr (interleaved with the workers' own
//! forwarded output); the final stat report goes to stdout.

use std::collections::BTreeMap;

/// ANSI color codes for terminal output.
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const RED: &str = "\x1b[31m";
}

pub use colors::*;

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{RED}{BOLD}Error:{RESET} {}", msg);
}

/// Print a plain log message forwarded from a worker.
pub fn print_worker_text(pid: u32, msg: &str) {
    eprintln!("{DIM}[pid={pid}]{RESET} TEXT-MSG: {}", msg);
}

/// Print an unexpected-but-valid JSON message forwarded from a worker.
pub fn print_worker_json(pid: u32, msg: &str) {
    eprintln!("{DIM}[pid={pid}]{RESET} JSON-MSG: {}", msg);
}

/// Print a line from a worker that could not be decoded at all.
pub fn print_worker_raw(pid: u32, line: &str) {
    eprintln!("{DIM}[pid={pid}]{RESET} RAW-MSG: {}", line);
}

/// Print the teardown notice for one worker process.
pub fn print_finishing_process(pid: u32) {
    println!("Finishing process pid={pid}");
}

/// Print the interruption notice after Ctrl+C.
pub fn print_interrupted() {
    println!();
    println!("{YELLOW}Interrupted.{RESET} Worker processes have been terminated.");
}

/// Print the sorted final counter report.
pub fn print_stats(totals: &BTreeMap<String, u64>) {
    println!("Stats:");
    for (key, val) in totals {
        println!(" * {}: {}", key, val);
    }
}

/// Format elapsed wall-clock seconds as `HH:MM:SS.ss`.
///
/// Hours and minutes are only carried out above their respective thresholds,
/// so short runs render as `00:00:5.00`.
pub fn format_elapsed_time(total_sec: f64) -> String {
    let mut total_sec = total_sec;
    let mut hours = 0u64;
    let mut minutes = 0u64;
    if total_sec > 3600.0 {
        hours = (total_sec / 3600.0) as u64;
        total_sec %= 3600.0;
    }
    if total_sec > 60.0 {
        minutes = (total_sec / 60.0) as u64;
        total_sec %= 60.0;
    }
    format!("{:02}:{:02}:{:.2}", hours, minutes, total_sec)
}
