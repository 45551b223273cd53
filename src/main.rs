//! crawlpool CLI entry point.
//!
//! Parses command-line arguments and dispatches to the appropriate
//! subcommand handler.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use crawlpool::error::CrawlPoolError;
use crawlpool::output::{self, format_elapsed_time, print_error};
use crawlpool::{Pool, PoolOutcome, Result, SignalHandler, WorkerSpec};

#[derive(Parser)]
#[command(name = "crawlpool")]
#[command(
    version,
    about = "Run multiple crawler worker processes and aggregate their stats",
    after_help = "EXAMPLES:
    # Run 4 worker processes of the `news` crawler, 8 network threads each
    crawlpool multi news -w4 -t8

    # Supervise workers of an external crawler binary
    crawlpool multi news -w4 --worker-program /usr/local/bin/newsbot"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single crawler instance (the worker side of `multi`)
    Crawl {
        /// Identifier of the registered crawler to run
        crawler_id: String,

        /// Number of concurrent network threads
        #[arg(short = 't', long = "network-threads", default_value_t = 1)]
        network_threads: usize,

        /// Log record format on stdout/stderr
        #[arg(long, value_parser = ["text", "json"], default_value = "text")]
        logging_format: String,

        /// Format of periodic stat reports in the log stream
        #[arg(long, value_parser = ["text", "json"], default_value = "text")]
        stat_logging_format: String,
    },

    /// Run multiple worker processes of one crawler and aggregate their stats
    Multi {
        /// Identifier of the crawler each worker runs
        crawler_id: String,

        /// Number of worker processes
        #[arg(short = 'w', long, default_value_t = 1)]
        workers: usize,

        /// Network threads per worker
        #[arg(short = 't', long, default_value_t = 1)]
        threads: usize,

        /// Worker program to spawn instead of this executable
        #[arg(long)]
        worker_program: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Crawl {
            crawler_id,
            network_threads: _network_threads,
            logging_format: _logging_format,
            stat_logging_format: _stat_logging_format,
        } => run_crawl(&crawler_id),
        Commands::Multi {
            crawler_id,
            workers,
            threads,
            worker_program,
        } => match run_multi(&crawler_id, workers, threads, worker_program) {
            Ok(code) => code,
            Err(err) => {
                print_error(&err.to_string());
                1
            }
        },
    };

    std::process::exit(code);
}

/// The crawl-engine boundary: resolve the crawler id and run it.
///
/// No crawl engine ships with this binary, so resolution always fails with
/// the same error an unknown id would produce. Embedders point `multi` at
/// their crawler binary via `--worker-program`.
fn run_crawl(crawler_id: &str) -> i32 {
    print_error(&CrawlPoolError::UnknownCrawler(crawler_id.to_string()).to_string());
    1
}

fn run_multi(
    crawler_id: &str,
    workers: usize,
    threads: usize,
    worker_program: Option<PathBuf>,
) -> Result<i32> {
    let handler = SignalHandler::new()?;
    let spec = match worker_program {
        Some(program) => WorkerSpec::with_program(program, crawler_id, threads),
        None => WorkerSpec::new(crawler_id, threads)?,
    };

    let pool = Pool::with_interrupt(handler.flag());
    let started = Instant::now();
    let outcome = pool.run(&spec, workers)?;

    if outcome == PoolOutcome::Interrupted {
        output::print_interrupted();
    }
    output::print_stats(&pool.stat().totals());
    println!(
        "Elapsed: {}",
        format_elapsed_time(started.elapsed().as_secs_f64())
    );

    Ok(outcome.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_args_parse() {
        let cli = Cli::try_parse_from([
            "crawlpool",
            "crawl",
            "news",
            "-t4",
            "--logging-format=json",
            "--stat-logging-format=json",
        ])
        .unwrap();
        match cli.command {
            Commands::Crawl {
                crawler_id,
                network_threads,
                logging_format,
                stat_logging_format,
            } => {
                assert_eq!(crawler_id, "news");
                assert_eq!(network_threads, 4);
                assert_eq!(logging_format, "json");
                assert_eq!(stat_logging_format, "json");
            }
            _ => panic!("expected crawl subcommand"),
        }
    }

    #[test]
    fn test_crawl_format_defaults_to_text() {
        let cli = Cli::try_parse_from(["crawlpool", "crawl", "news"]).unwrap();
        match cli.command {
            Commands::Crawl {
                network_threads,
                logging_format,
                stat_logging_format,
                ..
            } => {
                assert_eq!(network_threads, 1);
                assert_eq!(logging_format, "text");
                assert_eq!(stat_logging_format, "text");
            }
            _ => panic!("expected crawl subcommand"),
        }
    }

    #[test]
    fn test_multi_args_parse() {
        let cli = Cli::try_parse_from(["crawlpool", "multi", "news", "-w4", "-t8"]).unwrap();
        match cli.command {
            Commands::Multi {
                crawler_id,
                workers,
                threads,
                worker_program,
            } => {
                assert_eq!(crawler_id, "news");
                assert_eq!(workers, 4);
                assert_eq!(threads, 8);
                assert!(worker_program.is_none());
            }
            _ => panic!("expected multi subcommand"),
        }
    }

    #[test]
    fn test_invalid_logging_format_rejected() {
        let result = Cli::try_parse_from(["crawlpool", "crawl", "news", "--logging-format=xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_crawler_exits_nonzero() {
        assert_eq!(run_crawl("news"), 1);
    }
}
