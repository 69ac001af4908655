//! Bounded parallel execution of invocations.
//!
//! Jobs are handed to an [`Executor`] chosen once from the thread count:
//! [`SequentialExecutor`] runs each job inline as it is submitted, so outcomes
//! are processed in submission order, while [`PoolExecutor`] runs up to N jobs
//! at a time on a rayon pool with no ordering between completions.

use super::invoke::{
    CommandWithResponse, InvocationContext, Outcome, describe, run_process_with_response_file,
};
use crate::toolchain::CompilerFlavor;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};

pub type Job = Box<dyn FnOnce() -> Outcome + Send + 'static>;

/// A finished job, tagged with its submission index.
pub type Completion = (usize, Outcome);

pub trait Executor {
    /// Schedules `job`; its outcome is sent on `done` once it finishes.
    fn submit(&self, index: usize, job: Job, done: Sender<Completion>);

    fn threads(&self) -> usize;
}

/// Runs every job on the calling thread, in submission order.
pub struct SequentialExecutor;

impl Executor for SequentialExecutor {
    fn submit(&self, index: usize, job: Job, done: Sender<Completion>) {
        // A panicking job reports nothing, same as on the pool.
        if let Ok(outcome) = panic::catch_unwind(AssertUnwindSafe(job)) {
            let _ = done.send((index, outcome));
        }
    }

    fn threads(&self) -> usize {
        1
    }
}

pub struct PoolExecutor {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl PoolExecutor {
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("buildless-worker-{}", i))
            // A panicking job drops its sender unsent and is counted as a failure.
            .panic_handler(|_| {})
            .build()
            .context("Failed to start worker pool")?;
        Ok(Self { pool, threads })
    }
}

impl Executor for PoolExecutor {
    fn submit(&self, index: usize, job: Job, done: Sender<Completion>) {
        self.pool.spawn(move || {
            let _ = done.send((index, job()));
        });
    }

    fn threads(&self) -> usize {
        self.threads
    }
}

/// Sequential for one thread, pooled otherwise.
pub fn executor_for(threads: usize) -> Result<Box<dyn Executor>> {
    if threads <= 1 {
        Ok(Box::new(SequentialExecutor))
    } else {
        Ok(Box::new(PoolExecutor::new(threads)?))
    }
}

/// Outcome counts for a batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub successes: usize,
    pub partial: usize,
    pub failures: usize,
}

impl Tally {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Success => self.successes += 1,
            Outcome::Partial(_) => self.partial += 1,
            Outcome::LaunchFailure(_) => self.failures += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.successes + self.partial + self.failures
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[s={},p={},f={}]",
            self.successes, self.partial, self.failures
        )
    }
}

/// Submits every job and blocks until all of them have reported.
///
/// `on_complete` sees each outcome in completion order. Jobs that never report
/// are counted as failures.
pub fn run_jobs<F>(executor: &dyn Executor, jobs: Vec<Job>, mut on_complete: F) -> Tally
where
    F: FnMut(usize, &Outcome),
{
    let expected = jobs.len();
    let (tx, rx) = mpsc::channel::<Completion>();
    let mut tally = Tally::default();

    for (index, job) in jobs.into_iter().enumerate() {
        executor.submit(index, job, tx.clone());
        for (i, outcome) in rx.try_iter() {
            tally.record(&outcome);
            on_complete(i, &outcome);
        }
    }
    drop(tx);

    for (i, outcome) in rx.iter() {
        tally.record(&outcome);
        on_complete(i, &outcome);
    }

    tally.failures += expected.saturating_sub(tally.total());
    tally
}

/// Prints above the bar, or straight to stdout when the bar is not drawn.
fn report(pb: &ProgressBar, line: String) {
    if pb.is_hidden() {
        println!("{}", line);
    } else {
        pb.println(line);
    }
}

fn progress_bar(len: usize, verbose: bool) -> ProgressBar {
    if verbose {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Runs every command through a response file with at most `threads` in flight.
pub fn run_commands_in_parallel(
    commands: Vec<CommandWithResponse>,
    threads: usize,
    compiler: Arc<CompilerFlavor>,
    ctx: Arc<InvocationContext>,
) -> Result<Tally> {
    let total = commands.len();
    println!("Running {} commands in {} threads", total, threads);

    let executor = executor_for(threads)?;
    let pb = progress_bar(total, ctx.verbose);
    let commands = Arc::new(commands);

    let jobs: Vec<Job> = (0..total)
        .map(|i| {
            let commands = Arc::clone(&commands);
            let compiler = Arc::clone(&compiler);
            let ctx = Arc::clone(&ctx);
            Box::new(move || run_process_with_response_file(&commands[i], &compiler, &ctx)) as Job
        })
        .collect();

    let tally = run_jobs(executor.as_ref(), jobs, |i, outcome| {
        let should_report = match outcome {
            Outcome::LaunchFailure(_) => true,
            Outcome::Partial(_) => ctx.verbose,
            Outcome::Success => false,
        };
        if should_report && let Some(line) = describe(outcome, &commands[i]) {
            report(&pb, line);
        }
        pb.inc(1);
    });
    pb.finish_and_clear();

    println!("Ran {} commands {}", total, tally);
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fixed(outcomes: &[Outcome]) -> Vec<Job> {
        outcomes
            .iter()
            .cloned()
            .map(|o| Box::new(move || o) as Job)
            .collect()
    }

    fn mixed() -> Vec<Outcome> {
        vec![
            Outcome::Success,
            Outcome::Partial(Some(2)),
            Outcome::LaunchFailure("missing".to_string()),
            Outcome::Success,
            Outcome::Partial(Some(1)),
        ]
    }

    #[test]
    fn test_tally_is_the_same_for_any_thread_count() {
        for threads in [1, 2, 4] {
            let executor = executor_for(threads).unwrap();
            let tally = run_jobs(executor.as_ref(), fixed(&mixed()), |_, _| {});
            assert_eq!(
                tally,
                Tally {
                    successes: 2,
                    partial: 2,
                    failures: 1
                },
                "threads = {}",
                threads
            );
        }
    }

    #[test]
    fn test_sequential_completions_follow_submission_order() {
        for _ in 0..3 {
            let jobs: Vec<Job> = (0..5)
                .map(|i| {
                    Box::new(move || {
                        // later jobs finish faster if they ever ran concurrently
                        std::thread::sleep(Duration::from_millis(5 * (5 - i)));
                        Outcome::Success
                    }) as Job
                })
                .collect();
            let mut order = Vec::new();
            run_jobs(&SequentialExecutor, jobs, |i, _| order.push(i));
            assert_eq!(order, vec![0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_pool_reports_every_job() {
        let executor = PoolExecutor::new(3).unwrap();
        let mut seen = Vec::new();
        let tally = run_jobs(&executor, fixed(&vec![Outcome::Success; 20]), |i, _| seen.push(i));
        seen.sort();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
        assert_eq!(tally.successes, 20);
        assert_eq!(executor.threads(), 3);
    }

    #[test]
    fn test_panicking_job_counts_as_failure() {
        for threads in [1, 2] {
            let executor = executor_for(threads).unwrap();
            let jobs: Vec<Job> = vec![
                Box::new(|| Outcome::Success),
                Box::new(|| panic!("worker died")),
                Box::new(|| Outcome::Partial(Some(1))),
            ];
            let tally = run_jobs(executor.as_ref(), jobs, |_, _| {});
            assert_eq!(
                tally,
                Tally {
                    successes: 1,
                    partial: 1,
                    failures: 1
                },
                "threads = {}",
                threads
            );
        }
    }

    #[test]
    fn test_tally_display() {
        let tally = Tally {
            successes: 3,
            partial: 1,
            failures: 0,
        };
        assert_eq!(tally.to_string(), "[s=3,p=1,f=0]");
        assert_eq!(tally.total(), 4);
    }
}
