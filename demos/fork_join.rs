use forkq::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Counts primes below `limit` and keeps the answer for the caller.
struct CountPrimes {
    limit: u64,
    found: AtomicU64,
}

impl Execute for CountPrimes {
    fn execute(&self) {
        let count = (2..self.limit)
            .filter(|n| (2..).take_while(|d| d * d <= *n).all(|d| n % d != 0))
            .count();
        self.found.store(count as u64, Ordering::Relaxed);
        tracing::info!(limit = self.limit, count, "counted primes");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    println!("=== Fork-Join Example ===\n");

    let jobs: Vec<_> = [10_000, 20_000, 40_000, 80_000]
        .into_iter()
        .map(|limit| {
            Task::new(CountPrimes {
                limit,
                found: AtomicU64::new(0),
            })
        })
        .collect();
    let slow = Task::new(|| thread::sleep(Duration::from_millis(200)));
    let never_runs = Task::new(|| println!("unreachable"));

    let config = Config::builder()
        .num_threads(2)
        .max_elements(16)
        .build()
        .expect("Failed to build config");

    forkq::scope_with_config(config, |queue| {
        let batch: Vec<TaskRef<'_>> = jobs.iter().map(|t| t as TaskRef<'_>).collect();
        let status = queue.fork_join(&batch);
        println!("Batch finished: {:?}", status);

        for job in &jobs {
            println!(
                "  {} primes below {:>6}: {}",
                job.id(),
                job.limit,
                job.found.load(Ordering::Relaxed)
            );
        }

        // Cancel work that has not started yet
        queue.pause();
        queue.enqueue(&slow).expect("queue rejected task");
        queue.enqueue(&never_runs).expect("queue rejected task");
        println!("\nPending while paused: {}", queue.enqueued_count());
        println!("Dropped: {}", queue.drop_enqueued());
        println!("  {} -> {:?}", never_runs.id(), never_runs.status());

        queue.resume();
        queue.enqueue(&slow).expect("queue rejected task");
        queue.drain_and_wait().expect("drain failed");
        println!("  {} -> {:?}", slow.id(), slow.status());

        let metrics = queue.metrics();
        println!(
            "\nExecuted {} tasks, dropped {}, p50 {} ns",
            metrics.tasks_executed, metrics.tasks_dropped, metrics.p50_latency_ns
        );
    })
    .expect("Failed to start queue");
}
