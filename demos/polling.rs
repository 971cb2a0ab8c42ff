//! # Polling Example
//!
//! Two tasks poll an in-memory job table:
//! - `mailer` may have up to 3 jobs in flight and backs off when there is nothing to send;
//! - `reports` polls at a constant pace and fails every fourth round.
//!
//! A worker subscribed to `Task` events marks each job as running and finishes it later,
//! which frees a slot for the next round.
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example polling --features logging
//! ```

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use taskpoller::{
    ActiveFn, BackoffPolicy, Batch, BoxError, Config, Event, EventKind, JitterPolicy, LogWriter,
    Poller, ScheduleConfiguration, Subscribe, TaskSpec,
};
use tracing_subscriber::EnvFilter;

/// Running jobs per task.
#[derive(Default)]
struct Jobs {
    running: Mutex<HashMap<String, Vec<String>>>,
}

impl Jobs {
    fn active(&self, task: &str) -> Vec<String> {
        self.running
            .lock()
            .unwrap()
            .get(task)
            .cloned()
            .unwrap_or_default()
    }

    fn start(&self, task: &str, job: &str) {
        self.running
            .lock()
            .unwrap()
            .entry(task.to_string())
            .or_default()
            .push(job.to_string());
    }

    fn finish(&self, task: &str, job: &str) {
        if let Some(jobs) = self.running.lock().unwrap().get_mut(task) {
            jobs.retain(|j| j != job);
        }
    }
}

/// Pretends to execute every produced instruction.
struct Worker {
    jobs: Arc<Jobs>,
}

#[async_trait::async_trait]
impl Subscribe for Worker {
    async fn on_event(&self, ev: &Event) {
        let Some(job) = ev.instruction() else { return };
        let task = ev.task_name().to_string();
        let job = job.to_string();

        self.jobs.start(&task, &job);
        let jobs = Arc::clone(&self.jobs);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(700)).await;
            jobs.finish(&task, &job);
        });
    }

    fn name(&self) -> &'static str {
        "worker"
    }

    fn kinds(&self) -> &'static [EventKind] {
        &[EventKind::Task]
    }
}

fn mailer() -> TaskSpec {
    let pending = Arc::new(AtomicU32::new(7));

    TaskSpec::builder("mailer")
        .concurrency(3)
        .delay(BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(2),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        })
        .build(move |cfg: ScheduleConfiguration| {
            let pending = Arc::clone(&pending);
            async move {
                let mut batch = Vec::new();
                while batch.len() < cfg.limit {
                    let left = pending.load(Ordering::Relaxed);
                    if left == 0 {
                        break;
                    }
                    pending.store(left - 1, Ordering::Relaxed);
                    batch.push(format!("mail-{left}"));
                }
                Ok::<_, BoxError>(Batch::from(batch))
            }
        })
}

fn reports() -> TaskSpec {
    let rounds = Arc::new(AtomicU32::new(0));

    TaskSpec::builder("reports")
        .every_ms(400)
        .build(move |_cfg: ScheduleConfiguration| {
            let round = rounds.fetch_add(1, Ordering::Relaxed) + 1;
            async move {
                if round % 4 == 0 {
                    return Err::<Batch, BoxError>("report store unavailable".into());
                }
                Ok(Batch::from(vec![format!("report-{round}")]))
            }
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let jobs = Arc::new(Jobs::default());
    let source = {
        let jobs = Arc::clone(&jobs);
        ActiveFn::arc(move |task: String| {
            let active = jobs.active(&task);
            async move { Ok::<_, BoxError>(active) }
        })
    };

    let poller = Poller::builder(source)
        .with_config(Config {
            grace: Duration::from_secs(5),
            ..Config::default()
        })
        .with_subscribers(vec![
            Arc::new(LogWriter::new()) as Arc<dyn Subscribe>,
            Arc::new(Worker {
                jobs: Arc::clone(&jobs),
            }),
        ])
        .on(EventKind::Error, |ev| {
            eprintln!("[{}] round failed: {:?}", ev.task_name(), ev.poll_error());
        })
        .tasks([mailer(), reports()])
        .build()?;

    tokio::select! {
        res = poller.run_until_signal() => res?,
        _ = tokio::time::sleep(Duration::from_secs(6)) => {
            poller.terminate_within(Duration::from_secs(5)).await?;
        }
    }

    println!("done; still running: {:?}", jobs.active("mailer"));
    Ok(())
}
