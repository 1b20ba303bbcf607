//! fifo CLI: demo producers and workers around the queue.

use clap::{Parser, Subcommand};
use fifo_rs::config::Config;
use fifo_rs::telemetry::job::{record_outcome, start_job_span};
use fifo_rs::telemetry::{TelemetryConfig, init_telemetry};
use fifo_rs::{Queue, callback};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

#[derive(Parser)]
#[command(name = "fifo", about = "Deduplicating FIFO work queue demo")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit one key repeatedly: one fetch runs, every caller is notified
    Simple {
        /// Resource to "fetch"
        #[arg(long, default_value = "https://example.com/")]
        url: String,
        /// How many times to submit it
        #[arg(long, default_value_t = 10)]
        submissions: usize,
    },
    /// Run a worker handling fast and slow requests until Ctrl-C
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "fifo".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Simple { url, submissions } => cmd_simple(&config, url, submissions).await,
        Command::Serve => cmd_serve(&config).await,
    }
}

// ---------------------------------------------------------------------------
// simple
// ---------------------------------------------------------------------------

async fn cmd_simple(config: &Config, url: String, submissions: usize) -> anyhow::Result<()> {
    let root = CancellationToken::new();
    let queue: Queue<String, String, String> = Queue::new(&root);

    let mut workers = Vec::with_capacity(config.workers);
    for n in 0..config.workers {
        let queue = queue.clone();
        let name = format!("fetcher-{n}");
        workers.push(tokio::spawn(async move {
            let jobs = queue.jobs();
            while let Some(job) = jobs.recv().await {
                let span = start_job_span(&name, &job.id);
                let body = async {
                    info!(url = %job.request, "fetching");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    format!("<html>{}</html>", job.request)
                }
                .instrument(span.clone())
                .await;
                record_outcome(&span, "ok");
                queue.finish(&job.id, body).await;
            }
        }));
    }

    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    for i in 0..submissions {
        let done_tx = done_tx.clone();
        let queued = queue
            .add(
                url.clone(),
                url.clone(),
                [callback(move |body: String| {
                    info!(submission = i, %body, "callback fired");
                    let _ = done_tx.send(());
                })],
            )
            .await;
        if queued {
            info!(submission = i, "job added");
        } else {
            info!(submission = i, "job already in the queue, joined it");
        }
    }
    drop(done_tx);

    for _ in 0..submissions {
        if done_rx.recv().await.is_none() {
            anyhow::bail!("callbacks dropped before firing");
        }
    }

    queue.shutdown();
    queue.closed().await;
    for worker in workers {
        worker.await?;
    }
    info!("all submissions answered");
    Ok(())
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Request {
    Fast { email: String },
    Slow { email: String },
    Unsupported(String),
}

#[derive(Debug, Clone)]
struct Verdict {
    is_gmail: bool,
}

#[derive(Debug, Clone, thiserror::Error)]
enum WorkerError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("unsupported request: {0}")]
    Unsupported(String),
}

type Response = Result<Verdict, WorkerError>;

struct Worker {
    queue: Queue<String, Request, Response>,
    fast_timeout: Duration,
    slow_timeout: Duration,
}

impl Worker {
    async fn run(self, name: String) {
        let jobs = self.queue.jobs();
        while let Some(job) = jobs.recv().await {
            let span = start_job_span(&name, &job.id);
            let response = self.process(job.request).instrument(span.clone()).await;
            record_outcome(&span, if response.is_ok() { "ok" } else { "error" });
            self.queue.finish(&job.id, response).await;
        }
        info!(worker = %name, "job stream closed, worker exiting");
    }

    async fn process(&self, request: Request) -> Response {
        match request {
            Request::Fast { email } => {
                classify(email, Duration::from_millis(100), self.fast_timeout).await
            }
            Request::Slow { email } => {
                classify(email, Duration::from_secs(1), self.slow_timeout).await
            }
            Request::Unsupported(what) => Err(WorkerError::Unsupported(what)),
        }
    }
}

/// Simulated lookup that takes `work` to complete.
async fn classify(email: String, work: Duration, budget: Duration) -> Response {
    let lookup = async {
        tokio::time::sleep(work).await;
        Verdict {
            is_gmail: email.ends_with("@gmail.com"),
        }
    };
    tokio::time::timeout(budget, lookup)
        .await
        .map_err(|_| WorkerError::Timeout(budget))
}

async fn cmd_serve(config: &Config) -> anyhow::Result<()> {
    let root = CancellationToken::new();
    let queue: Queue<String, Request, Response> = Queue::new(&root);

    let mut workers = Vec::with_capacity(config.workers);
    for n in 0..config.workers {
        let worker = Worker {
            queue: queue.clone(),
            fast_timeout: config.fast_timeout,
            slow_timeout: config.slow_timeout,
        };
        workers.push(tokio::spawn(worker.run(format!("worker-{n}"))));
    }

    let ctrl = root.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("interrupt received, shutting down");
        ctrl.cancel();
    });

    let fast = "fastRequest@yahoo.com".to_string();
    let slow = "slowRequest@gmail.com".to_string();
    let submissions = [
        (fast.clone(), Request::Fast { email: fast.clone() }),
        (fast.clone(), Request::Fast { email: fast }),
        (slow.clone(), Request::Slow { email: slow }),
        ("foo-bar".to_string(), Request::Unsupported("foo".to_string())),
    ];

    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let mut producers = Vec::new();
    for (id, request) in submissions {
        let queue = queue.clone();
        let done_tx = done_tx.clone();
        producers.push(tokio::spawn(push_job(queue, id, request, done_tx)));
    }
    drop(done_tx);

    let mut pending = 0;
    for producer in producers {
        if producer.await? {
            pending += 1;
        }
    }

    info!("waiting for job responses, hit Ctrl-C to stop");
    root.cancelled().await;

    queue.closed().await;
    for worker in workers {
        worker.await?;
    }
    for _ in 0..pending {
        if done_rx.recv().await.is_none() {
            break;
        }
    }
    info!("finished");
    Ok(())
}

async fn push_job(
    queue: Queue<String, Request, Response>,
    id: String,
    request: Request,
    done: mpsc::UnboundedSender<()>,
) -> bool {
    info!(job.id = %id, "pushing job to queue");
    let job_id = id.clone();
    let queued = queue
        .add_and_close_once(
            id.clone(),
            request,
            [callback(move |response: Response| {
                match response {
                    Ok(verdict) => info!(
                        job.id = %job_id,
                        is_gmail = verdict.is_gmail,
                        "job response received"
                    ),
                    Err(e) => error!(job.id = %job_id, error = %e, "job response was an error"),
                }
                let _ = done.send(());
            })],
        )
        .await;
    if !queued {
        warn!(job.id = %id, "job not added, already in queue");
    }
    queued
}
