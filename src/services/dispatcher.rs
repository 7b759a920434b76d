//! Dispatch engine: worker pool, polling loop, fan-out, and outcome recording.
//!
//! The engine owns a fixed-size pool of worker tasks behind a bounded job
//! queue. A supervisory loop ticks on an interval; each tick claims a batch
//! of due pending notifications (promoting them to `processing`), expands
//! each one into one `NotificationJob` per requested channel, and enqueues
//! the jobs. Workers drain the queue and run the per-job pipeline:
//!
//! policy gate → render → transport driver → record outcome (Store, then
//! cache mirror).
//!
//! Priority exists only at claim time; the in-memory queue is FIFO.
//!
//! # Shutdown
//!
//! `shutdown()` stops the supervisor, closes the queue, and waits for
//! in-flight workers to finish the job they hold, bounded by a 30-second
//! grace period. No job starts after shutdown begins.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::cache::Cache;
use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppError;
use crate::models::contact::Contact;
use crate::models::delivery::{DeliveryResult, NotificationJob};
use crate::models::notification::{MessageContent, Notification};
use crate::services::transports::Transports;
use crate::services::{policy, renderer, store};

/// How long an enqueue may wait on a full queue before giving up.
///
/// On deadline the notification stays in `processing` with fewer jobs queued
/// than channels requested; a later tick redrives the unattempted channels
/// once the row goes stale, rather than this tick blocking indefinitely.
const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long shutdown waits for in-flight workers before giving up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Shared engine state: everything a worker or tick needs.
struct Engine {
    pool: DbPool,
    cache: Cache,
    transports: Transports,
    claim_batch_size: i64,
}

/// Handle to a running dispatch engine.
///
/// Constructed by [`Dispatcher::start`]; the HTTP layer never holds more
/// than this handle, and the send path does not interact with it at all
/// (workers discover new rows through the polling loop).
pub struct Dispatcher {
    engine: Arc<Engine>,
    job_tx: mpsc::Sender<NotificationJob>,
    shutdown_tx: watch::Sender<bool>,
    supervisor: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn the worker pool and the supervisory polling loop.
    pub fn start(pool: DbPool, cache: Cache, transports: Transports, config: &Config) -> Self {
        let engine = Arc::new(Engine {
            pool,
            cache,
            transports,
            claim_batch_size: config.claim_batch_size,
        });

        let (job_tx, job_rx) = mpsc::channel::<NotificationJob>(config.queue_capacity);
        // mpsc receivers are single-consumer; the pool shares one behind a lock
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let workers = (0..config.worker_count)
            .map(|worker_id| {
                tokio::spawn(worker_loop(engine.clone(), job_rx.clone(), worker_id))
            })
            .collect();

        let supervisor = tokio::spawn(supervisor_loop(
            engine.clone(),
            job_tx.clone(),
            shutdown_rx,
            Duration::from_millis(config.poll_interval_ms),
        ));

        tracing::info!(
            workers = config.worker_count,
            queue_capacity = config.queue_capacity,
            "Dispatch engine started"
        );

        Dispatcher {
            engine,
            job_tx,
            shutdown_tx,
            supervisor,
            workers,
        }
    }

    /// Run one claim/fan-out/enqueue pass outside the supervisory loop.
    ///
    /// Exposed for operational tooling; the supervisor calls the same code
    /// path on its interval.
    pub async fn tick(&self) -> Result<usize, AppError> {
        run_tick(&self.engine, &self.job_tx).await
    }

    /// Graceful shutdown: stop polling, close the queue, drain in-flight work.
    pub async fn shutdown(self) {
        tracing::info!("Dispatch engine shutting down");

        // Stop the supervisor first so no new batch is claimed
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.supervisor.await {
            tracing::error!("Supervisor task panicked during shutdown: {}", e);
        }

        // Closing the channel lets workers finish queued jobs and exit
        drop(self.job_tx);

        let drain = async {
            for worker in self.workers {
                if let Err(e) = worker.await {
                    tracing::error!("Worker task panicked during shutdown: {}", e);
                }
            }
        };

        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            tracing::warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "Workers did not drain within the grace period"
            );
        } else {
            tracing::info!("Dispatch engine stopped");
        }
    }
}

/// Supervisory loop: tick on an interval until shutdown is signalled.
async fn supervisor_loop(
    engine: Arc<Engine>,
    job_tx: mpsc::Sender<NotificationJob>,
    mut shutdown_rx: watch::Receiver<bool>,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_tick(&engine, &job_tx).await {
                    Ok(0) => {}
                    Ok(enqueued) => {
                        tracing::debug!(enqueued, "Tick enqueued jobs");
                    }
                    Err(e) => {
                        // Transient store errors: next tick re-polls
                        tracing::error!("Tick failed: {}", e);
                    }
                }
            }
            _ = shutdown_rx.changed() => break,
        }
    }
}

/// One pass of the supervising loop: claim a batch, fan out, enqueue.
///
/// Returns the number of jobs enqueued. Per-notification failures (missing
/// contact, full queue) are logged and skipped; those notifications sit in
/// `processing` until the claim query's staleness clause redrives them.
async fn run_tick(
    engine: &Engine,
    job_tx: &mpsc::Sender<NotificationJob>,
) -> Result<usize, AppError> {
    let claimed = store::claim_pending_batch(&engine.pool, engine.claim_batch_size).await?;
    if claimed.is_empty() {
        return Ok(0);
    }

    let mut enqueued = 0;
    for notification in claimed {
        enqueued += fan_out(engine, job_tx, &notification).await;
    }
    Ok(enqueued)
}

/// Expand one claimed notification into per-channel jobs and enqueue them.
async fn fan_out(
    engine: &Engine,
    job_tx: &mpsc::Sender<NotificationJob>,
    notification: &Notification,
) -> usize {
    let contact = match store::load_contact(&engine.pool, notification.contact_id).await {
        Ok(contact) => contact,
        Err(e) => {
            tracing::error!(
                notification_id = %notification.id,
                "Failed to load contact for fan-out: {}", e
            );
            return 0;
        }
    };

    let channels = notification.remaining_channels();

    // The signing secret is per-tenant; fetch it once and only when needed
    let webhook_secret = if channels.contains(&crate::models::notification::Channel::Webhook) {
        match store::load_profile(&engine.pool, notification.profile_id).await {
            Ok(profile) => profile.webhook_secret().map(str::to_string),
            Err(e) => {
                tracing::warn!(
                    notification_id = %notification.id,
                    "Failed to load profile for webhook signing: {}", e
                );
                None
            }
        }
    } else {
        None
    };

    let mut enqueued = 0;
    for job in build_jobs(notification, &contact, webhook_secret.as_deref()) {
        let channel = job.channel;
        match job_tx.send_timeout(job, ENQUEUE_TIMEOUT).await {
            Ok(()) => enqueued += 1,
            Err(e) => {
                // Queue stayed full past the deadline (or closed mid-shutdown)
                tracing::error!(
                    notification_id = %notification.id,
                    channel = %channel,
                    "Failed to enqueue job, notification remains processing: {}", e
                );
            }
        }
    }
    enqueued
}

/// Expand one claimed notification into its per-channel jobs.
///
/// One job per remaining (requested but not yet attempted) channel, each
/// carrying the unrendered subject/content, the recipient, and the
/// substitution variables. Already-attempted channels yield no job, so a
/// redriven notification never double-sends.
fn build_jobs(
    notification: &Notification,
    contact: &Contact,
    webhook_secret: Option<&str>,
) -> Vec<NotificationJob> {
    notification
        .remaining_channels()
        .into_iter()
        .map(|channel| NotificationJob {
            notification_id: notification.id,
            profile_id: notification.profile_id,
            contact: contact.clone(),
            channel,
            subject: notification.subject.clone(),
            content: notification.content.0.clone(),
            variables: notification.variables.clone(),
            webhook_secret: webhook_secret.map(str::to_string),
        })
        .collect()
}

/// Worker loop: drain jobs until the queue closes.
async fn worker_loop(
    engine: Arc<Engine>,
    job_rx: Arc<Mutex<mpsc::Receiver<NotificationJob>>>,
    worker_id: usize,
) {
    loop {
        // Hold the lock only while waiting for the next job
        let job = { job_rx.lock().await.recv().await };
        let Some(job) = job else { break };

        process_job(&engine, job, worker_id).await;
    }
    tracing::debug!(worker_id, "Worker stopped");
}

/// Run the full per-job pipeline and record the outcome.
async fn process_job(engine: &Engine, job: NotificationJob, worker_id: usize) {
    let result = match execute_job(engine, &job).await {
        Ok(result) => result,
        Err(e) => {
            // Infrastructure failure before the attempt: record nothing so
            // progress accounting stays truthful; the row stays processing
            tracing::error!(
                worker_id,
                notification_id = %job.notification_id,
                channel = %job.channel,
                "Job aborted before dispatch: {}", e
            );
            return;
        }
    };

    // Store first (authoritative), then the best-effort cache mirror
    match store::record_channel_outcome(&engine.pool, &result).await {
        Ok(Some(terminal)) => {
            tracing::info!(
                notification_id = %result.notification_id,
                channel = %result.channel,
                success = result.success,
                status = terminal.as_str(),
                "Notification reached terminal status"
            );
        }
        Ok(None) => {
            tracing::debug!(
                notification_id = %result.notification_id,
                channel = %result.channel,
                success = result.success,
                "Channel outcome recorded"
            );
        }
        Err(e) => {
            tracing::error!(
                notification_id = %result.notification_id,
                channel = %result.channel,
                "Failed to record delivery outcome: {}", e
            );
            return;
        }
    }

    engine.cache.record_delivery(&result).await;
}

/// Policy gate, render, and driver invocation for one job.
///
/// Returns `Err` only for infrastructure failures happening before any
/// dispatch attempt (the unsubscribe lookup); everything after that point
/// resolves to a `DeliveryResult`.
async fn execute_job(engine: &Engine, job: &NotificationJob) -> Result<DeliveryResult, AppError> {
    // Checked at dispatch time, never cached: late unsubscribes must win
    if !policy::allowed(&engine.pool, job.contact.id, job.channel).await? {
        tracing::debug!(
            notification_id = %job.notification_id,
            channel = %job.channel,
            "Delivery suppressed by unsubscribe"
        );
        return Ok(DeliveryResult::failure(job, policy::UNSUBSCRIBED_ERROR));
    }

    let (subject, content) = render_job(job);
    Ok(engine.transports.deliver(job, &subject, &content).await)
}

/// Render the job's subject and per-format content with its variables.
fn render_job(job: &NotificationJob) -> (String, MessageContent) {
    let subject = renderer::render(&job.subject, &job.variables);
    let content = MessageContent {
        text: job
            .content
            .text
            .as_deref()
            .map(|t| renderer::render(t, &job.variables)),
        html: job
            .content
            .html
            .as_deref()
            .map(|h| renderer::render(h, &job.variables)),
    };
    (subject, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::Channel;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn contact() -> Contact {
        Contact {
            id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            external_id: "user-1".to_string(),
            identifier: "c@x.test".to_string(),
            first_name: None,
            last_name: None,
            timezone: None,
            locale: None,
            preferences: json!({}),
            status: "active".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn notification(requested: &[&str], attempted: &[&str]) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            contact_id: Uuid::new_v4(),
            subject: "Hi {{n}}".to_string(),
            content: sqlx::types::Json(MessageContent {
                text: Some("Hello {{n}}".to_string()),
                html: None,
            }),
            variables: json!({"n": "Ada"}),
            channels_requested: requested.iter().map(|s| s.to_string()).collect(),
            channels_attempted: attempted.iter().map(|s| s.to_string()).collect(),
            priority: "normal".to_string(),
            scheduled_at: Utc::now(),
            status: "processing".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn job_with_content(subject: &str, text: &str, variables: serde_json::Value) -> NotificationJob {
        NotificationJob {
            notification_id: Uuid::new_v4(),
            profile_id: Uuid::new_v4(),
            contact: contact(),
            channel: Channel::Email,
            subject: subject.to_string(),
            content: MessageContent {
                text: Some(text.to_string()),
                html: None,
            },
            variables,
            webhook_secret: None,
        }
    }

    #[test]
    fn build_jobs_expands_one_job_per_channel() {
        let notification = notification(&["email", "sms", "webhook"], &[]);
        let contact = contact();

        let jobs = build_jobs(&notification, &contact, Some("s3cret"));

        assert_eq!(jobs.len(), 3);
        let channels: Vec<Channel> = jobs.iter().map(|j| j.channel).collect();
        assert_eq!(channels, vec![Channel::Email, Channel::Sms, Channel::Webhook]);
        for job in &jobs {
            assert_eq!(job.notification_id, notification.id);
            assert_eq!(job.profile_id, notification.profile_id);
            assert_eq!(job.contact.id, contact.id);
            assert_eq!(job.subject, "Hi {{n}}");
            assert_eq!(job.content.text.as_deref(), Some("Hello {{n}}"));
            assert_eq!(job.variables, json!({"n": "Ada"}));
            assert_eq!(job.webhook_secret.as_deref(), Some("s3cret"));
        }
    }

    #[test]
    fn build_jobs_skips_attempted_channels() {
        // A redriven notification only dispatches what its first claim missed
        let notification = notification(&["email", "sms"], &["email"]);

        let jobs = build_jobs(&notification, &contact(), None);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].channel, Channel::Sms);
    }

    #[test]
    fn render_job_substitutes_subject_and_text() {
        let job = job_with_content("Hi {{n}}", "Hello {{n}}", json!({"n": "Ada"}));
        let (subject, content) = render_job(&job);

        assert_eq!(subject, "Hi Ada");
        assert_eq!(content.text.as_deref(), Some("Hello Ada"));
        assert_eq!(content.html, None);
    }

    #[test]
    fn render_job_leaves_unknown_tokens() {
        let job = job_with_content("{{a}}", "{{missing}}", json!({"a": "x"}));
        let (subject, content) = render_job(&job);

        assert_eq!(subject, "x");
        assert_eq!(content.text.as_deref(), Some("{{missing}}"));
    }
}
