use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::app::{Pipeline, RunOptions};
use crate::error::Result;

const SKIPPED_OUTCOME: &str = "Skipped: previous run still in progress";

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub last_run_time: Option<DateTime<Utc>>,
    pub last_run_outcome: Option<String>,
    pub run_count: u64,
    pub next_scheduled_time: Option<DateTime<Tz>>,
}

#[derive(Debug, Default)]
struct RunRecord {
    last_run_time: Option<DateTime<Utc>>,
    last_run_outcome: Option<String>,
    run_count: u64,
}

/// Runs the pipeline on a cron cadence evaluated in a fixed time zone.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    cron: String,
    timezone: Tz,
    record: Arc<Mutex<RunRecord>>,
    active: Mutex<Option<(JobScheduler, Uuid)>>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, cron: impl Into<String>, timezone: Tz) -> Self {
        Self {
            pipeline,
            cron: cron.into(),
            timezone,
            record: Arc::new(Mutex::new(RunRecord::default())),
            active: Mutex::new(None),
        }
    }

    /// Returns `false` if the scheduler was already running.
    pub async fn start(&self) -> Result<bool> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Ok(false);
        }

        let pipeline = Arc::clone(&self.pipeline);
        let record = Arc::clone(&self.record);
        let job = Job::new_async_tz(self.cron.as_str(), self.timezone, move |_uuid, _lock| {
            let pipeline = Arc::clone(&pipeline);
            let record = Arc::clone(&record);
            Box::pin(async move {
                run_and_record(&pipeline, &record).await;
            })
        })?;

        let scheduler = JobScheduler::new().await?;
        let job_id = scheduler.add(job).await?;
        scheduler.start().await?;

        tracing::info!("Scheduler started with cron '{}' in {}", self.cron, self.timezone);
        *active = Some((scheduler, job_id));
        Ok(true)
    }

    /// Returns `false` if the scheduler was not running.
    pub async fn stop(&self) -> Result<bool> {
        let Some((mut scheduler, _)) = self.active.lock().await.take() else {
            return Ok(false);
        };
        scheduler.shutdown().await?;
        tracing::info!("Scheduler stopped");
        Ok(true)
    }

    /// Run the job immediately, outside the cron cadence.
    pub async fn run_now(&self) -> String {
        run_and_record(&self.pipeline, &self.record).await
    }

    pub async fn status(&self) -> SchedulerStatus {
        let active = self.active.lock().await;
        let is_running = active.is_some();
        let next_scheduled_time = match active.as_ref() {
            Some((scheduler, job_id)) => {
                let mut scheduler = scheduler.clone();
                match scheduler.next_tick_for_job(*job_id).await {
                    Ok(next) => next.map(|t| t.with_timezone(&self.timezone)),
                    Err(e) => {
                        tracing::debug!("Failed to read next tick: {:?}", e);
                        None
                    }
                }
            }
            None => None,
        };
        drop(active);

        let record = self.record.lock().await;
        SchedulerStatus {
            is_running,
            last_run_time: record.last_run_time,
            last_run_outcome: record.last_run_outcome.clone(),
            run_count: record.run_count,
            next_scheduled_time,
        }
    }
}

async fn run_and_record(pipeline: &Pipeline, record: &Mutex<RunRecord>) -> String {
    let options = RunOptions::from_config(pipeline.config());
    let outcome = match pipeline.try_run(options).await {
        None => SKIPPED_OUTCOME.to_string(),
        Some(Ok(summary)) => summary.describe(),
        Some(Err(e)) => {
            tracing::error!("Scheduled run failed: {}", e);
            format!("Error: {}", e)
        }
    };

    let mut record = record.lock().await;
    record.last_run_time = Some(Utc::now());
    record.last_run_outcome = Some(outcome.clone());
    record.run_count += 1;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;

    use chrono::Timelike;
    use chrono_tz::Europe::Copenhagen;

    use crate::ai::TranslationDispatcher;
    use crate::config::Config;
    use crate::db::ArticleStore;
    use crate::test_support::{unreachable_url, StubResponse, StubServer};

    const EMPTY_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>Børsen</title><link>https://borsen.dk</link><description>Nyheder</description></channel></rss>"#;

    async fn pipeline(feeds: Vec<String>) -> Arc<Pipeline> {
        let config = Config {
            feeds,
            scrape_enabled: false,
            deepl_api_key: None,
            openai_api_key: None,
            huggingface_api_key: None,
            together_api_key: None,
            ..Config::default()
        };
        let store = ArticleStore::open_in_memory(config.retention_days).await.unwrap();
        let translator = TranslationDispatcher::from_config(&config).unwrap();
        Arc::new(Pipeline::from_parts(config, store, translator).unwrap())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_is_idempotent_and_stop_ends_it() {
        let scheduler = Scheduler::new(pipeline(vec!["https://borsen.dk/rss".into()]).await, "0 0,30 6-20 * * *", Copenhagen);

        assert!(scheduler.start().await.unwrap());
        assert!(!scheduler.start().await.unwrap());
        assert!(scheduler.status().await.is_running);

        assert!(scheduler.stop().await.unwrap());
        assert!(!scheduler.stop().await.unwrap());

        let status = scheduler.status().await;
        assert!(!status.is_running);
        assert_eq!(status.next_scheduled_time, None);
        assert_eq!(status.run_count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_cron_is_rejected() {
        let scheduler = Scheduler::new(pipeline(vec!["https://borsen.dk/rss".into()]).await, "every half hour", Copenhagen);

        assert!(scheduler.start().await.is_err());
        assert!(!scheduler.status().await.is_running);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_now_records_outcomes() {
        let server = StubServer::start(vec![("/rss", StubResponse::ok("application/rss+xml", EMPTY_FEED))]).await;
        let scheduler = Scheduler::new(pipeline(vec![server.url("/rss")]).await, "0 0,30 6-20 * * *", Copenhagen);

        assert_eq!(scheduler.run_now().await, "No articles found");

        let status = scheduler.status().await;
        assert_eq!(status.run_count, 1);
        assert_eq!(status.last_run_outcome.as_deref(), Some("No articles found"));
        assert!(status.last_run_time.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_run_is_reported_as_error() {
        let scheduler = Scheduler::new(pipeline(vec![unreachable_url().await]).await, "0 0,30 6-20 * * *", Copenhagen);

        let outcome = scheduler.run_now().await;

        assert!(outcome.starts_with("Error: "), "{}", outcome);
        assert_eq!(scheduler.status().await.run_count, 1);
    }

    fn assert_spawnable<F: Future<Output = ()> + Send + 'static>(_: F) {}

    #[tokio::test]
    async fn job_body_can_run_on_the_scheduler_runtime() {
        let pipeline = pipeline(vec!["https://borsen.dk/rss".into()]).await;
        let record = Arc::new(Mutex::new(RunRecord::default()));

        assert_spawnable(async move {
            run_and_record(&pipeline, &record).await;
        });
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn next_run_is_a_copenhagen_half_hour_slot() {
        let scheduler = Scheduler::new(
            pipeline(vec!["https://borsen.dk/rss".into()]).await,
            "0 0,30 6-20 * * *",
            Copenhagen,
        );
        assert!(scheduler.start().await.unwrap());

        let next = scheduler.status().await.next_scheduled_time.unwrap();
        scheduler.stop().await.unwrap();

        assert_eq!(next.timezone(), Copenhagen);
        assert!(next.minute() == 0 || next.minute() == 30, "{}", next);
        assert_eq!(next.second(), 0);
        assert!((6..=20).contains(&next.hour()), "{}", next);
        assert!(next > Utc::now());
    }
}
