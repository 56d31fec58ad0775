//! The `next` / `batch` loop: registry → research → generation → publish.
//!
//! Connectors are processed strictly one after another. A stage failure is
//! recorded in the ledger and the batch moves on; the failed connector stays
//! pending and is not retried within the same run. Ledger or filesystem
//! failures abort the run.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};

use pagesmith_shared::{
    ConnectorRecord, CostEstimate, PagesmithError, PricingConfig, PublishAction, PublishReceipt,
    Result, Stage,
};
use pagesmith_storage::Registry;

use crate::drafts::DraftStore;
use crate::stages::Stages;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// What happened to one connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorOutcome {
    Published {
        name: String,
        page_id: String,
        action: PublishAction,
    },
    Failed {
        name: String,
        stage: Stage,
        reason: String,
    },
}

impl ConnectorOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

/// Result of a `next` or `batch` run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Outcomes in processing order.
    pub outcomes: Vec<ConnectorOutcome>,
    /// Estimated spend, including connectors that failed after spending.
    pub cost: CostEstimate,
    /// The registry ran out of pending connectors before `count` was reached.
    pub exhausted: bool,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn published(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_published()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.published()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting batch status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a connector enters a new stage.
    fn phase(&self, connector: &str, stage: Stage);
    /// Called before a connector is processed (`current` is 1-based).
    fn connector_started(&self, connector: &str, current: usize, total: usize);
    /// Called after a connector is processed.
    fn connector_finished(&self, outcome: &ConnectorOutcome);
    /// Called while waiting between connectors.
    fn waiting(&self, delay: Duration);
    /// Called when the batch completes.
    fn done(&self, report: &BatchReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _connector: &str, _stage: Stage) {}
    fn connector_started(&self, _connector: &str, _current: usize, _total: usize) {}
    fn connector_finished(&self, _outcome: &ConnectorOutcome) {}
    fn waiting(&self, _delay: Duration) {}
    fn done(&self, _report: &BatchReport) {}
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Runs connectors through the three stages.
pub struct Driver<'a> {
    stages: Stages<'a>,
    drafts: DraftStore,
    pricing: PricingConfig,
    delay: Duration,
}

impl<'a> Driver<'a> {
    pub fn new(stages: Stages<'a>, drafts: DraftStore, pricing: PricingConfig) -> Self {
        Self {
            stages,
            drafts,
            pricing,
            delay: Duration::ZERO,
        }
    }

    /// Pause between consecutive connectors.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Process the next pending connector.
    pub async fn run_next(
        &self,
        registry: &mut Registry,
        progress: &dyn ProgressReporter,
    ) -> Result<BatchReport> {
        self.run_batch(registry, 1, progress).await
    }

    /// Process up to `count` pending connectors.
    ///
    /// `count = 0` returns immediately without touching any stage or the
    /// ledger.
    #[instrument(skip_all, fields(count = count))]
    pub async fn run_batch(
        &self,
        registry: &mut Registry,
        count: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<BatchReport> {
        let start = Instant::now();
        let mut report = BatchReport::default();
        let mut attempted: HashSet<String> = HashSet::new();
        let total = count.min(registry.status().remaining);

        for i in 0..count {
            let Some(record) = registry.next_pending_excluding(&attempted).cloned() else {
                info!(processed = i, "no pending connectors left");
                report.exhausted = true;
                break;
            };

            if i > 0 && !self.delay.is_zero() {
                progress.waiting(self.delay);
                tokio::time::sleep(self.delay).await;
            }

            progress.connector_started(&record.name, i + 1, total);
            attempted.insert(record.name.clone());

            let outcome = self
                .process(registry, &record, &mut report.cost, progress)
                .await?;
            progress.connector_finished(&outcome);
            report.outcomes.push(outcome);
        }

        report.elapsed = start.elapsed();
        info!(
            published = report.published(),
            failed = report.failed(),
            exhausted = report.exhausted,
            cost = %report.cost,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "batch complete"
        );
        progress.done(&report);

        Ok(report)
    }

    /// Run one connector through all stages and update the ledger.
    #[instrument(skip_all, fields(connector = %record.name))]
    async fn process(
        &self,
        registry: &mut Registry,
        record: &ConnectorRecord,
        cost: &mut CostEstimate,
        progress: &dyn ProgressReporter,
    ) -> Result<ConnectorOutcome> {
        match self.run_stages(record, cost, progress).await {
            Ok(receipt) => {
                registry.mark_published(&record.name, &receipt)?;
                self.drafts.remove(&record.name);
                info!(page_id = %receipt.page_id, action = ?receipt.action, "connector published");
                Ok(ConnectorOutcome::Published {
                    name: record.name.clone(),
                    page_id: receipt.page_id,
                    action: receipt.action,
                })
            }
            Err(e) => {
                if let Some(spend) = e.spend() {
                    cost.charge_spend(&self.pricing, spend);
                }
                let Some(stage) = e.stage() else {
                    error!(connector = %record.name, error = %e, "aborting run");
                    return Err(e);
                };
                let reason = stage_reason(&e);
                warn!(%stage, error = %reason, "connector failed, leaving it pending");
                registry.record_failure(&record.name, stage, &reason)?;
                Ok(ConnectorOutcome::Failed {
                    name: record.name.clone(),
                    stage,
                    reason,
                })
            }
        }
    }

    async fn run_stages(
        &self,
        record: &ConnectorRecord,
        cost: &mut CostEstimate,
        progress: &dyn ProgressReporter,
    ) -> Result<PublishReceipt> {
        progress.phase(&record.name, Stage::Research);
        let research = self.stages.researcher.research(record).await?;
        cost.charge_searches(&self.pricing, research.queries_issued);

        progress.phase(&record.name, Stage::Generation);
        let page = self.stages.generator.generate(record, &research).await?;
        cost.charge_tokens(&self.pricing, page.usage);

        self.drafts.write(&record.name, &page.text)?;

        progress.phase(&record.name, Stage::Publish);
        self.stages.publisher.publish(record, &page).await
    }
}

/// Error text without the kind prefix; the stage already says which kind.
fn stage_reason(err: &PagesmithError) -> String {
    match err.root() {
        PagesmithError::Request(msg)
        | PagesmithError::Generation(msg)
        | PagesmithError::Publish(msg) => msg.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{PageGenerator, PagePublisher, Researcher};
    use async_trait::async_trait;
    use pagesmith_shared::{
        Competition, GeneratedPage, LedgerStatus, ResearchResult, StageSpend, TokenUsage,
    };
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    // -- Fakes ---------------------------------------------------------------

    #[derive(Default)]
    struct FakeResearcher {
        calls: AtomicUsize,
        fail_for: Vec<&'static str>,
        /// Searches already made when a failure is reported.
        searches_before_failure: u32,
    }

    #[async_trait]
    impl Researcher for FakeResearcher {
        async fn research(&self, record: &ConnectorRecord) -> Result<ResearchResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_for.contains(&record.name.as_str()) {
                return Err(PagesmithError::Request("HTTP 503".into())
                    .with_spend(StageSpend::searches(self.searches_before_failure)));
            }
            Ok(ResearchResult {
                primary_keyword: format!("{} integration", record.name),
                related_keywords: vec![],
                long_tail_keywords: vec![],
                snippets: vec![],
                competition: Competition::Low,
                queries_issued: 4,
            })
        }
    }

    #[derive(Default)]
    struct FakeGenerator {
        calls: AtomicUsize,
        fail_for: Vec<&'static str>,
    }

    #[async_trait]
    impl PageGenerator for FakeGenerator {
        async fn generate(
            &self,
            record: &ConnectorRecord,
            _research: &ResearchResult,
        ) -> Result<GeneratedPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_for.contains(&record.name.as_str()) {
                return Err(PagesmithError::Generation("completion is empty".into()));
            }
            Ok(GeneratedPage {
                connector: record.name.clone(),
                text: format!("[Title]\n{} page", record.name),
                model: "fake".into(),
                usage: TokenUsage {
                    tokens_in: 1_000,
                    tokens_out: 500,
                },
            })
        }
    }

    #[derive(Default)]
    struct FakePublisher {
        published: Mutex<Vec<String>>,
        fail_for: Vec<&'static str>,
        fatal: bool,
    }

    #[async_trait]
    impl PagePublisher for FakePublisher {
        async fn publish(
            &self,
            record: &ConnectorRecord,
            _page: &GeneratedPage,
        ) -> Result<PublishReceipt> {
            if self.fatal {
                return Err(PagesmithError::config("CMS token revoked"));
            }
            if self.fail_for.contains(&record.name.as_str()) {
                return Err(PagesmithError::Publish(
                    "validation failed (HTTP 422)".into(),
                ));
            }
            self.published.lock().unwrap().push(record.name.clone());
            Ok(PublishReceipt {
                page_id: format!("id-{}", record.name),
                slug: record.name.to_lowercase(),
                action: PublishAction::Created,
                content_sha256: "hash".into(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        started: Mutex<Vec<(String, usize, usize)>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, _connector: &str, _stage: Stage) {}
        fn connector_started(&self, connector: &str, current: usize, total: usize) {
            self.started
                .lock()
                .unwrap()
                .push((connector.to_string(), current, total));
        }
        fn connector_finished(&self, _outcome: &ConnectorOutcome) {}
        fn waiting(&self, _delay: Duration) {}
        fn done(&self, _report: &BatchReport) {}
    }

    struct Fixture {
        dir: PathBuf,
        registry: Registry,
    }

    impl Fixture {
        fn new(names: &[&str]) -> Self {
            let dir = std::env::temp_dir().join(format!("pagesmith-driver-{}", Uuid::now_v7()));
            std::fs::create_dir_all(&dir).unwrap();
            let records: Vec<_> = names.iter().map(|n| record_json(n)).collect();
            std::fs::write(dir.join("connectors.json"), format!("[{}]", records.join(","))).unwrap();
            let registry =
                Registry::open(&dir.join("connectors.json"), &dir.join("ledger.json")).unwrap();
            Self { dir, registry }
        }

        fn ledger_path(&self) -> PathBuf {
            self.dir.join("ledger.json")
        }

        fn drafts(&self) -> DraftStore {
            DraftStore::new(self.dir.join("drafts"))
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.dir).ok();
        }
    }

    fn record_json(name: &str) -> String {
        format!(r#"{{"name": "{name}"}}"#)
    }

    fn pricing() -> PricingConfig {
        PricingConfig {
            per_search: 0.01,
            input_per_million: 1.0,
            output_per_million: 2.0,
        }
    }

    // -- Tests ---------------------------------------------------------------

    #[tokio::test]
    async fn batch_publishes_in_order_and_updates_status() {
        let mut fx = Fixture::new(&["HubSpot", "Slack", "Notion"]);
        let researcher = FakeResearcher::default();
        let generator = FakeGenerator::default();
        let publisher = FakePublisher::default();
        let stages = Stages {
            researcher: &researcher,
            generator: &generator,
            publisher: &publisher,
        };
        let driver = Driver::new(stages, fx.drafts(), pricing());

        let before = fx.registry.status();
        let report = driver
            .run_batch(&mut fx.registry, 2, &SilentProgress)
            .await
            .unwrap();
        let after = fx.registry.status();

        assert_eq!(report.published(), 2);
        assert!(!report.exhausted);
        assert_eq!(*publisher.published.lock().unwrap(), vec!["HubSpot", "Slack"]);
        assert_eq!(after.published, before.published + 2);
        assert_eq!(after.remaining, before.remaining - 2);
        assert_eq!(after.next.as_deref(), Some("Notion"));

        // 2 connectors x (4 searches, 1000 in, 500 out)
        assert_eq!(report.cost.search_queries, 8);
        assert_eq!(report.cost.tokens_in, 2_000);
        assert!((report.cost.usd - (0.08 + 0.002 + 0.002)).abs() < 1e-9);

        // Drafts are removed after a confirmed publish.
        assert!(!fx.drafts().path_for("HubSpot").exists());
    }

    #[tokio::test]
    async fn failures_stay_pending_and_batch_moves_on() {
        let mut fx = Fixture::new(&["A", "B", "C", "D"]);
        let researcher = FakeResearcher {
            fail_for: vec!["A"],
            ..Default::default()
        };
        let generator = FakeGenerator {
            fail_for: vec!["B"],
            ..Default::default()
        };
        let publisher = FakePublisher {
            fail_for: vec!["C"],
            ..Default::default()
        };
        let stages = Stages {
            researcher: &researcher,
            generator: &generator,
            publisher: &publisher,
        };
        let driver = Driver::new(stages, fx.drafts(), pricing());

        let report = driver
            .run_batch(&mut fx.registry, 4, &SilentProgress)
            .await
            .unwrap();

        let stages_failed: Vec<_> = report
            .outcomes
            .iter()
            .filter_map(|o| match o {
                ConnectorOutcome::Failed { name, stage, .. } => Some((name.as_str(), *stage)),
                _ => None,
            })
            .collect();
        assert_eq!(
            stages_failed,
            vec![
                ("A", Stage::Research),
                ("B", Stage::Generation),
                ("C", Stage::Publish)
            ]
        );
        assert_eq!(report.published(), 1);
        assert!(report.has_failures());

        for name in ["A", "B", "C"] {
            assert_eq!(fx.registry.status_of(name), Some(LedgerStatus::Pending));
            assert_eq!(fx.registry.ledger_entry(name).unwrap().attempts, 1);
        }
        assert_eq!(fx.registry.status_of("D"), Some(LedgerStatus::Published));
        assert_eq!(fx.registry.status().failed, 3);

        // Generation spend for C is counted even though its publish failed.
        assert_eq!(report.cost.tokens_in, 2_000);
        // The draft of the failed publish is kept.
        assert!(fx.drafts().path_for("C").exists());
        assert!(!fx.drafts().path_for("B").exists());
    }

    #[tokio::test]
    async fn failed_connector_is_not_retried_within_a_batch() {
        let mut fx = Fixture::new(&["A", "B"]);
        let researcher = FakeResearcher {
            fail_for: vec!["A"],
            ..Default::default()
        };
        let generator = FakeGenerator::default();
        let publisher = FakePublisher::default();
        let stages = Stages {
            researcher: &researcher,
            generator: &generator,
            publisher: &publisher,
        };
        let driver = Driver::new(stages, fx.drafts(), pricing());

        let report = driver
            .run_batch(&mut fx.registry, 5, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(researcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.exhausted);
    }

    #[tokio::test]
    async fn zero_count_touches_nothing() {
        let mut fx = Fixture::new(&["A"]);
        let researcher = FakeResearcher::default();
        let generator = FakeGenerator::default();
        let publisher = FakePublisher::default();
        let stages = Stages {
            researcher: &researcher,
            generator: &generator,
            publisher: &publisher,
        };
        let driver = Driver::new(stages, fx.drafts(), pricing());

        let report = driver
            .run_batch(&mut fx.registry, 0, &SilentProgress)
            .await
            .unwrap();

        assert!(report.outcomes.is_empty());
        assert!(!report.exhausted);
        assert_eq!(researcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert!(!fx.ledger_path().exists());
    }

    #[tokio::test]
    async fn next_after_everything_published_reports_exhaustion() {
        let mut fx = Fixture::new(&["A"]);
        let researcher = FakeResearcher::default();
        let generator = FakeGenerator::default();
        let publisher = FakePublisher::default();
        let stages = Stages {
            researcher: &researcher,
            generator: &generator,
            publisher: &publisher,
        };
        let driver = Driver::new(stages, fx.drafts(), pricing());

        let first = driver.run_next(&mut fx.registry, &SilentProgress).await.unwrap();
        assert_eq!(first.published(), 1);

        let second = driver.run_next(&mut fx.registry, &SilentProgress).await.unwrap();
        assert!(second.exhausted);
        assert!(second.outcomes.is_empty());
        assert!(!second.has_failures());
        assert_eq!(researcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_without_a_stage_abort_the_run() {
        let mut fx = Fixture::new(&["A", "B"]);
        let researcher = FakeResearcher::default();
        let generator = FakeGenerator::default();
        let publisher = FakePublisher {
            fatal: true,
            ..Default::default()
        };
        let stages = Stages {
            researcher: &researcher,
            generator: &generator,
            publisher: &publisher,
        };
        let driver = Driver::new(stages, fx.drafts(), pricing());

        let err = driver
            .run_batch(&mut fx.registry, 2, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, PagesmithError::Config { .. }));
        assert_eq!(researcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.registry.status_of("A"), Some(LedgerStatus::Pending));
    }

    #[tokio::test]
    async fn spend_of_failed_stages_is_charged() {
        let mut fx = Fixture::new(&["A"]);
        let researcher = FakeResearcher {
            fail_for: vec!["A"],
            searches_before_failure: 2,
            ..Default::default()
        };
        let generator = FakeGenerator::default();
        let publisher = FakePublisher::default();
        let stages = Stages {
            researcher: &researcher,
            generator: &generator,
            publisher: &publisher,
        };
        let driver = Driver::new(stages, fx.drafts(), pricing());

        let report = driver
            .run_batch(&mut fx.registry, 1, &SilentProgress)
            .await
            .unwrap();

        assert!(report.has_failures());
        assert_eq!(report.cost.search_queries, 2);
        assert!((report.cost.usd - 0.02).abs() < 1e-9);
        assert_eq!(
            fx.registry.ledger_entry("A").unwrap().last_error.as_ref().unwrap().reason,
            "HTTP 503"
        );
    }

    #[tokio::test]
    async fn progress_total_is_capped_by_pending_connectors() {
        let mut fx = Fixture::new(&["A", "B", "C"]);
        let researcher = FakeResearcher::default();
        let generator = FakeGenerator::default();
        let publisher = FakePublisher::default();
        let stages = Stages {
            researcher: &researcher,
            generator: &generator,
            publisher: &publisher,
        };
        let driver = Driver::new(stages, fx.drafts(), pricing());
        let progress = RecordingProgress::default();

        let report = driver
            .run_batch(&mut fx.registry, 1_000, &progress)
            .await
            .unwrap();

        assert!(report.exhausted);
        let started = progress.started.lock().unwrap();
        let totals: Vec<_> = started.iter().map(|(_, current, total)| (*current, *total)).collect();
        assert_eq!(totals, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn unwritable_drafts_abort_without_marking() {
        let mut fx = Fixture::new(&["A", "B"]);
        // A plain file where the drafts directory should be.
        let blocked = fx.dir.join("drafts-blocked");
        std::fs::write(&blocked, "not a directory").unwrap();

        let researcher = FakeResearcher::default();
        let generator = FakeGenerator::default();
        let publisher = FakePublisher::default();
        let stages = Stages {
            researcher: &researcher,
            generator: &generator,
            publisher: &publisher,
        };
        let driver = Driver::new(stages, DraftStore::new(&blocked), pricing());

        let err = driver
            .run_batch(&mut fx.registry, 2, &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, PagesmithError::Io { .. }));
        assert!(publisher.published.lock().unwrap().is_empty());
        assert_eq!(researcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.registry.status_of("A"), Some(LedgerStatus::Pending));
        assert!(!fx.ledger_path().exists());
    }

    #[test]
    fn stage_reason_strips_kind_prefix() {
        assert_eq!(
            stage_reason(&PagesmithError::Publish("HTTP 401".into())),
            "HTTP 401"
        );
        assert_eq!(
            stage_reason(
                &PagesmithError::Generation("completion is empty".into())
                    .with_spend(StageSpend::searches(1))
            ),
            "completion is empty"
        );
    }
}
