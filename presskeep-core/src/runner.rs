use serde::Serialize;
use tracing::{error, info, warn};

use crate::browser::PageSession;
use crate::capture::{CaptureAttempt, CaptureResult};
use crate::config::PresskeepConfig;
use crate::consent::ConsentStrategy;
use crate::store::SqliteSnapshotStore;
use crate::target::{self, TargetIdentity};

/// Which artifacts a batch should capture for every target.
#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    pub save_source: bool,
    pub take_screenshot: bool,
    pub save_archive: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            save_source: true,
            take_screenshot: false,
            save_archive: false,
        }
    }
}

impl CaptureOptions {
    fn any(&self) -> bool {
        self.save_source || self.take_screenshot || self.save_archive
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    pub targets: usize,
    pub captured: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Sequential batch orchestrator: one shared browser session, targets in
/// input order, one target's failure never aborts the rest.
pub struct CaptureRunner<'a> {
    config: &'a PresskeepConfig,
    store: &'a SqliteSnapshotStore,
    options: CaptureOptions,
}

impl<'a> CaptureRunner<'a> {
    pub fn new(
        config: &'a PresskeepConfig,
        store: &'a SqliteSnapshotStore,
        options: CaptureOptions,
    ) -> Self {
        Self {
            config,
            store,
            options,
        }
    }

    pub async fn run(&self, session: &mut dyn PageSession, raw_targets: &[String]) -> BatchStats {
        let mut stats = BatchStats {
            targets: raw_targets.len(),
            ..Default::default()
        };

        for (index, raw) in raw_targets.iter().enumerate() {
            info!(
                target = %raw,
                position = index + 1,
                total = raw_targets.len(),
                "capturing snapshot"
            );
            let target = match target::resolve(raw) {
                Ok(target) => target,
                Err(err) => {
                    error!(target = %raw, error = %err, "target resolution failed");
                    stats.failed += 1;
                    stats.errors.push(format!("{raw}: {err}"));
                    continue;
                }
            };

            match self.capture_one(session, &target).await {
                Ok(recorded_failure) => {
                    if recorded_failure {
                        stats.failed += 1;
                    } else {
                        stats.captured += 1;
                    }
                }
                Err(err) => {
                    error!(target = %target.name, error = %err, "snapshot capture failed");
                    stats.failed += 1;
                    stats.errors.push(format!("{raw}: {err}"));
                }
            }
        }

        info!(
            targets = stats.targets,
            captured = stats.captured,
            failed = stats.failed,
            "batch finished"
        );
        stats
    }

    /// Runs one attempt start to finish and persists whatever it produced.
    ///
    /// Returns whether the finalized record carries a failure. An error here
    /// means no record could be produced at all (allocation or finalize).
    async fn capture_one(
        &self,
        session: &mut dyn PageSession,
        target: &TargetIdentity,
    ) -> CaptureResult<bool> {
        let strategy = target.consent.strategy();
        let mut attempt = CaptureAttempt::new(target.clone(), self.config)?;

        if let Err(err) = self
            .execute_steps(&mut attempt, session, strategy.as_ref())
            .await
        {
            warn!(
                target = %target.name,
                scrape_time = %attempt.scrape_time(),
                error = %err,
                "capture step failed, finalizing partial attempt"
            );
        }

        let metadata = attempt.finalize(self.config)?;
        match self.store.insert_snapshot(&metadata) {
            Ok(id) => info!(
                target = %target.name,
                snapshot_id = id,
                failed = metadata.failed(),
                "snapshot recorded"
            ),
            Err(err) => {
                error!(target = %target.name, error = %err, "failed to persist snapshot record")
            }
        }
        Ok(metadata.failed())
    }

    async fn execute_steps(
        &self,
        attempt: &mut CaptureAttempt,
        session: &mut dyn PageSession,
        strategy: &dyn ConsentStrategy,
    ) -> CaptureResult<()> {
        if self.options.save_source {
            attempt.save_source(session, strategy, self.config).await?;
        }
        if self.options.take_screenshot {
            attempt
                .take_screenshot(session, strategy, self.config)
                .await?;
        }
        if self.options.save_archive {
            attempt.save_archive(session, strategy, self.config).await?;
        }
        if !self.options.any() {
            attempt.load_page(session, strategy).await?;
        }
        Ok(())
    }
}
