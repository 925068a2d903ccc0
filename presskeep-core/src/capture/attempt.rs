use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::browser::PageSession;
use crate::config::PresskeepConfig;
use crate::consent::ConsentStrategy;
use crate::target::TargetIdentity;

use super::error::{CaptureError, CaptureResult};
use super::log::{CaptureLog, Stage};
use super::metadata::{ArtifactRecord, SnapshotMetadata};

/// Lifecycle of one attempt. Transitions only ever move forward; requesting
/// a transition that is already satisfied is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CaptureState {
    Initialized,
    PageLoaded,
    Finalized,
}

/// One run of the capture state machine against one target.
///
/// Owns the artifact folder for its entire lifetime; mutated only by its own
/// step methods, then frozen into a [`SnapshotMetadata`] by `finalize`.
#[derive(Debug)]
pub struct CaptureAttempt {
    target: TargetIdentity,
    scrape_time: DateTime<Local>,
    folder: PathBuf,
    state: CaptureState,
    log: CaptureLog,
    scraped_url: Option<String>,
    source: ArtifactRecord,
    screenshot: ArtifactRecord,
    archive: ArtifactRecord,
}

impl CaptureAttempt {
    /// Allocates the attempt folder under `<data_dir>/<name>/<timestamp>/`.
    ///
    /// Reusing an existing empty folder is fine; a folder that already holds
    /// data belongs to an earlier attempt and is a collision.
    pub fn new(target: TargetIdentity, config: &PresskeepConfig) -> CaptureResult<Self> {
        let scrape_time = Local::now();
        Self::at(target, config, scrape_time)
    }

    fn at(
        target: TargetIdentity,
        config: &PresskeepConfig,
        scrape_time: DateTime<Local>,
    ) -> CaptureResult<Self> {
        let folder = config
            .resolve_path(&config.storage.data_dir)
            .join(&target.name)
            .join(
                scrape_time
                    .format(&config.capture.time_format)
                    .to_string(),
            );
        if folder.is_dir() && fs::read_dir(&folder)?.next().is_some() {
            return Err(CaptureError::FolderCollision { path: folder });
        }
        fs::create_dir_all(&folder)?;

        Ok(Self {
            target,
            scrape_time,
            folder,
            state: CaptureState::Initialized,
            log: CaptureLog::new(),
            scraped_url: None,
            source: ArtifactRecord::missing(),
            screenshot: ArtifactRecord::missing(),
            archive: ArtifactRecord::missing(),
        })
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn log(&self) -> &CaptureLog {
        &self.log
    }

    pub fn target(&self) -> &TargetIdentity {
        &self.target
    }

    pub fn scrape_time(&self) -> DateTime<Local> {
        self.scrape_time
    }

    /// Navigate to the target, dismiss its consent dialog, and record the
    /// post-navigation URL. Artifact steps call this implicitly.
    pub async fn load_page(
        &mut self,
        session: &mut dyn PageSession,
        strategy: &dyn ConsentStrategy,
    ) -> CaptureResult<()> {
        if self.state >= CaptureState::PageLoaded {
            return Ok(());
        }
        let result = self.load_page_inner(session, strategy).await;
        match result {
            Ok(()) => {
                self.state = CaptureState::PageLoaded;
                self.log.stage_note(Stage::PageLoad, "page loaded");
                Ok(())
            }
            Err(err) => {
                self.log.exception(Some(Stage::PageLoad), err.to_string());
                Err(err)
            }
        }
    }

    async fn load_page_inner(
        &mut self,
        session: &mut dyn PageSession,
        strategy: &dyn ConsentStrategy,
    ) -> CaptureResult<()> {
        session.navigate(&self.target.url).await?;
        strategy.attempt_dismiss(session, &mut self.log).await?;
        self.scraped_url = Some(session.current_url().await?);
        Ok(())
    }

    /// Writes the page markup into the attempt folder.
    pub async fn save_source(
        &mut self,
        session: &mut dyn PageSession,
        strategy: &dyn ConsentStrategy,
        config: &PresskeepConfig,
    ) -> CaptureResult<()> {
        if self.source.saved {
            return Ok(());
        }
        self.load_page(session, strategy).await?;
        let result = self
            .write_source(session, &config.artifacts.source_filename)
            .await;
        self.record_step(Stage::SaveSource, "saved page source", result)
    }

    async fn write_source(
        &mut self,
        session: &mut dyn PageSession,
        filename: &str,
    ) -> CaptureResult<()> {
        let markup = session.page_source().await?;
        fs::write(self.folder.join(filename), markup)?;
        self.source = ArtifactRecord::present(filename);
        Ok(())
    }

    /// Writes a raster capture into the attempt folder.
    pub async fn take_screenshot(
        &mut self,
        session: &mut dyn PageSession,
        strategy: &dyn ConsentStrategy,
        config: &PresskeepConfig,
    ) -> CaptureResult<()> {
        if self.screenshot.saved {
            return Ok(());
        }
        self.load_page(session, strategy).await?;
        let result = self
            .write_screenshot(session, &config.artifacts.screenshot_filename)
            .await;
        self.record_step(Stage::TakeScreenshot, "saved screenshot", result)
    }

    async fn write_screenshot(
        &mut self,
        session: &mut dyn PageSession,
        filename: &str,
    ) -> CaptureResult<()> {
        let image = session.screenshot().await?;
        fs::write(self.folder.join(filename), image)?;
        self.screenshot = ArtifactRecord::present(filename);
        Ok(())
    }

    /// Writes the single-file MHTML archive into the attempt folder.
    pub async fn save_archive(
        &mut self,
        session: &mut dyn PageSession,
        strategy: &dyn ConsentStrategy,
        config: &PresskeepConfig,
    ) -> CaptureResult<()> {
        if self.archive.saved {
            return Ok(());
        }
        self.load_page(session, strategy).await?;
        let result = self
            .write_archive(session, &config.artifacts.archive_filename)
            .await;
        self.record_step(Stage::SaveMhtmlArchive, "saved mhtml archive", result)
    }

    async fn write_archive(
        &mut self,
        session: &mut dyn PageSession,
        filename: &str,
    ) -> CaptureResult<()> {
        let payload = session.page_archive().await?;
        fs::write(self.folder.join(filename), payload)?;
        self.archive = ArtifactRecord::present(filename);
        Ok(())
    }

    fn record_step(
        &mut self,
        stage: Stage,
        success: &str,
        result: CaptureResult<()>,
    ) -> CaptureResult<()> {
        match &result {
            Ok(()) => self.log.stage_note(stage, success),
            Err(err) => self.log.exception(Some(stage), err.to_string()),
        }
        result
    }

    /// Freezes the attempt into its metadata record and writes the record
    /// into the attempt folder. The caller hands the result to the store.
    pub fn finalize(&mut self, config: &PresskeepConfig) -> CaptureResult<SnapshotMetadata> {
        let metadata = SnapshotMetadata {
            name: self.target.name.clone(),
            queried_url: self.target.url.clone(),
            scraped_url: self.scraped_url.clone(),
            scrape_time: self
                .scrape_time
                .format(&config.capture.time_format)
                .to_string(),
            logs: self.log.events().to_vec(),
            folder_path: self.folder.to_string_lossy().into_owned(),
            source: self.source.clone(),
            screenshot: self.screenshot.clone(),
            mhtml_archive: self.archive.clone(),
        };
        let payload = serde_json::to_string_pretty(&metadata)?;
        fs::write(self.folder.join(&config.artifacts.metadata_filename), payload)?;
        self.state = CaptureState::Finalized;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::FakeSession;
    use crate::config::test_config;
    use crate::consent::ConsentKind;
    use crate::target::resolve;

    fn vrt_target() -> TargetIdentity {
        resolve("vrt").unwrap()
    }

    #[test]
    fn allocation_reuses_an_empty_folder_but_rejects_a_used_one() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let time = Local::now();

        let attempt = CaptureAttempt::at(vrt_target(), &config, time).unwrap();
        let folder = attempt.folder().to_path_buf();
        assert!(folder.is_dir());

        // Same folder, still empty: allocation succeeds again.
        CaptureAttempt::at(vrt_target(), &config, time).unwrap();

        fs::write(folder.join("source.html"), "<html></html>").unwrap();
        let err = CaptureAttempt::at(vrt_target(), &config, time).unwrap_err();
        assert!(matches!(err, CaptureError::FolderCollision { path } if path == folder));
    }

    #[tokio::test]
    async fn artifact_step_forces_page_load_first() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut session = FakeSession::default();
        session.source = "<html><body>news</body></html>".into();
        let strategy = ConsentKind::Didomi.strategy();

        let mut attempt = CaptureAttempt::new(vrt_target(), &config).unwrap();
        assert_eq!(attempt.state(), CaptureState::Initialized);

        attempt
            .save_source(&mut session, strategy.as_ref(), &config)
            .await
            .unwrap();

        assert_eq!(attempt.state(), CaptureState::PageLoaded);
        assert_eq!(session.visited, vec!["https://www.vrt.be"]);

        let stages: Vec<_> = attempt
            .log()
            .events()
            .iter()
            .filter_map(|event| event.stage)
            .collect();
        let load_at = stages.iter().position(|s| *s == Stage::PageLoad).unwrap();
        let source_at = stages.iter().position(|s| *s == Stage::SaveSource).unwrap();
        assert!(load_at < source_at);

        let written = fs::read_to_string(attempt.folder().join("source.html")).unwrap();
        assert_eq!(written, "<html><body>news</body></html>");
    }

    #[tokio::test]
    async fn promotions_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut session = FakeSession::default();
        let strategy = ConsentKind::Didomi.strategy();

        let mut attempt = CaptureAttempt::new(vrt_target(), &config).unwrap();
        attempt
            .load_page(&mut session, strategy.as_ref())
            .await
            .unwrap();
        attempt
            .load_page(&mut session, strategy.as_ref())
            .await
            .unwrap();
        assert_eq!(session.visited.len(), 1);

        attempt
            .save_source(&mut session, strategy.as_ref(), &config)
            .await
            .unwrap();
        attempt
            .save_source(&mut session, strategy.as_ref(), &config)
            .await
            .unwrap();
        let source_notes = attempt
            .log()
            .events()
            .iter()
            .filter(|event| event.stage == Some(Stage::SaveSource))
            .count();
        assert_eq!(source_notes, 1);
    }

    #[tokio::test]
    async fn archive_step_also_forces_page_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut session = FakeSession::default();
        session.archive_payload = "MIME-Version: 1.0".into();
        let strategy = ConsentKind::Didomi.strategy();

        let mut attempt = CaptureAttempt::new(vrt_target(), &config).unwrap();
        attempt
            .save_archive(&mut session, strategy.as_ref(), &config)
            .await
            .unwrap();

        assert_eq!(attempt.state(), CaptureState::PageLoaded);
        assert_eq!(session.visited.len(), 1);
        let written = fs::read_to_string(attempt.folder().join("archive.mhtml")).unwrap();
        assert_eq!(written, "MIME-Version: 1.0");
    }

    #[tokio::test]
    async fn failed_step_is_logged_and_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut session = FakeSession::default();
        session.fail_screenshot = true;
        let strategy = ConsentKind::Didomi.strategy();

        let mut attempt = CaptureAttempt::new(vrt_target(), &config).unwrap();
        attempt
            .take_screenshot(&mut session, strategy.as_ref(), &config)
            .await
            .unwrap_err();

        assert!(attempt.log().has_exception());
        let failure = attempt
            .log()
            .events()
            .iter()
            .find(|event| event.exception)
            .unwrap();
        assert_eq!(failure.stage, Some(Stage::TakeScreenshot));

        // The page load itself succeeded and stays recorded.
        assert_eq!(attempt.state(), CaptureState::PageLoaded);
    }

    #[tokio::test]
    async fn navigation_failure_is_tagged_page_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut session = FakeSession::default();
        session.fail_navigate = true;
        let strategy = ConsentKind::Didomi.strategy();

        let mut attempt = CaptureAttempt::new(vrt_target(), &config).unwrap();
        attempt
            .save_source(&mut session, strategy.as_ref(), &config)
            .await
            .unwrap_err();

        assert_eq!(attempt.state(), CaptureState::Initialized);
        let failure = attempt
            .log()
            .events()
            .iter()
            .find(|event| event.exception)
            .unwrap();
        assert_eq!(failure.stage, Some(Stage::PageLoad));
        // No stale source record from the failed attempt.
        let metadata = attempt.finalize(&config).unwrap();
        assert!(!metadata.source.saved);
        assert!(metadata.source.filename.is_none());
        assert!(metadata.scraped_url.is_none());
        assert!(metadata.failed());
    }

    #[tokio::test]
    async fn finalize_writes_the_metadata_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut session = FakeSession::default();
        session.resolved_url = Some("https://www.vrt.be/nl/".into());
        let strategy = ConsentKind::Vrt.strategy();

        let mut attempt = CaptureAttempt::new(vrt_target(), &config).unwrap();
        attempt
            .save_source(&mut session, strategy.as_ref(), &config)
            .await
            .unwrap();
        let metadata = attempt.finalize(&config).unwrap();

        assert_eq!(attempt.state(), CaptureState::Finalized);
        assert_eq!(metadata.name, "vrt");
        assert_eq!(metadata.queried_url, "https://www.vrt.be");
        assert_eq!(metadata.scraped_url.as_deref(), Some("https://www.vrt.be/nl/"));
        assert!(metadata.source.saved);

        let document =
            fs::read_to_string(attempt.folder().join("metadata.json")).unwrap();
        let parsed: SnapshotMetadata = serde_json::from_str(&document).unwrap();
        assert_eq!(parsed, metadata);
    }
}
