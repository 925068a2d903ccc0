use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::browser::{BrowserResult, PageSession};
use crate::capture::CaptureLog;

/// Pluggable consent-dialog dismissal, one implementation per site family.
///
/// Called once per attempt, after navigation, before artifacts are captured.
/// "No dialog" is a normal logged outcome; only a failing interaction
/// returns an error.
#[async_trait(?Send)]
pub trait ConsentStrategy {
    fn name(&self) -> &'static str;

    async fn attempt_dismiss(
        &self,
        session: &mut dyn PageSession,
        log: &mut CaptureLog,
    ) -> BrowserResult<()>;
}

/// Strategy tag bound to a target at resolution time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentKind {
    #[default]
    Didomi,
    Vrt,
    Rtbf,
    DpgMedia,
}

impl ConsentKind {
    /// Registry lookup: tag to strategy instance.
    pub fn strategy(self) -> Box<dyn ConsentStrategy> {
        match self {
            ConsentKind::Didomi => Box::new(DidomiConsent),
            ConsentKind::Vrt => Box::new(VrtConsent),
            ConsentKind::Rtbf => Box::new(RtbfConsent),
            ConsentKind::DpgMedia => Box::new(DpgMediaConsent),
        }
    }
}

enum DismissOutcome {
    Clicked,
    NotFound,
    Ambiguous,
}

/// Shared cardinality policy: zero matches is a note, one match is clicked,
/// several matches are never guessed between.
async fn dismiss_by_selector(
    session: &mut dyn PageSession,
    log: &mut CaptureLog,
    label: &str,
    selector: &str,
) -> BrowserResult<DismissOutcome> {
    let matches = session.query(selector).await?;
    match matches.as_slice() {
        [] => {
            log.note(format!("no {label} consent dialog"));
            Ok(DismissOutcome::NotFound)
        }
        [only] => {
            session.click(*only).await?;
            log.note(format!("clicked {label} consent button"));
            Ok(DismissOutcome::Clicked)
        }
        _ => {
            log.note(format!(
                "multiple matches for {label} consent button, leaving dialog alone"
            ));
            Ok(DismissOutcome::Ambiguous)
        }
    }
}

/// Generic default: the Didomi notice used across most of the known sites.
pub struct DidomiConsent;

#[async_trait(?Send)]
impl ConsentStrategy for DidomiConsent {
    fn name(&self) -> &'static str {
        "didomi"
    }

    async fn attempt_dismiss(
        &self,
        session: &mut dyn PageSession,
        log: &mut CaptureLog,
    ) -> BrowserResult<()> {
        dismiss_by_selector(session, log, "Didomi", "#didomi-notice-agree-button").await?;
        Ok(())
    }
}

const VRT_BUTTON_ID: &str = "widget-vrt-cookiebalk3__button";

pub struct VrtConsent;

#[async_trait(?Send)]
impl ConsentStrategy for VrtConsent {
    fn name(&self) -> &'static str {
        "vrt"
    }

    async fn attempt_dismiss(
        &self,
        session: &mut dyn PageSession,
        log: &mut CaptureLog,
    ) -> BrowserResult<()> {
        let matches = session.query(&format!("#{VRT_BUTTON_ID}")).await?;
        match matches.len() {
            0 => log.note("no VRT consent dialog"),
            1 => {
                // The cookie bar button reports itself as not interactable
                // to direct clicks; go through the DOM instead.
                session
                    .run_script(&format!(
                        "document.getElementById('{VRT_BUTTON_ID}').click()"
                    ))
                    .await?;
                log.note("clicked VRT consent button");
            }
            _ => log.note("multiple matches for VRT consent button, leaving dialog alone"),
        }
        Ok(())
    }
}

pub struct RtbfConsent;

#[async_trait(?Send)]
impl ConsentStrategy for RtbfConsent {
    fn name(&self) -> &'static str {
        "rtbf"
    }

    async fn attempt_dismiss(
        &self,
        session: &mut dyn PageSession,
        log: &mut CaptureLog,
    ) -> BrowserResult<()> {
        dismiss_by_selector(session, log, "RTBF", ".button__acceptAll").await?;
        Ok(())
    }
}

const DPG_FRAME_SELECTOR: &str = "iframe[id^='sp_message_iframe']";
const DPG_ACCEPT_SELECTOR: &str = "button[title='Akkoord']";

/// DPG Media sites (hln.be, demorgen.be) gate the page behind a SourcePoint
/// dialog. Probes in order: top document, message iframe, raw markup for a
/// direct privacy-gate URL. Each missed level leaves its own log entry.
pub struct DpgMediaConsent;

impl DpgMediaConsent {
    fn privacy_gate_regex() -> Regex {
        Regex::new(r#"https://myprivacy\.dpgmedia\.be/[^"'\s\\]+"#).expect("valid regex")
    }
}

#[async_trait(?Send)]
impl ConsentStrategy for DpgMediaConsent {
    fn name(&self) -> &'static str {
        "dpg_media"
    }

    async fn attempt_dismiss(
        &self,
        session: &mut dyn PageSession,
        log: &mut CaptureLog,
    ) -> BrowserResult<()> {
        match dismiss_by_selector(session, log, "DPG", DPG_ACCEPT_SELECTOR).await? {
            DismissOutcome::Clicked | DismissOutcome::Ambiguous => return Ok(()),
            DismissOutcome::NotFound => {}
        }

        match session
            .query_in_frame(DPG_FRAME_SELECTOR, DPG_ACCEPT_SELECTOR)
            .await?
        {
            0 => log.note("no DPG consent button inside the message frame"),
            1 => {
                session
                    .click_in_frame(DPG_FRAME_SELECTOR, DPG_ACCEPT_SELECTOR)
                    .await?;
                log.note("clicked DPG consent button inside the message frame");
                return Ok(());
            }
            _ => {
                log.note(
                    "multiple matches for DPG consent button inside the message frame, \
                     leaving dialog alone",
                );
                return Ok(());
            }
        }

        let markup = session.page_source().await?;
        if let Some(found) = Self::privacy_gate_regex().find(&markup) {
            let gate = found.as_str().to_string();
            log.note(format!("following DPG privacy gate at {gate}"));
            session.navigate(&gate).await?;
        } else {
            log.note("DPG consent dialog not found by any probe");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::FakeSession;

    fn click_entries(log: &CaptureLog) -> usize {
        log.events()
            .iter()
            .filter(|event| event.message.starts_with("clicked"))
            .count()
    }

    #[tokio::test]
    async fn single_match_is_clicked_exactly_once() {
        let mut session = FakeSession::with_matches(&[("#didomi-notice-agree-button", 1)]);
        let mut log = CaptureLog::new();
        DidomiConsent
            .attempt_dismiss(&mut session, &mut log)
            .await
            .unwrap();

        assert_eq!(session.clicked, vec!["#didomi-notice-agree-button"]);
        assert_eq!(click_entries(&log), 1);
        assert!(!log.events().iter().any(|e| e.message.contains("multiple")));
    }

    #[tokio::test]
    async fn several_matches_log_ambiguity_and_click_nothing() {
        let mut session = FakeSession::with_matches(&[(".button__acceptAll", 2)]);
        let mut log = CaptureLog::new();
        RtbfConsent
            .attempt_dismiss(&mut session, &mut log)
            .await
            .unwrap();

        assert!(session.clicked.is_empty());
        assert_eq!(click_entries(&log), 0);
        let ambiguity: Vec<_> = log
            .events()
            .iter()
            .filter(|e| e.message.contains("multiple matches"))
            .collect();
        assert_eq!(ambiguity.len(), 1);
        assert!(!log.has_exception());
    }

    #[tokio::test]
    async fn missing_dialog_is_a_note_not_an_error() {
        let mut session = FakeSession::default();
        let mut log = CaptureLog::new();
        DidomiConsent
            .attempt_dismiss(&mut session, &mut log)
            .await
            .unwrap();

        assert!(session.clicked.is_empty());
        assert_eq!(log.events().len(), 1);
        assert!(log.events()[0].message.contains("no Didomi consent dialog"));
        assert!(!log.has_exception());
    }

    #[tokio::test]
    async fn vrt_clicks_through_injected_script() {
        let mut session =
            FakeSession::with_matches(&[("#widget-vrt-cookiebalk3__button", 1)]);
        let mut log = CaptureLog::new();
        VrtConsent
            .attempt_dismiss(&mut session, &mut log)
            .await
            .unwrap();

        assert!(session.clicked.is_empty());
        assert_eq!(session.scripts.len(), 1);
        assert!(session.scripts[0].contains(VRT_BUTTON_ID));
        assert_eq!(click_entries(&log), 1);
    }

    #[tokio::test]
    async fn dpg_falls_back_to_the_message_frame() {
        let mut session = FakeSession::default();
        session.frame_matches.insert(
            (DPG_FRAME_SELECTOR.to_string(), DPG_ACCEPT_SELECTOR.to_string()),
            1,
        );
        let mut log = CaptureLog::new();
        DpgMediaConsent
            .attempt_dismiss(&mut session, &mut log)
            .await
            .unwrap();

        assert_eq!(session.frame_clicked.len(), 1);
        let messages: Vec<_> = log.events().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "no DPG consent dialog",
                "clicked DPG consent button inside the message frame",
            ]
        );
    }

    #[tokio::test]
    async fn dpg_follows_the_privacy_gate_found_in_markup() {
        let mut session = FakeSession::default();
        session.source =
            r#"<a href="https://myprivacy.dpgmedia.be/consent?siteKey=abc123">verder</a>"#.into();
        let mut log = CaptureLog::new();
        DpgMediaConsent
            .attempt_dismiss(&mut session, &mut log)
            .await
            .unwrap();

        assert_eq!(
            session.visited,
            vec!["https://myprivacy.dpgmedia.be/consent?siteKey=abc123"]
        );
        let messages: Vec<_> = log.events().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.len(), 3);
        assert!(messages[2].starts_with("following DPG privacy gate"));
    }

    #[tokio::test]
    async fn dpg_logs_every_missed_probe() {
        let mut session = FakeSession::default();
        session.source = "<html><body>nothing here</body></html>".into();
        let mut log = CaptureLog::new();
        DpgMediaConsent
            .attempt_dismiss(&mut session, &mut log)
            .await
            .unwrap();

        let messages: Vec<_> = log.events().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "no DPG consent dialog",
                "no DPG consent button inside the message frame",
                "DPG consent dialog not found by any probe",
            ]
        );
    }

    #[tokio::test]
    async fn click_failure_propagates() {
        let mut session = FakeSession::with_matches(&[("#didomi-notice-agree-button", 1)]);
        session.fail_click = true;
        let mut log = CaptureLog::new();
        let err = DidomiConsent
            .attempt_dismiss(&mut session, &mut log)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not interactable"));
    }
}
