use std::fmt;

use serde::{Deserialize, Serialize};

/// Named capture steps, used to tag log entries and report failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PageLoad,
    SaveSource,
    TakeScreenshot,
    SaveMhtmlArchive,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::PageLoad,
        Stage::SaveSource,
        Stage::TakeScreenshot,
        Stage::SaveMhtmlArchive,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::PageLoad => "page_load",
            Stage::SaveSource => "save_source",
            Stage::TakeScreenshot => "take_screenshot",
            Stage::SaveMhtmlArchive => "save_mhtml_archive",
        };
        f.write_str(name)
    }
}

/// One entry of an attempt's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default)]
    pub exception: bool,
}

/// Append-only event log; insertion order is significant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptureLog {
    events: Vec<LogEvent>,
}

impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.events.push(LogEvent {
            message: message.into(),
            stage: None,
            exception: false,
        });
    }

    pub fn stage_note(&mut self, stage: Stage, message: impl Into<String>) {
        self.events.push(LogEvent {
            message: message.into(),
            stage: Some(stage),
            exception: false,
        });
    }

    pub fn exception(&mut self, stage: Option<Stage>, message: impl Into<String>) {
        self.events.push(LogEvent {
            message: message.into(),
            stage,
            exception: true,
        });
    }

    pub fn has_exception(&self) -> bool {
        self.events.iter().any(|event| event.exception)
    }

    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }
}
