use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationStatus {
    Started,
    Finished,
    Cancelled,
    Failed,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: u32,
    pub total: u32,
}

impl Progress {
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            100
        } else {
            self.current * 100 / self.total
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationEvent {
    pub ts: u64,
    pub status: IterationStatus,
    pub progress: Progress,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl IterationEvent {
    pub fn new(status: IterationStatus, progress: Progress) -> Self {
        Self {
            ts: now_ms(),
            status,
            progress,
            duration_ms: 0,
            preview: None,
            reason: None,
        }
    }

    /// Status-bar text, e.g. "Iteration 2/5 (40%)".
    pub fn status_line(&self) -> String {
        let p = self.progress;
        let head = format!("Iteration {}/{} ({}%)", p.current, p.total, p.percent());
        match self.status {
            IterationStatus::Started => format!("{}: generating", head),
            IterationStatus::Finished => match self.preview {
                Some(ref preview) => format!("{}: {}", head, preview),
                None => format!("{}: done", head),
            },
            IterationStatus::Cancelled => format!("{}: cancelled", head),
            IterationStatus::Failed => format!(
                "{}: failed: {}",
                head,
                self.reason.as_deref().unwrap_or("unknown error")
            ),
            IterationStatus::Completed => format!("Completed {} iteration(s)", p.total),
        }
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// First 200 characters of `text`, marked when cut.
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(200).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
