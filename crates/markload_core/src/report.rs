use serde::{Deserialize, Serialize};

pub const EMPTY_ARTIFACT_MESSAGE: &str = "conversion returned empty markdown";
pub const DEFAULT_FAILURE_MESSAGE: &str = "conversion failed";

/// Body of a successful `GET /jobs/{jobId}` response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobReport {
    pub status: String,
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobReport {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }

    pub fn ready(markdown: impl Into<String>) -> Self {
        Self {
            status: "ready".to_string(),
            markdown: Some(markdown.into()),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn phase(self) -> JobPhase {
        match self.status.trim().to_ascii_lowercase().as_str() {
            "ready" => match self.markdown {
                Some(markdown) if !markdown.is_empty() => JobPhase::Ready(ConversionResult {
                    markdown,
                    filename: self.filename,
                }),
                _ => JobPhase::Failed(EMPTY_ARTIFACT_MESSAGE.to_string()),
            },
            "error" | "failed" => JobPhase::Failed(
                self.error
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            ),
            _ => JobPhase::Running(self.status),
        }
    }
}

/// Finished artifact of a remote job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub markdown: String,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPhase {
    /// Any non-terminal status, kept for display.
    Running(String),
    Ready(ConversionResult),
    Failed(String),
}
