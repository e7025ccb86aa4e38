use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ItemId = u64;

/// Cookie name to value, forwarded verbatim to the conversion service.
pub type Cookies = BTreeMap<String, String>;

/// What kind of content a request points at. Each kind has its own endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    #[default]
    Article,
    Substack,
    Tweet,
    Pdf,
    Youtube,
    /// A PDF on the local disk, uploaded as a multipart file part.
    LocalPdf,
}

impl ContentKind {
    pub const ALL: [ContentKind; 6] = [
        ContentKind::Article,
        ContentKind::Substack,
        ContentKind::Tweet,
        ContentKind::Pdf,
        ContentKind::Youtube,
        ContentKind::LocalPdf,
    ];

    pub fn endpoint(self) -> &'static str {
        match self {
            ContentKind::Article => "/convert-article",
            ContentKind::Substack => "/convert-substack",
            ContentKind::Tweet => "/convert-tweet",
            ContentKind::Pdf => "/convert-pdf",
            ContentKind::Youtube => "/convert-youtube",
            ContentKind::LocalPdf => "/convert-pdf-upload",
        }
    }

    /// True when the submission carries raw file bytes instead of a JSON body.
    pub fn is_file_backed(self) -> bool {
        matches!(self, ContentKind::LocalPdf)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Article => "article",
            ContentKind::Substack => "substack",
            ContentKind::Tweet => "tweet",
            ContentKind::Pdf => "pdf",
            ContentKind::Youtube => "youtube",
            ContentKind::LocalPdf => "local-pdf",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown content kind '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Error,
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueStatus::Pending => write!(f, "pending"),
            QueueStatus::Processing => write!(f, "processing"),
            QueueStatus::Error => write!(f, "error"),
        }
    }
}

/// A fully-formed conversion request handed over by an input producer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnqueueRequest {
    pub url: String,
    pub kind: ContentKind,
    pub filename: Option<String>,
    pub cookies: Option<Cookies>,
    /// Page HTML captured by the producer.
    pub html: Option<String>,
    /// Local file backing a `LocalPdf` request.
    pub file_path: Option<PathBuf>,
}

impl EnqueueRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: ContentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: ItemId,
    pub url: String,
    pub content_type: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Cookies>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    pub filename: String,
    pub status: QueueStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl QueueItem {
    /// True when this item is still waiting on `job_id`.
    pub fn is_tracking(&self, job_id: &str) -> bool {
        self.status == QueueStatus::Processing && self.job_id.as_deref() == Some(job_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyItem {
    pub id: ItemId,
    pub url: String,
    pub filename: String,
    pub markdown: String,
    pub completed_at: DateTime<Utc>,
}
