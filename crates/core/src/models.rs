use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    pub content_hash: String,
    pub file_path: String,
    pub subject: Option<String>,
    pub summary: Option<String>,
    pub date: Option<String>,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub document_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub processing_error: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(content_hash: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            content_hash: content_hash.into(),
            file_path: file_path.into(),
            subject: None,
            summary: None,
            date: None,
            sender: None,
            recipient: None,
            document_type: None,
            tags: Vec::new(),
            processing_error: None,
            last_updated: Utc::now(),
        }
    }

    pub fn file_name(&self) -> &str {
        Path::new(&self.file_path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.file_path)
    }

    pub fn has_error(&self) -> bool {
        self.processing_error.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    #[default]
    Idle,
    Running,
    Stopping,
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Idle => write!(f, "idle"),
            JobPhase::Running => write!(f, "running"),
            JobPhase::Stopping => write!(f, "stopping"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct JobStatus {
    pub phase: JobPhase,
    pub run_id: Option<Uuid>,
    pub total: u64,
    pub processed: u64,
    pub skipped: u64,
    pub errors: u64,
    pub current_file: String,
    pub cancel_requested: bool,
    pub last_directory: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobStatus {
    pub fn is_running(&self) -> bool {
        self.phase != JobPhase::Idle
    }

    pub fn completed(&self) -> u64 {
        self.processed + self.skipped + self.errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Requested,
    NothingToStop,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Filename,
    Subject,
    Sender,
    Recipient,
    DocumentType,
    Tags,
    Summary,
}

impl SearchField {
    pub const ALL: [SearchField; 7] = [
        SearchField::Filename,
        SearchField::Subject,
        SearchField::Sender,
        SearchField::Recipient,
        SearchField::DocumentType,
        SearchField::Tags,
        SearchField::Summary,
    ];

    pub fn weight(self) -> u32 {
        match self {
            SearchField::Filename | SearchField::Subject => 3,
            SearchField::Sender | SearchField::Recipient | SearchField::DocumentType => 2,
            SearchField::Tags | SearchField::Summary => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchField::Filename => "filename",
            SearchField::Subject => "subject",
            SearchField::Sender => "sender",
            SearchField::Recipient => "recipient",
            SearchField::DocumentType => "document_type",
            SearchField::Tags => "tags",
            SearchField::Summary => "summary",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TermMatch {
    pub term: String,
    pub fields: Vec<SearchField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub record: DocumentRecord,
    pub relevance_score: u32,
    pub matched_terms_by_field: Vec<TermMatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub total: u64,
    pub errors: u64,
    pub by_type: BTreeMap<String, u64>,
}

pub const MAX_RENDER_DPI: u32 = 300;

#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    // Zero renders every page.
    pub max_pages_per_end: u32,
    pub render_dpi: u32,
    pub vision_timeout: Duration,
    pub summary_chars: usize,
}

impl ProcessorOptions {
    pub fn effective_dpi(&self) -> u32 {
        self.render_dpi.clamp(36, MAX_RENDER_DPI)
    }
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            max_pages_per_end: 3,
            render_dpi: 150,
            vision_timeout: Duration::from_secs(60),
            summary_chars: 280,
        }
    }
}
