use crate::controller::IndexController;
use crate::search::SearchEngine;
use crate::vision::{OllamaVisionClient, VisionStatus};
use crate::{
    DocumentRecord, JobError, JobPhase, SearchHit, StopOutcome, StoreError, StoreStats, TermMatch,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStatusResponse {
    pub is_running: bool,
    pub phase: JobPhase,
    pub processed: u64,
    pub total: u64,
    pub skipped: u64,
    pub errors: u64,
    pub current_file: String,
    pub last_directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponseItem {
    pub content_hash: String,
    pub file_path: String,
    pub subject: Option<String>,
    pub summary: Option<String>,
    pub date: Option<String>,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub document_type: Option<String>,
    pub tags: Vec<String>,
    pub processing_error: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub relevance_score: u32,
    pub matched_terms_by_field: Vec<TermMatch>,
}

impl From<SearchHit> for SearchResponseItem {
    fn from(hit: SearchHit) -> Self {
        let SearchHit {
            record,
            relevance_score,
            matched_terms_by_field,
        } = hit;

        Self {
            content_hash: record.content_hash,
            file_path: record.file_path,
            subject: record.subject,
            summary: record.summary,
            date: record.date,
            sender: record.sender,
            recipient: record.recipient,
            document_type: record.document_type,
            tags: record.tags,
            processing_error: record.processing_error,
            last_updated: record.last_updated,
            relevance_score,
            matched_terms_by_field,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigResponse {
    pub database_path: String,
    pub ollama_url: String,
    pub model: String,
    pub vision_timeout_secs: u64,
    pub max_pages_per_end: u32,
    pub render_dpi: u32,
}

pub struct VaultApi {
    controller: IndexController,
    search: SearchEngine,
    vision: Arc<OllamaVisionClient>,
}

impl VaultApi {
    pub fn new(controller: IndexController, vision: Arc<OllamaVisionClient>) -> Self {
        let search = SearchEngine::new(Arc::clone(controller.store()));
        Self {
            controller,
            search,
            vision,
        }
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search = SearchEngine::new(Arc::clone(self.controller.store())).with_limit(limit);
        self
    }

    pub fn controller(&self) -> &IndexController {
        &self.controller
    }

    pub fn start_index(&self, path: &str, force: bool) -> ActionResponse {
        match self.controller.start(path, force) {
            Ok(run_id) => {
                info!(%run_id, path, force, "index run accepted");
                ActionResponse::ok()
            }
            Err(error) => {
                warn!(path, %error, "index run rejected");
                ActionResponse::failed(error)
            }
        }
    }

    pub fn stop_index(&self) -> ActionResponse {
        match self.controller.stop() {
            StopOutcome::Requested => ActionResponse::ok(),
            StopOutcome::NothingToStop => ActionResponse::failed("no indexing in progress"),
        }
    }

    pub fn index_status(&self) -> IndexStatusResponse {
        let status = self.controller.status();
        IndexStatusResponse {
            is_running: status.is_running(),
            phase: status.phase,
            processed: status.processed,
            total: status.total,
            skipped: status.skipped,
            errors: status.errors,
            current_file: status.current_file,
            last_directory: status.last_directory,
        }
    }

    pub fn search(&self, query: &str) -> Result<Vec<SearchResponseItem>, StoreError> {
        Ok(self
            .search
            .search(query)?
            .into_iter()
            .map(SearchResponseItem::from)
            .collect())
    }

    pub fn get_document(&self, content_hash: &str) -> Result<DocumentRecord, StoreError> {
        self.controller.store().get(content_hash)
    }

    pub fn delete_document(&self, content_hash: &str) -> ActionResponse {
        match self.controller.store().delete(content_hash) {
            Ok(()) => {
                info!(content_hash, "document deleted");
                ActionResponse::ok()
            }
            Err(error) if error.is_not_found() => ActionResponse::failed("document not found"),
            Err(error) => {
                warn!(content_hash, %error, "delete failed");
                ActionResponse::failed(error)
            }
        }
    }

    pub async fn reindex_document(&self, content_hash: &str) -> ActionResponse {
        match self.controller.reindex(content_hash).await {
            Ok(_) => ActionResponse::ok(),
            Err(JobError::Store(error)) if error.is_not_found() => {
                ActionResponse::failed("document not found")
            }
            Err(error) => {
                warn!(content_hash, %error, "reindex failed");
                ActionResponse::failed(error)
            }
        }
    }

    pub fn clear_index(&self) -> ActionResponse {
        match self.controller.store().clear() {
            Ok(removed) => {
                info!(removed, "index cleared");
                ActionResponse::ok()
            }
            Err(error) => {
                warn!(%error, "clear failed");
                ActionResponse::failed(error)
            }
        }
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        self.controller.store().stats()
    }

    pub fn config(&self) -> ConfigResponse {
        let vision = self.vision.config();
        let options = self.controller.processor().options();
        ConfigResponse {
            database_path: self.controller.store().path().to_string_lossy().to_string(),
            ollama_url: vision.base_url.clone(),
            model: vision.model.clone(),
            vision_timeout_secs: options.vision_timeout.as_secs(),
            max_pages_per_end: options.max_pages_per_end,
            render_dpi: options.effective_dpi(),
        }
    }

    pub async fn vision_status(&self) -> VisionStatus {
        self.vision.check_status().await
    }
}
