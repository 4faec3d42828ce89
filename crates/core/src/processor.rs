use crate::extractor::{LocalExtraction, LopdfExtractor, PdfExtractor};
use crate::render::select_pages;
use crate::traits::{PageRenderer, VisionAnalyzer};
use crate::vision::{analysis_prompt, parse_vision_response, VisionPayload};
use crate::{DocumentRecord, IngestError, ProcessorOptions, VisionError};
use std::path::Path;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, warn};

pub struct DocumentProcessor {
    extractor: Arc<dyn PdfExtractor>,
    renderer: Arc<dyn PageRenderer>,
    analyzer: Arc<dyn VisionAnalyzer>,
    options: ProcessorOptions,
}

impl DocumentProcessor {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        analyzer: Arc<dyn VisionAnalyzer>,
        options: ProcessorOptions,
    ) -> Self {
        Self {
            extractor: Arc::new(LopdfExtractor),
            renderer,
            analyzer,
            options,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PdfExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    pub async fn process(&self, path: &Path, content_hash: &str) -> DocumentRecord {
        let mut record = DocumentRecord::new(content_hash, path.to_string_lossy());

        let local = self.extract_local(path).await;
        if let Some(local) = &local {
            apply_local(&mut record, local, self.options.summary_chars);
        }

        let page_count = local.as_ref().and_then(|local| local.page_count);
        match self.enrich(path, page_count).await {
            Ok(payload) => apply_vision(&mut record, payload),
            Err(error) => {
                warn!(path = %path.display(), %error, "vision enrichment failed");
                record.processing_error = Some(error.to_string());
            }
        }

        record
    }

    async fn extract_local(&self, path: &Path) -> Option<LocalExtraction> {
        let extractor = Arc::clone(&self.extractor);
        let owned = path.to_path_buf();
        let joined = tokio::task::spawn_blocking(move || extractor.extract(&owned)).await;

        match joined {
            Ok(Ok(extraction)) => Some(extraction),
            Ok(Err(error)) => {
                debug!(path = %path.display(), %error, "local extraction unavailable");
                None
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "local extraction task failed");
                None
            }
        }
    }

    async fn enrich(&self, path: &Path, page_count: Option<u32>) -> Result<VisionPayload, IngestError> {
        let pages = select_pages(page_count, self.options.max_pages_per_end);
        if pages.is_empty() {
            return Err(IngestError::Render("document has no pages".to_string()));
        }

        let limit = self.options.vision_timeout;
        let images = timeout(
            limit,
            self.renderer
                .render_pages(path, &pages, self.options.effective_dpi()),
        )
        .await
        .map_err(|_| IngestError::Render(format!("rendering exceeded {}s", limit.as_secs())))??;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let prompt = analysis_prompt(&file_name);

        debug!(path = %path.display(), pages = images.len(), "sending pages to vision model");
        let reply = timeout(limit, self.analyzer.analyze(&prompt, &images))
            .await
            .map_err(|_| VisionError::Timeout(limit.as_secs()))??;

        Ok(parse_vision_response(&reply)?)
    }
}

fn apply_local(record: &mut DocumentRecord, local: &LocalExtraction, summary_chars: usize) {
    record.subject = local.title.clone().or_else(|| local.subject.clone());
    record.sender = local.author.clone();
    record.date = local.creation_date.clone();

    let text = normalize_whitespace(&local.text);
    if !text.is_empty() {
        record.summary = Some(preview(&text, summary_chars));
    }
}

fn apply_vision(record: &mut DocumentRecord, payload: VisionPayload) {
    let VisionPayload {
        subject,
        summary,
        date,
        sender,
        recipient,
        document_type,
        tags,
    } = payload;

    overlay(&mut record.subject, subject);
    overlay(&mut record.summary, summary);
    overlay(&mut record.date, date);
    overlay(&mut record.sender, sender);
    overlay(&mut record.recipient, recipient);
    overlay(&mut record.document_type, document_type);
    if !tags.is_empty() {
        record.tags = tags;
    }
}

fn overlay(target: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *target = value;
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}
