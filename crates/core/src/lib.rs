pub mod api;
pub mod controller;
pub mod error;
pub mod extractor;
pub mod hashing;
pub mod ingest;
pub mod models;
pub mod processor;
pub mod render;
pub mod search;
pub mod store;
pub mod traits;
pub mod vision;

pub use api::{ActionResponse, ConfigResponse, IndexStatusResponse, SearchResponseItem, VaultApi};
pub use controller::IndexController;
pub use error::{IngestError, JobError, Result, StoreError, VisionError};
pub use extractor::{LocalExtraction, LopdfExtractor, PdfExtractor};
pub use hashing::{hash_file, hash_reader};
pub use ingest::{discover_pdf_files, is_pdf, validate_root};
pub use models::{
    DocumentRecord, JobPhase, JobStatus, ProcessorOptions, SearchField, SearchHit, StopOutcome,
    StoreStats, TermMatch, MAX_RENDER_DPI,
};
pub use processor::{normalize_whitespace, DocumentProcessor};
pub use render::{select_pages, PdftoppmRenderer, MAX_RENDERED_PAGES};
pub use search::{SearchEngine, FUZZY_THRESHOLD};
pub use store::DocumentStore;
pub use traits::{PageRenderer, VisionAnalyzer};
pub use vision::{
    OllamaVisionClient, VisionConfig, VisionPayload, VisionServiceState, VisionStatus,
};
