use crate::{IngestError, VisionError};
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render_pages(
        &self,
        path: &Path,
        pages: &[u32],
        dpi: u32,
    ) -> Result<Vec<Vec<u8>>, IngestError>;
}

#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn analyze(&self, prompt: &str, images: &[Vec<u8>]) -> Result<String, VisionError>;
}
