use crate::traits::PageRenderer;
use crate::IngestError;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

// Upper bound on rendered pages, also when every page was requested.
pub const MAX_RENDERED_PAGES: u32 = 20;

pub fn select_pages(page_count: Option<u32>, per_end: u32) -> Vec<u32> {
    let Some(total) = page_count else {
        let leading = if per_end == 0 { MAX_RENDERED_PAGES } else { per_end };
        return (1..=leading.min(MAX_RENDERED_PAGES)).collect();
    };

    if total == 0 {
        return Vec::new();
    }

    if per_end == 0 || total <= per_end.saturating_mul(2) {
        return (1..=total.min(MAX_RENDERED_PAGES)).collect();
    }

    let per_end = per_end.min(MAX_RENDERED_PAGES / 2);
    (1..=per_end)
        .chain((total - per_end + 1)..=total)
        .collect()
}

#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    program: String,
}

impl Default for PdftoppmRenderer {
    fn default() -> Self {
        Self {
            program: "pdftoppm".to_string(),
        }
    }
}

impl PdftoppmRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn render_page(
        &self,
        path: &Path,
        page: u32,
        dpi: u32,
        scratch: &Path,
    ) -> Result<Vec<u8>, IngestError> {
        let prefix = scratch.join(format!("page-{page}"));
        let output = Command::new(&self.program)
            .arg("-png")
            .arg("-singlefile")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg(page.to_string())
            .arg("-l")
            .arg(page.to_string())
            .arg(path)
            .arg(&prefix)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|error| {
                IngestError::Render(format!(
                    "failed to run {}: {error}; make sure poppler-utils is installed",
                    self.program
                ))
            })?;

        if !output.status.success() {
            return Err(IngestError::Render(format!(
                "{} failed on page {page}: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let image_path = prefix.with_extension("png");
        tokio::fs::read(&image_path).await.map_err(|error| {
            IngestError::Render(format!(
                "rendered image missing for page {page}: {error}"
            ))
        })
    }
}

#[async_trait]
impl PageRenderer for PdftoppmRenderer {
    async fn render_pages(
        &self,
        path: &Path,
        pages: &[u32],
        dpi: u32,
    ) -> Result<Vec<Vec<u8>>, IngestError> {
        let scratch = tempfile::tempdir()?;
        let mut images = Vec::with_capacity(pages.len());
        let mut last_error = None;

        for page in pages {
            match self.render_page(path, *page, dpi, scratch.path()).await {
                Ok(image) => images.push(image),
                Err(error) => {
                    debug!(path = %path.display(), page, %error, "page not rendered");
                    last_error = Some(error);
                }
            }
        }

        if images.is_empty() {
            return Err(last_error.unwrap_or_else(|| {
                IngestError::Render(format!("no pages to render for {}", path.display()))
            }));
        }

        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::{select_pages, PdftoppmRenderer, MAX_RENDERED_PAGES};
    use crate::traits::PageRenderer;
    use crate::IngestError;

    #[test]
    fn short_documents_render_every_page() {
        assert_eq!(select_pages(Some(4), 3), vec![1, 2, 3, 4]);
        assert_eq!(select_pages(Some(6), 3), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn long_documents_render_both_ends() {
        assert_eq!(select_pages(Some(10), 3), vec![1, 2, 3, 8, 9, 10]);
        assert_eq!(select_pages(Some(7), 1), vec![1, 7]);
    }

    #[test]
    fn page_selection_is_capped() {
        assert_eq!(select_pages(Some(500), 0).len(), MAX_RENDERED_PAGES as usize);
        assert_eq!(select_pages(None, 0).len(), MAX_RENDERED_PAGES as usize);
        assert_eq!(select_pages(None, 2), vec![1, 2]);
        assert!(select_pages(Some(0), 3).is_empty());
    }

    #[tokio::test]
    async fn missing_rasterizer_is_a_render_error() {
        let renderer = PdftoppmRenderer::new("pdf-vault-no-such-binary");
        let result = renderer
            .render_pages(std::path::Path::new("x.pdf"), &[1], 72)
            .await;
        assert!(matches!(result, Err(IngestError::Render(_))));
    }
}
