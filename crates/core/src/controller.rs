use crate::hashing::hash_file;
use crate::ingest::{discover_pdf_files, validate_root};
use crate::processor::DocumentProcessor;
use crate::store::DocumentStore;
use crate::{DocumentRecord, JobError, JobPhase, JobStatus, StopOutcome, StoreError};
use chrono::Utc;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Processed,
    Skipped,
    Failed,
}

struct Shared {
    state: Mutex<JobStatus>,
    store: Arc<DocumentStore>,
    processor: Arc<DocumentProcessor>,
}

#[derive(Clone)]
pub struct IndexController {
    shared: Arc<Shared>,
}

impl IndexController {
    pub fn new(store: Arc<DocumentStore>, processor: Arc<DocumentProcessor>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(JobStatus::default()),
                store,
                processor,
            }),
        }
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.shared.store
    }

    pub fn processor(&self) -> &Arc<DocumentProcessor> {
        &self.shared.processor
    }

    pub fn start(&self, root: &str, force: bool) -> Result<Uuid, JobError> {
        let runtime = Handle::try_current().map_err(|_| JobError::NoRuntime)?;

        if self.shared.state.lock().phase != JobPhase::Idle {
            return Err(JobError::AlreadyRunning);
        }

        let root = validate_root(root)?;

        let run_id = {
            let mut state = self.shared.state.lock();
            if state.phase != JobPhase::Idle {
                return Err(JobError::AlreadyRunning);
            }

            let run_id = Uuid::new_v4();
            *state = JobStatus {
                phase: JobPhase::Running,
                run_id: Some(run_id),
                last_directory: root.to_string_lossy().to_string(),
                started_at: Some(Utc::now()),
                ..JobStatus::default()
            };
            run_id
        };

        info!(%run_id, root = %root.display(), force, "indexing started");

        let shared = Arc::clone(&self.shared);
        runtime.spawn(async move {
            let worker = tokio::spawn(Arc::clone(&shared).run(root, force));
            if let Err(join_error) = worker.await {
                error!(%run_id, error = %join_error, "indexing worker aborted");
            }
            shared.finish();
        });

        Ok(run_id)
    }

    pub fn stop(&self) -> StopOutcome {
        let mut state = self.shared.state.lock();
        if state.phase != JobPhase::Running {
            return StopOutcome::NothingToStop;
        }

        state.cancel_requested = true;
        state.phase = JobPhase::Stopping;
        info!(current_file = %state.current_file, "indexing stop requested");
        StopOutcome::Requested
    }

    // Reprocesses one stored document from its recorded location. Runs
    // independently of any scan in progress. Changed content replaces the old key.
    pub async fn reindex(&self, content_hash: &str) -> Result<DocumentRecord, JobError> {
        let lookup = content_hash.to_string();
        let existing = self.shared.with_store(move |store| store.get(&lookup)).await?;

        let path = PathBuf::from(&existing.file_path);
        if !path.is_file() {
            return Err(JobError::FileMissing(existing.file_path));
        }

        let owned = path.clone();
        let current_hash = tokio::task::spawn_blocking(move || hash_file(&owned))
            .await
            .map_err(|join_error| StoreError::Task(join_error.to_string()))?
            .map_err(|_| JobError::FileMissing(existing.file_path.clone()))?;

        let record = self.shared.processor.process(&path, &current_hash).await;
        if let Some(error) = &record.processing_error {
            warn!(path = %path.display(), %error, "reindex finished with an enrichment error");
        }

        let stored = self.shared.with_store(move |store| store.upsert(record)).await?;
        if current_hash != content_hash {
            let stale = content_hash.to_string();
            self.shared.with_store(move |store| store.delete(&stale)).await?;
            info!(old = content_hash, new = %current_hash, "file content changed since it was indexed");
        }
        info!(content_hash = %current_hash, path = %path.display(), "document reindexed");
        Ok(stored)
    }

    pub fn status(&self) -> JobStatus {
        self.shared.state.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.status().is_running()
    }

    pub async fn wait_until_idle(&self, poll: Duration) -> JobStatus {
        loop {
            let status = self.status();
            if !status.is_running() {
                return status;
            }
            tokio::time::sleep(poll).await;
        }
    }
}

impl Shared {
    async fn run(self: Arc<Self>, root: PathBuf, force: bool) {
        let walk_root = root.clone();
        let files = match tokio::task::spawn_blocking(move || discover_pdf_files(&walk_root)).await
        {
            Ok(files) => files,
            Err(join_error) => {
                warn!(root = %root.display(), error = %join_error, "directory scan failed");
                Vec::new()
            }
        };

        info!(root = %root.display(), files = files.len(), "pdf files discovered");
        self.state.lock().total = files.len() as u64;

        for path in files {
            if self.cancel_requested() {
                info!("indexing stopped by request");
                break;
            }

            self.set_current_file(&path);
            let outcome = self.index_file(&path, force).await;
            self.record(outcome);
        }
    }

    fn cancel_requested(&self) -> bool {
        self.state.lock().cancel_requested
    }

    fn set_current_file(&self, path: &Path) {
        self.state.lock().current_file = path.to_string_lossy().to_string();
    }

    fn record(&self, outcome: FileOutcome) {
        let mut state = self.state.lock();
        match outcome {
            FileOutcome::Processed => state.processed += 1,
            FileOutcome::Skipped => state.skipped += 1,
            FileOutcome::Failed => state.errors += 1,
        }
    }

    async fn index_file(&self, path: &Path, force: bool) -> FileOutcome {
        let owned = path.to_path_buf();
        let hashed = tokio::task::spawn_blocking(move || hash_file(&owned)).await;
        let content_hash = match hashed {
            Ok(Ok(content_hash)) => content_hash,
            Ok(Err(error)) => {
                warn!(path = %path.display(), %error, "could not hash file");
                return FileOutcome::Failed;
            }
            Err(join_error) => {
                warn!(path = %path.display(), error = %join_error, "hashing task failed");
                return FileOutcome::Failed;
            }
        };

        if !force {
            let lookup = content_hash.clone();
            let location = path.to_string_lossy().to_string();
            match self
                .with_store(move |store| store.update_path(&lookup, &location))
                .await
            {
                Ok(moved) => {
                    if moved {
                        info!(path = %path.display(), %content_hash, "known content at a new location");
                    }
                    debug!(path = %path.display(), %content_hash, "already indexed, skipping");
                    return FileOutcome::Skipped;
                }
                Err(error) if error.is_not_found() => {}
                Err(error) => {
                    warn!(path = %path.display(), %error, "index lookup failed, processing anyway");
                }
            }
        }

        let record = self.processor.process(path, &content_hash).await;
        let failed = record.has_error();

        match self.with_store(move |store| store.upsert(record)).await {
            Ok(_) if failed => FileOutcome::Failed,
            Ok(_) => {
                debug!(path = %path.display(), %content_hash, "indexed");
                FileOutcome::Processed
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "could not store record");
                FileOutcome::Failed
            }
        }
    }

    async fn with_store<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: FnOnce(&DocumentStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || operation(&store))
            .await
            .map_err(|join_error| StoreError::Task(join_error.to_string()))?
    }

    fn finish(&self) {
        let mut state = self.state.lock();
        let cancelled = state.cancel_requested;
        state.phase = JobPhase::Idle;
        state.current_file.clear();
        state.cancel_requested = false;
        state.finished_at = Some(Utc::now());

        info!(
            total = state.total,
            processed = state.processed,
            skipped = state.skipped,
            errors = state.errors,
            cancelled,
            "indexing finished"
        );
    }
}
