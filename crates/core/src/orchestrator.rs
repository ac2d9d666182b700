use crate::config::Settings;
use crate::extract::ExtractionEngine;
use crate::models::{DocumentRecord, DocumentStatus};
use crate::ocr::OcrEngine;
use crate::traits::{DocumentStore, ObjectStore};
use crate::IntakeError;
use chrono::Utc;
use notify::{EventKind, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify, Semaphore};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];
const STABILITY_DELAY: Duration = Duration::from_millis(100);
const STABILITY_MAX_TRIES: u32 = 50;
const MAX_KEY_BASE_CHARS: usize = 100;
const MAX_KEY_EXT_CHARS: usize = 10;

/// Drives the intake pipeline: watches the inbox directory, claims documents
/// in the store, runs OCR and extraction through a bounded worker pool, and
/// pulls remotely uploaded documents into the same flow.
pub struct IntakeCoordinator<D, O>
where
    D: DocumentStore + 'static,
    O: ObjectStore + 'static,
{
    documents: Arc<D>,
    objects: Option<Arc<O>>,
    engine: Arc<ExtractionEngine>,
    ocr: Arc<OcrEngine>,
    settings: Settings,
    /// File names currently being handled by this process. Shared so that a
    /// caller can pre-seed or observe in-flight work.
    claims: Arc<Mutex<HashSet<String>>>,
    workers: Arc<Semaphore>,
    wakeup: Arc<Notify>,
}

impl<D, O> IntakeCoordinator<D, O>
where
    D: DocumentStore + 'static,
    O: ObjectStore + 'static,
{
    pub fn new(
        documents: Arc<D>,
        objects: Option<Arc<O>>,
        engine: ExtractionEngine,
        ocr: OcrEngine,
        settings: Settings,
        claims: Arc<Mutex<HashSet<String>>>,
    ) -> Self {
        let workers = Arc::new(Semaphore::new(settings.worker_concurrency));
        Self {
            documents,
            objects,
            engine: Arc::new(engine),
            ocr: Arc::new(ocr),
            settings,
            claims,
            workers,
            wakeup: Arc::new(Notify::new()),
        }
    }

    /// Runs until `shutdown` flips to true. The filesystem watcher only
    /// shortens the wait between scans; a scan tick always happens at the
    /// poll interval, so missed events cannot strand a file.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<(), IntakeError> {
        tokio::fs::create_dir_all(&self.settings.watch_dir).await?;
        tokio::fs::create_dir_all(&self.settings.archive_dir).await?;

        let wakeup = Arc::clone(&self.wakeup);
        let mut watcher =
            notify::recommended_watcher(move |event: Result<notify::Event, notify::Error>| {
                if let Ok(event) = event {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        wakeup.notify_one();
                    }
                }
            })
            .map_err(|error| IntakeError::Watch(error.to_string()))?;
        watcher
            .watch(&self.settings.watch_dir, RecursiveMode::NonRecursive)
            .map_err(|error| IntakeError::Watch(error.to_string()))?;

        let puller = Arc::clone(&self);
        let pull_shutdown = shutdown.clone();
        let pull_handle = tokio::spawn(async move { puller.run_pull_loop(pull_shutdown).await });

        info!(dir = %self.settings.watch_dir.display(), "intake watcher running");
        loop {
            Arc::clone(&self).scan_and_dispatch().await;

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = self.wakeup.notified() => {}
                _ = sleep(self.settings.poll_interval) => {}
            }
        }

        pull_handle.abort();
        info!("intake watcher stopped");
        Ok(())
    }

    async fn scan_and_dispatch(self: Arc<Self>) {
        let mut entries = match tokio::fs::read_dir(&self.settings.watch_dir).await {
            Ok(entries) => entries,
            Err(error) => {
                warn!(%error, "inbox scan failed");
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !is_intake_candidate(&path) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let file_name = file_name.to_string();

            if !self.acquire_claim(&file_name).await {
                continue;
            }

            let permit = match Arc::clone(&self.workers).acquire_owned().await {
                Ok(permit) => permit,
                Err(_closed) => {
                    self.release_claim(&file_name).await;
                    return;
                }
            };
            let coordinator = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(error) = coordinator.process_document(&path, &file_name).await {
                    warn!(file_name, %error, "document handling failed");
                }
                coordinator.release_claim(&file_name).await;
                drop(permit);
            });
        }
    }

    async fn acquire_claim(&self, file_name: &str) -> bool {
        self.claims.lock().await.insert(file_name.to_string())
    }

    async fn release_claim(&self, file_name: &str) {
        self.claims.lock().await.remove(file_name);
    }

    async fn process_document(&self, path: &Path, file_name: &str) -> Result<(), IntakeError> {
        let record = match self.documents.find_by_file_name(file_name).await? {
            Some(record) => record,
            None => {
                self.documents
                    .create_document(file_name, DocumentStatus::Pending)
                    .await?
            }
        };

        match record.status {
            DocumentStatus::Processed => {
                debug!(file_name, "already processed, archiving only");
                self.archive_file(path, file_name, record.id).await;
                return Ok(());
            }
            DocumentStatus::Processing | DocumentStatus::Pulling => {
                debug!(file_name, "handled elsewhere, skipping");
                return Ok(());
            }
            DocumentStatus::Pending | DocumentStatus::Failed => {}
        }

        let claimed = self
            .documents
            .claim_status(record.id, record.status, DocumentStatus::Processing)
            .await?;
        if !claimed {
            debug!(file_name, "lost the status race, skipping");
            return Ok(());
        }

        match self.extract_and_persist(path, file_name, &record).await {
            Ok(()) => {
                self.documents
                    .update_status(record.id, DocumentStatus::Processed)
                    .await?;
                self.archive_file(path, file_name, record.id).await;
                info!(file_name, document_id = record.id, "document processed");
                Ok(())
            }
            Err(error) => {
                if let Err(status_error) = self
                    .documents
                    .update_status(record.id, DocumentStatus::Failed)
                    .await
                {
                    warn!(file_name, %status_error, "failed-status update did not stick");
                }
                Err(error)
            }
        }
    }

    async fn extract_and_persist(
        &self,
        path: &Path,
        file_name: &str,
        record: &DocumentRecord,
    ) -> Result<(), IntakeError> {
        wait_for_stable_size(path).await?;

        let extension = extension_of(path);
        let text = if extension == "pdf" {
            let extracted = self.ocr.extract_text(path).await;
            self.ocr.cleanup(path).await;
            extracted?
        } else {
            tokio::fs::read_to_string(path).await?
        };

        let mut resume = self.engine.parse_resume(&text, file_name).await?;
        resume.document_id = Some(record.id);

        // Original bytes go to object storage before the row is written, so
        // a persisted resume always has its source retrievable.
        if let Some(objects) = &self.objects {
            let bytes = tokio::fs::read(path).await?;
            let key = object_key_for(file_name);
            let content_type = if extension == "pdf" {
                "application/pdf"
            } else {
                "text/plain"
            };
            let url = objects.put_object(&key, bytes, content_type).await?;
            debug!(file_name, %url, "original uploaded");
        }

        if self.documents.resume_exists(record.id).await? {
            info!(file_name, document_id = record.id, "resume already persisted");
        } else {
            self.documents.insert_resume(&resume.to_row()).await?;
        }
        Ok(())
    }

    async fn archive_file(&self, path: &Path, file_name: &str, document_id: i64) {
        if let Err(error) = tokio::fs::create_dir_all(&self.settings.archive_dir).await {
            warn!(%error, "archive dir unavailable");
            return;
        }
        let destination = archive_destination(&self.settings.archive_dir, file_name);
        if let Err(error) = tokio::fs::rename(path, &destination).await {
            warn!(file_name, %error, "archive move failed");
            return;
        }

        let archived_name = destination
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(file_name);
        if archived_name != file_name {
            if let Err(error) = self
                .documents
                .update_file_name(document_id, archived_name)
                .await
            {
                warn!(file_name, archived_name, %error, "archived-name update failed");
            }
        }
    }

    /// Periodically claims remotely uploaded documents and downloads them
    /// into the watch directory, where the normal flow picks them up.
    async fn run_pull_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if let Err(error) = self.pull_pending_documents().await {
                warn!(%error, "remote pull pass failed");
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
                _ = sleep(self.settings.pull_interval) => {}
            }
        }
    }

    async fn pull_pending_documents(&self) -> Result<(), IntakeError> {
        let Some(objects) = &self.objects else {
            return Ok(());
        };

        for record in self.documents.list_awaiting_pull().await? {
            let Some(location) = record.source_location.clone() else {
                continue;
            };
            let claimed = self
                .documents
                .claim_status(record.id, DocumentStatus::Pending, DocumentStatus::Pulling)
                .await?;
            if !claimed {
                continue;
            }

            if let Err(error) = self.pull_claimed(objects, &record, &location).await {
                warn!(file_name = %record.file_name, %error, "remote pull failed");
                // Surrender the claim so the next pass retries instead of
                // leaving the record stranded in pulling.
                if let Err(revert) = self
                    .documents
                    .claim_status(record.id, DocumentStatus::Pulling, DocumentStatus::Pending)
                    .await
                {
                    warn!(file_name = %record.file_name, %revert, "claim revert failed");
                }
            }
        }
        Ok(())
    }

    async fn pull_claimed(
        &self,
        objects: &Arc<O>,
        record: &DocumentRecord,
        location: &str,
    ) -> Result<(), IntakeError> {
        let bytes = self.download_with_retries(objects, location).await?;
        let target = self.settings.watch_dir.join(&record.file_name);
        tokio::fs::write(&target, bytes).await?;
        // Back to pending so the local flow claims it cleanly.
        self.documents
            .update_status(record.id, DocumentStatus::Pending)
            .await?;
        info!(file_name = %record.file_name, "remote document pulled");
        self.wakeup.notify_one();
        Ok(())
    }

    async fn download_with_retries(
        &self,
        objects: &Arc<O>,
        location: &str,
    ) -> Result<Vec<u8>, IntakeError> {
        let mut last_details = String::new();
        for attempt in 0..self.settings.pull_max_retries {
            match objects.get_object(location).await {
                Ok(bytes) => return Ok(bytes),
                Err(error) => {
                    last_details = error.to_string();
                    debug!(attempt, %error, "download attempt failed");
                    let backoff = Duration::from_secs(1u64 << attempt.min(5));
                    sleep(backoff).await;
                }
            }
        }
        Err(IntakeError::DownloadExhausted {
            attempts: self.settings.pull_max_retries,
            details: last_details,
        })
    }
}

fn is_intake_candidate(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .map_or(true, |name| name.starts_with('.'));
    if hidden {
        return false;
    }
    SUPPORTED_EXTENSIONS.contains(&extension_of(path).as_str())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Two consecutive equal size samples mean the upload has settled.
async fn wait_for_stable_size(path: &Path) -> Result<(), IntakeError> {
    let mut previous = tokio::fs::metadata(path).await?.len();
    for _ in 0..STABILITY_MAX_TRIES {
        sleep(STABILITY_DELAY).await;
        let current = tokio::fs::metadata(path).await?.len();
        if current == previous && current > 0 {
            return Ok(());
        }
        previous = current;
    }
    Err(IntakeError::OcrFailed(format!(
        "file size never settled: {}",
        path.display()
    )))
}

/// First free destination under the archive directory; collisions get a
/// numeric suffix before the extension.
pub fn archive_destination(archive_dir: &Path, file_name: &str) -> PathBuf {
    let initial = archive_dir.join(file_name);
    if !initial.exists() {
        return initial;
    }

    let (base, extension) = match file_name.rfind('.') {
        Some(position) if position > 0 => (&file_name[..position], &file_name[position..]),
        _ => (file_name, ""),
    };
    let mut counter = 1u32;
    loop {
        let candidate = archive_dir.join(format!("{base}_{counter}{extension}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// ASCII-safe object key: `original/<unix-ts>_<uuid8>_<base>.<ext>`.
/// Non-ASCII and unsafe characters in the original name are replaced, runs
/// of replacements collapse to one underscore, and both parts are
/// length-capped.
pub fn object_key_for(file_name: &str) -> String {
    let (raw_base, raw_extension) = match file_name.rfind('.') {
        Some(position) if position > 0 => (&file_name[..position], &file_name[position + 1..]),
        _ => (file_name, ""),
    };

    let sanitize = |part: &str, max_chars: usize| -> String {
        let mut cleaned = String::new();
        for ch in part.chars() {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '.' {
                cleaned.push(ch);
            } else if !cleaned.ends_with('_') {
                cleaned.push('_');
            }
        }
        cleaned
            .chars()
            .take(max_chars)
            .collect::<String>()
            .trim_matches('_')
            .to_string()
    };

    let mut base = sanitize(raw_base, MAX_KEY_BASE_CHARS);
    if base.is_empty() {
        base = "file".to_string();
    }
    let mut extension = sanitize(raw_extension, MAX_KEY_EXT_CHARS).to_lowercase();
    if extension.is_empty() {
        extension = "pdf".to_string();
    }

    let timestamp = Utc::now().timestamp();
    let unique = &Uuid::new_v4().simple().to_string()[..8];
    format!("original/{timestamp}_{unique}_{base}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::education::UniversityClassifier;
    use crate::models::{TagCatalog, UniversityCatalog};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeDocumentStore {
        records: StdMutex<Vec<DocumentRecord>>,
        resumes: StdMutex<Vec<Value>>,
        next_id: StdMutex<i64>,
    }

    #[async_trait]
    impl DocumentStore for FakeDocumentStore {
        async fn find_by_file_name(
            &self,
            file_name: &str,
        ) -> Result<Option<DocumentRecord>, IntakeError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|record| record.file_name == file_name)
                .cloned())
        }

        async fn create_document(
            &self,
            file_name: &str,
            status: DocumentStatus,
        ) -> Result<DocumentRecord, IntakeError> {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            let record = DocumentRecord {
                id: *next_id,
                file_name: file_name.to_string(),
                source_location: None,
                status,
                uploaded_by: None,
            };
            self.records.lock().unwrap().push(record.clone());
            Ok(record)
        }

        async fn update_status(
            &self,
            document_id: i64,
            status: DocumentStatus,
        ) -> Result<(), IntakeError> {
            for record in self.records.lock().unwrap().iter_mut() {
                if record.id == document_id {
                    record.status = status;
                }
            }
            Ok(())
        }

        async fn update_file_name(
            &self,
            document_id: i64,
            file_name: &str,
        ) -> Result<(), IntakeError> {
            for record in self.records.lock().unwrap().iter_mut() {
                if record.id == document_id {
                    record.file_name = file_name.to_string();
                }
            }
            Ok(())
        }

        async fn claim_status(
            &self,
            document_id: i64,
            expected: DocumentStatus,
            next: DocumentStatus,
        ) -> Result<bool, IntakeError> {
            for record in self.records.lock().unwrap().iter_mut() {
                if record.id == document_id && record.status == expected {
                    record.status = next;
                    return Ok(true);
                }
            }
            Ok(false)
        }

        async fn list_awaiting_pull(&self) -> Result<Vec<DocumentRecord>, IntakeError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|record| {
                    record.status == DocumentStatus::Pending && record.source_location.is_some()
                })
                .cloned()
                .collect())
        }

        async fn resume_exists(&self, document_id: i64) -> Result<bool, IntakeError> {
            Ok(self
                .resumes
                .lock()
                .unwrap()
                .iter()
                .any(|row| row.get("resume_file_id").and_then(Value::as_i64) == Some(document_id)))
        }

        async fn insert_resume(&self, row: &Value) -> Result<(), IntakeError> {
            self.resumes.lock().unwrap().push(row.clone());
            Ok(())
        }
    }

    struct NullObjectStore;

    #[async_trait]
    impl ObjectStore for NullObjectStore {
        async fn put_object(
            &self,
            object_key: &str,
            _bytes: Vec<u8>,
            _content_type: &str,
        ) -> Result<String, IntakeError> {
            Ok(format!("https://example.invalid/{object_key}"))
        }

        async fn get_object(&self, _location: &str) -> Result<Vec<u8>, IntakeError> {
            Ok(b"remote bytes".to_vec())
        }
    }

    fn settings(watch_dir: &Path, archive_dir: &Path) -> Settings {
        Settings {
            store_url: "https://example.invalid".to_string(),
            store_key: "test".to_string(),
            storage_bucket: None,
            watch_dir: watch_dir.to_path_buf(),
            archive_dir: archive_dir.to_path_buf(),
            worker_concurrency: 2,
            poll_interval: Duration::from_millis(50),
            pull_interval: Duration::from_millis(50),
            pull_max_retries: 2,
            ocr_command: "no-such-ocr-binary".to_string(),
            ocr_timeout_secs: 5,
            strict_extraction: false,
        }
    }

    fn coordinator(
        documents: Arc<FakeDocumentStore>,
        watch_dir: &Path,
        archive_dir: &Path,
        claims: Arc<Mutex<HashSet<String>>>,
    ) -> Arc<IntakeCoordinator<FakeDocumentStore, NullObjectStore>> {
        let engine = ExtractionEngine::new(
            None,
            UniversityClassifier::new(UniversityCatalog::default(), None),
            TagCatalog::default(),
            false,
        );
        let ocr = OcrEngine::new("no-such-ocr-binary", watch_dir.join("ocr"), 5);
        Arc::new(IntakeCoordinator::new(
            documents,
            None,
            engine,
            ocr,
            settings(watch_dir, archive_dir),
            claims,
        ))
    }

    #[tokio::test]
    async fn claim_set_admits_each_file_once() {
        let dir = tempdir().unwrap();
        let claims = Arc::new(Mutex::new(HashSet::new()));
        let coordinator = coordinator(
            Arc::new(FakeDocumentStore::default()),
            dir.path(),
            dir.path(),
            Arc::clone(&claims),
        );

        assert!(coordinator.acquire_claim("a.pdf").await);
        assert!(!coordinator.acquire_claim("a.pdf").await);
        coordinator.release_claim("a.pdf").await;
        assert!(coordinator.acquire_claim("a.pdf").await);
    }

    #[tokio::test]
    async fn text_file_is_parsed_persisted_and_archived() {
        let inbox = tempdir().unwrap();
        let archive = tempdir().unwrap();
        let documents = Arc::new(FakeDocumentStore::default());
        let coordinator = coordinator(
            Arc::clone(&documents),
            inbox.path(),
            archive.path(),
            Arc::new(Mutex::new(HashSet::new())),
        );

        let path = inbox.path().join("张伟.txt");
        std::fs::write(&path, "张伟\n邮箱：zw@example.com\n电话：13812345678\n").unwrap();

        coordinator.process_document(&path, "张伟.txt").await.unwrap();

        let records = documents.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, DocumentStatus::Processed);
        let resumes = documents.resumes.lock().unwrap();
        assert_eq!(resumes.len(), 1);
        assert_eq!(resumes[0]["name"], serde_json::json!("张伟"));
        assert!(!path.exists());
        assert!(archive.path().join("张伟.txt").exists());
    }

    #[tokio::test]
    async fn second_pass_does_not_duplicate_the_resume() {
        let inbox = tempdir().unwrap();
        let archive = tempdir().unwrap();
        let documents = Arc::new(FakeDocumentStore::default());
        let coordinator = coordinator(
            Arc::clone(&documents),
            inbox.path(),
            archive.path(),
            Arc::new(Mutex::new(HashSet::new())),
        );

        let path = inbox.path().join("dup.txt");
        std::fs::write(&path, "李雷\n电话：13912345678\n").unwrap();
        coordinator.process_document(&path, "dup.txt").await.unwrap();

        // Same file shows up again after the record is already processed.
        std::fs::write(&path, "李雷\n电话：13912345678\n").unwrap();
        documents
            .update_status(1, DocumentStatus::Pending)
            .await
            .unwrap();
        coordinator.process_document(&path, "dup.txt").await.unwrap();

        assert_eq!(documents.resumes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn conditional_claim_rejects_stale_status() {
        let documents = FakeDocumentStore::default();
        let record = documents
            .create_document("race.pdf", DocumentStatus::Pending)
            .await
            .unwrap();

        let first = documents
            .claim_status(record.id, DocumentStatus::Pending, DocumentStatus::Processing)
            .await
            .unwrap();
        let second = documents
            .claim_status(record.id, DocumentStatus::Pending, DocumentStatus::Processing)
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn failed_pull_reverts_the_claim_to_pending() {
        let dir = tempdir().unwrap();
        // A plain file where the watch directory should be makes the
        // downloaded bytes unwritable.
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, b"occupied").unwrap();

        let documents = Arc::new(FakeDocumentStore::default());
        documents.records.lock().unwrap().push(DocumentRecord {
            id: 1,
            file_name: "remote.pdf".to_string(),
            source_location: Some("original/remote.pdf".to_string()),
            status: DocumentStatus::Pending,
            uploaded_by: None,
        });

        let engine = ExtractionEngine::new(
            None,
            UniversityClassifier::new(UniversityCatalog::default(), None),
            TagCatalog::default(),
            false,
        );
        let ocr = OcrEngine::new("no-such-ocr-binary", dir.path().join("ocr"), 5);
        let coordinator: IntakeCoordinator<FakeDocumentStore, NullObjectStore> =
            IntakeCoordinator::new(
                Arc::clone(&documents),
                Some(Arc::new(NullObjectStore)),
                engine,
                ocr,
                settings(&blocker.join("inbox"), dir.path()),
                Arc::new(Mutex::new(HashSet::new())),
            );

        coordinator.pull_pending_documents().await.unwrap();

        let records = documents.records.lock().unwrap();
        assert_eq!(records[0].status, DocumentStatus::Pending);
    }

    #[test]
    fn archive_destination_suffixes_on_collision() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("cv.pdf"), b"one").unwrap();
        std::fs::write(dir.path().join("cv_1.pdf"), b"two").unwrap();

        let destination = archive_destination(dir.path(), "cv.pdf");
        assert_eq!(destination, dir.path().join("cv_2.pdf"));

        let fresh = archive_destination(dir.path(), "new.pdf");
        assert_eq!(fresh, dir.path().join("new.pdf"));
    }

    #[test]
    fn object_keys_are_ascii_safe_and_capped() {
        let key = object_key_for("张伟的简历 (final).pdf");
        let rest = key.strip_prefix("original/").unwrap();
        assert!(rest.ends_with(".pdf"));
        assert!(rest.is_ascii());

        let long_name = format!("{}.markdown-extension", "x".repeat(300));
        let capped = object_key_for(&long_name);
        let rest = capped.strip_prefix("original/").unwrap();
        let (base, extension) = rest.rsplit_once('.').unwrap();
        // timestamp + uuid prefix add a bounded amount on top of the cap.
        assert!(base.len() <= MAX_KEY_BASE_CHARS + 24);
        assert!(extension.len() <= MAX_KEY_EXT_CHARS);

        let degenerate = object_key_for("（）.");
        assert!(degenerate.strip_prefix("original/").unwrap().contains("_file.pdf"));
    }
}
