//! Analysis pipeline: drives one resume submission to a stored `Feedback`.
//!
//! Flow: upload PDF → render page one → upload image → save draft record →
//!       inference → sanitize → validate → save final record.
//!
//! Each orchestrator handles exactly one submission (`submit` consumes it)
//! and publishes every transition on a `watch` channel. States only move
//! forward; `Failed` is terminal and nothing is retried here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::error::{AnalysisError, FailureKind};
use crate::analysis::models::{JobContext, ResumeRecord};
use crate::analysis::prompts::review_instructions;
use crate::analysis::repository::ResumeRepository;
use crate::analysis::sanitize::sanitize;
use crate::analysis::validate::parse_and_validate;
use crate::convert::{ConversionError, PdfRasterizer};
use crate::llm_client::InferenceService;
use crate::storage::{FilePayload, ObjectStore};

const PDF_MAGIC: &[u8] = b"%PDF-";
/// Readers accept junk (a BOM, a mail header) before the header within this window.
const PDF_MAGIC_WINDOW: usize = 1024;

// ────────────────────────────────────────────────────────────────────────────
// States
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnalysisState {
    Idle,
    UploadingDocument,
    ConvertingToImage,
    UploadingImage,
    PersistingDraft,
    AwaitingInference,
    ParsingResponse,
    PersistingFinal,
    Complete,
    Failed { kind: FailureKind, reason: String },
}

impl AnalysisState {
    fn step(&self) -> u8 {
        match self {
            AnalysisState::Idle => 0,
            AnalysisState::UploadingDocument => 1,
            AnalysisState::ConvertingToImage => 2,
            AnalysisState::UploadingImage => 3,
            AnalysisState::PersistingDraft => 4,
            AnalysisState::AwaitingInference => 5,
            AnalysisState::ParsingResponse => 6,
            AnalysisState::PersistingFinal => 7,
            AnalysisState::Complete | AnalysisState::Failed { .. } => 8,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisState::Complete | AnalysisState::Failed { .. })
    }

    /// Status line for progress display.
    pub fn message(&self) -> String {
        match self {
            AnalysisState::Idle => "Waiting for a resume".to_string(),
            AnalysisState::UploadingDocument => "Uploading the file...".to_string(),
            AnalysisState::ConvertingToImage => "Converting to image...".to_string(),
            AnalysisState::UploadingImage => "Uploading the image...".to_string(),
            AnalysisState::PersistingDraft => "Preparing data...".to_string(),
            AnalysisState::AwaitingInference => "Analyzing...".to_string(),
            AnalysisState::ParsingResponse => "Reading the feedback...".to_string(),
            AnalysisState::PersistingFinal => "Saving the feedback...".to_string(),
            AnalysisState::Complete => "Analysis complete".to_string(),
            AnalysisState::Failed { reason, .. } => format!("Error: {reason}"),
        }
    }
}

/// Snapshot published on every transition.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisStatus {
    pub id: Uuid,
    #[serde(flatten)]
    pub state: AnalysisState,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisStatus {
    fn new(id: Uuid, state: AnalysisState) -> Self {
        Self {
            id,
            message: state.message(),
            state,
            updated_at: Utc::now(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

/// External collaborators, wired at startup and shared by every submission.
#[derive(Clone)]
pub struct AnalysisDeps {
    pub store: Arc<dyn ObjectStore>,
    pub rasterizer: Arc<dyn PdfRasterizer>,
    pub inference: Arc<dyn InferenceService>,
    pub repository: ResumeRepository,
}

pub struct AnalysisOrchestrator {
    id: Uuid,
    deps: AnalysisDeps,
    status: watch::Sender<AnalysisStatus>,
}

impl AnalysisOrchestrator {
    /// Every orchestrator gets a fresh submission id; ids are never reused.
    pub fn new(deps: AnalysisDeps) -> Self {
        let id = Uuid::new_v4();
        let (status, _) = watch::channel(AnalysisStatus::new(id, AnalysisState::Idle));
        Self { id, deps, status }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscribe(&self) -> watch::Receiver<AnalysisStatus> {
        self.status.subscribe()
    }

    /// Runs the submission to a terminal state. On failure the reason is
    /// published as `Failed` and returned.
    pub async fn submit(
        self,
        document: Option<FilePayload>,
        context: JobContext,
    ) -> Result<ResumeRecord, AnalysisError> {
        match self.run(document, context).await {
            Ok(record) => {
                self.advance(AnalysisState::Complete);
                Ok(record)
            }
            Err(err) => {
                error!("Analysis {} failed ({:?}): {}", self.id, err.kind(), err);
                self.advance(AnalysisState::Failed {
                    kind: err.kind(),
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        document: Option<FilePayload>,
        context: JobContext,
    ) -> Result<ResumeRecord, AnalysisError> {
        let document = check_document(document)?;
        let deps = &self.deps;

        self.advance(AnalysisState::UploadingDocument);
        let resume = deps
            .store
            .upload(&document)
            .await
            .map_err(|e| AnalysisError::UploadFailed(format!("Failed to upload file: {e}")))?;

        self.advance(AnalysisState::ConvertingToImage);
        let image = deps
            .rasterizer
            .convert(&document)
            .await
            .map_err(|e| match e {
                ConversionError::Failed(message) => AnalysisError::ConversionFailed(message),
                other => AnalysisError::ConversionFailed(format!(
                    "Failed to convert PDF to image: {other}"
                )),
            })?;
        if image.is_empty() {
            return Err(AnalysisError::ConversionFailed(
                "Failed to convert PDF to image".to_string(),
            ));
        }

        self.advance(AnalysisState::UploadingImage);
        let uploaded_image = deps
            .store
            .upload(&image)
            .await
            .map_err(|e| AnalysisError::UploadFailed(format!("Failed to upload image: {e}")))?;

        self.advance(AnalysisState::PersistingDraft);
        let instructions = review_instructions(&context);
        let mut record = ResumeRecord::draft(self.id, resume.path, uploaded_image.path, context);
        deps.repository.save(&record).await.map_err(|e| {
            AnalysisError::PersistenceFailed(format!("Failed to save resume record: {e}"))
        })?;

        self.advance(AnalysisState::AwaitingInference);
        let reply = deps
            .inference
            .infer(&record.image_path, &instructions)
            .await
            .map_err(|e| {
                AnalysisError::InferenceFailed(format!("Failed to receive feedback from AI: {e}"))
            })?;
        let text = reply.normalize().ok_or_else(|| {
            AnalysisError::InferenceFailed("AI returned an empty response".to_string())
        })?;

        self.advance(AnalysisState::ParsingResponse);
        let feedback = parse_and_validate(&sanitize(&text))?;
        info!(
            "Analysis {}: feedback parsed, overall score {}",
            self.id, feedback.overall_score
        );

        self.advance(AnalysisState::PersistingFinal);
        record.feedback = Some(feedback);
        deps.repository.save(&record).await.map_err(|e| {
            AnalysisError::PersistenceFailed(format!("Failed to save feedback: {e}"))
        })?;

        Ok(record)
    }

    /// Publishes `next` if it moves the submission forward. Backward moves and
    /// moves out of a terminal state are ignored.
    fn advance(&self, next: AnalysisState) {
        let id = self.id;
        let applied = self.status.send_if_modified(|status| {
            if status.state.is_terminal() || next.step() <= status.state.step() {
                return false;
            }
            *status = AnalysisStatus::new(id, next.clone());
            true
        });

        if applied {
            info!("Analysis {}: {}", id, next.message());
        } else {
            warn!("Analysis {}: ignored transition to {:?}", id, next);
        }
    }
}

pub(crate) fn check_document(document: Option<FilePayload>) -> Result<FilePayload, AnalysisError> {
    let document =
        document.ok_or_else(|| AnalysisError::InvalidInput("No file provided".to_string()))?;
    if document.is_empty() {
        return Err(AnalysisError::InvalidInput(
            "The uploaded file is empty".to_string(),
        ));
    }
    let head = &document.bytes[..document.bytes.len().min(PDF_MAGIC_WINDOW)];
    if !head.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
        return Err(AnalysisError::InvalidInput(
            "Only PDF resumes are supported".to_string(),
        ));
    }
    Ok(document)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::Notify;

    use super::testing::*;
    use super::*;
    use crate::analysis::models::fixtures::{sample_feedback, sample_feedback_json};
    use crate::kv::memory::MemoryKvStore;
    use crate::kv::{KvEntry, KvError, KvStore};
    use crate::storage::memory::MemoryObjectStore;

    fn failure_kind(status: &AnalysisStatus) -> Option<FailureKind> {
        match &status.state {
            AnalysisState::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_happy_path_reaches_complete() {
        let h = harness(FakeInference::valid());
        let orchestrator = AnalysisOrchestrator::new(h.deps.clone());
        let id = orchestrator.id();
        let status = orchestrator.subscribe();

        let context = JobContext::new(Some("Acme".to_string()), Some("SRE".to_string()), None);
        let record = orchestrator.submit(Some(pdf()), context).await.unwrap();

        assert_eq!(record.id, id);
        assert_eq!(record.feedback, Some(sample_feedback()));
        assert_eq!(record.company_name.as_deref(), Some("Acme"));
        assert!(record.resume_path.ends_with("/resume.pdf"));
        assert!(record.image_path.ends_with("/resume.png"));
        assert_eq!(h.store.len(), 2);

        assert_eq!(status.borrow().state, AnalysisState::Complete);
        assert_eq!(status.borrow().message, "Analysis complete");
        let stored = h.deps.repository.get(id).await.unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_fenced_reply_with_commentary_completes() {
        let reply = format!(
            "Here you go:\n```json\n{}\n```\nHope that helps!",
            sample_feedback_json()
        );
        let h = harness(FakeInference::text(reply));
        let record = AnalysisOrchestrator::new(h.deps.clone())
            .submit(Some(pdf()), JobContext::default())
            .await
            .unwrap();
        assert_eq!(record.feedback, Some(sample_feedback()));
    }

    #[tokio::test]
    async fn test_multi_part_reply_is_normalized() {
        let json = sample_feedback_json();
        // split between two members so each part is plain JSON text
        let cut = json[..json.len() / 2].rfind(',').unwrap() + 1;
        let h = harness(FakeInference::parts(&[&json[..cut], &json[cut..]]));
        let record = AnalysisOrchestrator::new(h.deps.clone())
            .submit(Some(pdf()), JobContext::default())
            .await
            .unwrap();
        assert_eq!(record.feedback, Some(sample_feedback()));
    }

    #[tokio::test]
    async fn test_missing_file_is_invalid_input() {
        let h = harness(FakeInference::valid());
        let orchestrator = AnalysisOrchestrator::new(h.deps.clone());
        let status = orchestrator.subscribe();

        let err = orchestrator
            .submit(None, JobContext::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::InvalidInput);
        assert_eq!(failure_kind(&status.borrow()), Some(FailureKind::InvalidInput));
        assert_eq!(h.store.len(), 0);
        assert!(h.deps.repository.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_non_pdf_files_are_rejected() {
        let h = harness(FakeInference::valid());
        let empty = FilePayload::new("resume.pdf", "application/pdf", Bytes::new());
        let err = AnalysisOrchestrator::new(h.deps.clone())
            .submit(Some(empty), JobContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidInput);

        let docx = FilePayload::new("resume.docx", "application/msword", Bytes::from_static(b"PK\x03\x04"));
        let err = AnalysisOrchestrator::new(h.deps.clone())
            .submit(Some(docx), JobContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidInput);
        assert_eq!(h.store.len(), 0);
    }

    #[test]
    fn test_pdf_header_may_follow_leading_bytes() {
        let with_bom = FilePayload::new(
            "resume.pdf",
            "application/pdf",
            Bytes::from_static(b"\xEF\xBB\xBF%PDF-1.4\n"),
        );
        assert!(check_document(Some(with_bom)).is_ok());

        let mut late = vec![b' '; PDF_MAGIC_WINDOW];
        late.extend_from_slice(b"%PDF-1.4\n");
        let late = FilePayload::new("resume.pdf", "application/pdf", Bytes::from(late));
        let err = check_document(Some(late)).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_document_upload_failure() {
        let h = harness_with(
            MemoryObjectStore::failing_uploads_named("resume.pdf"),
            Arc::new(MemoryKvStore::default()),
            Render::Image,
            FakeInference::valid(),
        );
        let err = AnalysisOrchestrator::new(h.deps.clone())
            .submit(Some(pdf()), JobContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::UploadFailed);
        assert!(err.to_string().starts_with("Failed to upload file"));
        assert!(h.deps.repository.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conversion_failure_keeps_converter_message() {
        let h = harness_with(
            MemoryObjectStore::default(),
            Arc::new(MemoryKvStore::default()),
            Render::Fail("Syntax Error: Couldn't find trailer dictionary"),
            FakeInference::valid(),
        );
        let orchestrator = AnalysisOrchestrator::new(h.deps.clone());
        let status = orchestrator.subscribe();
        let err = orchestrator
            .submit(Some(pdf()), JobContext::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::ConversionFailed);
        assert_eq!(err.to_string(), "Syntax Error: Couldn't find trailer dictionary");
        assert_eq!(
            status.borrow().message,
            "Error: Syntax Error: Couldn't find trailer dictionary"
        );
    }

    #[tokio::test]
    async fn test_empty_image_is_conversion_failure() {
        let h = harness_with(
            MemoryObjectStore::default(),
            Arc::new(MemoryKvStore::default()),
            Render::Empty,
            FakeInference::valid(),
        );
        let err = AnalysisOrchestrator::new(h.deps.clone())
            .submit(Some(pdf()), JobContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::ConversionFailed);
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn test_image_upload_failure() {
        let h = harness_with(
            MemoryObjectStore::failing_uploads_named("resume.png"),
            Arc::new(MemoryKvStore::default()),
            Render::Image,
            FakeInference::valid(),
        );
        let err = AnalysisOrchestrator::new(h.deps.clone())
            .submit(Some(pdf()), JobContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::UploadFailed);
        assert!(err.to_string().starts_with("Failed to upload image"));
        assert!(h.deps.repository.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_draft_persistence_failure() {
        let h = harness_with(
            MemoryObjectStore::default(),
            Arc::new(MemoryKvStore::failing_writes()),
            Render::Image,
            FakeInference::valid(),
        );
        let err = AnalysisOrchestrator::new(h.deps.clone())
            .submit(Some(pdf()), JobContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::PersistenceFailed);
    }

    #[tokio::test]
    async fn test_empty_inference_fails_and_draft_survives() {
        let h = harness(FakeInference::text(""));
        let orchestrator = AnalysisOrchestrator::new(h.deps.clone());
        let id = orchestrator.id();
        let status = orchestrator.subscribe();

        let err = orchestrator
            .submit(Some(pdf()), JobContext::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::InferenceFailed);
        assert_eq!(failure_kind(&status.borrow()), Some(FailureKind::InferenceFailed));
        let draft = h.deps.repository.get(id).await.unwrap().unwrap();
        assert!(draft.is_draft());
        assert!(draft.image_path.ends_with("/resume.png"));
    }

    #[tokio::test]
    async fn test_inference_error_is_inference_failed() {
        let h = harness(FakeInference {
            reply: Reply::Error(529),
            gate: None,
        });
        let err = AnalysisOrchestrator::new(h.deps.clone())
            .submit(Some(pdf()), JobContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InferenceFailed);
        assert!(err.to_string().contains("529"));
    }

    #[tokio::test]
    async fn test_reply_missing_skills_is_malformed_and_not_defaulted() {
        let mut value: serde_json::Value = serde_json::from_str(&sample_feedback_json()).unwrap();
        value.as_object_mut().unwrap().remove("skills");
        let h = harness(FakeInference::text(value.to_string()));
        let orchestrator = AnalysisOrchestrator::new(h.deps.clone());
        let id = orchestrator.id();

        let err = orchestrator
            .submit(Some(pdf()), JobContext::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::MalformedFeedback);
        let stored = h.deps.repository.get(id).await.unwrap().unwrap();
        assert!(stored.is_draft(), "draft must not receive substitute feedback");
    }

    #[tokio::test]
    async fn test_draft_is_written_before_inference_answers() {
        let gate = Arc::new(Notify::new());
        let h = harness(FakeInference {
            reply: Reply::Content(crate::llm_client::InferenceContent::Text(
                sample_feedback_json(),
            )),
            gate: Some(gate.clone()),
        });
        let orchestrator = AnalysisOrchestrator::new(h.deps.clone());
        let id = orchestrator.id();
        let mut status = orchestrator.subscribe();
        let repository = h.deps.repository.clone();

        let task = tokio::spawn(orchestrator.submit(Some(pdf()), JobContext::default()));

        status
            .wait_for(|s| s.state == AnalysisState::AwaitingInference)
            .await
            .unwrap();
        let draft = repository.get(id).await.unwrap().unwrap();
        assert!(draft.is_draft());

        gate.notify_one();
        let record = task.await.unwrap().unwrap();
        assert!(!record.is_draft());
        assert!(!repository.get(id).await.unwrap().unwrap().is_draft());
    }

    /// Accepts the draft write, rejects the write that carries feedback.
    struct RejectFinalWrite(MemoryKvStore);

    #[async_trait]
    impl KvStore for RejectFinalWrite {
        async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
            if value.contains("overallScore") {
                return Err(KvError::Backend("disk full".to_string()));
            }
            self.0.set(key, value).await
        }

        async fn delete(&self, key: &str) -> Result<(), KvError> {
            self.0.delete(key).await
        }

        async fn list(&self, pattern: &str, include_values: bool) -> Result<Vec<KvEntry>, KvError> {
            self.0.list(pattern, include_values).await
        }
    }

    #[tokio::test]
    async fn test_final_persistence_failure_leaves_draft() {
        let h = harness_with(
            MemoryObjectStore::default(),
            Arc::new(RejectFinalWrite(MemoryKvStore::default())),
            Render::Image,
            FakeInference::valid(),
        );
        let orchestrator = AnalysisOrchestrator::new(h.deps.clone());
        let id = orchestrator.id();
        let err = orchestrator
            .submit(Some(pdf()), JobContext::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::PersistenceFailed);
        assert!(err.to_string().contains("disk full"));
        assert!(h.deps.repository.get(id).await.unwrap().unwrap().is_draft());
        assert_eq!(h.kv.list("resume:*", false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_do_not_interfere() {
        let h = harness(FakeInference::valid());
        let first = AnalysisOrchestrator::new(h.deps.clone());
        let second = AnalysisOrchestrator::new(h.deps.clone());
        let (first_id, second_id) = (first.id(), second.id());
        assert_ne!(first_id, second_id);

        let (a, b) = tokio::join!(
            first.submit(Some(pdf()), JobContext::new(Some("Acme".to_string()), None, None)),
            second.submit(Some(pdf()), JobContext::new(Some("Globex".to_string()), None, None)),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.id, first_id);
        assert_eq!(b.id, second_id);
        assert_ne!(a.resume_path, b.resume_path);
        assert_ne!(a.image_path, b.image_path);

        let stored_a = h.deps.repository.get(first_id).await.unwrap().unwrap();
        let stored_b = h.deps.repository.get(second_id).await.unwrap().unwrap();
        assert_eq!(stored_a.company_name.as_deref(), Some("Acme"));
        assert_eq!(stored_b.company_name.as_deref(), Some("Globex"));
        assert_eq!(h.deps.repository.list().await.unwrap().len(), 2);
        assert_eq!(h.store.len(), 4);
    }

    #[test]
    fn test_terminal_states_do_not_move() {
        let h = harness(FakeInference::valid());
        let orchestrator = AnalysisOrchestrator::new(h.deps);
        let status = orchestrator.subscribe();

        orchestrator.advance(AnalysisState::ConvertingToImage);
        orchestrator.advance(AnalysisState::UploadingDocument);
        assert_eq!(status.borrow().state, AnalysisState::ConvertingToImage);

        orchestrator.advance(AnalysisState::Complete);
        orchestrator.advance(AnalysisState::Failed {
            kind: FailureKind::InferenceFailed,
            reason: "late".to_string(),
        });
        assert_eq!(status.borrow().state, AnalysisState::Complete);
    }

    #[test]
    fn test_status_serializes_flat() {
        let status = AnalysisStatus::new(
            Uuid::nil(),
            AnalysisState::Failed {
                kind: FailureKind::UploadFailed,
                reason: "Failed to upload file".to_string(),
            },
        );
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["state"], "failed");
        assert_eq!(value["kind"], "upload_failed");
        assert_eq!(value["message"], "Error: Failed to upload file");
    }
}
