//! Axum route handlers for the Resume Analysis API.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::models::{Feedback, JobContext, ResumeRecord};
use crate::analysis::orchestrator::{check_document, AnalysisOrchestrator, AnalysisStatus};
use crate::analysis::score::ScoreView;
use crate::analysis::wipe::{wipe_all, WipeReport};
use crate::errors::AppError;
use crate::state::AppState;
use crate::storage::FilePayload;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Every score of a feedback, banded for display.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackScores {
    pub overall: ScoreView,
    #[serde(rename = "ATS")]
    pub ats: ScoreView,
    pub tone_and_style: ScoreView,
    pub content: ScoreView,
    pub structure: ScoreView,
    pub skills: ScoreView,
}

impl From<&Feedback> for FeedbackScores {
    fn from(feedback: &Feedback) -> Self {
        Self {
            overall: feedback.overall_score.into(),
            ats: feedback.ats.score.into(),
            tone_and_style: feedback.tone_and_style.score.into(),
            content: feedback.content.score.into(),
            structure: feedback.structure.score.into(),
            skills: feedback.skills.score.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResumeDetailResponse {
    pub resume: ResumeRecord,
    pub scores: Option<FeedbackScores>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSummary {
    pub id: Uuid,
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub analyzed: bool,
    pub overall: Option<ScoreView>,
}

impl From<ResumeRecord> for ResumeSummary {
    fn from(record: ResumeRecord) -> Self {
        Self {
            id: record.id,
            analyzed: !record.is_draft(),
            overall: record.feedback.as_ref().map(|f| f.overall_score.into()),
            company_name: record.company_name,
            job_title: record.job_title,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/resumes
///
/// Multipart form: `file` (PDF), `company-name`, `job-title`, `job-description`.
/// Starts the analysis in the background and returns its initial status.
pub async fn handle_submit(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<AnalysisStatus>), AppError> {
    let (document, context) = read_submission(multipart).await?;
    let document = check_document(document)?;

    let orchestrator = AnalysisOrchestrator::new(state.analysis.clone());
    let status = state
        .registry
        .start(orchestrator, Some(document), context)
        .await;

    Ok((StatusCode::ACCEPTED, Json(status)))
}

/// GET /api/v1/resumes
pub async fn handle_list(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResumeSummary>>, AppError> {
    let records = state.analysis.repository.list().await?;
    Ok(Json(records.into_iter().map(ResumeSummary::from).collect()))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeDetailResponse>, AppError> {
    let resume = find_record(&state, id).await?;
    let scores = resume.feedback.as_ref().map(FeedbackScores::from);
    Ok(Json(ResumeDetailResponse { resume, scores }))
}

/// GET /api/v1/resumes/:id/status
pub async fn handle_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisStatus>, AppError> {
    state
        .registry
        .status(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No analysis in progress for {id}")))
}

/// POST /api/v1/resumes/:id/abandon
pub async fn handle_abandon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.registry.abandon(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("No analysis in progress for {id}")))
    }
}

/// GET /api/v1/resumes/:id/document
pub async fn handle_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let record = find_record(&state, id).await?;
    stream_object(&state, &record.resume_path, "application/pdf").await
}

/// GET /api/v1/resumes/:id/image
pub async fn handle_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let record = find_record(&state, id).await?;
    stream_object(&state, &record.image_path, "image/png").await
}

/// DELETE /api/v1/admin/data
pub async fn handle_wipe(State(state): State<AppState>) -> Result<Json<WipeReport>, AppError> {
    let report = wipe_all(state.analysis.store.as_ref(), &state.analysis.repository).await?;
    Ok(Json(report))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn find_record(state: &AppState, id: Uuid) -> Result<ResumeRecord, AppError> {
    state
        .analysis
        .repository
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

async fn stream_object(
    state: &AppState,
    path: &str,
    content_type: &'static str,
) -> Result<Response, AppError> {
    let bytes = state
        .analysis
        .store
        .read(path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("File {path} not found")))?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

async fn read_submission(
    mut multipart: Multipart,
) -> Result<(Option<FilePayload>, JobContext), AppError> {
    let mut document = None;
    let mut company_name = None;
    let mut job_title = None;
    let mut job_description = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/pdf")
                    .to_string();
                let bytes = field.bytes().await?;
                document = Some(FilePayload::new(file_name, content_type, bytes));
            }
            "company-name" => company_name = Some(field.text().await?),
            "job-title" => job_title = Some(field.text().await?),
            "job-description" => job_description = Some(field.text().await?),
            _ => {}
        }
    }

    Ok((
        document,
        JobContext::new(company_name, job_title, job_description),
    ))
}
