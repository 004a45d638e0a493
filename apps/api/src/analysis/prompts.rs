// Resume review prompt templates.

use crate::analysis::models::JobContext;

pub const RESPONSE_FORMAT: &str = r#"{
  "overallScore": number,            // integer 0-100
  "ATS": {
    "score": number,                 // integer 0-100, how well the resume parses in applicant tracking systems
    "tips": [{ "type": "good" | "improve", "tip": string }]   // 3-4 tips
  },
  "toneAndStyle": {
    "score": number,
    "tips": [{ "type": "good" | "improve", "tip": string, "explanation": string }]
  },
  "content": {
    "score": number,
    "tips": [{ "type": "good" | "improve", "tip": string, "explanation": string }]
  },
  "structure": {
    "score": number,
    "tips": [{ "type": "good" | "improve", "tip": string, "explanation": string }]
  },
  "skills": {
    "score": number,
    "tips": [{ "type": "good" | "improve", "tip": string, "explanation": string }]
  }
}"#;

const NOT_PROVIDED: &str = "(not provided)";

/// Builds the instructions sent with the resume image. User text is passed
/// as format arguments, so placeholder-like text inside it stays literal.
pub fn review_instructions(context: &JobContext) -> String {
    format!(
        r#"You are an expert in applicant tracking systems (ATS) and resume analysis.
Analyze and rate the attached resume and suggest how to improve it.
The rating can be low if the resume is weak. Be thorough and detailed; do not be afraid to point out mistakes or areas for improvement.
If there is a lot to improve, give low scores. Use the job description, if provided, to tailor the feedback.

JOB TITLE: {job_title}
JOB DESCRIPTION: {job_description}

Every score is an integer between 0 and 100. Every "type" is exactly "good" or "improve".
Return the analysis as a JSON object in this format:
{response_format}

Return ONLY the JSON object, without any other text and without code fences."#,
        job_title = context.job_title.as_deref().unwrap_or(NOT_PROVIDED),
        job_description = context.job_description.as_deref().unwrap_or(NOT_PROVIDED),
        response_format = RESPONSE_FORMAT,
    )
}
