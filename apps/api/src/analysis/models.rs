//! Persisted record and feedback types.
//!
//! Field names on the wire follow the stored record shape:
//! `{ id, resumePath, imagePath, companyName, jobTitle, jobDescription, feedback }`
//! where `feedback` is `""` until analysis completes.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An integer score in `0..=100`. Anything else fails deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MAX: u8 = 100;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Score::new)
            .ok_or_else(|| format!("score {value} is outside 0..=100"))
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> u8 {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed two-valued tip tag. Unknown values are rejected, never coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Good,
    Improve,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtsTip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    #[serde(rename = "tip")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    #[serde(rename = "tip")]
    pub message: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtsCategory {
    pub score: Score,
    pub tips: Vec<AtsTip>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub score: Score,
    pub tips: Vec<CategoryTip>,
}

/// Structured review of one resume. The overall score comes from the model;
/// it is not derived from the category scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub overall_score: Score,
    #[serde(rename = "ATS")]
    pub ats: AtsCategory,
    pub tone_and_style: Category,
    pub content: Category,
    pub structure: Category,
    pub skills: Category,
}

/// User-supplied job context. Blank strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobContext {
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub job_description: Option<String>,
}

impl JobContext {
    pub fn new(
        company_name: Option<String>,
        job_title: Option<String>,
        job_description: Option<String>,
    ) -> Self {
        Self {
            company_name: non_blank(company_name),
            job_title: non_blank(job_title),
            job_description: non_blank(job_description),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// One submitted resume and, once analysis succeeds, its feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: Uuid,
    pub resume_path: String,
    pub image_path: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default, with = "feedback_slot")]
    pub feedback: Option<Feedback>,
}

impl ResumeRecord {
    /// A record whose artifacts are uploaded but which has no feedback yet.
    pub fn draft(id: Uuid, resume_path: String, image_path: String, context: JobContext) -> Self {
        Self {
            id,
            resume_path,
            image_path,
            company_name: context.company_name,
            job_title: context.job_title,
            job_description: context.job_description,
            feedback: None,
        }
    }

    pub fn is_draft(&self) -> bool {
        self.feedback.is_none()
    }
}

/// `feedback` is stored as `""` while empty and as the object once filled.
mod feedback_slot {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Feedback;

    pub fn serialize<S: Serializer>(value: &Option<Feedback>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(feedback) => feedback.serialize(s),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Feedback>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Slot {
            Filled(Feedback),
            Text(String),
        }

        match Option::<Slot>::deserialize(d)? {
            None => Ok(None),
            Some(Slot::Text(text)) if text.is_empty() => Ok(None),
            Some(Slot::Text(_)) => Err(D::Error::custom(
                "feedback must be an object or an empty string",
            )),
            Some(Slot::Filled(feedback)) => Ok(Some(feedback)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_score_accepts_bounds() {
        assert_eq!(serde_json::from_value::<Score>(json!(0)).unwrap().value(), 0);
        assert_eq!(serde_json::from_value::<Score>(json!(100)).unwrap().value(), 100);
    }

    #[test]
    fn test_score_rejects_out_of_range_and_fractions() {
        assert!(serde_json::from_value::<Score>(json!(101)).is_err());
        assert!(serde_json::from_value::<Score>(json!(-1)).is_err());
        assert!(serde_json::from_value::<Score>(json!(72.5)).is_err());
        assert!(serde_json::from_value::<Score>(json!("72")).is_err());
    }

    #[test]
    fn test_feedback_uses_wire_field_names() {
        let value = serde_json::to_value(sample_feedback()).unwrap();
        assert_eq!(value["overallScore"], 72);
        assert_eq!(value["ATS"]["score"], 80);
        assert_eq!(value["ATS"]["tips"][0]["type"], "improve");
        assert_eq!(value["ATS"]["tips"][0]["tip"], "Add the keyword 'Kubernetes'");
        assert_eq!(value["toneAndStyle"]["tips"][0]["explanation"], "Recruiters can scan the page quickly.");
    }

    #[test]
    fn test_draft_record_stores_empty_feedback_string() {
        let id = Uuid::new_v4();
        let record = ResumeRecord::draft(
            id,
            "uploads/a/resume.pdf".to_string(),
            "uploads/b/resume.png".to_string(),
            JobContext::new(Some("Acme".to_string()), None, Some("  ".to_string())),
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], id.to_string());
        assert_eq!(value["resumePath"], "uploads/a/resume.pdf");
        assert_eq!(value["imagePath"], "uploads/b/resume.png");
        assert_eq!(value["companyName"], "Acme");
        assert!(value["jobDescription"].is_null());
        assert_eq!(value["feedback"], "");

        let back: ResumeRecord = serde_json::from_value(value).unwrap();
        assert!(back.is_draft());
        assert_eq!(back, record);
    }

    #[test]
    fn test_completed_record_embeds_feedback_object() {
        let mut record = ResumeRecord::draft(
            Uuid::new_v4(),
            "r".to_string(),
            "i".to_string(),
            JobContext::default(),
        );
        record.feedback = Some(sample_feedback());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["feedback"]["overallScore"], 72);
        let back: ResumeRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.feedback, Some(sample_feedback()));
    }

    #[test]
    fn test_record_rejects_non_empty_feedback_string() {
        let raw = json!({
            "id": Uuid::new_v4(),
            "resumePath": "r",
            "imagePath": "i",
            "feedback": "pending"
        });
        assert!(serde_json::from_value::<ResumeRecord>(raw).is_err());
    }

    #[test]
    fn test_record_tolerates_missing_optional_fields() {
        let raw = json!({
            "id": Uuid::new_v4(),
            "resumePath": "r",
            "imagePath": "i"
        });
        let record: ResumeRecord = serde_json::from_value(raw).unwrap();
        assert!(record.company_name.is_none());
        assert!(record.is_draft());
    }
}
