//! Score → band classification used by every view that renders a score.

use serde::Serialize;

use crate::analysis::models::Score;

/// Scores above this are `Strong`.
pub const STRONG_ABOVE: u8 = 69;

/// Lowest `Moderate` score.
///
/// Some score widgets draw the moderate/weak line at 50 instead of 40 and
/// product has not said which one is canonical. This constant is the only
/// place the line is drawn; change it here if that decision lands.
pub const MODERATE_FROM: u8 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Strong,
    Moderate,
    Weak,
}

impl ScoreBand {
    pub fn classify(score: u8) -> Self {
        if score > STRONG_ABOVE {
            ScoreBand::Strong
        } else if score >= MODERATE_FROM {
            ScoreBand::Moderate
        } else {
            ScoreBand::Weak
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreBand::Strong => "Strong",
            ScoreBand::Moderate => "Good Start",
            ScoreBand::Weak => "Needs Work",
        }
    }
}

/// A score as the presentation layer shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreView {
    pub score: u8,
    pub band: ScoreBand,
    pub label: &'static str,
}

impl From<Score> for ScoreView {
    fn from(score: Score) -> Self {
        let band = ScoreBand::classify(score.value());
        Self {
            score: score.value(),
            band,
            label: band.label(),
        }
    }
}
