use std::{collections::HashSet, fmt};

use common::storage::types::hit::Hit;
use serde::{Deserialize, Serialize};

use crate::config::RetrievalTuning;

/// Summary of everything retrieval returned, not only what fit in the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalStats {
    pub chunks_used: usize,
    pub docs_used: usize,
    pub score_max: Option<f32>,
    pub score_min: Option<f32>,
    pub score_mean: Option<f32>,
}

#[allow(clippy::cast_possible_truncation)]
fn round3(value: f64) -> f32 {
    ((value * 1000.0).round() / 1000.0) as f32
}

#[allow(clippy::cast_precision_loss)]
pub fn retrieval_stats(hits: &[Hit]) -> RetrievalStats {
    let docs: HashSet<&str> = hits.iter().map(|hit| hit.document_id.as_str()).collect();
    let scores: Vec<f64> = hits
        .iter()
        .filter_map(|hit| hit.score)
        .filter(|score| score.is_finite())
        .map(f64::from)
        .collect();

    let (score_max, score_min, score_mean) = if scores.is_empty() {
        (None, None, None)
    } else {
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        (Some(round3(max)), Some(round3(min)), Some(round3(mean)))
    };

    RetrievalStats {
        chunks_used: hits.len(),
        docs_used: docs.len(),
        score_max,
        score_min,
        score_mean,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceThresholds {
    pub high: f32,
    pub medium: f32,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        let tuning = RetrievalTuning::default();
        Self::from(&tuning)
    }
}

impl From<&RetrievalTuning> for ConfidenceThresholds {
    fn from(tuning: &RetrievalTuning) -> Self {
        Self {
            high: tuning.confidence_high,
            medium: tuning.confidence_medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBadge {
    High,
    Medium,
    Low,
}

impl ConfidenceBadge {
    pub fn grade(mean: Option<f32>, thresholds: ConfidenceThresholds) -> Self {
        match mean {
            Some(mean) if mean >= thresholds.high => Self::High,
            Some(mean) if mean >= thresholds.medium => Self::Medium,
            _ => Self::Low,
        }
    }
}

impl fmt::Display for ConfidenceBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfidenceBadge::High => "high",
            ConfidenceBadge::Medium => "medium",
            ConfidenceBadge::Low => "low",
        };
        f.write_str(label)
    }
}
