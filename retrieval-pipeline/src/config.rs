use common::utils::config::AppConfig;

/// Tunables for retrieval, context assembly and confidence grading.
#[derive(Debug, Clone)]
pub struct RetrievalTuning {
    /// Weight of the vector term in hybrid search.
    pub hybrid_alpha: f32,
    /// Upper bound on the assembled context, in characters.
    pub context_char_budget: usize,
    /// Per-hit snippet length before shortening kicks in.
    pub snippet_chars: usize,
    /// Mean score at or above which confidence is high.
    pub confidence_high: f32,
    /// Mean score at or above which confidence is medium.
    pub confidence_medium: f32,
    pub preview_k: usize,
}

impl Default for RetrievalTuning {
    fn default() -> Self {
        Self {
            hybrid_alpha: 0.7,
            context_char_budget: 12_000,
            snippet_chars: 2_000,
            confidence_high: 0.72,
            confidence_medium: 0.60,
            preview_k: 6,
        }
    }
}

impl RetrievalTuning {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            hybrid_alpha: config.hybrid_alpha.clamp(0.0, 1.0),
            confidence_high: config.confidence_high,
            confidence_medium: config.confidence_medium,
            ..Self::default()
        }
    }
}
