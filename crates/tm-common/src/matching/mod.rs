pub mod banding;
pub mod base_score;
pub mod conflict;
pub mod curated;
pub mod eligibility;
pub mod fit_adjustment;
pub mod pipeline;
pub mod ranking;

use chrono::NaiveDate;
use serde::Serialize;

use crate::CandidateId;

pub use banding::{JitterMode, SCORE_BANDS, ScoreBander};
pub use curated::RecommendedType;
pub use pipeline::{MAX_RESULTS, MatchingEngine, MatchingEngineConfig};

/// 1件分のランキング結果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    pub candidate_id: CandidateId,
    pub rank: u32,
    pub name: String,
    pub category: Option<String>,
    pub base_score: f64,
    pub fit_adjustment: f64,
    pub combined_score: f64,
    pub display_score: f64,
    pub is_curated: bool,
    pub recommended_type: RecommendedType,
    pub has_active_conflict: bool,
}

/// 実行は継続したが結果に影響した事象（致命的ではない）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineNotice {
    DataUnavailable { stage: &'static str, detail: String },
    CuratedPickInvalid { candidate_id: CandidateId },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub candidate_pool: usize,
    pub eligible_pool: usize,
    pub fit_population: usize,
    pub curated_valid: usize,
    pub curated_invalid: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRun {
    pub run_id: String,
    pub evaluation_date: NaiveDate,
    pub results: Vec<RankedResult>,
    pub notices: Vec<PipelineNotice>,
    pub stats: RunStats,
}
