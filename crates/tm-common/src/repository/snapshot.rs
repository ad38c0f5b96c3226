use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    ActiveEngagementRepository, CandidateRepository, CuratedPickRepository, FitScoreRepository,
};
use crate::{
    AttributeId, BaseSignal, Candidate, CandidateId, CuratedPick, FitScore, SegmentId,
    normalize::normalize_label,
};

#[derive(Debug, Error)]
pub enum SnapshotLoadError {
    #[error("failed to read reference snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse reference snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// スナップショットファイルの形
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotData {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub base_signals: Vec<BaseSignal>,
    #[serde(default)]
    pub fit_scores: Vec<FitScore>,
    #[serde(default)]
    pub curated_picks: Vec<CuratedPick>,
}

/// 不変の参照データスナップショット。並行実行から共有して読むだけ
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "SnapshotData")]
pub struct ReferenceSnapshot {
    data: SnapshotData,
    index: HashMap<CandidateId, usize>,
}

impl From<SnapshotData> for ReferenceSnapshot {
    fn from(data: SnapshotData) -> Self {
        let index = data
            .candidates
            .iter()
            .enumerate()
            .map(|(idx, candidate)| (candidate.id, idx))
            .collect();
        Self { data, index }
    }
}

impl ReferenceSnapshot {
    pub fn new(
        candidates: Vec<Candidate>,
        base_signals: Vec<BaseSignal>,
        fit_scores: Vec<FitScore>,
        curated_picks: Vec<CuratedPick>,
    ) -> Self {
        SnapshotData {
            candidates,
            base_signals,
            fit_scores,
            curated_picks,
        }
        .into()
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SnapshotLoadError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SnapshotLoadError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn data(&self) -> &SnapshotData {
        &self.data
    }
}

impl CandidateRepository for ReferenceSnapshot {
    fn candidates(&self) -> &[Candidate] {
        &self.data.candidates
    }

    fn find_candidate(&self, id: CandidateId) -> Option<&Candidate> {
        self.index.get(&id).map(|idx| &self.data.candidates[*idx])
    }

    fn base_signals(&self, segment_id: SegmentId) -> Vec<&BaseSignal> {
        self.data
            .base_signals
            .iter()
            .filter(|signal| signal.segment_id == segment_id)
            .collect()
    }
}

impl FitScoreRepository for ReferenceSnapshot {
    fn population_scores(
        &self,
        segment_id: SegmentId,
        attribute_ids: &[AttributeId],
    ) -> Vec<&FitScore> {
        self.data
            .fit_scores
            .iter()
            .filter(|row| row.segment_id == segment_id)
            .filter(|row| attribute_ids.contains(&row.attribute_id))
            .filter(|row| row.score.is_some_and(f64::is_finite))
            .collect()
    }
}

impl CuratedPickRepository for ReferenceSnapshot {
    fn picks_for_industry(&self, industry: &str) -> Vec<CandidateId> {
        let key = normalize_label(industry);
        let mut picks: Vec<&CuratedPick> = self
            .data
            .curated_picks
            .iter()
            .filter(|pick| normalize_label(&pick.industry) == key)
            .collect();
        picks.sort_by_key(|pick| pick.priority);
        picks.into_iter().map(|pick| pick.candidate_id).collect()
    }
}

impl ActiveEngagementRepository for ReferenceSnapshot {
    fn currently_engaged(
        &self,
        candidate_ids: &[CandidateId],
        competing_codes: &[String],
        today: NaiveDate,
    ) -> HashSet<CandidateId> {
        if competing_codes.is_empty() {
            return HashSet::new();
        }

        candidate_ids
            .iter()
            .filter_map(|id| self.find_candidate(*id))
            .filter(|candidate| {
                candidate.engagements.iter().any(|engagement| {
                    engagement.is_active_on(today)
                        && competing_codes.contains(&engagement.category_code)
                })
            })
            .map(|candidate| candidate.id)
            .collect()
    }
}
