use std::{cmp::Ordering, collections::HashMap};

use super::{base_score::BaseScoreRow, fit_adjustment::FitAdjustments};
use crate::CandidateId;

/// 1候補者分のスコア（Stage 3 以降で使う）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    pub candidate_id: CandidateId,
    pub base_score: f64,
    pub fit_adjustment: f64,
    pub combined_score: f64,
}

impl ScoredCandidate {
    pub fn new(candidate_id: CandidateId, base_score: f64, fit_adjustment: f64) -> Self {
        Self {
            candidate_id,
            base_score,
            fit_adjustment,
            combined_score: base_score + fit_adjustment,
        }
    }
}

/// 総合スコア降順 → 基礎スコア降順 → 候補者ID昇順
pub fn compare_ranked(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.combined_score
        .total_cmp(&a.combined_score)
        .then_with(|| b.base_score.total_cmp(&a.base_score))
        .then_with(|| a.candidate_id.cmp(&b.candidate_id))
}

/// Stage 3: 基礎スコア行ごとに適合度補正を足し込む
pub fn combine(rows: &[BaseScoreRow], fits: &FitAdjustments) -> Vec<ScoredCandidate> {
    rows.iter()
        .map(|row| ScoredCandidate::new(row.candidate_id, row.base_score, fits.get(row.candidate_id)))
        .collect()
}

/// 候補者ごとに最も良い行だけを残す
pub fn dedupe_by_max(rows: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    let mut best: HashMap<CandidateId, ScoredCandidate> = HashMap::with_capacity(rows.len());
    for row in rows {
        best.entry(row.candidate_id)
            .and_modify(|current| {
                if compare_ranked(&row, current) == Ordering::Less {
                    *current = row;
                }
            })
            .or_insert(row);
    }
    best.into_values().collect()
}

/// Stage 4: 並べ替えて上位 limit 件に切り詰める（順位は並び順 = index + 1）
pub fn select_top(rows: Vec<ScoredCandidate>, limit: usize) -> Vec<ScoredCandidate> {
    let mut ranked = dedupe_by_max(rows);
    ranked.sort_by(compare_ranked);
    ranked.truncate(limit);
    ranked
}
