use std::collections::HashMap;

use crate::{AttributeId, CandidateId, FitScore};

/// パーセンタイル（上位からの累積比率）→ 加減点。境界値は良い側に含める
pub const FIT_POINT_TIERS: [(f64, f64); 5] = [
    (0.15, 12.0),
    (0.30, 6.0),
    (0.50, 3.0),
    (0.70, -3.0),
    (0.85, -6.0),
];

pub const FIT_POINTS_FLOOR: f64 = -12.0;

pub fn points_for_percentile(percentile: f64) -> f64 {
    FIT_POINT_TIERS
        .iter()
        .find(|(upper, _)| percentile <= *upper)
        .map(|(_, points)| *points)
        .unwrap_or(FIT_POINTS_FLOOR)
}

/// スコア降順で「自分以上のスコアを持つ割合」を求める（同点は同じ値）
///
/// ソート後に1回走査するだけなので O(n log n)。
pub fn cumulative_percentiles(scores: &HashMap<CandidateId, f64>) -> HashMap<CandidateId, f64> {
    let mut ordered: Vec<(CandidateId, f64)> = scores.iter().map(|(id, s)| (*id, *s)).collect();
    ordered.sort_by(|a, b| b.1.total_cmp(&a.1));

    let population = ordered.len() as f64;
    let mut percentiles = HashMap::with_capacity(ordered.len());

    let mut start = 0;
    while start < ordered.len() {
        let mut end = start;
        while end + 1 < ordered.len() && ordered[end + 1].1 == ordered[start].1 {
            end += 1;
        }

        let percentile = (end + 1) as f64 / population;
        for (id, _) in &ordered[start..=end] {
            percentiles.insert(*id, percentile);
        }
        start = end + 1;
    }

    percentiles
}

/// Stage 2 の結果。記録のない候補者は 0
#[derive(Debug, Clone, Default)]
pub struct FitAdjustments {
    by_candidate: HashMap<CandidateId, f64>,
    attribute_count: usize,
    population_sizes: HashMap<AttributeId, usize>,
}

impl FitAdjustments {
    pub fn get(&self, candidate_id: CandidateId) -> f64 {
        self.by_candidate.get(&candidate_id).copied().unwrap_or(0.0)
    }

    pub fn attribute_count(&self) -> usize {
        self.attribute_count
    }

    pub fn population_size(&self, attribute_id: AttributeId) -> usize {
        self.population_sizes.get(&attribute_id).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.by_candidate.is_empty()
    }
}

/// 対象項目ごとに母集団全体でのパーセンタイルを出し、加減点の平均を適合度補正とする
///
/// 母集団は「そのセグメント・項目でスコア記録のある全員」であり、
/// Stage 0 の通過者に限定しない。
pub fn compute_fit_adjustments(
    population: &[&FitScore],
    attribute_ids: &[AttributeId],
) -> FitAdjustments {
    if attribute_ids.is_empty() {
        return FitAdjustments::default();
    }

    let mut per_attribute: HashMap<AttributeId, HashMap<CandidateId, f64>> = HashMap::new();
    for row in population {
        if !attribute_ids.contains(&row.attribute_id) {
            continue;
        }
        let Some(score) = row.score.filter(|s| s.is_finite()) else {
            continue;
        };

        per_attribute
            .entry(row.attribute_id)
            .or_default()
            .entry(row.candidate_id)
            .and_modify(|current| {
                if score > *current {
                    *current = score;
                }
            })
            .or_insert(score);
    }

    let mut totals: HashMap<CandidateId, f64> = HashMap::new();
    let mut population_sizes = HashMap::new();
    for attribute_id in attribute_ids {
        let Some(scores) = per_attribute.get(attribute_id) else {
            population_sizes.insert(*attribute_id, 0);
            continue;
        };
        population_sizes.insert(*attribute_id, scores.len());

        for (candidate_id, percentile) in cumulative_percentiles(scores) {
            *totals.entry(candidate_id).or_insert(0.0) += points_for_percentile(percentile);
        }
    }

    let divisor = attribute_ids.len() as f64;
    FitAdjustments {
        by_candidate: totals
            .into_iter()
            .map(|(id, total)| (id, total / divisor))
            .collect(),
        attribute_count: attribute_ids.len(),
        population_sizes,
    }
}
