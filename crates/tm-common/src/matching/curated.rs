use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::ranking::ScoredCandidate;
use crate::CandidateId;

/// 上位固定枠の数（推奨タレント + 自動補完）
pub const CURATED_SLOTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedType {
    Curated,
    AutoSupplement,
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayEntry {
    pub rank: u32,
    pub scored: ScoredCandidate,
    pub recommended_type: RecommendedType,
}

impl OverlayEntry {
    pub fn is_curated(&self) -> bool {
        self.recommended_type == RecommendedType::Curated
    }
}

/// 推奨タレントIDの検証結果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CuratedSelection {
    pub valid: Vec<ScoredCandidate>,
    pub invalid: Vec<CandidateId>,
}

/// 推奨タレントを解決する
///
/// - Stage 0 は通さない（予算・年齢で除外されていても採用する）
/// - 基礎スコアは通常と同じ式、適合度補正は 0 固定
/// - 候補者として存在しないIDは invalid に回し、重複IDは先勝ち
/// - 有効なものを優先順に最大 [`CURATED_SLOTS`] 件
pub fn resolve_curated<F>(
    pick_ids: &[CandidateId],
    exists: F,
    base_scores: &HashMap<CandidateId, f64>,
) -> CuratedSelection
where
    F: Fn(CandidateId) -> bool,
{
    let mut seen = HashSet::new();
    let mut selection = CuratedSelection::default();

    for id in pick_ids {
        if selection.valid.len() == CURATED_SLOTS {
            break;
        }
        if !seen.insert(*id) {
            continue;
        }
        if !exists(*id) {
            selection.invalid.push(*id);
            continue;
        }

        let base_score = base_scores.get(id).copied().unwrap_or(0.0);
        selection
            .valid
            .push(ScoredCandidate::new(*id, base_score, 0.0));
    }

    selection
}

/// Stage 5a: 推奨タレントを上位に差し込み、順位を振り直す
///
/// 1. 通常リストから推奨タレントと重複する候補者を取り除く
/// 2. 推奨タレントを 1..C 位に設定順で置く
/// 3. C < 3 なら残りの通常リスト先頭で 3 位まで補完する
/// 4. 残りは max(3, C) + 1 位から通常枠として続ける
/// 5. 全体を limit 件で打ち切る
pub fn apply_curated_overlay(
    curated: &[ScoredCandidate],
    regular: Vec<ScoredCandidate>,
    limit: usize,
) -> Vec<OverlayEntry> {
    let curated_ids: HashSet<CandidateId> = curated.iter().map(|c| c.candidate_id).collect();
    let reserved = CURATED_SLOTS.max(curated.len());

    let mut entries: Vec<(ScoredCandidate, RecommendedType)> =
        Vec::with_capacity(curated.len() + regular.len());
    entries.extend(curated.iter().map(|c| (*c, RecommendedType::Curated)));

    for scored in regular
        .into_iter()
        .filter(|scored| !curated_ids.contains(&scored.candidate_id))
    {
        let recommended_type = if entries.len() < reserved {
            RecommendedType::AutoSupplement
        } else {
            RecommendedType::Standard
        };
        entries.push((scored, recommended_type));
    }

    entries.truncate(limit);
    entries
        .into_iter()
        .enumerate()
        .map(|(idx, (scored, recommended_type))| OverlayEntry {
            rank: idx as u32 + 1,
            scored,
            recommended_type,
        })
        .collect()
}
