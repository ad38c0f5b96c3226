//! Read-only access to the reference data a matching run consumes.
//!
//! The engine never writes through these traits. `ReferenceSnapshot` is the
//! in-memory implementation: it is either deserialized from a JSON file or
//! assembled from Postgres by [`crate::db::reference::load_reference_snapshot`].

mod snapshot;

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::{AttributeId, BaseSignal, Candidate, CandidateId, FitScore, SegmentId};

pub use snapshot::{ReferenceSnapshot, SnapshotLoadError};

pub trait CandidateRepository {
    /// 候補者プール全体（予算・年齢による絞り込み前）
    fn candidates(&self) -> &[Candidate];

    fn find_candidate(&self, id: CandidateId) -> Option<&Candidate>;

    /// 指定セグメントの基礎シグナル行
    fn base_signals(&self, segment_id: SegmentId) -> Vec<&BaseSignal>;
}

pub trait FitScoreRepository {
    /// 指定セグメント・項目の全母集団スコア（スコア記録のある行のみ）
    fn population_scores(&self, segment_id: SegmentId, attribute_ids: &[AttributeId])
    -> Vec<&FitScore>;
}

pub trait CuratedPickRepository {
    /// 業種に設定された推奨タレントID（優先順）
    fn picks_for_industry(&self, industry: &str) -> Vec<CandidateId>;
}

pub trait ActiveEngagementRepository {
    /// 評価日時点で競合カテゴリの契約を持つ候補者ID
    fn currently_engaged(
        &self,
        candidate_ids: &[CandidateId],
        competing_codes: &[String],
        today: NaiveDate,
    ) -> HashSet<CandidateId>;
}

/// パイプラインが必要とする参照データ一式
pub trait ReferenceData:
    CandidateRepository + FitScoreRepository + CuratedPickRepository + ActiveEngagementRepository
{
}

impl<T> ReferenceData for T where
    T: CandidateRepository
        + FitScoreRepository
        + CuratedPickRepository
        + ActiveEngagementRepository
{
}
