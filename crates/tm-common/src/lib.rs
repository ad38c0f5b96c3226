pub mod api;
pub mod brief;
pub mod db;
pub mod logging;
pub mod matching;
pub mod normalize;
pub mod repository;
pub mod run_id;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub type CandidateId = i64;
pub type SegmentId = i32;
pub type AttributeId = i32;

// Reference data models shared by the matching stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    /// 出演料下限（円）
    #[serde(default)]
    pub fee_min: Option<i64>,
    /// 出演料上限（円）
    #[serde(default)]
    pub fee_max: Option<i64>,
    #[serde(default)]
    pub engagements: Vec<Engagement>,
}

impl Candidate {
    /// 予算判定に使う代表出演料（上限優先、なければ下限）
    pub fn representative_fee(&self) -> Option<i64> {
        self.fee_max.or(self.fee_min)
    }

    /// 評価日時点の満年齢。生年月日不明なら None
    pub fn age_on(&self, date: NaiveDate) -> Option<u32> {
        let birth = self.birth_date?;
        let mut age = date.year() - birth.year();
        if (date.month(), date.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        u32::try_from(age).ok()
    }
}

/// 契約中の競合カテゴリ（CM 契約など）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub category_code: String,
    pub end_date: NaiveDate,
}

impl Engagement {
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.end_date >= date
    }
}

/// セグメント別の基礎シグナル（人気度・パワー）。1人に複数行あり得る
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseSignal {
    pub candidate_id: CandidateId,
    pub segment_id: SegmentId,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub power: Option<f64>,
}

/// セグメント別のイメージ項目スコア
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitScore {
    pub candidate_id: CandidateId,
    pub segment_id: SegmentId,
    pub attribute_id: AttributeId,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedPick {
    pub industry: String,
    pub priority: i32,
    pub candidate_id: CandidateId,
}
