use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::{
    AttributeId, SegmentId,
    brief::{BriefCatalog, BudgetCeiling, FitAttribute, ResolvedBrief},
    matching::{MatchRun, PipelineNotice, RankedResult, RunStats},
};

/// 解決済みブリーフ（画面表示用）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedBriefDto {
    pub industry: String,
    pub segment_id: SegmentId,
    pub segment_label: String,
    pub budget_label: String,
    /// 予算上限（円）。最上位帯は null
    pub budget_ceiling_yen: Option<i64>,
    pub fit_attributes: Vec<FitAttributeDto>,
    pub minimum_age: Option<u32>,
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FitAttributeDto {
    pub id: AttributeId,
    pub label: &'static str,
}

impl From<&ResolvedBrief> for ResolvedBriefDto {
    fn from(brief: &ResolvedBrief) -> Self {
        let fit_attributes = brief
            .fit_attribute_ids
            .iter()
            .filter_map(|id| FitAttribute::from_id(*id))
            .map(|attribute| FitAttributeDto {
                id: attribute.id(),
                label: attribute.label(),
            })
            .collect();

        Self {
            industry: brief.industry.clone(),
            segment_id: brief.segment_id,
            segment_label: brief.segment_label.clone(),
            budget_label: brief.budget_label.clone(),
            budget_ceiling_yen: match brief.budget {
                BudgetCeiling::Limited(yen) => Some(yen),
                BudgetCeiling::Unlimited => None,
            },
            fit_attributes,
            minimum_age: brief.minimum_age,
            purpose: brief.purpose.clone(),
        }
    }
}

/// `POST /api/matches` のレスポンス
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRunResponse {
    pub run_id: String,
    pub brief: ResolvedBriefDto,
    pub evaluation_date: NaiveDate,
    pub results: Vec<RankedResult>,
    pub notices: Vec<PipelineNotice>,
    pub stats: RunStats,
    pub generated_at: DateTime<Utc>,
}

impl MatchRunResponse {
    pub fn new(brief: &ResolvedBrief, run: MatchRun, generated_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run.run_id,
            brief: ResolvedBriefDto::from(brief),
            evaluation_date: run.evaluation_date,
            results: run.results,
            notices: run.notices,
            stats: run.stats,
            generated_at,
        }
    }
}

/// ブリーフ入力フォームの選択肢
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefOptions {
    pub industries: Vec<String>,
    pub segments: Vec<String>,
    pub budgets: Vec<String>,
}

impl From<&BriefCatalog> for BriefOptions {
    fn from(catalog: &BriefCatalog) -> Self {
        Self {
            industries: catalog.industries.iter().map(|i| i.name.clone()).collect(),
            segments: catalog.segments.iter().map(|s| s.label.clone()).collect(),
            budgets: catalog.budget_tiers.iter().map(|b| b.label.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brief::{BriefResolver, CampaignBrief};

    #[test]
    fn dto_exposes_ceiling_and_attribute_labels() {
        let brief = BriefResolver::builtin()
            .resolve(&CampaignBrief {
                industry: "金融".into(),
                segment_label: "男性35〜49歳".into(),
                budget_label: "1億円以上".into(),
                purpose: Some("ブランド認知".into()),
            })
            .unwrap();

        let json = serde_json::to_value(ResolvedBriefDto::from(&brief)).unwrap();
        assert_eq!(json["segmentId"], 3);
        assert!(json["budgetCeilingYen"].is_null());
        assert_eq!(json["fitAttributes"][0]["id"], 2);
        assert_eq!(json["fitAttributes"][0]["label"], "信頼感");
        assert_eq!(json["purpose"], "ブランド認知");
    }

    #[test]
    fn options_follow_catalog_order() {
        let options = BriefOptions::from(&BriefCatalog::builtin());
        assert_eq!(options.industries.first().map(String::as_str), Some("食品"));
        assert_eq!(options.segments.first().map(String::as_str), Some("全体"));
        assert_eq!(options.budgets.last().map(String::as_str), Some("1億円以上"));
    }
}
