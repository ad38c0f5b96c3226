pub mod catalog;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AttributeId, SegmentId, normalize::normalize_label};

pub use catalog::{BriefCatalog, BudgetTier, CatalogLoadError, FitAttribute, IndustryRule, SegmentEntry};

/// 広告キャンペーンのブリーフ（1回の実行ごとに生成される）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignBrief {
    pub industry: String,
    pub segment_label: String,
    pub budget_label: String,
    #[serde(default)]
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "yen", rename_all = "snake_case")]
pub enum BudgetCeiling {
    Limited(i64),
    Unlimited,
}

impl BudgetCeiling {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, BudgetCeiling::Unlimited)
    }

    pub fn ceiling_yen(&self) -> Option<i64> {
        match self {
            BudgetCeiling::Limited(yen) => Some(*yen),
            BudgetCeiling::Unlimited => None,
        }
    }

    pub fn admits(&self, fee: i64) -> bool {
        match self {
            BudgetCeiling::Limited(ceiling) => fee <= *ceiling,
            BudgetCeiling::Unlimited => true,
        }
    }
}

/// ブリーフを内部ID・数値に解決した結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedBrief {
    /// 正式業種名（エイリアス解決済み）
    pub industry: String,
    pub segment_id: SegmentId,
    pub segment_label: String,
    pub budget: BudgetCeiling,
    pub budget_label: String,
    pub fit_attribute_ids: Vec<AttributeId>,
    pub minimum_age: Option<u32>,
    pub competing_codes: Vec<String>,
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BriefResolutionError {
    #[error("unknown industry: {0}")]
    UnknownIndustry(String),
    #[error("unknown segment label: {0}")]
    UnknownSegment(String),
    #[error("unknown budget label: {0}")]
    UnknownBudget(String),
}

impl BriefResolutionError {
    pub fn facet(&self) -> &'static str {
        match self {
            BriefResolutionError::UnknownIndustry(_) => "industry",
            BriefResolutionError::UnknownSegment(_) => "segment",
            BriefResolutionError::UnknownBudget(_) => "budget",
        }
    }
}

/// 正規化済みラベル → カタログ上の位置
fn index_labels<'a, I>(entries: I) -> HashMap<String, usize>
where
    I: Iterator<Item = (usize, &'a String, &'a [String])>,
{
    let mut map = HashMap::new();
    for (idx, label, aliases) in entries {
        map.entry(normalize_label(label)).or_insert(idx);
        for alias in aliases {
            map.entry(normalize_label(alias)).or_insert(idx);
        }
    }
    map
}

pub struct BriefResolver {
    catalog: BriefCatalog,
    industries: HashMap<String, usize>,
    segments: HashMap<String, usize>,
    budgets: HashMap<String, usize>,
}

impl BriefResolver {
    pub fn new(catalog: BriefCatalog) -> Self {
        let industries = index_labels(
            catalog
                .industries
                .iter()
                .enumerate()
                .map(|(idx, rule)| (idx, &rule.name, rule.aliases.as_slice())),
        );
        let segments = index_labels(
            catalog
                .segments
                .iter()
                .enumerate()
                .map(|(idx, seg)| (idx, &seg.label, seg.aliases.as_slice())),
        );
        let budgets = index_labels(
            catalog
                .budget_tiers
                .iter()
                .enumerate()
                .map(|(idx, tier)| (idx, &tier.label, tier.aliases.as_slice())),
        );

        Self {
            catalog,
            industries,
            segments,
            budgets,
        }
    }

    pub fn builtin() -> Self {
        Self::new(BriefCatalog::builtin())
    }

    pub fn catalog(&self) -> &BriefCatalog {
        &self.catalog
    }

    pub fn industry_rule(&self, industry: &str) -> Result<&IndustryRule, BriefResolutionError> {
        self.industries
            .get(&normalize_label(industry))
            .map(|idx| &self.catalog.industries[*idx])
            .ok_or_else(|| BriefResolutionError::UnknownIndustry(industry.trim().to_string()))
    }

    pub fn segment(&self, label: &str) -> Result<&SegmentEntry, BriefResolutionError> {
        self.segments
            .get(&normalize_label(label))
            .map(|idx| &self.catalog.segments[*idx])
            .ok_or_else(|| BriefResolutionError::UnknownSegment(label.trim().to_string()))
    }

    pub fn budget(&self, label: &str) -> Result<(&BudgetTier, BudgetCeiling), BriefResolutionError> {
        let tier = self
            .budgets
            .get(&normalize_label(label))
            .map(|idx| &self.catalog.budget_tiers[*idx])
            .ok_or_else(|| BriefResolutionError::UnknownBudget(label.trim().to_string()))?;

        let ceiling = match tier.ceiling_yen {
            Some(yen) => BudgetCeiling::Limited(yen),
            None => BudgetCeiling::Unlimited,
        };
        Ok((tier, ceiling))
    }

    /// 業種・セグメント・予算の3項目を解決する。1つでも解決できなければ全体を失敗とする
    pub fn resolve(&self, brief: &CampaignBrief) -> Result<ResolvedBrief, BriefResolutionError> {
        let rule = self.industry_rule(&brief.industry)?;
        let segment = self.segment(&brief.segment_label)?;
        let (tier, budget) = self.budget(&brief.budget_label)?;

        Ok(ResolvedBrief {
            industry: rule.name.clone(),
            segment_id: segment.id,
            segment_label: segment.label.clone(),
            budget,
            budget_label: tier.label.clone(),
            fit_attribute_ids: rule.fit_attribute_ids(),
            minimum_age: rule.minimum_age,
            competing_codes: rule.competing_codes.clone(),
            purpose: brief
                .purpose
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        })
    }
}
