use chrono::NaiveDate;
use serde::Deserialize;

use crate::brief::CampaignBrief;

/// HTTP APIからのマッチングリクエスト（ラベルは正規化前の自由入力）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub industry: String,
    pub segment_label: String,
    pub budget_label: String,
    #[serde(default)]
    pub purpose: Option<String>,
    /// 評価日（省略時はサーバーの当日）
    #[serde(default)]
    pub evaluation_date: Option<NaiveDate>,
}

impl MatchRequest {
    pub fn brief(&self) -> CampaignBrief {
        CampaignBrief {
            industry: self.industry.clone(),
            segment_label: self.segment_label.clone(),
            budget_label: self.budget_label.clone(),
            purpose: self.purpose.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_camel_case_body() {
        let request: MatchRequest = serde_json::from_str(
            r#"{"industry":"食品","segmentLabel":"女性20〜34歳","budgetLabel":"〜3,000万円","evaluationDate":"2026-04-01"}"#,
        )
        .unwrap();

        assert_eq!(request.brief().segment_label, "女性20〜34歳");
        assert!(request.purpose.is_none());
        assert_eq!(request.evaluation_date, NaiveDate::from_ymd_opt(2026, 4, 1));
    }

    #[test]
    fn missing_required_label_is_rejected() {
        let result = serde_json::from_str::<MatchRequest>(r#"{"industry":"食品","segmentLabel":"全体"}"#);
        assert!(result.is_err());
    }
}
