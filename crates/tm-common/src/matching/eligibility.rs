use chrono::NaiveDate;

use crate::{
    Candidate,
    brief::{BudgetCeiling, ResolvedBrief},
};

/// Stage 0 の判定結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EligibilityDecision {
    Pass,
    /// 情報不足だが除外しない（出演料不明・生年月日不明）
    PassUnverified { reason: String },
    Excluded { reason: String },
}

impl EligibilityDecision {
    pub fn is_eligible(&self) -> bool {
        !matches!(self, EligibilityDecision::Excluded { .. })
    }
}

#[derive(Debug, Clone)]
pub struct EligibilityRules {
    pub budget: BudgetCeiling,
    pub minimum_age: Option<u32>,
    pub evaluation_date: NaiveDate,
}

impl EligibilityRules {
    pub fn for_brief(brief: &ResolvedBrief, evaluation_date: NaiveDate) -> Self {
        Self {
            budget: brief.budget,
            minimum_age: brief.minimum_age,
            evaluation_date,
        }
    }
}

/// 予算判定（出演料データなし・上限なしティアは常に通過）
pub fn check_budget(candidate: &Candidate, budget: BudgetCeiling) -> EligibilityDecision {
    let Some(fee) = candidate.representative_fee() else {
        return EligibilityDecision::PassUnverified {
            reason: "fee_unknown: 出演料データなし".into(),
        };
    };

    if budget.admits(fee) {
        return EligibilityDecision::Pass;
    }

    EligibilityDecision::Excluded {
        reason: format!(
            "budget_exceeded: 代表出演料 {}円 > 上限 {}円",
            fee,
            budget.ceiling_yen().unwrap_or_default()
        ),
    }
}

/// 年齢制限（酒類業種の25歳以上など）。生年月日不明は通過扱い
pub fn check_minimum_age(
    candidate: &Candidate,
    minimum_age: Option<u32>,
    evaluation_date: NaiveDate,
) -> EligibilityDecision {
    let Some(minimum) = minimum_age else {
        return EligibilityDecision::Pass;
    };

    match candidate.age_on(evaluation_date) {
        Some(age) if age >= minimum => EligibilityDecision::Pass,
        Some(age) => EligibilityDecision::Excluded {
            reason: format!("under_age: {}歳 < {}歳", age, minimum),
        },
        None => EligibilityDecision::PassUnverified {
            reason: "age_unknown: 生年月日不明".into(),
        },
    }
}

/// 全判定をまとめて実行する。最初の除外理由を返す
pub fn evaluate(candidate: &Candidate, rules: &EligibilityRules) -> EligibilityDecision {
    let decisions = [
        check_budget(candidate, rules.budget),
        check_minimum_age(candidate, rules.minimum_age, rules.evaluation_date),
    ];

    let mut unverified = None;
    for decision in decisions {
        match decision {
            EligibilityDecision::Excluded { .. } => return decision,
            EligibilityDecision::PassUnverified { reason } if unverified.is_none() => {
                unverified = Some(reason);
            }
            _ => {}
        }
    }

    match unverified {
        Some(reason) => EligibilityDecision::PassUnverified { reason },
        None => EligibilityDecision::Pass,
    }
}

/// 候補者プールを Stage 0 で絞り込む
pub fn filter_eligible<'a>(candidates: &'a [Candidate], rules: &EligibilityRules) -> Vec<&'a Candidate> {
    candidates
        .iter()
        .filter(|candidate| evaluate(candidate, rules).is_eligible())
        .collect()
}
