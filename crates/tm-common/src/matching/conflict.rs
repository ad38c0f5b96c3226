use std::collections::HashSet;

use chrono::NaiveDate;

use crate::{CandidateId, repository::ActiveEngagementRepository};

/// 競合契約フラグ付け
///
/// 競合カテゴリが定義されている業種（食品系）のみ判定し、それ以外は常に false。
pub struct ConflictAnnotator<'a> {
    competing_codes: &'a [String],
    today: NaiveDate,
}

impl<'a> ConflictAnnotator<'a> {
    pub fn new(competing_codes: &'a [String], today: NaiveDate) -> Self {
        Self {
            competing_codes,
            today,
        }
    }

    pub fn is_applicable(&self) -> bool {
        !self.competing_codes.is_empty()
    }

    pub fn conflicted<R>(&self, repository: &R, candidate_ids: &[CandidateId]) -> HashSet<CandidateId>
    where
        R: ActiveEngagementRepository + ?Sized,
    {
        if !self.is_applicable() || candidate_ids.is_empty() {
            return HashSet::new();
        }

        repository.currently_engaged(candidate_ids, self.competing_codes, self.today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Candidate, Engagement, repository::ReferenceSnapshot};

    fn snapshot() -> ReferenceSnapshot {
        let engaged = |id, code: &str, end: NaiveDate| Candidate {
            id,
            name: format!("candidate-{id}"),
            engagements: vec![Engagement {
                category_code: code.into(),
                end_date: end,
            }],
            ..Candidate::default()
        };

        ReferenceSnapshot::new(
            vec![
                engaged(1, "seasoning", date(2027, 3, 31)),
                engaged(2, "food", date(2027, 3, 31)),
                engaged(3, "seasoning", date(2026, 1, 31)),
            ],
            vec![],
            vec![],
            vec![],
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn flags_only_active_engagements_in_competing_codes() {
        let codes = vec!["processed_food".to_string(), "seasoning".to_string()];
        let annotator = ConflictAnnotator::new(&codes, date(2026, 10, 16));

        let flagged = annotator.conflicted(&snapshot(), &[1, 2, 3]);
        assert_eq!(flagged, HashSet::from([1]));
    }

    #[test]
    fn industries_without_codes_never_flag() {
        let annotator = ConflictAnnotator::new(&[], date(2026, 10, 16));
        assert!(!annotator.is_applicable());
        assert!(annotator.conflicted(&snapshot(), &[1, 2, 3]).is_empty());
    }
}
