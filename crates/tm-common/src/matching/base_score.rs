use std::collections::{HashMap, HashSet};

use crate::{BaseSignal, CandidateId};

/// Stage 1 の1行分（同一候補者に複数行あり得る）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseScoreRow {
    pub candidate_id: CandidateId,
    pub base_score: f64,
}

/// 基礎スコア = (人気度 + パワー) / 2。欠損・非有限値は 0 とみなす
pub fn base_score(signal: &BaseSignal) -> f64 {
    let value = |v: Option<f64>| v.filter(|v| v.is_finite()).unwrap_or(0.0);
    (value(signal.popularity) + value(signal.power)) / 2.0
}

/// プール内候補者の基礎スコア行を作る。シグナル行のない候補者は 0 点の1行を持つ
pub fn base_score_rows(signals: &[&BaseSignal], pool: &[CandidateId]) -> Vec<BaseScoreRow> {
    let members: HashSet<CandidateId> = pool.iter().copied().collect();
    let mut rows: Vec<BaseScoreRow> = signals
        .iter()
        .filter(|signal| members.contains(&signal.candidate_id))
        .map(|signal| BaseScoreRow {
            candidate_id: signal.candidate_id,
            base_score: base_score(signal),
        })
        .collect();

    let covered: HashSet<CandidateId> = rows.iter().map(|row| row.candidate_id).collect();
    rows.extend(
        pool.iter()
            .filter(|id| !covered.contains(id))
            .map(|id| BaseScoreRow {
                candidate_id: *id,
                base_score: 0.0,
            }),
    );
    rows
}

/// 推奨タレント用：行が複数あれば最大値、なければ 0
pub fn best_base_scores(signals: &[&BaseSignal]) -> HashMap<CandidateId, f64> {
    let mut best: HashMap<CandidateId, f64> = HashMap::new();
    for signal in signals {
        let score = base_score(signal);
        best.entry(signal.candidate_id)
            .and_modify(|current| {
                if score > *current {
                    *current = score;
                }
            })
            .or_insert(score);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(candidate_id: CandidateId, popularity: Option<f64>, power: Option<f64>) -> BaseSignal {
        BaseSignal {
            candidate_id,
            segment_id: 1,
            popularity,
            power,
        }
    }

    #[test]
    fn averages_both_signals() {
        assert_eq!(base_score(&signal(1, Some(80.0), Some(60.0))), 70.0);
    }

    #[test]
    fn missing_signal_counts_as_zero() {
        assert_eq!(base_score(&signal(1, Some(80.0), None)), 40.0);
        assert_eq!(base_score(&signal(1, None, Some(30.0))), 15.0);
        assert_eq!(base_score(&signal(1, None, None)), 0.0);
    }

    #[test]
    fn non_finite_signal_counts_as_zero() {
        assert_eq!(base_score(&signal(1, Some(f64::NAN), Some(60.0))), 30.0);
        assert_eq!(base_score(&signal(1, Some(80.0), Some(f64::INFINITY))), 40.0);
        assert_eq!(base_score(&signal(1, Some(f64::NEG_INFINITY), Some(f64::NAN))), 0.0);

        let poisoned = signal(1, Some(f64::NAN), Some(f64::NAN));
        let real = signal(1, Some(20.0), Some(20.0));
        assert_eq!(best_base_scores(&[&poisoned, &real]).get(&1), Some(&20.0));
    }

    #[test]
    fn rows_cover_pool_members_only() {
        let a = signal(1, Some(50.0), Some(50.0));
        let b = signal(1, Some(70.0), Some(70.0));
        let outsider = signal(9, Some(99.0), Some(99.0));
        let rows = base_score_rows(&[&a, &b, &outsider], &[1, 2]);

        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.candidate_id != 9));
        assert!(rows.contains(&BaseScoreRow {
            candidate_id: 2,
            base_score: 0.0
        }));
    }

    #[test]
    fn best_scores_keep_highest_row() {
        let a = signal(1, Some(50.0), Some(50.0));
        let b = signal(1, Some(70.0), Some(70.0));
        let best = best_base_scores(&[&a, &b]);
        assert_eq!(best.get(&1), Some(&70.0));
    }
}
