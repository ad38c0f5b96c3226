use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use super::{
    MatchRun, PipelineNotice, RankedResult, RunStats,
    banding::{JitterMode, ScoreBander},
    base_score::{base_score_rows, best_base_scores},
    conflict::ConflictAnnotator,
    curated::{apply_curated_overlay, resolve_curated},
    eligibility::{EligibilityRules, filter_eligible},
    fit_adjustment::compute_fit_adjustments,
    ranking::{combine, select_top},
};
use crate::{CandidateId, brief::ResolvedBrief, repository::ReferenceData, run_id};

/// 返却件数の上限
pub const MAX_RESULTS: usize = 30;

#[derive(Debug, Clone)]
pub struct MatchingEngineConfig {
    /// 返却件数（1〜30）
    pub result_limit: usize,
    pub jitter: JitterMode,
}

impl Default for MatchingEngineConfig {
    fn default() -> Self {
        Self {
            result_limit: MAX_RESULTS,
            jitter: JitterMode::Random,
        }
    }
}

impl MatchingEngineConfig {
    /// `TM_RESULT_LIMIT` / `TM_BANDING_SEED` / `TM_BANDING_JITTER` を読む
    pub fn from_env() -> Self {
        let result_limit = std::env::var("TM_RESULT_LIMIT")
            .ok()
            .and_then(|raw| raw.parse::<usize>().ok())
            .unwrap_or(MAX_RESULTS)
            .clamp(1, MAX_RESULTS);

        let jitter_enabled = std::env::var("TM_BANDING_JITTER")
            .map(|value| !(value == "0" || value.eq_ignore_ascii_case("false")))
            .unwrap_or(true);

        let seed = std::env::var("TM_BANDING_SEED")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok());

        let jitter = match (jitter_enabled, seed) {
            (false, _) => JitterMode::Disabled,
            (true, Some(seed)) => JitterMode::Seeded(seed),
            (true, None) => JitterMode::Random,
        };

        Self {
            result_limit,
            jitter,
        }
    }
}

pub struct MatchingEngine {
    config: MatchingEngineConfig,
    bander: ScoreBander,
}

impl MatchingEngine {
    pub fn new(config: MatchingEngineConfig) -> Self {
        let config = MatchingEngineConfig {
            result_limit: config.result_limit.clamp(1, MAX_RESULTS),
            ..config
        };
        let bander = ScoreBander::new(config.jitter);
        Self { config, bander }
    }

    pub fn from_env() -> Self {
        Self::new(MatchingEngineConfig::from_env())
    }

    pub fn config(&self) -> &MatchingEngineConfig {
        &self.config
    }

    /// Stage 0〜5 を順に実行する
    ///
    /// 参照データは読むだけで、ブリーフ解決済みであればこの関数は失敗しない。
    /// データ不足や無効な推奨タレントは notices に積み、結果を短くして返す。
    #[instrument(skip_all, fields(industry = %brief.industry, segment_id = brief.segment_id))]
    pub fn run<R>(&self, brief: &ResolvedBrief, reference: &R, evaluation_date: NaiveDate) -> MatchRun
    where
        R: ReferenceData + ?Sized,
    {
        let run_id = run_id::generate();
        let limit = self.config.result_limit;
        let mut notices = Vec::new();

        // Stage 0
        let rules = EligibilityRules::for_brief(brief, evaluation_date);
        let candidates = reference.candidates();
        let pool_ids: Vec<CandidateId> = filter_eligible(candidates, &rules)
            .iter()
            .map(|candidate| candidate.id)
            .collect();
        debug!(
            run_id = %run_id,
            candidates = candidates.len(),
            eligible = pool_ids.len(),
            "stage0_eligibility"
        );
        if pool_ids.is_empty() {
            warn!(run_id = %run_id, "eligible pool is empty");
            notices.push(PipelineNotice::DataUnavailable {
                stage: "eligibility",
                detail: format!("0 of {} candidates passed eligibility", candidates.len()),
            });
        }

        // Stage 1
        let signals = reference.base_signals(brief.segment_id);
        let base_rows = base_score_rows(&signals, &pool_ids);
        debug!(run_id = %run_id, signal_rows = signals.len(), base_rows = base_rows.len(), "stage1_base_score");

        // Stage 2
        let population = reference.population_scores(brief.segment_id, &brief.fit_attribute_ids);
        if population.is_empty() && !pool_ids.is_empty() {
            warn!(run_id = %run_id, attributes = ?brief.fit_attribute_ids, "fit population is empty");
            notices.push(PipelineNotice::DataUnavailable {
                stage: "fit_adjustment",
                detail: format!(
                    "no recorded fit scores for segment {} attributes {:?}",
                    brief.segment_id, brief.fit_attribute_ids
                ),
            });
        }
        let fits = compute_fit_adjustments(&population, &brief.fit_attribute_ids);
        debug!(run_id = %run_id, population_rows = population.len(), "stage2_fit_adjustment");

        // Stage 3-4
        let ranked = select_top(combine(&base_rows, &fits), limit);
        debug!(run_id = %run_id, ranked = ranked.len(), "stage4_rank_select");

        // Stage 5a
        let picks = reference.picks_for_industry(&brief.industry);
        let curated = resolve_curated(
            &picks,
            |id| reference.find_candidate(id).is_some(),
            &best_base_scores(&signals),
        );
        for candidate_id in &curated.invalid {
            warn!(run_id = %run_id, candidate_id, "curated pick no longer resolves; skipped");
            notices.push(PipelineNotice::CuratedPickInvalid {
                candidate_id: *candidate_id,
            });
        }
        let overlay = apply_curated_overlay(&curated.valid, ranked, limit);

        let result_ids: Vec<CandidateId> =
            overlay.iter().map(|entry| entry.scored.candidate_id).collect();
        let conflicted = ConflictAnnotator::new(&brief.competing_codes, evaluation_date)
            .conflicted(reference, &result_ids);

        // Stage 5b
        let results: Vec<RankedResult> = overlay
            .into_iter()
            .map(|entry| {
                let candidate_id = entry.scored.candidate_id;
                let candidate = reference.find_candidate(candidate_id);
                RankedResult {
                    candidate_id,
                    rank: entry.rank,
                    name: candidate.map(|c| c.name.clone()).unwrap_or_default(),
                    category: candidate.and_then(|c| c.category.clone()),
                    base_score: entry.scored.base_score,
                    fit_adjustment: entry.scored.fit_adjustment,
                    combined_score: entry.scored.combined_score,
                    display_score: self.bander.display_score(entry.rank, candidate_id),
                    is_curated: entry.is_curated(),
                    recommended_type: entry.recommended_type,
                    has_active_conflict: conflicted.contains(&candidate_id),
                }
            })
            .collect();

        let stats = RunStats {
            candidate_pool: candidates.len(),
            eligible_pool: pool_ids.len(),
            fit_population: population.len(),
            curated_valid: curated.valid.len(),
            curated_invalid: curated.invalid.len(),
        };

        info!(
            run_id = %run_id,
            results = results.len(),
            eligible = stats.eligible_pool,
            curated = stats.curated_valid,
            conflicts = conflicted.len(),
            notices = notices.len(),
            "match run completed"
        );

        MatchRun {
            run_id,
            evaluation_date,
            results,
            notices,
            stats,
        }
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new(MatchingEngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        BaseSignal, Candidate, CuratedPick, Engagement, FitScore,
        brief::{BriefResolver, CampaignBrief},
        matching::{RecommendedType, banding::band_for_rank},
        repository::ReferenceSnapshot,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn resolve(industry: &str, segment: &str, budget: &str) -> ResolvedBrief {
        BriefResolver::builtin()
            .resolve(&CampaignBrief {
                industry: industry.into(),
                segment_label: segment.into(),
                budget_label: budget.into(),
                purpose: None,
            })
            .unwrap()
    }

    fn engine(jitter: JitterMode) -> MatchingEngine {
        MatchingEngine::new(MatchingEngineConfig {
            result_limit: MAX_RESULTS,
            jitter,
        })
    }

    fn candidate(id: CandidateId, fee_max: Option<i64>) -> Candidate {
        Candidate {
            id,
            name: format!("タレント{id}"),
            category: Some("俳優".into()),
            fee_max,
            ..Candidate::default()
        }
    }

    fn signal(candidate_id: CandidateId, segment_id: i32, value: f64) -> BaseSignal {
        BaseSignal {
            candidate_id,
            segment_id,
            popularity: Some(value),
            power: Some(value),
        }
    }

    fn fit(candidate_id: CandidateId, segment_id: i32, attribute_id: i32, score: f64) -> FitScore {
        FitScore {
            candidate_id,
            segment_id,
            attribute_id,
            score: Some(score),
        }
    }

    fn pick(industry: &str, priority: i32, candidate_id: CandidateId) -> CuratedPick {
        CuratedPick {
            industry: industry.into(),
            priority,
            candidate_id,
        }
    }

    /// 食品 / 女性20〜34歳(6) / 〜3,000万円
    ///
    /// - 1..=50: 予算内、基礎スコア 100 - id
    /// - 60..=65: 予算超過
    /// - 201: 予算超過の推奨タレント、202: 出演料不明の推奨タレント
    /// - 2 は競合カテゴリ(seasoning)契約中、3 は food 契約中（競合外）
    fn food_snapshot() -> ReferenceSnapshot {
        let mut candidates: Vec<Candidate> = (1..=50).map(|id| candidate(id, Some(10_000_000))).collect();
        candidates.extend((60..=65).map(|id| candidate(id, Some(50_000_000))));
        candidates.push(candidate(201, Some(80_000_000)));
        candidates.push(candidate(202, None));

        candidates[1].engagements.push(Engagement {
            category_code: "seasoning".into(),
            end_date: NaiveDate::from_ymd_opt(2027, 3, 31).unwrap(),
        });
        candidates[2].engagements.push(Engagement {
            category_code: "food".into(),
            end_date: NaiveDate::from_ymd_opt(2027, 3, 31).unwrap(),
        });

        let mut signals: Vec<BaseSignal> = (1..=50).map(|id| signal(id, 6, 100.0 - id as f64)).collect();
        signals.extend((60..=65).map(|id| signal(id, 6, 99.0)));
        signals.push(signal(201, 6, 30.0));
        signals.push(signal(201, 1, 90.0));

        let mut fit_scores = Vec::new();
        for attribute_id in 1..=7 {
            fit_scores.extend((1..=50).map(|id| fit(id, 6, attribute_id, 100.0 - id as f64)));
        }

        ReferenceSnapshot::new(
            candidates,
            signals,
            fit_scores,
            vec![pick("食品", 1, 201), pick("食品", 2, 5), pick("食品", 3, 202)],
        )
    }

    fn assert_invariants(run: &MatchRun, pool: &HashSet<CandidateId>) {
        let results = &run.results;
        assert!(results.len() <= MAX_RESULTS);

        let ranks: Vec<u32> = results.iter().map(|r| r.rank).collect();
        let expected: Vec<u32> = (1..=results.len() as u32).collect();
        assert_eq!(ranks, expected);

        let ids: HashSet<CandidateId> = results.iter().map(|r| r.candidate_id).collect();
        assert_eq!(ids.len(), results.len());

        assert!(
            results
                .windows(2)
                .all(|w| w[0].display_score >= w[1].display_score)
        );

        for result in results {
            if !result.is_curated {
                assert!(pool.contains(&result.candidate_id));
            }
            let band = band_for_rank(result.rank).unwrap();
            assert!(result.display_score >= band.min_score);
            assert!(result.display_score <= band.max_score);
        }

        let curated_count = results.iter().filter(|r| r.is_curated).count();
        assert!(results[..curated_count].iter().all(|r| r.is_curated));
    }

    #[test]
    fn curated_picks_take_top_ranks_and_duplicate_is_removed() {
        let snapshot = food_snapshot();
        let brief = resolve("食品", "女性20〜34歳", "〜3,000万円");
        let run = engine(JitterMode::Random).run(&brief, &snapshot, today());

        let pool: HashSet<CandidateId> = (1..=50).collect();
        assert_invariants(&run, &pool);
        assert_eq!(run.results.len(), 30);

        let top: Vec<_> = run.results[..3].iter().map(|r| r.candidate_id).collect();
        assert_eq!(top, vec![201, 5, 202]);
        assert!(run.results[..3].iter().all(|r| r.recommended_type == RecommendedType::Curated));

        let standard = &run.results[3..];
        assert_eq!(standard.len(), 27);
        assert!(standard.iter().all(|r| r.recommended_type == RecommendedType::Standard));
        assert!(standard.iter().all(|r| r.candidate_id != 5));
        assert_eq!(standard[0].candidate_id, 1);
        assert_eq!(standard[0].rank, 4);
        // 1..=50 と料金データのない 202
        assert_eq!(run.stats.eligible_pool, 51);
    }

    #[test]
    fn curated_scores_use_segment_signals_and_zero_fit() {
        let snapshot = food_snapshot();
        let brief = resolve("食品", "女性20〜34歳", "〜3,000万円");
        let run = engine(JitterMode::Disabled).run(&brief, &snapshot, today());

        let outsider = &run.results[0];
        assert_eq!(outsider.candidate_id, 201);
        assert_eq!(outsider.base_score, 30.0);
        assert_eq!(outsider.fit_adjustment, 0.0);
        assert_eq!(outsider.combined_score, 30.0);

        let no_signal = &run.results[2];
        assert_eq!(no_signal.candidate_id, 202);
        assert_eq!(no_signal.base_score, 0.0);

        let duplicate = &run.results[1];
        assert_eq!(duplicate.base_score, 95.0);
        assert_eq!(duplicate.fit_adjustment, 0.0);
    }

    #[test]
    fn base_score_is_independent_of_fit_adjustment() {
        let snapshot = food_snapshot();
        let brief = resolve("食品", "女性20〜34歳", "〜3,000万円");
        let run = engine(JitterMode::Disabled).run(&brief, &snapshot, today());

        for result in run.results.iter().filter(|r| !r.is_curated) {
            assert_eq!(result.base_score, 100.0 - result.candidate_id as f64);
            assert_eq!(result.combined_score, result.base_score + result.fit_adjustment);
        }
        // 50人中 1位 = 0.02 → 全7項目 +12
        assert_eq!(run.results[3].fit_adjustment, 12.0);
    }

    #[test]
    fn flags_competing_engagements_for_food_industry_only() {
        let snapshot = food_snapshot();
        let food = engine(JitterMode::Disabled).run(
            &resolve("食品", "女性20〜34歳", "〜3,000万円"),
            &snapshot,
            today(),
        );

        let flagged: Vec<_> = food
            .results
            .iter()
            .filter(|r| r.has_active_conflict)
            .map(|r| r.candidate_id)
            .collect();
        assert_eq!(flagged, vec![2]);

        let cars = engine(JitterMode::Disabled).run(
            &resolve("自動車", "女性20〜34歳", "〜3,000万円"),
            &snapshot,
            today(),
        );
        assert!(cars.results.iter().all(|r| !r.has_active_conflict));
    }

    #[test]
    fn feeless_candidate_passes_with_unlimited_budget() {
        let snapshot = ReferenceSnapshot::new(
            vec![candidate(1, None), candidate(2, Some(900_000_000))],
            vec![signal(1, 0, 10.0), signal(2, 0, 20.0)],
            vec![],
            vec![],
        );
        let brief = resolve("自動車", "全体", "1億円以上");
        let run = engine(JitterMode::Disabled).run(&brief, &snapshot, today());

        let ids: Vec<_> = run.results.iter().map(|r| r.candidate_id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(
            run.results
                .iter()
                .all(|r| r.recommended_type == RecommendedType::AutoSupplement)
        );
    }

    #[test]
    fn alcohol_brief_keeps_unknown_birth_date() {
        let mut unknown = candidate(1, Some(1_000_000));
        unknown.birth_date = None;
        let mut young = candidate(2, Some(1_000_000));
        young.birth_date = NaiveDate::from_ymd_opt(2004, 5, 1);
        let mut adult = candidate(3, Some(1_000_000));
        adult.birth_date = NaiveDate::from_ymd_opt(1990, 5, 1);

        let snapshot = ReferenceSnapshot::new(vec![unknown, young, adult], vec![], vec![], vec![]);
        let brief = resolve("アルコール飲料", "男性35〜49歳", "〜500万円");
        let run = engine(JitterMode::Disabled).run(&brief, &snapshot, today());

        let ids: HashSet<_> = run.results.iter().map(|r| r.candidate_id).collect();
        assert_eq!(ids, HashSet::from([1, 3]));
    }

    #[test]
    fn combined_ties_break_on_base_then_id() {
        // 金融は信頼感(2)のみ。20人の母集団で 3 は 0.15 → +12、4 は 0.20 → +6
        let mut candidates: Vec<Candidate> = (1..=20).map(|id| candidate(id, None)).collect();
        candidates.push(candidate(30, None));
        candidates.push(candidate(31, None));

        let signals = vec![
            signal(3, 0, 50.0),
            signal(4, 0, 56.0),
            signal(30, 0, 40.0),
            signal(31, 0, 40.0),
        ];
        let fit_scores = (1..=20).map(|id| fit(id, 0, 2, 100.0 - id as f64)).collect();

        let snapshot = ReferenceSnapshot::new(candidates, signals, fit_scores, vec![]);
        let brief = resolve("金融", "全体", "〜500万円");

        let first = engine(JitterMode::Disabled).run(&brief, &snapshot, today());
        let ids: Vec<_> = first.results.iter().take(6).map(|r| r.candidate_id).collect();
        assert_eq!(ids, vec![4, 3, 30, 31, 1, 2]);
        assert_eq!(first.results[0].combined_score, first.results[1].combined_score);

        let second = engine(JitterMode::Disabled).run(&brief, &snapshot, today());
        assert_eq!(first.results, second.results);
    }

    #[test]
    fn fit_population_is_not_limited_to_eligible_pool() {
        let mut candidates = vec![candidate(1, Some(1_000_000)), candidate(2, Some(1_000_000))];
        candidates.extend((3..=10).map(|id| candidate(id, Some(500_000_000))));

        let mut fit_scores = vec![fit(1, 0, 2, 50.0), fit(2, 0, 2, 40.0)];
        fit_scores.extend((3..=10).map(|id| fit(id, 0, 2, 90.0)));

        let snapshot = ReferenceSnapshot::new(candidates, vec![], fit_scores, vec![]);
        let brief = resolve("金融", "全体", "〜500万円");
        let run = engine(JitterMode::Disabled).run(&brief, &snapshot, today());

        assert_eq!(run.results.len(), 2);
        // 母集団10人中 9位 = 0.9 → -12（プール2人だけなら +3 になってしまう）
        assert_eq!(run.results[0].candidate_id, 1);
        assert_eq!(run.results[0].fit_adjustment, -12.0);
    }

    #[test]
    fn repeated_runs_assign_identical_ranks() {
        let snapshot = food_snapshot();
        let brief = resolve("食品", "女性20〜34歳", "〜3,000万円");
        let engine = engine(JitterMode::Random);

        let first = engine.run(&brief, &snapshot, today());
        let second = engine.run(&brief, &snapshot, today());

        let placement = |run: &MatchRun| -> Vec<(u32, CandidateId, RecommendedType)> {
            run.results
                .iter()
                .map(|r| (r.rank, r.candidate_id, r.recommended_type))
                .collect()
        };
        assert_eq!(placement(&first), placement(&second));
        assert_ne!(first.run_id, second.run_id);

        let pool: HashSet<CandidateId> = (1..=50).collect();
        assert_invariants(&second, &pool);
    }

    #[test]
    fn empty_pool_degrades_to_curated_only() {
        let snapshot = ReferenceSnapshot::new(
            vec![candidate(1, Some(90_000_000))],
            vec![],
            vec![],
            vec![pick("食品", 1, 1), pick("食品", 2, 404)],
        );
        let brief = resolve("食品", "女性20〜34歳", "〜500万円");
        let run = engine(JitterMode::Disabled).run(&brief, &snapshot, today());

        assert_eq!(run.results.len(), 1);
        assert!(run.results[0].is_curated);
        assert!(run.notices.contains(&PipelineNotice::CuratedPickInvalid { candidate_id: 404 }));
        assert!(run.notices.iter().any(|n| matches!(
            n,
            PipelineNotice::DataUnavailable {
                stage: "eligibility",
                ..
            }
        )));
    }

    #[test]
    fn nothing_to_rank_returns_empty_list() {
        let snapshot = ReferenceSnapshot::default();
        let brief = resolve("通信", "全体", "1億円以上");
        let run = engine(JitterMode::Random).run(&brief, &snapshot, today());
        assert!(run.results.is_empty());
        assert_eq!(run.stats, RunStats::default());
    }

    #[test]
    fn result_limit_is_clamped() {
        let engine = MatchingEngine::new(MatchingEngineConfig {
            result_limit: 100,
            jitter: JitterMode::Disabled,
        });
        assert_eq!(engine.config().result_limit, MAX_RESULTS);

        let snapshot = food_snapshot();
        let brief = resolve("食品", "女性20〜34歳", "〜3,000万円");
        let small = MatchingEngine::new(MatchingEngineConfig {
            result_limit: 5,
            jitter: JitterMode::Disabled,
        })
        .run(&brief, &snapshot, today());
        assert_eq!(small.results.len(), 5);
    }
}
