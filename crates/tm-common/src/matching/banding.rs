use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::CandidateId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBand {
    pub first_rank: u32,
    pub last_rank: u32,
    pub min_score: f64,
    pub max_score: f64,
}

impl ScoreBand {
    pub fn contains(&self, rank: u32) -> bool {
        (self.first_rank..=self.last_rank).contains(&rank)
    }

    /// 帯内の1順位あたりの幅（帯の上端〜下端を等分）
    pub fn step(&self) -> f64 {
        let slots = self.last_rank - self.first_rank;
        if slots == 0 {
            return 0.0;
        }
        (self.max_score - self.min_score) / slots as f64
    }

    /// ジッター前の基準スコア
    pub fn nominal_score(&self, rank: u32) -> f64 {
        let offset = rank.saturating_sub(self.first_rank) as f64;
        self.max_score - offset * self.step()
    }
}

/// 表示スコア帯（唯一の定義）
pub const SCORE_BANDS: [ScoreBand; 4] = [
    ScoreBand {
        first_rank: 1,
        last_rank: 3,
        min_score: 97.0,
        max_score: 99.7,
    },
    ScoreBand {
        first_rank: 4,
        last_rank: 10,
        min_score: 93.0,
        max_score: 96.9,
    },
    ScoreBand {
        first_rank: 11,
        last_rank: 20,
        min_score: 89.0,
        max_score: 92.9,
    },
    ScoreBand {
        first_rank: 21,
        last_rank: 30,
        min_score: 86.0,
        max_score: 88.9,
    },
];

/// ジッター幅（1順位幅に対する比率）
pub const JITTER_RATIO: f64 = 0.1;

pub fn band_for_rank(rank: u32) -> Option<&'static ScoreBand> {
    SCORE_BANDS.iter().find(|band| band.contains(rank))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterMode {
    Disabled,
    Random,
    /// (seed, candidate_id, rank) から決まる擬似乱数
    Seeded(u64),
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreBander {
    mode: JitterMode,
}

impl ScoreBander {
    pub fn new(mode: JitterMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> JitterMode {
        self.mode
    }

    /// Stage 5b: 順位から表示スコアを決める
    ///
    /// 基準スコア ± 最大 10% 幅のジッターを加えた後に帯の上下限へクランプし、
    /// 小数1桁に丸める。クランプをジッターの後に行うため順位に対して単調非増加になる。
    pub fn display_score(&self, rank: u32, candidate_id: CandidateId) -> f64 {
        let band = match band_for_rank(rank) {
            Some(band) => band,
            None => return SCORE_BANDS[SCORE_BANDS.len() - 1].min_score,
        };

        let bound = band.step() * JITTER_RATIO;
        let jitter = self.jitter(bound, rank, candidate_id);
        let score = (band.nominal_score(rank) + jitter).clamp(band.min_score, band.max_score);
        round_one_decimal(score)
    }

    fn jitter(&self, bound: f64, rank: u32, candidate_id: CandidateId) -> f64 {
        if bound <= 0.0 {
            return 0.0;
        }

        match self.mode {
            JitterMode::Disabled => 0.0,
            JitterMode::Random => rand::thread_rng().gen_range(-bound..=bound),
            JitterMode::Seeded(seed) => {
                StdRng::seed_from_u64(mix_seed(seed, candidate_id, rank)).gen_range(-bound..=bound)
            }
        }
    }
}

impl Default for ScoreBander {
    fn default() -> Self {
        Self::new(JitterMode::Random)
    }
}

fn mix_seed(seed: u64, candidate_id: CandidateId, rank: u32) -> u64 {
    seed ^ (candidate_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ u64::from(rank).rotate_left(32)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(bander: &ScoreBander, ranks: std::ops::RangeInclusive<u32>) -> Vec<f64> {
        ranks.map(|rank| bander.display_score(rank, rank as i64 * 7)).collect()
    }

    #[test]
    fn bands_cover_ranks_one_to_thirty_without_gaps() {
        for rank in 1..=30 {
            assert!(band_for_rank(rank).is_some(), "rank {rank} has no band");
        }
        assert!(band_for_rank(0).is_none());
        assert!(band_for_rank(31).is_none());
        for pair in SCORE_BANDS.windows(2) {
            assert_eq!(pair[0].last_rank + 1, pair[1].first_rank);
            assert!(pair[0].min_score > pair[1].max_score);
        }
    }

    #[test]
    fn without_jitter_band_edges_hit_bounds() {
        let bander = ScoreBander::new(JitterMode::Disabled);
        assert_eq!(bander.display_score(1, 1), 99.7);
        let middle = bander.display_score(2, 1);
        assert!(middle > 97.0 && middle < 99.7);
        assert_eq!(bander.display_score(3, 1), 97.0);
        assert_eq!(bander.display_score(4, 1), 96.9);
        assert_eq!(bander.display_score(10, 1), 93.0);
        assert_eq!(bander.display_score(30, 1), 86.0);
    }

    #[test]
    fn random_jitter_stays_monotonic_and_in_band() {
        let bander = ScoreBander::new(JitterMode::Random);
        for _ in 0..200 {
            let values = scores(&bander, 1..=30);
            assert!(values.windows(2).all(|w| w[0] >= w[1]), "{values:?}");
            for (idx, value) in values.iter().enumerate() {
                let band = band_for_rank(idx as u32 + 1).unwrap();
                assert!(*value >= band.min_score && *value <= band.max_score);
            }
        }
    }

    #[test]
    fn seeded_jitter_is_reproducible() {
        let a = ScoreBander::new(JitterMode::Seeded(42));
        let b = ScoreBander::new(JitterMode::Seeded(42));
        assert_eq!(scores(&a, 1..=30), scores(&b, 1..=30));
        assert!(scores(&a, 1..=30).windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn rounds_to_one_decimal() {
        let bander = ScoreBander::new(JitterMode::Seeded(7));
        for value in scores(&bander, 1..=30) {
            assert!(((value * 10.0).round() - value * 10.0).abs() < 1e-9);
        }
    }
}
