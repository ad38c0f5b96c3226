//! Loads the reference slice for a single match run from Postgres.
//!
//! Tables live in the `talent` schema (see `sql/reference_schema.sql`).

use std::collections::HashMap;

use chrono::NaiveDate;
use deadpool_postgres::{Client, PoolError};
use tokio_postgres::{Error as PgError, Row, types::ToSql};
use tracing::{debug, instrument};

use crate::{
    BaseSignal, Candidate, CandidateId, CuratedPick, Engagement, FitScore,
    brief::ResolvedBrief,
    db::{PgPool, util::TimedClientExt},
    repository::ReferenceSnapshot,
};

#[derive(Debug, thiserror::Error)]
pub enum ReferenceFetchError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
}

const CANDIDATES_SQL: &str = "SELECT id, name, category, birth_date, fee_min, fee_max \
     FROM talent.candidates";

const BASE_SIGNALS_SQL: &str = "SELECT candidate_id, segment_id, popularity, power \
     FROM talent.base_signals \
     WHERE segment_id = $1";

const FIT_SCORES_SQL: &str = "SELECT candidate_id, segment_id, attribute_id, score \
     FROM talent.fit_scores \
     WHERE segment_id = $1 AND attribute_id = ANY($2) AND score IS NOT NULL";

const CURATED_PICKS_SQL: &str = "SELECT industry, priority, candidate_id \
     FROM talent.curated_picks \
     WHERE industry = $1 \
     ORDER BY priority ASC";

const ACTIVE_ENGAGEMENTS_SQL: &str = "SELECT candidate_id, category_code, end_date \
     FROM talent.engagements \
     WHERE category_code = ANY($1) AND end_date >= $2";

fn candidate_from_row(row: &Row) -> Result<Candidate, PgError> {
    Ok(Candidate {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        birth_date: row.try_get("birth_date")?,
        fee_min: row.try_get("fee_min")?,
        fee_max: row.try_get("fee_max")?,
        engagements: Vec::new(),
    })
}

fn signal_from_row(row: &Row) -> Result<BaseSignal, PgError> {
    Ok(BaseSignal {
        candidate_id: row.try_get("candidate_id")?,
        segment_id: row.try_get("segment_id")?,
        popularity: row.try_get("popularity")?,
        power: row.try_get("power")?,
    })
}

fn fit_from_row(row: &Row) -> Result<FitScore, PgError> {
    Ok(FitScore {
        candidate_id: row.try_get("candidate_id")?,
        segment_id: row.try_get("segment_id")?,
        attribute_id: row.try_get("attribute_id")?,
        score: row.try_get("score")?,
    })
}

fn pick_from_row(row: &Row) -> Result<CuratedPick, PgError> {
    Ok(CuratedPick {
        industry: row.try_get("industry")?,
        priority: row.try_get("priority")?,
        candidate_id: row.try_get("candidate_id")?,
    })
}

fn engagement_from_row(row: &Row) -> Result<(CandidateId, Engagement), PgError> {
    Ok((
        row.try_get("candidate_id")?,
        Engagement {
            category_code: row.try_get("category_code")?,
            end_date: row.try_get("end_date")?,
        },
    ))
}

fn map_rows<T>(rows: Vec<Row>, f: fn(&Row) -> Result<T, PgError>) -> Result<Vec<T>, PgError> {
    rows.iter().map(f).collect()
}

/// Fetch what one run needs and freeze it into a [`ReferenceSnapshot`].
///
/// The five reads share one connection and run concurrently. Engagements are
/// only read for industries with competing categories, and only those still
/// running on `today`.
#[instrument(skip(pool, brief), fields(industry = %brief.industry, segment_id = brief.segment_id))]
pub async fn load_reference_snapshot(
    pool: &PgPool,
    brief: &ResolvedBrief,
    today: NaiveDate,
) -> Result<ReferenceSnapshot, ReferenceFetchError> {
    let conn = pool.get().await?;
    let client: &Client = &conn;

    let engagements = async {
        if brief.competing_codes.is_empty() {
            return Ok(Vec::new());
        }
        client
            .timed_query_cached(
                ACTIVE_ENGAGEMENTS_SQL,
                &[&brief.competing_codes, &today],
                "reference.active_engagements",
            )
            .await
    };

    let signal_params: [&(dyn ToSql + Sync); 1] = [&brief.segment_id];
    let fit_params: [&(dyn ToSql + Sync); 2] = [&brief.segment_id, &brief.fit_attribute_ids];
    let pick_params: [&(dyn ToSql + Sync); 1] = [&brief.industry];

    let (candidate_rows, signal_rows, fit_rows, pick_rows, engagement_rows) = tokio::try_join!(
        client.timed_query_cached(CANDIDATES_SQL, &[], "reference.candidates"),
        client.timed_query_cached(BASE_SIGNALS_SQL, &signal_params, "reference.base_signals"),
        client.timed_query_cached(
            FIT_SCORES_SQL,
            &fit_params,
            "reference.fit_scores",
        ),
        client.timed_query_cached(CURATED_PICKS_SQL, &pick_params, "reference.curated_picks"),
        engagements,
    )?;

    let mut candidates = map_rows(candidate_rows, candidate_from_row)?;
    let signals = map_rows(signal_rows, signal_from_row)?;
    let fit_scores = map_rows(fit_rows, fit_from_row)?;
    let picks = map_rows(pick_rows, pick_from_row)?;

    let mut engagements_by_candidate: HashMap<CandidateId, Vec<Engagement>> = HashMap::new();
    for (candidate_id, engagement) in map_rows(engagement_rows, engagement_from_row)? {
        engagements_by_candidate
            .entry(candidate_id)
            .or_default()
            .push(engagement);
    }
    for candidate in &mut candidates {
        if let Some(engagements) = engagements_by_candidate.remove(&candidate.id) {
            candidate.engagements = engagements;
        }
    }

    debug!(
        candidates = candidates.len(),
        signals = signals.len(),
        fit_scores = fit_scores.len(),
        picks = picks.len(),
        "reference snapshot loaded"
    );

    Ok(ReferenceSnapshot::new(candidates, signals, fit_scores, picks))
}
