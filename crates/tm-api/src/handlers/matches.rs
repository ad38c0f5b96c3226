use std::time::Instant;

use axum::{Json, extract::State};
use chrono::{Local, Utc};
use tracing::info;

use tm_common::{
    api::{MatchRequest, MatchRunResponse},
    matching::MatchRun,
};
use tm_metrics::{MatchOutcome, record_match_run};

use crate::SharedState;
use crate::error::ApiError;

async fn execute(state: &SharedState, request: &MatchRequest) -> Result<MatchRunResponse, ApiError> {
    let brief = state.resolver.resolve(&request.brief())?;
    let evaluation_date = request
        .evaluation_date
        .unwrap_or_else(|| Local::now().date_naive());

    let reference = state.reference.load(&brief, evaluation_date).await?;
    let run: MatchRun = state.engine.run(&brief, reference.as_ref(), evaluation_date);

    info!(
        run_id = %run.run_id,
        industry = %brief.industry,
        segment = %brief.segment_label,
        budget = %brief.budget_label,
        results = run.results.len(),
        "match run served"
    );

    Ok(MatchRunResponse::new(&brief, run, Utc::now()))
}

pub async fn run_match(
    State(state): State<SharedState>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<MatchRunResponse>, ApiError> {
    let started = Instant::now();
    let result = execute(&state, &request).await;

    match &result {
        Ok(response) => {
            let outcome = if response.notices.is_empty() {
                MatchOutcome::Ok
            } else {
                MatchOutcome::Degraded
            };
            record_match_run(
                outcome,
                started.elapsed(),
                response.results.len(),
                response.stats.curated_invalid,
            );
        }
        Err(ApiError::InvalidBrief { .. }) => {
            record_match_run(MatchOutcome::InvalidBrief, started.elapsed(), 0, 0)
        }
        Err(_) => record_match_run(MatchOutcome::ReferenceError, started.elapsed(), 0, 0),
    }

    result.map(Json)
}
