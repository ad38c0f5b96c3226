use axum::{Json, extract::State};

use tm_common::api::BriefOptions;

use crate::SharedState;

pub async fn options(State(state): State<SharedState>) -> Json<BriefOptions> {
    Json(BriefOptions::from(state.resolver.catalog()))
}
