use axum::{Json, Router, http::StatusCode, routing::post};
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::{ServerConfig, SolverConfig};
use crate::data::{Catalogues, DemandCatalogue, Exam, ExamType, ResourceCatalogue};
use crate::error::SchedulerError;
use crate::ledger::{Ledger, PlacementRequest};
use crate::report::{PlacementCheck, check_placement};
use crate::solver::{self, ScheduleOutcome};
use crate::unscheduled::unscheduled;

type HandlerError = (StatusCode, String);

impl From<SchedulerError> for HandlerError {
    fn from(err: SchedulerError) -> Self {
        let status = match err {
            SchedulerError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, err.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub resources: ResourceCatalogue,
    pub demand: DemandCatalogue,
    #[serde(default)]
    pub ledger: Ledger,
    #[serde(default)]
    pub config: SolverConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnscheduledRequest {
    pub demand: DemandCatalogue,
    #[serde(default)]
    pub ledger: Ledger,
    pub exam_type: Option<ExamType>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnscheduledResponse {
    pub exams: Vec<Exam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub resources: ResourceCatalogue,
    pub demand: DemandCatalogue,
    #[serde(default)]
    pub ledger: Ledger,
    pub placement: PlacementRequest,
}

async fn schedule_handler(
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<ScheduleOutcome>, HandlerError> {
    // the solver is synchronous and may run for a while
    let outcome = tokio::task::spawn_blocking(move || {
        solver::schedule(
            &request.resources,
            &request.demand,
            request.ledger,
            &request.config,
        )
    })
    .await
    .map_err(SchedulerError::from)?
    .map_err(SchedulerError::from)?;
    Ok(Json(outcome))
}

async fn unscheduled_handler(Json(request): Json<UnscheduledRequest>) -> Json<UnscheduledResponse> {
    let exams = unscheduled(&request.demand, &request.ledger, request.exam_type)
        .into_iter()
        .cloned()
        .collect();
    Json(UnscheduledResponse { exams })
}

async fn check_handler(Json(request): Json<CheckRequest>) -> Json<PlacementCheck> {
    let catalogues = Catalogues::new(&request.resources, &request.demand);
    Json(check_placement(catalogues, &request.ledger, &request.placement))
}

pub fn router() -> Router {
    Router::new()
        .route("/v1/exams/schedule", post(schedule_handler))
        .route("/v1/exams/unscheduled", post(unscheduled_handler))
        .route("/v1/exams/check", post(check_handler))
}

pub async fn run_server(config: ServerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, router()).await
}
