use std::convert::Infallible;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use warp::Filter;
use warp::http::StatusCode;

use crate::config::Settings;
use crate::models::availability::AvailabilityCalendar;
use crate::models::decision::{Decision, DeliveryResult, ReschedulePayload};
use crate::service::pipeline::{AnalysisRequest, DecisionPipeline, PipelineOptions};

#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
    pub email: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub calendar: Option<serde_json::Value>,
    #[serde(default)]
    pub dispatch: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub request_id: String,
    pub decision: Decision,
    pub delivery: Option<DeliveryResult>,
}

/// Shared, read-only state for every request.
pub struct ApiState {
    pub pipeline: DecisionPipeline,
    pub default_timezone: String,
    pub default_calendar: AvailabilityCalendar,
}

impl ApiState {
    pub fn from_settings(settings: &Settings, pipeline: DecisionPipeline) -> Self {
        Self {
            pipeline,
            default_timezone: settings.timezone.clone(),
            default_calendar: settings.calendar.clone(),
        }
    }
}

fn error_reply(status: StatusCode, error: String) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&ErrorMessage { error }), status)
}

pub async fn handle_analyze(
    state: &ApiState,
    body: AnalyzeBody,
) -> Result<AnalyzeResponse, (StatusCode, String)> {
    if body.email.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "email must not be empty".to_string()));
    }
    let calendar = match body.calendar {
        Some(raw) => AvailabilityCalendar::from_json(&raw.to_string())
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
        None => state.default_calendar.clone(),
    };
    let request = AnalysisRequest {
        email: body.email,
        timezone: body
            .timezone
            .unwrap_or_else(|| state.default_timezone.clone()),
        calendar,
    };
    let options = PipelineOptions {
        dispatch: body.dispatch.unwrap_or(true),
    };
    let outcome = state
        .pipeline
        .run(&request, options)
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(AnalyzeResponse {
        request_id: outcome.request_id,
        decision: outcome.decision,
        delivery: outcome.delivery,
    })
}

pub async fn handle_dispatch(
    state: &ApiState,
    payload: ReschedulePayload,
) -> Result<DeliveryResult, (StatusCode, String)> {
    let dispatcher = state.pipeline.dispatcher().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "no dispatch endpoint configured".to_string(),
    ))?;
    Ok(dispatcher.dispatch(&payload).await)
}

async fn analyze_route(
    body: AnalyzeBody,
    state: Arc<ApiState>,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Infallible> {
    Ok(match handle_analyze(&state, body).await {
        Ok(response) => warp::reply::with_status(warp::reply::json(&response), StatusCode::OK),
        Err((status, message)) => error_reply(status, message),
    })
}

async fn dispatch_route(
    payload: ReschedulePayload,
    state: Arc<ApiState>,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Infallible> {
    Ok(match handle_dispatch(&state, payload).await {
        Ok(result) => {
            let status = if result.success {
                StatusCode::OK
            } else {
                StatusCode::BAD_GATEWAY
            };
            warp::reply::with_status(warp::reply::json(&result), status)
        }
        Err((status, message)) => error_reply(status, message),
    })
}

pub fn routes(
    state: Arc<ApiState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let with_state = warp::any().map(move || state.clone());

    let health = warp::get()
        .and(warp::path("health"))
        .and(warp::path::end())
        .map(|| warp::reply::json(&serde_json::json!({"status": "ok"})));

    let analyze = warp::post()
        .and(warp::path("analyze"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with_state.clone())
        .and_then(analyze_route);

    let dispatch = warp::post()
        .and(warp::path("dispatch"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with_state)
        .and_then(dispatch_route);

    health.or(analyze).or(dispatch)
}

pub async fn run_api(settings: Settings) {
    let pipeline = match settings.build_pipeline() {
        Ok(pipeline) => pipeline,
        Err(err) => {
            error!(error = %err, "failed to build analysis pipeline");
            return;
        }
    };
    if pipeline.dispatcher().is_none() {
        info!("WEBHOOK_URL not set, reschedule requests will not be sent");
    }
    let state = Arc::new(ApiState::from_settings(&settings, pipeline));
    info!(addr = %settings.listen_addr, "starting api server");
    warp::serve(routes(state)).run(settings.listen_addr).await;
}
