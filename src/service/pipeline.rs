use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::availability::AvailabilityCalendar;
use crate::models::decision::{Decision, DeliveryResult};
use crate::service::decision_engine;
use crate::service::dispatcher::Dispatcher;
use crate::service::extraction::{ExtractionContext, MeetingExtractor, today_in};
use crate::service::timezone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Idle,
    Extracting,
    Normalizing,
    Deciding,
    Dispatching,
    Done,
    Failed,
}

/// One caller request: the email plus the configuration snapshot it is judged against.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub email: String,
    pub timezone: String,
    pub calendar: AvailabilityCalendar,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// When false the pipeline stops at the decision and never contacts the webhook.
    pub dispatch: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { dispatch: true }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub request_id: String,
    pub decision: Decision,
    pub delivery: Option<DeliveryResult>,
    pub states: Vec<PipelineState>,
}

struct StateTrail {
    states: Vec<PipelineState>,
}

impl StateTrail {
    fn new() -> Self {
        Self {
            states: vec![PipelineState::Idle],
        }
    }

    fn enter(&mut self, state: PipelineState) {
        debug!(from = ?self.states.last(), to = ?state, "pipeline transition");
        self.states.push(state);
    }
}

pub struct DecisionPipeline {
    extractor: Arc<dyn MeetingExtractor>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    reference_date: Option<NaiveDate>,
}

impl DecisionPipeline {
    pub fn new(extractor: Arc<dyn MeetingExtractor>) -> Self {
        Self {
            extractor,
            dispatcher: None,
            reference_date: None,
        }
    }

    /// Pins the current date handed to the extractor. Defaults to today in the request's zone.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn dispatcher(&self) -> Option<&Arc<dyn Dispatcher>> {
        self.dispatcher.as_ref()
    }

    pub async fn run(
        &self,
        request: &AnalysisRequest,
        options: PipelineOptions,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.run_with_cancel(request, options, &CancellationToken::new())
            .await
    }

    /// Single pass `Idle -> Extracting -> Normalizing -> Deciding -> (Dispatching) -> Done`.
    ///
    /// Cancellation is honoured up to the dispatch step; once the webhook call starts it runs
    /// to completion.
    pub async fn run_with_cancel(
        &self,
        request: &AnalysisRequest,
        options: PipelineOptions,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("analysis", request_id = %request_id, timezone = %request.timezone);
        self.execute(request_id, request, options, cancel)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        request_id: String,
        request: &AnalysisRequest,
        options: PipelineOptions,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        let mut trail = StateTrail::new();
        info!(email_len = request.email.len(), "analyzing email");

        trail.enter(PipelineState::Extracting);
        let context = ExtractionContext {
            timezone: &request.timezone,
            calendar: &request.calendar,
            today: self
                .reference_date
                .unwrap_or_else(|| today_in(&request.timezone)),
        };
        let extracted = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                trail.enter(PipelineState::Failed);
                return Err(PipelineError::Cancelled("extraction"));
            }
            result = self.extractor.extract(&request.email, &context) => result,
        };

        let event = match extracted {
            Ok(Some(event)) => event,
            Ok(None) => {
                info!("no meeting found");
                return Ok(done(request_id, trail, Decision::NoAction, None));
            }
            Err(err) => {
                warn!(error = %err, "extraction failed, treating as no action");
                return Ok(done(request_id, trail, Decision::NoAction, None));
            }
        };

        trail.enter(PipelineState::Normalizing);
        let instant = match timezone::normalize(&event, &request.timezone) {
            Ok(instant) => instant,
            Err(err) => {
                trail.enter(PipelineState::Failed);
                return Err(err);
            }
        };

        trail.enter(PipelineState::Deciding);
        let decision = decision_engine::decide(Some(&event), Some(&instant), &request.calendar);
        let Decision::Action(payload) = &decision else {
            info!("meeting is within availability");
            return Ok(done(request_id, trail, decision, None));
        };

        if !options.dispatch {
            info!("dispatch disabled, returning draft");
            return Ok(done(request_id, trail, decision, None));
        }
        if cancel.is_cancelled() {
            trail.enter(PipelineState::Failed);
            return Err(PipelineError::Cancelled("dispatch"));
        }

        let Some(dispatcher) = &self.dispatcher else {
            warn!("no dispatch endpoint configured");
            let delivery = DeliveryResult::failed(None, "no dispatch endpoint configured");
            return Ok(done(request_id, trail, decision, Some(delivery)));
        };
        trail.enter(PipelineState::Dispatching);
        let delivery = dispatcher.dispatch(payload).await;
        if !delivery.success {
            warn!(detail = %delivery.status_detail, "delivery failed, decision kept");
        }
        Ok(done(request_id, trail, decision, Some(delivery)))
    }
}

fn done(
    request_id: String,
    mut trail: StateTrail,
    decision: Decision,
    delivery: Option<DeliveryResult>,
) -> PipelineOutcome {
    trail.enter(PipelineState::Done);
    PipelineOutcome {
        request_id,
        decision,
        delivery,
        states: trail.states,
    }
}
