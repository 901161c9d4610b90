use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meetingGuard::error::BackendError;
use meetingGuard::models::availability::AvailabilityCalendar;
use meetingGuard::models::decision::Decision;
use meetingGuard::service::dispatcher::WebhookDispatcher;
use meetingGuard::service::extraction::OpenAIExtractor;
use meetingGuard::service::openai_service::OpenAIClient;
use meetingGuard::service::pipeline::{
    AnalysisRequest, DecisionPipeline, PipelineOptions, PipelineState,
};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct FakeOpenAI {
    response: Result<String, String>,
}

#[async_trait]
impl OpenAIClient for FakeOpenAI {
    async fn generate_prompt(
        &self,
        _prompt: &str,
        _prompt_type: &str,
    ) -> Result<String, BackendError> {
        match &self.response {
            Ok(body) => Ok(body.clone()),
            Err(err) => Err(BackendError::Network(err.clone())),
        }
    }
}

const EMAIL: &str = "From: Alice <a@b.com>\nSubject: Sync\n\nCan we sync on Tuesday at 6:30pm Eastern?";

fn pipeline_for(response: Result<&str, &str>, webhook: &MockServer) -> DecisionPipeline {
    let openai = Arc::new(FakeOpenAI {
        response: response.map(str::to_string).map_err(str::to_string),
    });
    DecisionPipeline::new(Arc::new(OpenAIExtractor::new(openai))).with_dispatcher(Arc::new(
        WebhookDispatcher::new(
            format!("{}/webhook/send-mail", webhook.uri()),
            Duration::from_secs(5),
        ),
    ))
}

fn request() -> AnalysisRequest {
    AnalysisRequest {
        email: EMAIL.to_string(),
        timezone: "US/Eastern".to_string(),
        calendar: AvailabilityCalendar::default(),
    }
}

#[tokio::test]
async fn out_of_hours_meeting_is_dispatched_verbatim() {
    let webhook = MockServer::start().await;
    let expected_body = "I noticed you scheduled a meeting outside my working hours. Did you mean to do this? My working hours on Tuesday are 09:00-17:00. Would you like to reschedule?";
    Mock::given(method("POST"))
        .and(path("/webhook/send-mail"))
        .and(body_json(serde_json::json!({
            "email": "a@b.com",
            "subject": "Sync",
            "message": expected_body,
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook)
        .await;

    let pipeline = pipeline_for(
        Ok("Here is the result:\n{\"action\": \"Action\", \"sender\": \"a@b.com\", \"subject\": \"Sync\", \"start\": \"2026-10-20T18:30:00\", \"timezone\": null}\nThanks!"),
        &webhook,
    );
    let outcome = pipeline.run(&request(), PipelineOptions::default()).await.unwrap();

    let payload = outcome.decision.payload().expect("expected an action");
    assert_eq!(payload.sender, "a@b.com");
    assert_eq!(payload.subject, "Sync");
    assert_eq!(payload.body, expected_body);
    assert!(outcome.delivery.expect("delivery attempted").success);
    assert_eq!(outcome.states.last(), Some(&PipelineState::Done));
}

#[tokio::test]
async fn in_hours_meeting_sends_nothing() {
    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&webhook)
        .await;

    let pipeline = pipeline_for(
        Ok("{\"action\": \"Action\", \"sender\": \"a@b.com\", \"subject\": \"Sync\", \"start\": \"2026-10-20T10:00:00-04:00\"}"),
        &webhook,
    );
    let outcome = pipeline.run(&request(), PipelineOptions::default()).await.unwrap();
    assert_eq!(outcome.decision, Decision::NoAction);
    assert!(outcome.delivery.is_none());
}

#[tokio::test]
async fn malformed_backend_replies_degrade_to_no_action() {
    let replies = [
        "I could not find a meeting.",
        "{\"action\": ",
        "{\"verdict\": \"Action\"}",
        "{\"action\": \"Reschedule\"}",
        "{\"action\": \"Action\", \"sender\": \"a@b.com\"}",
        "{\"action\": \"Action\", \"sender\": \"a@b.com\", \"subject\": \"Sync\", \"start\": \"soon\"}",
        "",
    ];
    for reply in replies {
        let webhook = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&webhook)
            .await;

        let outcome = pipeline_for(Ok(reply), &webhook)
            .run(&request(), PipelineOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.decision, Decision::NoAction, "reply {:?}", reply);
    }
}

#[tokio::test]
async fn backend_failure_degrades_to_no_action() {
    let webhook = MockServer::start().await;
    let outcome = pipeline_for(Err("connection reset"), &webhook)
        .run(&request(), PipelineOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.decision, Decision::NoAction);
    assert!(outcome.delivery.is_none());
}

#[tokio::test]
async fn webhook_failure_keeps_the_decision() {
    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("smtp down"))
        .expect(1)
        .mount(&webhook)
        .await;

    let pipeline = pipeline_for(
        Ok("{\"action\": \"Action\", \"sender\": \"a@b.com\", \"subject\": \"Sync\", \"start\": \"2026-10-24T11:00:00\"}"),
        &webhook,
    );
    let outcome = pipeline.run(&request(), PipelineOptions::default()).await.unwrap();

    let payload = outcome.decision.payload().expect("decision survives delivery failure");
    assert!(payload.body.contains("not available on Saturdays"));
    let delivery = outcome.delivery.expect("delivery attempted");
    assert!(!delivery.success);
    assert_eq!(delivery.status_code, Some(500));
    assert!(delivery.status_detail.contains("smtp down"));
}

#[tokio::test]
async fn zoned_meeting_is_judged_in_user_zone() {
    let webhook = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&webhook)
        .await;

    // 08:00 in London is 03:00 Eastern on a Tuesday
    let pipeline = pipeline_for(
        Ok("{\"action\": \"Action\", \"sender\": \"a@b.com\", \"subject\": \"Sync\", \"start\": \"2026-10-20T08:00:00+01:00\"}"),
        &webhook,
    );
    let outcome = pipeline
        .run(&request(), PipelineOptions { dispatch: false })
        .await
        .unwrap();
    let payload = outcome.decision.payload().expect("03:00 is outside 09:00-17:00");
    assert!(payload.body.contains("Tuesday"));
}
