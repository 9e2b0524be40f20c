//! HTTP API integration tests: webhooks and dashboard endpoints against a
//! real server on an ephemeral port, with a canned model in place of the LLM.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use comptoir::application::pipeline::MessagePipeline;
use comptoir::application::responder::{ChatModel, Responder};
use comptoir::application::voice::VoiceSystem;
use comptoir::domain::Business;
use comptoir::infrastructure::store::{SqliteStore, Store};
use comptoir::infrastructure::web::{create_router, AppState};
use comptoir::infrastructure::{FacebookClient, SmsClient, SpeechClient};

struct CannedModel(&'static str);

#[async_trait]
impl ChatModel for CannedModel {
    async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

async fn test_state(reply: &'static str) -> Arc<AppState> {
    test_state_with_speech(reply, None).await
}

async fn test_state_with_speech(
    reply: &'static str,
    speech: Option<SpeechClient>,
) -> Arc<AppState> {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new_in_memory().unwrap());

    let mut business = Business::new("demo_salon_001", "Bella Hair Salon", "+15551234567");
    business.services = vec!["haircut".to_string(), "coloring".to_string()];
    store.save_business(&business).await.unwrap();

    // Same salon reachable through its Facebook page id
    let mut page = Business::new("demo_salon_page", "Bella Hair Salon", "page_123");
    page.services = vec!["haircut".to_string()];
    store.save_business(&page).await.unwrap();

    let responder = Arc::new(Responder::new(Arc::new(CannedModel(reply))));
    let pipeline = Arc::new(MessagePipeline::new(store.clone(), responder.clone()));
    let voice = Arc::new(VoiceSystem::new(store, responder));

    Arc::new(AppState {
        pipeline,
        voice,
        sms: SmsClient::new(None, None),
        facebook: FacebookClient::new(None, "test_verify_token".to_string()),
        speech,
        public_base_url: "https://bridge.example.com".to_string(),
        business_phone: "+15551234567".to_string(),
        transfer_number: Some("+15559990000".to_string()),
    })
}

async fn start_server(state: Arc<AppState>) -> String {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    format!("http://{}", addr)
}

/// Background webhook processing finishes shortly after the 200; poll
/// the store instead of guessing a sleep.
async fn wait_for_conversations(
    store: &Arc<dyn Store>,
    business_id: &str,
    expected: usize,
) -> Vec<comptoir::domain::Conversation> {
    for _ in 0..50 {
        let conversations = store.recent_conversations(business_id, 10).await.unwrap();
        if conversations.len() >= expected {
            return conversations;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("conversation was not logged in time");
}

#[tokio::test]
async fn test_health_check_endpoint() {
    let state = test_state("hi").await;
    let base = start_server(state).await;

    let response = reqwest::get(format!("{}/api/health", base)).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_calls"], 0);
    assert_eq!(body["sms_configured"], false);
}

#[tokio::test]
async fn test_service_info_endpoint() {
    let state = test_state("hi").await;
    let base = start_server(state).await;

    let body: serde_json::Value = reqwest::get(&base).await.unwrap().json().await.unwrap();
    assert_eq!(body["service"], "comptoir");
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn test_sms_webhook_logs_conversation() {
    let state = test_state("We're open Mon-Sat 9am-7pm!").await;
    let store = state.pipeline.store().clone();
    let base = start_server(state).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/webhook/sms", base))
        .form(&[
            ("From", "+15557654321"),
            ("To", "+15551234567"),
            ("Body", "What are your hours?"),
            ("MessageSid", "SM123"),
        ])
        .send()
        .await
        .unwrap();

    // Twilio gets an empty 200 immediately
    assert_eq!(response.status(), 200);
    assert!(response.text().await.unwrap().is_empty());

    let conversations = wait_for_conversations(&store, "demo_salon_001", 1).await;
    assert_eq!(conversations[0].inbound_message, "What are your hours?");
    assert_eq!(conversations[0].outbound_message, "We're open Mon-Sat 9am-7pm!");
}

#[tokio::test]
async fn test_sms_webhook_rejects_malformed() {
    let state = test_state("hi").await;
    let base = start_server(state).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/webhook/sms", base))
        .form(&[
            ("From", "+15557654321"),
            ("To", "+15551234567"),
            ("Body", "no message sid"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_facebook_verification_handshake() {
    let state = test_state("hi").await;
    let base = start_server(state).await;

    let response = reqwest::get(format!(
        "{}/webhook/facebook?hub.mode=subscribe&hub.verify_token=test_verify_token&hub.challenge=challenge_42",
        base
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "challenge_42");

    let response = reqwest::get(format!(
        "{}/webhook/facebook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=challenge_42",
        base
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn test_facebook_webhook_handles_message() {
    let state = test_state("Bonjour! On est ouvert de 9h à 19h.").await;
    let store = state.pipeline.store().clone();
    let base = start_server(state).await;

    let payload = serde_json::json!({
        "object": "page",
        "entry": [{
            "id": "page_123",
            "messaging": [{
                "sender": {"id": "user_456"},
                "recipient": {"id": "page_123"},
                "message": {"mid": "m_789", "text": "Bonjour, vous êtes ouvert aujourd'hui?"}
            }]
        }]
    });

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/webhook/facebook", base))
        .json(&payload)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let conversations = wait_for_conversations(&store, "demo_salon_page", 1).await;
    assert_eq!(conversations[0].customer_phone, "user_456");
}

#[tokio::test]
async fn test_voice_webhook_returns_welcome_twiml() {
    let state = test_state("hi").await;
    let base = start_server(state).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/webhook/voice", base))
        .form(&[
            ("CallSid", "CA123"),
            ("From", "+15557654321"),
            ("To", "+15551234567"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/xml"
    );

    let twiml = response.text().await.unwrap();
    assert!(twiml.contains("Bonjour! Hello!"));
    assert!(twiml.contains("<Gather"));
}

#[tokio::test]
async fn test_voice_webhook_opens_media_stream_when_speech_configured() {
    let state = test_state_with_speech("hi", Some(SpeechClient::new("test-key".to_string()))).await;
    let base = start_server(state).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/webhook/voice", base))
        .form(&[
            ("CallSid", "CA123"),
            ("From", "+15557654321"),
            ("To", "+15551234567"),
        ])
        .send()
        .await
        .unwrap();

    let twiml = response.text().await.unwrap();
    assert!(twiml.contains(
        "<Start><Stream url=\"wss://bridge.example.com/ws/voice/CA123\"/></Start>"
    ));
    assert!(twiml.contains("Bonjour! Hello!"));
}

#[tokio::test]
async fn test_voice_process_speaks_reply() {
    let state = test_state("We're open 9 to 7.").await;
    let base = start_server(state).await;

    let client = reqwest::Client::new();
    client
        .post(format!("{}/webhook/voice", base))
        .form(&[
            ("CallSid", "CA123"),
            ("From", "+15557654321"),
            ("To", "+15551234567"),
        ])
        .send()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/webhook/voice/process", base))
        .form(&[
            ("CallSid", "CA123"),
            (
                "SpeechResult",
                "What are your hours, are you open today, how much does it cost, \
                 is there parking, and what's your address?",
            ),
        ])
        .send()
        .await
        .unwrap();

    let twiml = response.text().await.unwrap();
    assert!(twiml.contains("open 9 to 7"));
    assert!(twiml.contains("Polly.Joanna"));
}

#[tokio::test]
async fn test_voice_transfer_request_dials_out() {
    let state = test_state("unused").await;
    let base = start_server(state).await;

    let client = reqwest::Client::new();
    client
        .post(format!("{}/webhook/voice", base))
        .form(&[
            ("CallSid", "CA456"),
            ("From", "+15557654321"),
            ("To", "+15551234567"),
        ])
        .send()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/webhook/voice/process", base))
        .form(&[
            ("CallSid", "CA456"),
            ("SpeechResult", "I want to talk to a real person"),
        ])
        .send()
        .await
        .unwrap();

    let twiml = response.text().await.unwrap();
    assert!(twiml.contains("<Dial>+15559990000</Dial>"));
}

#[tokio::test]
async fn test_dashboard_metrics_shape() {
    let state = test_state("We're open Mon-Sat 9am-7pm!").await;
    let store = state.pipeline.store().clone();
    let base = start_server(state).await;

    let client = reqwest::Client::new();
    client
        .post(format!("{}/webhook/sms", base))
        .form(&[
            ("From", "+15557654321"),
            ("To", "+15551234567"),
            ("Body", "What are your hours?"),
            ("MessageSid", "SM123"),
        ])
        .send()
        .await
        .unwrap();
    wait_for_conversations(&store, "demo_salon_001", 1).await;

    let metrics: serde_json::Value = client
        .get(format!("{}/api/dashboard/metrics", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(metrics["sms_messages_today"], 1);
    assert_eq!(metrics["voice_calls_today"], 0);
    assert_eq!(metrics["total_conversations"], 1);
    assert_eq!(metrics["ai_success_rate"], 100.0);
}

#[tokio::test]
async fn test_dashboard_metrics_count_today_only() {
    use comptoir::domain::{Conversation, Platform};
    use comptoir::infrastructure::store::sqlite::start_of_today;

    let state = test_state("We're open Mon-Sat 9am-7pm!").await;
    let store = state.pipeline.store().clone();
    let base = start_server(state).await;

    // An escalation from before midnight must not count against today
    let mut old = Conversation::new("demo_salon_001", "+15557654321", Platform::Sms);
    old.escalated = true;
    old.timestamp = start_of_today() - 3_600;
    store.log_conversation(&old).await.unwrap();

    let client = reqwest::Client::new();
    client
        .post(format!("{}/webhook/sms", base))
        .form(&[
            ("From", "+15557654321"),
            ("To", "+15551234567"),
            ("Body", "What are your hours?"),
            ("MessageSid", "SM200"),
        ])
        .send()
        .await
        .unwrap();
    wait_for_conversations(&store, "demo_salon_001", 2).await;

    let metrics: serde_json::Value = client
        .get(format!("{}/api/dashboard/metrics", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(metrics["sms_messages_today"], 1);
    assert_eq!(metrics["escalated_conversations"], 0);
    assert_eq!(metrics["ai_success_rate"], 100.0);
}

#[tokio::test]
async fn test_dashboard_live_feed_masks_phone() {
    let state = test_state("hi there").await;
    let store = state.pipeline.store().clone();
    let base = start_server(state).await;

    let client = reqwest::Client::new();
    client
        .post(format!("{}/webhook/sms", base))
        .form(&[
            ("From", "+15557654321"),
            ("To", "+15551234567"),
            ("Body", "hello"),
            ("MessageSid", "SM124"),
        ])
        .send()
        .await
        .unwrap();
    wait_for_conversations(&store, "demo_salon_001", 1).await;

    let body: serde_json::Value = client
        .get(format!("{}/api/dashboard/live-feed?limit=5", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let feed = body["feed"].as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["customer_phone"], "***4321");
    assert_eq!(feed[0]["type"], "sms");
    assert_eq!(feed[0]["status"], "Resolved");
}

#[tokio::test]
async fn test_dashboard_business_update_and_faq() {
    let state = test_state("hi").await;
    let store = state.pipeline.store().clone();
    let base = start_server(state).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/dashboard/business/update", base))
        .json(&serde_json::json!({"hours": "Tue-Sun 10am-8pm"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .post(format!("{}/api/dashboard/faq/add", base))
        .json(&serde_json::json!({
            "question": "Do you take cards?",
            "response_en": "Yes, all major cards.",
            "response_fr": "Oui, toutes les cartes.",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let business = store
        .get_business_by_phone("+15551234567")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(business.hours, "Tue-Sun 10am-8pm");
    assert!(business.faq.contains_key("do_you_take_cards?"));
}

#[tokio::test]
async fn test_dashboard_faq_rejects_empty_question() {
    let state = test_state("hi").await;
    let base = start_server(state).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/dashboard/faq/add", base))
        .json(&serde_json::json!({
            "question": "  ",
            "response_en": "x",
            "response_fr": "y",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_dashboard_weekly_performance_has_seven_days() {
    let state = test_state("hi").await;
    let base = start_server(state).await;

    let body: serde_json::Value = reqwest::get(format!("{}/api/dashboard/performance/weekly", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let days = body["performance"].as_array().unwrap();
    assert_eq!(days.len(), 7);
    for day in days {
        assert!(day.get("date").is_some());
        assert!(day.get("day").is_some());
        assert!(day.get("voice_calls").is_some());
    }
}

#[tokio::test]
async fn test_dashboard_test_system_runs_pipeline() {
    let state = test_state("We're open Mon-Sat 9am-7pm!").await;
    let base = start_server(state).await;

    let client = reqwest::Client::new();
    let body: serde_json::Value = client
        .post(format!("{}/api/dashboard/test-system", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "success");
    assert_eq!(body["ai_response"], "We're open Mon-Sat 9am-7pm!");
}

#[tokio::test]
async fn test_booking_status_update_unknown_booking() {
    let state = test_state("hi").await;
    let base = start_server(state).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/dashboard/bookings/9999/status", base))
        .json(&serde_json::json!({"status": "confirmed"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .post(format!("{}/api/dashboard/bookings/9999/status", base))
        .json(&serde_json::json!({"status": "nonsense"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}
