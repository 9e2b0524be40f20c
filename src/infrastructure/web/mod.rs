//! Web server
//!
//! Channel webhooks (Twilio SMS, Twilio Voice, Facebook Messenger), the
//! voice media WebSocket, the dashboard live-feed WebSocket, and the
//! dashboard JSON API. Webhooks acknowledge immediately and process the
//! message in a background task so the channel never waits on the LLM.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Form, Path, Query, State, WebSocketUpgrade},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::application::pipeline::MessagePipeline;
use crate::application::voice::{VoiceSystem, VoiceTurn};
use crate::domain::{BookingStatus, Business, Platform};
use crate::infrastructure::facebook::{self, FacebookClient};
use crate::infrastructure::sms::{InboundSms, SmsClient};
use crate::infrastructure::speech::SpeechClient;
use crate::infrastructure::store::sqlite::start_of_today;
use crate::infrastructure::twiml;
use crate::VERSION;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

// ==================== Error response ====================

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn internal_error(message: &str) -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn not_found(message: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

// ==================== State ====================

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MessagePipeline>,
    pub voice: Arc<VoiceSystem>,
    pub sms: SmsClient,
    pub facebook: FacebookClient,
    pub speech: Option<SpeechClient>,
    /// Public base URL of this service, for the voice media-stream URL
    pub public_base_url: String,
    /// The phone number the dashboard manages (the Twilio number)
    pub business_phone: String,
    pub transfer_number: Option<String>,
}

impl AppState {
    async fn dashboard_business(&self) -> Option<Business> {
        match self
            .pipeline
            .store()
            .get_business_by_phone(&self.business_phone)
            .await
        {
            Ok(business) => business,
            Err(err) => {
                error!(error = %err, "failed to load dashboard business");
                None
            }
        }
    }
}

// ==================== Request types ====================

#[derive(Deserialize)]
pub struct BusinessUpdateRequest {
    pub name: Option<String>,
    pub hours: Option<String>,
    pub address: Option<String>,
    pub services: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct FaqItemRequest {
    pub question: String,
    pub response_en: String,
    pub response_fr: String,
}

#[derive(Deserialize)]
pub struct BookingStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct VoiceWebhookForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "From", default)]
    pub from: String,
    #[serde(rename = "To", default)]
    pub to: String,
}

#[derive(Deserialize)]
pub struct VoiceProcessForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "SpeechResult", default)]
    pub speech_result: String,
}

#[derive(Deserialize)]
pub struct VoiceStatusForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallStatus", default)]
    pub call_status: String,
}

#[derive(Deserialize)]
pub struct LiveFeedQuery {
    #[serde(default = "default_feed_limit")]
    pub limit: i64,
}

fn default_feed_limit() -> i64 {
    10
}

// ==================== Helpers ====================

fn twiml_response(body: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/xml")], body)
}

fn truncate_message(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let shortened: String = text.chars().take(max_chars).collect();
        format!("{}...", shortened)
    }
}

fn conversation_status(escalated: bool) -> &'static str {
    if escalated {
        "Escalated"
    } else {
        "Resolved"
    }
}

// ==================== Service info ====================

async fn service_info() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "comptoir",
        "version": VERSION,
        "status": "running",
    }))
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "active_calls": state.voice.active_calls(),
        "sms_configured": state.sms.is_configured(),
        "facebook_configured": state.facebook.is_configured(),
    }))
}

// ==================== SMS webhook ====================

/// Twilio SMS webhook. The reply is generated and sent in the background;
/// Twilio itself gets an empty 200 right away.
async fn sms_webhook(
    State(state): State<Arc<AppState>>,
    Form(inbound): Form<InboundSms>,
) -> impl IntoResponse {
    if let Err(err) = inbound.validate() {
        warn!(error = %err, "rejected malformed SMS webhook");
        return (StatusCode::BAD_REQUEST, String::new()).into_response();
    }

    info!(to = %inbound.to, "SMS webhook received");

    tokio::spawn(async move {
        process_sms(state, inbound).await;
    });

    (StatusCode::OK, String::new()).into_response()
}

async fn process_sms(state: Arc<AppState>, inbound: InboundSms) {
    let result = state
        .pipeline
        .handle_inbound(&inbound.to, &inbound.from, Platform::Sms, &inbound.body)
        .await;

    let response = match result {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "SMS processing failed");
            return;
        }
    };

    if let Err(err) = state
        .sms
        .send_sms(&inbound.from, &inbound.to, &response.text)
        .await
    {
        error!(error = %err, "failed to deliver SMS reply");
    }

    if response.escalate {
        notify_owner(&state, &inbound.from, &inbound.body).await;
    }
}

/// Text the owner's transfer number when a conversation escalates
async fn notify_owner(state: &Arc<AppState>, customer_phone: &str, message: &str) {
    let Some(owner_number) = &state.transfer_number else {
        warn!("escalation with no transfer number configured");
        return;
    };

    let alert = format!(
        "Customer needs attention ({}): {}",
        crate::infrastructure::sms::mask_phone(customer_phone),
        truncate_message(message, 100)
    );

    if let Err(err) = state
        .sms
        .send_sms(owner_number, &state.business_phone, &alert)
        .await
    {
        error!(error = %err, "failed to notify owner of escalation");
    }
}

// ==================== Facebook webhook ====================

/// Subscription handshake: echo the challenge when the verify token matches
async fn facebook_verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();

    if mode == Some("subscribe") && token.is_some_and(|t| state.facebook.verify_token(t)) {
        info!("Facebook webhook verified");
        challenge.into_response()
    } else {
        (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: "Invalid verification token".to_string(),
            }),
        )
            .into_response()
    }
}

async fn facebook_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let messages = facebook::parse_webhook(&payload);
    info!(count = messages.len(), "Facebook webhook received");

    for message in messages {
        let state = state.clone();
        tokio::spawn(async move {
            let result = state
                .pipeline
                .handle_inbound(
                    &message.recipient_id,
                    &message.sender_id,
                    Platform::Facebook,
                    &message.text,
                )
                .await;

            match result {
                Ok(response) => {
                    if let Err(err) = state
                        .facebook
                        .send_message(&message.sender_id, &response.text)
                        .await
                    {
                        error!(error = %err, "failed to deliver Messenger reply");
                    }
                }
                Err(err) => error!(error = %err, "Messenger processing failed"),
            }
        });
    }

    Json(serde_json::json!({"status": "ok"}))
}

// ==================== Voice webhooks ====================

/// Call pickup: register the call and play the bilingual welcome. With
/// speech services configured the welcome also opens the media stream.
async fn voice_webhook(
    State(state): State<Arc<AppState>>,
    Form(form): Form<VoiceWebhookForm>,
) -> impl IntoResponse {
    info!(call_sid = %form.call_sid, "voice call webhook");
    state.voice.start_call(&form.call_sid, &form.to, &form.from);

    let twiml = if state.speech.is_some() {
        twiml::streaming_welcome_response(&form.call_sid, &state.public_base_url)
    } else {
        twiml::welcome_response()
    };
    twiml_response(twiml)
}

/// Speech gather result: answer, transfer, or apologize
async fn voice_process(
    State(state): State<Arc<AppState>>,
    Form(form): Form<VoiceProcessForm>,
) -> impl IntoResponse {
    let language = state.voice.call_language(&form.call_sid);

    if form.speech_result.trim().is_empty() {
        return twiml_response(twiml::error_response(
            language,
            state.transfer_number.as_deref(),
        ));
    }

    match state
        .voice
        .process_speech(&form.call_sid, &form.speech_result)
        .await
    {
        Ok(VoiceTurn::Reply { text, language }) => {
            twiml_response(twiml::ai_response(&text, language))
        }
        Ok(VoiceTurn::Transfer { language }) => twiml_response(twiml::transfer_response(
            language,
            state.transfer_number.as_deref(),
        )),
        Err(err) => {
            error!(error = %err, call_sid = %form.call_sid, "voice turn failed");
            twiml_response(twiml::error_response(
                language,
                state.transfer_number.as_deref(),
            ))
        }
    }
}

/// Call status callback: persist the transcript once the call completes
async fn voice_status(
    State(state): State<Arc<AppState>>,
    Form(form): Form<VoiceStatusForm>,
) -> impl IntoResponse {
    info!(call_sid = %form.call_sid, status = %form.call_status, "voice status callback");

    if matches!(
        form.call_status.as_str(),
        "completed" | "failed" | "busy" | "no-answer" | "canceled"
    ) {
        state.voice.end_call(&form.call_sid).await;
    }

    StatusCode::OK
}

// ==================== Voice media stream ====================

async fn voice_stream_handler(
    ws: WebSocketUpgrade,
    Path(call_sid): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_voice_stream(socket, call_sid, state))
}

/// Twilio media stream: buffer inbound MULAW frames, recognize roughly a
/// second at a time, and stream the synthesized reply back.
async fn handle_voice_stream(
    mut socket: axum::extract::ws::WebSocket,
    call_sid: String,
    state: Arc<AppState>,
) {
    info!(call_sid = %call_sid, "voice media stream connected");
    let mut stream_sid = String::new();

    while let Some(Ok(msg)) = socket.recv().await {
        let text = match msg {
            axum::extract::ws::Message::Text(text) => text,
            axum::extract::ws::Message::Close(_) => break,
            _ => continue,
        };

        let event: serde_json::Value = match serde_json::from_str(&text) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "unparseable media stream event");
                continue;
            }
        };

        match event.get("event").and_then(|e| e.as_str()) {
            Some("start") => {
                stream_sid = event
                    .pointer("/start/streamSid")
                    .and_then(|s| s.as_str())
                    .unwrap_or_default()
                    .to_string();
            }
            Some("media") => {
                let Some(payload) = event.pointer("/media/payload").and_then(|p| p.as_str())
                else {
                    continue;
                };

                let Some(audio) = state.voice.push_media(&call_sid, payload) else {
                    continue;
                };

                if let Some(reply_audio) = voice_stream_turn(&state, &call_sid, &audio).await {
                    let frame = serde_json::json!({
                        "event": "media",
                        "streamSid": stream_sid,
                        "media": {"payload": BASE64.encode(&reply_audio)},
                    });
                    if socket
                        .send(axum::extract::ws::Message::Text(frame.to_string().into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
            Some("stop") => {
                info!(call_sid = %call_sid, "voice media stream ended");
                state.voice.end_call(&call_sid).await;
                break;
            }
            _ => {}
        }
    }
}

/// One recognized utterance through the pipeline and back to audio
async fn voice_stream_turn(
    state: &Arc<AppState>,
    call_sid: &str,
    audio: &[u8],
) -> Option<Vec<u8>> {
    let speech = state.speech.as_ref()?;

    let transcript = match speech.speech_to_text(audio).await {
        Ok(Some(transcript)) => transcript,
        Ok(None) => return None,
        Err(err) => {
            error!(error = %err, "speech recognition failed");
            return None;
        }
    };

    info!(call_sid, transcript = %transcript, "caller utterance");

    let (text, language) = match state.voice.process_speech(call_sid, &transcript).await {
        Ok(VoiceTurn::Reply { text, language }) => (text, language),
        Ok(VoiceTurn::Transfer { language }) => {
            let announce = match language {
                crate::application::language::Language::French => {
                    "Bien sûr! Je vais vous transférer à quelqu'un qui peut vous aider."
                }
                crate::application::language::Language::English => {
                    "Of course! Let me transfer you to someone who can help."
                }
            };
            (announce.to_string(), language)
        }
        Err(err) => {
            error!(error = %err, "voice stream turn failed");
            return None;
        }
    };

    match speech.text_to_speech(&text, language).await {
        Ok(audio) => Some(audio),
        Err(err) => {
            error!(error = %err, "speech synthesis failed");
            None
        }
    }
}

// ==================== Dashboard feed WebSocket ====================

async fn feed_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_feed_ws(socket, state))
}

async fn handle_feed_ws(mut socket: axum::extract::ws::WebSocket, state: Arc<AppState>) {
    let mut feed = state.pipeline.subscribe_feed();
    info!("dashboard feed connected");

    loop {
        tokio::select! {
            event = feed.recv() => {
                let Ok(event) = event else { break };
                let msg = serde_json::json!({"type": "feed", "data": event});
                if socket
                    .send(axum::extract::ws::Message::Text(msg.to_string().into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(axum::extract::ws::Message::Close(_))) | None => break,
                    Some(Ok(axum::extract::ws::Message::Ping(ping))) => {
                        if socket
                            .send(axum::extract::ws::Message::Pong(ping))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    info!("dashboard feed disconnected");
}

// ==================== Dashboard API ====================

#[derive(Serialize, Default)]
struct MetricsResponse {
    voice_calls_today: i64,
    sms_messages_today: i64,
    ai_success_rate: f64,
    french_percentage: f64,
    total_conversations: i64,
    escalated_conversations: i64,
}

async fn dashboard_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(business) = state.dashboard_business().await else {
        return Json(MetricsResponse::default()).into_response();
    };

    let store = state.pipeline.store();
    let today = start_of_today();

    let metrics = async {
        let voice_calls = store
            .platform_count_since(&business.id, Platform::Voice, today)
            .await?;
        let sms_messages = store
            .platform_count_since(&business.id, Platform::Sms, today)
            .await?;
        let escalated = store.escalated_count_since(&business.id, today).await?;
        let french = store
            .language_count_since(&business.id, "french", today)
            .await?;

        let total = voice_calls + sms_messages;
        let success_rate = if total > 0 {
            (total - escalated) as f64 / total as f64 * 100.0
        } else {
            100.0
        };
        let french_percentage = if total > 0 {
            french as f64 / total as f64 * 100.0
        } else {
            50.0
        };

        crate::errors::Result::Ok(MetricsResponse {
            voice_calls_today: voice_calls,
            sms_messages_today: sms_messages,
            ai_success_rate: (success_rate * 10.0).round() / 10.0,
            french_percentage: (french_percentage * 10.0).round() / 10.0,
            total_conversations: total,
            escalated_conversations: escalated,
        })
    }
    .await;

    match metrics {
        Ok(metrics) => Json(metrics).into_response(),
        Err(err) => {
            error!(error = %err, "metrics query failed");
            Json(MetricsResponse::default()).into_response()
        }
    }
}

async fn dashboard_live_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LiveFeedQuery>,
) -> impl IntoResponse {
    let Some(business) = state.dashboard_business().await else {
        return Json(serde_json::json!({"feed": []}));
    };

    let conversations = state
        .pipeline
        .store()
        .recent_conversations(&business.id, query.limit.clamp(1, 100))
        .await
        .unwrap_or_else(|err| {
            error!(error = %err, "live feed query failed");
            Vec::new()
        });

    let feed: Vec<serde_json::Value> = conversations
        .iter()
        .map(|conv| {
            serde_json::json!({
                "id": format!("conv_{}", conv.id),
                "type": conv.platform.as_str(),
                "customer_phone": conv.masked_customer(),
                "message": truncate_message(&conv.inbound_message, 100),
                "language": conv.language,
                "intent": conv.intent,
                "status": conversation_status(conv.escalated),
                "timestamp": conv.timestamp,
                "escalated": conv.escalated,
            })
        })
        .collect();

    Json(serde_json::json!({"feed": feed}))
}

async fn dashboard_alerts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(business) = state.dashboard_business().await else {
        return Json(serde_json::json!({"alerts": []}));
    };

    let store = state.pipeline.store();
    let mut alerts = Vec::new();

    match store.escalated_count_since(&business.id, start_of_today()).await {
        Ok(count) if count > 0 => {
            alerts.push(serde_json::json!({
                "type": "urgent",
                "title": format!("🚨 {} customers waiting for transfer", count),
                "message": "Review escalated conversations and respond promptly.",
                "action": "review_escalated",
            }));
        }
        Ok(_) => {}
        Err(err) => error!(error = %err, "escalation count query failed"),
    }

    match store.conversation_stats(&business.id, 7).await {
        Ok(stats) if stats.total_conversations > 0 && stats.avg_confidence < 0.7 => {
            alerts.push(serde_json::json!({
                "type": "warning",
                "title": "🤖 AI confidence is low",
                "message": format!(
                    "Average confidence: {:.0}%. Consider updating training data.",
                    stats.avg_confidence * 100.0
                ),
                "action": "train_ai",
            }));
        }
        Ok(_) => {}
        Err(err) => error!(error = %err, "stats query failed"),
    }

    Json(serde_json::json!({"alerts": alerts}))
}

async fn dashboard_business_update(
    State(state): State<Arc<AppState>>,
    Json(update): Json<BusinessUpdateRequest>,
) -> impl IntoResponse {
    let Some(mut business) = state.dashboard_business().await else {
        return not_found("Business not found");
    };

    if let Some(name) = update.name {
        business.name = name;
    }
    if let Some(hours) = update.hours {
        business.hours = hours;
    }
    if let Some(address) = update.address {
        business.address = address;
    }
    if let Some(services) = update.services {
        business.services = services;
    }

    match state.pipeline.store().save_business(&business).await {
        Ok(()) => Json(serde_json::json!({
            "status": "success",
            "message": "Business information updated",
        }))
        .into_response(),
        Err(err) => {
            error!(error = %err, "business update failed");
            internal_error("Failed to update business")
        }
    }
}

async fn dashboard_faq_add(
    State(state): State<Arc<AppState>>,
    Json(faq): Json<FaqItemRequest>,
) -> impl IntoResponse {
    if faq.question.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Question must not be empty".to_string(),
            }),
        )
            .into_response();
    }

    let Some(mut business) = state.dashboard_business().await else {
        return not_found("Business not found");
    };

    business.add_faq(&faq.question, faq.response_en, faq.response_fr);

    match state.pipeline.store().save_business(&business).await {
        Ok(()) => Json(serde_json::json!({
            "status": "success",
            "message": "FAQ added successfully",
        }))
        .into_response(),
        Err(err) => {
            error!(error = %err, "FAQ update failed");
            internal_error("Failed to add FAQ")
        }
    }
}

async fn dashboard_popular_questions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(business) = state.dashboard_business().await else {
        return Json(serde_json::json!({"popular_questions": []}));
    };

    let stats = state
        .pipeline
        .store()
        .intent_statistics(&business.id, 30)
        .await
        .unwrap_or_else(|err| {
            error!(error = %err, "intent statistics query failed");
            HashMap::new()
        });

    let labels: HashMap<&str, &str> = HashMap::from([
        ("booking", "Appointment booking"),
        ("faq", "Business information"),
        ("complaint", "Complaints"),
        ("cancellation", "Cancellations"),
        ("general", "General inquiries"),
        ("voice_call", "Voice calls"),
    ]);

    let total: i64 = stats.values().sum();
    let mut ranked: Vec<(&String, &i64)> = stats.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

    let popular_questions: Vec<serde_json::Value> = ranked
        .into_iter()
        .take(5)
        .map(|(intent, count)| {
            let percentage = if total > 0 {
                *count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            serde_json::json!({
                "question": labels.get(intent.as_str()).copied().unwrap_or(intent.as_str()),
                "count": count,
                "percentage": (percentage * 10.0).round() / 10.0,
            })
        })
        .collect();

    Json(serde_json::json!({"popular_questions": popular_questions}))
}

async fn dashboard_recent_customers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(business) = state.dashboard_business().await else {
        return Json(serde_json::json!({"customers": []}));
    };

    let conversations = state
        .pipeline
        .store()
        .recent_conversations(&business.id, 20)
        .await
        .unwrap_or_else(|err| {
            error!(error = %err, "recent customers query failed");
            Vec::new()
        });

    let customers: Vec<serde_json::Value> = conversations
        .iter()
        .map(|conv| {
            serde_json::json!({
                "phone": conv.masked_customer(),
                "type": conv.platform.as_str(),
                "language": conv.language,
                "intent": conv.intent,
                "status": conversation_status(conv.escalated),
                "time": conv.timestamp,
                "escalated": conv.escalated,
            })
        })
        .collect();

    Json(serde_json::json!({"customers": customers}))
}

async fn dashboard_weekly_performance(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(business) = state.dashboard_business().await else {
        return Json(serde_json::json!({"performance": []}));
    };

    let store = state.pipeline.store();
    let today_start = start_of_today();
    let mut performance = Vec::with_capacity(7);

    for days_ago in (0..7).rev() {
        let day_start = today_start - days_ago * 86_400;
        let day_end = day_start + 86_400;
        let date = Utc::now().date_naive() - Duration::days(days_ago);

        let stats = store
            .day_stats(&business.id, day_start, day_end)
            .await
            .unwrap_or_else(|err| {
                error!(error = %err, "day stats query failed");
                Default::default()
            });

        performance.push(serde_json::json!({
            "date": date.format("%Y-%m-%d").to_string(),
            "day": date.format("%a").to_string(),
            "voice_calls": stats.voice_calls,
            "sms_messages": stats.sms_messages,
            "escalations": stats.escalations,
            "ai_confidence": stats.ai_confidence,
        }));
    }

    Json(serde_json::json!({"performance": performance}))
}

async fn dashboard_bookings(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(business) = state.dashboard_business().await else {
        return Json(serde_json::json!({"bookings": []})).into_response();
    };

    match state
        .pipeline
        .store()
        .bookings_for_business(&business.id, 50)
        .await
    {
        Ok(bookings) => Json(serde_json::json!({"bookings": bookings})).into_response(),
        Err(err) => {
            error!(error = %err, "bookings query failed");
            internal_error("Failed to load bookings")
        }
    }
}

async fn dashboard_booking_status(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<i64>,
    Json(request): Json<BookingStatusRequest>,
) -> impl IntoResponse {
    let status: BookingStatus = match request.status.parse() {
        Ok(status) => status,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: err })).into_response();
        }
    };

    match state
        .pipeline
        .store()
        .update_booking_status(booking_id, status)
        .await
    {
        Ok(()) => Json(serde_json::json!({"status": "success"})).into_response(),
        Err(err) => {
            warn!(error = %err, booking_id, "booking status update failed");
            not_found("Booking not found")
        }
    }
}

/// End-to-end smoke test the owner can trigger from the dashboard
async fn dashboard_test_system(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(business) = state.dashboard_business().await else {
        return not_found("Business not found");
    };

    let response = state
        .pipeline
        .responder()
        .respond("What are your hours?", &business)
        .await;

    Json(serde_json::json!({
        "status": "success",
        "message": "System test completed",
        "ai_response": response.text,
        "ai_confidence": response.confidence,
    }))
    .into_response()
}

// ==================== Router ====================

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
        .route("/webhook/sms", post(sms_webhook))
        .route("/webhook/facebook", get(facebook_verify).post(facebook_webhook))
        .route("/webhook/voice", post(voice_webhook))
        .route("/webhook/voice/process", post(voice_process))
        .route("/webhook/voice/status", post(voice_status))
        .route("/ws/voice/{call_sid}", get(voice_stream_handler))
        .route("/ws/feed", get(feed_ws_handler))
        .route("/api/dashboard/metrics", get(dashboard_metrics))
        .route("/api/dashboard/live-feed", get(dashboard_live_feed))
        .route("/api/dashboard/alerts", get(dashboard_alerts))
        .route("/api/dashboard/business/update", post(dashboard_business_update))
        .route("/api/dashboard/faq/add", post(dashboard_faq_add))
        .route(
            "/api/dashboard/analytics/popular-questions",
            get(dashboard_popular_questions),
        )
        .route("/api/dashboard/customers/recent", get(dashboard_recent_customers))
        .route(
            "/api/dashboard/performance/weekly",
            get(dashboard_weekly_performance),
        )
        .route("/api/dashboard/bookings", get(dashboard_bookings))
        .route(
            "/api/dashboard/bookings/{id}/status",
            post(dashboard_booking_status),
        )
        .route("/api/dashboard/test-system", post(dashboard_test_system))
        .layer(cors)
        .with_state(state)
}

// ==================== Server startup ====================

pub async fn start_web_server(bind_addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Web server started on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short", 100), "short");
        let long = "x".repeat(150);
        let truncated = truncate_message(&long, 100);
        assert_eq!(truncated.chars().count(), 103);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_conversation_status() {
        assert_eq!(conversation_status(true), "Escalated");
        assert_eq!(conversation_status(false), "Resolved");
    }
}
