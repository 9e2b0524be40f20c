//! TwiML generation
//!
//! Twilio drives a call by POSTing webhooks and executing the TwiML we
//! return. These builders cover the whole call flow: bilingual welcome,
//! AI reply with a speech gather, transfer to a human, and the error path.
//! Amazon Polly voices match the two customer languages (Chantal for
//! Quebec French, Joanna for English).

use crate::application::language::Language;

const PROCESS_ACTION: &str = "/webhook/voice/process";
const HOLD_MUSIC_URL: &str =
    "http://com.twilio.music.classical.s3.amazonaws.com/BusyStrings.wav";

struct VoiceConfig {
    voice: &'static str,
    language: &'static str,
}

fn voice_for(language: Language) -> VoiceConfig {
    match language {
        Language::French => VoiceConfig {
            voice: "Polly.Chantal",
            language: "fr-CA",
        },
        Language::English => VoiceConfig {
            voice: "Polly.Joanna",
            language: "en-CA",
        },
    }
}

/// Escape text for embedding in TwiML
fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn say(out: &mut String, config: &VoiceConfig, text: &str) {
    out.push_str(&format!(
        "<Say voice=\"{}\" language=\"{}\">{}</Say>",
        config.voice,
        config.language,
        escape_xml(text)
    ));
}

fn open_gather(out: &mut String, gather_language: &str) {
    out.push_str(&format!(
        "<Gather input=\"speech\" action=\"{}\" method=\"POST\" \
         speechTimeout=\"auto\" language=\"{}\" enhanced=\"true\">",
        PROCESS_ACTION, gather_language
    ));
}

/// WebSocket URL Twilio should stream call audio to
fn media_stream_url(public_base_url: &str, call_sid: &str) -> String {
    let base = public_base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/ws/voice/{}", base, call_sid)
}

/// Bilingual greeting played on call pickup; gathers speech so the first
/// utterance settles the language.
pub fn welcome_response() -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");
    welcome_body(&mut out);
    out.push_str("</Response>");
    out
}

/// Welcome variant for calls with speech services configured: opens the
/// media-stream WebSocket before greeting, so audio flows both ways for
/// the whole call.
pub fn streaming_welcome_response(call_sid: &str, public_base_url: &str) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");

    out.push_str(&format!(
        "<Start><Stream url=\"{}\"/></Start>",
        escape_xml(&media_stream_url(public_base_url, call_sid))
    ));

    welcome_body(&mut out);
    out.push_str("</Response>");
    out
}

fn welcome_body(out: &mut String) {
    let english = voice_for(Language::English);

    say(
        out,
        &english,
        "Bonjour! Hello! How can I help you today? Comment puis-je vous aider?",
    );

    open_gather(out, "fr-CA,en-CA");
    say(
        out,
        &english,
        "Please speak naturally... Parlez naturellement...",
    );
    out.push_str("</Gather>");

    say(
        out,
        &english,
        "I didn't hear anything. Please call back. Je n'ai rien entendu. Rappellez s'il vous plaît.",
    );
}

/// Speak the AI reply, then gather the next utterance
pub fn ai_response(reply: &str, language: Language) -> String {
    let config = voice_for(language);
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");

    say(&mut out, &config, reply);

    open_gather(&mut out, config.language);
    let followup = match language {
        Language::French => {
            "Avez-vous d'autres questions? Ou dites 'transférer' pour parler à quelqu'un."
        }
        Language::English => {
            "Do you have any other questions? Or say 'transfer' to speak with someone."
        }
    };
    say(&mut out, &config, followup);
    out.push_str("</Gather>");

    let goodbye = match language {
        Language::French => "Merci d'avoir appelé! Au revoir!",
        Language::English => "Thanks for calling! Goodbye!",
    };
    say(&mut out, &config, goodbye);

    out.push_str("</Response>");
    out
}

/// Hand the call to a human: hold music and a dial when a transfer number
/// is configured, a callback promise otherwise.
pub fn transfer_response(language: Language, transfer_number: Option<&str>) -> String {
    let config = voice_for(language);
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");

    let announce = match language {
        Language::French => {
            "Bien sûr! Je vais vous transférer à quelqu'un qui peut vous aider. \
             Un moment s'il vous plaît..."
        }
        Language::English => {
            "Of course! Let me transfer you to someone who can help. Please hold on..."
        }
    };
    say(&mut out, &config, announce);

    out.push_str(&format!("<Play>{}</Play>", HOLD_MUSIC_URL));

    match transfer_number {
        Some(number) => {
            out.push_str(&format!("<Dial>{}</Dial>", escape_xml(number)));
        }
        None => {
            let apology = match language {
                Language::French => {
                    "Désolé, personne n'est disponible en ce moment. \
                     Quelqu'un vous rappellera bientôt. Merci!"
                }
                Language::English => {
                    "Sorry, no one is available right now. \
                     Someone will call you back soon. Thank you!"
                }
            };
            say(&mut out, &config, apology);
        }
    }

    out.push_str("</Response>");
    out
}

/// Apologize for a technical failure and fall through to the transfer flow
pub fn error_response(language: Language, transfer_number: Option<&str>) -> String {
    let config = voice_for(language);
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");

    let apology = match language {
        Language::French => {
            "Désolé, j'ai un petit problème technique. \
             Je vais vous transférer à quelqu'un immédiatement."
        }
        Language::English => {
            "Sorry, I'm having a technical issue. Let me transfer you to someone right away."
        }
    };
    say(&mut out, &config, apology);

    out.push_str("</Response>");

    // Twilio executes verbs in order, so append the transfer document body
    let transfer = transfer_response(language, transfer_number);
    merge_responses(&out, &transfer)
}

fn merge_responses(first: &str, second: &str) -> String {
    let first_body = first
        .trim_start_matches("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>")
        .trim_end_matches("</Response>");
    let second_body = second
        .trim_start_matches("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>")
        .trim_end_matches("</Response>");

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>{}{}</Response>",
        first_body, second_body
    )
}
