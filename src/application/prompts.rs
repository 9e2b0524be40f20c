//! Prompt builders
//!
//! Every LLM call in the pipeline goes through one of these. Replies are
//! delivered over SMS first, so each prompt carries the 160 character
//! instruction, and the language of the prompt follows the language
//! detected on the inbound message.

use crate::application::intent::{Intent, MessageIntent};
use crate::application::language::Language;
use crate::domain::Business;

/// Classification prompt for messages the keyword pass could not settle
pub fn classification_prompt(message: &str, business: &Business, language: Language) -> String {
    let services = business.services_line();

    match language {
        Language::French => format!(
            "Classifiez ce message client pour un {kind}:\n\n\
             Message: \"{message}\"\n\n\
             Contexte du commerce:\n\
             - Type: {kind}\n\
             - Services: {services}\n\
             - Heures: {hours}\n\n\
             Classifiez l'intention comme une de:\n\
             1. booking - veut prendre/réserver un rendez-vous ou service\n\
             2. faq - demande sur heures, prix, lieu, services, politiques\n\
             3. complaint - exprime insatisfaction, veut remboursement, escalade\n\
             4. cancellation - veut annuler ou reporter un rendez-vous existant\n\
             5. general - conversation casual, remerciements, ou intention peu claire\n\n\
             Format de réponse (JSON):\n\
             {{\n\
                 \"intent\": \"booking|faq|complaint|cancellation|general\",\n\
                 \"confidence\": 0.0-1.0,\n\
                 \"reason\": \"explication brève\",\n\
                 \"escalate\": true/false\n\
             }}",
            kind = business.kind,
            message = message,
            services = services,
            hours = business.hours,
        ),
        Language::English => format!(
            "Classify this customer message for a {kind}:\n\n\
             Message: \"{message}\"\n\n\
             Business context:\n\
             - Type: {kind}\n\
             - Services: {services}\n\
             - Hours: {hours}\n\n\
             Classify the intent as one of:\n\
             1. booking - wants to schedule/book an appointment or service\n\
             2. faq - asking about hours, pricing, location, services, policies\n\
             3. complaint - expressing dissatisfaction, wants refund, escalation\n\
             4. cancellation - wants to cancel or reschedule existing booking\n\
             5. general - casual conversation, thanks, or unclear intent\n\n\
             Response format (JSON):\n\
             {{\n\
                 \"intent\": \"booking|faq|complaint|cancellation|general\",\n\
                 \"confidence\": 0.0-1.0,\n\
                 \"reason\": \"brief explanation\",\n\
                 \"escalate\": true/false\n\
             }}",
            kind = business.kind,
            message = message,
            services = services,
            hours = business.hours,
        ),
    }
}

/// Reply prompt for a classified message
pub fn reply_prompt(
    message: &str,
    business: &Business,
    intent: &MessageIntent,
    language: Language,
) -> String {
    match language {
        Language::French => french_reply_prompt(message, business, intent),
        Language::English => english_reply_prompt(message, business, intent),
    }
}

fn french_reply_prompt(message: &str, business: &Business, intent: &MessageIntent) -> String {
    match intent.intent {
        Intent::Booking | Intent::Cancellation => format!(
            "Répondre en français à ce client qui veut prendre ou modifier un rendez-vous:\n\n\
             Client: \"{message}\"\n\n\
             Commerce: {name}\n\
             Services: {services}\n\
             Heures: {hours}\n\n\
             Instructions:\n\
             - Répondre en français seulement\n\
             - Être amical et professionnel\n\
             - Si service et heure mentionnés, confirmer\n\
             - Sinon demander quel service et quel moment\n\
             - Garder sous 160 caractères pour SMS\n\n\
             Réponse:",
            message = message,
            name = business.name,
            services = business.services_line(),
            hours = business.hours,
        ),
        Intent::Faq => french_faq_prompt(message, business, intent),
        Intent::Complaint => format!(
            "Répondre avec empathie à cette plainte en français:\n\n\
             Message: \"{message}\"\n\
             Commerce: {name}\n\n\
             Instructions:\n\
             - Répondre en français seulement\n\
             - Être empathique et professionnel\n\
             - S'excuser appropriément\n\
             - Offrir contact direct pour résoudre\n\
             - Garder sous 160 caractères\n\n\
             Réponse:",
            message = message,
            name = business.name,
        ),
        Intent::General => format!(
            "Répondre à ce message client en français:\n\n\
             Message: \"{message}\"\n\
             Commerce: {name}\n\n\
             Instructions:\n\
             - Répondre en français seulement\n\
             - Être amical et professionnel\n\
             - Demander comment aider\n\
             - Garder sous 160 caractères\n\n\
             Réponse:",
            message = message,
            name = business.name,
        ),
    }
}

fn french_faq_prompt(message: &str, business: &Business, intent: &MessageIntent) -> String {
    let question_type = intent
        .entities
        .get("question_type")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    match question_type {
        "hours" => format!(
            "Répondre à cette question sur les heures d'ouverture:\n\n\
             Question: \"{message}\"\n\
             Heures: {hours}\n\n\
             Répondre en français, être clair et utile.\n\
             Garder sous 160 caractères.",
            message = message,
            hours = business.hours,
        ),
        "pricing" => format!(
            "Répondre à cette question sur les prix:\n\n\
             Question: \"{message}\"\n\
             Services et prix: {pricing}\n\n\
             Répondre en français, donner les prix pertinents.\n\
             Garder sous 160 caractères.",
            message = message,
            pricing = pricing_line(business),
        ),
        "location" => format!(
            "Répondre à cette question sur l'adresse:\n\n\
             Question: \"{message}\"\n\
             Adresse: {address}\n\n\
             Répondre en français avec l'adresse et info de stationnement.\n\
             Garder sous 160 caractères.",
            message = message,
            address = business.address,
        ),
        _ => format!(
            "Répondre à cette question en français:\n\n\
             Question: \"{message}\"\n\
             Commerce: {name}\n\
             Adresse: {address}\n\
             Heures: {hours}\n\n\
             Être utile et professionnel en français.\n\
             Garder sous 160 caractères.",
            message = message,
            name = business.name,
            address = business.address,
            hours = business.hours,
        ),
    }
}

fn english_reply_prompt(message: &str, business: &Business, intent: &MessageIntent) -> String {
    match intent.intent {
        Intent::Booking | Intent::Cancellation => format!(
            "Generate a helpful booking response for this customer message:\n\n\
             Customer: \"{message}\"\n\n\
             Business: {name}\n\
             Type: {kind}\n\
             Services: {services}\n\
             Hours: {hours}\n\n\
             Guidelines:\n\
             - Be friendly and professional\n\
             - If they specified a service and time, acknowledge it\n\
             - If they're vague, ask for specific service and preferred time\n\
             - Mention our services if they didn't specify\n\
             - Keep response under 160 characters for SMS\n\
             - Include a call-to-action\n\n\
             Response:",
            message = message,
            name = business.name,
            kind = business.kind,
            services = business.services_line(),
            hours = business.hours,
        ),
        Intent::Faq => format!(
            "Answer this customer question about our business:\n\n\
             Question: \"{message}\"\n\n\
             Business Information:\n\
             Business: {name}\n\
             Type: {kind}\n\
             Address: {address}\n\
             Hours: {hours}\n\
             Services: {services}\n\
             Pricing: {pricing}\n\n\
             Guidelines:\n\
             - Answer directly and helpfully\n\
             - Use the exact information provided\n\
             - If info not available, say \"Please call us for details\"\n\
             - Be friendly but concise\n\
             - Keep under 160 characters\n\n\
             Response:",
            message = message,
            name = business.name,
            kind = business.kind,
            address = business.address,
            hours = business.hours,
            services = business.services_line(),
            pricing = pricing_line(business),
        ),
        Intent::Complaint => format!(
            "Respond empathetically to this customer complaint:\n\n\
             Customer: \"{message}\"\n\
             Business: {name}\n\n\
             Guidelines:\n\
             - Acknowledge their concern genuinely\n\
             - Apologize appropriately\n\
             - Explain next steps clearly\n\
             - Offer direct contact\n\
             - Professional but warm tone\n\
             - Keep under 160 characters\n\n\
             Response:",
            message = message,
            name = business.name,
        ),
        Intent::General => format!(
            "Respond to this customer message professionally:\n\n\
             Customer: \"{message}\"\n\
             Business: {name}\n\n\
             Guidelines:\n\
             - Be friendly and helpful\n\
             - Try to understand what they might need\n\
             - Offer relevant services if appropriate\n\
             - Ask clarifying questions if unclear\n\
             - Keep response brief and engaging\n\
             - Keep under 160 characters\n\n\
             Response:",
            message = message,
            name = business.name,
        ),
    }
}

fn pricing_line(business: &Business) -> String {
    if business.pricing.is_empty() {
        return "Please call us for pricing".to_string();
    }
    let mut entries: Vec<String> = business
        .pricing
        .iter()
        .map(|(service, price)| format!("{} {}", service, price))
        .collect();
    entries.sort();
    entries.join(", ")
}

/// Canned reply when the LLM produced nothing usable
pub fn fallback_reply(language: Language) -> &'static str {
    match language {
        Language::French => "Merci de nous contacter! Comment puis-je vous aider aujourd'hui?",
        Language::English => "Thanks for reaching out! How can I help you today?",
    }
}

/// Canned reply when the LLM call failed outright
pub fn error_reply(language: Language) -> &'static str {
    match language {
        Language::French => {
            "Merci de votre message! Quelqu'un de notre équipe vous contactera bientôt."
        }
        Language::English => {
            "Thanks for your message! Someone from our team will get back to you shortly."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn salon() -> Business {
        let mut business = Business::new("b1", "Bella Hair Salon", "+15551234567");
        business.kind = "hair_salon".to_string();
        business.services = vec!["haircut".to_string(), "coloring".to_string()];
        business.hours = "Mon-Sat 9am-7pm".to_string();
        business.address = "123 rue Principale, Montréal".to_string();
        business.pricing = HashMap::from([("haircut".to_string(), "$45-$65".to_string())]);
        business
    }

    #[test]
    fn test_reply_prompt_carries_sms_limit() {
        let business = salon();
        let intent = MessageIntent::new(Intent::Booking, 0.8);

        let fr = reply_prompt("Je veux un rendez-vous", &business, &intent, Language::French);
        assert!(fr.contains("160 caractères"));
        assert!(fr.contains("Bella Hair Salon"));

        let en = reply_prompt("I want an appointment", &business, &intent, Language::English);
        assert!(en.contains("under 160 characters"));
        assert!(en.contains("haircut, coloring"));
    }

    #[test]
    fn test_french_faq_prompt_follows_question_type() {
        let business = salon();
        let mut intent = MessageIntent::new(Intent::Faq, 0.8);
        intent
            .entities
            .insert("question_type".to_string(), serde_json::json!("pricing"));

        let prompt = reply_prompt("Combien pour une coupe?", &business, &intent, Language::French);
        assert!(prompt.contains("les prix"));
        assert!(prompt.contains("$45-$65"));
    }

    #[test]
    fn test_classification_prompt_lists_intents() {
        let business = salon();
        let prompt = classification_prompt("hmm", &business, Language::English);

        for label in ["booking", "faq", "complaint", "cancellation", "general"] {
            assert!(prompt.contains(label));
        }
    }
}
