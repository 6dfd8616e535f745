use serde_json::{json, Value};

use super::types::AssistantConfig;
use crate::business::BusinessProfile;
use crate::catalog::Service;
use crate::voice::tool_definitions;

pub fn default_first_message(business_name: &str) -> String {
    format!("Thank you for calling {business_name}! How can I help you today?")
}

/// Receptionist instructions generated from the business profile and its active services.
pub fn build_system_prompt(business: &BusinessProfile, services: &[Service]) -> String {
    let mut prompt = format!(
        "You are the friendly phone receptionist for {name}. You answer questions about the \
         business, check availability and book, reschedule or cancel appointments.\n",
        name = business.name
    );
    if let Some(description) = &business.description {
        prompt.push_str(&format!("\nAbout the business: {description}\n"));
    }
    if let Some(address) = &business.address {
        prompt.push_str(&format!("Address: {address}\n"));
    }
    prompt.push_str(&format!("Timezone: {}\n", business.timezone));

    let active: Vec<&Service> = services.iter().filter(|s| s.is_active).collect();
    if !active.is_empty() {
        prompt.push_str("\nServices offered:\n");
        for service in active {
            prompt.push_str(&format!(
                "- {} ({} minutes, ${})\n",
                service.name, service.duration_minutes, service.price
            ));
        }
    }

    prompt.push_str(
        "\nRules:\n\
         - Always call get_business_availability before offering or booking a time.\n\
         - Before booking, confirm the service, date, time and the caller's name. Ask for an \
           email address if they want a confirmation email.\n\
         - Use get_customer_bookings to find existing appointments before changing them.\n\
         - Never invent times, prices or bookings; only repeat what the tools return.\n\
         - Keep answers short and conversational; this is a phone call.\n",
    );
    prompt
}

/// Assistant definition sent to the voice platform on create and update.
pub fn build_assistant_payload(
    config: &AssistantConfig,
    system_prompt: &str,
    webhook_url: &str,
    webhook_secret: Option<&str>,
) -> Value {
    let mut server = json!({ "url": webhook_url });
    if let Some(secret) = webhook_secret {
        server["secret"] = json!(secret);
    }

    let mut payload = json!({
        "name": config.name,
        "firstMessage": config.first_message,
        "model": {
            "provider": config.model_provider,
            "model": config.model,
            "messages": [{ "role": "system", "content": system_prompt }],
            "tools": tool_definitions(webhook_url, webhook_secret),
        },
        "voice": {
            "provider": config.voice_provider,
            "voiceId": config.voice_id,
        },
        "server": server,
        "serverMessages": ["tool-calls", "status-update", "end-of-call-report"],
        "metadata": { "business_id": config.business_id.to_string() },
    });
    if let Some(end) = &config.end_call_message {
        payload["endCallMessage"] = json!(end);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use std::str::FromStr;
    use uuid::Uuid;

    fn business() -> BusinessProfile {
        BusinessProfile {
            id: Uuid::new_v4(),
            owner_id: None,
            name: "Bella Salon".to_string(),
            email: None,
            phone: None,
            address: Some("1 Main St".to_string()),
            description: None,
            timezone: "UTC".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(name: &str, active: bool) -> Service {
        Service {
            id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            price: BigDecimal::from_str("30.00").unwrap(),
            duration_minutes: 45,
            category: None,
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn config(business_id: Uuid) -> AssistantConfig {
        AssistantConfig {
            id: Uuid::new_v4(),
            business_id,
            name: "Bella Salon".to_string(),
            model_provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            voice_provider: "11labs".to_string(),
            voice_id: "burt".to_string(),
            first_message: default_first_message("Bella Salon"),
            system_prompt: None,
            end_call_message: Some("Goodbye!".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_prompt_lists_only_active_services() {
        let prompt = build_system_prompt(
            &business(),
            &[service("Haircut", true), service("Perm", false)],
        );
        assert!(prompt.contains("Bella Salon"));
        assert!(prompt.contains("- Haircut (45 minutes, $30.00)"));
        assert!(!prompt.contains("Perm"));
        assert!(prompt.contains("Address: 1 Main St"));
    }

    #[test]
    fn test_payload_carries_tools_server_and_metadata() {
        let business_id = Uuid::new_v4();
        let payload = build_assistant_payload(
            &config(business_id),
            "prompt",
            "https://api.example.com/api/vapi/webhook",
            Some("s3cret"),
        );
        assert_eq!(payload["server"]["url"], "https://api.example.com/api/vapi/webhook");
        assert_eq!(payload["server"]["secret"], "s3cret");
        assert_eq!(payload["metadata"]["business_id"], business_id.to_string());
        assert_eq!(payload["model"]["messages"][0]["content"], "prompt");
        assert_eq!(payload["model"]["tools"].as_array().unwrap().len(), 6);
        assert_eq!(payload["endCallMessage"], "Goodbye!");
        assert_eq!(payload["voice"]["voiceId"], "burt");
    }
}
