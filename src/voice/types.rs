use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub message: WebhookMessage,
}

/// Server message posted by the voice platform; only the fields used here are modelled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tool_call_list: Vec<ToolCall>,
    #[serde(default)]
    pub function_call: Option<FunctionCall>,
    #[serde(default)]
    pub call: Option<CallInfo>,
    #[serde(default)]
    pub assistant: Option<AssistantInfo>,
    #[serde(default)]
    pub phone_number: Option<PhoneNumberInfo>,
    #[serde(default)]
    pub customer: Option<CustomerInfo>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ended_reason: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default, alias = "parameters", deserialize_with = "arguments_object")]
    pub arguments: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallInfo {
    pub id: Option<String>,
    pub assistant_id: Option<String>,
    pub phone_number_id: Option<String>,
    pub customer: Option<CustomerInfo>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantInfo {
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhoneNumberInfo {
    pub id: Option<String>,
    pub number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerInfo {
    pub number: Option<String>,
}

/// Arguments arrive either as an object or as a JSON-encoded string.
fn arguments_object<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw {
        Value::String(s) if s.trim().is_empty() => Value::Object(Map::new()),
        Value::String(s) => serde_json::from_str(&s).unwrap_or_else(|_| Value::Object(Map::new())),
        Value::Null => Value::Object(Map::new()),
        other => other,
    })
}

impl WebhookMessage {
    pub fn call_id(&self) -> Option<&str> {
        self.call.as_ref().and_then(|c| c.id.as_deref())
    }

    pub fn assistant_id(&self) -> Option<&str> {
        self.assistant
            .as_ref()
            .and_then(|a| a.id.as_deref())
            .or_else(|| self.call.as_ref().and_then(|c| c.assistant_id.as_deref()))
    }

    pub fn phone_number_id(&self) -> Option<&str> {
        self.phone_number
            .as_ref()
            .and_then(|p| p.id.as_deref())
            .or_else(|| self.call.as_ref().and_then(|c| c.phone_number_id.as_deref()))
    }

    pub fn customer_number(&self) -> Option<&str> {
        self.customer
            .as_ref()
            .and_then(|c| c.number.as_deref())
            .or_else(|| {
                self.call
                    .as_ref()
                    .and_then(|c| c.customer.as_ref())
                    .and_then(|c| c.number.as_deref())
            })
    }

    /// `business_id` from assistant or call metadata.
    pub fn metadata_business_id(&self) -> Option<&str> {
        business_id_in(self.assistant.as_ref().and_then(|a| a.metadata.as_ref()))
            .or_else(|| business_id_in(self.call.as_ref().and_then(|c| c.metadata.as_ref())))
    }
}

fn business_id_in(metadata: Option<&Value>) -> Option<&str> {
    metadata
        .and_then(|m| m.get("business_id"))
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_calls_message() {
        let envelope: WebhookEnvelope = serde_json::from_value(json!({
            "message": {
                "type": "tool-calls",
                "toolCallList": [
                    { "id": "tc_1", "type": "function", "function": { "name": "get_business_info", "arguments": {} } },
                    { "id": "tc_2", "function": { "name": "get_business_availability", "arguments": "{\"date\":\"today\"}" } }
                ],
                "call": { "id": "call_1", "assistantId": "asst_1", "customer": { "number": "+15550102030" } },
                "assistant": { "id": "asst_1", "metadata": { "business_id": "7d9f2a7e-5a6b-4c1e-9f00-000000000001" } }
            }
        }))
        .unwrap();
        let message = envelope.message;
        assert_eq!(message.kind, "tool-calls");
        assert_eq!(message.tool_call_list.len(), 2);
        assert_eq!(message.tool_call_list[1].function.arguments["date"], "today");
        assert_eq!(message.call_id(), Some("call_1"));
        assert_eq!(message.assistant_id(), Some("asst_1"));
        assert_eq!(message.customer_number(), Some("+15550102030"));
        assert_eq!(
            message.metadata_business_id(),
            Some("7d9f2a7e-5a6b-4c1e-9f00-000000000001")
        );
    }

    #[test]
    fn test_legacy_function_call_and_bad_arguments() {
        let envelope: WebhookEnvelope = serde_json::from_value(json!({
            "message": {
                "type": "function-call",
                "functionCall": { "name": "list_business_services", "parameters": "not json" },
                "phoneNumber": { "id": "pn_1" }
            }
        }))
        .unwrap();
        let call = envelope.message.function_call.clone().unwrap();
        assert_eq!(call.name, "list_business_services");
        assert!(call.arguments.as_object().unwrap().is_empty());
        assert_eq!(envelope.message.phone_number_id(), Some("pn_1"));
    }

    #[test]
    fn test_status_update_ignores_unknown_fields() {
        let envelope: WebhookEnvelope = serde_json::from_value(json!({
            "message": { "type": "status-update", "status": "in-progress", "timestamp": 1717400000 }
        }))
        .unwrap();
        assert_eq!(envelope.message.status.as_deref(), Some("in-progress"));
        assert!(envelope.message.tool_call_list.is_empty());
    }
}
