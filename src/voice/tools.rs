use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Functions the voice assistant may call during a live call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    GetBusinessInfo,
    ListBusinessServices,
    GetBusinessAvailability,
    BookBusinessService,
    GetCustomerBookings,
    UpdateBooking,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::GetBusinessInfo,
        Tool::ListBusinessServices,
        Tool::GetBusinessAvailability,
        Tool::BookBusinessService,
        Tool::GetCustomerBookings,
        Tool::UpdateBooking,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetBusinessInfo => "get_business_info",
            Self::ListBusinessServices => "list_business_services",
            Self::GetBusinessAvailability => "get_business_availability",
            Self::BookBusinessService => "book_business_service",
            Self::GetCustomerBookings => "get_customer_bookings",
            Self::UpdateBooking => "update_booking",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::GetBusinessInfo => {
                "Get the business name, description, address and contact details."
            }
            Self::ListBusinessServices => {
                "List the services the business offers with duration and price."
            }
            Self::GetBusinessAvailability => {
                "List open appointment times for a service on a date. Call this before offering or booking a time."
            }
            Self::BookBusinessService => {
                "Book an appointment for the caller at an open time returned by get_business_availability."
            }
            Self::GetCustomerBookings => {
                "Find the caller's upcoming bookings by phone number or email."
            }
            Self::UpdateBooking => {
                "Reschedule, cancel or add notes to one of the caller's existing bookings."
            }
        }
    }

    fn parameters(&self) -> Value {
        match self {
            Self::GetBusinessInfo => json!({ "type": "object", "properties": {} }),
            Self::ListBusinessServices => json!({
                "type": "object",
                "properties": {
                    "category": { "type": "string", "description": "Only services in this category" }
                }
            }),
            Self::GetBusinessAvailability => json!({
                "type": "object",
                "properties": {
                    "service": { "type": "string", "description": "Service name or id" },
                    "date": { "type": "string", "description": "YYYY-MM-DD, today, tomorrow or a weekday" }
                },
                "required": ["date"]
            }),
            Self::BookBusinessService => json!({
                "type": "object",
                "properties": {
                    "service": { "type": "string", "description": "Service name or id" },
                    "date": { "type": "string", "description": "YYYY-MM-DD, today, tomorrow or a weekday" },
                    "time": { "type": "string", "description": "Start time, e.g. 14:30 or 2:30 PM" },
                    "customer_name": { "type": "string" },
                    "customer_phone": { "type": "string", "description": "Defaults to the caller's number" },
                    "customer_email": { "type": "string", "description": "For the confirmation email" },
                    "notes": { "type": "string" }
                },
                "required": ["service", "date", "time", "customer_name"]
            }),
            Self::GetCustomerBookings => json!({
                "type": "object",
                "properties": {
                    "customer_phone": { "type": "string", "description": "Defaults to the caller's number" },
                    "customer_email": { "type": "string" }
                }
            }),
            Self::UpdateBooking => json!({
                "type": "object",
                "properties": {
                    "booking_id": { "type": "string", "description": "Booking id or the 8-character reference" },
                    "action": { "type": "string", "enum": ["reschedule", "cancel", "update"] },
                    "new_date": { "type": "string" },
                    "new_time": { "type": "string" },
                    "notes": { "type": "string" },
                    "reason": { "type": "string", "description": "Why the booking is cancelled" },
                    "customer_phone": { "type": "string", "description": "Defaults to the caller's number" }
                },
                "required": ["action"]
            }),
        }
    }

    /// Function-tool definition in the voice platform's format.
    pub fn definition(&self, server_url: &str, secret: Option<&str>) -> Value {
        let mut server = json!({ "url": server_url });
        if let Some(secret) = secret {
            server["secret"] = json!(secret);
        }
        json!({
            "type": "function",
            "async": false,
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.parameters(),
            },
            "server": server,
        })
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = String;

    /// Accepts the snake_case name, or the kebab-case form used in `/api/booker/...` paths.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_lowercase();
        Self::ALL
            .into_iter()
            .find(|tool| tool.name() == normalized)
            .ok_or_else(|| s.to_string())
    }
}

pub fn tool_definitions(server_url: &str, secret: Option<&str>) -> Vec<Value> {
    Tool::ALL
        .iter()
        .map(|tool| tool.definition(server_url, secret))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_parse_both_styles() {
        for tool in Tool::ALL {
            assert_eq!(tool.name().parse::<Tool>().unwrap(), tool);
            assert_eq!(tool.name().replace('_', "-").parse::<Tool>().unwrap(), tool);
        }
        assert_eq!("delete_everything".parse::<Tool>(), Err("delete_everything".to_string()));
    }

    #[test]
    fn test_definitions_point_at_webhook() {
        let defs = tool_definitions("https://api.example.com/api/vapi/webhook", None);
        assert_eq!(defs.len(), 6);
        for def in &defs {
            assert_eq!(def["type"], "function");
            assert_eq!(def["server"]["url"], "https://api.example.com/api/vapi/webhook");
            assert!(def["server"].get("secret").is_none());
            assert_eq!(def["function"]["parameters"]["type"], "object");
        }
        let booking = &defs[3];
        assert_eq!(booking["function"]["name"], "book_business_service");
        assert_eq!(booking["function"]["parameters"]["required"][0], "service");
    }
}
