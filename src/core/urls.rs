#[derive(Debug)]
pub struct ApiUrls;

impl ApiUrls {
    // Health
    pub const HEALTH: &'static str = "/api/health";

    // Businesses - JSON APIs
    pub const BUSINESSES: &'static str = "/api/businesses";
    pub const BUSINESS_BY_ID: &'static str = "/api/businesses/:id";

    // Service catalog - JSON APIs
    pub const SERVICES: &'static str = "/api/businesses/:id/services";
    pub const SERVICE_BY_ID: &'static str = "/api/businesses/:id/services/:service_id";
    pub const SERVICE_AVAILABILITY: &'static str =
        "/api/businesses/:id/services/:service_id/availability";
    pub const SERVICE_BREAKS: &'static str = "/api/businesses/:id/services/:service_id/breaks";
    pub const SERVICE_BREAK_BY_ID: &'static str =
        "/api/businesses/:id/services/:service_id/breaks/:break_id";
    pub const SERVICE_SLOTS: &'static str = "/api/businesses/:id/services/:service_id/slots";

    // Bookings - JSON APIs
    pub const BOOKINGS: &'static str = "/api/businesses/:id/bookings";
    pub const BOOKING_BY_ID: &'static str = "/api/businesses/:id/bookings/:booking_id";
    pub const BOOKING_STATUS: &'static str = "/api/businesses/:id/bookings/:booking_id/status";
    pub const BOOKING_CANCEL: &'static str = "/api/businesses/:id/bookings/:booking_id/cancel";

    // Assistants and telephony - JSON APIs
    pub const ASSISTANT: &'static str = "/api/businesses/:id/assistant";
    pub const ASSISTANT_CONFIG: &'static str = "/api/businesses/:id/assistant/config";
    pub const ASSISTANT_PUBLISH: &'static str = "/api/businesses/:id/assistant/publish";
    pub const PHONE_NUMBER: &'static str = "/api/businesses/:id/phone-number";

    // Voice platform
    pub const VAPI_WEBHOOK: &'static str = "/api/vapi/webhook";
    pub const BOOKER_TOOL: &'static str = "/api/booker/:tool";
}
