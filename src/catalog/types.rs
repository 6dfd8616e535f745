use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub duration_minutes: i32,
    pub category: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Option<BigDecimal>,
    pub duration_minutes: i32,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<BigDecimal>,
    pub duration_minutes: Option<i32>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceListQuery {
    pub active_only: Option<bool>,
    pub category: Option<String>,
}

/// Weekly opening window of a service for one day of the week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub service_id: Uuid,
    /// 0 = Sunday through 6 = Saturday.
    pub day_of_week: i16,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub break_between_minutes: i32,
    pub max_concurrent: i32,
    pub is_available: bool,
    pub breaks: Vec<BreakTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakTime {
    pub id: Uuid,
    pub availability_id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakInput {
    pub start_time: String,
    pub end_time: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DayAvailabilityInput {
    pub day_of_week: i16,
    pub open_time: String,
    pub close_time: String,
    pub break_between_minutes: Option<i32>,
    pub max_concurrent: Option<i32>,
    pub is_available: Option<bool>,
    #[serde(default)]
    pub breaks: Vec<BreakInput>,
}

/// Replaces the whole weekly schedule of a service; days left out become closed.
#[derive(Debug, Clone, Deserialize)]
pub struct SetAvailabilityRequest {
    pub days: Vec<DayAvailabilityInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddBreakRequest {
    pub day_of_week: i16,
    pub start_time: String,
    pub end_time: String,
    pub label: Option<String>,
}

/// Validated form of [`DayAvailabilityInput`].
#[derive(Debug, Clone, PartialEq)]
pub struct DaySchedule {
    pub day_of_week: i16,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub break_between_minutes: i32,
    pub max_concurrent: i32,
    pub is_available: bool,
    pub breaks: Vec<(NaiveTime, NaiveTime, Option<String>)>,
}
