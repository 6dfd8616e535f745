use chrono::{NaiveDate, NaiveTime};
use log::{debug, error, warn};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::context::BusinessContext;
use super::error::ToolError;
use super::parse::{parse_voice_date, parse_voice_time};
use super::tools::Tool;
use crate::availability::AvailabilityService;
use crate::bookings::{
    Booking, BookingError, BookingService, BookingStatus, CreateBookingRequest, UpdateBookingRequest,
};
use crate::business::{BusinessProfile, BusinessService};
use crate::catalog::{CatalogService, Service, ServiceListQuery};
use crate::core::shared::state::AppState;
use crate::core::shared::time::{format_12h, format_clock_time, format_long_date};
use crate::email::booking_reference;

/// Times read out before summarizing the rest of the day.
const MAX_SPOKEN_SLOTS: usize = 8;

/// Tool arguments with snake_case / camelCase aliases and blank values treated as absent.
struct Args<'a>(&'a Value);

impl<'a> Args<'a> {
    fn text(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.0.get(*key))
            .find_map(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }
}

/// Runs one tool call and always yields a sentence for the assistant to read.
pub async fn run_tool(state: &AppState, ctx: &BusinessContext, tool: Tool, arguments: &Value) -> String {
    debug!("Tool {tool} for business {} with {arguments}", ctx.business_id);
    match execute(state, ctx, tool, &Args(arguments)).await {
        Ok(result) => result,
        Err(e) if e.is_caller_facing() => {
            warn!("Tool {tool} for business {} declined: {e}", ctx.business_id);
            e.spoken()
        }
        Err(e) => {
            error!("Tool {tool} for business {} failed: {e}", ctx.business_id);
            e.spoken()
        }
    }
}

async fn execute(state: &AppState, ctx: &BusinessContext, tool: Tool, args: &Args<'_>) -> Result<String, ToolError> {
    let business = BusinessService::new(state.conn.clone())
        .get_business(ctx.business_id)
        .await?;
    match tool {
        Tool::GetBusinessInfo => get_business_info(state, &business).await,
        Tool::ListBusinessServices => list_business_services(state, &business, args).await,
        Tool::GetBusinessAvailability => get_business_availability(state, &business, args).await,
        Tool::BookBusinessService => book_business_service(state, ctx, &business, args).await,
        Tool::GetCustomerBookings => get_customer_bookings(state, ctx, &business, args).await,
        Tool::UpdateBooking => update_booking(state, ctx, &business, args).await,
    }
}

async fn active_services(state: &AppState, business_id: Uuid, category: Option<String>) -> Result<Vec<Service>, ToolError> {
    let query = ServiceListQuery {
        active_only: Some(true),
        category,
    };
    Ok(CatalogService::new(state.conn.clone())
        .list_services(business_id, query)
        .await?)
}

fn service_names(services: &[Service]) -> String {
    services
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Finds the service the caller means: by id, by name, or the only one offered.
async fn resolve_service(state: &AppState, business: &BusinessProfile, args: &Args<'_>) -> Result<Service, ToolError> {
    let catalog = CatalogService::new(state.conn.clone());
    match args.text(&["service", "service_name", "serviceName", "service_id", "serviceId"]) {
        Some(value) => {
            if let Ok(id) = Uuid::parse_str(&value) {
                return Ok(catalog.get_service(business.id, id).await?);
            }
            match catalog.find_service_by_name(business.id, value.clone()).await? {
                Some(service) => Ok(service),
                None => {
                    let services = active_services(state, business.id, None).await?;
                    Err(ToolError::Arguments(format!(
                        "I couldn't find a service called {value}. We offer: {}.",
                        service_names(&services)
                    )))
                }
            }
        }
        None => {
            let mut services = active_services(state, business.id, None).await?;
            match services.len() {
                1 => Ok(services.remove(0)),
                0 => Err(ToolError::Arguments(
                    "There are no services available to book right now.".to_string(),
                )),
                _ => Err(ToolError::Arguments(format!(
                    "Which service would you like? We offer: {}.",
                    service_names(&services)
                ))),
            }
        }
    }
}

fn resolve_date(business: &BusinessProfile, value: Option<String>, field: &str) -> Result<NaiveDate, ToolError> {
    let value = value.ok_or_else(|| ToolError::Arguments(format!("What {field} would you like?")))?;
    let today = business.local_today();
    let date = parse_voice_date(&value, today).ok_or_else(|| {
        ToolError::Arguments(format!(
            "I didn't catch the {field} \"{value}\". Could you say it like June 3rd or tomorrow?"
        ))
    })?;
    if date < today {
        return Err(ToolError::Arguments(format!(
            "{} has already passed. What other day works for you?",
            format_long_date(date)
        )));
    }
    Ok(date)
}

fn resolve_time(value: Option<String>) -> Result<NaiveTime, ToolError> {
    let value = value.ok_or_else(|| ToolError::Arguments("What time would you like?".to_string()))?;
    parse_voice_time(&value).ok_or_else(|| {
        ToolError::Arguments(format!(
            "I didn't catch the time \"{value}\". Could you say it like 2:30 PM?"
        ))
    })
}

fn describe_booking(booking: &Booking) -> String {
    format!(
        "{} on {} at {} (reference {}, {})",
        booking.service_name,
        format_long_date(booking.booking_date),
        format_12h(booking.booking_time),
        booking_reference(booking.id),
        booking.status
    )
}

async fn get_business_info(state: &AppState, business: &BusinessProfile) -> Result<String, ToolError> {
    let mut parts = vec![business.name.clone()];
    if let Some(description) = &business.description {
        parts.push(description.clone());
    }
    if let Some(address) = &business.address {
        parts.push(format!("We're located at {address}"));
    }
    match (&business.phone, &business.email) {
        (Some(phone), Some(email)) => parts.push(format!("You can reach us at {phone} or {email}")),
        (Some(phone), None) => parts.push(format!("You can reach us at {phone}")),
        (None, Some(email)) => parts.push(format!("You can email us at {email}")),
        (None, None) => {}
    }
    let services = active_services(state, business.id, None).await?;
    if !services.is_empty() {
        parts.push(format!("Services: {}", service_names(&services)));
    }
    Ok(format!("{}.", parts.join(". ")))
}

async fn list_business_services(state: &AppState, business: &BusinessProfile, args: &Args<'_>) -> Result<String, ToolError> {
    let services = active_services(state, business.id, args.text(&["category"])).await?;
    if services.is_empty() {
        return Ok(format!("{} doesn't have any services listed right now.", business.name));
    }
    let listed: Vec<String> = services
        .iter()
        .map(|s| format!("{}, {} minutes, ${}", s.name, s.duration_minutes, s.price))
        .collect();
    Ok(format!(
        "We offer {} service{}: {}.",
        services.len(),
        if services.len() == 1 { "" } else { "s" },
        listed.join("; ")
    ))
}

async fn get_business_availability(state: &AppState, business: &BusinessProfile, args: &Args<'_>) -> Result<String, ToolError> {
    let service = resolve_service(state, business, args).await?;
    let date = resolve_date(business, args.text(&["date", "booking_date", "bookingDate"]), "date")?;

    let day = AvailabilityService::new(state.conn.clone())
        .available_slots(business.id, service.id, date)
        .await?;
    if day.slots.is_empty() {
        return Ok(format!(
            "Sorry, there are no open times for {} on {}. Would you like to try another day?",
            service.name,
            format_long_date(date)
        ));
    }

    let spoken: Vec<String> = day
        .slots
        .iter()
        .take(MAX_SPOKEN_SLOTS)
        .map(|s| format_12h(s.start))
        .collect();
    let mut result = format!(
        "{} is available on {} at {}",
        service.name,
        format_long_date(date),
        spoken.join(", ")
    );
    if day.slots.len() > MAX_SPOKEN_SLOTS {
        if let Some(last) = day.slots.last() {
            result.push_str(&format!(
                ", and {} more times until {}",
                day.slots.len() - MAX_SPOKEN_SLOTS,
                format_12h(last.start)
            ));
        }
    }
    result.push('.');
    Ok(result)
}

async fn book_business_service(
    state: &AppState,
    ctx: &BusinessContext,
    business: &BusinessProfile,
    args: &Args<'_>,
) -> Result<String, ToolError> {
    let service = resolve_service(state, business, args).await?;
    let date = resolve_date(business, args.text(&["date", "booking_date", "bookingDate"]), "date")?;
    let time = resolve_time(args.text(&["time", "booking_time", "bookingTime"]))?;
    let customer_name = args
        .text(&["customer_name", "customerName", "name"])
        .ok_or_else(|| ToolError::Arguments("May I have your name for the booking?".to_string()))?;
    let customer_email = args.text(&["customer_email", "customerEmail", "email"]);
    let customer_phone = args
        .text(&["customer_phone", "customerPhone", "phone"])
        .or_else(|| ctx.customer_phone.clone());

    let request = CreateBookingRequest {
        service_id: service.id,
        customer_name: customer_name.clone(),
        customer_email: customer_email.clone(),
        customer_phone,
        booking_date: date,
        booking_time: format_clock_time(time),
        notes: args.text(&["notes", "note"]),
        status: Some(BookingStatus::Confirmed),
        call_id: ctx.call_id.clone(),
    };
    let booking = BookingService::new(state.conn.clone(), Arc::clone(&state.notifier))
        .create_booking(business.id, request)
        .await?;

    let mut result = format!(
        "You're all set, {customer_name}! {} is booked for {} at {}. Your booking reference is {}.",
        booking.service_name,
        format_long_date(booking.booking_date),
        format_12h(booking.booking_time),
        booking_reference(booking.id)
    );
    if let Some(email) = booking.customer_email.as_deref().or(customer_email.as_deref()) {
        result.push_str(&format!(" A confirmation email is on its way to {email}."));
    }
    Ok(result)
}

async fn upcoming_for_caller(
    state: &AppState,
    ctx: &BusinessContext,
    business: &BusinessProfile,
    args: &Args<'_>,
) -> Result<Vec<Booking>, ToolError> {
    let phone = args
        .text(&["customer_phone", "customerPhone", "phone"])
        .or_else(|| ctx.customer_phone.clone());
    let email = args.text(&["customer_email", "customerEmail", "email"]);
    if phone.is_none() && email.is_none() {
        return Err(ToolError::Arguments(
            "What phone number or email address was the booking made with?".to_string(),
        ));
    }
    Ok(BookingService::new(state.conn.clone(), Arc::clone(&state.notifier))
        .find_customer_bookings(business.id, phone, email)
        .await?)
}

async fn get_customer_bookings(
    state: &AppState,
    ctx: &BusinessContext,
    business: &BusinessProfile,
    args: &Args<'_>,
) -> Result<String, ToolError> {
    let bookings = upcoming_for_caller(state, ctx, business, args).await?;
    match bookings.as_slice() {
        [] => Ok("I couldn't find any upcoming bookings for you.".to_string()),
        [only] => Ok(format!("You have one upcoming booking: {}.", describe_booking(only))),
        many => Ok(format!(
            "You have {} upcoming bookings: {}.",
            many.len(),
            many.iter().map(describe_booking).collect::<Vec<_>>().join("; ")
        )),
    }
}

/// Picks the booking to change: explicit id, 8-character reference, or the caller's
/// only upcoming booking.
async fn resolve_booking(
    state: &AppState,
    ctx: &BusinessContext,
    business: &BusinessProfile,
    args: &Args<'_>,
) -> Result<Booking, ToolError> {
    let reference = args.text(&["booking_id", "bookingId", "booking_reference", "reference"]);
    if let Some(id) = reference.as_deref().and_then(|r| Uuid::parse_str(r).ok()) {
        return Ok(BookingService::new(state.conn.clone(), Arc::clone(&state.notifier))
            .get_booking(business.id, id)
            .await?);
    }

    let upcoming = upcoming_for_caller(state, ctx, business, args).await?;
    if let Some(reference) = reference {
        let wanted = reference.replace(['-', ' '], "").to_uppercase();
        return upcoming
            .into_iter()
            .find(|b| booking_reference(b.id) == wanted)
            .ok_or(ToolError::Booking(BookingError::NotFound));
    }
    match upcoming.len() {
        0 => Err(ToolError::Booking(BookingError::NotFound)),
        1 => Ok(upcoming.into_iter().next().ok_or(ToolError::Booking(BookingError::NotFound))?),
        _ => Err(ToolError::Arguments(format!(
            "You have several upcoming bookings: {}. Which one would you like to change?",
            upcoming.iter().map(describe_booking).collect::<Vec<_>>().join("; ")
        ))),
    }
}

async fn update_booking(
    state: &AppState,
    ctx: &BusinessContext,
    business: &BusinessProfile,
    args: &Args<'_>,
) -> Result<String, ToolError> {
    let booking = resolve_booking(state, ctx, business, args).await?;
    let bookings = BookingService::new(state.conn.clone(), Arc::clone(&state.notifier));

    let new_date = args.text(&["new_date", "newDate", "date"]);
    let new_time = args.text(&["new_time", "newTime", "time"]);
    let notes = args.text(&["notes", "note"]);
    let action = args
        .text(&["action"])
        .map(|a| a.to_lowercase())
        .unwrap_or_else(|| {
            if new_date.is_some() || new_time.is_some() {
                "reschedule".to_string()
            } else {
                "update".to_string()
            }
        });

    match action.as_str() {
        "cancel" | "cancelled" | "canceled" => {
            let cancelled = bookings
                .cancel_booking(business.id, booking.id, args.text(&["reason", "cancellation_reason"]))
                .await?;
            Ok(format!(
                "Your {} booking on {} at {} has been cancelled.",
                cancelled.service_name,
                format_long_date(cancelled.booking_date),
                format_12h(cancelled.booking_time)
            ))
        }
        "reschedule" | "move" | "change" => {
            if new_date.is_none() && new_time.is_none() {
                return Err(ToolError::Arguments(
                    "What new date or time would you like?".to_string(),
                ));
            }
            let date = match new_date {
                Some(value) => resolve_date(business, Some(value), "new date")?,
                None => booking.booking_date,
            };
            let time = match new_time {
                Some(value) => resolve_time(Some(value))?,
                None => booking.booking_time,
            };
            let request = UpdateBookingRequest {
                booking_date: Some(date),
                booking_time: Some(format_clock_time(time)),
                notes,
                ..Default::default()
            };
            let moved = bookings.update_booking(business.id, booking.id, request).await?;
            Ok(format!(
                "Done! Your {} is now booked for {} at {}.",
                moved.service_name,
                format_long_date(moved.booking_date),
                format_12h(moved.booking_time)
            ))
        }
        "update" => {
            let Some(notes) = notes else {
                return Err(ToolError::Arguments(
                    "Would you like to reschedule or cancel this booking?".to_string(),
                ));
            };
            let request = UpdateBookingRequest {
                notes: Some(notes),
                ..Default::default()
            };
            bookings.update_booking(business.id, booking.id, request).await?;
            Ok("I've added that note to your booking.".to_string())
        }
        other => Err(ToolError::Arguments(format!(
            "I can reschedule or cancel a booking, but I don't know how to {other} one."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_args_aliases_and_blanks() {
        let value = json!({ "serviceName": "Haircut", "date": "  ", "time": 15, "notes": null });
        let args = Args(&value);
        assert_eq!(args.text(&["service", "serviceName"]), Some("Haircut".to_string()));
        assert_eq!(args.text(&["date"]), None);
        assert_eq!(args.text(&["time"]), Some("15".to_string()));
        assert_eq!(args.text(&["notes"]), None);
        assert_eq!(args.text(&["missing"]), None);
    }

    #[test]
    fn test_resolve_time_messages() {
        assert_eq!(
            resolve_time(Some("2:30 PM".to_string())).unwrap(),
            NaiveTime::from_hms_opt(14, 30, 0).unwrap()
        );
        let err = resolve_time(Some("later".to_string())).unwrap_err();
        assert!(err.spoken().contains("2:30 PM"));
        assert!(resolve_time(None).unwrap_err().spoken().contains("What time"));
    }
}
