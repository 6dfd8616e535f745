use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::core::shared::time::{format_12h, format_long_date};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Confirmation,
    Update,
    Cancellation,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmation => "confirmation",
            Self::Update => "update",
            Self::Cancellation => "cancellation",
        }
    }
}

/// Everything a booking email shows.
#[derive(Debug, Clone)]
pub struct BookingEmailContext {
    pub booking_id: Uuid,
    pub business_name: String,
    pub business_phone: Option<String>,
    pub business_email: Option<String>,
    pub customer_name: String,
    pub service_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Short booking reference read to customers: first 8 hex digits of the id, uppercased.
pub fn booking_reference(id: Uuid) -> String {
    id.simple().to_string()[..8].to_uppercase()
}

pub fn render(kind: NotificationKind, ctx: &BookingEmailContext) -> RenderedEmail {
    let date = format_long_date(ctx.date);
    let time = format_12h(ctx.time);
    let reference = booking_reference(ctx.booking_id);

    let (subject, heading, intro) = match kind {
        NotificationKind::Confirmation => (
            format!("Booking confirmed: {} at {}", ctx.service_name, ctx.business_name),
            "Your booking is confirmed",
            "Thanks for booking with us. Here are your appointment details:",
        ),
        NotificationKind::Update => (
            format!("Booking updated: {} at {}", ctx.service_name, ctx.business_name),
            "Your booking has been updated",
            "Your appointment details have changed. The updated booking is:",
        ),
        NotificationKind::Cancellation => (
            format!("Booking cancelled: {} at {}", ctx.service_name, ctx.business_name),
            "Your booking has been cancelled",
            "The following appointment has been cancelled:",
        ),
    };

    let mut contact = Vec::new();
    if let Some(phone) = &ctx.business_phone {
        contact.push(format!("phone {phone}"));
    }
    if let Some(email) = &ctx.business_email {
        contact.push(format!("email {email}"));
    }
    let contact_line = if contact.is_empty() {
        String::new()
    } else {
        format!("Questions? Reach {} by {}.", ctx.business_name, contact.join(" or "))
    };

    let mut text = format!(
        "Hi {customer},\n\n{intro}\n\nService: {service}\nDate: {date}\nTime: {time}\nDuration: {duration} minutes\nReference: {reference}\n",
        customer = ctx.customer_name,
        service = ctx.service_name,
        duration = ctx.duration_minutes,
    );
    if let Some(notes) = &ctx.notes {
        text.push_str(&format!("Notes: {notes}\n"));
    }
    if !contact_line.is_empty() {
        text.push_str(&format!("\n{contact_line}\n"));
    }
    text.push_str(&format!("\n{}\n", ctx.business_name));

    let notes_row = ctx
        .notes
        .as_deref()
        .map(|n| format!("<tr><td><strong>Notes</strong></td><td>{}</td></tr>", escape_html(n)))
        .unwrap_or_default();
    let contact_html = if contact_line.is_empty() {
        String::new()
    } else {
        format!("<p>{}</p>", escape_html(&contact_line))
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #222;">
  <h2>{heading}</h2>
  <p>Hi {customer},</p>
  <p>{intro}</p>
  <table cellpadding="6">
    <tr><td><strong>Service</strong></td><td>{service}</td></tr>
    <tr><td><strong>Date</strong></td><td>{date}</td></tr>
    <tr><td><strong>Time</strong></td><td>{time}</td></tr>
    <tr><td><strong>Duration</strong></td><td>{duration} minutes</td></tr>
    <tr><td><strong>Reference</strong></td><td>{reference}</td></tr>
    {notes_row}
  </table>
  {contact_html}
  <p>{business}</p>
</body>
</html>"#,
        customer = escape_html(&ctx.customer_name),
        service = escape_html(&ctx.service_name),
        duration = ctx.duration_minutes,
        business = escape_html(&ctx.business_name),
    );

    RenderedEmail { subject, html, text }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> BookingEmailContext {
        BookingEmailContext {
            booking_id: Uuid::parse_str("3f2a9c1e-0000-4000-8000-000000000000").unwrap(),
            business_name: "Bella Salon".to_string(),
            business_phone: Some("+15550100".to_string()),
            business_email: None,
            customer_name: "Ana <Lee>".to_string(),
            service_name: "Haircut".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            time: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
            duration_minutes: 45,
            notes: Some("Bring photo".to_string()),
        }
    }

    #[test]
    fn test_confirmation_contains_booking_details() {
        let email = render(NotificationKind::Confirmation, &context());
        assert_eq!(email.subject, "Booking confirmed: Haircut at Bella Salon");
        for body in [&email.text, &email.html] {
            assert!(body.contains("Monday, June 3, 2024"));
            assert!(body.contains("2:30 PM"));
            assert!(body.contains("45 minutes"));
            assert!(body.contains("3F2A9C1E"));
            assert!(body.contains("Bring photo"));
        }
        assert!(email.text.contains("phone +15550100"));
    }

    #[test]
    fn test_html_escapes_customer_input() {
        let email = render(NotificationKind::Update, &context());
        assert!(email.html.contains("Ana &lt;Lee&gt;"));
        assert!(!email.html.contains("<Lee>"));
        assert!(email.text.contains("Ana <Lee>"));
    }

    #[test]
    fn test_cancellation_subject() {
        let email = render(NotificationKind::Cancellation, &context());
        assert!(email.subject.starts_with("Booking cancelled"));
        assert!(email.text.contains("has been cancelled"));
    }
}
