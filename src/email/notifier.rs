use anyhow::{anyhow, Result};
use log::info;
use std::sync::Arc;

use super::templates::{render, BookingEmailContext, NotificationKind};
use super::transport::{DisabledTransport, EmailTransport, OutgoingEmail};
use crate::core::shared::utils::looks_like_email;

/// Renders booking emails and hands them to the configured transport.
pub struct Notifier {
    transport: Arc<dyn EmailTransport>,
    from_address: String,
}

impl Notifier {
    pub fn new(transport: Arc<dyn EmailTransport>, from_address: impl Into<String>) -> Self {
        Self {
            transport,
            from_address: from_address.into(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledTransport), "noreply@localhost")
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub async fn send_booking_email(
        &self,
        kind: NotificationKind,
        ctx: &BookingEmailContext,
        to: &str,
    ) -> Result<()> {
        if !looks_like_email(to) {
            return Err(anyhow!("Invalid recipient address '{to}'"));
        }
        let rendered = render(kind, ctx);
        let email = OutgoingEmail {
            from: sender_mailbox(&ctx.business_name, &self.from_address),
            to: to.trim().to_string(),
            reply_to: ctx.business_email.clone(),
            subject: rendered.subject,
            html: rendered.html,
            text: rendered.text,
        };
        self.transport.send(&email).await?;
        info!(
            "Sent booking {} email for {} via {}",
            kind.as_str(),
            ctx.booking_id,
            self.transport.name()
        );
        Ok(())
    }
}

/// `"Display Name" <address>` with the name as an RFC 5322 quoted string.
fn sender_mailbox(name: &str, address: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    for c in name.trim().chars().filter(|c| !c.is_control()) {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    format!("\"{quoted}\" <{address}>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    #[async_trait]
    impl EmailTransport for Recorder {
        async fn send(&self, email: &OutgoingEmail) -> Result<()> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    fn ctx() -> BookingEmailContext {
        BookingEmailContext {
            booking_id: Uuid::new_v4(),
            business_name: "Bella Salon".to_string(),
            business_phone: None,
            business_email: Some("hello@bella.example".to_string()),
            customer_name: "Ana".to_string(),
            service_name: "Haircut".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 30,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_sends_with_business_sender_name() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(recorder.clone(), "bookings@wecallsmart.com");
        notifier
            .send_booking_email(NotificationKind::Confirmation, &ctx(), "ana@example.com")
            .await
            .unwrap();

        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "\"Bella Salon\" <bookings@wecallsmart.com>");
        assert_eq!(sent[0].reply_to.as_deref(), Some("hello@bella.example"));
    }

    #[tokio::test]
    async fn test_rejects_bad_recipient() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(recorder.clone(), "bookings@wecallsmart.com");
        let result = notifier
            .send_booking_email(NotificationKind::Update, &ctx(), "not-an-email")
            .await;
        assert!(result.is_err());
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sender_name_is_quoted() {
        assert_eq!(
            sender_mailbox("Smith, Jones & Co", "bookings@wecallsmart.com"),
            "\"Smith, Jones & Co\" <bookings@wecallsmart.com>"
        );
        assert_eq!(
            sender_mailbox("Joe's \"Best\" Cuts;\n", "b@x.com"),
            "\"Joe's \\\"Best\\\" Cuts;\" <b@x.com>"
        );
    }
}
