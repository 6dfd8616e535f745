//! Booking notification emails.

mod notifier;
pub mod templates;
mod transport;

pub use notifier::Notifier;
pub use templates::{booking_reference, BookingEmailContext, NotificationKind};
pub use transport::{transport_from_config, ApiTransport, DisabledTransport, EmailTransport, OutgoingEmail};

#[cfg(feature = "mail")]
pub use transport::SmtpTransport;
