use super::error::BookingError;
use super::types::*;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Bool, Date, Integer, Nullable, Text, Time, Timestamptz, Uuid as DieselUuid};
use log::{debug, error, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::availability::{nearest_slots, slot_starting_at, slots_on_conn};
use crate::business::{load_business, BusinessProfile};
use crate::catalog::{load_service, Service};
use crate::core::shared::time::{format_12h, format_long_date, parse_clock_time};
use crate::core::shared::utils::{looks_like_email, non_empty, normalize_phone, with_conn, DbPool};
use crate::email::{BookingEmailContext, NotificationKind, Notifier};

const DEFAULT_LIST_LIMIT: i64 = 200;
const MAX_LIST_LIMIT: i64 = 1000;

#[derive(QueryableByName)]
struct BookingRow {
    #[diesel(sql_type = DieselUuid)]
    id: Uuid,
    #[diesel(sql_type = DieselUuid)]
    business_id: Uuid,
    #[diesel(sql_type = DieselUuid)]
    service_id: Uuid,
    #[diesel(sql_type = Text)]
    service_name: String,
    #[diesel(sql_type = Text)]
    customer_name: String,
    #[diesel(sql_type = Nullable<Text>)]
    customer_email: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    customer_phone: Option<String>,
    #[diesel(sql_type = Date)]
    booking_date: NaiveDate,
    #[diesel(sql_type = Time)]
    booking_time: NaiveTime,
    #[diesel(sql_type = Integer)]
    duration_minutes: i32,
    #[diesel(sql_type = Text)]
    status: String,
    #[diesel(sql_type = Nullable<Text>)]
    notes: Option<String>,
    #[diesel(sql_type = Bool)]
    email_confirmation_sent: bool,
    #[diesel(sql_type = Nullable<Text>)]
    call_id: Option<String>,
    #[diesel(sql_type = Timestamptz)]
    created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = BookingError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(BookingError::Database)?;
        Ok(Self {
            id: row.id,
            business_id: row.business_id,
            service_id: row.service_id,
            service_name: row.service_name,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_phone: row.customer_phone,
            booking_date: row.booking_date,
            booking_time: row.booking_time,
            duration_minutes: row.duration_minutes,
            status,
            notes: row.notes,
            email_confirmation_sent: row.email_confirmation_sent,
            call_id: row.call_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const BOOKING_SELECT: &str = r#"
    SELECT b.id, b.business_id, b.service_id, s.name AS service_name, b.customer_name,
           b.customer_email, b.customer_phone, b.booking_date, b.booking_time,
           b.duration_minutes, b.status, b.notes, b.email_confirmation_sent, b.call_id,
           b.created_at, b.updated_at
    FROM bookings b
    JOIN services s ON s.id = b.service_id
"#;

fn rows_to_bookings(rows: Vec<BookingRow>) -> Result<Vec<Booking>, BookingError> {
    rows.into_iter().map(Booking::try_from).collect()
}

pub fn load_booking(
    conn: &mut PgConnection,
    business_id: Uuid,
    booking_id: Uuid,
) -> Result<Booking, BookingError> {
    let rows: Vec<BookingRow> =
        diesel::sql_query(format!("{BOOKING_SELECT} WHERE b.id = $1 AND b.business_id = $2"))
            .bind::<DieselUuid, _>(booking_id)
            .bind::<DieselUuid, _>(business_id)
            .load(conn)?;
    rows_to_bookings(rows)?
        .into_iter()
        .next()
        .ok_or(BookingError::NotFound)
}

pub fn query_bookings(
    conn: &mut PgConnection,
    business_id: Uuid,
    query: &BookingListQuery,
) -> Result<Vec<Booking>, BookingError> {
    let phone = query
        .customer_phone
        .as_deref()
        .map(normalize_phone)
        .filter(|p| !p.is_empty());
    let email = query
        .customer_email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let rows: Vec<BookingRow> = diesel::sql_query(format!(
        r#"{BOOKING_SELECT}
        WHERE b.business_id = $1
          AND ($2::DATE IS NULL OR b.booking_date >= $2)
          AND ($3::DATE IS NULL OR b.booking_date <= $3)
          AND ($4::TEXT IS NULL OR b.status = $4)
          AND ($5::UUID IS NULL OR b.service_id = $5)
          AND ($6::TEXT IS NULL OR regexp_replace(COALESCE(b.customer_phone, ''), '[^0-9+]', '', 'g') = $6)
          AND ($7::TEXT IS NULL OR LOWER(b.customer_email) = $7)
        ORDER BY b.booking_date, b.booking_time
        LIMIT $8
        "#
    ))
    .bind::<DieselUuid, _>(business_id)
    .bind::<Nullable<Date>, _>(query.from)
    .bind::<Nullable<Date>, _>(query.to)
    .bind::<Nullable<Text>, _>(query.status.map(|s| s.as_str()))
    .bind::<Nullable<DieselUuid>, _>(query.service_id)
    .bind::<Nullable<Text>, _>(phone.as_deref())
    .bind::<Nullable<Text>, _>(email.as_deref())
    .bind::<BigInt, _>(limit)
    .load(conn)?;
    rows_to_bookings(rows)
}

/// Upcoming pending or confirmed bookings of a caller, matched by phone or email.
///
/// Phone numbers compare on their last ten digits so `+1 555 010 2030` finds a
/// booking stored as `555-010-2030`.
pub fn customer_bookings(
    conn: &mut PgConnection,
    business_id: Uuid,
    phone: Option<&str>,
    email: Option<&str>,
    from: NaiveDate,
) -> Result<Vec<Booking>, BookingError> {
    let digits: Option<String> = phone
        .map(|p| p.chars().filter(char::is_ascii_digit).collect::<String>())
        .filter(|d| d.len() >= 7);
    let email = email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    if digits.is_none() && email.is_none() {
        return Err(BookingError::Validation(
            "A phone number or email address is required to look up bookings".to_string(),
        ));
    }

    let rows: Vec<BookingRow> = diesel::sql_query(format!(
        r#"{BOOKING_SELECT}
        WHERE b.business_id = $1
          AND b.booking_date >= $2
          AND b.status IN ('pending', 'confirmed')
          AND (
            ($3::TEXT IS NOT NULL
              AND RIGHT(regexp_replace(COALESCE(b.customer_phone, ''), '[^0-9]', '', 'g'), 10) = RIGHT($3, 10))
            OR ($4::TEXT IS NOT NULL AND LOWER(b.customer_email) = $4)
          )
        ORDER BY b.booking_date, b.booking_time
        "#
    ))
    .bind::<DieselUuid, _>(business_id)
    .bind::<Date, _>(from)
    .bind::<Nullable<Text>, _>(digits.as_deref())
    .bind::<Nullable<Text>, _>(email.as_deref())
    .load(conn)?;
    rows_to_bookings(rows)
}

fn parse_booking_time(value: &str) -> Result<NaiveTime, BookingError> {
    parse_clock_time(value).ok_or_else(|| {
        BookingError::Validation(format!("booking_time must be HH:MM, got '{value}'"))
    })
}

fn validate_customer_email(value: Option<String>) -> Result<Option<String>, BookingError> {
    match non_empty(value) {
        Some(email) if !looks_like_email(&email) => Err(BookingError::Validation(format!(
            "Invalid customer email '{email}'"
        ))),
        other => Ok(other),
    }
}

fn validate_customer_phone(value: Option<String>) -> Option<String> {
    non_empty(value).map(|p| normalize_phone(&p)).filter(|p| !p.is_empty())
}

/// Checks that `time` is an open slot for `service` on `date` while holding the
/// availability row lock. `exclude` is the booking being moved.
fn ensure_slot_open(
    conn: &mut PgConnection,
    business: &BusinessProfile,
    service: &Service,
    date: NaiveDate,
    time: NaiveTime,
    exclude: Option<Uuid>,
) -> Result<(), BookingError> {
    if !service.is_active {
        return Err(BookingError::Validation(format!(
            "{} is not currently offered",
            service.name
        )));
    }
    let slots = slots_on_conn(conn, business, service, date, exclude, true)?;
    if slot_starting_at(&slots, time).is_some() {
        return Ok(());
    }

    let when = format!("{} on {}", format_12h(time), format_long_date(date));
    let message = if slots.is_empty() {
        format!("{} has no open times on {}", service.name, format_long_date(date))
    } else {
        let nearest: Vec<String> = nearest_slots(&slots, time, 3)
            .iter()
            .map(|s| format_12h(s.start))
            .collect();
        format!(
            "{when} is not available for {}. Nearest open times: {}",
            service.name,
            nearest.join(", ")
        )
    };
    Err(BookingError::SlotUnavailable(message))
}

pub struct BookingService {
    pool: DbPool,
    notifier: Arc<Notifier>,
}

impl BookingService {
    pub fn new(pool: DbPool, notifier: Arc<Notifier>) -> Self {
        Self { pool, notifier }
    }

    pub async fn create_booking(
        &self,
        business_id: Uuid,
        request: CreateBookingRequest,
    ) -> Result<Booking, BookingError> {
        let customer_name = request.customer_name.trim().to_string();
        if customer_name.is_empty() {
            return Err(BookingError::Validation("Customer name is required".to_string()));
        }
        let customer_email = validate_customer_email(request.customer_email)?;
        let customer_phone = validate_customer_phone(request.customer_phone);
        let time = parse_booking_time(&request.booking_time)?;
        let status = request.status.unwrap_or(BookingStatus::Pending);
        if !status.occupies_capacity() {
            return Err(BookingError::Validation(
                "New bookings must be pending or confirmed".to_string(),
            ));
        }
        let date = request.booking_date;
        let service_id = request.service_id;
        let notes = non_empty(request.notes);
        let call_id = non_empty(request.call_id);

        let (booking, business) = with_conn(&self.pool, move |conn| {
            conn.transaction::<_, BookingError, _>(|conn| {
                let business = load_business(conn, business_id)?;
                let service = load_service(conn, business_id, service_id)?;
                ensure_slot_open(conn, &business, &service, date, time, None)?;

                let id = Uuid::new_v4();
                diesel::sql_query(
                    r#"
                    INSERT INTO bookings (
                        id, business_id, service_id, customer_name, customer_email, customer_phone,
                        booking_date, booking_time, duration_minutes, status, notes,
                        email_confirmation_sent, call_id, created_at, updated_at
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, FALSE, $12, NOW(), NOW())
                    "#,
                )
                .bind::<DieselUuid, _>(id)
                .bind::<DieselUuid, _>(business_id)
                .bind::<DieselUuid, _>(service_id)
                .bind::<Text, _>(&customer_name)
                .bind::<Nullable<Text>, _>(customer_email.as_deref())
                .bind::<Nullable<Text>, _>(customer_phone.as_deref())
                .bind::<Date, _>(date)
                .bind::<Time, _>(time)
                .bind::<Integer, _>(service.duration_minutes)
                .bind::<Text, _>(status.as_str())
                .bind::<Nullable<Text>, _>(notes.as_deref())
                .bind::<Nullable<Text>, _>(call_id.as_deref())
                .execute(conn)
                .map_err(|e| {
                    error!("Failed to insert booking for business {business_id}: {e}");
                    BookingError::from(e)
                })?;

                Ok((load_booking(conn, business_id, id)?, business))
            })
        })
        .await?;

        info!(
            "Created booking {} for {} on {} at {} ({})",
            booking.id, booking.service_name, booking.booking_date, booking.booking_time, booking.status
        );
        self.spawn_notification(NotificationKind::Confirmation, &booking, &business);
        Ok(booking)
    }

    pub async fn get_booking(&self, business_id: Uuid, booking_id: Uuid) -> Result<Booking, BookingError> {
        with_conn(&self.pool, move |conn| load_booking(conn, business_id, booking_id)).await
    }

    pub async fn list_bookings(
        &self,
        business_id: Uuid,
        query: BookingListQuery,
    ) -> Result<Vec<Booking>, BookingError> {
        with_conn(&self.pool, move |conn| -> Result<_, BookingError> {
            load_business(conn, business_id)?;
            query_bookings(conn, business_id, &query)
        })
        .await
    }

    pub async fn find_customer_bookings(
        &self,
        business_id: Uuid,
        phone: Option<String>,
        email: Option<String>,
    ) -> Result<Vec<Booking>, BookingError> {
        with_conn(&self.pool, move |conn| -> Result<_, BookingError> {
            let business = load_business(conn, business_id)?;
            customer_bookings(
                conn,
                business_id,
                phone.as_deref(),
                email.as_deref(),
                business.local_today(),
            )
        })
        .await
    }

    /// Edits customer details and notes, and reschedules when the service, date or
    /// time changes. Cancelled and completed bookings cannot be edited.
    pub async fn update_booking(
        &self,
        business_id: Uuid,
        booking_id: Uuid,
        request: UpdateBookingRequest,
    ) -> Result<Booking, BookingError> {
        let new_time = request
            .booking_time
            .as_deref()
            .map(parse_booking_time)
            .transpose()?;
        let new_email = match request.customer_email {
            Some(e) => Some(validate_customer_email(Some(e))?),
            None => None,
        };
        if let Some(name) = &request.customer_name {
            if name.trim().is_empty() {
                return Err(BookingError::Validation("Customer name cannot be empty".to_string()));
            }
        }

        let (booking, business, rescheduled) = with_conn(&self.pool, move |conn| {
            conn.transaction::<_, BookingError, _>(|conn| {
                let current = load_booking(conn, business_id, booking_id)?;
                if current.status.is_terminal() {
                    return Err(BookingError::Validation(format!(
                        "Cannot modify a {} booking",
                        current.status
                    )));
                }
                let business = load_business(conn, business_id)?;

                let service_id = request.service_id.unwrap_or(current.service_id);
                let date = request.booking_date.unwrap_or(current.booking_date);
                let time = new_time.unwrap_or(current.booking_time);
                let rescheduled = service_id != current.service_id
                    || date != current.booking_date
                    || time != current.booking_time;

                let duration = if rescheduled {
                    let service = load_service(conn, business_id, service_id)?;
                    ensure_slot_open(conn, &business, &service, date, time, Some(booking_id))?;
                    service.duration_minutes
                } else {
                    current.duration_minutes
                };

                let customer_name = request
                    .customer_name
                    .map(|n| n.trim().to_string())
                    .unwrap_or(current.customer_name);
                let customer_email = new_email.unwrap_or(current.customer_email);
                let customer_phone = match request.customer_phone {
                    Some(p) => validate_customer_phone(Some(p)),
                    None => current.customer_phone,
                };
                let notes = match request.notes {
                    Some(n) => non_empty(Some(n)),
                    None => current.notes,
                };

                diesel::sql_query(
                    r#"
                    UPDATE bookings
                    SET service_id = $3, booking_date = $4, booking_time = $5, duration_minutes = $6,
                        customer_name = $7, customer_email = $8, customer_phone = $9, notes = $10,
                        updated_at = NOW()
                    WHERE id = $1 AND business_id = $2
                    "#,
                )
                .bind::<DieselUuid, _>(booking_id)
                .bind::<DieselUuid, _>(business_id)
                .bind::<DieselUuid, _>(service_id)
                .bind::<Date, _>(date)
                .bind::<Time, _>(time)
                .bind::<Integer, _>(duration)
                .bind::<Text, _>(&customer_name)
                .bind::<Nullable<Text>, _>(customer_email.as_deref())
                .bind::<Nullable<Text>, _>(customer_phone.as_deref())
                .bind::<Nullable<Text>, _>(notes.as_deref())
                .execute(conn)?;

                Ok((load_booking(conn, business_id, booking_id)?, business, rescheduled))
            })
        })
        .await?;

        if rescheduled {
            info!(
                "Rescheduled booking {} to {} at {}",
                booking.id, booking.booking_date, booking.booking_time
            );
            self.spawn_notification(NotificationKind::Update, &booking, &business);
        }
        Ok(booking)
    }

    /// Moves a booking along its lifecycle. Setting the current status again is a no-op.
    pub async fn set_status(
        &self,
        business_id: Uuid,
        booking_id: Uuid,
        status: BookingStatus,
    ) -> Result<Booking, BookingError> {
        self.transition(business_id, booking_id, status, None).await
    }

    pub async fn cancel_booking(
        &self,
        business_id: Uuid,
        booking_id: Uuid,
        reason: Option<String>,
    ) -> Result<Booking, BookingError> {
        self.transition(business_id, booking_id, BookingStatus::Cancelled, non_empty(reason))
            .await
    }

    async fn transition(
        &self,
        business_id: Uuid,
        booking_id: Uuid,
        status: BookingStatus,
        reason: Option<String>,
    ) -> Result<Booking, BookingError> {
        let (booking, business, changed) = with_conn(&self.pool, move |conn| {
            conn.transaction::<_, BookingError, _>(|conn| {
                let current = load_booking(conn, business_id, booking_id)?;
                let business = load_business(conn, business_id)?;
                if current.status == status {
                    return Ok((current, business, false));
                }
                if !current.status.can_transition_to(status) {
                    return Err(BookingError::InvalidTransition {
                        from: current.status,
                        to: status,
                    });
                }

                let note = reason.map(|r| format!("Cancellation reason: {r}"));
                diesel::sql_query(
                    r#"
                    UPDATE bookings
                    SET status = $3,
                        notes = CASE
                            WHEN $4::TEXT IS NULL THEN notes
                            WHEN notes IS NULL OR notes = '' THEN $4
                            ELSE notes || E'\n' || $4
                        END,
                        updated_at = NOW()
                    WHERE id = $1 AND business_id = $2
                    "#,
                )
                .bind::<DieselUuid, _>(booking_id)
                .bind::<DieselUuid, _>(business_id)
                .bind::<Text, _>(status.as_str())
                .bind::<Nullable<Text>, _>(note.as_deref())
                .execute(conn)?;

                Ok((load_booking(conn, business_id, booking_id)?, business, true))
            })
        })
        .await?;

        if changed {
            info!("Booking {} is now {}", booking.id, booking.status);
            match status {
                BookingStatus::Cancelled => {
                    self.spawn_notification(NotificationKind::Cancellation, &booking, &business)
                }
                BookingStatus::Confirmed => {
                    self.spawn_notification(NotificationKind::Confirmation, &booking, &business)
                }
                _ => {}
            }
        }
        Ok(booking)
    }

    /// Sends the email off the request path; failures are logged and never surface.
    fn spawn_notification(&self, kind: NotificationKind, booking: &Booking, business: &BusinessProfile) {
        let Some(to) = booking.customer_email.clone() else {
            debug!("Booking {} has no customer email, skipping {}", booking.id, kind.as_str());
            return;
        };
        let ctx = BookingEmailContext {
            booking_id: booking.id,
            business_name: business.name.clone(),
            business_phone: business.phone.clone(),
            business_email: business.email.clone(),
            customer_name: booking.customer_name.clone(),
            service_name: booking.service_name.clone(),
            date: booking.booking_date,
            time: booking.booking_time,
            duration_minutes: booking.duration_minutes,
            notes: booking.notes.clone(),
        };
        let notifier = Arc::clone(&self.notifier);
        let pool = self.pool.clone();
        let business_id = booking.business_id;

        tokio::spawn(async move {
            if let Err(e) = notifier.send_booking_email(kind, &ctx, &to).await {
                error!("Failed to send {} email for booking {}: {e}", kind.as_str(), ctx.booking_id);
                return;
            }
            let booking_id = ctx.booking_id;
            let marked = with_conn(&pool, move |conn| -> Result<usize, BookingError> {
                Ok(diesel::sql_query(
                    "UPDATE bookings SET email_confirmation_sent = TRUE WHERE id = $1 AND business_id = $2",
                )
                .bind::<DieselUuid, _>(booking_id)
                .bind::<DieselUuid, _>(business_id)
                .execute(conn)?)
            })
            .await;
            if let Err(e) = marked {
                warn!("Email sent but flag update failed for booking {booking_id}: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_booking_time() {
        assert_eq!(
            parse_booking_time("14:30").unwrap(),
            NaiveTime::from_hms_opt(14, 30, 0).unwrap()
        );
        assert!(matches!(
            parse_booking_time("2:30 PM"),
            Err(BookingError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_customer_email() {
        assert_eq!(validate_customer_email(None).unwrap(), None);
        assert_eq!(validate_customer_email(Some("  ".to_string())).unwrap(), None);
        assert_eq!(
            validate_customer_email(Some(" ana@example.com ".to_string())).unwrap(),
            Some("ana@example.com".to_string())
        );
        assert!(validate_customer_email(Some("ana".to_string())).is_err());
    }

    #[test]
    fn test_validate_customer_phone() {
        assert_eq!(
            validate_customer_phone(Some("(555) 010-2030".to_string())),
            Some("5550102030".to_string())
        );
        assert_eq!(validate_customer_phone(Some("n/a".to_string())), None);
    }
}
