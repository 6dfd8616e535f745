use super::slots::{compute_slots, OccupiedInterval, Slot};
use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;
use diesel::sql_types::{Date, Integer, Nullable, Time, Uuid as DieselUuid};
use serde::Serialize;
use uuid::Uuid;

use crate::business::{load_business, BusinessProfile};
use crate::catalog::{load_day_availability, load_service, CatalogError, Service};
use crate::core::shared::time::day_of_week;
use crate::core::shared::utils::{with_conn, DbPool};

#[derive(QueryableByName)]
struct OccupiedRow {
    #[diesel(sql_type = Time)]
    booking_time: NaiveTime,
    #[diesel(sql_type = Integer)]
    duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySlots {
    pub business_id: Uuid,
    pub service_id: Uuid,
    pub service_name: String,
    pub date: NaiveDate,
    pub duration_minutes: i32,
    pub slots: Vec<Slot>,
}

/// Pending and confirmed bookings of a service on `date`, minus `exclude`.
pub fn load_occupied(
    conn: &mut PgConnection,
    service_id: Uuid,
    date: NaiveDate,
    exclude: Option<Uuid>,
) -> Result<Vec<OccupiedInterval>, CatalogError> {
    let rows: Vec<OccupiedRow> = diesel::sql_query(
        r#"
        SELECT booking_time, duration_minutes FROM bookings
        WHERE service_id = $1
          AND booking_date = $2
          AND status IN ('pending', 'confirmed')
          AND ($3::UUID IS NULL OR id <> $3)
        "#,
    )
    .bind::<DieselUuid, _>(service_id)
    .bind::<Date, _>(date)
    .bind::<Nullable<DieselUuid>, _>(exclude)
    .load(conn)?;
    Ok(rows
        .into_iter()
        .map(|r| OccupiedInterval {
            start: r.booking_time,
            duration_minutes: r.duration_minutes,
        })
        .collect())
}

/// Slots of `service` on `date` using an open connection.
///
/// Past dates, closed days and inactive services produce no slots. For today only
/// start times after the business's local clock are offered. With `lock_day` the
/// availability row is held `FOR UPDATE`, so callers must be inside a transaction.
pub fn slots_on_conn(
    conn: &mut PgConnection,
    business: &BusinessProfile,
    service: &Service,
    date: NaiveDate,
    exclude_booking: Option<Uuid>,
    lock_day: bool,
) -> Result<Vec<Slot>, CatalogError> {
    if !service.is_active {
        return Ok(Vec::new());
    }
    let now = business.local_now();
    if date < now.date() {
        return Ok(Vec::new());
    }
    let not_before = (date == now.date()).then(|| now.time());

    let Some(window) = load_day_availability(conn, service.id, day_of_week(date), lock_day)? else {
        return Ok(Vec::new());
    };
    let occupied = load_occupied(conn, service.id, date, exclude_booking)?;
    compute_slots(&window, service.duration_minutes, &occupied, not_before)
}

pub struct AvailabilityService {
    pool: DbPool,
}

impl AvailabilityService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn available_slots(
        &self,
        business_id: Uuid,
        service_id: Uuid,
        date: NaiveDate,
    ) -> Result<DaySlots, CatalogError> {
        with_conn(&self.pool, move |conn| -> Result<_, CatalogError> {
            let business = load_business(conn, business_id)?;
            let service = load_service(conn, business_id, service_id)?;
            let slots = slots_on_conn(conn, &business, &service, date, None, false)?;
            Ok(DaySlots {
                business_id,
                service_id,
                service_name: service.name,
                date,
                duration_minutes: service.duration_minutes,
                slots,
            })
        })
        .await
    }
}
