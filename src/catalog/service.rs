use super::error::CatalogError;
use super::types::*;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, NaiveTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{
    Bool, Integer, Nullable, Numeric, SmallInt, Text, Time, Timestamptz, Uuid as DieselUuid,
};
use log::{error, info};
use std::collections::HashSet;
use uuid::Uuid;

use crate::business::load_business;
use crate::core::shared::time::{parse_clock_time, weekday_name, MINUTES_PER_DAY};
use crate::core::shared::utils::{non_empty, with_conn, DbPool};

#[derive(QueryableByName)]
struct ServiceRow {
    #[diesel(sql_type = DieselUuid)]
    id: Uuid,
    #[diesel(sql_type = DieselUuid)]
    business_id: Uuid,
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Nullable<Text>)]
    description: Option<String>,
    #[diesel(sql_type = Numeric)]
    price: BigDecimal,
    #[diesel(sql_type = Integer)]
    duration_minutes: i32,
    #[diesel(sql_type = Nullable<Text>)]
    category: Option<String>,
    #[diesel(sql_type = Bool)]
    is_active: bool,
    #[diesel(sql_type = Timestamptz)]
    created_at: DateTime<Utc>,
    #[diesel(sql_type = Timestamptz)]
    updated_at: DateTime<Utc>,
}

impl From<ServiceRow> for Service {
    fn from(row: ServiceRow) -> Self {
        Self {
            id: row.id,
            business_id: row.business_id,
            name: row.name,
            description: row.description,
            price: row.price,
            duration_minutes: row.duration_minutes,
            category: row.category,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(QueryableByName)]
struct AvailabilityRow {
    #[diesel(sql_type = DieselUuid)]
    id: Uuid,
    #[diesel(sql_type = DieselUuid)]
    service_id: Uuid,
    #[diesel(sql_type = SmallInt)]
    day_of_week: i16,
    #[diesel(sql_type = Time)]
    open_time: NaiveTime,
    #[diesel(sql_type = Time)]
    close_time: NaiveTime,
    #[diesel(sql_type = Integer)]
    break_between_minutes: i32,
    #[diesel(sql_type = Integer)]
    max_concurrent: i32,
    #[diesel(sql_type = Bool)]
    is_available: bool,
}

#[derive(QueryableByName)]
struct BreakRow {
    #[diesel(sql_type = DieselUuid)]
    id: Uuid,
    #[diesel(sql_type = DieselUuid)]
    availability_id: Uuid,
    #[diesel(sql_type = Time)]
    start_time: NaiveTime,
    #[diesel(sql_type = Time)]
    end_time: NaiveTime,
    #[diesel(sql_type = Nullable<Text>)]
    label: Option<String>,
}

impl From<BreakRow> for BreakTime {
    fn from(row: BreakRow) -> Self {
        Self {
            id: row.id,
            availability_id: row.availability_id,
            start_time: row.start_time,
            end_time: row.end_time,
            label: row.label,
        }
    }
}

#[derive(QueryableByName)]
struct IdRow {
    #[diesel(sql_type = DieselUuid)]
    id: Uuid,
}

const SERVICE_COLUMNS: &str = "id, business_id, name, description, price, duration_minutes, category, is_active, created_at, updated_at";
const AVAILABILITY_COLUMNS: &str = "id, service_id, day_of_week, open_time, close_time, break_between_minutes, max_concurrent, is_available";

pub fn load_service(
    conn: &mut PgConnection,
    business_id: Uuid,
    service_id: Uuid,
) -> Result<Service, CatalogError> {
    let rows: Vec<ServiceRow> = diesel::sql_query(format!(
        "SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1 AND business_id = $2"
    ))
    .bind::<DieselUuid, _>(service_id)
    .bind::<DieselUuid, _>(business_id)
    .load(conn)?;
    rows.into_iter()
        .next()
        .map(Service::from)
        .ok_or(CatalogError::ServiceNotFound)
}

pub fn load_services(
    conn: &mut PgConnection,
    business_id: Uuid,
    query: &ServiceListQuery,
) -> Result<Vec<Service>, CatalogError> {
    let rows: Vec<ServiceRow> = diesel::sql_query(format!(
        r#"
        SELECT {SERVICE_COLUMNS} FROM services
        WHERE business_id = $1
          AND ($2 = FALSE OR is_active)
          AND ($3::TEXT IS NULL OR LOWER(category) = LOWER($3))
        ORDER BY name
        "#
    ))
    .bind::<DieselUuid, _>(business_id)
    .bind::<Bool, _>(query.active_only.unwrap_or(false))
    .bind::<Nullable<Text>, _>(query.category.as_deref())
    .load(conn)?;
    Ok(rows.into_iter().map(Service::from).collect())
}

/// Resolves a spoken service name: exact (case-insensitive) match first, then the
/// shortest active service whose name contains the query.
pub fn find_service_by_name(
    conn: &mut PgConnection,
    business_id: Uuid,
    name: &str,
) -> Result<Option<Service>, CatalogError> {
    let needle = name.trim();
    if needle.is_empty() {
        return Ok(None);
    }
    let rows: Vec<ServiceRow> = diesel::sql_query(format!(
        r#"
        SELECT {SERVICE_COLUMNS} FROM services
        WHERE business_id = $1 AND is_active
          AND (LOWER(name) = LOWER($2) OR name ILIKE '%' || $2 || '%' OR $2 ILIKE '%' || name || '%')
        ORDER BY (LOWER(name) = LOWER($2)) DESC, LENGTH(name) ASC
        LIMIT 1
        "#
    ))
    .bind::<DieselUuid, _>(business_id)
    .bind::<Text, _>(needle)
    .load(conn)?;
    Ok(rows.into_iter().next().map(Service::from))
}

fn load_breaks(
    conn: &mut PgConnection,
    availability_ids: &[Uuid],
) -> Result<Vec<BreakTime>, CatalogError> {
    if availability_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows: Vec<BreakRow> = diesel::sql_query(
        r#"
        SELECT id, availability_id, start_time, end_time, label
        FROM service_break_times
        WHERE availability_id = ANY($1)
        ORDER BY start_time
        "#,
    )
    .bind::<diesel::sql_types::Array<DieselUuid>, _>(availability_ids)
    .load(conn)?;
    Ok(rows.into_iter().map(BreakTime::from).collect())
}

fn attach_breaks(
    conn: &mut PgConnection,
    rows: Vec<AvailabilityRow>,
) -> Result<Vec<AvailabilityWindow>, CatalogError> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let breaks = load_breaks(conn, &ids)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let own = breaks
                .iter()
                .filter(|b| b.availability_id == row.id)
                .cloned()
                .collect();
            AvailabilityWindow {
                id: row.id,
                service_id: row.service_id,
                day_of_week: row.day_of_week,
                open_time: row.open_time,
                close_time: row.close_time,
                break_between_minutes: row.break_between_minutes,
                max_concurrent: row.max_concurrent,
                is_available: row.is_available,
                breaks: own,
            }
        })
        .collect())
}

pub fn load_availability(
    conn: &mut PgConnection,
    service_id: Uuid,
) -> Result<Vec<AvailabilityWindow>, CatalogError> {
    let rows: Vec<AvailabilityRow> = diesel::sql_query(format!(
        "SELECT {AVAILABILITY_COLUMNS} FROM service_availability WHERE service_id = $1 ORDER BY day_of_week"
    ))
    .bind::<DieselUuid, _>(service_id)
    .load(conn)?;
    attach_breaks(conn, rows)
}

/// Availability of one weekday. With `for_update` the row stays locked until the
/// surrounding transaction ends, which serializes bookings of the same service day.
pub fn load_day_availability(
    conn: &mut PgConnection,
    service_id: Uuid,
    day_of_week: i16,
    for_update: bool,
) -> Result<Option<AvailabilityWindow>, CatalogError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let rows: Vec<AvailabilityRow> = diesel::sql_query(format!(
        "SELECT {AVAILABILITY_COLUMNS} FROM service_availability WHERE service_id = $1 AND day_of_week = $2{lock}"
    ))
    .bind::<DieselUuid, _>(service_id)
    .bind::<SmallInt, _>(day_of_week)
    .load(conn)?;
    Ok(attach_breaks(conn, rows)?.into_iter().next())
}

pub fn validate_service_fields(
    name: &str,
    duration_minutes: i32,
    price: &BigDecimal,
) -> Result<(), CatalogError> {
    if name.trim().is_empty() {
        return Err(CatalogError::Validation("Service name is required".to_string()));
    }
    if duration_minutes <= 0 || duration_minutes as u32 > MINUTES_PER_DAY {
        return Err(CatalogError::Validation(format!(
            "Duration must be between 1 and {MINUTES_PER_DAY} minutes"
        )));
    }
    if *price < BigDecimal::zero() {
        return Err(CatalogError::Validation("Price cannot be negative".to_string()));
    }
    Ok(())
}

fn parse_time_field(value: &str, field: &str) -> Result<NaiveTime, CatalogError> {
    parse_clock_time(value).ok_or_else(|| {
        CatalogError::Validation(format!("{field} must be HH:MM, got '{value}'"))
    })
}

fn validate_break(
    start: NaiveTime,
    end: NaiveTime,
    open: NaiveTime,
    close: NaiveTime,
) -> Result<(), CatalogError> {
    if end <= start {
        return Err(CatalogError::Validation(
            "Break end must be after break start".to_string(),
        ));
    }
    if start < open || end > close {
        return Err(CatalogError::Validation(format!(
            "Break {}-{} is outside opening hours {}-{}",
            start.format("%H:%M"),
            end.format("%H:%M"),
            open.format("%H:%M"),
            close.format("%H:%M")
        )));
    }
    Ok(())
}

fn overlaps(a: (NaiveTime, NaiveTime), b: (NaiveTime, NaiveTime)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Turns the raw weekly input into validated schedules, rejecting duplicate days,
/// inverted windows and breaks that leave the window or overlap each other.
pub fn validate_week(days: &[DayAvailabilityInput]) -> Result<Vec<DaySchedule>, CatalogError> {
    let mut seen = HashSet::new();
    let mut schedules = Vec::with_capacity(days.len());

    for day in days {
        if !(0..=6).contains(&day.day_of_week) {
            return Err(CatalogError::Validation(format!(
                "day_of_week must be 0 (Sunday) to 6 (Saturday), got {}",
                day.day_of_week
            )));
        }
        if !seen.insert(day.day_of_week) {
            return Err(CatalogError::Validation(format!(
                "{} is listed more than once",
                weekday_name(day.day_of_week)
            )));
        }

        let open = parse_time_field(&day.open_time, "open_time")?;
        let close = parse_time_field(&day.close_time, "close_time")?;
        if close <= open {
            return Err(CatalogError::Validation(format!(
                "{}: closing time must be after opening time",
                weekday_name(day.day_of_week)
            )));
        }

        let break_between = day.break_between_minutes.unwrap_or(0);
        if break_between < 0 || break_between as u32 > MINUTES_PER_DAY {
            return Err(CatalogError::Validation(
                "break_between_minutes must be between 0 and 1440".to_string(),
            ));
        }
        let max_concurrent = day.max_concurrent.unwrap_or(1);
        if max_concurrent < 1 {
            return Err(CatalogError::Validation(
                "max_concurrent must be at least 1".to_string(),
            ));
        }

        let mut breaks = Vec::with_capacity(day.breaks.len());
        for input in &day.breaks {
            let start = parse_time_field(&input.start_time, "break start_time")?;
            let end = parse_time_field(&input.end_time, "break end_time")?;
            validate_break(start, end, open, close)?;
            if breaks
                .iter()
                .any(|(s, e, _): &(NaiveTime, NaiveTime, Option<String>)| overlaps((*s, *e), (start, end)))
            {
                return Err(CatalogError::Validation(format!(
                    "{}: break windows overlap",
                    weekday_name(day.day_of_week)
                )));
            }
            breaks.push((start, end, non_empty(input.label.clone())));
        }
        breaks.sort_by_key(|(s, _, _)| *s);

        schedules.push(DaySchedule {
            day_of_week: day.day_of_week,
            open_time: open,
            close_time: close,
            break_between_minutes: break_between,
            max_concurrent,
            is_available: day.is_available.unwrap_or(true),
            breaks,
        });
    }

    schedules.sort_by_key(|s| s.day_of_week);
    Ok(schedules)
}

pub struct CatalogService {
    pool: DbPool,
}

impl CatalogService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create_service(
        &self,
        business_id: Uuid,
        request: CreateServiceRequest,
    ) -> Result<Service, CatalogError> {
        let price = request.price.clone().unwrap_or_else(BigDecimal::zero);
        validate_service_fields(&request.name, request.duration_minutes, &price)?;

        let id = Uuid::new_v4();
        let service = with_conn(&self.pool, move |conn| -> Result<_, CatalogError> {
            load_business(conn, business_id)?;
            diesel::sql_query(
                r#"
                INSERT INTO services (
                    id, business_id, name, description, price, duration_minutes, category,
                    is_active, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
                "#,
            )
            .bind::<DieselUuid, _>(id)
            .bind::<DieselUuid, _>(business_id)
            .bind::<Text, _>(request.name.trim())
            .bind::<Nullable<Text>, _>(non_empty(request.description).as_deref())
            .bind::<Numeric, _>(&price)
            .bind::<Integer, _>(request.duration_minutes)
            .bind::<Nullable<Text>, _>(non_empty(request.category).as_deref())
            .bind::<Bool, _>(request.is_active.unwrap_or(true))
            .execute(conn)
            .map_err(|e| {
                error!("Failed to create service for business {business_id}: {e}");
                CatalogError::from(e)
            })?;
            load_service(conn, business_id, id)
        })
        .await?;

        info!("Created service {} ({}) for business {}", service.name, service.id, business_id);
        Ok(service)
    }

    pub async fn get_service(&self, business_id: Uuid, service_id: Uuid) -> Result<Service, CatalogError> {
        with_conn(&self.pool, move |conn| load_service(conn, business_id, service_id)).await
    }

    pub async fn list_services(
        &self,
        business_id: Uuid,
        query: ServiceListQuery,
    ) -> Result<Vec<Service>, CatalogError> {
        with_conn(&self.pool, move |conn| -> Result<_, CatalogError> {
            load_business(conn, business_id)?;
            load_services(conn, business_id, &query)
        })
        .await
    }

    pub async fn find_service_by_name(
        &self,
        business_id: Uuid,
        name: String,
    ) -> Result<Option<Service>, CatalogError> {
        with_conn(&self.pool, move |conn| find_service_by_name(conn, business_id, &name)).await
    }

    pub async fn update_service(
        &self,
        business_id: Uuid,
        service_id: Uuid,
        request: UpdateServiceRequest,
    ) -> Result<Service, CatalogError> {
        with_conn(&self.pool, move |conn| -> Result<_, CatalogError> {
            let current = load_service(conn, business_id, service_id)?;
            let name = request
                .name
                .map(|n| n.trim().to_string())
                .unwrap_or(current.name);
            let price = request.price.unwrap_or(current.price);
            let duration = request.duration_minutes.unwrap_or(current.duration_minutes);
            validate_service_fields(&name, duration, &price)?;

            let description = match request.description {
                Some(d) => non_empty(Some(d)),
                None => current.description,
            };
            let category = match request.category {
                Some(c) => non_empty(Some(c)),
                None => current.category,
            };

            diesel::sql_query(
                r#"
                UPDATE services
                SET name = $3, description = $4, price = $5, duration_minutes = $6,
                    category = $7, is_active = $8, updated_at = NOW()
                WHERE id = $1 AND business_id = $2
                "#,
            )
            .bind::<DieselUuid, _>(service_id)
            .bind::<DieselUuid, _>(business_id)
            .bind::<Text, _>(&name)
            .bind::<Nullable<Text>, _>(description.as_deref())
            .bind::<Numeric, _>(&price)
            .bind::<Integer, _>(duration)
            .bind::<Nullable<Text>, _>(category.as_deref())
            .bind::<Bool, _>(request.is_active.unwrap_or(current.is_active))
            .execute(conn)?;

            load_service(conn, business_id, service_id)
        })
        .await
    }

    pub async fn delete_service(&self, business_id: Uuid, service_id: Uuid) -> Result<(), CatalogError> {
        let deleted = with_conn(&self.pool, move |conn| -> Result<_, CatalogError> {
            diesel::sql_query("DELETE FROM services WHERE id = $1 AND business_id = $2")
                .bind::<DieselUuid, _>(service_id)
                .bind::<DieselUuid, _>(business_id)
                .execute(conn)
                .map_err(|e| match CatalogError::from(e) {
                    CatalogError::Conflict(_) => CatalogError::Conflict(
                        "Service has bookings; deactivate it instead of deleting".to_string(),
                    ),
                    other => other,
                })
        })
        .await?;

        if deleted == 0 {
            return Err(CatalogError::ServiceNotFound);
        }
        info!("Deleted service {service_id} of business {business_id}");
        Ok(())
    }

    pub async fn get_availability(
        &self,
        business_id: Uuid,
        service_id: Uuid,
    ) -> Result<Vec<AvailabilityWindow>, CatalogError> {
        with_conn(&self.pool, move |conn| -> Result<_, CatalogError> {
            load_service(conn, business_id, service_id)?;
            load_availability(conn, service_id)
        })
        .await
    }

    pub async fn set_availability(
        &self,
        business_id: Uuid,
        service_id: Uuid,
        request: SetAvailabilityRequest,
    ) -> Result<Vec<AvailabilityWindow>, CatalogError> {
        let schedules = validate_week(&request.days)?;

        with_conn(&self.pool, move |conn| -> Result<_, CatalogError> {
            load_service(conn, business_id, service_id)?;
            conn.transaction::<_, CatalogError, _>(|conn| {
                let days: Vec<i16> = schedules.iter().map(|s| s.day_of_week).collect();
                diesel::sql_query(
                    "DELETE FROM service_availability WHERE service_id = $1 AND NOT (day_of_week = ANY($2))",
                )
                .bind::<DieselUuid, _>(service_id)
                .bind::<diesel::sql_types::Array<SmallInt>, _>(&days)
                .execute(conn)?;

                for schedule in &schedules {
                    let ids: Vec<IdRow> = diesel::sql_query(
                        r#"
                        INSERT INTO service_availability (
                            id, service_id, day_of_week, open_time, close_time,
                            break_between_minutes, max_concurrent, is_available
                        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                        ON CONFLICT (service_id, day_of_week) DO UPDATE
                        SET open_time = EXCLUDED.open_time,
                            close_time = EXCLUDED.close_time,
                            break_between_minutes = EXCLUDED.break_between_minutes,
                            max_concurrent = EXCLUDED.max_concurrent,
                            is_available = EXCLUDED.is_available
                        RETURNING id
                        "#,
                    )
                    .bind::<DieselUuid, _>(Uuid::new_v4())
                    .bind::<DieselUuid, _>(service_id)
                    .bind::<SmallInt, _>(schedule.day_of_week)
                    .bind::<Time, _>(schedule.open_time)
                    .bind::<Time, _>(schedule.close_time)
                    .bind::<Integer, _>(schedule.break_between_minutes)
                    .bind::<Integer, _>(schedule.max_concurrent)
                    .bind::<Bool, _>(schedule.is_available)
                    .load(conn)?;
                    let availability_id = ids
                        .into_iter()
                        .next()
                        .map(|r| r.id)
                        .ok_or_else(|| CatalogError::Database("Upsert returned no row".to_string()))?;

                    diesel::sql_query("DELETE FROM service_break_times WHERE availability_id = $1")
                        .bind::<DieselUuid, _>(availability_id)
                        .execute(conn)?;
                    for (start, end, label) in &schedule.breaks {
                        insert_break(conn, availability_id, *start, *end, label.as_deref())?;
                    }
                }
                Ok(())
            })?;
            info!(
                "Updated weekly availability of service {service_id} ({} open days)",
                schedules.len()
            );
            load_availability(conn, service_id)
        })
        .await
    }

    pub async fn add_break_time(
        &self,
        business_id: Uuid,
        service_id: Uuid,
        request: AddBreakRequest,
    ) -> Result<BreakTime, CatalogError> {
        let start = parse_time_field(&request.start_time, "start_time")?;
        let end = parse_time_field(&request.end_time, "end_time")?;

        with_conn(&self.pool, move |conn| -> Result<_, CatalogError> {
            load_service(conn, business_id, service_id)?;
            let window = load_day_availability(conn, service_id, request.day_of_week, false)?
                .ok_or_else(|| {
                    CatalogError::NoAvailability(weekday_name(request.day_of_week).to_string())
                })?;
            validate_break(start, end, window.open_time, window.close_time)?;
            if window
                .breaks
                .iter()
                .any(|b| overlaps((b.start_time, b.end_time), (start, end)))
            {
                return Err(CatalogError::Conflict(
                    "Break overlaps an existing break".to_string(),
                ));
            }
            let label = non_empty(request.label);
            let id = insert_break(conn, window.id, start, end, label.as_deref())?;
            Ok(BreakTime {
                id,
                availability_id: window.id,
                start_time: start,
                end_time: end,
                label,
            })
        })
        .await
    }

    pub async fn delete_break_time(
        &self,
        business_id: Uuid,
        service_id: Uuid,
        break_id: Uuid,
    ) -> Result<(), CatalogError> {
        let deleted = with_conn(&self.pool, move |conn| -> Result<usize, CatalogError> {
            load_service(conn, business_id, service_id)?;
            Ok(diesel::sql_query(
                r#"
                DELETE FROM service_break_times b
                USING service_availability a
                WHERE b.id = $1 AND b.availability_id = a.id AND a.service_id = $2
                "#,
            )
            .bind::<DieselUuid, _>(break_id)
            .bind::<DieselUuid, _>(service_id)
            .execute(conn)?)
        })
        .await?;

        if deleted == 0 {
            return Err(CatalogError::BreakNotFound);
        }
        Ok(())
    }
}

fn insert_break(
    conn: &mut PgConnection,
    availability_id: Uuid,
    start: NaiveTime,
    end: NaiveTime,
    label: Option<&str>,
) -> Result<Uuid, CatalogError> {
    let id = Uuid::new_v4();
    diesel::sql_query(
        r#"
        INSERT INTO service_break_times (id, availability_id, start_time, end_time, label)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind::<DieselUuid, _>(id)
    .bind::<DieselUuid, _>(availability_id)
    .bind::<Time, _>(start)
    .bind::<Time, _>(end)
    .bind::<Nullable<Text>, _>(label)
    .execute(conn)?;
    Ok(id)
}
