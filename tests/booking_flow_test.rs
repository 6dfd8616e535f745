#[cfg(test)]
mod booking_flow_tests {
    use chrono::{Duration, NaiveTime, Utc};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use uuid::Uuid;
    use wecallsmart::availability::AvailabilityService;
    use wecallsmart::bookings::{
        BookingError, BookingService, BookingStatus, CreateBookingRequest, UpdateBookingRequest,
    };
    use wecallsmart::business::{BusinessService, CreateBusinessRequest};
    use wecallsmart::catalog::{CatalogService, CreateServiceRequest, DayAvailabilityInput, SetAvailabilityRequest};
    use wecallsmart::core::config::AppConfig;
    use wecallsmart::core::shared::state::AppState;
    use wecallsmart::core::shared::utils::{create_conn, run_migrations, DbPool};
    use wecallsmart::email::Notifier;
    use wecallsmart::voice::{run_tool, BusinessContext, Tool};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn test_pool() -> Option<DbPool> {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            println!("Skipping test - TEST_DATABASE_URL not set");
            return None;
        };
        let pool = match create_conn(&url, 4) {
            Ok(pool) => pool,
            Err(e) => {
                println!("Skipping test - Cannot connect to database: {}", e);
                return None;
            }
        };
        if let Err(e) = run_migrations(&pool) {
            println!("Skipping test - Migrations failed: {}", e);
            return None;
        }
        Some(pool)
    }

    /// A UTC business with one 30 minute service open 09:00-12:00 every day, one seat.
    async fn seed(pool: &DbPool) -> (Uuid, Uuid) {
        let business = BusinessService::new(pool.clone())
            .create_business(CreateBusinessRequest {
                owner_id: None,
                name: format!("Flow Test Studio {}", Uuid::new_v4()),
                email: Some("studio@example.com".to_string()),
                phone: Some("+1 555 010 2000".to_string()),
                address: None,
                description: None,
                timezone: Some("UTC".to_string()),
            })
            .await
            .unwrap();

        let catalog = CatalogService::new(pool.clone());
        let service = catalog
            .create_service(
                business.id,
                CreateServiceRequest {
                    name: "Consultation".to_string(),
                    description: None,
                    price: None,
                    duration_minutes: 30,
                    category: None,
                    is_active: Some(true),
                },
            )
            .await
            .unwrap();

        let days = (0..7)
            .map(|day| DayAvailabilityInput {
                day_of_week: day,
                open_time: "09:00".to_string(),
                close_time: "12:00".to_string(),
                break_between_minutes: Some(0),
                max_concurrent: Some(1),
                is_available: Some(true),
                breaks: Vec::new(),
            })
            .collect();
        catalog
            .set_availability(business.id, service.id, SetAvailabilityRequest { days })
            .await
            .unwrap();

        (business.id, service.id)
    }

    fn booking_request(service_id: Uuid, days_ahead: i64, time: &str) -> CreateBookingRequest {
        CreateBookingRequest {
            service_id,
            customer_name: "Dana Reyes".to_string(),
            customer_email: None,
            customer_phone: Some("(555) 010-3000".to_string()),
            booking_date: Utc::now().date_naive() + Duration::days(days_ahead),
            booking_time: time.to_string(),
            notes: None,
            status: None,
            call_id: None,
        }
    }

    #[tokio::test]
    async fn test_booking_lifecycle_holds_and_releases_capacity() {
        let Some(pool) = test_pool() else { return };
        let (business_id, service_id) = seed(&pool).await;
        let bookings = BookingService::new(pool.clone(), Arc::new(Notifier::disabled()));
        let availability = AvailabilityService::new(pool.clone());
        let date = Utc::now().date_naive() + Duration::days(7);

        let day = availability.available_slots(business_id, service_id, date).await.unwrap();
        assert_eq!(day.slots.len(), 6);

        let booking = bookings
            .create_booking(business_id, booking_request(service_id, 7, "10:00"))
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.booking_time, t(10, 0));

        let clash = bookings
            .create_booking(business_id, booking_request(service_id, 7, "10:00"))
            .await;
        assert!(matches!(clash, Err(BookingError::SlotUnavailable(_))));

        let day = availability.available_slots(business_id, service_id, date).await.unwrap();
        assert!(day.slots.iter().all(|s| s.start != t(10, 0)));

        let moved = bookings
            .update_booking(
                business_id,
                booking.id,
                UpdateBookingRequest {
                    booking_time: Some("11:00".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.booking_time, t(11, 0));
        let noted = bookings
            .update_booking(
                business_id,
                booking.id,
                UpdateBookingRequest {
                    booking_time: Some("11:00".to_string()),
                    notes: Some("Prefers the window chair".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(noted.booking_time, t(11, 0));
        assert_eq!(noted.notes.as_deref(), Some("Prefers the window chair"));
        let day = availability.available_slots(business_id, service_id, date).await.unwrap();
        assert!(day.slots.iter().any(|s| s.start == t(10, 0)));
        assert!(day.slots.iter().all(|s| s.start != t(11, 0)));

        let confirmed = bookings
            .set_status(business_id, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        let backwards = bookings
            .set_status(business_id, booking.id, BookingStatus::Pending)
            .await;
        assert!(matches!(backwards, Err(BookingError::InvalidTransition { .. })));

        let found = bookings
            .find_customer_bookings(business_id, Some("555-010-3000".to_string()), None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let cancelled = bookings
            .cancel_booking(business_id, booking.id, Some("Feeling unwell".to_string()))
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        let day = availability.available_slots(business_id, service_id, date).await.unwrap();
        assert_eq!(day.slots.len(), 6);

        BusinessService::new(pool).delete_business(business_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_requests_cannot_share_last_seat() {
        let Some(pool) = test_pool() else { return };
        let (business_id, service_id) = seed(&pool).await;
        let first = BookingService::new(pool.clone(), Arc::new(Notifier::disabled()));
        let second = BookingService::new(pool.clone(), Arc::new(Notifier::disabled()));

        let (a, b) = tokio::join!(
            first.create_booking(business_id, booking_request(service_id, 5, "09:30")),
            second.create_booking(business_id, booking_request(service_id, 5, "09:30")),
        );
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(BookingError::SlotUnavailable(_))))
                .count(),
            1
        );

        let date = Utc::now().date_naive() + Duration::days(5);
        let day = AvailabilityService::new(pool.clone())
            .available_slots(business_id, service_id, date)
            .await
            .unwrap();
        assert!(day.slots.iter().all(|s| s.start != t(9, 30)));

        BusinessService::new(pool).delete_business(business_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_voice_tools_book_against_live_schedule() {
        let Some(pool) = test_pool() else { return };
        let (business_id, _service_id) = seed(&pool).await;
        let config = AppConfig::from_lookup(|key| {
            HashMap::from([("DATABASE_URL", "postgres://unused"), ("ADMIN_API_TOKEN", "admin")])
                .get(key)
                .map(|v| v.to_string())
        })
        .unwrap();
        let state = AppState {
            conn: pool.clone(),
            config: Arc::new(config),
            voice_platform: None,
            notifier: Arc::new(Notifier::disabled()),
        };
        let mut ctx = BusinessContext::new(business_id);
        ctx.call_id = Some("call-flow-1".to_string());
        ctx.customer_phone = Some("+15550104000".to_string());

        let date = (Utc::now().date_naive() + Duration::days(3)).format("%Y-%m-%d").to_string();
        let slots = run_tool(&state, &ctx, Tool::GetBusinessAvailability, &json!({ "date": date })).await;
        assert!(slots.contains("9:00 AM"), "{slots}");

        let booked = run_tool(
            &state,
            &ctx,
            Tool::BookBusinessService,
            &json!({ "date": date, "time": "9am", "customer_name": "Sam" }),
        )
        .await;
        assert!(booked.contains("booking reference"), "{booked}");

        let again = run_tool(
            &state,
            &ctx,
            Tool::BookBusinessService,
            &json!({ "date": date, "time": "9am", "customer_name": "Alex" }),
        )
        .await;
        assert!(!again.contains("booking reference"), "{again}");

        let mine = run_tool(&state, &ctx, Tool::GetCustomerBookings, &json!({})).await;
        assert!(mine.contains("one upcoming booking"), "{mine}");

        BusinessService::new(pool).delete_business(business_id).await.unwrap();
    }
}
