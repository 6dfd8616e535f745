#[cfg(test)]
mod slot_availability_tests {
    use chrono::{NaiveDate, NaiveTime};
    use uuid::Uuid;
    use wecallsmart::availability::{compute_slots, nearest_slots, slot_starting_at, OccupiedInterval};
    use wecallsmart::catalog::{AvailabilityWindow, BreakTime};
    use wecallsmart::voice::parse::{parse_voice_date, parse_voice_time};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn salon_tuesday() -> AvailabilityWindow {
        let availability_id = Uuid::new_v4();
        AvailabilityWindow {
            id: availability_id,
            service_id: Uuid::new_v4(),
            day_of_week: 2,
            open_time: t(9, 0),
            close_time: t(17, 0),
            break_between_minutes: 15,
            max_concurrent: 2,
            is_available: true,
            breaks: vec![BreakTime {
                id: Uuid::new_v4(),
                availability_id,
                start_time: t(12, 0),
                end_time: t(13, 0),
                label: Some("Lunch".to_string()),
            }],
        }
    }

    #[test]
    fn test_haircut_day_with_lunch_and_buffer() {
        let slots = compute_slots(&salon_tuesday(), 45, &[], None).unwrap();
        let starts: Vec<NaiveTime> = slots.iter().map(|s| s.start).collect();
        // 45 min appointments every hour; 12:00 falls in lunch
        assert_eq!(
            starts,
            vec![t(9, 0), t(10, 0), t(11, 0), t(13, 0), t(14, 0), t(15, 0), t(16, 0)]
        );
        assert!(slots.iter().all(|s| s.remaining == 2));
    }

    #[test]
    fn test_capacity_counts_overlapping_bookings() {
        let occupied = [
            OccupiedInterval { start: t(10, 0), duration_minutes: 45 },
            OccupiedInterval { start: t(10, 30), duration_minutes: 45 },
            OccupiedInterval { start: t(14, 0), duration_minutes: 45 },
        ];
        let slots = compute_slots(&salon_tuesday(), 45, &occupied, None).unwrap();

        assert!(slot_starting_at(&slots, t(10, 0)).is_none());
        assert_eq!(slot_starting_at(&slots, t(11, 0)).map(|s| s.remaining), Some(1));
        assert_eq!(slot_starting_at(&slots, t(14, 0)).map(|s| s.remaining), Some(1));
        assert_eq!(slot_starting_at(&slots, t(9, 0)).map(|s| s.remaining), Some(2));
    }

    #[test]
    fn test_same_day_floor_and_alternatives() {
        let slots = compute_slots(&salon_tuesday(), 45, &[], Some(t(13, 30))).unwrap();
        assert_eq!(slots.first().map(|s| s.start), Some(t(14, 0)));

        let suggestions = nearest_slots(&slots, t(15, 20), 2);
        let starts: Vec<NaiveTime> = suggestions.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![t(15, 0), t(16, 0)]);
    }

    #[test]
    fn test_closed_day_has_no_slots() {
        let mut window = salon_tuesday();
        window.is_available = false;
        assert!(compute_slots(&window, 30, &[], None).unwrap().is_empty());
    }

    #[test]
    fn test_caller_phrases_resolve_to_a_bookable_slot() {
        // Monday 2024-06-03
        let today = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let date = parse_voice_date("tuesday", today).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 4).unwrap());

        let time = parse_voice_time("2pm").unwrap();
        let slots = compute_slots(&salon_tuesday(), 45, &[], None).unwrap();
        assert!(slot_starting_at(&slots, time).is_some());
    }
}
