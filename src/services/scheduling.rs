use chrono::{NaiveDate, NaiveTime, Weekday};
use rusqlite::Connection;

use crate::db::queries;
use crate::models::availability::weekday_name;
use crate::models::session::{DATE_FORMAT, TIME_FORMAT};
use crate::models::{AvailabilityDecision, Professional};

#[derive(Debug)]
pub enum SchedulingError {
    NotWorkingDay {
        professional: String,
        requested_weekday: Weekday,
        suggestion: Option<(NaiveDate, NaiveTime)>,
    },
    Conflict {
        professional: String,
    },
    Store(anyhow::Error),
}

impl std::fmt::Display for SchedulingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulingError::NotWorkingDay {
                professional,
                requested_weekday,
                suggestion: Some((date, time)),
            } => write!(
                f,
                "{professional} is not available on {}. Next available slot: {} at {}.",
                weekday_name(*requested_weekday),
                date.format(DATE_FORMAT),
                time.format(TIME_FORMAT),
            ),
            SchedulingError::NotWorkingDay { professional, .. } => {
                write!(f, "{professional} is not available any day this week.")
            }
            SchedulingError::Conflict { professional } => write!(
                f,
                "{professional} is already booked at that time. Please choose another date or time."
            ),
            SchedulingError::Store(e) => write!(f, "failed to check existing bookings: {e}"),
        }
    }
}

impl std::error::Error for SchedulingError {}

/// Checks a requested slot against the professional's week and the
/// confirmed bookings. The conflict query only runs for a working day.
pub fn validate_booking_slot(
    conn: &Connection,
    professional: &Professional,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<(), SchedulingError> {
    match professional.schedule().resolve(date.and_time(time)) {
        AvailabilityDecision::Available => {}
        AvailabilityDecision::Suggest {
            requested_weekday,
            date,
            time,
        } => {
            return Err(SchedulingError::NotWorkingDay {
                professional: professional.name.clone(),
                requested_weekday,
                suggestion: Some((date, time)),
            })
        }
        AvailabilityDecision::NoSlotThisWeek { requested_weekday } => {
            return Err(SchedulingError::NotWorkingDay {
                professional: professional.name.clone(),
                requested_weekday,
                suggestion: None,
            })
        }
    }

    let taken = queries::has_confirmed_booking(conn, &professional.name, date, time)
        .map_err(SchedulingError::Store)?;
    if taken {
        return Err(SchedulingError::Conflict {
            professional: professional.name.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Booking, BookingStatus};

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn time(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, TIME_FORMAT).unwrap()
    }

    fn raj(days: &[&str]) -> Professional {
        Professional {
            name: "Dr. Raj Sharma".to_string(),
            service_type: "Cardiologist".to_string(),
            city: "Delhi".to_string(),
            working_days: days.iter().map(|d| d.to_string()).collect(),
            working_hours: Some("10:00-16:00".to_string()),
            certification: Some("MD Cardiology".to_string()),
            rating: Some(4.6),
            years_experience: Some(12),
            default_time: Some("11:30".to_string()),
        }
    }

    fn confirmed(conn: &Connection, id: &str, d: &str, t: &str) {
        let booking = Booking {
            booking_id: id.to_string(),
            conversation_id: format!("conv-{id}"),
            professional_name: "Dr. Raj Sharma".to_string(),
            service_type: Some("Cardiologist".to_string()),
            customer_name: "Asha".to_string(),
            age: 34,
            contact: "9876543210".to_string(),
            email: "asha@example.com".to_string(),
            booking_date: date(d),
            booking_time: time(t),
            status: BookingStatus::Confirmed,
            created_at: chrono::Utc::now().naive_utc(),
        };
        queries::create_booking(conn, &booking).unwrap();
    }

    #[test]
    fn test_working_day_free_slot() {
        let conn = setup_db();
        // 2025-10-22 is a Wednesday
        let result = validate_booking_slot(&conn, &raj(&["Monday", "Wednesday"]), date("2025-10-22"), time("10:00"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_non_working_day_suggests_next_at_default_time() {
        let conn = setup_db();
        let err = validate_booking_slot(
            &conn,
            &raj(&["Monday", "Wednesday", "Friday"]),
            date("2025-10-21"),
            time("10:00"),
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Dr. Raj Sharma is not available on Tuesday. Next available slot: 2025-10-22 at 11:30."
        );
    }

    #[test]
    fn test_no_working_days_at_all() {
        let conn = setup_db();
        let err = validate_booking_slot(&conn, &raj(&[]), date("2025-10-21"), time("10:00")).unwrap_err();
        assert!(matches!(err, SchedulingError::NotWorkingDay { suggestion: None, .. }));
        assert!(err.to_string().contains("any day this week"));
    }

    #[test]
    fn test_conflict_with_confirmed_booking() {
        let conn = setup_db();
        confirmed(&conn, "b1", "2025-10-22", "10:00");

        let err = validate_booking_slot(&conn, &raj(&["Wednesday"]), date("2025-10-22"), time("10:00"))
            .unwrap_err();
        assert!(matches!(err, SchedulingError::Conflict { .. }));
    }

    #[test]
    fn test_other_time_same_day_is_free() {
        let conn = setup_db();
        confirmed(&conn, "b1", "2025-10-22", "10:00");

        let result = validate_booking_slot(&conn, &raj(&["Wednesday"]), date("2025-10-22"), time("10:30"));
        assert!(result.is_ok());
    }
}
