use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::session::{DATE_FORMAT, TIME_FORMAT};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub booking_id: String,
    pub conversation_id: String,
    pub professional_name: String,
    pub service_type: Option<String>,
    pub customer_name: String,
    pub age: u32,
    pub contact: String,
    pub email: String,
    pub booking_date: NaiveDate,
    pub booking_time: NaiveTime,
    pub status: BookingStatus,
    pub created_at: NaiveDateTime,
}

impl Booking {
    pub fn date_str(&self) -> String {
        self.booking_date.format(DATE_FORMAT).to_string()
    }

    pub fn time_str(&self) -> String {
        self.booking_time.format(TIME_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(BookingStatus::Confirmed),
            _ => None,
        }
    }
}
