use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Field names shared by the fast cache and the durable session rows.
pub mod fields {
    pub const STAGE: &str = "stage";
    pub const RECOMMENDATION: &str = "recommendation";
    pub const SERVICE_TYPE: &str = "service_type";
    pub const CITY: &str = "city";
    pub const LISTED_PROFESSIONALS: &str = "listed_professionals";
    pub const SELECTED_PROFESSIONAL: &str = "selected_professional";
    pub const NAME: &str = "name";
    pub const AGE: &str = "age";
    pub const CONTACT: &str = "contact";
    pub const EMAIL: &str = "email";
    pub const BOOKING_DATE: &str = "booking_date";
    pub const BOOKING_TIME: &str = "booking_time";
    pub const BOOKING_ID: &str = "booking_id";
}

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Recommendation,
    AwaitingCity,
    AwaitingProfSelection,
    AwaitingUserInfo,
    AwaitingConfirmation,
    AwaitingAvailability,
    AwaitingBookingConfirmation,
    Complete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Recommendation => "recommendation",
            Stage::AwaitingCity => "awaiting_city",
            Stage::AwaitingProfSelection => "awaiting_prof_selection",
            Stage::AwaitingUserInfo => "awaiting_user_info",
            Stage::AwaitingConfirmation => "awaiting_confirmation",
            Stage::AwaitingAvailability => "awaiting_availability",
            Stage::AwaitingBookingConfirmation => "awaiting_booking_confirmation",
            Stage::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "awaiting_city" => Stage::AwaitingCity,
            "awaiting_prof_selection" => Stage::AwaitingProfSelection,
            "awaiting_user_info" => Stage::AwaitingUserInfo,
            "awaiting_confirmation" => Stage::AwaitingConfirmation,
            "awaiting_availability" => Stage::AwaitingAvailability,
            "awaiting_booking_confirmation" => Stage::AwaitingBookingConfirmation,
            "complete" => Stage::Complete,
            _ => Stage::Recommendation,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Complete)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub contact: Option<String>,
    pub email: Option<String>,
}

/// Typed view of one conversation, rebuilt every turn from the cache and
/// the durable store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub conversation_id: String,
    pub stage: Stage,
    pub recommendation: Option<String>,
    pub service_type: Option<String>,
    pub city: Option<String>,
    pub listed_professionals: Vec<String>,
    pub selected_professional: Option<String>,
    pub customer: CustomerDetails,
    pub booking_date: Option<NaiveDate>,
    pub booking_time: Option<NaiveTime>,
    pub booking_id: Option<String>,
}

impl Session {
    pub fn new(conversation_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            ..Default::default()
        }
    }

    /// Builds a session from raw string fields. Unparseable values are
    /// treated as absent.
    pub fn from_fields(conversation_id: &str, raw: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            raw.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            conversation_id: conversation_id.to_string(),
            stage: get(fields::STAGE)
                .map(|s| Stage::parse(&s))
                .unwrap_or_default(),
            recommendation: get(fields::RECOMMENDATION),
            service_type: get(fields::SERVICE_TYPE),
            city: get(fields::CITY),
            listed_professionals: get(fields::LISTED_PROFESSIONALS)
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            selected_professional: get(fields::SELECTED_PROFESSIONAL),
            customer: CustomerDetails {
                name: get(fields::NAME),
                age: get(fields::AGE).and_then(|a| a.parse().ok()),
                contact: get(fields::CONTACT),
                email: get(fields::EMAIL),
            },
            booking_date: get(fields::BOOKING_DATE)
                .and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok()),
            booking_time: get(fields::BOOKING_TIME)
                .and_then(|t| NaiveTime::parse_from_str(&t, TIME_FORMAT).ok()),
            booking_id: get(fields::BOOKING_ID),
        }
    }
}

/// A set of field writes. Blank values are dropped on insertion so they
/// never reach the cache or the durable store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    fields: BTreeMap<String, String>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(self, stage: Stage) -> Self {
        self.set(fields::STAGE, stage.as_str())
    }

    pub fn set(mut self, field: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.fields.insert(field.to_string(), value);
        }
        self
    }

    pub fn set_opt<V: Into<String>>(self, field: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(field, v),
            None => self,
        }
    }

    pub fn date(self, field: &str, date: NaiveDate) -> Self {
        self.set(field, date.format(DATE_FORMAT).to_string())
    }

    pub fn time(self, field: &str, time: NaiveTime) -> Self {
        self.set(field, time.format(TIME_FORMAT).to_string())
    }

    pub fn customer(self, customer: &CustomerDetails) -> Self {
        self.set_opt(fields::NAME, customer.name.clone())
            .set_opt(fields::AGE, customer.age.map(|a| a.to_string()))
            .set_opt(fields::CONTACT, customer.contact.clone())
            .set_opt(fields::EMAIL, customer.email.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.fields.iter()
    }

    pub fn into_map(self) -> HashMap<String, String> {
        self.fields.into_iter().collect()
    }
}
