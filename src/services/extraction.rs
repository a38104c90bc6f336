//! Pattern-based extraction of structured fields from free text.
//!
//! Every function here is total: text that does not match simply yields an
//! absent field.

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::session::{DATE_FORMAT, TIME_FORMAT};
use crate::models::{CustomerDetails, Stage};

pub const KNOWN_SERVICE_TYPES: [&str; 4] = ["Cardiologist", "Dermatologist", "Dentist", "Neurologist"];
pub const DEFAULT_SERVICE_TYPE: &str = "General Practitioner";

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:my name is|i am)\s+([a-z]+)").unwrap());
// Also matches the first short number in unrelated text, e.g. a day of month.
static AGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3})\s*(?:years|yo|y/o)?\b").unwrap());
static CONTACT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{10}\b").unwrap());
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w.-]+@[\w.-]+\.\w+").unwrap());
static VALID_EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").unwrap());
static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap());
static TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2}:\d{2})\b").unwrap());
static SERVICE_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(cardiologist|dermatologist|dentist|neurologist)s?\b").unwrap()
});

const YES_WORDS: [&str; 6] = ["yes", "y", "confirm", "yeah", "correct", "ok"];
const NO_WORDS: [&str; 6] = ["no", "n", "wrong", "incorrect", "change", "edit"];

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedInput {
    Text(String),
    UserInfo(CustomerDetails),
    Booking(BookingRequest),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingRequest {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    Unclear,
}

/// Picks the extraction strategy for the stage the conversation is in.
pub fn extract(stage: Stage, raw: &str) -> ExtractedInput {
    match stage {
        Stage::AwaitingUserInfo => ExtractedInput::UserInfo(extract_user_info(raw)),
        Stage::AwaitingAvailability => ExtractedInput::Booking(extract_booking_request(raw)),
        _ => ExtractedInput::Text(raw.trim().to_string()),
    }
}

pub fn extract_user_info(text: &str) -> CustomerDetails {
    let lower = text.to_lowercase();

    CustomerDetails {
        name: NAME_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| capitalize(m.as_str())),
        age: AGE_RE
            .captures(&lower)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        contact: CONTACT_RE.find(text).map(|m| m.as_str().to_string()),
        email: EMAIL_RE.find(text).map(|m| m.as_str().to_string()),
    }
}

/// Reads an ISO date (YYYY-MM-DD) and a clock time (HH:MM) from anywhere
/// in the text. Calendar-invalid values are dropped.
pub fn extract_booking_request(text: &str) -> BookingRequest {
    BookingRequest {
        date: ISO_DATE_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| NaiveDate::parse_from_str(m.as_str(), DATE_FORMAT).ok()),
        time: TIME_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| NaiveTime::parse_from_str(m.as_str(), TIME_FORMAT).ok()),
    }
}

pub fn parse_confirmation(text: &str) -> Confirmation {
    let answer = text
        .trim()
        .trim_end_matches(|c: char| c == '.' || c == '!')
        .to_lowercase();

    if YES_WORDS.contains(&answer.as_str()) {
        Confirmation::Yes
    } else if NO_WORDS.contains(&answer.as_str()) {
        Confirmation::No
    } else {
        Confirmation::Unclear
    }
}

/// Returns the first known city mentioned as a whole word, in its
/// configured spelling.
pub fn match_city(text: &str, cities: &[String]) -> Option<String> {
    cities
        .iter()
        .find(|city| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(city.trim())))
                .map(|re| re.is_match(text))
                .unwrap_or(false)
        })
        .cloned()
}

pub fn detect_service_type(text: &str) -> Option<&'static str> {
    let found = SERVICE_TYPE_RE.captures(text)?.get(1)?.as_str().to_lowercase();
    KNOWN_SERVICE_TYPES
        .iter()
        .copied()
        .find(|known| known.to_lowercase() == found)
}

pub fn is_valid_contact(contact: &str) -> bool {
    contact.len() == 10 && contact.chars().all(|c| c.is_ascii_digit())
}

pub fn is_valid_email(email: &str) -> bool {
    VALID_EMAIL_RE.is_match(email)
}

/// Lists the personal fields that are still missing or invalid, in the
/// wording shown to the user.
pub fn missing_customer_fields(customer: &CustomerDetails) -> Vec<String> {
    let mut missing = Vec::new();
    if customer.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
        missing.push("name".to_string());
    }
    if customer.age.map_or(true, |a| a == 0) {
        missing.push("valid age".to_string());
    }
    if !customer.contact.as_deref().is_some_and(is_valid_contact) {
        missing.push("valid contact number".to_string());
    }
    if !customer.email.as_deref().is_some_and(is_valid_email) {
        missing.push("valid email".to_string());
    }
    missing
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + &c.as_str().to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cities() -> Vec<String> {
        crate::config::default_cities()
    }

    #[test]
    fn test_extract_full_user_info() {
        let info = extract_user_info("Hi, my name is asha, 34 years, 9876543210, asha.k@example.com");
        assert_eq!(info.name.as_deref(), Some("Asha"));
        assert_eq!(info.age, Some(34));
        assert_eq!(info.contact.as_deref(), Some("9876543210"));
        assert_eq!(info.email.as_deref(), Some("asha.k@example.com"));
        assert!(missing_customer_fields(&info).is_empty());
    }

    #[test]
    fn test_i_am_pattern_and_yo_suffix() {
        let info = extract_user_info("I am JOHN, 41yo");
        assert_eq!(info.name.as_deref(), Some("John"));
        assert_eq!(info.age, Some(41));
        assert_eq!(info.contact, None);
        assert_eq!(info.email, None);
    }

    #[test]
    fn test_short_contact_is_not_extracted() {
        let info = extract_user_info("My name is Ravi, 30 years, contact 12345, ravi@example.com");
        assert_eq!(info.contact, None);
        assert_eq!(info.age, Some(30));
        assert_eq!(missing_customer_fields(&info), vec!["valid contact number"]);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert_eq!(extract_user_info(""), CustomerDetails::default());
        assert_eq!(extract_booking_request("   "), BookingRequest::default());
        assert_eq!(
            missing_customer_fields(&CustomerDetails::default()),
            vec!["name", "valid age", "valid contact number", "valid email"]
        );
    }

    #[test]
    fn test_zero_age_and_bad_email_are_invalid() {
        let info = CustomerDetails {
            name: Some("Asha".to_string()),
            age: Some(0),
            contact: Some("9876543210".to_string()),
            email: Some("asha.example.com".to_string()),
        };
        assert_eq!(missing_customer_fields(&info), vec!["valid age", "valid email"]);
    }

    #[test]
    fn test_email_check_is_permissive() {
        assert!(is_valid_email("a@b.c"));
        assert!(is_valid_email("first.last-1@mail.example.co"));
        assert!(!is_valid_email("asha@example"));
        assert!(!is_valid_email("asha k@example.com"));
    }

    #[test]
    fn test_extract_booking_request_anywhere_in_text() {
        let req = extract_booking_request("Could I come on 2025-10-21 at 9:30 please?");
        assert_eq!(req.date, NaiveDate::from_ymd_opt(2025, 10, 21));
        assert_eq!(req.time, NaiveTime::from_hms_opt(9, 30, 0));
    }

    #[test]
    fn test_invalid_calendar_values_are_dropped() {
        let req = extract_booking_request("2025-13-45 25:99");
        assert_eq!(req, BookingRequest::default());
    }

    #[test]
    fn test_extract_dispatches_by_stage() {
        assert_eq!(
            extract(Stage::AwaitingCity, "  Pune \n"),
            ExtractedInput::Text("Pune".to_string())
        );
        assert!(matches!(
            extract(Stage::AwaitingUserInfo, "my name is Asha"),
            ExtractedInput::UserInfo(_)
        ));
        assert!(matches!(
            extract(Stage::AwaitingAvailability, "2025-10-21 10:00"),
            ExtractedInput::Booking(BookingRequest { date: Some(_), time: Some(_) })
        ));
    }

    #[test]
    fn test_extraction_never_panics_on_odd_input() {
        for text in ["\u{0}", "@@@@", "1234567890123", "ñandú 12:", "::::", "my name is", "🙂 i am 😀"] {
            let _ = extract_user_info(text);
            let _ = extract_booking_request(text);
            let _ = parse_confirmation(text);
            let _ = match_city(text, &cities());
        }
    }

    #[test]
    fn test_parse_confirmation() {
        assert_eq!(parse_confirmation(" Yes! "), Confirmation::Yes);
        assert_eq!(parse_confirmation("ok"), Confirmation::Yes);
        assert_eq!(parse_confirmation("Incorrect."), Confirmation::No);
        assert_eq!(parse_confirmation("maybe later"), Confirmation::Unclear);
    }

    #[test]
    fn test_match_city_whole_word_only() {
        assert_eq!(match_city("I live in pune", &cities()).as_deref(), Some("Pune"));
        assert_eq!(match_city("Punekar", &cities()), None);
        assert_eq!(match_city("Mumbai", &cities()), None);
    }

    #[test]
    fn test_detect_service_type() {
        assert_eq!(
            detect_service_type("You should consult a CARDIOLOGIST soon."),
            Some("Cardiologist")
        );
        assert_eq!(detect_service_type("Dentists can help"), Some("Dentist"));
        assert_eq!(detect_service_type("Please rest."), None);
    }
}
