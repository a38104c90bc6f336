//! The booking dialogue. Each turn loads the session, runs the operation
//! for its stage, persists the resulting fields and next stage, and
//! answers with a display string. No error escapes a turn.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::db::{self, queries};
use crate::errors::TurnError;
use crate::models::availability::weekday_name;
use crate::models::session::{fields, DATE_FORMAT, TIME_FORMAT};
use crate::models::{
    Booking, BookingStatus, CustomerDetails, Outcome, OutcomeKind, Professional, Session,
    SessionPatch, Stage,
};
use crate::services::extraction::{
    self, BookingRequest, Confirmation, ExtractedInput, DEFAULT_SERVICE_TYPE,
};
use crate::services::normalizer::display_text;
use crate::services::recommendation::{self, city_prompt};
use crate::services::scheduling::{validate_booking_slot, SchedulingError};
use crate::services::history;
use crate::state::AppState;

pub const APOLOGY: &str = "Something went wrong. Please try again.";
const COMPLETE_TEXT: &str = "Conversation complete. Thank you!";
const BOOKING_REMOVED: &str =
    "This conversation no longer has a booking on record. Please describe your health issue to book a new appointment.";
const DETAILS_REQUEST: &str = "Please provide your name, age, contact number, and email.";
const SLOT_REQUEST: &str = "Please provide the date (YYYY-MM-DD) and time (HH:MM) you would like.";

/// Hands out one async mutex per conversation id so turns of the same
/// conversation run one after another.
#[derive(Default)]
pub struct TurnLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TurnLocks {
    pub async fn acquire(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // entries nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(conversation_id.to_string())
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }

    pub fn tracked(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    InProgress,
    Confirmed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub conversation_id: String,
    pub response: String,
    pub status: TurnStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
}

/// An outcome plus the session fields it wants written.
struct Step {
    outcome: Outcome,
    patch: SessionPatch,
}

impl Step {
    fn with(outcome: Outcome, patch: SessionPatch) -> Self {
        Self { outcome, patch }
    }
}

impl From<Outcome> for Step {
    fn from(outcome: Outcome) -> Self {
        Self::with(outcome, SessionPatch::new())
    }
}

pub async fn start_conversation(state: &AppState, message: &str) -> TurnReply {
    let conversation_id = uuid::Uuid::new_v4().to_string();

    if let Err(e) = state
        .sessions
        .merge(&conversation_id, SessionPatch::new().stage(Stage::Recommendation))
        .await
    {
        tracing::warn!(conversation_id = %conversation_id, error = %e, "failed to create session");
    }

    run_turn(state, &conversation_id, message).await
}

pub async fn continue_conversation(state: &AppState, conversation_id: &str, message: &str) -> TurnReply {
    run_turn(state, conversation_id, message).await
}

async fn run_turn(state: &AppState, conversation_id: &str, message: &str) -> TurnReply {
    let _turn = state.turn_locks.acquire(conversation_id).await;
    let message = message.trim();

    let (stage, result) = match state.sessions.load(conversation_id).await {
        Ok(session) => (session.stage, handle_stage(state, &session, message).await),
        Err(e) => (Stage::Recommendation, Err(TurnError::Upstream(e))),
    };

    let mut step = resolve(conversation_id, stage, result);

    if step.outcome.kind != OutcomeKind::Error {
        if let Err(e) = commit(state, conversation_id, &step).await {
            tracing::error!(conversation_id, stage = stage.as_str(), error = %e, "failed to persist turn");
            step = Outcome::stay(OutcomeKind::Error, stage, APOLOGY).into();
        }
    }

    let outcome = step.outcome;
    let response = display_text(&outcome.reply);

    tracing::info!(
        conversation_id,
        stage = stage.as_str(),
        next_stage = outcome.next_stage.as_str(),
        kind = ?outcome.kind,
        "turn processed"
    );

    history::record_exchange(&state.db, conversation_id, message, &response);

    let status = match (&outcome.kind, &outcome.booking_id) {
        (OutcomeKind::Success, Some(_)) => TurnStatus::Confirmed,
        _ => TurnStatus::InProgress,
    };

    TurnReply {
        conversation_id: conversation_id.to_string(),
        response,
        status,
        booking_id: if status == TurnStatus::Confirmed { outcome.booking_id } else { None },
    }
}

/// Maps a failed operation onto the same stage with a re-prompt. Upstream
/// failures are logged and answered with the generic apology.
fn resolve(conversation_id: &str, stage: Stage, result: Result<Step, TurnError>) -> Step {
    let (kind, reply) = match result {
        Ok(step) => return step,
        Err(TurnError::Validation(missing)) => (
            OutcomeKind::Incomplete,
            format!("Please provide missing fields: {}.", missing.join(", ")),
        ),
        Err(TurnError::NotFound(message)) => (OutcomeKind::NotFound, message),
        Err(TurnError::Conflict(message)) => (OutcomeKind::Incomplete, message),
        Err(TurnError::Upstream(e)) => {
            tracing::error!(conversation_id, stage = stage.as_str(), error = %e, "turn failed");
            (OutcomeKind::Error, APOLOGY.to_string())
        }
    };
    Outcome::stay(kind, stage, reply).into()
}

async fn commit(state: &AppState, conversation_id: &str, step: &Step) -> anyhow::Result<()> {
    let next_stage = step.outcome.next_stage;
    state
        .sessions
        .merge(conversation_id, step.patch.clone().stage(next_stage))
        .await?;

    if next_stage.is_terminal() {
        state.sessions.clear(conversation_id).await?;
    }
    Ok(())
}

async fn handle_stage(state: &AppState, session: &Session, message: &str) -> Result<Step, TurnError> {
    match (session.stage, extraction::extract(session.stage, message)) {
        (Stage::Recommendation, ExtractedInput::Text(text)) => recommend(state, &text).await,
        (Stage::AwaitingCity, ExtractedInput::Text(text)) => {
            list_professionals(state, session, &text).await
        }
        (Stage::AwaitingProfSelection, ExtractedInput::Text(text)) => {
            select_professional(state, session, &text)
        }
        (Stage::AwaitingUserInfo, ExtractedInput::UserInfo(details)) => {
            Ok(collect_user_info(session, details))
        }
        (Stage::AwaitingConfirmation, ExtractedInput::Text(text)) => Ok(confirm_details(session, &text)),
        (Stage::AwaitingAvailability, ExtractedInput::Booking(request)) => {
            check_availability(state, session, request)
        }
        (Stage::AwaitingBookingConfirmation, ExtractedInput::Text(text)) => {
            confirm_booking(state, session, &text)
        }
        (Stage::Complete, _) => completed(state, session),
        (stage, _) => Err(TurnError::Upstream(anyhow::anyhow!(
            "extractor produced the wrong input shape for stage {}",
            stage.as_str()
        ))),
    }
}

// ── recommendation ──

async fn recommend(state: &AppState, text: &str) -> Result<Step, TurnError> {
    let rec = recommendation::recommend_service(state, text).await?;
    let reply = format!("{}\n\n{}", rec.text, city_prompt(&state.config.supported_cities));

    Ok(Step::with(
        Outcome::advance(Stage::AwaitingCity, reply),
        SessionPatch::new()
            .set(fields::RECOMMENDATION, rec.text)
            .set(fields::SERVICE_TYPE, rec.service_type),
    ))
}

// ── awaiting_city ──

async fn list_professionals(state: &AppState, session: &Session, text: &str) -> Result<Step, TurnError> {
    let cities = &state.config.supported_cities;
    let Some(city) = extraction::match_city(text, cities) else {
        return Err(TurnError::NotFound(format!(
            "Could not detect city. Please mention one of {}.",
            cities.join(", ")
        )));
    };

    let service_type = session
        .service_type
        .clone()
        .or_else(|| {
            session
                .recommendation
                .as_deref()
                .and_then(extraction::detect_service_type)
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_SERVICE_TYPE.to_string());

    let professionals = find_professionals(state, &city, &service_type).await?;
    if professionals.is_empty() {
        return Err(TurnError::NotFound(format!(
            "No {service_type}s found in {city}. Please try another city."
        )));
    }

    let listing = professionals
        .iter()
        .map(Professional::listing_line)
        .collect::<Vec<_>>()
        .join("\n");
    let names: Vec<&str> = professionals.iter().map(|p| p.name.as_str()).collect();
    let names = serde_json::to_string(&names).map_err(anyhow::Error::from)?;

    tracing::info!(conversation_id = %session.conversation_id, city = %city, service_type = %service_type, count = professionals.len(), "listed professionals");

    Ok(Step::with(
        Outcome::advance(
            Stage::AwaitingProfSelection,
            format!(
                "Here are the {service_type}s in {city}:\n{listing}\n\nPlease type the professional's name to continue."
            ),
        ),
        SessionPatch::new()
            .set(fields::CITY, city)
            .set(fields::SERVICE_TYPE, service_type)
            .set(fields::LISTED_PROFESSIONALS, names),
    ))
}

/// Directory lookup through the listing cache. Cache trouble only costs
/// a database query.
async fn find_professionals(
    state: &AppState,
    city: &str,
    service_type: &str,
) -> anyhow::Result<Vec<Professional>> {
    match state.sessions.cached_listing(city, service_type).await {
        Ok(Some(cached)) => {
            tracing::debug!(city, service_type, "using cached professional listing");
            return Ok(cached);
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(city, service_type, error = %e, "listing cache read failed"),
    }

    let professionals = {
        let conn = db::lock(&state.db)?;
        queries::find_professionals(&conn, city, service_type)?
    };

    if !professionals.is_empty() {
        if let Err(e) = state.sessions.cache_listing(city, service_type, &professionals).await {
            tracing::warn!(city, service_type, error = %e, "failed to cache professional listing");
        }
    }
    Ok(professionals)
}

// ── awaiting_prof_selection ──

fn select_professional(state: &AppState, session: &Session, text: &str) -> Result<Step, TurnError> {
    if session.listed_professionals.is_empty() {
        return Ok(Outcome {
            kind: OutcomeKind::NotFound,
            reply: format!(
                "No professionals have been listed yet. {}",
                city_prompt(&state.config.supported_cities)
            )
            .into(),
            next_stage: Stage::AwaitingCity,
            booking_id: None,
        }
        .into());
    }

    let not_found = || {
        TurnError::NotFound(
            "Could not detect the professional's name. Please type the exact name from the list."
                .to_string(),
        )
    };
    let name = match_listed_professional(text, &session.listed_professionals).ok_or_else(not_found)?;

    let professional = {
        let conn = db::lock(&state.db)?;
        queries::get_professional_by_name(&conn, &name)?
    }
    .ok_or_else(not_found)?;

    tracing::info!(conversation_id = %session.conversation_id, professional = %professional.name, "professional selected");

    Ok(Step::with(
        Outcome::advance(
            Stage::AwaitingUserInfo,
            format!(
                "{} ({}) selected. {DETAILS_REQUEST}",
                professional.name, professional.service_type
            ),
        ),
        SessionPatch::new()
            .set(fields::SELECTED_PROFESSIONAL, professional.name.as_str())
            .set(fields::SERVICE_TYPE, professional.service_type.as_str()),
    ))
}

/// Finds the listed name the text mentions, with or without its "Dr."
/// title. The longest match wins.
fn match_listed_professional(text: &str, listed: &[String]) -> Option<String> {
    listed
        .iter()
        .filter(|name| mentions_name(text, name))
        .max_by_key(|name| name.len())
        .cloned()
}

fn mentions_name(text: &str, name: &str) -> bool {
    let full = name.trim();
    let bare = full
        .strip_prefix("Dr.")
        .or_else(|| full.strip_prefix("Dr "))
        .unwrap_or(full)
        .trim();

    [full, bare].iter().filter(|n| !n.is_empty()).any(|n| {
        Regex::new(&format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(n)))
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    })
}

// ── awaiting_user_info ──

fn collect_user_info(session: &Session, supplied: CustomerDetails) -> Step {
    let customer = accumulate(&session.customer, supplied);
    let patch = SessionPatch::new().customer(&valid_only(&customer));
    let missing = extraction::missing_customer_fields(&customer);

    if !missing.is_empty() {
        return Step::with(
            Outcome::stay(
                OutcomeKind::Incomplete,
                Stage::AwaitingUserInfo,
                format!("Please provide missing fields: {}.", missing.join(", ")),
            ),
            patch,
        );
    }

    Step::with(
        Outcome::advance(Stage::AwaitingConfirmation, details_summary(&customer)),
        patch,
    )
}

/// Newly supplied values replace stored ones; stored valid values fill
/// the gaps.
fn accumulate(stored: &CustomerDetails, supplied: CustomerDetails) -> CustomerDetails {
    let current = valid_only(stored);
    CustomerDetails {
        name: supplied.name.or(current.name),
        age: supplied.age.or(current.age),
        contact: supplied.contact.or(current.contact),
        email: supplied.email.or(current.email),
    }
}

fn valid_only(customer: &CustomerDetails) -> CustomerDetails {
    CustomerDetails {
        name: customer.name.clone().filter(|n| !n.trim().is_empty()),
        age: customer.age.filter(|a| *a > 0),
        contact: customer
            .contact
            .clone()
            .filter(|c| extraction::is_valid_contact(c)),
        email: customer.email.clone().filter(|e| extraction::is_valid_email(e)),
    }
}

fn details_summary(customer: &CustomerDetails) -> String {
    format!(
        "Please confirm your details:\nName: {}\nAge: {}\nContact: {}\nEmail: {}\n\nReply 'yes' to confirm or 'no' to change them.",
        customer.name.as_deref().unwrap_or_default(),
        customer.age.map(|a| a.to_string()).unwrap_or_default(),
        customer.contact.as_deref().unwrap_or_default(),
        customer.email.as_deref().unwrap_or_default(),
    )
}

// ── awaiting_confirmation ──

fn confirm_details(session: &Session, text: &str) -> Step {
    match extraction::parse_confirmation(text) {
        Confirmation::Yes => {
            let name = session.customer.name.as_deref().unwrap_or("there");
            let with = session
                .selected_professional
                .as_deref()
                .map(|p| format!(" with {p}"))
                .unwrap_or_default();
            Outcome::advance(
                Stage::AwaitingAvailability,
                format!("Thank you, {name}. Your details are saved. When would you like your appointment{with}? {SLOT_REQUEST}"),
            )
            .into()
        }
        Confirmation::No => Outcome {
            kind: OutcomeKind::Incomplete,
            reply: "No problem. Please send the details you want to change (name, age, contact number, or email).".into(),
            next_stage: Stage::AwaitingUserInfo,
            booking_id: None,
        }
        .into(),
        Confirmation::Unclear => Outcome::stay(
            OutcomeKind::Incomplete,
            Stage::AwaitingConfirmation,
            "Please reply 'yes' to confirm your details or 'no' to change them.",
        )
        .into(),
    }
}

// ── awaiting_availability ──

fn check_availability(state: &AppState, session: &Session, request: BookingRequest) -> Result<Step, TurnError> {
    let Some(selected) = session.selected_professional.as_deref() else {
        return Ok(back_to_city(state));
    };

    let (date, time) = match (request.date, request.time) {
        (Some(date), Some(time)) => (date, time),
        (date, time) => {
            let mut missing = vec![];
            if date.is_none() {
                missing.push("date (YYYY-MM-DD)".to_string());
            }
            if time.is_none() {
                missing.push("time (HH:MM)".to_string());
            }
            return Err(TurnError::Validation(missing));
        }
    };

    let conn = db::lock(&state.db)?;
    let professional = queries::get_professional_by_name(&conn, selected)?
        .ok_or_else(|| TurnError::NotFound(format!("{selected} could not be found.")))?;

    match validate_booking_slot(&conn, &professional, date, time) {
        Ok(()) => {}
        Err(conflict @ SchedulingError::Conflict { .. }) => {
            return Err(TurnError::Conflict(conflict.to_string()))
        }
        Err(SchedulingError::Store(e)) => return Err(TurnError::Upstream(e)),
        Err(unavailable) => {
            return Ok(Outcome::stay(
                OutcomeKind::Incomplete,
                Stage::AwaitingAvailability,
                unavailable.to_string(),
            )
            .into())
        }
    }
    drop(conn);

    let booking_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conversation_id = %session.conversation_id, professional = %professional.name, booking_id = %booking_id, "slot available, awaiting confirmation");

    Ok(Step::with(
        Outcome::advance(
            Stage::AwaitingBookingConfirmation,
            format!(
                "{} is available on {} ({}) at {}. Reply 'yes' to confirm the booking or 'no' to choose another time.",
                professional.name,
                date.format(DATE_FORMAT),
                weekday_name(date.weekday()),
                time.format(TIME_FORMAT),
            ),
        ),
        SessionPatch::new()
            .date(fields::BOOKING_DATE, date)
            .time(fields::BOOKING_TIME, time)
            .set(fields::BOOKING_ID, booking_id),
    ))
}

fn back_to_city(state: &AppState) -> Step {
    Outcome {
        kind: OutcomeKind::NotFound,
        reply: format!(
            "No professional has been selected yet. {}",
            city_prompt(&state.config.supported_cities)
        )
        .into(),
        next_stage: Stage::AwaitingCity,
        booking_id: None,
    }
    .into()
}

// ── awaiting_booking_confirmation ──

fn confirm_booking(state: &AppState, session: &Session, text: &str) -> Result<Step, TurnError> {
    match extraction::parse_confirmation(text) {
        Confirmation::Yes => {}
        Confirmation::No => return Ok(pick_another_slot("Okay.")),
        Confirmation::Unclear => {
            return Ok(Outcome::stay(
                OutcomeKind::Incomplete,
                Stage::AwaitingBookingConfirmation,
                "Please reply 'yes' to confirm the booking or 'no' to choose another time.",
            )
            .into())
        }
    }

    let Some(selected) = session.selected_professional.as_deref() else {
        return Ok(back_to_city(state));
    };
    let (Some(date), Some(time)) = (session.booking_date, session.booking_time) else {
        return Ok(pick_another_slot("The requested slot was lost."));
    };
    let customer = valid_only(&session.customer);
    let (Some(name), Some(age), Some(contact), Some(email)) =
        (customer.name, customer.age, customer.contact, customer.email)
    else {
        return Ok(Outcome {
            kind: OutcomeKind::Incomplete,
            reply: DETAILS_REQUEST.into(),
            next_stage: Stage::AwaitingUserInfo,
            booking_id: None,
        }
        .into());
    };

    let booking_id = session
        .booking_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let conn = db::lock(&state.db)?;

    // a retried confirmation whose insert already went through
    if let Some(existing) = queries::get_booking_for_conversation(&conn, &session.conversation_id)? {
        if existing.booking_id == booking_id && existing.status == BookingStatus::Confirmed {
            drop(conn);
            return Ok(confirmed_step(&existing));
        }
    }

    let professional = queries::get_professional_by_name(&conn, selected)?
        .ok_or_else(|| TurnError::NotFound(format!("{selected} could not be found.")))?;

    match validate_booking_slot(&conn, &professional, date, time) {
        Ok(()) => {}
        Err(SchedulingError::Store(e)) => return Err(TurnError::Upstream(e)),
        Err(unavailable) => return Ok(pick_another_slot(&unavailable.to_string())),
    }

    let booking = Booking {
        booking_id,
        conversation_id: session.conversation_id.clone(),
        professional_name: professional.name.clone(),
        service_type: session
            .service_type
            .clone()
            .or_else(|| Some(professional.service_type.clone())),
        customer_name: name,
        age,
        contact,
        email,
        booking_date: date,
        booking_time: time,
        status: BookingStatus::Confirmed,
        created_at: Utc::now().naive_utc(),
    };

    match queries::create_booking(&conn, &booking) {
        Ok(()) => {}
        Err(e) if queries::is_unique_violation(&e) => {
            tracing::warn!(conversation_id = %session.conversation_id, professional = %professional.name, "slot taken between check and insert");
            return Ok(pick_another_slot(
                &SchedulingError::Conflict {
                    professional: professional.name,
                }
                .to_string(),
            ));
        }
        Err(e) => return Err(TurnError::Upstream(e)),
    }
    drop(conn);

    tracing::info!(
        conversation_id = %session.conversation_id,
        professional = %booking.professional_name,
        booking_id = %booking.booking_id,
        "booking confirmed"
    );

    Ok(confirmed_step(&booking))
}

// ── complete ──

/// A finished conversation only reports the booking while its row exists.
/// Once deleted, the dialogue restarts at the recommendation step.
fn completed(state: &AppState, session: &Session) -> Result<Step, TurnError> {
    let booking = {
        let conn = db::lock(&state.db)?;
        queries::get_booking_for_conversation(&conn, &session.conversation_id)?
    };

    match booking {
        Some(booking) if booking.status == BookingStatus::Confirmed => {
            Ok(Outcome::confirmed(booking.booking_id, COMPLETE_TEXT).into())
        }
        _ => {
            tracing::info!(conversation_id = %session.conversation_id, "booking no longer on record, restarting");
            Ok(Outcome {
                kind: OutcomeKind::NotFound,
                reply: BOOKING_REMOVED.into(),
                next_stage: Stage::Recommendation,
                booking_id: None,
            }
            .into())
        }
    }
}

fn confirmed_step(booking: &Booking) -> Step {
    let service = booking
        .service_type
        .as_deref()
        .map(|s| format!(" ({s})"))
        .unwrap_or_default();
    Step::with(
        Outcome::confirmed(
            booking.booking_id.clone(),
            format!(
                "Booking confirmed with {}{service} on {} at {}. Your booking id is {}.",
                booking.professional_name,
                booking.date_str(),
                booking.time_str(),
                booking.booking_id,
            ),
        ),
        SessionPatch::new().set(fields::BOOKING_ID, booking.booking_id.as_str()),
    )
}

fn pick_another_slot(reason: &str) -> Step {
    Outcome {
        kind: OutcomeKind::Incomplete,
        reply: format!("{reason} {SLOT_REQUEST}").into(),
        next_stage: Stage::AwaitingAvailability,
        booking_id: None,
    }
    .into()
}
