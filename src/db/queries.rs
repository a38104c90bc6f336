use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::session::{DATE_FORMAT, TIME_FORMAT};
use crate::models::{Booking, BookingStatus, ChatMessage, Professional, Role, SessionPatch};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Sessions ──

pub fn load_session_fields(
    conn: &Connection,
    conversation_id: &str,
) -> anyhow::Result<HashMap<String, String>> {
    let mut stmt =
        conn.prepare("SELECT field, value FROM session_fields WHERE conversation_id = ?1")?;
    let rows = stmt.query_map(params![conversation_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut fields = HashMap::new();
    for row in rows {
        let (field, value) = row?;
        fields.insert(field, value);
    }
    Ok(fields)
}

/// Upserts each field of the patch independently, so concurrent writers
/// touching different fields never overwrite each other.
pub fn upsert_session_fields(
    conn: &Connection,
    conversation_id: &str,
    patch: &SessionPatch,
) -> anyhow::Result<()> {
    let now = Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string();
    let mut stmt = conn.prepare(
        "INSERT INTO session_fields (conversation_id, field, value, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(conversation_id, field) DO UPDATE SET
           value = excluded.value,
           updated_at = excluded.updated_at",
    )?;
    for (field, value) in patch.iter() {
        stmt.execute(params![conversation_id, field, value, now])?;
    }
    Ok(())
}

// ── Message history ──

pub fn append_message(
    conn: &Connection,
    conversation_id: &str,
    role: Role,
    content: &str,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO chat_messages (conversation_id, role, content) VALUES (?1, ?2, ?3)",
        params![conversation_id, role.as_str(), content],
    )?;
    Ok(())
}

pub fn get_messages(conn: &Connection, conversation_id: &str) -> anyhow::Result<Vec<ChatMessage>> {
    let mut stmt = conn.prepare(
        "SELECT role, content FROM chat_messages WHERE conversation_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![conversation_id], |row| {
        Ok(ChatMessage {
            role: row.get(0)?,
            content: row.get(1)?,
        })
    })?;

    let mut messages = vec![];
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

// ── Professionals ──

pub fn upsert_professional(conn: &Connection, prof: &Professional) -> anyhow::Result<()> {
    let working_days = serde_json::to_string(&prof.working_days)?;
    conn.execute(
        "INSERT INTO professionals (name, service_type, city, working_days, working_hours, certification, rating, years_experience, default_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(name) DO UPDATE SET
           service_type = excluded.service_type,
           city = excluded.city,
           working_days = excluded.working_days,
           working_hours = excluded.working_hours,
           certification = excluded.certification,
           rating = excluded.rating,
           years_experience = excluded.years_experience,
           default_time = excluded.default_time",
        params![
            prof.name,
            prof.service_type,
            prof.city,
            working_days,
            prof.working_hours,
            prof.certification,
            prof.rating,
            prof.years_experience,
            prof.default_time,
        ],
    )?;
    Ok(())
}

/// City must match exactly, service type as a substring; both ignore case.
pub fn find_professionals(
    conn: &Connection,
    city: &str,
    service_type: &str,
) -> anyhow::Result<Vec<Professional>> {
    let mut stmt = conn.prepare(
        "SELECT name, service_type, city, working_days, working_hours, certification, rating, years_experience, default_time
         FROM professionals
         WHERE LOWER(city) = LOWER(?1) AND INSTR(LOWER(service_type), LOWER(?2)) > 0
         ORDER BY name ASC",
    )?;
    let rows = stmt.query_map(params![city, service_type], |row| Ok(parse_professional_row(row)))?;

    let mut professionals = vec![];
    for row in rows {
        professionals.push(row??);
    }
    Ok(professionals)
}

pub fn get_professional_by_name(
    conn: &Connection,
    name: &str,
) -> anyhow::Result<Option<Professional>> {
    let result = conn.query_row(
        "SELECT name, service_type, city, working_days, working_hours, certification, rating, years_experience, default_time
         FROM professionals WHERE LOWER(name) = LOWER(?1)",
        params![name.trim()],
        |row| Ok(parse_professional_row(row)),
    );

    match result {
        Ok(prof) => Ok(Some(prof?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_professional_row(row: &rusqlite::Row) -> anyhow::Result<Professional> {
    let working_days_json: String = row.get(3)?;
    let working_days: Vec<String> = serde_json::from_str(&working_days_json).unwrap_or_default();

    Ok(Professional {
        name: row.get(0)?,
        service_type: row.get(1)?,
        city: row.get(2)?,
        working_days,
        working_hours: row.get(4)?,
        certification: row.get(5)?,
        rating: row.get(6)?,
        years_experience: row.get(7)?,
        default_time: row.get(8)?,
    })
}

// ── Bookings ──

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (booking_id, conversation_id, professional_name, service_type, customer_name, age, contact, email, booking_date, booking_time, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            booking.booking_id,
            booking.conversation_id,
            booking.professional_name,
            booking.service_type,
            booking.customer_name,
            booking.age,
            booking.contact,
            booking.email,
            booking.date_str(),
            booking.time_str(),
            booking.status.as_str(),
            booking.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn has_confirmed_booking(
    conn: &Connection,
    professional_name: &str,
    date: NaiveDate,
    time: NaiveTime,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE professional_name = ?1 AND booking_date = ?2 AND booking_time = ?3 AND status = 'confirmed'",
        params![
            professional_name,
            date.format(DATE_FORMAT).to_string(),
            time.format(TIME_FORMAT).to_string(),
        ],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn get_booking_for_conversation(
    conn: &Connection,
    conversation_id: &str,
) -> anyhow::Result<Option<Booking>> {
    let row = conn
        .query_row(
            "SELECT booking_id, conversation_id, professional_name, service_type, customer_name, age, contact, email, booking_date, booking_time, status, created_at
             FROM bookings WHERE conversation_id = ?1
             ORDER BY created_at DESC LIMIT 1",
            params![conversation_id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;

    row.transpose()
}

pub fn delete_booking_for_conversation(
    conn: &Connection,
    conversation_id: &str,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM bookings WHERE conversation_id = ?1",
        params![conversation_id],
    )?;
    Ok(count > 0)
}

/// True when the error comes from a UNIQUE constraint, e.g. a second
/// confirmed booking for an already taken slot.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let date_str: String = row.get(8)?;
    let time_str: String = row.get(9)?;
    let status_str: String = row.get(10)?;
    let created_at_str: String = row.get(11)?;

    let booking_date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .map_err(|e| anyhow::anyhow!("invalid booking_date {date_str:?}: {e}"))?;
    let booking_time = NaiveTime::parse_from_str(&time_str, TIME_FORMAT)
        .map_err(|e| anyhow::anyhow!("invalid booking_time {time_str:?}: {e}"))?;
    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking status {status_str:?}"))?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Booking {
        booking_id: row.get(0)?,
        conversation_id: row.get(1)?,
        professional_name: row.get(2)?,
        service_type: row.get(3)?,
        customer_name: row.get(4)?,
        age: row.get(5)?,
        contact: row.get(6)?,
        email: row.get(7)?,
        booking_date,
        booking_time,
        status,
        created_at,
    })
}
