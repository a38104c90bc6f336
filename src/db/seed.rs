use std::fs;
use std::path::Path;

use anyhow::Context;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::availability::parse_weekday;
use crate::models::Professional;

/// Upserts the professionals listed in a JSON array file. Entries with
/// unknown weekday names are rejected before anything is written.
pub fn seed_professionals(conn: &Connection, path: &Path) -> anyhow::Result<usize> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file: {}", path.display()))?;
    let professionals: Vec<Professional> =
        serde_json::from_str(&raw).context("failed to parse professionals seed")?;

    for prof in &professionals {
        for day in &prof.working_days {
            parse_weekday(day).with_context(|| format!("professional {}", prof.name))?;
        }
    }

    for prof in &professionals {
        queries::upsert_professional(conn, prof)?;
    }

    tracing::info!(count = professionals.len(), "seeded professionals");
    Ok(professionals.len())
}
