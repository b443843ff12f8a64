//! # Record Store Module
//!
//! Append-only persistence of candidate records in a single SQLite table.

use std::str::FromStr;
use std::time::Instant;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use crate::extraction::CandidateFields;
use crate::observability;

/// Default database location, next to the running process
pub const DEFAULT_DATABASE_URL: &str = "sqlite://extracted_data.db";

/// A stored candidate together with its assigned identifier
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CandidateRecord {
    pub id: i64,
    #[serde(flatten)]
    pub fields: CandidateFields,
}

/// Open a connection pool, creating the database file if it does not exist
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    info!(max_connections = max_connections, "Connecting to SQLite database");

    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid database URL: {database_url}"))?
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("Failed to connect to database")
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &SqlitePool) -> Result<()> {
    info!("Initializing database schema");
    let start = Instant::now();

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS candidates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            dob TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NOT NULL,
            address TEXT NOT NULL,
            training TEXT NOT NULL,
            certifications TEXT NOT NULL,
            family TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create candidates table")?;

    observability::record_db_metrics("init_schema", start.elapsed());
    info!("Database schema initialized successfully");
    Ok(())
}

/// Insert one candidate and return its new id
pub async fn insert_candidate(pool: &SqlitePool, fields: &CandidateFields) -> Result<i64> {
    debug!(name = %fields.name, "Inserting candidate record");
    let start = Instant::now();

    let result = sqlx::query(
        "INSERT INTO candidates
            (name, dob, email, phone, address, training, certifications, family)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&fields.name)
    .bind(&fields.dob)
    .bind(&fields.email)
    .bind(&fields.phone)
    .bind(&fields.address)
    .bind(&fields.training)
    .bind(&fields.certifications)
    .bind(&fields.family)
    .execute(pool)
    .await
    .context("Failed to insert candidate record")?;

    let id = result.last_insert_rowid();
    observability::record_db_metrics("insert_candidate", start.elapsed());
    debug!(record_id = %id, "Candidate record inserted");

    Ok(id)
}

/// Read every candidate in insertion order
pub async fn list_candidates(pool: &SqlitePool) -> Result<Vec<CandidateRecord>> {
    debug!("Listing candidate records");
    let start = Instant::now();

    let rows = sqlx::query(
        "SELECT id, name, dob, email, phone, address, training, certifications, family
         FROM candidates
         ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list candidate records")?;

    let records = rows
        .into_iter()
        .map(|row| CandidateRecord {
            id: row.get(0),
            fields: CandidateFields {
                name: row.get(1),
                dob: row.get(2),
                email: row.get(3),
                phone: row.get(4),
                address: row.get(5),
                training: row.get(6),
                certifications: row.get(7),
                family: row.get(8),
            },
        })
        .collect::<Vec<_>>();

    observability::record_db_metrics("list_candidates", start.elapsed());
    debug!(count = records.len(), "Candidate records loaded");
    Ok(records)
}

pub async fn count_candidates(pool: &SqlitePool) -> Result<i64> {
    let start = Instant::now();

    let count: i64 = sqlx::query("SELECT COUNT(*) FROM candidates")
        .fetch_one(pool)
        .await
        .context("Failed to count candidate records")?
        .get(0);

    observability::record_db_metrics("count_candidates", start.elapsed());
    Ok(count)
}

/// Cheap liveness query used by the health endpoint
pub async fn ping(pool: &SqlitePool) -> Result<()> {
    let start = Instant::now();

    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("Database did not answer SELECT 1")?;

    observability::record_db_metrics("ping", start.elapsed());
    Ok(())
}
