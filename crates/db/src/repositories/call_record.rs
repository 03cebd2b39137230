use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use leadcall_core::domain::call::{CallId, CallRecord};
use leadcall_core::domain::lead::{LeadId, LeadStatus};

use super::{parse_score, parse_timestamp, CallRecordRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCallRecordRepository {
    pool: DbPool,
}

impl SqlCallRecordRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CallRecordRepository for SqlCallRecordRepository {
    async fn insert(&self, record: CallRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO call_records (
                call_id,
                lead_id,
                provider_status,
                ended_reason,
                transcript,
                summary,
                duration_secs,
                cost,
                recording_url,
                lead_status,
                qualification_score,
                recorded_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.call_id.0)
        .bind(&record.lead_id.0)
        .bind(record.provider_status.as_deref())
        .bind(&record.ended_reason)
        .bind(&record.transcript)
        .bind(&record.summary)
        .bind(record.duration_secs)
        .bind(record.cost.map(|cost| cost.to_string()))
        .bind(record.recording_url.as_deref())
        .bind(record.lead_status.as_str())
        .bind(i64::from(record.qualification_score))
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<CallRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                call_id,
                lead_id,
                provider_status,
                ended_reason,
                transcript,
                summary,
                duration_secs,
                cost,
                recording_url,
                lead_status,
                qualification_score,
                recorded_at
             FROM call_records
             WHERE lead_id = ?
             ORDER BY recorded_at ASC",
        )
        .bind(&lead_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: SqliteRow) -> Result<CallRecord, RepositoryError> {
    let status_raw = row.try_get::<String, _>("lead_status")?;
    let lead_status = LeadStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown lead status `{status_raw}`")))?;

    let cost = row
        .try_get::<Option<String>, _>("cost")?
        .map(|raw| {
            Decimal::from_str(&raw)
                .map_err(|error| RepositoryError::Decode(format!("invalid cost `{raw}` ({error})")))
        })
        .transpose()?;

    Ok(CallRecord {
        call_id: CallId(row.try_get("call_id")?),
        lead_id: LeadId(row.try_get("lead_id")?),
        provider_status: row.try_get("provider_status")?,
        ended_reason: row.try_get("ended_reason")?,
        transcript: row.try_get("transcript")?,
        summary: row.try_get("summary")?,
        duration_secs: row.try_get("duration_secs")?,
        cost,
        recording_url: row.try_get("recording_url")?,
        lead_status,
        qualification_score: parse_score(
            "qualification_score",
            row.try_get("qualification_score")?,
        )?,
        recorded_at: parse_timestamp("recorded_at", row.try_get("recorded_at")?)?,
    })
}
