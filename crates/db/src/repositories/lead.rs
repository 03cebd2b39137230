use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use leadcall_core::domain::call::CallId;
use leadcall_core::domain::lead::{
    truncate_transcript, Lead, LeadId, LeadStatus, LeadUpdate, PropertyDetails, FOLLOW_UP_CAP,
};

use super::{
    parse_optional_timestamp, parse_optional_u32, parse_score, parse_timestamp, parse_u32,
    LeadQuery, LeadRepository, RepositoryError,
};
use crate::DbPool;

const SELECT_LEAD: &str = "SELECT
        id,
        user_id,
        contact_person,
        phone_number,
        email,
        property_name,
        location,
        price_crores,
        bedrooms,
        bathrooms,
        area_sqft,
        property_type,
        builder,
        possession_status,
        amenities,
        notes,
        status,
        priority,
        follow_up_count,
        last_call_id,
        last_contacted,
        last_call_result,
        qualification_score,
        last_call_summary,
        last_call_transcript,
        call_scheduled_at,
        call_completed_at,
        callback_scheduled_at,
        call_error,
        call_failed_at,
        created_at,
        updated_at
     FROM leads";

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let sql = format!("{SELECT_LEAD} WHERE id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;

        row.map(lead_from_row).transpose()
    }

    async fn list_dialable(&self, query: &LeadQuery) -> Result<Vec<Lead>, RepositoryError> {
        let sql = format!(
            "{SELECT_LEAD}
             WHERE (
                    status IN ('to_call', 'callback_requested', 'call_failed')
                    OR (status = 'follow_up' AND follow_up_count < ?)
                   )
               AND (? IS NULL OR user_id = ?)
             ORDER BY priority DESC, created_at ASC
             LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(FOLLOW_UP_CAP))
            .bind(query.user_id.as_deref())
            .bind(query.user_id.as_deref())
            .bind(i64::from(query.limit))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(lead_from_row).collect()
    }

    async fn apply_update(
        &self,
        id: &LeadId,
        update: &LeadUpdate,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let at = at.to_rfc3339();
        let result = match update {
            LeadUpdate::Calling => {
                sqlx::query(
                    "UPDATE leads
                     SET status = ?, call_scheduled_at = ?, updated_at = ?
                     WHERE id = ?",
                )
                .bind(LeadStatus::Calling.as_str())
                .bind(&at)
                .bind(&at)
                .bind(&id.0)
                .execute(&self.pool)
                .await?
            }
            LeadUpdate::InCall { call_id } => {
                sqlx::query(
                    "UPDATE leads
                     SET status = ?, last_call_id = ?, last_contacted = ?, updated_at = ?
                     WHERE id = ?",
                )
                .bind(LeadStatus::InCall.as_str())
                .bind(&call_id.0)
                .bind(&at)
                .bind(&at)
                .bind(&id.0)
                .execute(&self.pool)
                .await?
            }
            LeadUpdate::CallFailed { error } => {
                sqlx::query(
                    "UPDATE leads
                     SET status = ?, call_error = ?, call_failed_at = ?, updated_at = ?
                     WHERE id = ?",
                )
                .bind(LeadStatus::CallFailed.as_str())
                .bind(error)
                .bind(&at)
                .bind(&at)
                .bind(&id.0)
                .execute(&self.pool)
                .await?
            }
            LeadUpdate::CallCompleted(completed) => {
                sqlx::query(
                    "UPDATE leads
                     SET status = ?,
                         follow_up_count = ?,
                         last_call_id = ?,
                         last_contacted = ?,
                         last_call_result = ?,
                         qualification_score = ?,
                         last_call_summary = ?,
                         last_call_transcript = ?,
                         call_completed_at = ?,
                         callback_scheduled_at = ?,
                         updated_at = ?
                     WHERE id = ?",
                )
                .bind(completed.status.as_str())
                .bind(i64::from(completed.follow_up_count))
                .bind(&completed.call_id.0)
                .bind(&at)
                .bind(&completed.result)
                .bind(i64::from(completed.qualification_score))
                .bind(&completed.summary)
                .bind(truncate_transcript(&completed.transcript))
                .bind(&at)
                .bind(completed.callback_scheduled_at.map(|value| value.to_rfc3339()))
                .bind(&at)
                .bind(&id.0)
                .execute(&self.pool)
                .await?
            }
            LeadUpdate::ResetFollowUps => {
                sqlx::query(
                    "UPDATE leads
                     SET follow_up_count = 0,
                         status = CASE WHEN status = 'unresponsive' THEN 'follow_up' ELSE status END,
                         updated_at = ?
                     WHERE id = ?",
                )
                .bind(&at)
                .bind(&id.0)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: "lead", id: id.0.clone() });
        }
        Ok(())
    }

    async fn mark_calling(
        &self,
        ids: &[LeadId],
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let at = at.to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let mut changed = 0;

        for id in ids {
            changed += sqlx::query(
                "UPDATE leads
                 SET status = ?, call_scheduled_at = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(LeadStatus::Calling.as_str())
            .bind(&at)
            .bind(&at)
            .bind(&id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(changed)
    }

    async fn save(&self, lead: Lead) -> Result<(), RepositoryError> {
        let property = &lead.property;
        sqlx::query(
            "INSERT INTO leads (
                id,
                user_id,
                contact_person,
                phone_number,
                email,
                property_name,
                location,
                price_crores,
                bedrooms,
                bathrooms,
                area_sqft,
                property_type,
                builder,
                possession_status,
                amenities,
                notes,
                status,
                priority,
                follow_up_count,
                last_call_id,
                last_contacted,
                last_call_result,
                qualification_score,
                last_call_summary,
                last_call_transcript,
                call_scheduled_at,
                call_completed_at,
                callback_scheduled_at,
                call_error,
                call_failed_at,
                created_at,
                updated_at
             ) VALUES (
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
             )
             ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                contact_person = excluded.contact_person,
                phone_number = excluded.phone_number,
                email = excluded.email,
                property_name = excluded.property_name,
                location = excluded.location,
                price_crores = excluded.price_crores,
                bedrooms = excluded.bedrooms,
                bathrooms = excluded.bathrooms,
                area_sqft = excluded.area_sqft,
                property_type = excluded.property_type,
                builder = excluded.builder,
                possession_status = excluded.possession_status,
                amenities = excluded.amenities,
                notes = excluded.notes,
                status = excluded.status,
                priority = excluded.priority,
                follow_up_count = excluded.follow_up_count,
                last_call_id = excluded.last_call_id,
                last_contacted = excluded.last_contacted,
                last_call_result = excluded.last_call_result,
                qualification_score = excluded.qualification_score,
                last_call_summary = excluded.last_call_summary,
                last_call_transcript = excluded.last_call_transcript,
                call_scheduled_at = excluded.call_scheduled_at,
                call_completed_at = excluded.call_completed_at,
                callback_scheduled_at = excluded.callback_scheduled_at,
                call_error = excluded.call_error,
                call_failed_at = excluded.call_failed_at,
                updated_at = excluded.updated_at",
        )
        .bind(&lead.id.0)
        .bind(lead.user_id.as_deref())
        .bind(&lead.contact_person)
        .bind(&lead.phone_number)
        .bind(lead.email.as_deref())
        .bind(property.property_name.as_deref())
        .bind(property.location.as_deref())
        .bind(property.price_crores)
        .bind(property.bedrooms.map(i64::from))
        .bind(property.bathrooms.map(i64::from))
        .bind(property.area_sqft.map(i64::from))
        .bind(property.property_type.as_deref())
        .bind(property.builder.as_deref())
        .bind(property.possession_status.as_deref())
        .bind(property.amenities.as_deref())
        .bind(lead.notes.as_deref())
        .bind(lead.status.as_str())
        .bind(lead.priority)
        .bind(i64::from(lead.follow_up_count))
        .bind(lead.last_call_id.as_ref().map(|call_id| call_id.0.as_str()))
        .bind(lead.last_contacted.map(|value| value.to_rfc3339()))
        .bind(lead.last_call_result.as_deref())
        .bind(lead.qualification_score.map(i64::from))
        .bind(lead.last_call_summary.as_deref())
        .bind(lead.last_call_transcript.as_deref().map(truncate_transcript))
        .bind(lead.call_scheduled_at.map(|value| value.to_rfc3339()))
        .bind(lead.call_completed_at.map(|value| value.to_rfc3339()))
        .bind(lead.callback_scheduled_at.map(|value| value.to_rfc3339()))
        .bind(lead.call_error.as_deref())
        .bind(lead.call_failed_at.map(|value| value.to_rfc3339()))
        .bind(lead.created_at.to_rfc3339())
        .bind(lead.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn lead_from_row(row: SqliteRow) -> Result<Lead, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = LeadStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown lead status `{status_raw}`")))?;

    Ok(Lead {
        id: LeadId(row.try_get("id")?),
        user_id: row.try_get("user_id")?,
        contact_person: row.try_get("contact_person")?,
        phone_number: row.try_get("phone_number")?,
        email: row.try_get("email")?,
        property: PropertyDetails {
            property_name: row.try_get("property_name")?,
            location: row.try_get("location")?,
            price_crores: row.try_get("price_crores")?,
            bedrooms: parse_optional_u32("bedrooms", row.try_get("bedrooms")?)?,
            bathrooms: parse_optional_u32("bathrooms", row.try_get("bathrooms")?)?,
            area_sqft: parse_optional_u32("area_sqft", row.try_get("area_sqft")?)?,
            property_type: row.try_get("property_type")?,
            builder: row.try_get("builder")?,
            possession_status: row.try_get("possession_status")?,
            amenities: row.try_get("amenities")?,
        },
        notes: row.try_get("notes")?,
        status,
        priority: row.try_get("priority")?,
        follow_up_count: parse_u32("follow_up_count", row.try_get("follow_up_count")?)?,
        last_call_id: row.try_get::<Option<String>, _>("last_call_id")?.map(CallId),
        last_contacted: parse_optional_timestamp("last_contacted", row.try_get("last_contacted")?)?,
        last_call_result: row.try_get("last_call_result")?,
        qualification_score: row
            .try_get::<Option<i64>, _>("qualification_score")?
            .map(|value| parse_score("qualification_score", value))
            .transpose()?,
        last_call_summary: row.try_get("last_call_summary")?,
        last_call_transcript: row.try_get("last_call_transcript")?,
        call_scheduled_at: parse_optional_timestamp(
            "call_scheduled_at",
            row.try_get("call_scheduled_at")?,
        )?,
        call_completed_at: parse_optional_timestamp(
            "call_completed_at",
            row.try_get("call_completed_at")?,
        )?,
        callback_scheduled_at: parse_optional_timestamp(
            "callback_scheduled_at",
            row.try_get("callback_scheduled_at")?,
        )?,
        call_error: row.try_get("call_error")?,
        call_failed_at: parse_optional_timestamp("call_failed_at", row.try_get("call_failed_at")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
