use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use leadcall_core::domain::call::CallRecord;
use leadcall_core::domain::lead::{Lead, LeadId, LeadUpdate};

pub mod call_record;
pub mod lead;
pub mod memory;

pub use call_record::SqlCallRecordRepository;
pub use lead::SqlLeadRepository;
pub use memory::{InMemoryCallRecordRepository, InMemoryLeadRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} `{id}` already exists")]
    Conflict { entity: &'static str, id: String },
}

/// Selection window for the next calling run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeadQuery {
    pub limit: u32,
    pub user_id: Option<String>,
}

impl LeadQuery {
    pub fn new(limit: u32) -> Self {
        Self { limit, user_id: None }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;

    /// Leads eligible for another attempt, highest priority first and oldest
    /// first within a priority.
    async fn list_dialable(&self, query: &LeadQuery) -> Result<Vec<Lead>, RepositoryError>;

    /// Fails with `NotFound` when no lead has this id.
    async fn apply_update(
        &self,
        id: &LeadId,
        update: &LeadUpdate,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Marks every listed lead `calling` in one unit of work. Returns how many
    /// leads were changed.
    async fn mark_calling(&self, ids: &[LeadId], at: DateTime<Utc>)
        -> Result<u64, RepositoryError>;

    /// Insert or replace a lead. Used for seeding and administration.
    async fn save(&self, lead: Lead) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CallRecordRepository: Send + Sync {
    async fn insert(&self, record: CallRecord) -> Result<(), RepositoryError>;
    async fn list_for_lead(&self, lead_id: &LeadId) -> Result<Vec<CallRecord>, RepositoryError>;
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_optional_u32(
    column: &str,
    value: Option<i64>,
) -> Result<Option<u32>, RepositoryError> {
    value.map(|value| parse_u32(column, value)).transpose()
}

pub(crate) fn parse_score(column: &str, value: i64) -> Result<u8, RepositoryError> {
    u8::try_from(value).ok().filter(|score| *score <= 100).ok_or_else(|| {
        RepositoryError::Decode(format!("invalid value for `{column}` (expected 0..=100): {value}"))
    })
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: String,
) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}
