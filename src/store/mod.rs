//! Collaborators the scheduling core reads and writes through. `SqliteStore`
//! implements all of them; callers hold them as trait objects.

pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::models::{
    Appointment, AuditKind, AvailabilityBlock, ConversationState, Owner, Patient, TimeRange,
};

pub use sqlite::SqliteStore;

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Inserting an id that already exists is a no-op, so a confirmation
    /// replayed after a failed state write books nothing new.
    async fn create_appointment(
        &self,
        id: &str,
        owner_id: &str,
        patient_id: &str,
        scheduled_at: NaiveDateTime,
        duration_minutes: i32,
    ) -> anyhow::Result<()>;

    /// Scheduled appointments only, ordered by start time.
    async fn list_appointments(
        &self,
        owner_id: &str,
        range: Option<TimeRange>,
    ) -> anyhow::Result<Vec<Appointment>>;

    async fn cancel_appointment(&self, id: &str) -> anyhow::Result<()>;

    async fn find_conflicting(
        &self,
        owner_id: &str,
        range: TimeRange,
    ) -> anyhow::Result<Option<Appointment>>;

    /// No-op for an id that already exists.
    async fn create_block(
        &self,
        id: &str,
        owner_id: &str,
        range: TimeRange,
        reason: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn list_blocks(
        &self,
        owner_id: &str,
        range: TimeRange,
    ) -> anyhow::Result<Vec<AvailabilityBlock>>;
}

#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn find_by_exact_name(&self, owner_id: &str, name: &str)
        -> anyhow::Result<Option<Patient>>;

    async fn list_all(&self, owner_id: &str) -> anyhow::Result<Vec<Patient>>;

    /// Returns the stored patient when `id` is already registered.
    async fn create(&self, id: &str, owner_id: &str, name: &str) -> anyhow::Result<Patient>;
}

#[async_trait]
pub trait OwnerStore: Send + Sync {
    async fn get_owner(&self, owner_id: &str) -> anyhow::Result<Option<Owner>>;

    /// `identity` is already normalized to digits.
    async fn find_owner_by_identity(&self, identity: &str) -> anyhow::Result<Option<String>>;
}

/// Expired records must read back as `None`.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<ConversationState>>;

    async fn set(&self, key: &str, state: &ConversationState, ttl_seconds: i64)
        -> anyhow::Result<()>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(
        &self,
        owner_id: Option<&str>,
        kind: AuditKind,
        content: &str,
    ) -> anyhow::Result<()>;
}
