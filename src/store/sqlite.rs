use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;

use super::{AppointmentStore, AuditSink, ConversationStore, OwnerStore, PatientStore};
use crate::db::queries;
use crate::models::{
    Appointment, AppointmentStatus, AuditEntry, AuditKind, AvailabilityBlock, ConversationState,
    Owner, Patient, TimeRange,
};

#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))
    }

    pub fn save_owner(&self, owner: &Owner) -> anyhow::Result<()> {
        queries::save_owner(&*self.conn()?, owner)
    }

    pub fn purge_expired_conversations(&self) -> anyhow::Result<usize> {
        queries::expire_old_conversations(&*self.conn()?)
    }

    pub fn audit_entries(
        &self,
        owner_id: Option<&str>,
        limit: i64,
    ) -> anyhow::Result<Vec<AuditEntry>> {
        queries::list_audit_entries(&*self.conn()?, owner_id, limit)
    }
}

#[async_trait]
impl AppointmentStore for SqliteStore {
    async fn create_appointment(
        &self,
        id: &str,
        owner_id: &str,
        patient_id: &str,
        scheduled_at: NaiveDateTime,
        duration_minutes: i32,
    ) -> anyhow::Result<()> {
        let now = Utc::now().naive_utc();
        let apt = Appointment {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            patient_id: patient_id.to_string(),
            patient_name: None,
            scheduled_at,
            duration_minutes,
            status: AppointmentStatus::Scheduled,
            created_at: now,
            updated_at: now,
        };
        if queries::create_appointment(&*self.conn()?, &apt)? {
            tracing::info!(appointment_id = id, owner_id, "appointment created");
        } else {
            tracing::warn!(appointment_id = id, "appointment already exists, skipping insert");
        }
        Ok(())
    }

    async fn list_appointments(
        &self,
        owner_id: &str,
        range: Option<TimeRange>,
    ) -> anyhow::Result<Vec<Appointment>> {
        queries::list_appointments(&*self.conn()?, owner_id, range.as_ref())
    }

    async fn cancel_appointment(&self, id: &str) -> anyhow::Result<()> {
        let updated =
            queries::update_appointment_status(&*self.conn()?, id, AppointmentStatus::Cancelled)?;
        anyhow::ensure!(updated, "appointment not found: {id}");
        tracing::info!(appointment_id = id, "appointment cancelled");
        Ok(())
    }

    async fn find_conflicting(
        &self,
        owner_id: &str,
        range: TimeRange,
    ) -> anyhow::Result<Option<Appointment>> {
        queries::find_conflicting(&*self.conn()?, owner_id, &range)
    }

    async fn create_block(
        &self,
        id: &str,
        owner_id: &str,
        range: TimeRange,
        reason: Option<&str>,
    ) -> anyhow::Result<()> {
        let block = AvailabilityBlock {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            starts_at: range.start,
            ends_at: range.end,
            reason: reason.map(str::to_string),
        };
        if queries::create_block(&*self.conn()?, &block)? {
            tracing::info!(block_id = id, owner_id, "availability block created");
        } else {
            tracing::warn!(block_id = id, "availability block already exists, skipping insert");
        }
        Ok(())
    }

    async fn list_blocks(
        &self,
        owner_id: &str,
        range: TimeRange,
    ) -> anyhow::Result<Vec<AvailabilityBlock>> {
        queries::list_blocks(&*self.conn()?, owner_id, &range)
    }
}

#[async_trait]
impl PatientStore for SqliteStore {
    async fn find_by_exact_name(
        &self,
        owner_id: &str,
        name: &str,
    ) -> anyhow::Result<Option<Patient>> {
        queries::find_patient_by_exact_name(&*self.conn()?, owner_id, name)
    }

    async fn list_all(&self, owner_id: &str) -> anyhow::Result<Vec<Patient>> {
        queries::list_patients(&*self.conn()?, owner_id)
    }

    async fn create(&self, id: &str, owner_id: &str, name: &str) -> anyhow::Result<Patient> {
        let patient = Patient {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            full_name: name.trim().to_string(),
            created_at: Utc::now().naive_utc(),
        };
        let conn = self.conn()?;
        if queries::create_patient(&conn, &patient)? {
            tracing::info!(patient_id = id, owner_id, "patient registered");
            return Ok(patient);
        }
        tracing::warn!(patient_id = id, "patient already registered, skipping insert");
        queries::get_patient(&conn, id)?
            .ok_or_else(|| anyhow::anyhow!("patient not found: {id}"))
    }
}

#[async_trait]
impl OwnerStore for SqliteStore {
    async fn get_owner(&self, owner_id: &str) -> anyhow::Result<Option<Owner>> {
        queries::get_owner(&*self.conn()?, owner_id)
    }

    async fn find_owner_by_identity(&self, identity: &str) -> anyhow::Result<Option<String>> {
        queries::find_owner_by_phone(&*self.conn()?, identity)
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<ConversationState>> {
        queries::get_conversation(&*self.conn()?, key)
    }

    async fn set(
        &self,
        key: &str,
        state: &ConversationState,
        ttl_seconds: i64,
    ) -> anyhow::Result<()> {
        queries::save_conversation(&*self.conn()?, key, state, ttl_seconds)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        queries::delete_conversation(&*self.conn()?, key)
    }
}

#[async_trait]
impl AuditSink for SqliteStore {
    async fn append(
        &self,
        owner_id: Option<&str>,
        kind: AuditKind,
        content: &str,
    ) -> anyhow::Result<()> {
        queries::insert_audit_entry(&*self.conn()?, owner_id, kind.as_str(), content)?;
        Ok(())
    }
}
