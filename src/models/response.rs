use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{AvailableSlot, Conflict, ConversationState, Timeframe, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgendaEntry {
    pub appointment_id: String,
    pub patient_name: Option<String>,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
}

/// What to tell the user, before any wording or localization is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseIntent {
    NotRegistered,
    Help,
    Unknown,
    MessageTooLong {
        max: usize,
    },
    ValidationFailed {
        errors: Vec<ValidationError>,
    },
    ScheduleConflict {
        conflicts: Vec<Conflict>,
        suggestions: Vec<AvailableSlot>,
    },
    ConfirmSchedule {
        patient_name: String,
        scheduled_at: NaiveDateTime,
        duration_minutes: i32,
    },
    ConfirmPatientRegistration {
        patient_name: String,
        scheduled_at: NaiveDateTime,
    },
    ConfirmCancel {
        appointment_id: String,
        patient_name: String,
        scheduled_at: NaiveDateTime,
    },
    ConfirmBlock {
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
        /// Scheduled sessions already inside the interval.
        overlapping_appointments: usize,
    },
    AppointmentScheduled {
        appointment_id: String,
        patient_name: String,
        scheduled_at: NaiveDateTime,
        duration_minutes: i32,
    },
    AppointmentCancelled {
        appointment_id: String,
        patient_name: String,
        scheduled_at: NaiveDateTime,
    },
    TimeBlocked {
        block_id: String,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
    },
    ActionCancelled,
    Agenda {
        timeframe: Timeframe,
        from: NaiveDate,
        to: NaiveDate,
        entries: Vec<AgendaEntry>,
    },
    InternalError,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    pub success: bool,
    pub response: ResponseIntent,
    pub next_state: Option<ConversationState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingResult {
    pub fn ok(response: ResponseIntent, next_state: Option<ConversationState>) -> Self {
        Self {
            success: true,
            response,
            next_state,
            error: None,
        }
    }

    pub fn internal_error(error: &anyhow::Error) -> Self {
        Self {
            success: false,
            response: ResponseIntent::InternalError,
            next_state: None,
            error: Some(error.to_string()),
        }
    }
}
