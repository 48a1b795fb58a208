use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{Appointment, AvailabilityBlock};

/// A reason a command cannot be carried out. These are user-facing outcomes,
/// not failures of the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("patient name is required")]
    MissingPatientName,

    #[error("date and time are required")]
    MissingDateTime,

    #[error("time of day is required")]
    MissingTime,

    #[error("date or time does not exist on the calendar")]
    InvalidDate,

    #[error("owner not found")]
    OwnerNotFound,

    #[error("outside working hours ({hours})")]
    OutsideWorkingHours { hours: String },

    #[error("requested time is in the past")]
    InPast,

    #[error("time slot is already taken")]
    Conflict,

    #[error("patient not found: {patient_name}")]
    PatientNotFound { patient_name: String },

    #[error("no session found for {patient_name}")]
    NoSessionFound {
        patient_name: String,
        date: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conflict {
    Appointment {
        appointment_id: String,
        patient_name: Option<String>,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
    },
    Block {
        block_id: String,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
        reason: Option<String>,
    },
}

impl From<&Appointment> for Conflict {
    fn from(apt: &Appointment) -> Self {
        Conflict::Appointment {
            appointment_id: apt.id.clone(),
            patient_name: apt.patient_name.clone(),
            starts_at: apt.scheduled_at,
            ends_at: apt.ends_at(),
        }
    }
}

impl From<&AvailabilityBlock> for Conflict {
    fn from(block: &AvailabilityBlock) -> Self {
        Conflict::Block {
            block_id: block.id.clone(),
            starts_at: block.starts_at,
            ends_at: block.ends_at,
            reason: block.reason.clone(),
        }
    }
}
