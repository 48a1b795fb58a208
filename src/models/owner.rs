use serde::{Deserialize, Serialize};

use super::WorkingHours;

/// The practitioner whose calendar and patients are managed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub name: String,
    /// Digits only, as produced by identity normalization.
    pub phone: String,
    pub timezone: String,
    pub working_hours: WorkingHours,
    pub default_duration_minutes: i32,
}
