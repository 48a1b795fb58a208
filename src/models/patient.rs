use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: String,
    pub owner_id: String,
    pub full_name: String,
    pub created_at: NaiveDateTime,
}
