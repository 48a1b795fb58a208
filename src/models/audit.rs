use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditKind {
    Inbound,
    Outbound,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Inbound => "inbound",
            AuditKind::Outbound => "outbound",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub owner_id: Option<String>,
    pub kind: String,
    pub content: String,
    pub created_at: String,
}
