use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// The mutation waiting for a yes/no from the owner. Ids of the records it
/// creates are fixed here, so executing it twice stores one row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PendingAction {
    Schedule {
        appointment_id: String,
        patient_id: String,
        patient_name: String,
        scheduled_at: NaiveDateTime,
        duration_minutes: i32,
    },
    Cancel {
        appointment_id: String,
        patient_name: String,
        scheduled_at: NaiveDateTime,
    },
    Block {
        block_id: String,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
    },
}

impl PendingAction {
    pub fn command(&self) -> &'static str {
        match self {
            PendingAction::Schedule { .. } => "schedule",
            PendingAction::Cancel { .. } => "cancel",
            PendingAction::Block { .. } => "block",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Parsing,
    AwaitingConfirmation {
        pending: PendingAction,
    },
    AwaitingPatientRegistration {
        patient_id: String,
        patient_name: String,
        proposed_at: NaiveDateTime,
        duration_minutes: i32,
    },
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Parsing => "parsing",
            Step::AwaitingConfirmation { .. } => "awaiting_confirmation",
            Step::AwaitingPatientRegistration { .. } => "awaiting_patient_registration",
        }
    }
}

/// Dialogue context for one conversation key. Completion deletes the record,
/// so there is no terminal step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationState {
    pub owner_id: String,
    pub step: Step,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl ConversationState {
    pub fn new(owner_id: &str, now: NaiveDateTime, ttl_seconds: i64) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            step: Step::Parsing,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_seconds),
        }
    }

    pub fn pending_command(&self) -> Option<&'static str> {
        match &self.step {
            Step::AwaitingConfirmation { pending } => Some(pending.command()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_state_serializes_step_tag() {
        let mut state = ConversationState::new("owner-1", dt("2026-10-19 09:00"), 300);
        state.step = Step::AwaitingConfirmation {
            pending: PendingAction::Cancel {
                appointment_id: "apt-1".to_string(),
                patient_name: "Ana".to_string(),
                scheduled_at: dt("2026-10-22 14:00"),
            },
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["step"]["step"], "awaiting_confirmation");
        assert_eq!(json["step"]["pending"]["command"], "cancel");

        let back: ConversationState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
        assert_eq!(back.pending_command(), Some("cancel"));
    }

    #[test]
    fn test_new_state_is_parsing_with_ttl() {
        let state = ConversationState::new("owner-1", dt("2026-10-19 09:00"), 300);
        assert_eq!(state.step, Step::Parsing);
        assert_eq!(state.expires_at, dt("2026-10-19 09:05"));
        assert_eq!(state.pending_command(), None);
    }
}
