use chrono::Duration;

use crate::models::{
    Action, AgendaEntry, AuditKind, ConversationState, Owner, ParsedCommand, PendingAction,
    ProcessingResult, ResponseIntent, Step, TimeRange, Timeframe, ValidationError,
};
use crate::services::audit::record_audit;
use crate::services::clock::local_now;
use crate::services::identity::normalize_and_resolve;
use crate::services::parser::{self, fold};
use crate::services::scheduling;
use crate::state::AppState;

const POSITIVE_REPLIES: &[&str] = &[
    "sim", "s", "yes", "y", "ok", "confirmar", "confirmo", "confirma",
];

/// What happens to the stored conversation once a message is handled.
enum Next {
    Save(ConversationState),
    Clear,
}

/// Single entry point for an inbound chat message. Never fails: any store
/// error becomes an `InternalError` intent and the stored state is left as is.
pub async fn handle(
    state: &AppState,
    conversation_key: &str,
    owner_identity: &str,
    text: &str,
) -> ProcessingResult {
    let mut owner_id = None;
    let result = match process(state, conversation_key, owner_identity, text, &mut owner_id).await
    {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, conversation_key, "failed to process message");
            ProcessingResult::internal_error(&e)
        }
    };

    let content = serde_json::to_string(&result.response).unwrap_or_default();
    record_audit(state, owner_id.as_deref(), AuditKind::Outbound, &content).await;
    result
}

async fn process(
    state: &AppState,
    key: &str,
    identity: &str,
    text: &str,
    owner_slot: &mut Option<String>,
) -> anyhow::Result<ProcessingResult> {
    let loaded = load(state, key, identity).await;
    let resolved = loaded.as_ref().ok().and_then(|(_, owner_id)| owner_id.as_deref());
    record_audit(state, resolved, AuditKind::Inbound, text).await;

    let (existing, owner_id) = loaded?;
    let Some(owner_id) = owner_id else {
        tracing::info!(conversation_key = key, "message from unregistered identity");
        return Ok(ProcessingResult::ok(ResponseIntent::NotRegistered, None));
    };
    *owner_slot = Some(owner_id.clone());

    let max = state.config.max_message_length;
    if text.chars().count() > max {
        return Ok(ProcessingResult::ok(
            ResponseIntent::MessageTooLong { max },
            existing,
        ));
    }

    let Some(owner) = state.owners.get_owner(&owner_id).await? else {
        tracing::warn!(owner_id, "conversation points at a missing owner");
        state.conversations.delete(key).await?;
        return Ok(ProcessingResult::ok(
            ResponseIntent::ValidationFailed {
                errors: vec![ValidationError::OwnerNotFound],
            },
            None,
        ));
    };

    let conv = existing.unwrap_or_else(|| {
        ConversationState::new(
            &owner.id,
            state.clock.now().naive_utc(),
            state.config.session_ttl_seconds,
        )
    });
    tracing::info!(
        conversation_key = key,
        owner_id = %owner.id,
        step = conv.step.as_str(),
        "processing message"
    );

    let (response, next) = match conv.step.clone() {
        Step::Parsing => handle_parsing(state, &owner, conv, text).await?,
        Step::AwaitingConfirmation { pending } => {
            if is_positive(text) {
                (execute(state, &owner, &pending).await?, Next::Clear)
            } else {
                (ResponseIntent::ActionCancelled, Next::Clear)
            }
        }
        Step::AwaitingPatientRegistration {
            patient_id,
            patient_name,
            proposed_at,
            duration_minutes,
        } => {
            if is_positive(text) {
                let patient = state
                    .patients
                    .create(&patient_id, &owner.id, &patient_name)
                    .await?;
                let mut conv = conv;
                conv.step = Step::AwaitingConfirmation {
                    pending: PendingAction::Schedule {
                        appointment_id: new_id(),
                        patient_id: patient.id,
                        patient_name: patient.full_name.clone(),
                        scheduled_at: proposed_at,
                        duration_minutes,
                    },
                };
                let response = ResponseIntent::ConfirmSchedule {
                    patient_name: patient.full_name,
                    scheduled_at: proposed_at,
                    duration_minutes,
                };
                (response, Next::Save(conv))
            } else {
                (ResponseIntent::ActionCancelled, Next::Clear)
            }
        }
    };

    let next_state = match next {
        Next::Save(mut conv) => {
            let ttl = state.config.session_ttl_seconds;
            conv.expires_at = state.clock.now().naive_utc() + Duration::seconds(ttl);
            state.conversations.set(key, &conv, ttl).await?;
            Some(conv)
        }
        Next::Clear => {
            state.conversations.delete(key).await?;
            None
        }
    };

    Ok(ProcessingResult::ok(response, next_state))
}

/// Stored state for `key` and the owner it belongs to. A live conversation
/// keeps its owner; otherwise the identity is resolved.
async fn load(
    state: &AppState,
    key: &str,
    identity: &str,
) -> anyhow::Result<(Option<ConversationState>, Option<String>)> {
    let existing = state.conversations.get(key).await?;
    let owner_id = match &existing {
        Some(conv) => Some(conv.owner_id.clone()),
        None => normalize_and_resolve(state.owners.as_ref(), identity).await?,
    };
    Ok((existing, owner_id))
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

async fn handle_parsing(
    state: &AppState,
    owner: &Owner,
    mut conv: ConversationState,
    text: &str,
) -> anyhow::Result<(ResponseIntent, Next)> {
    let now = local_now(state.clock.as_ref(), &owner.timezone);
    let cmd = parser::parse(text, now);
    tracing::info!(
        action = cmd.action.as_str(),
        confidence = cmd.confidence,
        "message parsed"
    );

    let response = match cmd.action {
        Action::Schedule => {
            let v = scheduling::validate_schedule(state, &cmd, &owner.id, now).await?;
            if !v.conflicts.is_empty() {
                ResponseIntent::ScheduleConflict {
                    conflicts: v.conflicts,
                    suggestions: v.suggestions,
                }
            } else if !v.is_valid {
                ResponseIntent::ValidationFailed { errors: v.errors }
            } else {
                let scheduled_at = v
                    .scheduled_at
                    .ok_or_else(|| anyhow::anyhow!("valid schedule without a time"))?;
                match v.patient {
                    Some(patient) => {
                        conv.step = Step::AwaitingConfirmation {
                            pending: PendingAction::Schedule {
                                appointment_id: new_id(),
                                patient_id: patient.id,
                                patient_name: patient.full_name.clone(),
                                scheduled_at,
                                duration_minutes: v.duration_minutes,
                            },
                        };
                        ResponseIntent::ConfirmSchedule {
                            patient_name: patient.full_name,
                            scheduled_at,
                            duration_minutes: v.duration_minutes,
                        }
                    }
                    None => {
                        let patient_name = cmd.patient_name_raw.clone().unwrap_or_default();
                        conv.step = Step::AwaitingPatientRegistration {
                            patient_id: new_id(),
                            patient_name: patient_name.clone(),
                            proposed_at: scheduled_at,
                            duration_minutes: v.duration_minutes,
                        };
                        ResponseIntent::ConfirmPatientRegistration {
                            patient_name,
                            scheduled_at,
                        }
                    }
                }
            }
        }
        Action::Cancel => {
            let v = scheduling::validate_cancel(state, &cmd, &owner.id, now).await?;
            match (v.patient, v.appointment) {
                (Some(patient), Some(apt)) if v.is_valid => {
                    conv.step = Step::AwaitingConfirmation {
                        pending: PendingAction::Cancel {
                            appointment_id: apt.id.clone(),
                            patient_name: patient.full_name.clone(),
                            scheduled_at: apt.scheduled_at,
                        },
                    };
                    ResponseIntent::ConfirmCancel {
                        appointment_id: apt.id,
                        patient_name: patient.full_name,
                        scheduled_at: apt.scheduled_at,
                    }
                }
                _ => ResponseIntent::ValidationFailed { errors: v.errors },
            }
        }
        Action::Block => {
            let v = scheduling::validate_block(state, &cmd, &owner.id, now).await?;
            match v.range {
                Some(range) if v.is_valid => {
                    conv.step = Step::AwaitingConfirmation {
                        pending: PendingAction::Block {
                            block_id: new_id(),
                            starts_at: range.start,
                            ends_at: range.end,
                        },
                    };
                    ResponseIntent::ConfirmBlock {
                        starts_at: range.start,
                        ends_at: range.end,
                        overlapping_appointments: v.overlapping.len(),
                    }
                }
                _ => ResponseIntent::ValidationFailed { errors: v.errors },
            }
        }
        Action::View => agenda(state, owner, &cmd, now.date()).await?,
        Action::Help => ResponseIntent::Help,
        Action::Unknown => ResponseIntent::Unknown,
    };

    Ok((response, Next::Save(conv)))
}

/// A single day, or the 7/30 days starting today.
async fn agenda(
    state: &AppState,
    owner: &Owner,
    cmd: &ParsedCommand,
    today: chrono::NaiveDate,
) -> anyhow::Result<ResponseIntent> {
    if cmd.invalid_date {
        return Ok(ResponseIntent::ValidationFailed {
            errors: vec![ValidationError::InvalidDate],
        });
    }

    let timeframe = cmd.timeframe.unwrap_or(Timeframe::Day);
    let (from, days) = match timeframe {
        Timeframe::Day => (cmd.proposed.map_or(today, |p| p.date), 1),
        Timeframe::Week => (today, 7),
        Timeframe::Month => (today, 30),
    };
    let start = from.and_hms_opt(0, 0, 0).unwrap_or_default();
    let range = TimeRange::new(start, start + Duration::days(days));

    let entries = state
        .appointments
        .list_appointments(&owner.id, Some(range))
        .await?
        .into_iter()
        .map(|apt| AgendaEntry {
            starts_at: apt.scheduled_at,
            ends_at: apt.ends_at(),
            appointment_id: apt.id,
            patient_name: apt.patient_name,
        })
        .collect();

    Ok(ResponseIntent::Agenda {
        timeframe,
        from,
        to: from + Duration::days(days - 1),
        entries,
    })
}

/// Carries out a confirmed action. There is no re-check for conflicts
/// created since validation. Replaying the same pending action is a no-op
/// at the store.
async fn execute(
    state: &AppState,
    owner: &Owner,
    pending: &PendingAction,
) -> anyhow::Result<ResponseIntent> {
    tracing::info!(owner_id = %owner.id, command = pending.command(), "executing confirmed action");
    let response = match pending {
        PendingAction::Schedule {
            appointment_id,
            patient_id,
            patient_name,
            scheduled_at,
            duration_minutes,
        } => {
            state
                .appointments
                .create_appointment(
                    appointment_id,
                    &owner.id,
                    patient_id,
                    *scheduled_at,
                    *duration_minutes,
                )
                .await?;
            ResponseIntent::AppointmentScheduled {
                appointment_id: appointment_id.clone(),
                patient_name: patient_name.clone(),
                scheduled_at: *scheduled_at,
                duration_minutes: *duration_minutes,
            }
        }
        PendingAction::Cancel {
            appointment_id,
            patient_name,
            scheduled_at,
        } => {
            state.appointments.cancel_appointment(appointment_id).await?;
            ResponseIntent::AppointmentCancelled {
                appointment_id: appointment_id.clone(),
                patient_name: patient_name.clone(),
                scheduled_at: *scheduled_at,
            }
        }
        PendingAction::Block {
            block_id,
            starts_at,
            ends_at,
        } => {
            let range = TimeRange::new(*starts_at, *ends_at);
            state
                .appointments
                .create_block(block_id, &owner.id, range, None)
                .await?;
            ResponseIntent::TimeBlocked {
                block_id: block_id.clone(),
                starts_at: *starts_at,
                ends_at: *ends_at,
            }
        }
    };
    Ok(response)
}

/// Multi-letter keywords match anywhere in the reply; `s` and `y` only as
/// whole words. Everything else counts as a no.
pub fn is_positive(reply: &str) -> bool {
    let reply = fold(reply);
    POSITIVE_REPLIES.iter().any(|keyword| {
        if keyword.len() == 1 {
            reply.split_whitespace().any(|word| word == *keyword)
        } else {
            reply.contains(keyword)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_replies() {
        for reply in ["sim", "SIM!", "s", "Sim, pode marcar", "ok", "Confirmo", "yes", "y"] {
            assert!(is_positive(reply), "{reply}");
        }
    }

    #[test]
    fn test_negative_replies() {
        for reply in ["não", "nao", "cancela", "depois vejo", "", "talvez"] {
            assert!(!is_positive(reply), "{reply}");
        }
    }
}
