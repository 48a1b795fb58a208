use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::models::{
    Appointment, AvailableSlot, Conflict, DayHours, Owner, ParsedCommand, Patient, TimeRange,
    ValidationError,
};
use crate::services::parser::fold;
use crate::state::AppState;

const SLOT_STEP_MINUTES: i64 = 30;
pub const MAX_SUGGESTIONS: usize = 6;
const NAME_MATCH_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Default)]
pub struct ScheduleValidation {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub conflicts: Vec<Conflict>,
    pub suggestions: Vec<AvailableSlot>,
    /// `None` on a valid result means the name is new and needs registering.
    pub patient: Option<Patient>,
    pub scheduled_at: Option<NaiveDateTime>,
    pub duration_minutes: i32,
}

impl ScheduleValidation {
    fn rejected(errors: Vec<ValidationError>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CancelValidation {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub patient: Option<Patient>,
    pub appointment: Option<Appointment>,
}

impl CancelValidation {
    fn rejected(error: ValidationError, patient: Option<Patient>) -> Self {
        Self {
            is_valid: false,
            errors: vec![error],
            patient,
            appointment: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockValidation {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub range: Option<TimeRange>,
    /// Scheduled sessions inside the interval; they are kept, only reported.
    pub overlapping: Vec<Appointment>,
}

impl BlockValidation {
    fn rejected(error: ValidationError) -> Self {
        Self {
            is_valid: false,
            errors: vec![error],
            range: None,
            overlapping: vec![],
        }
    }
}

/// Checks a schedule command against the owner's rules and calendar.
/// `now` is the owner's local wall-clock time.
pub async fn validate_schedule(
    state: &AppState,
    cmd: &ParsedCommand,
    owner_id: &str,
    now: NaiveDateTime,
) -> anyhow::Result<ScheduleValidation> {
    let mut structural = vec![];
    if cmd.patient_name_raw.is_none() {
        structural.push(ValidationError::MissingPatientName);
    }
    let scheduled_at = match cmd.proposed {
        Some(proposed) => match proposed.at() {
            Some(at) => Some(at),
            None => {
                structural.push(ValidationError::MissingTime);
                None
            }
        },
        None if cmd.invalid_date => {
            structural.push(ValidationError::InvalidDate);
            None
        }
        None => {
            structural.push(ValidationError::MissingDateTime);
            None
        }
    };
    let (Some(patient_name), Some(scheduled_at)) = (cmd.patient_name_raw.as_deref(), scheduled_at)
    else {
        return Ok(ScheduleValidation::rejected(structural));
    };

    let Some(owner) = state.owners.get_owner(owner_id).await? else {
        return Ok(ScheduleValidation::rejected(vec![ValidationError::OwnerNotFound]));
    };
    let duration = owner.default_duration_minutes;

    let mut errors = vec![];
    if !owner.working_hours.contains(&scheduled_at, duration) {
        errors.push(ValidationError::OutsideWorkingHours {
            hours: owner.working_hours.to_human_readable(),
        });
    }
    if scheduled_at < now {
        errors.push(ValidationError::InPast);
    }

    let patient = resolve_patient(state, owner_id, patient_name).await?;

    let mut conflicts = vec![];
    let mut suggestions = vec![];
    if errors.is_empty() {
        let candidate = TimeRange::from_duration(scheduled_at, duration);
        conflicts = find_conflicts(state, owner_id, candidate).await?;
        if !conflicts.is_empty() {
            errors.push(ValidationError::Conflict);
            suggestions = find_free_slots(
                state,
                &owner,
                scheduled_at.date(),
                now,
                duration,
                MAX_SUGGESTIONS,
            )
            .await?;
        }
    }

    tracing::debug!(
        owner_id,
        %scheduled_at,
        errors = errors.len(),
        conflicts = conflicts.len(),
        patient_found = patient.is_some(),
        "schedule validated"
    );

    Ok(ScheduleValidation {
        is_valid: errors.is_empty(),
        errors,
        conflicts,
        suggestions,
        patient,
        scheduled_at: Some(scheduled_at),
        duration_minutes: duration,
    })
}

/// Finds the session a cancel command refers to: the one on the given day
/// (and time, when present), otherwise the patient's next upcoming session.
pub async fn validate_cancel(
    state: &AppState,
    cmd: &ParsedCommand,
    owner_id: &str,
    now: NaiveDateTime,
) -> anyhow::Result<CancelValidation> {
    let Some(patient_name) = cmd.patient_name_raw.as_deref() else {
        return Ok(CancelValidation::rejected(ValidationError::MissingPatientName, None));
    };
    if cmd.invalid_date {
        return Ok(CancelValidation::rejected(ValidationError::InvalidDate, None));
    }

    let Some(patient) = resolve_patient(state, owner_id, patient_name).await? else {
        return Ok(CancelValidation::rejected(
            ValidationError::PatientNotFound {
                patient_name: patient_name.to_string(),
            },
            None,
        ));
    };

    let range = cmd.proposed.map(|p| day_range(p.date));
    let appointment = state
        .appointments
        .list_appointments(owner_id, range)
        .await?
        .into_iter()
        .filter(|apt| apt.patient_id == patient.id)
        .find(|apt| match cmd.proposed {
            Some(proposed) => proposed.at().map_or(true, |at| apt.scheduled_at == at),
            None => apt.scheduled_at >= now,
        });

    match appointment {
        Some(apt) => Ok(CancelValidation {
            is_valid: true,
            errors: vec![],
            patient: Some(patient),
            appointment: Some(apt),
        }),
        None => Ok(CancelValidation::rejected(
            ValidationError::NoSessionFound {
                patient_name: patient.full_name.clone(),
                date: cmd.proposed.map(|p| p.date),
            },
            Some(patient),
        )),
    }
}

/// A time blocks one session-length interval; a bare date blocks the whole day.
pub async fn validate_block(
    state: &AppState,
    cmd: &ParsedCommand,
    owner_id: &str,
    now: NaiveDateTime,
) -> anyhow::Result<BlockValidation> {
    let Some(proposed) = cmd.proposed else {
        let error = if cmd.invalid_date {
            ValidationError::InvalidDate
        } else {
            ValidationError::MissingDateTime
        };
        return Ok(BlockValidation::rejected(error));
    };

    let Some(owner) = state.owners.get_owner(owner_id).await? else {
        return Ok(BlockValidation::rejected(ValidationError::OwnerNotFound));
    };

    let range = match proposed.at() {
        Some(at) => TimeRange::from_duration(at, owner.default_duration_minutes),
        None => day_range(proposed.date),
    };
    let in_past = match proposed.at() {
        Some(at) => at < now,
        None => range.end <= now,
    };
    if in_past {
        return Ok(BlockValidation::rejected(ValidationError::InPast));
    }

    let overlapping = state
        .appointments
        .list_appointments(owner_id, Some(range))
        .await?;

    Ok(BlockValidation {
        is_valid: true,
        errors: vec![],
        range: Some(range),
        overlapping,
    })
}

/// Appointments intersecting `candidate`, plus blocks that fully contain it.
pub async fn find_conflicts(
    state: &AppState,
    owner_id: &str,
    candidate: TimeRange,
) -> anyhow::Result<Vec<Conflict>> {
    let mut conflicts = vec![];
    if let Some(apt) = state
        .appointments
        .find_conflicting(owner_id, candidate)
        .await?
    {
        conflicts.push(Conflict::from(&apt));
    }
    for block in state.appointments.list_blocks(owner_id, candidate).await? {
        if block.range().contains(&candidate) {
            conflicts.push(Conflict::from(&block));
        }
    }
    Ok(conflicts)
}

/// Walks open days from `from` in 30-minute steps, collecting up to `limit`
/// slots of `duration_minutes` that touch no appointment or block.
pub async fn find_free_slots(
    state: &AppState,
    owner: &Owner,
    from: NaiveDate,
    now: NaiveDateTime,
    duration_minutes: i32,
    limit: usize,
) -> anyhow::Result<Vec<AvailableSlot>> {
    let mut slots = vec![];
    let step = Duration::minutes(SLOT_STEP_MINUTES);
    let length = Duration::minutes(i64::from(duration_minutes));

    for offset in 0..i64::from(state.config.slot_search_days) {
        let day = from + Duration::days(offset);
        if day < now.date() {
            continue;
        }
        let DayHours::Open { open, close } = owner.working_hours.hours_for(day.weekday()) else {
            continue;
        };

        let window = TimeRange::new(day.and_time(open), day.and_time(close));
        let appointments = state
            .appointments
            .list_appointments(&owner.id, Some(window))
            .await?;
        let blocks = state.appointments.list_blocks(&owner.id, window).await?;
        let taken: Vec<TimeRange> = appointments
            .iter()
            .map(Appointment::range)
            .chain(blocks.iter().map(|b| b.range()))
            .collect();

        let mut cursor = window.start;
        if day == now.date() {
            cursor = cursor.max(round_up_to_step(now));
        }
        while cursor + length <= window.end {
            let candidate = TimeRange::new(cursor, cursor + length);
            if !taken.iter().any(|t| t.overlaps(&candidate)) {
                slots.push(AvailableSlot::new(candidate));
                if slots.len() >= limit {
                    return Ok(slots);
                }
            }
            cursor += step;
        }
    }

    Ok(slots)
}

fn round_up_to_step(now: NaiveDateTime) -> NaiveDateTime {
    let minutes = i64::from(now.hour()) * 60 + i64::from(now.minute());
    let partial = now.second() > 0 || now.nanosecond() > 0;
    let minutes = if partial { minutes + 1 } else { minutes };
    let rounded = (minutes + SLOT_STEP_MINUTES - 1) / SLOT_STEP_MINUTES * SLOT_STEP_MINUTES;
    now.date().and_hms_opt(0, 0, 0).unwrap_or(now) + Duration::minutes(rounded)
}

fn day_range(date: NaiveDate) -> TimeRange {
    let start = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    TimeRange::new(start, start + Duration::days(1))
}

/// Exact case-insensitive match first, then the best fuzzy match above the
/// threshold. Ties keep the first patient seen.
pub async fn resolve_patient(
    state: &AppState,
    owner_id: &str,
    name: &str,
) -> anyhow::Result<Option<Patient>> {
    if let Some(patient) = state.patients.find_by_exact_name(owner_id, name).await? {
        return Ok(Some(patient));
    }

    let wanted = fold(name);
    let mut best: Option<(f64, Patient)> = None;
    for patient in state.patients.list_all(owner_id).await? {
        let score = similarity(&wanted, &fold(&patient.full_name));
        if score > NAME_MATCH_THRESHOLD && best.as_ref().map_or(true, |(top, _)| score > *top) {
            best = Some((score, patient));
        }
    }

    if let Some((score, patient)) = &best {
        tracing::debug!(input = name, matched = %patient.full_name, score, "fuzzy patient match");
    }
    Ok(best.map(|(_, patient)| patient))
}

/// `(max_len - distance) / max_len`, on chars.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    (max_len - levenshtein(a, b)) as f64 / max_len as f64
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::config::AppConfig;
    use crate::db;
    use crate::models::{Action, WorkingHours};
    use crate::services::clock::FixedClock;
    use crate::services::parser::parse;
    use crate::store::SqliteStore;

    const OWNER: &str = "owner-1";

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    // Monday 2026-10-19, 09:00
    fn now() -> NaiveDateTime {
        dt("2026-10-19 09:00")
    }

    fn setup() -> AppState {
        let conn = db::init_db(":memory:").unwrap();
        let store = Arc::new(SqliteStore::new(Arc::new(Mutex::new(conn))));
        store
            .save_owner(&Owner {
                id: OWNER.to_string(),
                name: "Dra. Lima".to_string(),
                phone: "5511999990000".to_string(),
                timezone: "UTC".to_string(),
                working_hours: WorkingHours::from_json(
                    r#"{"mon":"08:00-18:00","tue":"08:00-18:00","wed":"08:00-18:00","thu":"08:00-18:00","fri":"08:00-18:00","sun":"closed"}"#,
                )
                .unwrap(),
                default_duration_minutes: 50,
            })
            .unwrap();
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap());
        AppState::with_store(store, AppConfig::default(), Box::new(clock))
    }

    async fn book(state: &AppState, name: &str, at: &str) -> String {
        let patient = match state.patients.find_by_exact_name(OWNER, name).await.unwrap() {
            Some(p) => p,
            None => state.patients.create(&new_id(), OWNER, name).await.unwrap(),
        };
        let id = new_id();
        state
            .appointments
            .create_appointment(&id, OWNER, &patient.id, dt(at), 50)
            .await
            .unwrap();
        id
    }

    fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    #[tokio::test]
    async fn test_valid_schedule_with_known_patient() {
        let state = setup();
        state.patients.create(&new_id(), OWNER, "Ana").await.unwrap();

        let cmd = parse("agendar Ana quinta 14h", now());
        let v = validate_schedule(&state, &cmd, OWNER, now()).await.unwrap();
        assert!(v.is_valid, "{:?}", v.errors);
        assert_eq!(v.patient.map(|p| p.full_name), Some("Ana".to_string()));
        assert_eq!(v.scheduled_at, Some(dt("2026-10-22 14:00")));
        assert_eq!(v.duration_minutes, 50);
    }

    #[tokio::test]
    async fn test_unknown_patient_is_still_valid() {
        let state = setup();
        let cmd = parse("agendar Bruno quinta 14h", now());
        let v = validate_schedule(&state, &cmd, OWNER, now()).await.unwrap();
        assert!(v.is_valid);
        assert!(v.patient.is_none());
    }

    #[tokio::test]
    async fn test_structural_errors_short_circuit() {
        let state = setup();

        let v = validate_schedule(&state, &parse("agendar Ana", now()), OWNER, now())
            .await
            .unwrap();
        assert_eq!(v.errors, vec![ValidationError::MissingDateTime]);

        let v = validate_schedule(&state, &parse("agendar Ana quinta", now()), OWNER, now())
            .await
            .unwrap();
        assert_eq!(v.errors, vec![ValidationError::MissingTime]);

        let v = validate_schedule(&state, &parse("agendar Ana às 14h", now()), OWNER, now())
            .await
            .unwrap();
        assert_eq!(v.errors, vec![ValidationError::MissingDateTime]);

        let v = validate_schedule(&state, &parse("agendar Ana 32/10 14h", now()), OWNER, now())
            .await
            .unwrap();
        assert_eq!(v.errors, vec![ValidationError::InvalidDate]);

        // structural checks run before the owner lookup
        let v = validate_schedule(&state, &parse("agendar Ana", now()), "missing", now())
            .await
            .unwrap();
        assert_eq!(v.errors, vec![ValidationError::MissingDateTime]);
    }

    #[tokio::test]
    async fn test_owner_not_found() {
        let state = setup();
        let cmd = parse("agendar Ana quinta 14h", now());
        let v = validate_schedule(&state, &cmd, "missing", now()).await.unwrap();
        assert!(!v.is_valid);
        assert_eq!(v.errors, vec![ValidationError::OwnerNotFound]);
    }

    #[tokio::test]
    async fn test_closed_day_skips_conflict_check() {
        let state = setup();
        book(&state, "João", "2026-10-25 10:00").await;

        let cmd = parse("agendar Pedro domingo 10h", now());
        let v = validate_schedule(&state, &cmd, OWNER, now()).await.unwrap();
        assert!(!v.is_valid);
        assert!(matches!(
            v.errors.as_slice(),
            [ValidationError::OutsideWorkingHours { .. }]
        ));
        assert!(v.conflicts.is_empty());
        assert!(v.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_closing_time_boundary() {
        let state = setup();
        // 17:10 + 50min ends exactly at 18:00
        let cmd = parse("agendar Ana quinta 17:10", now());
        let v = validate_schedule(&state, &cmd, OWNER, now()).await.unwrap();
        assert!(v.is_valid, "{:?}", v.errors);

        let cmd = parse("agendar Ana quinta 17:11", now());
        let v = validate_schedule(&state, &cmd, OWNER, now()).await.unwrap();
        assert!(!v.is_valid);
    }

    #[tokio::test]
    async fn test_past_time_rejected() {
        let state = setup();
        let cmd = parse("agendar Ana hoje 8h", now());
        let v = validate_schedule(&state, &cmd, OWNER, now()).await.unwrap();
        assert_eq!(v.errors, vec![ValidationError::InPast]);
    }

    #[tokio::test]
    async fn test_conflict_reports_patient_and_suggestions() {
        let state = setup();
        book(&state, "João", "2026-10-22 14:00").await;

        let cmd = parse("agendar Carlos quinta 14h", now());
        let v = validate_schedule(&state, &cmd, OWNER, now()).await.unwrap();
        assert!(!v.is_valid);
        assert_eq!(v.errors, vec![ValidationError::Conflict]);
        match &v.conflicts[0] {
            Conflict::Appointment { patient_name, .. } => {
                assert_eq!(patient_name.as_deref(), Some("João"))
            }
            other => panic!("unexpected conflict {other:?}"),
        }
        assert_eq!(v.suggestions.len(), MAX_SUGGESTIONS);
        assert_eq!(v.suggestions[0].start, dt("2026-10-22 08:00"));
    }

    #[tokio::test]
    async fn test_touching_appointments_do_not_conflict() {
        let state = setup();
        book(&state, "João", "2026-10-22 14:00").await;
        let cmd = parse("agendar Carlos quinta 14:50", now());
        let v = validate_schedule(&state, &cmd, OWNER, now()).await.unwrap();
        assert!(v.is_valid, "{:?}", v.errors);
    }

    #[tokio::test]
    async fn test_block_containing_candidate_conflicts() {
        let state = setup();
        state
            .appointments
            .create_block(
                &new_id(),
                OWNER,
                TimeRange::new(dt("2026-10-22 00:00"), dt("2026-10-23 00:00")),
                Some("feriado"),
            )
            .await
            .unwrap();

        let cmd = parse("agendar Ana quinta 14h", now());
        let v = validate_schedule(&state, &cmd, OWNER, now()).await.unwrap();
        assert!(matches!(v.conflicts.as_slice(), [Conflict::Block { .. }]));
        // Thursday is blocked, suggestions move on to Friday
        assert!(v
            .suggestions
            .iter()
            .all(|s| s.start >= dt("2026-10-23 08:00")));
    }

    #[tokio::test]
    async fn test_free_slots_skip_taken_and_start_after_now() {
        let state = setup();
        book(&state, "João", "2026-10-19 10:00").await;
        let owner = state.owners.get_owner(OWNER).await.unwrap().unwrap();

        let slots = find_free_slots(&state, &owner, now().date(), dt("2026-10-19 09:10"), 50, 3)
            .await
            .unwrap();
        let starts: Vec<_> = slots.iter().map(|s| s.start).collect();
        // 09:30 would run into 10:00, 10:00 and 10:30 overlap João
        assert_eq!(
            starts,
            vec![dt("2026-10-19 11:00"), dt("2026-10-19 11:30"), dt("2026-10-19 12:00")]
        );
    }

    #[tokio::test]
    async fn test_free_slots_skip_closed_days() {
        let state = setup();
        let owner = state.owners.get_owner(OWNER).await.unwrap().unwrap();
        // Saturday has no entry, Sunday is closed
        let saturday = NaiveDate::from_ymd_opt(2026, 10, 24).unwrap();
        let slots = find_free_slots(&state, &owner, saturday, now(), 50, 1)
            .await
            .unwrap();
        assert_eq!(slots[0].start, dt("2026-10-26 08:00"));
    }

    #[tokio::test]
    async fn test_fuzzy_patient_resolution() {
        let state = setup();
        state.patients.create(&new_id(), OWNER, "Mariana Souza").await.unwrap();
        state.patients.create(&new_id(), OWNER, "João Pereira").await.unwrap();

        let found = resolve_patient(&state, OWNER, "mariana sousa").await.unwrap();
        assert_eq!(found.map(|p| p.full_name), Some("Mariana Souza".to_string()));

        let found = resolve_patient(&state, OWNER, "Joao Pereira").await.unwrap();
        assert_eq!(found.map(|p| p.full_name), Some("João Pereira".to_string()));

        let found = resolve_patient(&state, OWNER, "Carlos").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_fuzzy_tie_keeps_first_seen() {
        let state = setup();
        state.patients.create(&new_id(), OWNER, "Ana Lima").await.unwrap();
        state.patients.create(&new_id(), OWNER, "Ana Lina").await.unwrap();
        let found = resolve_patient(&state, OWNER, "Ana Lixa").await.unwrap();
        assert_eq!(found.map(|p| p.full_name), Some("Ana Lima".to_string()));
    }

    #[tokio::test]
    async fn test_cancel_finds_session_on_date() {
        let state = setup();
        let id = book(&state, "Ana", "2026-10-22 14:00").await;

        let cmd = parse("cancelar Ana quinta", now());
        assert_eq!(cmd.action, Action::Cancel);
        let v = validate_cancel(&state, &cmd, OWNER, now()).await.unwrap();
        assert!(v.is_valid);
        assert_eq!(v.appointment.map(|a| a.id), Some(id));
    }

    #[tokio::test]
    async fn test_cancel_with_time_matches_exact_start() {
        let state = setup();
        book(&state, "Ana", "2026-10-22 14:00").await;
        let later = book(&state, "Ana", "2026-10-22 16:00").await;

        let v = validate_cancel(&state, &parse("cancelar Ana quinta 16h", now()), OWNER, now())
            .await
            .unwrap();
        assert!(v.is_valid);
        assert_eq!(v.appointment.map(|a| a.id), Some(later));

        let v = validate_cancel(&state, &parse("cancelar Ana quinta 15h", now()), OWNER, now())
            .await
            .unwrap();
        assert!(!v.is_valid);
        assert_eq!(
            v.errors,
            vec![ValidationError::NoSessionFound {
                patient_name: "Ana".to_string(),
                date: Some(NaiveDate::from_ymd_opt(2026, 10, 22).unwrap()),
            }]
        );
    }

    #[tokio::test]
    async fn test_cancel_without_date_picks_next_upcoming() {
        let state = setup();
        book(&state, "Ana", "2026-10-28 10:00").await;
        let next = book(&state, "Ana", "2026-10-21 10:00").await;

        let v = validate_cancel(&state, &parse("cancelar Ana", now()), OWNER, now())
            .await
            .unwrap();
        assert_eq!(v.appointment.map(|a| a.id), Some(next));
    }

    #[tokio::test]
    async fn test_cancel_no_session_found() {
        let state = setup();
        state.patients.create(&new_id(), OWNER, "Ana").await.unwrap();
        book(&state, "Ana", "2026-10-23 10:00").await;

        let v = validate_cancel(&state, &parse("cancelar Ana quinta", now()), OWNER, now())
            .await
            .unwrap();
        assert!(!v.is_valid);
        assert!(matches!(
            v.errors.as_slice(),
            [ValidationError::NoSessionFound { .. }]
        ));
    }

    #[tokio::test]
    async fn test_cancel_unknown_patient() {
        let state = setup();
        let v = validate_cancel(&state, &parse("cancelar Zuleica quinta", now()), OWNER, now())
            .await
            .unwrap();
        assert_eq!(
            v.errors,
            vec![ValidationError::PatientNotFound {
                patient_name: "Zuleica".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_block_whole_day_and_single_session() {
        let state = setup();
        book(&state, "Ana", "2026-10-23 10:00").await;

        let v = validate_block(&state, &parse("bloquear sexta", now()), OWNER, now())
            .await
            .unwrap();
        assert!(v.is_valid);
        assert_eq!(
            v.range,
            Some(TimeRange::new(dt("2026-10-23 00:00"), dt("2026-10-24 00:00")))
        );
        assert_eq!(v.overlapping.len(), 1);

        let v = validate_block(&state, &parse("bloquear sexta 15h", now()), OWNER, now())
            .await
            .unwrap();
        assert_eq!(v.range, Some(TimeRange::from_duration(dt("2026-10-23 15:00"), 50)));
        assert!(v.overlapping.is_empty());
    }

    #[tokio::test]
    async fn test_block_rejects_past_and_missing_date() {
        let state = setup();
        let v = validate_block(&state, &parse("bloquear hoje 8h", now()), OWNER, now())
            .await
            .unwrap();
        assert_eq!(v.errors, vec![ValidationError::InPast]);

        let v = validate_block(&state, &parse("bloquear agenda", now()), OWNER, now())
            .await
            .unwrap();
        assert_eq!(v.errors, vec![ValidationError::MissingDateTime]);
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("joao", "joao"), 0);
        assert!((similarity("souza", "sousa") - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_round_up_to_step() {
        assert_eq!(round_up_to_step(dt("2026-10-19 09:00")), dt("2026-10-19 09:00"));
        assert_eq!(round_up_to_step(dt("2026-10-19 09:01")), dt("2026-10-19 09:30"));
        assert_eq!(round_up_to_step(dt("2026-10-19 09:31")), dt("2026-10-19 10:00"));
    }
}
