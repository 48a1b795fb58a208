use anyhow::Context;
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Appointment, AppointmentStatus, AuditEntry, AvailabilityBlock, ConversationState, Owner,
    Patient, TimeRange, WorkingHours,
};

pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).with_context(|| format!("invalid timestamp: {s}"))
}

// ── Owners ──

pub fn save_owner(conn: &Connection, owner: &Owner) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO owners (id, name, phone, timezone, working_hours, default_duration_minutes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           phone = excluded.phone,
           timezone = excluded.timezone,
           working_hours = excluded.working_hours,
           default_duration_minutes = excluded.default_duration_minutes,
           updated_at = datetime('now')",
        params![
            owner.id,
            owner.name,
            owner.phone,
            owner.timezone,
            owner.working_hours.to_json(),
            owner.default_duration_minutes,
        ],
    )?;
    Ok(())
}

pub fn get_owner(conn: &Connection, id: &str) -> anyhow::Result<Option<Owner>> {
    let row = conn
        .query_row(
            "SELECT id, name, phone, timezone, working_hours, default_duration_minutes
             FROM owners WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i32>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((id, name, phone, timezone, hours_json, default_duration_minutes)) = row else {
        return Ok(None);
    };

    let working_hours = WorkingHours::from_json(&hours_json)
        .with_context(|| format!("invalid working hours stored for owner {id}"))?;

    Ok(Some(Owner {
        id,
        name,
        phone,
        timezone,
        working_hours,
        default_duration_minutes,
    }))
}

pub fn find_owner_by_phone(conn: &Connection, phone: &str) -> anyhow::Result<Option<String>> {
    let id = conn
        .query_row(
            "SELECT id FROM owners WHERE phone = ?1",
            params![phone],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

// ── Patients ──

/// Returns `false` when a patient with the same id already exists.
pub fn create_patient(conn: &Connection, patient: &Patient) -> anyhow::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO patients (id, owner_id, full_name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            patient.id,
            patient.owner_id,
            patient.full_name,
            fmt_ts(&patient.created_at),
        ],
    )?;
    Ok(inserted > 0)
}

/// Patients of an owner in insertion order.
pub fn list_patients(conn: &Connection, owner_id: &str) -> anyhow::Result<Vec<Patient>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, full_name, created_at FROM patients
         WHERE owner_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map(params![owner_id], |row| Ok(parse_patient_row(row)))?;

    let mut patients = vec![];
    for row in rows {
        patients.push(row??);
    }
    Ok(patients)
}

pub fn get_patient(conn: &Connection, id: &str) -> anyhow::Result<Option<Patient>> {
    let result = conn
        .query_row(
            "SELECT id, owner_id, full_name, created_at FROM patients WHERE id = ?1",
            params![id],
            |row| Ok(parse_patient_row(row)),
        )
        .optional()?;

    result.transpose()
}

/// Case-insensitive full-name match. SQLite's NOCASE only folds ASCII, so the
/// comparison happens here.
pub fn find_patient_by_exact_name(
    conn: &Connection,
    owner_id: &str,
    name: &str,
) -> anyhow::Result<Option<Patient>> {
    let wanted = name.trim().to_lowercase();
    Ok(list_patients(conn, owner_id)?
        .into_iter()
        .find(|p| p.full_name.trim().to_lowercase() == wanted))
}

fn parse_patient_row(row: &rusqlite::Row) -> anyhow::Result<Patient> {
    let created_at: String = row.get(3)?;
    Ok(Patient {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        full_name: row.get(2)?,
        created_at: parse_ts(&created_at)?,
    })
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str =
    "a.id, a.owner_id, a.patient_id, p.full_name, a.scheduled_at, a.duration_minutes, a.status, a.created_at, a.updated_at";

/// Returns `false` when the id was already stored.
pub fn create_appointment(conn: &Connection, apt: &Appointment) -> anyhow::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO appointments (id, owner_id, patient_id, scheduled_at, duration_minutes, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            apt.id,
            apt.owner_id,
            apt.patient_id,
            fmt_ts(&apt.scheduled_at),
            apt.duration_minutes,
            apt.status.as_str(),
            fmt_ts(&apt.created_at),
            fmt_ts(&apt.updated_at),
        ],
    )?;
    Ok(inserted > 0)
}

/// Scheduled appointments of an owner, optionally limited to those starting
/// inside `range`.
pub fn list_appointments(
    conn: &Connection,
    owner_id: &str,
    range: Option<&TimeRange>,
) -> anyhow::Result<Vec<Appointment>> {
    let (start, end) = match range {
        Some(r) => (fmt_ts(&r.start), fmt_ts(&r.end)),
        None => ("0000-01-01 00:00:00".to_string(), "9999-12-31 23:59:59".to_string()),
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS}
         FROM appointments a LEFT JOIN patients p ON p.id = a.patient_id
         WHERE a.owner_id = ?1 AND a.status = 'scheduled'
           AND a.scheduled_at >= ?2 AND a.scheduled_at < ?3
         ORDER BY a.scheduled_at ASC"
    ))?;

    let rows = stmt.query_map(params![owner_id, start, end], |row| {
        Ok(parse_appointment_row(row))
    })?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// First scheduled appointment whose `[start, end)` intersects `range`.
pub fn find_conflicting(
    conn: &Connection,
    owner_id: &str,
    range: &TimeRange,
) -> anyhow::Result<Option<Appointment>> {
    let result = conn
        .query_row(
            &format!(
                "SELECT {APPOINTMENT_COLUMNS}
                 FROM appointments a LEFT JOIN patients p ON p.id = a.patient_id
                 WHERE a.owner_id = ?1 AND a.status = 'scheduled'
                   AND a.scheduled_at < ?3
                   AND datetime(a.scheduled_at, '+' || a.duration_minutes || ' minutes') > ?2
                 ORDER BY a.scheduled_at ASC LIMIT 1"
            ),
            params![owner_id, fmt_ts(&range.start), fmt_ts(&range.end)],
            |row| Ok(parse_appointment_row(row)),
        )
        .optional()?;

    result.transpose()
}

pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
) -> anyhow::Result<bool> {
    let now = fmt_ts(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let scheduled_at: String = row.get(4)?;
    let status: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(Appointment {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        patient_id: row.get(2)?,
        patient_name: row.get(3)?,
        scheduled_at: parse_ts(&scheduled_at)?,
        duration_minutes: row.get(5)?,
        status: AppointmentStatus::parse(&status),
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

// ── Availability Blocks ──

pub fn create_block(conn: &Connection, block: &AvailabilityBlock) -> anyhow::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO availability_blocks (id, owner_id, starts_at, ends_at, reason)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            block.id,
            block.owner_id,
            fmt_ts(&block.starts_at),
            fmt_ts(&block.ends_at),
            block.reason,
        ],
    )?;
    Ok(inserted > 0)
}

/// Blocks intersecting `range`.
pub fn list_blocks(
    conn: &Connection,
    owner_id: &str,
    range: &TimeRange,
) -> anyhow::Result<Vec<AvailabilityBlock>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, starts_at, ends_at, reason FROM availability_blocks
         WHERE owner_id = ?1 AND starts_at < ?3 AND ends_at > ?2
         ORDER BY starts_at ASC",
    )?;

    let rows = stmt.query_map(
        params![owner_id, fmt_ts(&range.start), fmt_ts(&range.end)],
        |row| {
            let starts_at: String = row.get(2)?;
            let ends_at: String = row.get(3)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                starts_at,
                ends_at,
                row.get::<_, Option<String>>(4)?,
            ))
        },
    )?;

    let mut blocks = vec![];
    for row in rows {
        let (id, owner_id, starts_at, ends_at, reason) = row?;
        blocks.push(AvailabilityBlock {
            id,
            owner_id,
            starts_at: parse_ts(&starts_at)?,
            ends_at: parse_ts(&ends_at)?,
            reason,
        });
    }
    Ok(blocks)
}

// ── Conversations ──

pub fn get_conversation(conn: &Connection, key: &str) -> anyhow::Result<Option<ConversationState>> {
    let now = fmt_ts(&Utc::now().naive_utc());
    let state_json: Option<String> = conn
        .query_row(
            "SELECT state FROM conversations WHERE conversation_key = ?1 AND expires_at > ?2",
            params![key, now],
            |row| row.get(0),
        )
        .optional()?;

    match state_json {
        Some(json) => {
            let state = serde_json::from_str(&json)
                .with_context(|| format!("corrupt conversation state for {key}"))?;
            Ok(Some(state))
        }
        None => Ok(None),
    }
}

pub fn save_conversation(
    conn: &Connection,
    key: &str,
    state: &ConversationState,
    ttl_seconds: i64,
) -> anyhow::Result<()> {
    let now = Utc::now().naive_utc();
    let expires_at = now + chrono::Duration::seconds(ttl_seconds);
    let state_json = serde_json::to_string(state)?;

    conn.execute(
        "INSERT INTO conversations (conversation_key, owner_id, state, updated_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(conversation_key) DO UPDATE SET
           owner_id = excluded.owner_id,
           state = excluded.state,
           updated_at = excluded.updated_at,
           expires_at = excluded.expires_at",
        params![key, state.owner_id, state_json, fmt_ts(&now), fmt_ts(&expires_at)],
    )?;
    Ok(())
}

pub fn delete_conversation(conn: &Connection, key: &str) -> anyhow::Result<()> {
    conn.execute(
        "DELETE FROM conversations WHERE conversation_key = ?1",
        params![key],
    )?;
    Ok(())
}

pub fn expire_old_conversations(conn: &Connection) -> anyhow::Result<usize> {
    let now = fmt_ts(&Utc::now().naive_utc());
    let count = conn.execute("DELETE FROM conversations WHERE expires_at <= ?1", params![now])?;
    Ok(count)
}

// ── Audit Log ──

pub fn insert_audit_entry(
    conn: &Connection,
    owner_id: Option<&str>,
    kind: &str,
    content: &str,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO audit_log (owner_id, kind, content) VALUES (?1, ?2, ?3)",
        params![owner_id, kind, content],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_audit_entries(
    conn: &Connection,
    owner_id: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, kind, content, created_at FROM audit_log
         WHERE ?1 IS NULL OR owner_id = ?1
         ORDER BY id ASC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![owner_id, limit], |row| {
        Ok(AuditEntry {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            kind: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;

    let mut entries = vec![];
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}
