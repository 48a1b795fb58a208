use std::env;

use chrono_tz::Tz;

use crate::errors::AppError;
use crate::models::{Owner, WorkingHours};
use crate::services::identity::identity_candidates;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    /// Inactivity window after which a conversation forgets its context.
    pub session_ttl_seconds: i64,
    /// How many days ahead the free-slot search scans.
    pub slot_search_days: u32,
    pub max_message_length: usize,
    pub owner_phone: String,
    pub owner_name: String,
    pub owner_timezone: String,
    /// JSON weekday map, e.g. `{"mon":"08:00-18:00","sun":"closed"}`.
    pub owner_working_hours: Option<String>,
    pub default_duration_minutes: i32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "agenda.db".to_string()),
            session_ttl_seconds: env::var("SESSION_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            slot_search_days: env::var("SLOT_SEARCH_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            max_message_length: env::var("MAX_MESSAGE_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(400),
            owner_phone: env::var("OWNER_PHONE").unwrap_or_default(),
            owner_name: env::var("OWNER_NAME").unwrap_or_else(|_| "Owner".to_string()),
            owner_timezone: env::var("OWNER_TIMEZONE")
                .unwrap_or_else(|_| "America/Sao_Paulo".to_string()),
            owner_working_hours: env::var("OWNER_WORKING_HOURS").ok(),
            default_duration_minutes: env::var("DEFAULT_DURATION_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
        }
    }
}

impl AppConfig {
    /// The owner described by `OWNER_*` variables, if `OWNER_PHONE` is set.
    /// The normalized phone doubles as the owner id so restarts upsert.
    pub fn owner(&self) -> Result<Option<Owner>, AppError> {
        let Some(phone) = identity_candidates(&self.owner_phone).into_iter().next() else {
            return Ok(None);
        };

        let working_hours = match &self.owner_working_hours {
            Some(json) => WorkingHours::from_json(json)
                .map_err(|e| AppError::Config(format!("OWNER_WORKING_HOURS: {e}")))?,
            None => WorkingHours::default(),
        };
        if self.owner_timezone.parse::<Tz>().is_err() {
            return Err(AppError::Config(format!(
                "OWNER_TIMEZONE: unknown timezone {}",
                self.owner_timezone
            )));
        }
        if self.default_duration_minutes <= 0 {
            return Err(AppError::Config(
                "DEFAULT_DURATION_MINUTES must be positive".to_string(),
            ));
        }

        Ok(Some(Owner {
            id: phone.clone(),
            name: self.owner_name.clone(),
            phone,
            timezone: self.owner_timezone.clone(),
            working_hours,
            default_duration_minutes: self.default_duration_minutes,
        }))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: ":memory:".to_string(),
            session_ttl_seconds: 300,
            slot_search_days: 7,
            max_message_length: 400,
            owner_phone: String::new(),
            owner_name: "Owner".to_string(),
            owner_timezone: "America/Sao_Paulo".to_string(),
            owner_working_hours: None,
            default_duration_minutes: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_from_config() {
        let config = AppConfig {
            owner_phone: "+55 (11) 98765-4321".to_string(),
            owner_working_hours: Some(r#"{"mon":"09:00-12:00"}"#.to_string()),
            ..AppConfig::default()
        };
        let owner = config.owner().unwrap().unwrap();
        assert_eq!(owner.id, "5511987654321");
        assert_eq!(owner.phone, "5511987654321");
        assert_eq!(owner.working_hours.to_human_readable(), "Mon: 09:00-12:00");
    }

    #[test]
    fn test_no_owner_phone() {
        assert!(AppConfig::default().owner().unwrap().is_none());
    }

    #[test]
    fn test_invalid_owner_settings() {
        let base = AppConfig {
            owner_phone: "5511987654321".to_string(),
            ..AppConfig::default()
        };
        let bad_hours = AppConfig {
            owner_working_hours: Some(r#"{"mon":"18:00-09:00"}"#.to_string()),
            ..base.clone()
        };
        assert!(matches!(bad_hours.owner(), Err(AppError::Config(_))));

        let bad_tz = AppConfig {
            owner_timezone: "Nowhere/Town".to_string(),
            ..base
        };
        assert!(matches!(bad_tz.owner(), Err(AppError::Config(_))));
    }
}
