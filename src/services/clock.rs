use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Wall-clock time in `timezone`; unknown zone names fall back to UTC.
pub fn local_now(clock: &dyn Clock, timezone: &str) -> NaiveDateTime {
    let now = clock.now();
    match timezone.parse::<Tz>() {
        Ok(tz) => now.with_timezone(&tz).naive_local(),
        Err(_) => {
            tracing::warn!(timezone, "unknown timezone, using UTC");
            now.naive_utc()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_local_now_converts_timezone() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 10, 19, 15, 0, 0).unwrap());
        let local = local_now(&clock, "America/Sao_Paulo");
        assert_eq!(local.format("%Y-%m-%d %H:%M").to_string(), "2026-10-19 12:00");
    }

    #[test]
    fn test_local_now_unknown_timezone_is_utc() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 10, 19, 15, 0, 0).unwrap());
        let local = local_now(&clock, "Mars/Olympus");
        assert_eq!(local.format("%H:%M").to_string(), "15:00");
    }
}
