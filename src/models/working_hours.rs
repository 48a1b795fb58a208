use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayHours {
    Closed,
    Open { open: NaiveTime, close: NaiveTime },
}

/// Per-weekday opening hours of an owner. Days without an entry are closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct WorkingHours {
    days: BTreeMap<u32, DayHours>,
}

const DAY_KEYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

impl WorkingHours {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> String {
        let map: BTreeMap<String, String> = self.clone().into();
        serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
    }

    /// Same range Monday to Friday, weekends closed.
    pub fn weekdays(open: NaiveTime, close: NaiveTime) -> Self {
        let mut days = BTreeMap::new();
        for day in 0..7 {
            let hours = if day < 5 {
                DayHours::Open { open, close }
            } else {
                DayHours::Closed
            };
            days.insert(day, hours);
        }
        Self { days }
    }

    pub fn hours_for(&self, weekday: Weekday) -> DayHours {
        self.days
            .get(&weekday.num_days_from_monday())
            .copied()
            .unwrap_or(DayHours::Closed)
    }

    /// `[start, start + duration)` must sit inside `[open, close)` of that day.
    pub fn contains(&self, start: &NaiveDateTime, duration_minutes: i32) -> bool {
        let DayHours::Open { open, close } = self.hours_for(start.weekday()) else {
            return false;
        };
        let start_min = minutes_of(&start.time());
        let end_min = start_min + i64::from(duration_minutes);
        start_min >= minutes_of(&open) && end_min <= minutes_of(&close)
    }

    pub fn to_human_readable(&self) -> String {
        self.days
            .iter()
            .filter_map(|(day, hours)| match hours {
                DayHours::Open { open, close } => Some(format!(
                    "{}: {}-{}",
                    capitalize(DAY_KEYS[*day as usize]),
                    open.format("%H:%M"),
                    close.format("%H:%M")
                )),
                DayHours::Closed => None,
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for WorkingHours {
    fn default() -> Self {
        let open = NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default();
        let close = NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default();
        Self::weekdays(open, close)
    }
}

impl TryFrom<BTreeMap<String, String>> for WorkingHours {
    type Error = String;

    fn try_from(raw: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut days = BTreeMap::new();
        for (key, value) in raw {
            let day = parse_weekday(&key)?;
            days.insert(day.num_days_from_monday(), parse_day_hours(&value)?);
        }
        Ok(Self { days })
    }
}

impl From<WorkingHours> for BTreeMap<String, String> {
    fn from(hours: WorkingHours) -> Self {
        hours
            .days
            .into_iter()
            .map(|(day, hours)| {
                let value = match hours {
                    DayHours::Closed => "closed".to_string(),
                    DayHours::Open { open, close } => {
                        format!("{}-{}", open.format("%H:%M"), close.format("%H:%M"))
                    }
                };
                (DAY_KEYS[day as usize].to_string(), value)
            })
            .collect()
    }
}

pub fn minutes_of(time: &NaiveTime) -> i64 {
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}

fn parse_weekday(s: &str) -> Result<Weekday, String> {
    match s.trim().to_lowercase().as_str() {
        "mon" | "seg" => Ok(Weekday::Mon),
        "tue" | "ter" => Ok(Weekday::Tue),
        "wed" | "qua" => Ok(Weekday::Wed),
        "thu" | "qui" => Ok(Weekday::Thu),
        "fri" | "sex" => Ok(Weekday::Fri),
        "sat" | "sab" => Ok(Weekday::Sat),
        "sun" | "dom" => Ok(Weekday::Sun),
        _ => Err(format!("invalid weekday: {s}")),
    }
}

fn parse_day_hours(s: &str) -> Result<DayHours, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("closed") {
        return Ok(DayHours::Closed);
    }
    let (open, close) = s
        .split_once('-')
        .ok_or_else(|| format!("invalid hours range: {s}"))?;
    let open = parse_time(open)?;
    let close = parse_time(close)?;
    if open >= close {
        return Err(format!("opening time must precede closing time: {s}"));
    }
    Ok(DayHours::Open { open, close })
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    let (hour, minute) = s
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("invalid time format: {s}"))?;
    let hour: u32 = hour.parse().map_err(|_| format!("invalid hour in: {s}"))?;
    let minute: u32 = minute
        .parse()
        .map_err(|_| format!("invalid minute in: {s}"))?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| format!("time out of range: {s}"))
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + c.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn is_open(wh: &WorkingHours, weekday: Weekday) -> bool {
        matches!(wh.hours_for(weekday), DayHours::Open { .. })
    }

    fn hours() -> WorkingHours {
        WorkingHours::from_json(r#"{"mon":"09:00-17:00","tue":"09:00-17:00","sun":"closed"}"#)
            .unwrap()
    }

    #[test]
    fn test_parse_valid_json() {
        let wh = hours();
        assert!(is_open(&wh, Weekday::Mon));
        assert!(!is_open(&wh, Weekday::Sun));
        // missing entries are closed
        assert!(!is_open(&wh, Weekday::Wed));
    }

    #[test]
    fn test_parse_portuguese_keys() {
        let wh = WorkingHours::from_json(r#"{"seg":"08:00-12:00","dom":"closed"}"#).unwrap();
        assert!(is_open(&wh, Weekday::Mon));
        assert!(!is_open(&wh, Weekday::Sun));
    }

    #[test]
    fn test_parse_invalid_day() {
        assert!(WorkingHours::from_json(r#"{"xyz":"09:00-17:00"}"#).is_err());
    }

    #[test]
    fn test_parse_invalid_range() {
        assert!(WorkingHours::from_json(r#"{"mon":"25:00-17:00"}"#).is_err());
        assert!(WorkingHours::from_json(r#"{"mon":"17:00-09:00"}"#).is_err());
        assert!(WorkingHours::from_json(r#"{"mon":"nine to five"}"#).is_err());
    }

    #[test]
    fn test_contains_end_exclusive_boundary() {
        let wh = hours();
        // 2025-06-16 is a Monday
        assert!(wh.contains(&dt("2025-06-16 09:00"), 60));
        assert!(wh.contains(&dt("2025-06-16 16:00"), 60));
        assert!(!wh.contains(&dt("2025-06-16 16:01"), 60));
        assert!(!wh.contains(&dt("2025-06-16 08:59"), 60));
        assert!(!wh.contains(&dt("2025-06-16 17:00"), 1));
    }

    #[test]
    fn test_contains_closed_day() {
        let wh = hours();
        // 2025-06-15 is a Sunday
        assert!(!wh.contains(&dt("2025-06-15 10:00"), 30));
    }

    #[test]
    fn test_json_round_trip_keeps_closed_days() {
        let wh = hours();
        let back = WorkingHours::from_json(&wh.to_json()).unwrap();
        assert_eq!(back, wh);
        assert!(wh.to_json().contains(r#""sun":"closed""#));
    }

    #[test]
    fn test_to_human_readable() {
        assert_eq!(hours().to_human_readable(), "Mon: 09:00-17:00, Tue: 09:00-17:00");
    }

    #[test]
    fn test_default_is_weekdays() {
        let wh = WorkingHours::default();
        assert!(is_open(&wh, Weekday::Fri));
        assert!(!is_open(&wh, Weekday::Sat));
    }
}
