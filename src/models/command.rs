use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Schedule,
    Cancel,
    View,
    Block,
    Help,
    Unknown,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Schedule => "schedule",
            Action::Cancel => "cancel",
            Action::View => "view",
            Action::Block => "block",
            Action::Help => "help",
            Action::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Day,
    Week,
    Month,
}

/// A calendar day with an optional time of day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProposedDateTime {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl ProposedDateTime {
    pub fn at(&self) -> Option<NaiveDateTime> {
        self.time.map(|t| self.date.and_time(t))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedCommand {
    pub action: Action,
    pub patient_name_raw: Option<String>,
    pub proposed: Option<ProposedDateTime>,
    /// A date or time literal matched but does not exist on the calendar
    /// (`32/10`, `25h`). `proposed` is `None` in that case.
    pub invalid_date: bool,
    pub timeframe: Option<Timeframe>,
    pub confidence: f32,
    pub raw_text: String,
}

impl ParsedCommand {
    pub fn unknown(raw_text: &str) -> Self {
        Self {
            action: Action::Unknown,
            patient_name_raw: None,
            proposed: None,
            invalid_date: false,
            timeframe: None,
            confidence: 0.0,
            raw_text: raw_text.to_string(),
        }
    }
}
