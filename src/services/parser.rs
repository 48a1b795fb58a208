//! Turns a free-text chat message into a [`ParsedCommand`].
//!
//! Matching runs on a normalized copy of the message (lowercase, diacritics
//! stripped, punctuation folded to spaces). Rules are tried in table order and
//! the first one whose extractor accepts the match wins; there is no scoring
//! across rules. Entity spans are mapped back to the original text so patient
//! names keep their accents.

use std::ops::Range;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::{Action, ParsedCommand, ProposedDateTime, Timeframe};

const SCHEDULE_VERB: &str = r"(?:agendar|agende|marcar|marque|schedule|book)(?:\s+(?:uma\s+)?(?:sessao|consulta|atendimento))?(?:\s+(?:para|pra|com|o|a))?";
const CANCEL_VERB: &str = r"(?:cancelar|cancele|cancela|desmarcar|desmarque|cancel)(?:\s+(?:a|o))?(?:\s+(?:sessao|consulta|horario|atendimento))?(?:\s+(?:de|do|da|com))?";
const BLOCK_VERB: &str = r"(?:bloquear|bloqueie|bloqueia|block)(?:\s+(?:o|a))?(?:\s+(?:horario|dia|agenda|data))?";
const VIEW_HEAD: &str = r"(?:(?:ver|mostrar|mostre|consultar|verificar|qual|como\s+esta|check|view)\s+)*(?:a\s+|minha\s+|meus\s+|minhas\s+)?(?:agenda|horarios|sessoes|consultas|atendimentos)(?:\s+(?:de|da|do|desta|deste|dessa|desse|esta|este|essa|esse|nesta|neste|na|no|para|pra))*";
const HELP: &str = r"(?:ajuda|help|comandos|menu|socorro|o\s+que\s+voce\s+faz|como\s+funciona)";

const NAME: &str = r"(?P<name>\p{L}+(?:\s+\p{L}+)*?)";
const DAY_PREFIX: &str = r"(?:(?:dia|para|pra|na|no|de|do|da|em|o|a|proxima|proximo)\s+)*";
const DATE: &str = r"(?P<day>\d{1,2})/(?P<month>\d{1,2})(?:/(?P<year>\d{4}))?";
const RELATIVE: &str = r"(?P<rel>depois\s+de\s+amanha|hoje|amanha)";
const WEEKDAY: &str = r"(?P<wd>segunda|terca|quarta|quinta|sexta|sabado|domingo|seg|ter|qua|qui|sex|sab|dom)(?:\s+feira)?";
const TIME_SEP: &str = r"(?:\s+(?:as|a|ao|pelas|das)\s+|\s+)";
const TIME: &str = r"(?P<hour>\d{1,2})(?:(?::|h)(?P<minute>\d{2}))?\s*(?:h|hs|hrs|horas?)?";

/// Words that can never be (part of) a patient name.
const RESERVED: &[&str] = &[
    "segunda", "terca", "quarta", "quinta", "sexta", "sabado", "domingo", "seg", "ter", "qua",
    "qui", "sex", "sab", "dom", "feira", "hoje", "amanha", "dia",
];

struct Rule {
    action: Action,
    regex: Regex,
    extract: fn(&Captures<'_>, &Context<'_>) -> Option<ParsedCommand>,
}

struct Context<'a> {
    input: &'a str,
    normalized: &'a Normalized,
    now: NaiveDateTime,
}

fn day_fragment() -> String {
    [DAY_PREFIX, "(?:", DATE, "|", RELATIVE, "|", WEEKDAY, ")"].concat()
}

fn rule(
    action: Action,
    parts: &[&str],
    extract: fn(&Captures<'_>, &Context<'_>) -> Option<ParsedCommand>,
) -> Rule {
    let pattern = format!("^{}$", parts.concat());
    let regex = Regex::new(&pattern).expect("command pattern should compile - this is a bug");
    Rule {
        action,
        regex,
        extract,
    }
}

/// Priority order: schedule, cancel, view, block, help. Within an intent the
/// most specific pattern comes first. A time without a day still names the
/// patient, so the engine can ask for the date.
static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    let day = day_fragment();
    let day = day.as_str();
    vec![
        rule(Action::Schedule, &[SCHEDULE_VERB, r"\s+", NAME, r"\s+", day, TIME_SEP, TIME], extract_schedule),
        rule(Action::Schedule, &[SCHEDULE_VERB, r"\s+", NAME, r"\s+", day], extract_schedule),
        rule(Action::Schedule, &[SCHEDULE_VERB, r"\s+", NAME, TIME_SEP, TIME], extract_schedule),
        rule(Action::Schedule, &[SCHEDULE_VERB, r"\s+", NAME], extract_schedule),
        rule(Action::Cancel, &[CANCEL_VERB, r"\s+", NAME, r"\s+", day, TIME_SEP, TIME], extract_cancel),
        rule(Action::Cancel, &[CANCEL_VERB, r"\s+", NAME, r"\s+", day], extract_cancel),
        rule(Action::Cancel, &[CANCEL_VERB, r"\s+", NAME, TIME_SEP, TIME], extract_cancel),
        rule(Action::Cancel, &[CANCEL_VERB, r"\s+", NAME], extract_cancel),
        rule(Action::View, &[VIEW_HEAD, r"\s+(?P<tf>semana|mes)"], extract_view),
        rule(Action::View, &[VIEW_HEAD, r"\s+", day], extract_view),
        rule(Action::View, &[VIEW_HEAD], extract_view),
        rule(Action::Block, &[BLOCK_VERB, r"\s+", day, TIME_SEP, TIME], extract_block),
        rule(Action::Block, &[BLOCK_VERB, r"\s+", day], extract_block),
        rule(Action::Block, &[BLOCK_VERB, r"(?:\s+.*)?"], extract_block),
        rule(Action::Help, &[HELP], extract_help),
    ]
});

/// Parses `utterance` relative to `now` (the owner's local wall-clock time).
/// Never fails: anything unrecognized is `Action::Unknown` with confidence 0.
pub fn parse(utterance: &str, now: NaiveDateTime) -> ParsedCommand {
    let normalized = normalize(utterance);
    if normalized.text.is_empty() {
        return ParsedCommand::unknown(utterance);
    }

    let ctx = Context {
        input: utterance,
        normalized: &normalized,
        now,
    };

    for rule in RULES.iter() {
        let Some(caps) = rule.regex.captures(&normalized.text) else {
            continue;
        };
        if let Some(command) = (rule.extract)(&caps, &ctx) {
            tracing::debug!(
                action = rule.action.as_str(),
                confidence = command.confidence,
                "command parsed"
            );
            return command;
        }
    }

    ParsedCommand::unknown(utterance)
}

fn extract_schedule(caps: &Captures<'_>, ctx: &Context<'_>) -> Option<ParsedCommand> {
    patient_command(Action::Schedule, caps, ctx, 0.9, 0.3)
}

fn extract_cancel(caps: &Captures<'_>, ctx: &Context<'_>) -> Option<ParsedCommand> {
    patient_command(Action::Cancel, caps, ctx, 0.85, 0.3)
}

fn extract_view(caps: &Captures<'_>, ctx: &Context<'_>) -> Option<ParsedCommand> {
    let timeframe = match caps.name("tf").map(|m| m.as_str()) {
        Some("semana") => Timeframe::Week,
        Some("mes") => Timeframe::Month,
        _ => Timeframe::Day,
    };
    let when = extract_when(caps, ctx.now);
    Some(ParsedCommand {
        action: Action::View,
        patient_name_raw: None,
        proposed: when.proposed,
        invalid_date: when.invalid,
        timeframe: Some(timeframe),
        confidence: 0.95,
        raw_text: ctx.input.to_string(),
    })
}

fn extract_block(caps: &Captures<'_>, ctx: &Context<'_>) -> Option<ParsedCommand> {
    let when = extract_when(caps, ctx.now);
    Some(ParsedCommand {
        action: Action::Block,
        patient_name_raw: None,
        proposed: when.proposed,
        invalid_date: when.invalid,
        timeframe: None,
        confidence: if when.matched { 0.8 } else { 0.3 },
        raw_text: ctx.input.to_string(),
    })
}

fn extract_help(_caps: &Captures<'_>, ctx: &Context<'_>) -> Option<ParsedCommand> {
    Some(ParsedCommand {
        action: Action::Help,
        patient_name_raw: None,
        proposed: None,
        invalid_date: false,
        timeframe: None,
        confidence: 1.0,
        raw_text: ctx.input.to_string(),
    })
}

fn patient_command(
    action: Action,
    caps: &Captures<'_>,
    ctx: &Context<'_>,
    with_date: f32,
    without_date: f32,
) -> Option<ParsedCommand> {
    let name = caps.name("name")?;
    if name
        .as_str()
        .split_whitespace()
        .any(|word| RESERVED.contains(&word))
    {
        return None;
    }
    let patient_name = title_case(ctx.normalized.original(ctx.input, name.range()));

    let when = extract_when(caps, ctx.now);
    Some(ParsedCommand {
        action,
        patient_name_raw: Some(patient_name),
        proposed: when.proposed,
        invalid_date: when.invalid,
        timeframe: None,
        confidence: if when.matched { with_date } else { without_date },
        raw_text: ctx.input.to_string(),
    })
}

struct When {
    /// A date pattern took part in the match, valid or not.
    matched: bool,
    invalid: bool,
    proposed: Option<ProposedDateTime>,
}

fn extract_when(caps: &Captures<'_>, now: NaiveDateTime) -> When {
    let today = now.date();
    let date = if let Some(day) = caps.name("day") {
        let year = caps
            .name("year")
            .and_then(|y| y.as_str().parse().ok())
            .unwrap_or_else(|| today.year());
        let month = caps.name("month").and_then(|m| m.as_str().parse().ok());
        Some(month.and_then(|m| {
            day.as_str()
                .parse()
                .ok()
                .and_then(|d| NaiveDate::from_ymd_opt(year, m, d))
        }))
    } else if let Some(rel) = caps.name("rel") {
        Some(match rel.as_str() {
            "hoje" => Some(today),
            "amanha" => today.succ_opt(),
            _ => today.checked_add_signed(Duration::days(2)),
        })
    } else {
        caps.name("wd")
            .map(|wd| weekday_from(wd.as_str()).map(|w| next_weekday(today, w)))
    };

    let Some(date) = date else {
        return When {
            matched: false,
            invalid: false,
            proposed: None,
        };
    };

    let time = caps.name("hour").map(|hour| {
        let minute = caps
            .name("minute")
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        hour.as_str()
            .parse()
            .ok()
            .and_then(|h| NaiveTime::from_hms_opt(h, minute, 0))
    });

    match (date, time) {
        (Some(date), None) => When {
            matched: true,
            invalid: false,
            proposed: Some(ProposedDateTime { date, time: None }),
        },
        (Some(date), Some(Some(time))) => When {
            matched: true,
            invalid: false,
            proposed: Some(ProposedDateTime {
                date,
                time: Some(time),
            }),
        },
        _ => When {
            matched: true,
            invalid: true,
            proposed: None,
        },
    }
}

fn weekday_from(token: &str) -> Option<Weekday> {
    match token {
        "segunda" | "seg" => Some(Weekday::Mon),
        "terca" | "ter" => Some(Weekday::Tue),
        "quarta" | "qua" => Some(Weekday::Wed),
        "quinta" | "qui" => Some(Weekday::Thu),
        "sexta" | "sex" => Some(Weekday::Fri),
        "sabado" | "sab" => Some(Weekday::Sat),
        "domingo" | "dom" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Next occurrence strictly after `today`; the same weekday rolls a week ahead.
pub fn next_weekday(today: NaiveDate, target: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday();
    let wanted = target.num_days_from_monday();
    let mut ahead = (wanted + 7 - current) % 7;
    if ahead == 0 {
        ahead = 7;
    }
    today + Duration::days(i64::from(ahead))
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Normalized text plus, for every byte of it, the byte range of the
/// original character it came from.
pub struct Normalized {
    pub text: String,
    origin: Vec<(usize, usize)>,
}

impl Normalized {
    fn original<'a>(&self, input: &'a str, range: Range<usize>) -> &'a str {
        if range.is_empty() {
            return "";
        }
        let start = self.origin[range.start].0;
        let end = self.origin[range.end - 1].1;
        &input[start..end]
    }
}

/// Lowercases, strips diacritics, keeps `:` and `/`, folds everything else
/// that is not alphanumeric into single spaces and trims.
pub fn normalize(input: &str) -> Normalized {
    let mut text = String::with_capacity(input.len());
    let mut origin = Vec::with_capacity(input.len());
    let mut pending_space = false;

    for (idx, ch) in input.char_indices() {
        let span = (idx, idx + ch.len_utf8());
        for c in std::iter::once(ch)
            .nfd()
            .filter(|c| !is_combining_mark(*c))
            .flat_map(char::to_lowercase)
        {
            if c.is_alphanumeric() || c == ':' || c == '/' {
                if pending_space && !text.is_empty() {
                    text.push(' ');
                    origin.push(span);
                }
                pending_space = false;
                text.push(c);
                origin.extend(std::iter::repeat(span).take(c.len_utf8()));
            } else {
                pending_space = true;
            }
        }
    }

    Normalized { text, origin }
}

/// Case- and accent-insensitive form used for name comparison.
pub fn fold(s: &str) -> String {
    normalize(s).text
}
