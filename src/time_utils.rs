use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;

pub const DEFAULT_TIMEZONE: &str = "Europe/Paris";

#[derive(Clone, Copy, Debug)]
enum Zone {
    Named(Tz),
    Offset(FixedOffset),
}

/// Parses "+02:00", "-0530" or "+3" style offsets.
fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let (sign, digits) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    if digits.is_empty()
        || !digits.chars().all(|c| c.is_ascii_digit() || c == ':')
        || digits.matches(':').count() > 1
    {
        return None;
    }
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None if digits.len() > 2 => {
            let (h, m) = digits.split_at(digits.len() - 2);
            (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?)
        }
        None => (digits.parse::<i32>().ok()?, 0),
    };
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn resolve(raw: &str) -> Option<Zone> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let upper = trimmed.to_uppercase();
    if let Some(rest) = upper.strip_prefix("UTC").or_else(|| upper.strip_prefix("GMT")) {
        if rest.is_empty() {
            return FixedOffset::east_opt(0).map(Zone::Offset);
        }
        return parse_offset(rest).map(Zone::Offset);
    }
    if trimmed.starts_with('+') || trimmed.starts_with('-') {
        return parse_offset(trimmed).map(Zone::Offset);
    }
    trimmed.parse::<Tz>().ok().map(Zone::Named)
}

/// Returns the trimmed timezone name if it can be resolved.
pub fn normalize_timezone(raw: &str) -> Option<String> {
    resolve(raw).map(|_| raw.trim().to_string())
}

/// Calendar date of `now` in the user's timezone; unknown zones fall back to UTC.
pub fn local_date(raw_tz: &str, now: DateTime<Utc>) -> NaiveDate {
    match resolve(raw_tz) {
        Some(Zone::Named(tz)) => now.with_timezone(&tz).date_naive(),
        Some(Zone::Offset(offset)) => now.with_timezone(&offset).date_naive(),
        None => now.date_naive(),
    }
}
