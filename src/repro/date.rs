//! Tolerant calendar-date parsing for event logs.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, de::Error as _};

/// Parses `dd/mm/yyyy` or `yyyy-mm-dd` (an ISO timestamp suffix is ignored).
///
/// Impossible dates such as `31/02/2024` are rejected, never rolled over.
pub fn parse_br_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    if s.contains('/') {
        let mut parts = s.split('/');
        let (d, m, y) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || d.len() > 2 || m.len() > 2 || y.len() != 4 {
            return None;
        }
        return ymd(y, m, d);
    }

    let date_part = s.split(['T', ' ']).next()?;
    let mut parts = date_part.split('-');
    let (y, m, d) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || y.len() != 4 || m.len() > 2 || d.len() > 2 {
        return None;
    }
    ymd(y, m, d)
}

/// Formats as `dd/mm/yyyy`.
pub fn format_br_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    if [y, m, d]
        .iter()
        .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

pub(crate) fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_br_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid date: {raw:?}")))
}
