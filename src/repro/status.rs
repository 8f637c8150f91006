//! Status derivation over one animal's event log.
//!
//! Every function here is pure: events are read, never reordered or mutated,
//! and input order does not matter. The current cycle is every event dated
//! strictly after the most recent calving (or all events without a calving).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::event::{EventType, ReproEvent};

/// Herd-level tuning for status derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReproSettings {
    /// Voluntary waiting period after calving, in days.
    pub voluntary_waiting_days: i64,
}

impl Default for ReproSettings {
    fn default() -> Self {
        Self {
            voluntary_waiting_days: 45,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductiveStatus {
    Lactating,
    Dry,
    Heifer,
    NotLactating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReproductiveStatus {
    Open,
    Inseminated,
    /// Inside the voluntary waiting period (PEV).
    PostPartum,
}

/// Everything the animal pages display about reproduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReproSummary {
    pub last_calving: Option<NaiveDate>,
    pub last_insemination: Option<NaiveDate>,
    pub last_dry_off: Option<NaiveDate>,
    pub days_in_milk: Option<i64>,
    pub days_since_insemination: Option<i64>,
    pub pregnancy_confirmed: bool,
    pub productive: ProductiveStatus,
    pub reproductive: ReproductiveStatus,
}

fn latest(events: &[ReproEvent], kind: EventType) -> Option<NaiveDate> {
    events
        .iter()
        .filter(|e| e.event_type == kind)
        .map(|e| e.event_date)
        .max()
}

/// Date of the most recent calving.
pub fn last_calving(events: &[ReproEvent]) -> Option<NaiveDate> {
    latest(events, EventType::Parto)
}

/// Events of the current cycle.
pub fn current_cycle(events: &[ReproEvent]) -> Vec<&ReproEvent> {
    match last_calving(events) {
        Some(calving) => events.iter().filter(|e| e.event_date > calving).collect(),
        None => events.iter().collect(),
    }
}

fn latest_in_cycle(events: &[ReproEvent], kind: EventType) -> Option<NaiveDate> {
    current_cycle(events)
        .into_iter()
        .filter(|e| e.event_type == kind)
        .map(|e| e.event_date)
        .max()
}

/// Most recent insemination of the current cycle.
pub fn last_insemination(events: &[ReproEvent]) -> Option<NaiveDate> {
    latest_in_cycle(events, EventType::Ia)
}

/// Most recent dry-off of the current cycle.
pub fn last_dry_off(events: &[ReproEvent]) -> Option<NaiveDate> {
    latest_in_cycle(events, EventType::Secagem)
}

/// DEL: whole days since the last calving, `None` once dried off.
///
/// A calving dated after `today` yields 0.
pub fn days_in_milk(events: &[ReproEvent], today: NaiveDate) -> Option<i64> {
    let calving = last_calving(events)?;
    if last_dry_off(events).is_some_and(|dry| dry > calving) {
        return None;
    }
    Some((today - calving).num_days().max(0))
}

pub fn productive_status(events: &[ReproEvent]) -> ProductiveStatus {
    if last_calving(events).is_some() {
        return if last_dry_off(events).is_some() {
            ProductiveStatus::Dry
        } else {
            ProductiveStatus::Lactating
        };
    }

    // Never calved: the later of a dry-off or an abortion decides.
    let dry = latest(events, EventType::Secagem);
    let aborted = latest(events, EventType::Aborto);
    match (dry, aborted) {
        (Some(d), Some(a)) if a > d => ProductiveStatus::NotLactating,
        (Some(_), _) => ProductiveStatus::Dry,
        (None, Some(_)) => ProductiveStatus::NotLactating,
        (None, None) => ProductiveStatus::Heifer,
    }
}

/// True when the last insemination was followed by a positive diagnosis
/// and no abortion since.
pub fn pregnancy_confirmed(events: &[ReproEvent]) -> bool {
    let Some(ia) = last_insemination(events) else {
        return false;
    };
    let cycle = current_cycle(events);
    let last_dg = cycle
        .iter()
        .filter(|e| e.event_type == EventType::Dg && e.event_date > ia)
        .max_by_key(|e| e.event_date);
    let Some(dg) = last_dg else {
        return false;
    };
    if dg.diagnosis_positive() != Some(true) {
        return false;
    }
    !cycle
        .iter()
        .any(|e| e.event_type == EventType::Aborto && e.event_date >= dg.event_date)
}

pub fn reproductive_status(
    events: &[ReproEvent],
    today: NaiveDate,
    settings: &ReproSettings,
) -> ReproductiveStatus {
    if let Some(ia) = last_insemination(events) {
        let failed = current_cycle(events).into_iter().any(|e| {
            e.event_date > ia
                && match e.event_type {
                    EventType::Aborto => true,
                    EventType::Dg => e.diagnosis_positive() == Some(false),
                    _ => false,
                }
        });
        return if failed {
            ReproductiveStatus::Open
        } else {
            ReproductiveStatus::Inseminated
        };
    }

    match last_calving(events) {
        Some(calving) if (today - calving).num_days() < settings.voluntary_waiting_days => {
            ReproductiveStatus::PostPartum
        }
        _ => ReproductiveStatus::Open,
    }
}

pub fn derive_status(events: &[ReproEvent], today: NaiveDate, settings: &ReproSettings) -> ReproSummary {
    let ia = last_insemination(events);
    ReproSummary {
        last_calving: last_calving(events),
        last_insemination: ia,
        last_dry_off: last_dry_off(events),
        days_in_milk: days_in_milk(events, today),
        days_since_insemination: ia.map(|ia| (today - ia).num_days().max(0)),
        pregnancy_confirmed: pregnancy_confirmed(events),
        productive: productive_status(events),
        reproductive: reproductive_status(events, today, settings),
    }
}
