//! Reproductive events and the statuses derived from them.

/// Date parsing for `dd/mm/yyyy` and ISO dates.
pub mod date;
/// Event model.
pub mod event;
/// Pure status derivation.
pub mod status;
