//! Single-writer sync runtime and its event stream.

/// Event payloads broadcast by the runtime.
pub mod events;
/// Handle, command loop and outbox drain.
pub mod handle;
