//! Structured logging helpers.
//!
//! All events use the `drover` target and carry an `event` field plus a
//! `component` field naming the subsystem. The crate never installs a global
//! subscriber; applications configure `tracing` themselves.

/// Target for all log events emitted by this crate.
pub(crate) const DROVER_TARGET: &str = "drover";

macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::DROVER_TARGET, $($field)*)
    };
}

macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::DROVER_TARGET, $($field)*)
    };
}

macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::DROVER_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_info;
pub(crate) use log_warn;
