//! Error types used by the taskvalve runtime.
//!
//! Scheduling operations themselves never fail: adding, suspending,
//! resuming, canceling and polling are best-effort mutations of in-memory
//! collections. The only fallible step is **construction**, covered by
//! [`RuntimeError`].
//!
//! Failures inside task callbacks or subscribers are caught and surfaced as
//! [`Event`](crate::Event)s instead of errors.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced while building a scheduler or a valve.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Component was constructed outside of a tokio runtime.
    #[error("no tokio runtime available; construct inside a runtime context")]
    NoRuntime,

    /// A configuration field holds a value the runtime cannot honor.
    #[error("invalid config `{field}`: {reason}")]
    InvalidConfig {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskvalve::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::NoRuntime.as_label(), "runtime_missing");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::NoRuntime => "runtime_missing",
            RuntimeError::InvalidConfig { .. } => "runtime_invalid_config",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::NoRuntime => "no tokio runtime".to_string(),
            RuntimeError::InvalidConfig { field, reason } => {
                format!("invalid {field}: {reason}")
            }
        }
    }

    /// Rejects a zero-length clock period.
    pub(crate) fn require_period(field: &'static str, period: Duration) -> Result<(), Self> {
        if period.is_zero() {
            return Err(RuntimeError::InvalidConfig {
                field,
                reason: "period must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Captures the ambient tokio runtime handle.
pub(crate) fn current_runtime() -> Result<tokio::runtime::Handle, RuntimeError> {
    tokio::runtime::Handle::try_current().map_err(|_| RuntimeError::NoRuntime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_period_is_rejected() {
        let err = RuntimeError::require_period("interval", Duration::ZERO).unwrap_err();
        assert_eq!(err.as_label(), "runtime_invalid_config");
        assert!(err.to_string().contains("interval"));
        assert!(RuntimeError::require_period("interval", Duration::from_millis(1)).is_ok());
    }

    #[test]
    fn panic_payloads_are_rendered() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(&*payload), "boom");
        let payload = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(&*payload), "code 7");
    }

    #[test]
    fn missing_runtime_is_reported() {
        assert_eq!(current_runtime().unwrap_err(), RuntimeError::NoRuntime);
    }
}
