//! Fault capture for request handling.
//!
//! A [`FaultReport`] is the `error` object of a structured log record. Reports
//! come from three places: handler errors that surface as a 500, panics
//! caught by the request middleware, and panics inside blocking work.
//!
//! The panic hook runs on the panicking thread before unwinding starts, which
//! is the only point where the panic's backtrace is available. Inside a
//! request it parks the report in a thread-local slot, keyed by the
//! request's correlation ID; the code that catches the unwind on that same
//! thread takes it back out for the same ID.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::panic::PanicHookInfo;
use std::sync::Once;

use crate::http::request::CorrelationId;
use crate::observability::context::RequestContext;

thread_local! {
    static LAST_PANIC: RefCell<Option<(CorrelationId, FaultReport)>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Error details attached to a log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultReport {
    /// Short error kind, e.g. `panic` or the error's type name.
    pub kind: String,
    pub message: String,
    pub stack: String,
}

impl FaultReport {
    /// Build a report from an error value, including its source chain.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let mut stack = String::new();
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push_str("caused by: ");
            stack.push_str(&cause.to_string());
            stack.push('\n');
            source = cause.source();
        }
        stack.push_str(&Backtrace::force_capture().to_string());

        Self {
            kind: short_type_name::<E>().to_string(),
            message: err.to_string(),
            stack: stack.trim_end().to_string(),
        }
    }

    /// Build a report from a caught panic payload when the hook did not run.
    pub fn from_panic_payload(payload: &(dyn Any + Send)) -> Self {
        Self {
            kind: "panic".to_string(),
            message: panic_message(payload),
            stack: Backtrace::force_capture().to_string().trim_end().to_string(),
        }
    }

    fn from_hook(info: &PanicHookInfo<'_>) -> Self {
        let location = info
            .location()
            .map(|l| format!("panicked at {}:{}:{}\n", l.file(), l.line(), l.column()))
            .unwrap_or_default();

        Self {
            kind: "panic".to_string(),
            message: panic_message(info.payload()),
            stack: format!("{location}{}", Backtrace::force_capture())
                .trim_end()
                .to_string(),
        }
    }
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Install the process-wide panic hook. Later calls are no-ops.
///
/// Panics raised outside any request are logged at critical severity and
/// then handed to the previously installed hook.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let report = FaultReport::from_hook(info);
            if let Some(id) = RequestContext::current() {
                LAST_PANIC.with(|slot| *slot.borrow_mut() = Some((id, report)));
                return;
            }

            tracing::error!(
                severity = "critical",
                component = "runtime",
                "error.type" = %report.kind,
                "error.message" = %report.message,
                "error.stack" = %report.stack,
                "unhandled panic outside request scope"
            );
            previous(info);
        }));
    });
}

/// Take the report the panic hook parked on this thread for request `id`.
///
/// The slot is always emptied; a report parked under another ID is dropped.
pub fn take_last_panic(id: &CorrelationId) -> Option<FaultReport> {
    LAST_PANIC
        .try_with(|slot| slot.borrow_mut().take())
        .ok()
        .flatten()
        .and_then(|(owner, report)| (owner == *id).then_some(report))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_from_error_records_kind_and_chain() {
        let err = Outer(std::io::Error::other("disk on fire"));
        let report = FaultReport::from_error(&err);
        assert_eq!(report.kind, "Outer");
        assert_eq!(report.message, "outer failure");
        assert!(report.stack.starts_with("caused by: disk on fire"));
    }

    #[test]
    fn test_panic_payload_messages() {
        let report = FaultReport::from_panic_payload(&"static str");
        assert_eq!(report.kind, "panic");
        assert_eq!(report.message, "static str");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(FaultReport::from_panic_payload(owned.as_ref()).message, "owned");

        let opaque: Box<dyn Any + Send> = Box::new(7_u32);
        assert_eq!(FaultReport::from_panic_payload(opaque.as_ref()).message, "Box<dyn Any>");
    }

    fn panic_inside(id: &CorrelationId, message: &'static str) {
        install_panic_hook();
        let token = RequestContext::enter(id.clone());
        let caught = std::panic::catch_unwind(|| panic!("{message}"));
        RequestContext::exit(token);
        assert!(caught.is_err());
    }

    #[test]
    fn test_hook_parks_report_inside_request() {
        let id = CorrelationId::generate();
        panic_inside(&id, "parked 1");

        let report = take_last_panic(&id).expect("hook should park the report");
        assert_eq!(report.message, "parked 1");
        assert!(report.stack.starts_with("panicked at"));
        assert!(take_last_panic(&id).is_none());
    }

    #[test]
    fn test_stale_report_is_not_handed_to_another_request() {
        let first = CorrelationId::generate();
        let second = CorrelationId::generate();
        panic_inside(&first, "belongs to first");

        assert!(take_last_panic(&second).is_none());
        assert!(take_last_panic(&first).is_none(), "mismatched take clears the slot");

        panic_inside(&first, "stale");
        panic_inside(&second, "fresh");
        assert_eq!(take_last_panic(&second).unwrap().message, "fresh");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<std::io::Error>(), "Error");
        assert_eq!(short_type_name::<Vec<u8>>(), "Vec");
    }
}
