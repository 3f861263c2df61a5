// Misuse Detector
//
// Every precondition/invariant check in the monitor funnels through `misuse`
// below. A violation is not a recoverable error: it is reported via a typed
// panic payload (`MisuseViolation`) so a caller using `std::panic::catch_unwind`
// can distinguish "the monitor detected misuse" from an ordinary panic
// elsewhere in the same thread, the same way the original C implementation's
// test harness distinguished its assertion failures from a plain SIGSEGV by
// routing them through a dedicated `SIGUSR1` handler.

use std::fmt;
use std::panic::Location;

/// Which side of the monitor an operation or violation pertains to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Reader,
    Writer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Reader => write!(f, "reader"),
            Role::Writer => write!(f, "writer"),
        }
    }
}

/// The taxonomy of caller-visible precondition and internal invariant
/// violations a [`Monitor`](crate::Monitor) can detect.
///
/// This mirrors the `String`-carrying-variant shape `rusty_db::error::DbError`
/// uses throughout the host crate, but intentionally does not implement
/// `std::error::Error` as a *recoverable* error type: misuse is not something
/// a caller can handle and continue from, so it is never returned in a
/// `Result`. It is only ever observed through [`MisuseViolation`]'s panic
/// payload.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MisuseKind {
    #[error("capacity must be greater than zero (max_readers={max_readers}, max_writers={max_writers})")]
    ZeroCapacity { max_readers: usize, max_writers: usize },

    #[error("task already holds the lock as {held}; cannot also acquire as {requested}")]
    CrossRoleReentry { held: Role, requested: Role },

    #[error("release() called while the monitor is idle (no acquire is outstanding)")]
    ReleaseWithoutAcquire,

    #[error("release() called by a task that never acquired as {role}")]
    ReleaseUnregisteredTask { role: Role },

    #[error("{role} registry capacity exhausted with active_{role}s below max_{role}s; this is a monitor bug")]
    RegistryCapacityExceeded { role: Role },

    #[error("destroy() called while the monitor is not quiescent (active_readers={active_readers}, active_writers={active_writers}, waiting_readers={waiting_readers}, waiting_writers={waiting_writers})")]
    DestroyWhileBusy {
        active_readers: usize,
        active_writers: usize,
        waiting_readers: usize,
        waiting_writers: usize,
    },
}

/// The panic payload raised for every detected misuse.
///
/// Carries the [`MisuseKind`], the call site that detected it, and an
/// optional free-text message, matching the "structured diagnostic including
/// source location" contract. Downcast a caught panic's payload with
/// `downcast_ref::<MisuseViolation>()` to confirm a panic came from this
/// monitor rather than from unrelated code on the same thread.
#[derive(Debug, Clone)]
pub struct MisuseViolation {
    pub kind: MisuseKind,
    pub location: &'static Location<'static>,
    pub message: Option<String>,
}

impl fmt::Display for MisuseViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "monitor misuse at {}: {}", self.location, self.kind)?;
        if let Some(message) = &self.message {
            write!(f, " ({message})")?;
        }
        Ok(())
    }
}

/// Emit a diagnostic and raise the monitor's distinguishable fatal failure.
///
/// Never returns. Logs via `tracing::error!` before unwinding so the failure
/// is visible in structured logs even when the panic itself is caught.
#[track_caller]
pub(crate) fn misuse(kind: MisuseKind) -> ! {
    let violation = MisuseViolation {
        kind,
        location: Location::caller(),
        message: None,
    };
    tracing::error!(location = %violation.location, kind = %violation.kind, "monitor misuse detected");
    std::panic::panic_any(violation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn violation_is_distinguishable_from_ordinary_panic() {
        let ordinary = catch_unwind(AssertUnwindSafe(|| panic!("not a monitor")))
            .expect_err("should panic");
        assert!(ordinary.downcast_ref::<MisuseViolation>().is_none());

        let from_monitor = catch_unwind(AssertUnwindSafe(|| {
            misuse(MisuseKind::ReleaseWithoutAcquire)
        }))
        .expect_err("should panic");
        assert_eq!(
            from_monitor.downcast_ref::<MisuseViolation>().unwrap().kind,
            MisuseKind::ReleaseWithoutAcquire
        );
    }
}
