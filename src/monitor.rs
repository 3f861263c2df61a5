// Monitor: the public reentrant reader/writer lock.
//
// Wires the State Core (`state.rs`), the Recursion Registry (`registry.rs`),
// and the Misuse Detector (`diagnostics.rs`) together behind one
// `parking_lot::Mutex` and two `parking_lot::Condvar`s, the same shape
// `rusty-db`'s `src/transaction/locks.rs` uses to pair a mutex-guarded lock
// table entry with a condvar per waiting queue.

use std::thread;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::diagnostics::{misuse, MisuseKind, Role};
use crate::state::{MonitorState, Occupancy};

/// Default reader capacity when none is specified, mirroring the original C
/// implementation's `DEFAULT_MAX_READER_THREADS_NUM` (0xFFFF, i.e.
/// "effectively unbounded" for realistic thread counts).
const DEFAULT_MAX_READERS: usize = 0xFFFF;

/// Default writer capacity, mirroring `DEFAULT_MAX_WRITER_THREADS_NUM`.
const DEFAULT_MAX_WRITERS: usize = 1;

/// Construction-time configuration for a [`Monitor`].
///
/// Plays the same role `rusty_db::Config`/`DatabaseConfig` play for the host
/// crate: a plain, `Default`-able settings struct consumed by a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub max_readers: usize,
    pub max_writers: usize,
    /// Whether `tracing` events are emitted on the acquire/release hot path.
    /// Off by default: the instrumentation is only worth its cost while
    /// diagnosing a specific issue.
    pub trace_events: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_readers: DEFAULT_MAX_READERS,
            max_writers: DEFAULT_MAX_WRITERS,
            trace_events: false,
        }
    }
}

/// Builder for [`Monitor`], for callers that want something other than the
/// `Monitor::new(max_readers, max_writers)` defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonitorBuilder {
    config: MonitorConfig,
}

impl MonitorBuilder {
    pub fn max_readers(mut self, max_readers: usize) -> Self {
        self.config.max_readers = max_readers;
        self
    }

    pub fn max_writers(mut self, max_writers: usize) -> Self {
        self.config.max_writers = max_writers;
        self
    }

    pub fn trace_events(mut self, enabled: bool) -> Self {
        self.config.trace_events = enabled;
        self
    }

    /// Build the monitor. Misuse: either capacity is zero.
    #[track_caller]
    pub fn build(self) -> Monitor {
        let MonitorConfig {
            max_readers,
            max_writers,
            trace_events,
        } = self.config;

        if max_readers == 0 || max_writers == 0 {
            misuse(MisuseKind::ZeroCapacity {
                max_readers,
                max_writers,
            });
        }

        if trace_events {
            tracing::info!(max_readers, max_writers, "monitor created");
        }

        Monitor {
            state: Mutex::new(MonitorState::new(max_readers, max_writers)),
            reader_cv: Condvar::new(),
            writer_cv: Condvar::new(),
            trace_events,
        }
    }
}

/// A point-in-time view of the monitor's occupancy, for tests and
/// diagnostics. Mirrors `rusty-db`'s `RwLockStatsSnapshot` naming for its
/// lock-free `RwLockWP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub active_readers: usize,
    pub active_writers: usize,
    pub waiting_readers: usize,
    pub waiting_writers: usize,
    pub blocking_new_readers: bool,
    pub blocking_new_writers: bool,
}

/// The reentrant reader/writer monitor.
///
/// `acquire_read`/`acquire_write`/`release` operate on the calling thread's
/// identity implicitly (there is no explicit handle/guard type); a task that
/// already holds the lock may re-acquire it in the same role any number of
/// times, and must call `release` an equal number of times. Acquiring in the
/// opposite role while already holding is misuse, not an upgrade/downgrade.
pub struct Monitor {
    state: Mutex<MonitorState>,
    reader_cv: Condvar,
    writer_cv: Condvar,
    trace_events: bool,
}

impl Monitor {
    /// Create a monitor with the given reader/writer capacities. Misuse if
    /// either is zero.
    #[track_caller]
    pub fn new(max_readers: usize, max_writers: usize) -> Self {
        Self::builder()
            .max_readers(max_readers)
            .max_writers(max_writers)
            .build()
    }

    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::default()
    }

    /// Acquire the lock for reading. Suspends while a writer holds the CS,
    /// while `block_new_readers` is set, or while this would exceed
    /// `max_readers` for a task not already holding as reader. Reentrant:
    /// a task already holding as reader may call this again, incrementing
    /// its recursion count instead of consuming new capacity.
    ///
    /// Misuse: the calling task already holds the lock as writer.
    #[track_caller]
    pub fn acquire_read(&self) {
        let holder = thread::current().id();
        let mut state = self.state.lock();

        if state.writer_registry.find(holder).is_some() {
            misuse(MisuseKind::CrossRoleReentry {
                held: Role::Writer,
                requested: Role::Reader,
            });
        }

        while state.occupancy == Occupancy::WriterHeld
            || !state.reader_capacity_available(holder)
            || state.block_new_readers
        {
            state.waiting_readers += 1;
            if self.trace_events {
                tracing::trace!(waiting_readers = state.waiting_readers, "reader parking");
            }
            self.reader_cv.wait(&mut state);
            state.waiting_readers -= 1;
        }

        match state.reader_registry.find(holder) {
            Some(index) => state.reader_registry.increment(index),
            None => {
                let index = state.reader_registry.insert(holder);
                state.reader_registry.increment(index);
                state.active_readers += 1;
                state.occupancy = Occupancy::ReadersHeld;
            }
        }

        #[cfg(debug_assertions)]
        state.debug_check_invariants();

        if self.trace_events {
            tracing::debug!(active_readers = state.active_readers, "reader acquired");
        }
    }

    /// Acquire the lock for writing. Symmetric to [`Monitor::acquire_read`]:
    /// suspends while readers hold the CS, while `block_new_writers` is set,
    /// or while this would exceed `max_writers` for a task not already
    /// holding as writer. With `max_writers > 1`, multiple distinct writer
    /// tasks may hold the CS concurrently; this monitor does not enforce
    /// mutual exclusion among writers, only between writers and readers.
    ///
    /// Misuse: the calling task already holds the lock as reader.
    #[track_caller]
    pub fn acquire_write(&self) {
        let holder = thread::current().id();
        let mut state = self.state.lock();

        if state.reader_registry.find(holder).is_some() {
            misuse(MisuseKind::CrossRoleReentry {
                held: Role::Reader,
                requested: Role::Writer,
            });
        }

        while state.occupancy == Occupancy::ReadersHeld
            || !state.writer_capacity_available(holder)
            || state.block_new_writers
        {
            state.waiting_writers += 1;
            if self.trace_events {
                tracing::trace!(waiting_writers = state.waiting_writers, "writer parking");
            }
            self.writer_cv.wait(&mut state);
            state.waiting_writers -= 1;
        }

        match state.writer_registry.find(holder) {
            Some(index) => state.writer_registry.increment(index),
            None => {
                let index = state.writer_registry.insert(holder);
                state.writer_registry.increment(index);
                state.active_writers += 1;
                state.occupancy = Occupancy::WriterHeld;
            }
        }

        #[cfg(debug_assertions)]
        state.debug_check_invariants();

        if self.trace_events {
            tracing::debug!(active_writers = state.active_writers, "writer acquired");
        }
    }

    /// Release one level of recursion of whichever role the calling task
    /// currently holds. When the task's count reaches zero it is removed
    /// from its registry; when the last holder of the current occupancy
    /// releases, the CS returns to `Idle` and the Wake Policy chooses which
    /// side (if any) to wake.
    ///
    /// Misuse: the calling task does not currently hold the lock in either
    /// role.
    #[track_caller]
    pub fn release(&self) {
        let holder = thread::current().id();
        let mut state = self.state.lock();

        match state.occupancy {
            Occupancy::WriterHeld => {
                let index = state
                    .writer_registry
                    .find(holder)
                    .unwrap_or_else(|| misuse(MisuseKind::ReleaseUnregisteredTask { role: Role::Writer }));
                state.writer_registry.decrement(index);
                if state.writer_registry.is_zero(index) {
                    state.writer_registry.clear(index);
                    state.active_writers -= 1;
                    if state.active_writers == 0 {
                        state.occupancy = Occupancy::Idle;
                        self.notify_wake(&mut state, Role::Writer);
                    }
                }
            }
            Occupancy::ReadersHeld => {
                let index = state
                    .reader_registry
                    .find(holder)
                    .unwrap_or_else(|| misuse(MisuseKind::ReleaseUnregisteredTask { role: Role::Reader }));
                state.reader_registry.decrement(index);
                if state.reader_registry.is_zero(index) {
                    state.reader_registry.clear(index);
                    state.active_readers -= 1;
                    if state.active_readers == 0 {
                        state.occupancy = Occupancy::Idle;
                        self.notify_wake(&mut state, Role::Reader);
                    }
                    // A reader release that leaves other readers active must
                    // not wake a parked writer: the writer CV is only ever
                    // notified once `active_readers` has reached zero, above.
                }
            }
            Occupancy::Idle => misuse(MisuseKind::ReleaseWithoutAcquire),
        }

        #[cfg(debug_assertions)]
        state.debug_check_invariants();

        if self.trace_events {
            tracing::debug!(
                active_readers = state.active_readers,
                active_writers = state.active_writers,
                "released"
            );
        }
    }

    /// Explicit, documented spelling of the destroy operation: verifies the
    /// monitor is fully quiescent and consumes it. The same check also runs
    /// in `Drop`, so a `Monitor` that is merely let go out of scope while
    /// busy is detected exactly the same way.
    ///
    /// Misuse: the monitor is not Idle, or has outstanding waiters, or
    /// either registry is non-empty.
    #[track_caller]
    pub fn destroy(self) {
        // Dropping `self` here runs `Drop::drop`, which performs the
        // quiescence check. Spelled out as its own method so the operation
        // has a call site matching the documented operation table, rather
        // than relying on scope exit alone.
    }

    /// Point-in-time snapshot of occupancy counters and bias flags, for
    /// tests and diagnostics.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.state.lock();
        MonitorSnapshot {
            active_readers: state.active_readers,
            active_writers: state.active_writers,
            waiting_readers: state.waiting_readers,
            waiting_writers: state.waiting_writers,
            blocking_new_readers: state.block_new_readers,
            blocking_new_writers: state.block_new_writers,
        }
    }

    fn notify_wake(&self, state: &mut MutexGuard<'_, MonitorState>, releaser: Role) {
        match state.wake_policy(releaser) {
            Some(Role::Reader) => {
                if self.trace_events {
                    tracing::trace!("waking reader waiters");
                }
                self.reader_cv.notify_all();
            }
            Some(Role::Writer) => {
                if self.trace_events {
                    tracing::trace!("waking writer waiters");
                }
                self.writer_cv.notify_all();
            }
            None => {}
        }
    }
}

impl Drop for Monitor {
    /// Verifies the monitor is quiescent (occupancy Idle, both `active_*`
    /// zero, both `waiting_*` zero, both registries empty) and raises misuse
    /// otherwise. A `Monitor` dropped while busy is always a caller bug:
    /// there is no way to "finish" outstanding holders once the value they
    /// would call `release()` on is gone.
    #[track_caller]
    fn drop(&mut self) {
        let state = self.state.lock();
        if !state.is_quiescent() {
            misuse(MisuseKind::DestroyWhileBusy {
                active_readers: state.active_readers,
                active_writers: state.active_writers,
                waiting_readers: state.waiting_readers,
                waiting_writers: state.waiting_writers,
            });
        }
        if self.trace_events {
            tracing::info!("monitor destroyed");
        }
    }
}
