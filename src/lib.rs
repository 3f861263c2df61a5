// Reentrant reader/writer monitor
//
// A synchronization primitive that coordinates many reader tasks and many
// writer tasks contending on the same critical section, with bounded
// concurrency, per-task reentrancy, configurable reader/writer bias, and
// misuse detection surfaced as a typed panic rather than silent corruption.

mod diagnostics;
mod registry;
mod state;

pub mod monitor;

pub use diagnostics::{MisuseKind, MisuseViolation, Role};
pub use monitor::{Monitor, MonitorBuilder, MonitorConfig};
