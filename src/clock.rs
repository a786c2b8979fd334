//! Time seam: the core needs a monotonic clock for rate limits/timeouts and
//! a wall clock to compare against emergency event timestamps, both
//! supplied by the host rather than read directly (keeps the cyclic path
//! free of any system call, matching §5's no-suspend requirement).

/// Supplies the two clocks the state machine needs.
pub trait Clock {
    /// Monotonically increasing seconds, unaffected by wall-clock jumps.
    fn monotonic_now(&self) -> f64;

    /// Wall-clock seconds, comparable against emergency queue event times.
    fn wall_now(&self) -> f64;
}
