//! Monotonic elapsed-time measurement.
//!
//! Every backend reports integer nanoseconds from its own origin; callers only
//! ever see milliseconds as `f64` (`nanos / 1_000_000.0`), so switching clocks
//! does not change the unit or the precision of recorded latencies.
//!
//! Backends:
//! - [`OsClock`]: OS high-resolution monotonic clock (`std::time::Instant`).
//! - [`NanoClock`]: process-wide raw nanosecond tick counter (same source as
//!   `OsClock`, one shared origin).
//! - [`RuntimeClock`]: the tokio runtime's timer (honors paused test time).
//!
//! Wall-clock sources are never used: they jump on NTP adjustment.

use std::future::Future;
use std::sync::OnceLock;
use std::time::Instant;

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// A monotonic nanosecond source.
pub trait MonotonicClock: Send + Sync {
    /// Nanoseconds since this clock's origin. Never decreases.
    fn now_nanos(&self) -> u64;
}

/// `std::time::Instant` backed clock.
#[derive(Debug, Clone, Copy)]
pub struct OsClock {
    origin: Instant,
}

impl OsClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for OsClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for OsClock {
    fn now_nanos(&self) -> u64 {
        saturating_nanos(self.origin.elapsed().as_nanos())
    }
}

/// Raw nanosecond ticks shared by the whole process.
///
/// Reads the same OS monotonic source as [`OsClock`]; the difference is the
/// origin. `OsClock` counts from its own construction, `NanoClock` from one
/// anchor fixed on first use, so tick values are comparable across every
/// `NanoClock` in the process and can be stored as plain `u64` marks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NanoClock;

impl NanoClock {
    /// Current tick, in nanoseconds since the process-wide anchor.
    pub fn nano_time() -> u64 {
        static ANCHOR: OnceLock<Instant> = OnceLock::new();
        let anchor = ANCHOR.get_or_init(Instant::now);
        saturating_nanos(anchor.elapsed().as_nanos())
    }
}

impl MonotonicClock for NanoClock {
    fn now_nanos(&self) -> u64 {
        Self::nano_time()
    }
}

/// tokio timer backed clock.
///
/// Follows the runtime's notion of time, so `tokio::time::pause` and
/// `advance` drive it in tests.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeClock {
    origin: tokio::time::Instant,
}

impl RuntimeClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for RuntimeClock {
    fn now_nanos(&self) -> u64 {
        saturating_nanos(self.origin.elapsed().as_nanos())
    }
}

fn saturating_nanos(n: u128) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Convert a nanosecond span into fractional milliseconds.
pub fn nanos_to_millis(nanos: u64) -> f64 {
    nanos as f64 / NANOS_PER_MILLI
}

/// Run `work` once and report how long it took, in milliseconds.
///
/// A `Result` returned by `work` is handed back as-is; the elapsed time
/// covers everything up to the failure.
pub fn measure<C, T, F>(clock: &C, work: F) -> (T, f64)
where
    C: MonotonicClock + ?Sized,
    F: FnOnce() -> T,
{
    let start = clock.now_nanos();
    let result = work();
    let end = clock.now_nanos();
    (result, nanos_to_millis(end.saturating_sub(start)))
}

/// Async form of [`measure`]: the future may suspend any number of times.
pub async fn measure_async<C, F>(clock: &C, work: F) -> (F::Output, f64)
where
    C: MonotonicClock + ?Sized,
    F: Future,
{
    let start = clock.now_nanos();
    let result = work.await;
    let end = clock.now_nanos();
    (result, nanos_to_millis(end.saturating_sub(start)))
}

/// Elapsed milliseconds of `work` on the OS clock, discarding its output.
pub fn measure_millis<F: FnOnce()>(work: F) -> f64 {
    measure(&OsClock::new(), work).1
}

/// Start mark for spans that cannot be wrapped in a closure.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch<C: MonotonicClock> {
    clock: C,
    start: u64,
}

impl<C: MonotonicClock> Stopwatch<C> {
    pub fn start(clock: C) -> Self {
        let start = clock.now_nanos();
        Self { clock, start }
    }

    pub fn elapsed_millis(&self) -> f64 {
        nanos_to_millis(self.clock.now_nanos().saturating_sub(self.start))
    }
}
