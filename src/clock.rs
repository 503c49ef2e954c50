//! Per-core cycle counter reads.
//!
//! Local cycle counters on different cores are not assumed synchronized;
//! [`crate::clock_offset`] estimates the correction needed to compare
//! timestamps across cores.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Read the local time counter.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub fn tick_count() -> i64 {
    unsafe { core::arch::x86_64::_rdtsc() as i64 }
}

/// Read the local time counter.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn tick_count() -> i64 {
    let value: u64;
    unsafe {
        core::arch::asm!("mrs {}, cntvct_el0", out(reg) value, options(nomem, nostack));
    }
    value as i64
}

/// Monotonic-clock fallback for targets without a readable cycle counter.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline]
pub fn tick_count() -> i64 {
    static BASE: OnceLock<Instant> = OnceLock::new();
    BASE.get_or_init(Instant::now).elapsed().as_nanos() as i64
}

/// Seconds represented by one tick.
///
/// Calibrated once against the monotonic clock over a short busy-wait and
/// cached for the rest of the process.
pub fn tick_interval() -> f64 {
    static INTERVAL: OnceLock<f64> = OnceLock::new();
    *INTERVAL.get_or_init(|| {
        let wall = Instant::now();
        let start = tick_count();
        while wall.elapsed() < Duration::from_millis(20) {
            std::hint::spin_loop();
        }
        let ticks = tick_count() - start;
        wall.elapsed().as_secs_f64() / ticks as f64
    })
}

/// Busy-wait for roughly `ticks` ticks.
///
/// Used by the visibility experiment to let polling threads settle past
/// the barrier before the timed store.
pub fn delay_ticks(ticks: i64) {
    let end = tick_count() + ticks;
    while tick_count() < end {
        std::hint::spin_loop();
    }
}
