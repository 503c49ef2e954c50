use crate::cell::CacheLineCell;
use crate::constants::CACHE_LINE_SIZE;

/// Number of cache lines in the displacement buffer: 64MiB, which should
/// displace anything useful from the caches we care about.
const DISPLACEMENT_LINES: usize = 64 * 1024 * 1024 / CACHE_LINE_SIZE;

/// How the measurement array is evicted from the local cache before each
/// timed sample.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlushMode {
    /// Use the architecture's cache-flush instruction on each line.
    Instruction,
    /// Read a large conflicting region to displace the lines. Fallback
    /// for targets without a usable flush instruction.
    DisplacementLoads,
}

impl FlushMode {
    /// Architecture default, overridden by the `FLUSH_WITH_LOADS`
    /// environment variable.
    pub fn from_environment() -> Self {
        if std::env::var_os("FLUSH_WITH_LOADS").is_some() {
            return FlushMode::DisplacementLoads;
        }
        if cfg!(any(target_arch = "x86_64", target_arch = "aarch64")) {
            FlushMode::Instruction
        } else {
            FlushMode::DisplacementLoads
        }
    }
}

/// Evicts measurement lines before each sample.
///
/// The flusher owns its displacement buffer for the lifetime of one
/// harness; nothing is leaked between invocations.
pub struct CacheFlusher {
    mode: FlushMode,
    displacement: Option<Box<[CacheLineCell]>>,
}

impl CacheFlusher {
    pub fn new(mode: FlushMode) -> Self {
        let lines = match mode {
            FlushMode::Instruction => 0,
            FlushMode::DisplacementLoads => DISPLACEMENT_LINES,
        };
        CacheFlusher::with_displacement_lines(mode, lines)
    }

    pub(crate) fn with_displacement_lines(mode: FlushMode, lines: usize) -> Self {
        let displacement = match mode {
            FlushMode::Instruction => None,
            FlushMode::DisplacementLoads => {
                Some((0..lines).map(|_| CacheLineCell::new(0)).collect())
            }
        };
        CacheFlusher { mode, displacement }
    }

    /// Ensure `array` is not present in the calling thread's cache.
    pub fn flush(&self, array: &[CacheLineCell]) {
        match (&self.mode, &self.displacement) {
            (FlushMode::Instruction, _) => {
                for cell in array {
                    flush_line(cell as *const CacheLineCell as *const u8);
                }
            }
            (FlushMode::DisplacementLoads, Some(displacement)) => {
                for cell in displacement.iter() {
                    cell.load();
                }
            }
            (FlushMode::DisplacementLoads, None) => unreachable!(),
        }
    }
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn flush_line(pointer: *const u8) {
    unsafe { core::arch::x86_64::_mm_clflush(pointer) }
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn flush_line(pointer: *const u8) {
    unsafe {
        core::arch::asm!("dc civac, {}", in(reg) pointer, options(nostack));
    }
}

/// No flush instruction here; [`FlushMode::from_environment`] never
/// selects [`FlushMode::Instruction`] on these targets.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
fn flush_line(_pointer: *const u8) {}
