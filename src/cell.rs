use crate::constants::CACHE_LINE_SIZE;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

/// A cache-line-sized, cache-line-aligned atomic counter.
///
/// `CacheLineCell` is the unit of data the experiments move between cores:
/// measurement arrays, handshake flags and broadcast lines are all built
/// from it. The struct is aligned to 64 bytes so that no two logically
/// distinct cells ever share a hardware cache line.
#[repr(align(64))]
pub struct CacheLineCell {
    value: AtomicU32,
}

const _: () = assert!(size_of::<CacheLineCell>() == CACHE_LINE_SIZE);

// SAFETY: CacheLineCell is thread-safe due to internal atomic operations.
unsafe impl Sync for CacheLineCell {}

unsafe impl Send for CacheLineCell {}

impl CacheLineCell {
    /// Create a new cell initialized to `value`.
    pub const fn new(value: u32) -> Self {
        CacheLineCell {
            value: AtomicU32::new(value),
        }
    }

    /// Get the current value with **Relaxed** memory ordering.
    #[inline(always)]
    pub fn load(&self) -> u32 {
        self.value.load(Ordering::Relaxed)
    }

    /// Set the value with **Relaxed** memory ordering.
    #[inline(always)]
    pub fn store(&self, value: u32) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Set the value with **Release** memory ordering.
    ///
    /// Ensures that previous writes cannot be reordered after this store.
    #[inline(always)]
    pub fn store_release(&self, value: u32) {
        self.value.store(value, Ordering::Release);
    }

    /// Atomically add one to the current value using **AcqRel** ordering.
    #[inline(always)]
    pub fn atomic_inc(&self) {
        self.value.fetch_add(1, Ordering::AcqRel);
    }
}

impl Default for CacheLineCell {
    fn default() -> Self {
        CacheLineCell::new(0)
    }
}

/// A cache-line-aligned atomic timestamp slot.
///
/// One slot per participating thread; in the visibility experiment each
/// polling thread records its corrected arrival tick into its own slot.
/// Aligned to 64 bytes to avoid false sharing between slots.
#[repr(align(64))]
pub struct TimestampSlot {
    ticks: AtomicI64,
}

// SAFETY: TimestampSlot is thread-safe due to internal atomic operations.
unsafe impl Sync for TimestampSlot {}

unsafe impl Send for TimestampSlot {}

impl TimestampSlot {
    pub const fn new(ticks: i64) -> Self {
        TimestampSlot {
            ticks: AtomicI64::new(ticks),
        }
    }

    /// Get the current value with **Acquire** memory ordering.
    pub fn get_acquire(&self) -> i64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Set the value with **Release** memory ordering.
    pub fn set_release(&self, ticks: i64) {
        self.ticks.store(ticks, Ordering::Release);
    }
}

impl Default for TimestampSlot {
    fn default() -> Self {
        TimestampSlot::new(0)
    }
}

/// Check that `pointer` sits on a cache-line boundary.
///
/// Misalignment of a measurement or synchronization target is a fatal
/// configuration error; the allocating protocol performs this check, the
/// cell itself does not.
#[inline]
pub fn is_cache_aligned<T>(pointer: *const T) -> bool {
    (pointer as usize) & (CACHE_LINE_SIZE - 1) == 0
}

#[cfg(test)]
mod tests {
    use super::{CacheLineCell, TimestampSlot, is_cache_aligned};
    use loom::sync::Arc;

    #[test]
    fn test_default_cell_value() {
        let cell = CacheLineCell::default();
        assert_eq!(cell.load(), 0);
    }

    #[test]
    fn test_store_and_load() {
        let cell = CacheLineCell::new(0);
        cell.store(7);
        assert_eq!(cell.load(), 7);
        cell.store_release(1);
        assert_eq!(cell.load(), 1);
    }

    #[test]
    fn test_atomic_inc() {
        let cell = CacheLineCell::new(41);
        cell.atomic_inc();
        assert_eq!(cell.load(), 42);
    }

    #[test]
    fn test_adjacent_cells_do_not_share_a_line() {
        let cells = [CacheLineCell::new(0), CacheLineCell::new(0)];
        let first = &cells[0] as *const CacheLineCell as usize;
        let second = &cells[1] as *const CacheLineCell as usize;
        assert!(is_cache_aligned(&cells[0]));
        assert!(is_cache_aligned(&cells[1]));
        assert!(second - first >= 64);
    }

    #[test]
    fn test_timestamp_slot_alignment() {
        let slots = [TimestampSlot::new(0), TimestampSlot::new(0)];
        assert!(is_cache_aligned(&slots[0]));
        assert!(is_cache_aligned(&slots[1]));
    }

    #[test]
    fn test_slot_set_and_get_rls_acq() {
        loom::model(|| {
            let slot = Arc::new(TimestampSlot::default());
            let cloned = slot.clone();

            loom::thread::spawn(move || {
                cloned.set_release(1);
            });

            let value = slot.get_acquire();
            assert!(value == 0 || value == 1);
        })
    }
}
