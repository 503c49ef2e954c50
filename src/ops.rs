//! Operations under test.
//!
//! Loads, stores and atomic increments over the measurement array, walked
//! in a fixed pseudo-random order so that hardware prefetchers cannot
//! work out what is happening. The walk covers every line of the array,
//! so protocols scale their timings down by
//! [`MEASUREMENT_ARRAY_SIZE`](crate::constants::MEASUREMENT_ARRAY_SIZE)
//! to report per-operation cost.

use crate::cell::{CacheLineCell, is_cache_aligned};
use crate::constants::MEASUREMENT_ARRAY_SIZE;
use crate::error::ConfigError;

/// An operation under test, applied to the whole measurement array.
pub type Operation = fn(&[CacheLineCell]);

/// Fixed random permutation of the array indices.
static PERMUTATION: [usize; MEASUREMENT_ARRAY_SIZE] = [
    210, 56, 118, 195, 44, 135, 57, 132, 124, 200, 252, 54, 158, 206, 197, 21,
    207, 110, 25, 166, 131, 172, 203, 121, 74, 32, 242, 53, 129, 217, 251, 27,
    37, 219, 102, 226, 204, 89, 208, 134, 227, 18, 103, 140, 144, 69, 175, 11,
    66, 159, 15, 106, 232, 244, 109, 12, 243, 119, 165, 94, 84, 97, 104, 179,
    222, 33, 185, 214, 171, 24, 30, 117, 218, 78, 223, 90, 125, 5, 101, 100,
    254, 34, 239, 76, 228, 143, 64, 177, 148, 88, 83, 1, 160, 233, 250, 164,
    51, 173, 31, 146, 26, 47, 86, 231, 29, 62, 38, 96, 162, 202, 72, 45,
    155, 189, 161, 98, 113, 184, 186, 128, 19, 92, 127, 61, 46, 169, 236, 198,
    151, 237, 43, 170, 52, 50, 221, 85, 68, 194, 77, 111, 136, 246, 216, 133,
    201, 39, 60, 213, 174, 156, 70, 139, 59, 55, 58, 150, 75, 212, 209, 9,
    176, 220, 73, 120, 116, 0, 79, 95, 138, 255, 238, 126, 183, 147, 6, 199,
    178, 149, 137, 122, 115, 141, 28, 13, 187, 215, 2, 20, 99, 23, 71, 114,
    248, 108, 3, 49, 48, 163, 105, 196, 193, 80, 230, 182, 154, 157, 91, 153,
    93, 234, 188, 229, 107, 63, 82, 123, 67, 81, 192, 4, 235, 191, 22, 181,
    40, 224, 247, 145, 241, 42, 130, 65, 142, 35, 112, 180, 41, 152, 16, 225,
    8, 7, 190, 205, 36, 14, 249, 10, 17, 245, 167, 168, 240, 253, 87, 211,
];

/// Load every line of `array` in permuted order.
pub fn do_loads(array: &[CacheLineCell]) {
    for &index in PERMUTATION.iter() {
        std::hint::black_box(array[index].load());
    }
}

/// Store to every line of `array` in permuted order.
pub fn do_stores(array: &[CacheLineCell]) {
    for &index in PERMUTATION.iter() {
        array[index].store(1);
    }
}

/// Atomically increment every line of `array` in permuted order.
pub fn do_atomic_incs(array: &[CacheLineCell]) {
    for &index in PERMUTATION.iter() {
        array[index].atomic_inc();
    }
}

/// The cache-line array the operations under test run over.
///
/// Allocation verifies cache-line alignment; a misaligned buffer is a
/// fatal configuration error, there is no fallback.
pub struct MeasurementArray {
    cells: Box<[CacheLineCell]>,
}

impl MeasurementArray {
    pub fn new() -> Result<Self, ConfigError> {
        let cells: Box<[CacheLineCell]> = (0..MEASUREMENT_ARRAY_SIZE)
            .map(|_| CacheLineCell::new(0))
            .collect();
        if !is_cache_aligned(cells.as_ptr()) || !is_cache_aligned(&cells[1]) {
            return Err(ConfigError::MisalignedBuffer);
        }
        Ok(MeasurementArray { cells })
    }

    pub fn cells(&self) -> &[CacheLineCell] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::{MeasurementArray, PERMUTATION, do_atomic_incs, do_loads, do_stores};
    use crate::constants::MEASUREMENT_ARRAY_SIZE;

    #[test]
    fn test_permutation_covers_every_line() {
        let mut seen = [false; MEASUREMENT_ARRAY_SIZE];
        for &index in PERMUTATION.iter() {
            assert!(!seen[index]);
            seen[index] = true;
        }
    }

    #[test]
    fn test_operations_touch_every_line() {
        let array = MeasurementArray::new().expect("aligned allocation");
        do_loads(array.cells());
        do_stores(array.cells());
        assert!(array.cells().iter().all(|cell| cell.load() == 1));
        do_atomic_incs(array.cells());
        assert!(array.cells().iter().all(|cell| cell.load() == 2));
    }
}
