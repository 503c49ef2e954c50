/// Typical CPU cache line size in bytes.
///
/// Most modern CPUs have a cache line of 64 bytes.
pub const CACHE_LINE_SIZE: usize = 64;

/// Size of one memory page in bytes.
///
/// Used by the line-placement experiment, which probes every cache line
/// inside a single page of channel instances.
pub const PAGE_SIZE: usize = 4096;

/// Number of cache lines in the measurement array.
///
/// With 64B lines this is 16KiB of data, small enough to fit in an L1
/// data cache. The array is walked in a fixed pseudo-random order so that
/// hardware prefetchers cannot predict the access pattern.
pub const MEASUREMENT_ARRAY_SIZE: usize = 256;

/// Upper bound on the number of threads a measurement team may contain.
///
/// Team capacity itself is a runtime parameter; this is only the sanity
/// bound it is checked against.
pub const MAX_TEAM_SIZE: usize = 512;

/// Default number of timed repetitions per configuration.
///
/// Callers running multi-configuration sweeps may turn this down to keep
/// total run time reasonable.
pub const DEFAULT_SAMPLES: usize = 10_000;
