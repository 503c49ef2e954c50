//! The measurement protocols.
//!
//! Each protocol entry point creates one fixed-size thread team, runs
//! repeated barrier-separated phases in which handshake channels mediate
//! producer/consumer timing, pushes every sample into the caller's
//! statistics sinks, and joins the team before returning. A bad sample is
//! never detected or redone; statistical confidence comes from the sample
//! count alone.

use crate::barrier::TeamBarrier;
use crate::cell::{CacheLineCell, TimestampSlot};
use crate::clock;
use crate::clock_offset::ClockOffsetEstimator;
use crate::constants::{DEFAULT_SAMPLES, MAX_TEAM_SIZE, MEASUREMENT_ARRAY_SIZE, PAGE_SIZE};
use crate::error::ConfigError;
use crate::flush::{CacheFlusher, FlushMode};
use crate::handshake::{HandshakeChannel, SignalMode};
use crate::ops::{self, MeasurementArray, Operation};
use crate::roles::{self, SharingRole, VisibilityRole};
use crate::stats::SampleSink;
use crate::team;
use crate::wait_strategy::WaitPolicy;
use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::OnceLock;

/// Ping-pong exchanges batched into one timed block by the round-trip
/// protocol. Reported latency is raw elapsed time divided by twice this,
/// since a full round trip is halved and the batch amortizes per-call
/// overhead.
pub const ROUND_TRIP_BATCH: usize = 20;

/// Batched exchanges per timed block in the line-placement protocol.
pub const LINE_PLACEMENT_BATCH: usize = 10;

/// Handshake channels that fit in one page, one per cache line.
pub const CHANNELS_PER_PAGE: usize = PAGE_SIZE / size_of::<HandshakeChannel>();

/// Ticks the visibility source waits after the barrier so that every
/// polling thread has had time to enter its poll loop. Another barrier
/// would not help; this hides the leave time of the barrier itself.
const SETTLE_DELAY_TICKS: i64 = 5000;

/// One experiment run: a fixed team size, a sample count and the flush
/// and wait policies shared by every protocol invocation.
pub struct Harness {
    members: usize,
    samples: usize,
    policy: WaitPolicy,
    flusher: CacheFlusher,
    array: MeasurementArray,
}

impl Harness {
    pub fn new(members: usize, mode: FlushMode) -> Result<Self, ConfigError> {
        if members < 2 || members > MAX_TEAM_SIZE {
            return Err(ConfigError::UnsupportedTeamSize { members });
        }
        // The caller acts as team thread 0: pin it before allocating so the
        // array's pages are first-touched from a stable core, and so local
        // measurements on the calling thread have a fixed placement.
        team::force_affinity(0);
        let array = MeasurementArray::new()?;
        // Touch every page of the array before any measurement starts.
        ops::do_stores(array.cells());
        Ok(Harness {
            members,
            samples: DEFAULT_SAMPLES,
            policy: WaitPolicy::default(),
            flusher: CacheFlusher::new(mode),
            array,
        })
    }

    pub fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn members(&self) -> usize {
        self.members
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Reduce the timed repetitions per configuration, typically for
    /// multi-source sweeps.
    pub fn set_samples(&mut self, samples: usize) {
        self.samples = samples;
    }

    fn check_source(&self, source: usize) -> Result<(), ConfigError> {
        if source >= self.members {
            return Err(ConfigError::SourceOutOfRange {
                source,
                members: self.members,
            });
        }
        Ok(())
    }

    fn check_sinks(&self, got: usize, needed: usize) -> Result<(), ConfigError> {
        if got < needed {
            return Err(ConfigError::SinkTooSmall { needed, got });
        }
        Ok(())
    }

    /// Time `op` against memory that is not in the calling thread's cache.
    pub fn measure_memory<S: SampleSink>(&self, stat: &mut S, op: Operation) {
        Self::sample_memory(stat, &self.flusher, self.array.cells(), op, self.samples);
    }

    /// As [`measure_memory`](Self::measure_memory), but timed on the given
    /// team thread to capture remote-memory cost.
    pub fn measure_memory_on<S: SampleSink + Send>(
        &self,
        stat: &mut S,
        op: Operation,
        thread: usize,
    ) -> Result<(), ConfigError> {
        self.check_source(thread)?;
        let samples = self.samples;
        let flusher = &self.flusher;
        let cells = self.array.cells();
        std::thread::scope(|scope| {
            team::spawn_member(scope, thread, move || {
                Self::sample_memory(stat, flusher, cells, op, samples);
            });
        });
        Ok(())
    }

    fn sample_memory<S: SampleSink>(
        stat: &mut S,
        flusher: &CacheFlusher,
        cells: &[CacheLineCell],
        op: Operation,
        samples: usize,
    ) {
        for _ in 0..samples {
            flusher.flush(cells);
            let start = clock::tick_count();
            op(cells);
            stat.add_sample((clock::tick_count() - start) as f64);
        }
        stat.scale_down(MEASUREMENT_ARRAY_SIZE as f64);
    }

    /// Time `op` on thread `from` after the measured lines were brought
    /// into one other thread's cache, swept over every other thread.
    ///
    /// `modified` selects whether the other thread dirties the lines or
    /// only reads them. With `allocate_in_zero` the harness's own array is
    /// measured; otherwise a fresh array is allocated by the timing thread
    /// so the memory is local to it.
    pub fn measure_placement_from<S: SampleSink + Send>(
        &self,
        stats: &mut [S],
        op: Operation,
        modified: bool,
        from: usize,
        allocate_in_zero: bool,
    ) -> Result<(), ConfigError> {
        self.check_source(from)?;
        self.check_sinks(stats.len(), self.members)?;
        let members = self.members;
        let samples = self.samples;
        let barrier = TeamBarrier::new(members, self.policy);
        let active_to_passive = HandshakeChannel::new(self.policy, SignalMode::Store);
        let passive_to_active = HandshakeChannel::new(self.policy, SignalMode::Store);
        let local: OnceLock<MeasurementArray> = OnceLock::new();

        std::thread::scope(|scope| {
            let mut sinks = Some(&mut *stats);
            for me in 0..members {
                let sink = if me == from { sinks.take() } else { None };
                let barrier = &barrier;
                let active_to_passive = &active_to_passive;
                let passive_to_active = &passive_to_active;
                let local = &local;
                let flusher = &self.flusher;
                let shared = self.array.cells();
                team::spawn_member(scope, me, move || {
                    if !allocate_in_zero {
                        barrier.wait();
                        if me == from {
                            let array = MeasurementArray::new()
                                .expect("measurement buffer is not aligned as required");
                            let _ = local.set(array);
                        }
                        barrier.wait();
                    }
                    let cells = if allocate_in_zero {
                        shared
                    } else {
                        local.get().expect("local measurement buffer").cells()
                    };
                    let mut sink = sink;
                    for placement in 0..members {
                        if placement == from {
                            continue;
                        }
                        if let Some(stats) = sink.as_deref_mut() {
                            for _ in 0..samples {
                                flusher.flush(cells);
                                // Hand the lines to the other thread, wait
                                // for it to put them in the right state,
                                // then time the operation.
                                active_to_passive.release();
                                passive_to_active.wait();
                                let start = clock::tick_count();
                                op(cells);
                                stats[placement].add_sample((clock::tick_count() - start) as f64);
                            }
                            eprint!(".");
                        } else if me == placement {
                            for _ in 0..samples {
                                active_to_passive.wait();
                                if modified {
                                    ops::do_stores(cells);
                                } else {
                                    ops::do_loads(cells);
                                }
                                passive_to_active.release();
                            }
                        }
                        barrier.wait();
                    }
                });
            }
        });

        for stat in stats[..members].iter_mut() {
            stat.scale_down(MEASUREMENT_ARRAY_SIZE as f64);
        }
        eprintln!();
        Ok(())
    }

    /// Time `op` on thread `from` with the measured lines replicated into
    /// a growing number of other caches, sweeping the fan-out from 1 to
    /// `members - 1`.
    pub fn measure_sharing_from<S: SampleSink + Send>(
        &self,
        stats: &mut [S],
        op: Operation,
        modified: bool,
        from: usize,
    ) -> Result<(), ConfigError> {
        self.check_source(from)?;
        self.check_sinks(stats.len(), self.members)?;
        let members = self.members;
        let samples = self.samples;
        let barrier = TeamBarrier::new(members, self.policy);

        std::thread::scope(|scope| {
            let mut sinks = Some(&mut *stats);
            for me in 0..members {
                let sink = if me == from { sinks.take() } else { None };
                let barrier = &barrier;
                let flusher = &self.flusher;
                let cells = self.array.cells();
                team::spawn_member(scope, me, move || {
                    let position = roles::logical_position(me, from, members);
                    let mut state = SharingPhaseState {
                        cells,
                        flusher,
                        op,
                        modified,
                        sample: None,
                    };
                    let mut sink = sink;
                    for reach in 1..members {
                        let role = roles::sharing_role(position, reach);
                        for _ in 0..samples {
                            for phase in SHARING_PHASES.iter() {
                                barrier.wait();
                                phase(role, &mut state);
                            }
                            if let Some(sample) = state.sample.take() {
                                if let Some(stats) = sink.as_deref_mut() {
                                    stats[reach].add_sample(sample as f64);
                                }
                            }
                        }
                        if position == 0 {
                            eprint!(".");
                        }
                    }
                });
            }
        });

        for stat in stats[..members].iter_mut() {
            stat.scale_down(MEASUREMENT_ARRAY_SIZE as f64);
        }
        eprintln!();
        Ok(())
    }

    /// Half-round-trip latency between `from` and every other thread.
    ///
    /// Each sample times [`ROUND_TRIP_BATCH`] ping-pongs including the
    /// drain of the final handshake, then the distribution is scaled down
    /// by twice the batch size.
    pub fn measure_roundtrip_from<S: SampleSink + Send>(
        &self,
        stats: &mut [S],
        from: usize,
        mode: SignalMode,
    ) -> Result<(), ConfigError> {
        self.check_source(from)?;
        self.check_sinks(stats.len(), self.members)?;
        let members = self.members;
        let samples = self.samples;
        let policy = self.policy;
        let barrier = TeamBarrier::new(members, policy);
        // The channel is allocated by the source thread so its line is
        // local to the thread doing the timing.
        let channel: OnceLock<Box<HandshakeChannel>> = OnceLock::new();

        std::thread::scope(|scope| {
            let mut sinks = Some(&mut *stats);
            for me in 0..members {
                let sink = if me == from { sinks.take() } else { None };
                let barrier = &barrier;
                let channel = &channel;
                team::spawn_member(scope, me, move || {
                    if me == from {
                        let _ = channel.set(Box::new(HandshakeChannel::new(policy, mode)));
                    }
                    barrier.wait();
                    let channel = &**channel.get().expect("channel published");
                    let mut sink = sink;
                    for other in 0..members {
                        if other == from {
                            continue;
                        }
                        if let Some(stats) = sink.as_deref_mut() {
                            for _ in 0..samples {
                                let start = clock::tick_count();
                                for _ in 0..ROUND_TRIP_BATCH {
                                    channel.release();
                                }
                                channel.wait_for(0);
                                stats[other].add_sample((clock::tick_count() - start) as f64);
                            }
                            eprint!(".");
                        } else if me == other {
                            for _ in 0..samples {
                                for _ in 0..ROUND_TRIP_BATCH {
                                    channel.wait();
                                }
                            }
                        }
                        barrier.wait();
                    }
                });
            }
        });

        for stat in stats[..members].iter_mut() {
            stat.scale_down((2 * ROUND_TRIP_BATCH) as f64);
        }
        eprintln!();
        Ok(())
    }

    /// Half-round-trip latency between thread 0 and `other`, swept across
    /// every cache line of one page of channels.
    ///
    /// Sampling every line of a page visits every possible tag directory;
    /// on machines with a shared last-level cache some lines should be
    /// local to one of the two communicating cores and faster.
    pub fn measure_line_placement<S: SampleSink + Send>(
        &self,
        stats: &mut [S],
        other: usize,
    ) -> Result<(), ConfigError> {
        self.check_source(other)?;
        if other == 0 {
            return Err(ConfigError::SourceOutOfRange {
                source: other,
                members: self.members,
            });
        }
        self.check_sinks(stats.len(), CHANNELS_PER_PAGE)?;
        let members = self.members;
        let samples = self.samples;
        let page = ChannelPage::allocate(self.policy)?;

        std::thread::scope(|scope| {
            let mut sinks = Some(&mut *stats);
            for me in 0..members {
                let sink = if me == 0 { sinks.take() } else { None };
                let page = &page;
                team::spawn_member(scope, me, move || {
                    let channels = page.channels();
                    if let Some(stats) = sink {
                        for index in (0..channels.len()).rev() {
                            let channel = &channels[index];
                            let stat = &mut stats[index];
                            stat.reset();
                            for _ in 0..samples {
                                let start = clock::tick_count();
                                for _ in 0..LINE_PLACEMENT_BATCH {
                                    channel.release();
                                }
                                channel.wait_for(0);
                                stat.add_sample((clock::tick_count() - start) as f64);
                            }
                            eprint!(".");
                        }
                    } else if me == other {
                        for index in (0..channels.len()).rev() {
                            let channel = &channels[index];
                            for _ in 0..samples {
                                for _ in 0..LINE_PLACEMENT_BATCH {
                                    channel.wait();
                                }
                            }
                        }
                    }
                });
            }
        });

        for stat in stats[..CHANNELS_PER_PAGE].iter_mut() {
            stat.scale_down((2 * LINE_PLACEMENT_BATCH) as f64);
        }
        eprintln!();
        Ok(())
    }

    /// Time from a store on thread `from` until the last of a growing set
    /// of polling threads observes the new value.
    ///
    /// Arrival timestamps are taken on different cores, so a fresh clock
    /// offset estimation pass maps them all into thread 0's time base.
    /// Non-positive elapsed samples are an expected artifact of offset
    /// estimation imprecision and are silently excluded.
    pub fn measure_visibility_from<S: SampleSink + Send>(
        &self,
        stats: &mut [S],
        from: usize,
    ) -> Result<(), ConfigError> {
        self.check_source(from)?;
        self.check_sinks(stats.len(), self.members)?;
        let members = self.members;
        let samples = self.samples;
        let policy = self.policy;
        let offsets = ClockOffsetEstimator::new(policy).estimate(members);
        let times: Vec<TimestampSlot> = (0..members).map(|_| TimestampSlot::new(0)).collect();
        let broadcast: OnceLock<Box<CacheLineCell>> = OnceLock::new();
        let barrier = TeamBarrier::new(members, policy);

        std::thread::scope(|scope| {
            let mut sinks = Some(&mut *stats);
            for me in 0..members {
                let sink = if me == from { sinks.take() } else { None };
                let barrier = &barrier;
                let broadcast = &broadcast;
                let times = &times[..];
                let offsets = &offsets;
                team::spawn_member(scope, me, move || {
                    let position = roles::logical_position(me, from, members);
                    if position == 0 {
                        let _ = broadcast.set(Box::new(CacheLineCell::new(0)));
                    }
                    barrier.wait();
                    let line = &**broadcast.get().expect("broadcast line published");
                    let my_offset = offsets[me];
                    let mut sink = sink;
                    for pollers in 1..members {
                        let role = roles::visibility_role(position, pollers);
                        for _ in 0..samples {
                            barrier.wait();
                            match role {
                                VisibilityRole::Active => {
                                    clock::delay_ticks(SETTLE_DELAY_TICKS);
                                    times[0].set_release(clock::tick_count() + my_offset);
                                    line.store_release(1);
                                }
                                VisibilityRole::Polling => {
                                    while line.load() == 0 {
                                        std::hint::spin_loop();
                                    }
                                    times[position].set_release(clock::tick_count() + my_offset);
                                }
                                VisibilityRole::Nothing => {}
                            }
                            barrier.wait();
                            if role == VisibilityRole::Active {
                                // Everyone has seen the write; reset the
                                // line for next time.
                                line.store(0);
                                let elapsed =
                                    latest_arrival(times, pollers) - times[0].get_acquire();
                                if elapsed > 0 {
                                    if let Some(stats) = sink.as_deref_mut() {
                                        stats[pollers].add_sample(elapsed as f64);
                                    }
                                }
                            }
                        }
                        if position == 0 {
                            eprint!(".");
                        }
                    }
                });
            }
        });
        eprintln!();
        Ok(())
    }
}

/// Latest corrected arrival among the first `pollers` polling positions.
fn latest_arrival(times: &[TimestampSlot], pollers: usize) -> i64 {
    let mut latest = times[1].get_acquire();
    for slot in times[2..=pollers].iter() {
        latest = latest.max(slot.get_acquire());
    }
    latest
}

/// Shared per-thread view of one sharing sample.
pub(crate) struct SharingPhaseState<'a> {
    cells: &'a [CacheLineCell],
    flusher: &'a CacheFlusher,
    op: Operation,
    modified: bool,
    sample: Option<i64>,
}

type SharingPhase = fn(SharingRole, &mut SharingPhaseState);

/// The sharing protocol as a phase machine: one function per phase, a
/// full-team barrier before each, dispatch purely by role.
pub(crate) const SHARING_PHASES: [SharingPhase; 4] =
    [flush_phase, seed_phase, spread_phase, timed_phase];

/// The active thread evicts the measured lines from its own cache.
fn flush_phase(role: SharingRole, state: &mut SharingPhaseState) {
    if role == SharingRole::Active {
        state.flusher.flush(state.cells);
    }
}

/// The owner seeds the coherence state of the lines.
fn seed_phase(role: SharingRole, state: &mut SharingPhaseState) {
    if role == SharingRole::SetupOwner {
        if state.modified {
            ops::do_stores(state.cells);
        } else {
            ops::do_loads(state.cells);
        }
    }
}

/// Setup threads pull the lines into their own caches.
fn spread_phase(role: SharingRole, state: &mut SharingPhaseState) {
    if role == SharingRole::Setup {
        ops::do_loads(state.cells);
    }
}

/// The active thread performs and times the operation under test.
fn timed_phase(role: SharingRole, state: &mut SharingPhaseState) {
    if role == SharingRole::Active {
        let start = clock::tick_count();
        (state.op)(state.cells);
        state.sample = Some(clock::tick_count() - start);
    }
}

/// One page-aligned page of handshake channels, one channel per cache
/// line. Owned by a single line-placement invocation and released on
/// return.
struct ChannelPage {
    channels: NonNull<HandshakeChannel>,
    count: usize,
}

// SAFETY: the channels are individually Sync; the page itself is only
// deallocated after the owning protocol has joined its team.
unsafe impl Sync for ChannelPage {}

unsafe impl Send for ChannelPage {}

impl ChannelPage {
    fn page_layout() -> Layout {
        Layout::from_size_align(PAGE_SIZE, PAGE_SIZE).expect("page layout")
    }

    fn allocate(policy: WaitPolicy) -> Result<Self, ConfigError> {
        let raw = unsafe { alloc::alloc(Self::page_layout()) } as *mut HandshakeChannel;
        let Some(channels) = NonNull::new(raw) else {
            return Err(ConfigError::AllocationFailed {
                what: "a page of channels",
            });
        };
        for index in 0..CHANNELS_PER_PAGE {
            unsafe {
                channels
                    .as_ptr()
                    .add(index)
                    .write(HandshakeChannel::new(policy, SignalMode::Store));
            }
        }
        Ok(ChannelPage {
            channels,
            count: CHANNELS_PER_PAGE,
        })
    }

    fn channels(&self) -> &[HandshakeChannel] {
        unsafe { std::slice::from_raw_parts(self.channels.as_ptr(), self.count) }
    }
}

impl Drop for ChannelPage {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.channels.as_ptr() as *mut u8, Self::page_layout()) };
    }
}

#[cfg(test)]
mod tests {
    use super::{CHANNELS_PER_PAGE, Harness, ROUND_TRIP_BATCH, SHARING_PHASES, SharingPhaseState};
    use crate::error::ConfigError;
    use crate::flush::{CacheFlusher, FlushMode};
    use crate::handshake::SignalMode;
    use crate::ops;
    use crate::roles::SharingRole;
    use crate::stats::Statistic;
    use crate::wait_strategy::WaitPolicy;

    fn harness(members: usize, samples: usize) -> Harness {
        let mut harness = Harness::new(members, FlushMode::Instruction)
            .expect("harness")
            .with_wait_policy(WaitPolicy::SpinThenYield(1024));
        harness.set_samples(samples);
        harness
    }

    #[test]
    fn test_rejects_bad_team_sizes() {
        assert_eq!(
            Harness::new(1, FlushMode::Instruction).err(),
            Some(ConfigError::UnsupportedTeamSize { members: 1 })
        );
        assert!(Harness::new(100_000, FlushMode::Instruction).is_err());
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_harness_pins_the_calling_thread() {
        let _harness = harness(2, 4);
        unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            assert_eq!(
                libc::sched_getaffinity(0, size_of::<libc::cpu_set_t>(), &mut set),
                0
            );
            assert!(libc::CPU_ISSET(0, &set));
            assert_eq!(libc::CPU_COUNT(&set), 1);
        }
    }

    #[test]
    fn test_rejects_out_of_range_source() {
        let harness = harness(2, 4);
        let mut stats = vec![Statistic::new(); 2];
        let error = harness
            .measure_sharing_from(&mut stats, ops::do_loads, false, 5)
            .err();
        assert_eq!(
            error,
            Some(ConfigError::SourceOutOfRange {
                source: 5,
                members: 2
            })
        );
    }

    #[test]
    fn test_rejects_undersized_sink() {
        let harness = harness(3, 4);
        let mut stats = vec![Statistic::new(); 2];
        let error = harness
            .measure_roundtrip_from(&mut stats, 0, SignalMode::Store)
            .err();
        assert_eq!(error, Some(ConfigError::SinkTooSmall { needed: 3, got: 2 }));
    }

    #[test]
    fn test_memory_latency_collects_samples() {
        let harness = harness(2, 32);
        let mut stat = Statistic::new();
        harness.measure_memory(&mut stat, ops::do_loads);
        assert_eq!(stat.count(), 32);
        assert!(stat.mean() > 0.0);
    }

    #[test]
    fn test_remote_memory_latency_collects_samples() {
        let harness = harness(2, 16);
        let mut stat = Statistic::new();
        harness
            .measure_memory_on(&mut stat, ops::do_stores, 1)
            .expect("remote measurement");
        assert_eq!(stat.count(), 16);
    }

    #[test]
    fn test_placement_sweeps_every_other_thread() {
        let harness = harness(3, 8);
        for allocate_in_zero in [true, false] {
            let mut stats = vec![Statistic::new(); 3];
            harness
                .measure_placement_from(&mut stats, ops::do_loads, true, 0, allocate_in_zero)
                .expect("placement");
            assert_eq!(stats[0].count(), 0);
            assert_eq!(stats[1].count(), 8);
            assert_eq!(stats[2].count(), 8);
        }
    }

    #[test]
    fn test_sharing_collects_one_stat_per_reach() {
        let harness = harness(4, 8);
        let mut stats = vec![Statistic::new(); 4];
        harness
            .measure_sharing_from(&mut stats, ops::do_stores, true, 1)
            .expect("sharing");
        assert_eq!(stats[0].count(), 0);
        for reach in 1..4 {
            assert_eq!(stats[reach].count(), 8);
            assert!(stats[reach].min() > 0.0);
        }
    }

    #[test]
    fn test_sharing_phases_only_time_the_active_role() {
        let flusher = CacheFlusher::new(FlushMode::Instruction);
        let array = ops::MeasurementArray::new().expect("array");
        let mut state = SharingPhaseState {
            cells: array.cells(),
            flusher: &flusher,
            op: ops::do_loads,
            modified: false,
            sample: None,
        };
        for phase in SHARING_PHASES.iter() {
            phase(SharingRole::Nothing, &mut state);
        }
        assert!(state.sample.is_none());
        for phase in SHARING_PHASES.iter() {
            phase(SharingRole::Active, &mut state);
        }
        assert!(state.sample.is_some());
    }

    #[test]
    fn test_roundtrip_scales_by_twice_the_batch() {
        let harness = harness(2, 16);
        let mut stats = vec![Statistic::new(); 2];
        harness
            .measure_roundtrip_from(&mut stats, 0, SignalMode::Store)
            .expect("round trip");
        assert_eq!(stats[1].count(), 16);
        assert!(stats[1].mean() > 0.0);
        // The sink saw raw burst timings scaled down by 2K: undoing the
        // scaling reproduces the raw per-burst mean.
        let mut raw = stats[1];
        raw.scale((2 * ROUND_TRIP_BATCH) as f64);
        assert!((raw.mean() / stats[1].mean() - (2 * ROUND_TRIP_BATCH) as f64).abs() < 1e-9);
    }

    #[test]
    fn test_roundtrip_atomic_flavor() {
        let harness = harness(2, 8);
        let mut stats = vec![Statistic::new(); 2];
        harness
            .measure_roundtrip_from(&mut stats, 1, SignalMode::AtomicInc)
            .expect("round trip");
        assert_eq!(stats[0].count(), 8);
        assert_eq!(stats[1].count(), 0);
    }

    #[test]
    fn test_line_placement_covers_the_page() {
        let harness = harness(2, 4);
        let mut stats = vec![Statistic::new(); CHANNELS_PER_PAGE];
        harness
            .measure_line_placement(&mut stats, 1)
            .expect("line placement");
        for stat in stats.iter() {
            assert_eq!(stat.count(), 4);
            assert!(stat.min() > 0.0);
        }
    }

    #[test]
    fn test_line_placement_rejects_thread_zero_as_peer() {
        let harness = harness(2, 4);
        let mut stats = vec![Statistic::new(); CHANNELS_PER_PAGE];
        assert!(harness.measure_line_placement(&mut stats, 0).is_err());
    }

    #[test]
    fn test_visibility_three_threads() {
        let harness = harness(3, 24);
        let mut stats = vec![Statistic::new(); 3];
        harness
            .measure_visibility_from(&mut stats, 0)
            .expect("visibility");
        // One and two pollers; every retained sample is positive by
        // construction.
        for pollers in 1..3 {
            assert!(stats[pollers].count() > 0);
            assert!(stats[pollers].min() > 0.0);
        }
        assert_eq!(stats[0].count(), 0);
    }

    #[test]
    fn test_visibility_from_nonzero_source() {
        let harness = harness(3, 16);
        let mut stats = vec![Statistic::new(); 3];
        harness
            .measure_visibility_from(&mut stats, 2)
            .expect("visibility");
        assert!(stats[1].count() > 0);
    }
}
