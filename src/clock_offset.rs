//! Cross-core clock offset estimation.
//!
//! For every non-source thread `t` this estimates the additive correction
//! `offset[t]` such that `tick_count() + offset[t]` on `t` approximates
//! the same instant read on thread 0's counter. Offsets are valid for one
//! estimation pass and are recomputed whenever a visibility measurement
//! needs cross-core time comparison.

use crate::barrier::TeamBarrier;
use crate::clock;
use crate::stats::{SampleSink, Statistic};
use crate::team;
use crate::value_channel::ValueChannel;
use crate::wait_strategy::WaitPolicy;

/// Ping-pong trials per peer; the first is a warm-up and is discarded.
pub const DEFAULT_TRIALS: usize = 5000;

/// One ping-pong trial: the source's start and end ticks around the
/// exchange, and the peer's own tick taken in between.
pub type OffsetTrial = (i64, i64, i64);

/// Per-trial offset estimate.
///
/// Assuming the one-way transit time is symmetric, the midpoint
/// `(t_end - t_start) / 2` estimates one-way latency, so the peer's
/// timestamp maps to `t_other - t_comms` in the source's frame and the
/// correction to add to peer timestamps is `t_start - (t_other - t_comms)`.
///
/// Worked example: t_start = 20, t_other = 30, t_end = 30 gives
/// t_comms = 5, so the peer's read happened at 25 in the source's frame
/// and the offset is -5.
#[inline]
pub fn offset_sample(trial: OffsetTrial) -> f64 {
    let (t_start, t_end, t_other) = trial;
    let t_comms = (t_end - t_start) as f64 / 2.0;
    let t_other_start = t_other as f64 - t_comms;
    t_start as f64 - t_other_start
}

/// Mean offset over a trial sequence, discarding the first trial.
///
/// The warm-up trial carries cold-cache and branch-prediction noise; the
/// mean over the rest damps transit-time jitter. No further outlier
/// rejection is applied.
pub fn mean_offset<I>(trials: I) -> i64
where
    I: IntoIterator<Item = OffsetTrial>,
{
    let mut stat = Statistic::new();
    for (index, trial) in trials.into_iter().enumerate() {
        if index == 0 {
            continue;
        }
        stat.add_sample(offset_sample(trial));
    }
    stat.mean() as i64
}

/// Estimates per-thread clock offsets via symmetric-latency ping-pong.
pub struct ClockOffsetEstimator {
    trials: usize,
    policy: WaitPolicy,
}

impl ClockOffsetEstimator {
    pub fn new(policy: WaitPolicy) -> Self {
        ClockOffsetEstimator {
            trials: DEFAULT_TRIALS,
            policy,
        }
    }

    pub fn with_trials(mut self, trials: usize) -> Self {
        assert!(trials > 1, "need at least one trial past the warm-up");
        self.trials = trials;
        self
    }

    /// Run one estimation pass over a team of `members` threads.
    ///
    /// Thread 0 exchanges timestamps with each peer in turn, sequentially,
    /// since the source alternates attention between peers. Returns one
    /// offset per thread, indexed by thread id; `offset[0]` is 0.
    pub fn estimate(&self, members: usize) -> Vec<i64> {
        let kick: ValueChannel<i64> = ValueChannel::new(self.policy);
        let reply: ValueChannel<i64> = ValueChannel::new(self.policy);
        let barrier = TeamBarrier::new(members, self.policy);
        let trials = self.trials;

        let mut offsets = Vec::new();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..members)
                .map(|me| {
                    let kick = &kick;
                    let reply = &reply;
                    let barrier = &barrier;
                    team::spawn_member(scope, me, move || {
                        let mut mine = vec![0i64; members];
                        for other in 1..members {
                            if me == 0 {
                                let mut recorded = Vec::with_capacity(trials);
                                for _ in 0..trials {
                                    let t_start = clock::tick_count();
                                    kick.release();
                                    let t_other = reply.recv();
                                    let t_end = clock::tick_count();
                                    recorded.push((t_start, t_end, t_other));
                                }
                                mine[other] = mean_offset(recorded);
                            } else if me == other {
                                for _ in 0..trials {
                                    kick.wait();
                                    reply.send(clock::tick_count());
                                }
                            }
                            barrier.wait();
                        }
                        mine
                    })
                })
                .collect();

            for (me, handle) in handles.into_iter().enumerate() {
                let mine = handle.join().expect("estimator thread panicked");
                if me == 0 {
                    offsets = mine;
                }
            }
        });
        offsets
    }
}
