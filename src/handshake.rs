use crate::constants::CACHE_LINE_SIZE;
use crate::wait_strategy::WaitPolicy;
use std::sync::atomic::{AtomicU32, Ordering};

/// How [`HandshakeChannel::release`] signals the waiting thread.
///
/// The two flavors exist because a plain store and an atomic
/// read-modify-write travel through the coherence fabric differently, and
/// the round-trip experiment wants to measure both.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SignalMode {
    /// Signal with a release store.
    Store,
    /// Signal with an atomic increment.
    AtomicInc,
}

/// A two-party counting handshake.
///
/// One thread releases, one thread waits; a handshake establishes a
/// happens-before edge between a `release` and its matching `wait`. The
/// whole channel occupies exactly one cache line so that a page full of
/// channels samples every line of the page.
///
/// In a burst of N releases each release blocks until the previous signal
/// was consumed, so N releases are matched one-for-one by N waits.
/// [`wait_for`](Self::wait_for) with target 0 drains the channel: it
/// returns only once the last release of a burst has actually been
/// consumed, which keeps the tail latency of the final handshake inside a
/// timed region.
///
/// Using a channel from more than one releaser or more than one waiter is
/// a protocol violation and is not guarded against.
#[repr(align(64))]
pub struct HandshakeChannel {
    flag: AtomicU32,
    policy: WaitPolicy,
    mode: SignalMode,
}

const _: () = assert!(size_of::<HandshakeChannel>() == CACHE_LINE_SIZE);

// SAFETY: HandshakeChannel is thread-safe due to internal atomic operations.
unsafe impl Sync for HandshakeChannel {}

unsafe impl Send for HandshakeChannel {}

impl HandshakeChannel {
    pub const fn new(policy: WaitPolicy, mode: SignalMode) -> Self {
        HandshakeChannel {
            flag: AtomicU32::new(0),
            policy,
            mode,
        }
    }

    /// Signal the waiting thread.
    ///
    /// Blocks until the previous signal, if any, has been consumed, then
    /// publishes a new one. The release ordering makes every write before
    /// this call visible to the thread that consumes the signal.
    pub fn release(&self) {
        let mut iteration: u32 = 0;
        while self.flag.load(Ordering::Acquire) != 0 {
            self.policy.pause(iteration);
            iteration = iteration.wrapping_add(1);
        }
        match self.mode {
            SignalMode::Store => self.flag.store(1, Ordering::Release),
            SignalMode::AtomicInc => {
                self.flag.fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    /// Block until an unconsumed signal exists, then consume it.
    pub fn wait(&self) {
        let mut iteration: u32 = 0;
        while self.flag.load(Ordering::Acquire) == 0 {
            self.policy.pause(iteration);
            iteration = iteration.wrapping_add(1);
        }
        self.flag.store(0, Ordering::Release);
    }

    /// Block until the flag reaches `target`.
    ///
    /// `wait_for(0)` after a burst of releases returns only once the final
    /// release has been consumed by the peer.
    pub fn wait_for(&self, target: u32) {
        let mut iteration: u32 = 0;
        while self.flag.load(Ordering::Acquire) != target {
            self.policy.pause(iteration);
            iteration = iteration.wrapping_add(1);
        }
    }
}

impl Default for HandshakeChannel {
    fn default() -> Self {
        HandshakeChannel::new(WaitPolicy::Spinning, SignalMode::Store)
    }
}

#[cfg(test)]
mod tests {
    use super::{HandshakeChannel, SignalMode};
    use crate::wait_strategy::WaitPolicy;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_single_release_then_wait() {
        let channel = HandshakeChannel::default();
        channel.release();
        channel.wait();
        channel.wait_for(0);
    }

    #[test]
    fn test_burst_ends_drained() {
        const BURST: usize = 64;
        let channel = HandshakeChannel::new(WaitPolicy::SpinThenYield(128), SignalMode::Store);
        let consumed = AtomicU32::new(0);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..BURST {
                    channel.wait();
                    consumed.fetch_add(1, Ordering::Relaxed);
                }
            });

            for _ in 0..BURST {
                channel.release();
            }
            channel.wait_for(0);
            // The drain may complete just before the waiter bumps the
            // counter for the final handshake.
            assert!(consumed.load(Ordering::Relaxed) >= BURST as u32 - 1);
        });
        assert_eq!(consumed.load(Ordering::Relaxed), BURST as u32);
    }

    #[test]
    fn test_atomic_inc_burst_ends_drained() {
        const BURST: usize = 32;
        let channel = HandshakeChannel::new(WaitPolicy::Spinning, SignalMode::AtomicInc);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..BURST {
                    channel.wait();
                }
            });

            for _ in 0..BURST {
                channel.release();
            }
            channel.wait_for(0);
        });
    }

    #[test]
    fn test_release_establishes_happens_before() {
        let channel = HandshakeChannel::default();
        let payload = AtomicU32::new(0);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                payload.store(99, Ordering::Relaxed);
                channel.release();
            });

            channel.wait();
            assert_eq!(payload.load(Ordering::Relaxed), 99);
        });
    }
}
