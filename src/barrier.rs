use crate::wait_strategy::WaitPolicy;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A full-team spin barrier.
///
/// Protocols run barrier-separated phases: no thread begins phase N+1
/// until every team member has finished phase N. The barrier busy-waits
/// (per the configured [`WaitPolicy`]) instead of blocking in the OS,
/// since scheduler wake-up latency would dwarf the intervals being
/// measured.
///
/// Sense reversal is done with a generation counter: the last arriver
/// resets the arrival count and bumps the generation, releasing everyone
/// parked on the old generation.
pub struct TeamBarrier {
    arrived: AtomicUsize,
    generation: AtomicUsize,
    members: usize,
    policy: WaitPolicy,
}

impl TeamBarrier {
    pub fn new(members: usize, policy: WaitPolicy) -> Self {
        assert!(members > 0, "a barrier needs at least one member");
        TeamBarrier {
            arrived: AtomicUsize::new(0),
            generation: AtomicUsize::new(0),
            members,
            policy,
        }
    }

    /// Block until all team members have arrived.
    pub fn wait(&self) {
        let generation = self.generation.load(Ordering::Acquire);
        if self.arrived.fetch_add(1, Ordering::AcqRel) + 1 == self.members {
            self.arrived.store(0, Ordering::Relaxed);
            self.generation.fetch_add(1, Ordering::Release);
        } else {
            let mut iteration: u32 = 0;
            while self.generation.load(Ordering::Acquire) == generation {
                self.policy.pause(iteration);
                iteration = iteration.wrapping_add(1);
            }
        }
    }
}
