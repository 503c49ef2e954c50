/// Busy-wait policy used inside handshake channels and team barriers.
///
/// All coordination in the experiments is busy-waiting: the intervals being
/// measured are nanoseconds to microseconds, where a scheduler-mediated
/// block would dominate the signal. The policy is a runtime value passed at
/// construction so it can be swapped and tested without rebuilding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Spin with a CPU pause hint, never yielding the processor.
    Spinning,
    /// Spin for the given number of iterations, then yield on each
    /// further iteration. Keeps latency low when the peer is running but
    /// avoids starving it on oversubscribed machines.
    SpinThenYield(u32),
}

impl WaitPolicy {
    /// Perform one pause step of a busy-wait loop.
    ///
    /// `iteration` is the number of times the caller has already polled.
    #[inline(always)]
    pub(crate) fn pause(&self, iteration: u32) {
        match self {
            WaitPolicy::Spinning => std::hint::spin_loop(),
            WaitPolicy::SpinThenYield(limit) => {
                if iteration < *limit {
                    std::hint::spin_loop()
                } else {
                    std::thread::yield_now()
                }
            }
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        WaitPolicy::Spinning
    }
}
