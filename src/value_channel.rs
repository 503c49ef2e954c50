use crate::handshake::{HandshakeChannel, SignalMode};
use crate::wait_strategy::WaitPolicy;
use std::cell::UnsafeCell;

/// A single-slot typed message channel between exactly two threads.
///
/// The payload slot is not itself atomic; correctness relies on the
/// embedded [`HandshakeChannel`] establishing a happens-before edge
/// between the sender's payload write and the receiver's read. Used for
/// timestamp exchange in clock-offset estimation.
pub struct ValueChannel<T> {
    payload: UnsafeCell<T>,
    handshake: HandshakeChannel,
}

// SAFETY: the sender writes the payload slot only while the channel is
// drained (previous signal consumed) and the receiver reads it only while
// a signal is outstanding, so a write and a read never overlap; the
// handshake supplies the ordering between them.
unsafe impl<T: Copy + Send> Sync for ValueChannel<T> {}

unsafe impl<T: Copy + Send> Send for ValueChannel<T> {}

impl<T: Copy + Default> ValueChannel<T> {
    pub fn new(policy: WaitPolicy) -> Self {
        ValueChannel {
            payload: UnsafeCell::new(T::default()),
            handshake: HandshakeChannel::new(policy, SignalMode::Store),
        }
    }

    /// Store the payload, then signal the receiver.
    ///
    /// Blocks until the receiver has consumed the previous message; writing
    /// the slot any earlier would overwrite an unread payload and race with
    /// the receiver's read of it.
    pub fn send(&self, value: T) {
        self.handshake.wait_for(0);
        unsafe { *self.payload.get() = value };
        self.handshake.release();
    }

    /// Block until a payload is available, then read it.
    ///
    /// The payload is read before the signal is consumed: consuming first
    /// would free the slot for the sender's next write while the read is
    /// still in flight.
    pub fn recv(&self) -> T {
        self.handshake.wait_for(1);
        let value = unsafe { *self.payload.get() };
        // The signal is present, so this only consumes it.
        self.handshake.wait();
        value
    }

    /// Signal the receiver without touching the payload.
    ///
    /// Lets one channel double as a sync-only kick in protocols that only
    /// need data to flow in the opposite direction.
    pub fn release(&self) {
        self.handshake.release();
    }

    /// Consume a signal without reading the payload.
    pub fn wait(&self) {
        self.handshake.wait();
    }
}

impl<T: Copy + Default> Default for ValueChannel<T> {
    fn default() -> Self {
        ValueChannel::new(WaitPolicy::Spinning)
    }
}

#[cfg(test)]
mod tests {
    use super::ValueChannel;
    use crate::wait_strategy::WaitPolicy;

    #[test]
    fn test_send_then_recv() {
        let channel: ValueChannel<i64> = ValueChannel::default();
        channel.send(1234);
        assert_eq!(channel.recv(), 1234);
    }

    #[test]
    fn test_cross_thread_sequence() {
        let channel: ValueChannel<i64> = ValueChannel::new(WaitPolicy::SpinThenYield(64));

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for value in 0..256i64 {
                    channel.send(value);
                }
            });

            for expected in 0..256i64 {
                assert_eq!(channel.recv(), expected);
            }
        });
    }

    #[test]
    fn test_back_to_back_sends_do_not_lose_messages() {
        let channel: ValueChannel<i64> = ValueChannel::default();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                channel.send(111);
                // Must block until 111 has been consumed.
                channel.send(222);
            });

            // Give the sender time to issue both sends before the first
            // receive; the second must not overwrite the first.
            std::thread::sleep(std::time::Duration::from_millis(50));
            assert_eq!(channel.recv(), 111);
            assert_eq!(channel.recv(), 222);
        });
    }

    #[test]
    fn test_sync_only_kick_with_typed_reply() {
        let kick: ValueChannel<i64> = ValueChannel::default();
        let reply: ValueChannel<i64> = ValueChannel::default();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                kick.wait();
                reply.send(7);
            });

            kick.release();
            assert_eq!(reply.recv(), 7);
        });
    }
}
