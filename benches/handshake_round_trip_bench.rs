use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use memlat::handshake::{HandshakeChannel, SignalMode};
use memlat::wait_strategy::WaitPolicy;
use std::sync::atomic::{AtomicBool, Ordering};

fn bench_handshake_round_trip(c: &mut Criterion) {
    let channel = HandshakeChannel::new(WaitPolicy::Spinning, SignalMode::Store);
    let stop = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            loop {
                channel.wait();
                if stop.load(Ordering::Acquire) {
                    break;
                }
            }
        });

        let mut group = c.benchmark_group("handshake round trip");
        group.throughput(Throughput::Elements(1));
        group.bench_function("release_then_drain", |b| {
            b.iter(|| {
                channel.release();
                channel.wait_for(0);
            });
        });
        group.finish();

        stop.store(true, Ordering::Release);
        channel.release();
    });
}

criterion_group!(benches, bench_handshake_round_trip);
criterion_main!(benches);
