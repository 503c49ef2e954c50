use std::thread::{Scope, ScopedJoinHandle};

/// Spawn one named member of a measurement team.
///
/// The thread is pinned to logical CPU `me` before the body runs, so that
/// thread index and core placement coincide for the whole experiment.
/// Thread creation failure is fatal.
pub(crate) fn spawn_member<'scope, F, R>(
    scope: &'scope Scope<'scope, '_>,
    me: usize,
    body: F,
) -> ScopedJoinHandle<'scope, R>
where
    F: FnOnce() -> R + Send + 'scope,
    R: Send + 'scope,
{
    std::thread::Builder::new()
        .name(format!("memlat-{me}"))
        .spawn_scoped(scope, move || {
            force_affinity(me);
            body()
        })
        .unwrap_or_else(|_| panic!("cannot create team thread {me}"))
}

/// Bind the calling thread to logical CPU `cpu`.
///
/// Binding each team member to its own core is crude compared to letting a
/// runtime place threads, but the measurements here are of hardware
/// properties and need stable placement more than clever scheduling.
#[cfg(target_os = "linux")]
pub(crate) fn force_affinity(cpu: usize) {
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu % libc::CPU_SETSIZE as usize, &mut set);
        if libc::sched_setaffinity(0, size_of::<libc::cpu_set_t>(), &set) != 0 {
            eprintln!("Failed to force affinity for thread {cpu}");
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn force_affinity(_cpu: usize) {}
