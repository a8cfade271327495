//! Real-time process setup.
//!
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`: lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity`: pin to one CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`: RT priority.
//!
//! Every step except the stack prefault is a no-op without the `rt` feature.

use std::fmt::Display;

use tracing::debug;

use crate::error::ControlError;

/// Stack prefaulted before entering the loop.
///
/// Covers a cycle's frames (every per-joint buffer is inline, `MAX_JOINTS`
/// f64s each). Must stay below the 2 MiB default of spawned threads.
const PREFAULT_STACK_BYTES: usize = 256 * 1024;

#[cfg_attr(not(feature = "rt"), allow(dead_code))]
fn setup_error(call: &str, err: impl Display) -> ControlError {
    ControlError::RtSetup(format!("{call} failed: {err}"))
}

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), ControlError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| setup_error("mlockall", e))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), ControlError> {
    Ok(())
}

/// Touch a stack buffer so its pages are resident before the first cycle.
fn prefault_stack() {
    let mut buf = [0u8; PREFAULT_STACK_BYTES];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Pin the calling thread to `cpu`.
#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), ControlError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| setup_error(&format!("CpuSet::set({cpu})"), e))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset).map_err(|e| setup_error("sched_setaffinity", e))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), ControlError> {
    Ok(())
}

/// Switch the calling thread to `SCHED_FIFO` at `priority`.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), ControlError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 targets the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        return Err(setup_error(
            &format!("sched_setscheduler(SCHED_FIFO, {priority})"),
            std::io::Error::last_os_error(),
        ));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), ControlError> {
    Ok(())
}

/// Run the full RT setup sequence on the calling thread.
///
/// Call from the thread that will run the scheduler, before it starts.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), ControlError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    debug!(
        cpu_core,
        rt_priority,
        enabled = cfg!(feature = "rt"),
        "RT setup complete"
    );
    Ok(())
}
