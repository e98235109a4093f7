//! PREEMPT_RT setup for clocked loops.
//!
//! With the `rt` feature enabled the loop thread locks its pages and
//! switches to `SCHED_FIFO` before entering the tick loop. Without it
//! every call is a no-op, which is what tests and simulation use.

use crate::error::ControlResult;

/// SCHED_FIFO priority for the loop thread.
#[cfg(feature = "rt")]
const RT_PRIORITY: i32 = 49;

#[cfg(feature = "rt")]
fn rt_mlockall() -> ControlResult<()> {
    use crate::error::ControlError;
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| ControlError::RtSetup(format!("mlockall failed: {e}")))?;
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler() -> ControlResult<()> {
    use crate::error::ControlError;
    let param = libc::sched_param {
        sched_priority: RT_PRIORITY,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(ControlError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {RT_PRIORITY}) failed: {err}"
        )));
    }
    Ok(())
}

/// Prefault stack pages so the loop never page-faults.
#[cfg(feature = "rt")]
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

/// Full RT setup sequence, run once on the loop thread.
#[cfg(feature = "rt")]
pub fn setup() -> ControlResult<()> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_scheduler()?;
    Ok(())
}

/// No-op in simulation mode.
#[cfg(not(feature = "rt"))]
pub fn setup() -> ControlResult<()> {
    Ok(())
}
