//! Best-effort process preparation for a soft-real-time run: allocator
//! tuning, locked and prefaulted memory, SCHED_FIFO scheduling.

#[cfg(unix)]
use nix::libc;

pub const STACK_PREFAULT_BYTES: usize = 1024 * 1024;

#[cfg(unix)]
const RT_POLICY: i32 = libc::SCHED_FIFO;

/// Keeps freed memory in the heap so prefaulted pages stay mapped.
pub fn tune_allocator() -> Result<(), String> {
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    {
        if unsafe { libc::mallopt(libc::M_MMAP_MAX, 0) } != 1 {
            return Err("mallopt(M_MMAP_MAX, 0) failed".to_string());
        }
        if unsafe { libc::mallopt(libc::M_TRIM_THRESHOLD, -1) } != 1 {
            return Err("mallopt(M_TRIM_THRESHOLD, -1) failed".to_string());
        }
        Ok(())
    }
    #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
    {
        Err("allocator tuning requires glibc".to_string())
    }
}

pub fn lock_memory_pages() -> Result<(), String> {
    #[cfg(unix)]
    {
        use nix::sys::mman::{MlockAllFlags, mlockall};
        mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE)
            .map_err(|e| format!("mlockall(MCL_CURRENT|MCL_FUTURE) failed: {e}"))
    }
    #[cfg(not(unix))]
    {
        Err("mlockall is not supported on this platform".to_string())
    }
}

pub fn page_size() -> usize {
    #[cfg(unix)]
    {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            return size as usize;
        }
    }
    4096
}

/// Touches `megabytes` of heap and hands it back to the allocator.
pub fn prefault_heap(megabytes: usize) -> Result<(), String> {
    let bytes = megabytes.saturating_mul(1024 * 1024);
    if bytes == 0 {
        return Ok(());
    }
    let mut heap: Vec<u8> = Vec::new();
    heap.try_reserve_exact(bytes)
        .map_err(|e| format!("failed to allocate {megabytes} MiB for prefaulting: {e}"))?;
    heap.resize(bytes, 1);
    std::hint::black_box(&heap);
    Ok(())
}

#[inline(never)]
pub fn prefault_stack() {
    let mut stack = [0_u8; STACK_PREFAULT_BYTES];
    for index in (0..STACK_PREFAULT_BYTES).step_by(page_size()) {
        stack[index] = 1;
    }
    std::hint::black_box(&stack);
}

pub fn configure_rt_thread(priority: i32) -> Result<(), String> {
    #[cfg(unix)]
    {
        let thread = unsafe { libc::pthread_self() };
        let param = unsafe {
            let mut p = std::mem::zeroed::<libc::sched_param>();
            p.sched_priority = priority;
            p
        };
        let rc = unsafe { libc::pthread_setschedparam(thread, RT_POLICY, &param) };
        if rc != 0 {
            return Err(format!(
                "pthread_setschedparam(SCHED_FIFO, prio {}) failed: {}",
                priority,
                std::io::Error::from_raw_os_error(rc)
            ));
        }

        let mut actual_policy = 0_i32;
        let mut actual_param = unsafe { std::mem::zeroed::<libc::sched_param>() };
        let rc =
            unsafe { libc::pthread_getschedparam(thread, &mut actual_policy, &mut actual_param) };
        if rc != 0 {
            return Err(format!("pthread_getschedparam failed with errno {rc}"));
        }
        if actual_policy != RT_POLICY || actual_param.sched_priority != priority {
            return Err(format!(
                "realtime verification failed: policy {}, prio {}",
                actual_policy, actual_param.sched_priority
            ));
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        let _ = priority;
        Err("Realtime thread priority is not supported on this platform".to_string())
    }
}
