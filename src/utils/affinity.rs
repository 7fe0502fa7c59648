//! Pinning rank threads to CPU cores.
//!
//! Rank threads migrate freely by default. With pinning enabled each rank is
//! bound to core `rank mod cores` for the duration of its program. Linux uses
//! `sched_setaffinity`; elsewhere pinning is a no-op.

#[cfg(target_os = "linux")]
mod platform {
    use std::cell::RefCell;

    thread_local! {
        static ORIGINAL_AFFINITY: RefCell<Option<libc::cpu_set_t>> = const { RefCell::new(None) };
    }

    pub fn core_count() -> Option<usize> {
        let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        (online > 0).then_some(online as usize)
    }

    pub fn pin(core_id: usize) -> bool {
        unsafe {
            let mut original: libc::cpu_set_t = std::mem::zeroed();
            if libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut original) == 0 {
                ORIGINAL_AFFINITY.with(|cell| *cell.borrow_mut() = Some(original));
            }
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            libc::CPU_SET(core_id, &mut set);
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) == 0
        }
    }

    pub fn unpin() -> bool {
        ORIGINAL_AFFINITY.with(|cell| match cell.borrow_mut().take() {
            Some(set) => unsafe {
                libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) == 0
            },
            None => false,
        })
    }
}

#[cfg(not(target_os = "linux"))]
mod platform {
    pub fn core_count() -> Option<usize> {
        std::thread::available_parallelism().ok().map(|n| n.get())
    }

    pub fn pin(_core_id: usize) -> bool {
        false
    }

    pub fn unpin() -> bool {
        true
    }
}

/// Number of online cores, if the platform reports it
pub fn core_count() -> Option<usize> {
    platform::core_count()
}

/// RAII guard: pins on creation, restores the previous affinity on drop.
pub struct CpuPinGuard {
    pinned_core: Option<usize>,
}

impl CpuPinGuard {
    /// Pin the current thread to `core_id`.
    pub fn with_core(core_id: usize) -> Self {
        Self {
            pinned_core: platform::pin(core_id).then_some(core_id),
        }
    }

    /// Pin the thread running `rank` to core `rank mod cores`.
    pub fn for_rank(rank: usize) -> Self {
        match core_count() {
            Some(cores) => Self::with_core(rank % cores),
            None => Self { pinned_core: None },
        }
    }

    pub fn core_id(&self) -> Option<usize> {
        self.pinned_core
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned_core.is_some()
    }
}

impl Drop for CpuPinGuard {
    fn drop(&mut self) {
        if self.pinned_core.is_some() {
            platform::unpin();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_count() {
        assert!(core_count().map_or(true, |n| n > 0));
    }

    #[test]
    fn test_pin_guard_for_rank() {
        let guard = CpuPinGuard::for_rank(7);
        if let (Some(core), Some(cores)) = (guard.core_id(), core_count()) {
            assert_eq!(core, 7 % cores);
            assert!(guard.is_pinned());
        }
    }
}
