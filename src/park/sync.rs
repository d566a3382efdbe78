//! Process-shared pthread mutexes and condition variables, laid out
//! directly inside the mapped region. The creator initialises every
//! primitive with `PTHREAD_PROCESS_SHARED` before any peer process maps
//! the region; peers must never re-initialise.

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::MaybeUninit;

#[repr(transparent)]
pub struct SharedMutex(UnsafeCell<libc::pthread_mutex_t>);

// The raw pthread primitives are usable from any thread once initialised.
unsafe impl Send for SharedMutex {}
unsafe impl Sync for SharedMutex {}

impl SharedMutex {
    /// # Safety
    ///
    /// Must be called exactly once, by the region creator, before any
    /// other process maps the region.
    pub(super) unsafe fn init(&self) {
        let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
        libc::pthread_mutexattr_init(attr.as_mut_ptr());
        libc::pthread_mutexattr_setpshared(attr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED);
        libc::pthread_mutex_init(self.0.get(), attr.as_ptr());
        libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
    }

    pub fn lock(&self) -> SharedMutexGuard<'_> {
        let rc = unsafe { libc::pthread_mutex_lock(self.0.get()) };
        debug_assert_eq!(rc, 0, "pthread_mutex_lock failed");
        SharedMutexGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    /// Heuristic used by peers to refuse a region the simulator has not
    /// initialised yet: a process-shared mutex has nonzero state bytes on
    /// every supported libc, a freshly truncated mapping is all zeroes.
    pub(super) fn looks_initialised(&self) -> bool {
        let bytes = unsafe {
            std::slice::from_raw_parts(
                self.0.get().cast::<u8>(),
                std::mem::size_of::<libc::pthread_mutex_t>(),
            )
        };
        bytes.iter().any(|b| *b != 0)
    }

    fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.0.get()
    }
}

pub struct SharedMutexGuard<'a> {
    mutex: &'a SharedMutex,
    // pthread mutexes must be unlocked on the locking thread
    _not_send: PhantomData<*mut ()>,
}

impl Drop for SharedMutexGuard<'_> {
    fn drop(&mut self) {
        let rc = unsafe { libc::pthread_mutex_unlock(self.mutex.raw()) };
        debug_assert_eq!(rc, 0, "pthread_mutex_unlock failed");
    }
}

#[repr(transparent)]
pub struct SharedCondvar(UnsafeCell<libc::pthread_cond_t>);

unsafe impl Send for SharedCondvar {}
unsafe impl Sync for SharedCondvar {}

impl SharedCondvar {
    /// # Safety
    ///
    /// Same contract as [`SharedMutex::init`].
    pub(super) unsafe fn init(&self) {
        let mut attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
        libc::pthread_condattr_init(attr.as_mut_ptr());
        libc::pthread_condattr_setpshared(attr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED);
        libc::pthread_cond_init(self.0.get(), attr.as_ptr());
        libc::pthread_condattr_destroy(attr.as_mut_ptr());
    }

    /// Atomically releases the guarded mutex and blocks until woken.
    /// Spurious wakeups are possible; callers loop on their predicate.
    pub fn wait(&self, guard: &mut SharedMutexGuard<'_>) {
        let rc = unsafe { libc::pthread_cond_wait(self.0.get(), guard.mutex.raw()) };
        debug_assert_eq!(rc, 0, "pthread_cond_wait failed");
    }

    pub fn broadcast(&self) {
        let rc = unsafe { libc::pthread_cond_broadcast(self.0.get()) };
        debug_assert_eq!(rc, 0, "pthread_cond_broadcast failed");
    }
}
