//! The `PARKING` shared memory region: one contiguous mapping holding the
//! entrance, exit and level records that the three processes communicate
//! through. The simulator creates and initialises the region; the manager
//! and the fire monitor open it and refuse to start if it is absent or
//! still zeroed. No pointer ever crosses the process boundary, records are
//! located by `base + offset` arithmetic only.

mod layout;
mod sync;

pub use layout::{
    Entrance, Exit, Gate, GateGuard, GateStatus, Level, Lpr, LprGuard, Sign, SignDisplay,
    SignGuard, EVACUATE,
};

use crate::config::Config;
use crate::error::{Error, Result};
use log::{debug, info};
use nix::fcntl::OFlag;
use nix::sys::mman::{self, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;
use std::mem::size_of;
use std::num::NonZeroUsize;
use std::os::fd::OwnedFd;
use std::ptr::NonNull;

pub const DEFAULT_SHM_NAME: &str = "PARKING";

/// Record counts of a region. Zones are laid out in this order:
/// entrances, exits, levels.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Counts {
    pub entrances: usize,
    pub exits: usize,
    pub levels: usize,
}

impl Counts {
    pub fn from_config(config: &Config) -> Self {
        Self {
            entrances: config.entrances,
            exits: config.exits,
            levels: config.levels,
        }
    }
}

/// Total region size for the given counts.
pub const fn region_size(counts: Counts) -> usize {
    counts.entrances * size_of::<Entrance>()
        + counts.exits * size_of::<Exit>()
        + counts.levels * size_of::<Level>()
}

/// An owned mapping of the shared region.
#[derive(Debug)]
pub struct SharedRegion {
    base: NonNull<u8>,
    size: usize,
    counts: Counts,
    name: String,
    owner: bool,
}

unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Creates, truncates, maps and initialises the region. Only the
    /// simulator calls this, before any peer process starts, so the
    /// process-shared initialisation cannot race.
    pub fn create(name: &str, counts: Counts) -> Result<Self> {
        // remove any previous instance of the shared memory object
        if mman::shm_unlink(name).is_ok() {
            debug!("previous shared memory \"{}\" unlinked", name);
        }
        let size = region_size(counts);
        let fd = mman::shm_open(
            name,
            OFlag::O_CREAT | OFlag::O_RDWR,
            Mode::from_bits_truncate(0o666),
        )?;
        ftruncate(&fd, size as libc::off_t)?;
        let base = Self::map(&fd, size)?;
        let region = SharedRegion {
            base,
            size,
            counts,
            name: name.to_owned(),
            owner: true,
        };
        unsafe { region.init_all() };
        info!("shared region \"{}\" created, {} bytes", name, size);
        Ok(region)
    }

    /// Opens and maps a region created by the simulator. Fails if the
    /// object does not exist or its primitives are still zero-initialised.
    pub fn open(name: &str, counts: Counts) -> Result<Self> {
        let size = region_size(counts);
        let fd = mman::shm_open(name, OFlag::O_RDWR, Mode::empty())?;
        let base = Self::map(&fd, size)?;
        let region = SharedRegion {
            base,
            size,
            counts,
            name: name.to_owned(),
            owner: false,
        };
        if !region.is_initialised() {
            return Err(Error::RegionUninitialised(name.to_owned()));
        }
        info!("shared region \"{}\" mapped, {} bytes", name, size);
        Ok(region)
    }

    fn map(fd: &OwnedFd, size: usize) -> Result<NonNull<u8>> {
        let length = NonZeroUsize::new(size)
            .ok_or_else(|| Error::Config("shared region would be empty".into()))?;
        let base = unsafe {
            mman::mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                Some(fd),
                0,
            )?
        };
        Ok(NonNull::new(base.cast()).expect("mmap returned null base pointer"))
    }

    unsafe fn init_all(&self) {
        for i in 0..self.counts.entrances {
            self.entrance(i).init();
        }
        for i in 0..self.counts.exits {
            self.exit(i).init();
        }
        for i in 0..self.counts.levels {
            self.level(i).init();
        }
    }

    fn is_initialised(&self) -> bool {
        self.entrance(0).lpr.looks_initialised()
    }

    #[inline]
    pub fn counts(&self) -> Counts {
        self.counts
    }

    pub fn entrance(&self, i: usize) -> &Entrance {
        assert!(i < self.counts.entrances, "entrance index out of range");
        let offset = i * size_of::<Entrance>();
        unsafe { &*self.base.as_ptr().add(offset).cast() }
    }

    pub fn exit(&self, i: usize) -> &Exit {
        assert!(i < self.counts.exits, "exit index out of range");
        let offset = self.counts.entrances * size_of::<Entrance>() + i * size_of::<Exit>();
        unsafe { &*self.base.as_ptr().add(offset).cast() }
    }

    pub fn level(&self, i: usize) -> &Level {
        assert!(i < self.counts.levels, "level index out of range");
        let offset = self.counts.entrances * size_of::<Entrance>()
            + self.counts.exits * size_of::<Exit>()
            + i * size_of::<Level>();
        unsafe { &*self.base.as_ptr().add(offset).cast() }
    }

    /// True once any level's alarm byte reads `'1'`. The fire monitor sets
    /// every level together, so one raised byte means evacuation.
    pub fn alarm_active(&self) -> bool {
        (0..self.counts.levels).any(|i| self.level(i).alarm_raised())
    }

    pub fn raise_all_alarms(&self) {
        for i in 0..self.counts.levels {
            self.level(i).raise_alarm();
        }
    }

    /// Wakes every waiter on every condition variable in the region.
    /// Part of the shutdown protocol: the end flag must be raised first,
    /// after which no predicate re-enters a wait.
    pub fn broadcast_all(&self) {
        for i in 0..self.counts.entrances {
            self.entrance(i).wake_for_shutdown();
        }
        for i in 0..self.counts.exits {
            self.exit(i).wake_for_shutdown();
        }
        for i in 0..self.counts.levels {
            self.level(i).wake_for_shutdown();
        }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        let rc = unsafe { mman::munmap(self.base.as_ptr().cast(), self.size) };
        if let Err(e) = rc {
            log::error!("munmap of \"{}\" failed: {}", self.name, e);
        }
        if self.owner {
            let _ = mman::shm_unlink(self.name.as_str());
            debug!("shared region \"{}\" unlinked", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plates::Plate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_counts() -> Counts {
        Counts {
            entrances: 2,
            exits: 2,
            levels: 2,
        }
    }

    fn unique_name(tag: &str) -> String {
        static SEQ: AtomicUsize = AtomicUsize::new(0);
        format!(
            "carpark-test-{}-{}-{}",
            tag,
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        )
    }

    #[test]
    fn full_region_is_2920_bytes() {
        #[cfg(all(target_os = "linux", target_env = "gnu", target_pointer_width = "64"))]
        assert_eq!(
            region_size(Counts {
                entrances: 5,
                exits: 5,
                levels: 5
            }),
            2920
        );
    }

    #[test]
    fn create_then_open_round_trip() {
        let name = unique_name("open");
        let counts = test_counts();
        let region = SharedRegion::create(&name, counts).unwrap();
        {
            let mut gate = region.entrance(1).gate.lock();
            assert_eq!(gate.status(), GateStatus::Closed);
            gate.set(GateStatus::Raising);
        }
        let peer = SharedRegion::open(&name, counts).unwrap();
        assert_eq!(peer.entrance(1).gate.lock().status(), GateStatus::Raising);
        assert!(peer.exit(0).lpr.lock().plate().is_none());
        assert!(!peer.alarm_active());
        region.raise_all_alarms();
        assert!(peer.alarm_active());
        drop(peer);
        drop(region);
        assert!(SharedRegion::open(&name, counts).is_err());
    }

    #[test]
    fn open_refuses_uninitialised_region() {
        let name = unique_name("zeroed");
        let counts = test_counts();
        let size = region_size(counts);
        let fd = mman::shm_open(
            name.as_str(),
            OFlag::O_CREAT | OFlag::O_RDWR,
            Mode::from_bits_truncate(0o666),
        )
        .unwrap();
        ftruncate(&fd, size as libc::off_t).unwrap();
        drop(fd);
        let err = SharedRegion::open(&name, counts).unwrap_err();
        assert!(matches!(err, Error::RegionUninitialised(_)));
        mman::shm_unlink(name.as_str()).unwrap();
    }

    #[test]
    fn open_refuses_missing_region() {
        let name = unique_name("missing");
        assert!(SharedRegion::open(&name, test_counts()).is_err());
    }

    #[test]
    fn lpr_handshake_across_threads() {
        let name = unique_name("lpr");
        let counts = test_counts();
        let region = Arc::new(SharedRegion::create(&name, counts).unwrap());
        let peer = Arc::new(SharedRegion::open(&name, counts).unwrap());
        let plate = Plate::parse("206WHS").unwrap();

        // manager side: wait for a plate, answer on the sign
        let reader = {
            let peer = Arc::clone(&peer);
            std::thread::spawn(move || {
                let en = peer.entrance(0);
                let seen = {
                    let mut lpr = en.lpr.lock();
                    while lpr.plate().is_none() {
                        lpr.wait();
                    }
                    lpr.plate().unwrap()
                };
                {
                    let mut sign = en.sign.lock();
                    sign.set(SignDisplay::Level(1));
                }
                en.sign.notify();
                seen
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        let en = region.entrance(0);
        {
            let mut lpr = en.lpr.lock();
            lpr.set_plate(plate);
        }
        en.lpr.notify();

        // simulator side: wait for the verdict
        let mut sign = en.sign.lock();
        while sign.display() == SignDisplay::Blank {
            sign.wait();
        }
        assert_eq!(sign.display(), SignDisplay::Level(1));
        drop(sign);

        assert_eq!(reader.join().unwrap(), plate);
    }

    #[test]
    fn broadcast_all_unblocks_waiters() {
        let name = unique_name("wake");
        let counts = test_counts();
        let region = Arc::new(SharedRegion::create(&name, counts).unwrap());
        let end = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let waiter = {
            let region = Arc::clone(&region);
            let end = Arc::clone(&end);
            std::thread::spawn(move || {
                let en = region.entrance(0);
                let mut gate = en.gate.lock();
                while gate.status() == GateStatus::Closed && !end.load(Ordering::SeqCst) {
                    gate.wait();
                }
            })
        };

        std::thread::sleep(Duration::from_millis(20));
        end.store(true, Ordering::SeqCst);
        region.broadcast_all();
        waiter.join().unwrap();
    }
}
