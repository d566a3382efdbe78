use crate::error::{Error, Result};
use log::{debug, info};
use parking_lot::RwLock;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

pub const PLATE_LEN: usize = 6;

/// A six-character license plate, digits then letters (`NNNLLL`), always
/// stored uppercase.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Plate([u8; PLATE_LEN]);

impl Plate {
    /// Parses a whitelist line. Returns None unless the input is exactly
    /// three ASCII digits followed by three ASCII letters; letters are
    /// normalised to uppercase.
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.trim().as_bytes();
        if bytes.len() != PLATE_LEN {
            return None;
        }
        let mut plate = [0u8; PLATE_LEN];
        for (i, &b) in bytes.iter().enumerate() {
            if i < PLATE_LEN / 2 {
                if !b.is_ascii_digit() {
                    return None;
                }
                plate[i] = b;
            } else {
                if !b.is_ascii_alphabetic() {
                    return None;
                }
                plate[i] = b.to_ascii_uppercase();
            }
        }
        Some(Plate(plate))
    }

    /// Reads a plate back from a NUL-terminated shared LPR field. An empty
    /// field (leading NUL) means no unread arrival is pending.
    pub(crate) fn from_shared(buf: &[u8; PLATE_LEN + 1]) -> Option<Self> {
        if buf[0] == 0 {
            return None;
        }
        let mut plate = [0u8; PLATE_LEN];
        plate.copy_from_slice(&buf[..PLATE_LEN]);
        Some(Plate(plate))
    }

    pub(crate) fn to_shared(self) -> [u8; PLATE_LEN + 1] {
        let mut buf = [0u8; PLATE_LEN + 1];
        buf[..PLATE_LEN].copy_from_slice(&self.0);
        buf
    }

    pub fn as_str(&self) -> &str {
        // always built from ASCII
        std::str::from_utf8(&self.0).unwrap_or("??????")
    }
}

impl fmt::Display for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Plate({})", self.as_str())
    }
}

/// Generates a uniformly random `NNNLLL` plate.
pub fn random_plate(rng: &mut impl Rng) -> Plate {
    let mut plate = [0u8; PLATE_LEN];
    for slot in plate.iter_mut().take(PLATE_LEN / 2) {
        *slot = b"123456789"[rng.random_range(0..9)];
    }
    for slot in plate.iter_mut().skip(PLATE_LEN / 2) {
        *slot = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ"[rng.random_range(0..26)];
    }
    Plate(plate)
}

fn read_plates(path: &Path) -> Result<Vec<Plate>> {
    let raw = fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
    let mut plates = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match Plate::parse(line) {
            Some(plate) => plates.push(plate),
            // malformed lines are skipped silently
            None => debug!("skipping malformed plate line {:?}", line),
        }
    }
    Ok(plates)
}

/// The manager's set of authorised plates. Read-mostly after startup but
/// lock-protected like every other shared structure.
pub struct Whitelist {
    plates: RwLock<HashSet<Plate>>,
}

impl Whitelist {
    pub fn load(path: &Path) -> Result<Self> {
        let plates: HashSet<Plate> = read_plates(path)?.into_iter().collect();
        info!("{} authorised plates loaded", plates.len());
        Ok(Self {
            plates: RwLock::new(plates),
        })
    }

    pub fn contains(&self, plate: &Plate) -> bool {
        self.plates.read().contains(plate)
    }

    pub fn len(&self) -> usize {
        self.plates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plates.read().is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_plates(plates: impl IntoIterator<Item = Plate>) -> Self {
        Self {
            plates: RwLock::new(plates.into_iter().collect()),
        }
    }
}

/// The simulator's private pool of authorised plates, loaded from the same
/// whitelist file as the manager and used for biased arrival generation.
pub struct PlatePool {
    plates: Vec<Plate>,
}

impl PlatePool {
    pub fn load(path: &Path) -> Result<Self> {
        let plates = read_plates(path)?;
        info!("{} plates in the arrival pool", plates.len());
        Ok(Self { plates })
    }

    #[cfg(test)]
    pub(crate) fn from_plates(plates: Vec<Plate>) -> Self {
        Self { plates }
    }

    /// Picks an arrival plate: with probability `chance` a uniformly
    /// chosen whitelisted plate, otherwise a random one.
    pub fn pick(&self, rng: &mut impl Rng, chance: f64) -> Plate {
        if !self.plates.is_empty() && rng.random_bool(chance.clamp(0.0, 1.0)) {
            *self.plates.choose(rng).unwrap()
        } else {
            random_plate(rng)
        }
    }
}
