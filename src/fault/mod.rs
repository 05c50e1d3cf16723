//! Silent-corruption injection.
//!
//! Faults are applied to already-hashed clean bytes, so the sidecar's
//! expected hashes describe the undamaged artifact and the scanner can
//! tell container-level from semantic corruption.
//!
//! The injector owns an explicit seedable random source. Ambient
//! randomness would make experiment runs irreproducible.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Corruption mode applied to serialized checkpoint bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultMode {
    /// Identity.
    None,
    /// Roughly one random single-bit flip per 200 KB, at least one flip
    /// on nonempty input.
    Bitflip,
    /// Keep the first 70% of the bytes.
    Truncate,
    /// Zero a contiguous run of 1% of the length (minimum one byte)
    /// starting at a random offset.
    ZeroRange,
}

impl FaultMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultMode::None => "none",
            FaultMode::Bitflip => "bitflip",
            FaultMode::Truncate => "truncate",
            FaultMode::ZeroRange => "zerorange",
        }
    }
}

impl fmt::Display for FaultMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FaultMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(FaultMode::None),
            "bitflip" => Ok(FaultMode::Bitflip),
            "truncate" => Ok(FaultMode::Truncate),
            "zerorange" => Ok(FaultMode::ZeroRange),
            other => Err(format!("unknown fault mode: {}", other)),
        }
    }
}

/// Applies fault modes using an owned, seeded random source.
#[derive(Debug)]
pub struct FaultInjector {
    rng: StdRng,
}

impl FaultInjector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns possibly-corrupted bytes. All modes are identity on empty
    /// input.
    pub fn apply(&mut self, raw: &[u8], mode: FaultMode) -> Vec<u8> {
        let n = raw.len();
        if n == 0 || mode == FaultMode::None {
            return raw.to_vec();
        }

        match mode {
            FaultMode::None => raw.to_vec(),
            FaultMode::Bitflip => {
                let mut bytes = raw.to_vec();
                let flips = std::cmp::max(1, n / 200_000);
                for _ in 0..flips {
                    let i = self.rng.gen_range(0..n);
                    let bit = 1u8 << self.rng.gen_range(0..8);
                    bytes[i] ^= bit;
                }
                bytes
            }
            FaultMode::Truncate => {
                let keep = (n as f64 * 0.7) as usize;
                raw[..keep].to_vec()
            }
            FaultMode::ZeroRange => {
                let mut bytes = raw.to_vec();
                let start = self.rng.gen_range(0..n);
                let length = std::cmp::min(n - start, std::cmp::max(1, n / 100));
                for b in &mut bytes[start..start + length] {
                    *b = 0;
                }
                bytes
            }
        }
    }
}

/// Flips one random bit in each of up to `nbytes` distinct bytes of an
/// existing file, in place.
///
/// This is the offline counterpart of [`FaultMode::Bitflip`] for
/// corrupting artifacts after they were written. Returns the number of
/// bytes modified (0 for an empty file).
pub fn flip_file_bytes(path: &Path, nbytes: usize, seed: u64) -> io::Result<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let size = std::fs::metadata(path)?.len() as usize;
    if size == 0 {
        return Ok(0);
    }
    let count = std::cmp::min(nbytes, size);

    let mut offsets: Vec<usize> = Vec::with_capacity(count);
    while offsets.len() < count {
        let i = rng.gen_range(0..size);
        if !offsets.contains(&i) {
            offsets.push(i);
        }
    }
    offsets.sort_unstable();

    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    for i in offsets.iter() {
        let mut byte = [0u8; 1];
        file.seek(SeekFrom::Start(*i as u64))?;
        file.read_exact(&mut byte)?;
        byte[0] ^= 1u8 << rng.gen_range(0..8);
        file.seek(SeekFrom::Start(*i as u64))?;
        file.write_all(&byte)?;
    }
    Ok(count)
}

/// Truncates `tail` bytes off the end of an existing file, in place.
///
/// Returns the new length.
pub fn truncate_file_tail(path: &Path, tail: u64) -> io::Result<u64> {
    let size = std::fs::metadata(path)?.len();
    let new_len = size.saturating_sub(tail);
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(new_len)?;
    Ok(new_len)
}
