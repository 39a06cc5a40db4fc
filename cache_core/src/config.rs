use std::{fmt, str::FromStr};

use serde::Serialize;
use thiserror::Error;

use crate::addr::{log2, AddrLayout};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacementPolicy {
    /// evicts the line inserted earliest; hits do not reorder lines
    Fifo,
    /// evicts the line used least recently
    Lru,
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplacementPolicy::Fifo => write!(f, "fifo"),
            ReplacementPolicy::Lru => write!(f, "lru"),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseConfigError {
    #[error("invalid replacement policy `{0}` (expected `fifo` or `lru`)")]
    UnknownPolicy(String),
}

impl FromStr for ReplacementPolicy {
    type Err = ParseConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fifo" => Ok(Self::Fifo),
            "lru" => Ok(Self::Lru),
            _ => Err(ParseConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

/// associativity as written by the user, before it is resolved against capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Associativity {
    /// one line per set
    Direct,
    /// a single set holding every line
    Full,
    /// explicit number of lines per set
    Ways(u64),
}

impl Associativity {
    pub fn resolve(self, capacity_bytes: u64, block_size_bytes: u64) -> u64 {
        match self {
            Associativity::Direct => 1,
            Associativity::Full => capacity_bytes / block_size_bytes,
            Associativity::Ways(n) => n,
        }
    }
}

impl fmt::Display for Associativity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Associativity::Direct => write!(f, "direct"),
            Associativity::Full => write!(f, "assoc"),
            Associativity::Ways(n) => write!(f, "assoc:{n}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub capacity_bytes: u64,
    pub associativity: Associativity,
    pub policy: ReplacementPolicy,
    pub block_size_bytes: u64,
}

impl CacheConfig {
    pub fn geometry(&self) -> Result<Geometry, ConfigError> {
        Geometry::new(
            self.capacity_bytes,
            self.associativity,
            self.block_size_bytes,
        )
    }
}

/// upper bound on the number of lines of one cache. both simulated caches
/// allocate this many lines up front.
pub const MAX_LINES: u64 = 1 << 24;

/// invalid cache geometry, detected before any storage is allocated.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cache size {0} is not a power of 2")]
    CapacityNotPowerOfTwo(u64),
    #[error("block size {0} is not a power of 2")]
    BlockSizeNotPowerOfTwo(u64),
    #[error("associativity {0} is not a power of 2")]
    AssociativityNotPowerOfTwo(u64),
    #[error("block size {block_size_bytes} exceeds cache size {capacity_bytes}")]
    BlockLargerThanCapacity {
        capacity_bytes: u64,
        block_size_bytes: u64,
    },
    #[error("{associativity} lines of {block_size_bytes} bytes do not fit in cache size {capacity_bytes}")]
    AssociativityTooLarge {
        capacity_bytes: u64,
        associativity: u64,
        block_size_bytes: u64,
    },
    #[error("{lines} lines exceed the limit of {max} lines per cache")]
    TooManyLines { lines: u64, max: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Geometry {
    capacity_bytes: u64,
    associativity: usize,
    block_size_bytes: u64,
    num_sets: usize,
    #[serde(skip)]
    layout: AddrLayout,
}

impl Geometry {
    pub fn new(
        capacity_bytes: u64,
        associativity: Associativity,
        block_size_bytes: u64,
    ) -> Result<Self, ConfigError> {
        use ConfigError::*;
        if !capacity_bytes.is_power_of_two() {
            return Err(CapacityNotPowerOfTwo(capacity_bytes));
        }
        if !block_size_bytes.is_power_of_two() {
            return Err(BlockSizeNotPowerOfTwo(block_size_bytes));
        }
        if block_size_bytes > capacity_bytes {
            return Err(BlockLargerThanCapacity {
                capacity_bytes,
                block_size_bytes,
            });
        }
        let lines = capacity_bytes / block_size_bytes;
        if lines > MAX_LINES {
            return Err(TooManyLines {
                lines,
                max: MAX_LINES,
            });
        }
        let ways = associativity.resolve(capacity_bytes, block_size_bytes);
        if !ways.is_power_of_two() {
            return Err(AssociativityNotPowerOfTwo(ways));
        }
        let set_bytes = match ways.checked_mul(block_size_bytes) {
            Some(b) if b <= capacity_bytes => b,
            _ => {
                return Err(AssociativityTooLarge {
                    capacity_bytes,
                    associativity: ways,
                    block_size_bytes,
                })
            }
        };
        let num_sets = capacity_bytes / set_bytes;
        Ok(Self {
            capacity_bytes,
            associativity: ways as usize,
            block_size_bytes,
            num_sets: num_sets as usize,
            layout: AddrLayout::new(log2(block_size_bytes), log2(num_sets)),
        })
    }
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }
    pub fn associativity(&self) -> usize {
        self.associativity
    }
    pub fn block_size_bytes(&self) -> u64 {
        self.block_size_bytes
    }
    pub fn num_sets(&self) -> usize {
        self.num_sets
    }
    pub fn layout(&self) -> AddrLayout {
        self.layout
    }
    pub fn num_lines(&self) -> usize {
        self.num_sets * self.associativity
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes, {} sets x {} ways, {}-byte blocks (offset bits: {}, index bits: {})",
            self.capacity_bytes,
            self.num_sets,
            self.associativity,
            self.block_size_bytes,
            self.layout.block_offset_bits(),
            self.layout.set_index_bits(),
        )
    }
}
