use std::fmt;

use serde::Serialize;

use crate::{
    addr::Addr,
    config::{CacheConfig, ConfigError, Geometry, ReplacementPolicy},
    trace::{Access, AccessKind},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheLine {
    pub valid: bool,
    pub tag: u64,
    /// insertion order under FIFO, recency of use under LRU. larger is older.
    pub age: u64,
}

/// position of a line: `set` selects the set, `way` the line within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinePos {
    pub set: usize,
    pub way: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStat {
    pub memory_reads: u64,
    pub memory_writes: u64,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStat {
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }
}

/// what the prefetch attached to a miss did with the following block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prefetch {
    /// the block was already cached, no traffic.
    Present,
    /// the block was read from memory, possibly evicting another block.
    Fetched { evicted: Option<Addr> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Hit,
    Miss {
        evicted: Option<Addr>,
        /// `None` when the cache does not prefetch.
        prefetch: Option<Prefetch>,
    },
}

impl Outcome {
    #[must_use]
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Hit => write!(f, "hit"),
            Outcome::Miss { evicted, prefetch } => {
                write!(f, "miss")?;
                if let Some(e) = evicted {
                    write!(f, " (evict {e})")?;
                }
                if let Some(Prefetch::Fetched { evicted }) = prefetch {
                    write!(f, " +prefetch")?;
                    if let Some(e) = evicted {
                        write!(f, " (evict {e})")?;
                    }
                }
                Ok(())
            }
        }
    }
}

pub struct CacheModel {
    geometry: Geometry,
    policy: ReplacementPolicy,
    prefetch: bool,
    /// `num_sets * associativity` lines, set-major.
    lines: Vec<CacheLine>,
    stat: CacheStat,
}

impl CacheModel {
    pub fn new(geometry: Geometry, policy: ReplacementPolicy, prefetch: bool) -> Self {
        Self {
            lines: vec![CacheLine::default(); geometry.num_lines()],
            geometry,
            policy,
            prefetch,
            stat: Default::default(),
        }
    }
    pub fn from_config(config: &CacheConfig, prefetch: bool) -> Result<Self, ConfigError> {
        Ok(Self::new(config.geometry()?, config.policy, prefetch))
    }
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }
    pub fn policy(&self) -> ReplacementPolicy {
        self.policy
    }
    pub fn prefetch(&self) -> bool {
        self.prefetch
    }
    pub fn stat(&self) -> &CacheStat {
        &self.stat
    }
    pub fn set(&self, set: usize) -> &[CacheLine] {
        let ways = self.geometry.associativity();
        &self.lines[set * ways..(set + 1) * ways]
    }
    fn set_mut(&mut self, set: usize) -> &mut [CacheLine] {
        let ways = self.geometry.associativity();
        &mut self.lines[set * ways..(set + 1) * ways]
    }

    pub fn find_line(&self, addr: Addr) -> Option<LinePos> {
        let layout = self.geometry.layout();
        let set = layout.set_index(addr);
        let tag = layout.tag(addr);
        self.set(set)
            .iter()
            .position(|l| l.valid && l.tag == tag)
            .map(|way| LinePos { set, way })
    }

    /// makes `way` the youngest line of `set` and ages every other valid line.
    fn renew(&mut self, set: usize, way: usize) {
        for (i, line) in self.set_mut(set).iter_mut().enumerate() {
            if !line.valid {
                continue;
            }
            if i == way {
                line.age = 0;
            } else {
                line.age += 1;
            }
        }
    }

    fn on_hit(&mut self, pos: LinePos) {
        match self.policy {
            ReplacementPolicy::Fifo => {}
            ReplacementPolicy::Lru => self.renew(pos.set, pos.way),
        }
    }

    /// picks the first invalid line of the set, or else the oldest one.
    fn victim(&self, set: usize) -> usize {
        let lines = self.set(set);
        if let Some(way) = lines.iter().position(|l| !l.valid) {
            return way;
        }
        // `max_by_key` keeps the last of equal maxima. ages of valid lines are
        // pairwise distinct, so no tie is ever observed.
        lines
            .iter()
            .enumerate()
            .max_by_key(|(_, l)| l.age)
            .map(|(way, _)| way)
            .unwrap_or(0)
    }

    /// loads the block containing `addr`, returning the address of the evicted block if any.
    fn load_block(&mut self, addr: Addr) -> Option<Addr> {
        let layout = self.geometry.layout();
        let set = layout.set_index(addr);
        let tag = layout.tag(addr);
        let way = self.victim(set);
        let line = &mut self.set_mut(set)[way];
        let evicted = line
            .valid
            .then(|| layout.compose(line.tag, set, 0));
        line.valid = true;
        line.tag = tag;
        self.renew(set, way);
        evicted
    }

    /// fetches the block after the one containing `addr` unless it is already cached.
    fn prefetch_next(&mut self, addr: Addr) -> Prefetch {
        let next = self.geometry.layout().next_block(addr);
        if self.find_line(next).is_some() {
            return Prefetch::Present;
        }
        self.stat.memory_reads += 1;
        Prefetch::Fetched {
            evicted: self.load_block(next),
        }
    }

    fn on_miss(&mut self, addr: Addr, kind: AccessKind) -> Outcome {
        self.stat.misses += 1;
        self.stat.memory_reads += 1;
        let evicted = self.load_block(addr);
        if kind == AccessKind::Write {
            self.stat.memory_writes += 1;
        }
        let prefetch = if self.prefetch {
            Some(self.prefetch_next(addr))
        } else {
            None
        };
        Outcome::Miss { evicted, prefetch }
    }

    pub fn read(&mut self, addr: Addr) -> Outcome {
        match self.find_line(addr) {
            Some(pos) => {
                self.stat.hits += 1;
                self.on_hit(pos);
                Outcome::Hit
            }
            None => self.on_miss(addr, AccessKind::Read),
        }
    }

    pub fn write(&mut self, addr: Addr) -> Outcome {
        match self.find_line(addr) {
            Some(pos) => {
                self.stat.hits += 1;
                self.stat.memory_writes += 1;
                self.on_hit(pos);
                Outcome::Hit
            }
            None => self.on_miss(addr, AccessKind::Write),
        }
    }

    pub fn access(&mut self, Access { kind, addr }: Access) -> Outcome {
        let outcome = match kind {
            AccessKind::Read => self.read(addr),
            AccessKind::Write => self.write(addr),
        };
        log::trace!(
            "[prefetch {}] {kind} {addr}: {outcome}",
            self.prefetch as u8
        );
        outcome
    }
}
