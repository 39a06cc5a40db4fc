use std::fmt;

use serde::Serialize;

use crate::{
    cache::{CacheModel, CacheStat},
    config::{Geometry, ReplacementPolicy},
};

/// final counters of one cache instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub prefetch: bool,
    #[serde(flatten)]
    pub stat: CacheStat,
}

impl From<&CacheModel> for RunReport {
    fn from(m: &CacheModel) -> Self {
        Self {
            prefetch: m.prefetch(),
            stat: *m.stat(),
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let CacheStat {
            memory_reads,
            memory_writes,
            hits,
            misses,
        } = self.stat;
        writeln!(f, "Prefetch {}", self.prefetch as u8)?;
        writeln!(f, "Memory reads: {memory_reads}")?;
        writeln!(f, "Memory writes: {memory_writes}")?;
        writeln!(f, "Cache hits: {hits}")?;
        write!(f, "Cache misses: {misses}")
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct Report {
    pub geometry: Geometry,
    pub policy: ReplacementPolicy,
    /// without prefetch, then with prefetch
    pub runs: [RunReport; 2],
}

impl Report {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [no_prefetch, prefetch] = &self.runs;
        writeln!(f, "{no_prefetch}")?;
        write!(f, "{prefetch}")
    }
}

#[cfg(feature = "stat")]
mod stat {
    use crate::stat::*;

    use super::*;

    impl Stat for RunReport {
        fn view(&self, _: usize) -> Box<dyn StatView + '_> {
            Box::new(CacheStatView::new(self))
        }
    }

    pub struct CacheStatView<'a> {
        run: &'a RunReport,
    }

    impl<'a> CacheStatView<'a> {
        pub fn new(run: &'a RunReport) -> Self {
            Self { run }
        }
    }

    impl StatView for CacheStatView<'_> {
        fn header(&self) -> &'static str {
            if self.run.prefetch {
                "cache stat (prefetch)"
            } else {
                "cache stat (no prefetch)"
            }
        }
        fn width(&self) -> usize {
            35
        }
    }

    impl fmt::Display for CacheStatView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let CacheStat {
                memory_reads,
                memory_writes,
                hits,
                misses,
            } = self.run.stat;
            let total = hits + misses;
            let pct = |n: u64| {
                let p = if total == 0 {
                    0.
                } else {
                    100. * n as f64 / total as f64
                };
                format!("{p:.6}")
            };
            let (hit_pct, miss_pct) = (pct(hits), pct(misses));
            writeln!(f, "      hit: {hits:>10} ({hit_pct:>10}%)")?;
            writeln!(f, "     miss: {misses:>10} ({miss_pct:>10}%)")?;
            writeln!(f, "     read: {memory_reads:>10}")?;
            writeln!(f, "    write: {memory_writes:>10}")
        }
    }

    impl AddStats for Report {
        fn add_stats(&self, buf: &mut Stats) {
            buf.extend(
                self.runs
                    .iter()
                    .map(|&r| -> Box<dyn Stat> { Box::new(r) }),
            );
        }
    }
}
