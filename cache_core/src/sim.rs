use std::fmt;

use crate::{
    cache::{CacheModel, Outcome},
    config::{CacheConfig, ConfigError},
    report::{Report, RunReport},
    trace::{Access, TraceError},
};

#[cfg(feature = "stat")]
use crate::stat::{AddStats, Stats};

#[derive(Default)]
pub struct SimulationOption {
    /// print every access with the outcome of both caches
    pub do_trace: bool,
}

/// drives a cache without prefetch and one with prefetch over the same accesses.
pub struct Simulator {
    no_prefetch: CacheModel,
    prefetch: CacheModel,
    step: usize,
    #[cfg(feature = "stat")]
    stat_builder: stat::SimStatBuilder,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepResult {
    pub access: Access,
    pub no_prefetch: Outcome,
    pub prefetch: Outcome,
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},\tno prefetch: {}\tprefetch: {}",
            self.access, self.no_prefetch, self.prefetch
        )
    }
}

impl Simulator {
    pub fn new(config: &CacheConfig) -> Result<Self, ConfigError> {
        let geometry = config.geometry()?;
        log::info!("cache: {geometry}, policy: {}", config.policy);
        Ok(Self {
            no_prefetch: CacheModel::new(geometry, config.policy, false),
            prefetch: CacheModel::new(geometry, config.policy, true),
            step: 0,
            #[cfg(feature = "stat")]
            stat_builder: stat::SimStatBuilder::new(),
        })
    }

    /// applies one access to the cache without prefetch first, then to the one with prefetch.
    pub fn step(&mut self, access: Access) -> StepResult {
        let no_prefetch = self.no_prefetch.access(access);
        let prefetch = self.prefetch.access(access);
        self.step += 1;
        StepResult {
            access,
            no_prefetch,
            prefetch,
        }
    }

    pub fn run<I>(&mut self, trace: I, opt: &SimulationOption) -> Result<(), TraceError>
    where
        I: IntoIterator<Item = Result<Access, TraceError>>,
    {
        #[inline]
        fn print_trace(step: usize, r: &StepResult) {
            println!("#{step:010}, {r}");
        }

        for access in trace {
            let r = self.step(access?);
            if opt.do_trace {
                print_trace(self.step, &r);
            }
        }
        #[cfg(feature = "stat")]
        self.exit_sim();
        log::info!("simulated {} accesses.", self.step);
        Ok(())
    }

    #[cfg(feature = "stat")]
    pub fn exit_sim(&mut self) {
        self.stat_builder.steps(self.step);
        self.stat_builder.stop_timer();
    }

    pub fn steps(&self) -> usize {
        self.step
    }

    pub fn no_prefetch(&self) -> &CacheModel {
        &self.no_prefetch
    }

    pub fn prefetch(&self) -> &CacheModel {
        &self.prefetch
    }

    pub fn report(&self) -> Report {
        Report {
            geometry: *self.no_prefetch.geometry(),
            policy: self.no_prefetch.policy(),
            runs: [
                RunReport::from(&self.no_prefetch),
                RunReport::from(&self.prefetch),
            ],
        }
    }

    #[cfg(feature = "stat")]
    pub fn collect_stat(&self) -> Stats {
        let mut ss = Stats::default();
        self.add_stats(&mut ss);
        ss
    }
}

#[cfg(feature = "stat")]
impl AddStats for Simulator {
    fn add_stats(&self, buf: &mut Stats) {
        buf.push(Box::new(self.stat_builder.finish()));
        self.report().add_stats(buf);
    }
}

#[cfg(feature = "stat")]
mod stat {
    use crate::stat::*;

    use super::*;
    use std::time;

    pub struct SimStatBuilder {
        begin: time::Instant,
        steps: Option<usize>,
        elapsed: Option<time::Duration>,
    }

    impl SimStatBuilder {
        pub fn new() -> Self {
            Self {
                begin: time::Instant::now(),
                steps: None,
                elapsed: None,
            }
        }
        pub fn steps(&mut self, steps: usize) {
            self.steps = Some(steps)
        }
        pub fn stop_timer(&mut self) {
            self.elapsed = Some(time::Instant::now() - self.begin)
        }
        pub fn finish(&self) -> SimStat {
            SimStat {
                steps: self.steps.unwrap_or_default(),
                elapsed: self.elapsed.unwrap_or_else(|| self.begin.elapsed()),
            }
        }
    }

    impl Default for SimStatBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    pub struct SimStat {
        steps: usize,
        elapsed: time::Duration,
    }

    impl Stat for SimStat {
        fn view(&self, _: usize) -> Box<dyn StatView + '_> {
            Box::new(self)
        }
    }

    impl StatView for &'_ SimStat {
        fn header(&self) -> &'static str {
            "simulator stat"
        }
        fn width(&self) -> usize {
            33
        }
    }

    impl fmt::Display for &'_ SimStat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let ms = format!("{} ms", self.elapsed.as_millis());
            writeln!(f, "  elapsed total: {ms:>9}")?;
            let steps = format!("#{}", self.steps);
            writeln!(f, "  accesses total: {steps:>8}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Associativity, ReplacementPolicy},
        trace::TraceReader,
    };

    fn config(
        capacity_bytes: u64,
        associativity: Associativity,
        policy: ReplacementPolicy,
        block_size_bytes: u64,
    ) -> CacheConfig {
        CacheConfig {
            capacity_bytes,
            associativity,
            policy,
            block_size_bytes,
        }
    }

    fn run(c: CacheConfig, trace: &str) -> Report {
        let mut sim = Simulator::new(&c).unwrap();
        sim.run(TraceReader::new(trace.as_bytes()), &Default::default())
            .unwrap();
        sim.report()
    }

    #[test]
    fn test_direct_mapped_scenario() {
        let r = run(
            config(32, Associativity::Direct, ReplacementPolicy::Fifo, 4),
            "0: R 0x0\n4: R 0x4\n8: R 0x0\n#eof\n",
        );
        let s = r.runs[0].stat;
        assert_eq!((1, 2, 2, 0), (s.hits, s.misses, s.memory_reads, s.memory_writes));
        // 0x4 was already prefetched by the first miss
        let s = r.runs[1].stat;
        assert_eq!((2, 1, 2, 0), (s.hits, s.misses, s.memory_reads, s.memory_writes));
    }
    #[test]
    fn test_fully_associative_scenario() {
        let r = run(
            config(16, Associativity::Full, ReplacementPolicy::Lru, 4),
            "0: R 0\n0: R 4\n0: R 8\n0: R c\n0: R 0\n",
        );
        assert_eq!(1, r.runs[0].stat.hits);
        assert_eq!(4, r.runs[0].stat.misses);
    }
    #[test]
    fn test_prefetch_scenario() {
        let r = run(
            config(32, Associativity::Direct, ReplacementPolicy::Fifo, 4),
            "0: R 0x0\n",
        );
        let [plain, pf] = r.runs;
        assert!(!plain.prefetch);
        assert!(pf.prefetch);
        assert_eq!(1, plain.stat.memory_reads);
        assert_eq!((0, 1, 2), (pf.stat.hits, pf.stat.misses, pf.stat.memory_reads));
    }
    #[test]
    fn test_lockstep_order() {
        let c = config(64, Associativity::Ways(2), ReplacementPolicy::Lru, 8);
        let mut sim = Simulator::new(&c).unwrap();
        let r = sim.step(Access::write(0x20));
        assert!(!r.no_prefetch.is_hit());
        assert!(!r.prefetch.is_hit());
        let r = sim.step(Access::read(0x28));
        assert!(!r.no_prefetch.is_hit());
        assert!(r.prefetch.is_hit());
        assert_eq!(2, sim.steps());
        assert_eq!(2, sim.no_prefetch().stat().accesses());
        assert_eq!(2, sim.prefetch().stat().accesses());
    }
    #[test]
    fn test_invalid_config() {
        let c = config(32, Associativity::Ways(16), ReplacementPolicy::Fifo, 4);
        assert!(Simulator::new(&c).is_err());
        // rejected before either cache allocates its lines
        let c = config(1 << 62, Associativity::Direct, ReplacementPolicy::Lru, 1);
        assert!(matches!(
            Simulator::new(&c),
            Err(ConfigError::TooManyLines { .. })
        ));
    }
    #[test]
    fn test_step_display() {
        let c = config(32, Associativity::Direct, ReplacementPolicy::Fifo, 4);
        let mut sim = Simulator::new(&c).unwrap();
        let r = sim.step(Access::read(0x0));
        assert_eq!(
            "R 0x00000000,\tno prefetch: miss\tprefetch: miss +prefetch",
            r.to_string()
        );
    }
    #[cfg(feature = "stat")]
    #[test]
    fn test_collect_stat() {
        let c = config(32, Associativity::Direct, ReplacementPolicy::Fifo, 4);
        let mut sim = Simulator::new(&c).unwrap();
        sim.run([Ok(Access::read(0))], &Default::default()).unwrap();
        let ss = sim.collect_stat();
        assert_eq!(3, ss.len());
        assert!(ss.view(120).to_string().contains("accesses total:       #1"));
    }
}
