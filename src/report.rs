use std::fmt::Write as _;

use serde::Serialize;

use crate::{cache::CacheLevel, config::SimConfig};

/// Per-level counter snapshot for the `--json` output.
#[derive(Debug, Serialize)]
pub struct LevelStats {
    pub name: String,
    pub reads: u64,
    pub read_misses: u64,
    pub writes: u64,
    pub write_misses: u64,
    pub miss_rate: f64,
    pub writebacks: u64,
    pub prefetches: u64,
}

impl LevelStats {
    pub fn gather(level: &CacheLevel) -> Self {
        let c = &level.counters;
        LevelStats {
            name: level.name.clone(),
            reads: c.reads,
            read_misses: c.read_misses,
            writes: c.writes,
            write_misses: c.write_misses,
            miss_rate: c.miss_rate(),
            writebacks: c.writebacks,
            prefetches: c.prefetches,
        }
    }
}

pub fn render_configuration(config: &SimConfig, trace_file: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "===== Simulator configuration =====");
    let _ = writeln!(out, "BLOCKSIZE:  {}", config.block_size);
    let _ = writeln!(out, "L1_SIZE:    {}", config.l1_size);
    let _ = writeln!(out, "L1_ASSOC:   {}", config.l1_assoc);
    let _ = writeln!(out, "L2_SIZE:    {}", config.l2_size);
    let _ = writeln!(out, "L2_ASSOC:   {}", config.l2_assoc);
    let _ = writeln!(out, "PREF_N:     {}", config.pref_n);
    let _ = writeln!(out, "PREF_M:     {}", config.pref_m);
    let _ = writeln!(out, "trace_file: {trace_file}");
    out
}

/// Valid sets MRU to LRU, dirty tags marked with a trailing `D`.
pub fn render_contents(level: &CacheLevel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "===== {} contents =====", level.name);
    for (set, ways) in level.contents() {
        let _ = write!(out, "set {set:6}:");
        for (tag, dirty) in ways {
            let _ = write!(out, " {tag:8x}{}", if dirty { " D" } else { "  " });
        }
        let _ = writeln!(out);
    }
    out
}

pub fn memory_traffic(lowest: &CacheLevel) -> u64 {
    let c = &lowest.counters;
    c.writebacks + c.read_misses + c.write_misses
}

pub fn render_measurements(l1: &CacheLevel, l2: Option<&CacheLevel>) -> String {
    let c1 = &l1.counters;
    let traffic = memory_traffic(l2.unwrap_or(l1));

    let mut out = String::new();
    let _ = writeln!(out, "===== Measurements =====");
    let _ = writeln!(out, "a. L1 reads:                   {}", c1.reads);
    let _ = writeln!(out, "b. L1 read misses:             {}", c1.read_misses);
    let _ = writeln!(out, "c. L1 writes:                  {}", c1.writes);
    let _ = writeln!(out, "d. L1 write misses:            {}", c1.write_misses);
    let _ = writeln!(out, "e. L1 miss rate:               {:.4}", c1.miss_rate());
    let _ = writeln!(out, "f. L1 writebacks:              {}", c1.writebacks);
    let _ = writeln!(out, "g. L1 prefetches:              {}", c1.prefetches);
    match l2 {
        Some(l2) => {
            let c2 = &l2.counters;
            let _ = writeln!(out, "h. L2 reads (demand):          {}", c2.reads);
            let _ = writeln!(out, "i. L2 read misses (demand):    {}", c2.read_misses);
            let _ = writeln!(out, "j. L2 reads (prefetch):        0");
            let _ = writeln!(out, "k. L2 read misses (prefetch):  0");
            let _ = writeln!(out, "l. L2 writes:                  {}", c2.writes);
            let _ = writeln!(out, "m. L2 write misses:            {}", c2.write_misses);
            let _ = writeln!(out, "n. L2 miss rate:               {:.4}", c2.miss_rate());
            let _ = writeln!(out, "o. L2 writebacks:              {}", c2.writebacks);
            let _ = writeln!(out, "p. L2 prefetches:              {}", c2.prefetches);
        }
        None => {
            let _ = writeln!(out, "h. L2 reads (demand):          0");
            let _ = writeln!(out, "i. L2 read misses (demand):    0");
            let _ = writeln!(out, "j. L2 reads (prefetch):        0");
            let _ = writeln!(out, "k. L2 read misses (prefetch):  0");
            let _ = writeln!(out, "l. L2 writes:                  0");
            let _ = writeln!(out, "m. L2 write misses:            0");
            let _ = writeln!(out, "n. L2 miss rate:               0.0000");
            let _ = writeln!(out, "o. L2 writebacks:              0");
            let _ = writeln!(out, "p. L2 prefetches:              0");
        }
    }
    let _ = writeln!(out, "q. memory traffic:             {traffic}");
    out
}
