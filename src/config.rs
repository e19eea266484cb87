use serde::Deserialize;
use thiserror::Error;

use crate::{cache::CacheLevel, hierarchy::Hierarchy, stream::StreamBuffers};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("expected 8 command-line arguments but was provided {0}")]
    ArgCount(usize),
    #[error("expected a single trace file with --config, got {0} arguments")]
    TraceArg(usize),
    #[error("{name} must be an unsigned integer, got {value:?}")]
    BadNumber { name: &'static str, value: String },
    #[error("{name} must be a power of two, got {value}")]
    NotPowerOfTwo { name: &'static str, value: u32 },
    #[error("{name} does not divide into a whole power-of-two number of sets")]
    Geometry { name: &'static str },
    #[error("unable to open config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where the stream buffers live when both levels are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum PrefetchPlacement {
    /// The cache closest to memory (the original wiring).
    #[default]
    #[serde(alias = "lowest")]
    Lowest,
    #[serde(alias = "l1")]
    L1,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    pub block_size: u32,
    pub l1_size: u32,
    pub l1_assoc: u32,
    pub l2_size: u32,
    pub l2_assoc: u32,
    pub pref_n: u32,
    pub pref_m: u32,
    /// Count a demand miss even when the stream buffer hits.
    #[serde(default)]
    pub miss_on_prefetch_hit: bool,
    #[serde(default)]
    pub prefetch_placement: PrefetchPlacement,
}

fn parse(name: &'static str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::BadNumber {
        name,
        value: value.to_string(),
    })
}

impl SimConfig {
    /// Parse the original positional interface:
    /// `BLOCKSIZE L1_SIZE L1_ASSOC L2_SIZE L2_ASSOC PREF_N PREF_M tracefile`.
    pub fn from_positional(args: &[String]) -> Result<(SimConfig, String), ConfigError> {
        if args.len() != 8 {
            return Err(ConfigError::ArgCount(args.len()));
        }
        let config = SimConfig {
            block_size: parse("BLOCKSIZE", &args[0])?,
            l1_size: parse("L1_SIZE", &args[1])?,
            l1_assoc: parse("L1_ASSOC", &args[2])?,
            l2_size: parse("L2_SIZE", &args[3])?,
            l2_assoc: parse("L2_ASSOC", &args[4])?,
            pref_n: parse("PREF_N", &args[5])?,
            pref_m: parse("PREF_M", &args[6])?,
            miss_on_prefetch_hit: false,
            prefetch_placement: PrefetchPlacement::default(),
        };
        Ok((config, args[7].clone()))
    }

    pub fn from_json_file(path: &str) -> Result<SimConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn has_l2(&self) -> bool {
        self.l2_size != 0
    }

    pub fn has_prefetcher(&self) -> bool {
        self.pref_n > 0 && self.pref_m > 0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pow2 = |name, value: u32| {
            if value.is_power_of_two() {
                Ok(())
            } else {
                Err(ConfigError::NotPowerOfTwo { name, value })
            }
        };
        pow2("BLOCKSIZE", self.block_size)?;
        pow2("L1_SIZE", self.l1_size)?;
        pow2("L1_ASSOC", self.l1_assoc)?;
        Self::check_sets("L1", self.l1_size, self.block_size, self.l1_assoc)?;
        if self.has_l2() {
            pow2("L2_SIZE", self.l2_size)?;
            pow2("L2_ASSOC", self.l2_assoc)?;
            Self::check_sets("L2", self.l2_size, self.block_size, self.l2_assoc)?;
        }
        Ok(())
    }

    fn check_sets(
        name: &'static str,
        size: u32,
        block_size: u32,
        assoc: u32,
    ) -> Result<(), ConfigError> {
        let line = block_size.checked_mul(assoc).unwrap_or(0);
        if line == 0 || size % line != 0 || !(size / line).is_power_of_two() {
            return Err(ConfigError::Geometry { name });
        }
        Ok(())
    }

    pub fn to_hierarchy(&self) -> Hierarchy {
        let mut stream = self
            .has_prefetcher()
            .then(|| StreamBuffers::new(self.pref_n as usize, self.pref_m as usize));
        let attach_to_l1 = match self.prefetch_placement {
            PrefetchPlacement::L1 => true,
            PrefetchPlacement::Lowest => !self.has_l2(),
        };

        let mut levels = vec![CacheLevel::new(
            "L1".into(),
            self.block_size,
            self.l1_size,
            self.l1_assoc,
            if attach_to_l1 { stream.take() } else { None },
            self.miss_on_prefetch_hit,
        )];
        if self.has_l2() {
            levels.push(CacheLevel::new(
                "L2".into(),
                self.block_size,
                self.l2_size,
                self.l2_assoc,
                stream.take(),
                self.miss_on_prefetch_hit,
            ));
        }
        Hierarchy::new(levels)
    }
}
