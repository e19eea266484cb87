mod cache;
mod config;
mod hierarchy;
mod report;
mod stream;
mod trace;

use std::{error::Error, fs, path::PathBuf, process};

use config::{ConfigError, PrefetchPlacement, SimConfig};
use report::LevelStats;
use trace::Trace;

const BATCH_SIZE: usize = 16 * 1024;
const QUEUE_DEPTH: usize = 32;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = pico_args::Arguments::from_env();
    let json_out: Option<PathBuf> = args.opt_value_from_str("--json")?;
    let miss_on_prefetch_hit = args.contains("--miss-on-prefetch-hit");
    let prefetch_l1 = args.contains("--prefetch-l1");
    let config_path: Option<String> = args.opt_value_from_str("--config")?;

    let free: Vec<String> = args
        .finish()
        .into_iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    let (mut config, trace_file) = match config_path {
        Some(path) => {
            if free.len() != 1 {
                return Err(ConfigError::TraceArg(free.len()).into());
            }
            (SimConfig::from_json_file(&path)?, free[0].clone())
        }
        None => SimConfig::from_positional(&free)?,
    };
    if miss_on_prefetch_hit {
        config.miss_on_prefetch_hit = true;
    }
    if prefetch_l1 {
        config.prefetch_placement = PrefetchPlacement::L1;
    }
    config.validate()?;
    log::debug!("config: {config:#?}");

    print!("{}", report::render_configuration(&config, &trace_file));

    let mut hierarchy = config.to_hierarchy();
    let trace = Trace::read(PathBuf::from(&trace_file), BATCH_SIZE, QUEUE_DEPTH)?;
    for batch in trace.rec.iter() {
        for request in batch? {
            hierarchy.feed(request.addr, request.kind);
        }
    }

    print!("{}", report::render_contents(hierarchy.l1()));
    if let Some(l2) = hierarchy.l2() {
        println!();
        print!("{}", report::render_contents(l2));
    }
    println!();
    print!("{}", report::render_measurements(hierarchy.l1(), hierarchy.l2()));

    if let Some(path) = json_out {
        let stats: Vec<LevelStats> = hierarchy.levels().iter().map(LevelStats::gather).collect();
        let file = fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, &stats)?;
    }

    Ok(())
}
