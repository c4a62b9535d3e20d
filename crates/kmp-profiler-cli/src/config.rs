//! Command-line configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use kmp_profiler::config::{
    DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_HISTOGRAM_DIR, DEFAULT_MAX_PENDING_SAMPLES,
};
use kmp_profiler::{Category, NamedCategories, ProfilerConfig};

/// Everything needed to run a replay.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Profiler settings.
    pub profiler: ProfilerConfig,
    /// File names per category.
    pub names: NamedCategories,
    /// Event file. None reads stdin.
    pub input: Option<PathBuf>,
}

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "kmp-profiler")]
#[command(version, about = "Replay message timings into KMP latency histograms", long_about = None)]
pub struct Args {
    /// Base directory the histogram tree is created under.
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Name of the histogram directory under the root.
    #[arg(long, default_value = DEFAULT_HISTOGRAM_DIR)]
    pub histogram_dir: String,

    /// Event file with `<category> <start_ms> <end_ms>` lines. Reads stdin if omitted.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Milliseconds between histogram flushes.
    #[arg(long, default_value_t = DEFAULT_FLUSH_INTERVAL_MS)]
    pub flush_interval_ms: u64,

    /// Category file name as ID=NAME. May be repeated.
    #[arg(long = "name", value_name = "ID=NAME", value_parser = parse_category_name)]
    pub names: Vec<(Category, String)>,

    /// Maximum queued samples (0 = unbounded).
    #[arg(long, default_value_t = DEFAULT_MAX_PENDING_SAMPLES)]
    pub max_pending: usize,

    /// Skip the final flush on shutdown.
    #[arg(long)]
    pub no_final_flush: bool,
}

impl Args {
    /// Convert command-line arguments to a replay configuration.
    pub fn into_config(self) -> ReplayConfig {
        let mut profiler = ProfilerConfig::new(self.root)
            .with_histogram_dir(self.histogram_dir)
            .with_flush_interval(Duration::from_millis(self.flush_interval_ms));

        profiler = if self.max_pending == 0 {
            profiler.unbounded()
        } else {
            profiler.with_max_pending_samples(self.max_pending)
        };

        if self.no_final_flush {
            profiler = profiler.without_final_flush();
        }

        ReplayConfig {
            profiler,
            names: self.names.into_iter().collect(),
            input: self.input,
        }
    }
}

fn parse_category_name(s: &str) -> Result<(Category, String), String> {
    let (id, name) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=NAME, got {s:?}"))?;
    let id = id
        .trim()
        .parse::<Category>()
        .map_err(|e| format!("invalid category id {id:?}: {e}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty name for category {id}"));
    }
    Ok((id, name.to_string()))
}
