//! Event stream parsing and replay.

use std::future::Future;

use kmp_profiler::{new_shared_profiler, Category, ServerProfiler};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::config::ReplayConfig;
use crate::error::{Error, ParseError};

/// One recorded message timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingEvent {
    /// Message type.
    pub category: Category,
    /// Time processing started, in milliseconds.
    pub start_ms: f64,
    /// Time processing finished, in milliseconds.
    pub end_ms: f64,
}

/// Counters for a finished replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Events handed to the profiler.
    pub recorded: u64,
    /// Malformed lines skipped.
    pub skipped: u64,
    /// Whether the replay stopped on the shutdown signal instead of EOF.
    pub interrupted: bool,
}

/// Parse one line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_event(line_no: usize, line: &str) -> Result<Option<TimingEvent>, ParseError> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
        return Ok(None);
    }

    let err = |message: String| ParseError {
        line: line_no,
        message,
    };

    let mut fields = line.split_whitespace();
    let (Some(category), Some(start), Some(end), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(err(format!(
            "expected `<category> <start_ms> <end_ms>`, got {line:?}"
        )));
    };

    let category = category
        .parse::<Category>()
        .map_err(|e| err(format!("invalid category {category:?}: {e}")))?;
    let start_ms = start
        .parse::<f64>()
        .map_err(|e| err(format!("invalid start time {start:?}: {e}")))?;
    let end_ms = end
        .parse::<f64>()
        .map_err(|e| err(format!("invalid end time {end:?}: {e}")))?;

    Ok(Some(TimingEvent {
        category,
        start_ms,
        end_ms,
    }))
}

/// Feed every event from `reader` to `profiler` until EOF or `shutdown`.
///
/// Malformed lines are logged and skipped. The profiler is not shut down.
pub async fn replay<R, S>(
    reader: R,
    profiler: &ServerProfiler,
    shutdown: S,
) -> Result<ReplayStats, Error>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = reader.lines();
    let mut stats = ReplayStats::default();
    let mut line_no = 0usize;
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            () = &mut shutdown => {
                info!("Replay interrupted");
                stats.interrupted = true;
                break;
            }
        };

        let Some(line) = line else {
            debug!(lines = line_no, "Reached end of event stream");
            break;
        };
        line_no += 1;

        match parse_event(line_no, &line) {
            Ok(Some(event)) => {
                profiler.record(event.category, event.start_ms, event.end_ms);
                stats.recorded += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Skipping malformed event");
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}

/// Start a profiler, replay the configured input into it, and shut it down.
///
/// The profiler is shut down (and its final flush written) even when the
/// replay itself fails.
pub async fn run<S>(config: ReplayConfig, shutdown: S) -> Result<ReplayStats, Error>
where
    S: Future<Output = ()>,
{
    let profiler = new_shared_profiler(config.profiler, config.names);
    let run_dir = profiler.init()?;
    info!(run_dir = %run_dir.display(), "Writing histograms");

    let result = match &config.input {
        Some(path) => match tokio::fs::File::open(path).await {
            Ok(file) => replay(BufReader::new(file), &profiler, shutdown).await,
            Err(e) => Err(e.into()),
        },
        None => replay(BufReader::new(tokio::io::stdin()), &profiler, shutdown).await,
    };

    // Joining the flush worker blocks; keep it off the runtime threads.
    let shutdown_handle = profiler.clone();
    tokio::task::spawn_blocking(move || shutdown_handle.shutdown()).await?;

    let stats = result?;
    info!(
        recorded = stats.recorded,
        skipped = stats.skipped,
        interrupted = stats.interrupted,
        dropped = profiler.dropped_samples(),
        "Replay complete"
    );
    Ok(stats)
}
