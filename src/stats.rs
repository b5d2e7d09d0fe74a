//! Throughput display and the cross-restart tested-key counter.

use log::warn;
use std::fs;
use std::io::{self, stdout, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Incremented by every worker, read and reset by the reporter. The display
/// counter resets each reporting tick, the persisted counter only when its
/// value has been merged into the stats file.
#[derive(Default)]
pub struct Counters {
    display: AtomicU64,
    persisted: AtomicU64,
}

impl Counters {
    pub fn record_key(&self) {
        self.display.fetch_add(1, Ordering::Relaxed);
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    fn take_display(&self) -> u64 {
        self.display.swap(0, Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn record_keys(&self, n: u64) {
        self.display.fetch_add(n, Ordering::Relaxed);
        self.persisted.fetch_add(n, Ordering::Relaxed);
    }
}

/// Keys per second over the tick, zero when no time has passed.
pub fn throughput(count: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64();
    if seconds == 0.0 {
        return 0.0;
    }
    count as f64 / seconds
}

pub const REPORT_INTERVAL: Duration = Duration::from_millis(200);

/// Keys accumulated before the persisted counter is merged to disk.
pub const FLUSH_THRESHOLD: u64 = 1_000_000;

const STATS_SUFFIX: &str = " tested keys";

/// Runs on the coordinating thread. Prints a `\r`-overwritten status line
/// every tick and periodically folds the persisted counter into the stats
/// file, which survives restarts.
pub struct StatsReporter {
    counters: Arc<Counters>,
    stats_path: PathBuf,
    last_tick: Instant,
}

impl StatsReporter {
    pub fn new(counters: Arc<Counters>, stats_path: PathBuf) -> Self {
        Self {
            counters,
            stats_path,
            last_tick: Instant::now(),
        }
    }

    pub fn run(mut self) -> ! {
        loop {
            thread::sleep(REPORT_INTERVAL);
            let elapsed = self.last_tick.elapsed();
            self.last_tick = Instant::now();
            let speed = throughput(self.counters.take_display(), elapsed);
            if let Err(e) = self.maybe_flush() {
                warn!("cannot update {}: {e}", self.stats_path.display());
            }
            print!("\r{speed:.0} keys/s             ");
            let _ = stdout().flush();
        }
    }

    fn maybe_flush(&self) -> io::Result<()> {
        if self.counters.persisted.load(Ordering::Relaxed) < FLUSH_THRESHOLD {
            return Ok(());
        }
        self.flush()
    }

    /// Merges the persisted counter into the stats file and resets it. The
    /// pending count is restored on failure rather than lost.
    pub fn flush(&self) -> io::Result<()> {
        let pending = self.counters.persisted.swap(0, Ordering::Relaxed);
        if let Err(e) = self.merge(pending) {
            self.counters.persisted.fetch_add(pending, Ordering::Relaxed);
            return Err(e);
        }
        Ok(())
    }

    fn merge(&self, pending: u64) -> io::Result<()> {
        let total = read_persisted_total(&self.stats_path)? + pending;
        fs::write(&self.stats_path, format!("{total}{STATS_SUFFIX}"))
    }
}

/// Prior total from the stats file: the leading run of decimal digits on
/// the first line, wherever it starts. A missing, empty or non-numeric
/// file counts as zero.
fn read_persisted_total(path: &Path) -> io::Result<u64> {
    let contents = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let first_line = contents.lines().next().unwrap_or("");
    let digits: String = first_line
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    Ok(digits.parse().unwrap_or(0))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::Path;

    fn temp_stats_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("walletminer-test-{}-{name}", std::process::id()))
    }

    fn reporter_with(path: &Path, pending: u64) -> StatsReporter {
        let counters = Arc::new(Counters::default());
        counters.record_keys(pending);
        StatsReporter::new(counters, path.to_path_buf())
    }

    #[test]
    fn zero_elapsed_reports_zero() {
        assert_eq!(throughput(1000, Duration::ZERO), 0.0);
        assert_eq!(throughput(1000, Duration::from_secs(2)), 500.0);
    }

    #[test]
    fn flush_merges_prior_total() {
        let path = temp_stats_path("merge");
        fs::write(&path, "500 tested keys").unwrap();
        let reporter = reporter_with(&path, 600_000);
        reporter.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "600500 tested keys");
        assert_eq!(reporter.counters.persisted.load(Ordering::Relaxed), 0);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn flush_creates_missing_file() {
        let path = temp_stats_path("create");
        let _ = fs::remove_file(&path);
        let reporter = reporter_with(&path, 42);
        reporter.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "42 tested keys");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn repeated_flushes_accumulate() {
        let path = temp_stats_path("accumulate");
        let _ = fs::remove_file(&path);
        let reporter = reporter_with(&path, 10);
        reporter.flush().unwrap();
        reporter.counters.record_keys(5);
        reporter.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "15 tested keys");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn prior_total_parsing() {
        let path = temp_stats_path("parsing");
        for (contents, expected) in [
            ("500 tested keys", 500),
            ("500", 500),
            ("  1234 whatever", 1234),
            ("no digits at all", 0),
            ("", 0),
        ] {
            fs::write(&path, contents).unwrap();
            assert_eq!(read_persisted_total(&path).unwrap(), expected, "{contents:?}");
        }
        fs::remove_file(&path).unwrap();
        assert_eq!(read_persisted_total(&path).unwrap(), 0);
    }

    #[test]
    fn below_threshold_does_not_touch_the_file() {
        let path = temp_stats_path("threshold");
        let _ = fs::remove_file(&path);
        let reporter = reporter_with(&path, FLUSH_THRESHOLD - 1);
        reporter.maybe_flush().unwrap();
        assert!(!path.exists());
        reporter.counters.record_keys(1);
        reporter.maybe_flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1000000 tested keys");
        fs::remove_file(&path).unwrap();
    }
}
