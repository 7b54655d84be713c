//! In-memory acquisition log with whole-second timestamps.
//!
//! Records accumulate for the life of the session and are only written out
//! on `flush_to`, one tab-separated `elapsed primary secondary` row per line.
//! A failed flush keeps every record so the operator can retry elsewhere.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use evap_traits::Clock;
use tracing::{debug, info};

use crate::error::{EvapError, EvapResult};
use crate::util::round_secs;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRecord {
    /// Seconds since session start, rounded to nearest.
    pub elapsed_seconds: u64,
    pub primary: f64,
    pub secondary: f64,
}

impl SampleRecord {
    /// Field-wise equality that treats two NaNs as equal.
    pub fn same_as(&self, other: &SampleRecord) -> bool {
        fn eq(a: f64, b: f64) -> bool {
            a == b || (a.is_nan() && b.is_nan())
        }
        self.elapsed_seconds == other.elapsed_seconds
            && eq(self.primary, other.primary)
            && eq(self.secondary, other.secondary)
    }
}

pub struct SampleLog {
    clock: Arc<dyn Clock + Send + Sync>,
    session_start: Instant,
    records: Vec<SampleRecord>,
}

impl SampleLog {
    /// Start a log whose epoch is `clock.now()`.
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let session_start = clock.now();
        Self {
            clock,
            session_start,
            records: Vec::new(),
        }
    }

    pub fn session_start(&self) -> Instant {
        self.session_start
    }

    pub fn append(&mut self, primary: f64, secondary: f64) -> SampleRecord {
        let rec = SampleRecord {
            elapsed_seconds: round_secs(self.clock.elapsed_since(self.session_start)),
            primary,
            secondary,
        };
        self.records.push(rec);
        rec
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write every record to `path`, replacing it atomically.
    pub fn flush_to(&self, path: &Path) -> EvapResult<()> {
        let bytes = encode(&self.records)?;
        write_atomic(path, &bytes)
            .map_err(|e| EvapError::Io(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), records = self.records.len(), "sample log written");
        Ok(())
    }

    /// Read back a file produced by `flush_to`.
    ///
    /// Columns may be separated by any whitespace; blank lines are skipped.
    pub fn load(path: &Path) -> EvapResult<Vec<SampleRecord>> {
        let text = fs::read_to_string(path)
            .map_err(|e| EvapError::Io(format!("{}: {e}", path.display())))?;
        let mut out = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.is_empty() {
                continue;
            }
            let bad = || EvapError::Io(format!("{}:{}: malformed row {line:?}", path.display(), idx + 1));
            let [elapsed, primary, secondary] = cols.as_slice() else {
                return Err(bad());
            };
            out.push(SampleRecord {
                elapsed_seconds: elapsed.parse().map_err(|_| bad())?,
                primary: primary.parse().map_err(|_| bad())?,
                secondary: secondary.parse().map_err(|_| bad())?,
            });
        }
        debug!(path = %path.display(), records = out.len(), "sample log loaded");
        Ok(out)
    }
}

impl core::fmt::Debug for SampleLog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SampleLog")
            .field("records", &self.records.len())
            .finish()
    }
}

fn encode(records: &[SampleRecord]) -> EvapResult<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(records.len() * 24));
    for r in records {
        wtr.write_record([
            r.elapsed_seconds.to_string(),
            r.primary.to_string(),
            r.secondary.to_string(),
        ])
        .map_err(|e| EvapError::Io(e.to_string()))?;
    }
    wtr.into_inner().map_err(|e| EvapError::Io(e.to_string()))
}

/// Stage in a uniquely named sibling, then rename over `path`. The staging
/// file is removed if any step fails.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use evap_traits::ManualClock;
    use std::time::Duration;

    #[test]
    fn elapsed_rounds_to_nearest_second() {
        let clock = ManualClock::new();
        let mut log = SampleLog::new(Arc::new(clock.clone()));
        log.append(1.0, 2.0);
        clock.advance(Duration::from_millis(1499));
        log.append(1.0, 2.0);
        clock.advance(Duration::from_millis(2));
        log.append(1.0, 2.0);
        let elapsed: Vec<u64> = log.records().iter().map(|r| r.elapsed_seconds).collect();
        assert_eq!(elapsed, vec![0, 1, 2]);
    }

    #[test]
    fn encode_is_tab_separated_lines() {
        let recs = [
            SampleRecord { elapsed_seconds: 0, primary: 1.5, secondary: 3.0 },
            SampleRecord { elapsed_seconds: 2, primary: f64::NAN, secondary: -0.25 },
        ];
        let text = String::from_utf8(encode(&recs).unwrap()).unwrap();
        assert_eq!(text, "0\t1.5\t3\n2\tNaN\t-0.25\n");
    }

    #[test]
    fn flush_leaves_siblings_alone_and_no_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let sibling = dir.path().join("run.new");
        fs::write(&sibling, "keep me").unwrap();
        let target = dir.path().join("run.dat");

        let mut log = SampleLog::new(Arc::new(ManualClock::new()));
        log.append(40.0, 5.0);
        log.flush_to(&target).unwrap();
        log.flush_to(&target).unwrap();

        assert_eq!(fs::read_to_string(&sibling).unwrap(), "keep me");
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["run.dat", "run.new"]);
        assert_eq!(SampleLog::load(&target).unwrap().len(), 1);
    }
}
