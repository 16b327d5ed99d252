// prime.rs
//
// Cache priming.
//
// Reading every file below a mount point makes the cache fetch it from the
// core filer, so the first real workload runs warm. Listing is fanned out
// to a pool of worker threads, one directory per job; the calling thread
// owns the totals, hands the subdirectories each worker reports back to
// the pool and stops once no directory is outstanding.

use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::Result;

const MEGABYTE: usize = 1 << 20;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const COUNT_UNITS: [&str; 5] = ["", "k", "M", "G", "T"];
const BYTE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

#[derive(Debug, Clone)]
pub struct PrimeOptions {
    pub directory: PathBuf,
    pub workers: usize,
    /// How often to report progress; `None` disables it
    pub interval: Option<Duration>,
    pub skip_directories: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PrimeStats {
    pub files: u64,
    /// Sum of file sizes as reported by lstat
    pub size: u64,
    /// Bytes actually read
    pub fsize: u64,
}

impl PrimeStats {
    fn add(&mut self, other: &PrimeStats) {
        self.files += other.files;
        self.size += other.size;
        self.fsize += other.fsize;
    }
}

/// What one worker found in one directory
#[derive(Debug, Default)]
pub struct DirReport {
    pub dirs: Vec<PathBuf>,
    pub stats: PrimeStats,
}

/// Reads `path` to the end in 1 MiB chunks and returns the bytes read.
/// A read error stops early; the count so far is kept.
fn read_file(path: &Path, buf: &mut [u8]) -> u64 {
    let mut f = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!("cannot open {}: {}", path.display(), e);
            return 0;
        }
    };
    let mut total = 0u64;
    loop {
        match f.read(buf) {
            Ok(0) => break,
            Ok(n) => total += n as u64,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!("read of {} stopped after {} bytes: {}", path.display(), total, e);
                break;
            }
        }
    }
    total
}

/// Lists `directory`: symlinks are ignored, subdirectories (minus `skip`) are
/// returned for later, regular files are counted and read.
pub fn process_directory(directory: &Path, skip: &[String], buf: &mut [u8]) -> DirReport {
    let mut report = DirReport::default();

    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("fail: cannot list {}: {}", directory.display(), e);
            return report;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("skipping entry in {}: {}", directory.display(), e);
                continue;
            }
        };
        let path = entry.path();
        // lstat: do not follow links
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!("cannot stat {}: {}", path.display(), e);
                continue;
            }
        };
        let file_type = meta.file_type();

        if file_type.is_symlink() {
            continue;
        } else if file_type.is_dir() {
            let name = entry.file_name();
            if !skip.iter().any(|s| name.to_str() == Some(s.as_str())) {
                report.dirs.push(path);
            }
        } else if file_type.is_file() {
            report.stats.files += 1;
            report.stats.size += meta.len();
            report.stats.fsize += read_file(&path, buf);
        }
    }
    report
}

/// Walks `options.directory` with `options.workers` threads and returns the totals.
/// `progress` is called at most once per `options.interval` with the totals so far.
pub fn prime<F>(options: &PrimeOptions, mut progress: F) -> Result<PrimeStats>
    where F: FnMut(&PrimeStats) {

    let workers = options.workers.max(1);
    let (job_tx, job_rx) = mpsc::channel::<PathBuf>();
    let job_rx = Arc::new(Mutex::new(job_rx));
    let (report_tx, report_rx) = mpsc::channel::<DirReport>();
    let skip = Arc::new(options.skip_directories.clone());

    let mut handles = Vec::with_capacity(workers);
    for id in 0..workers {
        let job_rx = Arc::clone(&job_rx);
        let report_tx = report_tx.clone();
        let skip = Arc::clone(&skip);

        let handle = thread::Builder::new().name(format!("prime-{}", id)).spawn(move || {
            let mut buf = vec![0u8; MEGABYTE];
            loop {
                // the guard is released at the end of the statement, before the directory is processed
                let job = match job_rx.lock() {
                    Ok(rx) => rx.recv(),
                    Err(poisoned) => poisoned.into_inner().recv(),
                };
                let directory = match job {
                    Ok(directory) => directory,
                    Err(_) => break, // queue closed, walk finished
                };
                if report_tx.send(process_directory(&directory, &skip, &mut buf)).is_err() {
                    break;
                }
            }
        })?;
        handles.push(handle);
    }
    // only workers hold senders now, so a disconnect means they are all gone
    drop(report_tx);

    let mut totals = PrimeStats::default();
    let mut outstanding: usize = 0;
    let mut last_check = Instant::now();

    if job_tx.send(options.directory.clone()).is_ok() {
        outstanding += 1;
    }
    while outstanding > 0 {
        match report_rx.recv_timeout(POLL_INTERVAL) {
            Ok(report) => {
                outstanding -= 1;
                for directory in report.dirs {
                    if job_tx.send(directory).is_ok() {
                        outstanding += 1;
                    }
                }
                totals.add(&report.stats);
            }
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => {
                tracing::error!("all prime workers exited with {} directories outstanding", outstanding);
                break;
            }
        }

        if let Some(interval) = options.interval {
            if last_check.elapsed() >= interval {
                progress(&totals);
                last_check = Instant::now();
            }
        }
    }

    drop(job_tx);
    for handle in handles {
        if handle.join().is_err() {
            tracing::warn!("a prime worker panicked");
        }
    }
    Ok(totals)
}

fn scale(value: f64, base: f64, strictly_above: bool, units: &[&str]) -> (f64, usize) {
    let mut value = value;
    let mut unit = 0;
    while unit + 1 < units.len() && (if strictly_above { value > base } else { value >= base }) {
        value /= base;
        unit += 1;
    }
    (value, unit)
}

/// Decimal count, `376226` -> `376.23k`
pub fn format_count(count: u64) -> String {
    let (value, unit) = scale(count as f64, 1000.0, true, &COUNT_UNITS);
    format!("{:.2}{}", value, COUNT_UNITS[unit])
}

/// Binary size, `78524523315` -> `73.13 GB`
pub fn format_bytes(size: u64) -> String {
    let (value, unit) = scale(size as f64, 1024.0, false, &BYTE_UNITS);
    format!("{:.2} {}", value, BYTE_UNITS[unit])
}
