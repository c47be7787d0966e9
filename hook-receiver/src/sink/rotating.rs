//! Size-rotated log file with count/age retention and gzip compression.
//!
//! The active file is appended to until the next entry would push it past
//! the size threshold. It is then renamed to a timestamped backup next to it
//! and a fresh file takes its place:
//!
//! ```text
//! hooks.log                                   active
//! hooks-2024-03-01T12-30-45.123.log.gz        rotated, compressed
//! ```
//!
//! After each rotation, backups beyond the retained count or older than the
//! maximum age are deleted, and any backup still uncompressed is compressed.
//! That cleanup runs after the write lock is released, so other writers keep
//! appending while a rotated file is being gzipped.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{info, warn};

use crate::error::SinkError;
use crate::sink::Sink;

/// Threshold used when a policy asks for a zero-byte limit.
pub const FALLBACK_MAX_SIZE_BYTES: u64 = 10 * 1024 * 1024;

const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";
const COMPRESS_SUFFIX: &str = ".gz";

/// Log rotation configuration.
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    /// Active log file
    pub path: PathBuf,
    /// Size in bytes that triggers rotation
    pub max_size_bytes: u64,
    /// Rotated files to keep (0 keeps all)
    pub max_backups: usize,
    /// Days to keep rotated files (0 disables)
    pub max_age_days: u64,
    /// Gzip rotated files
    pub compress: bool,
}

impl RotationPolicy {
    fn max_size(&self) -> u64 {
        if self.max_size_bytes == 0 {
            FALLBACK_MAX_SIZE_BYTES
        } else {
            self.max_size_bytes
        }
    }
}

/// A rotated file found next to the active log.
#[derive(Debug)]
struct Backup {
    path: PathBuf,
    rotated_at: DateTime<Utc>,
    compressed: bool,
}

struct ActiveFile {
    file: Option<File>,
    size: u64,
}

/// File sink that rotates by size.
///
/// Writes and renames are serialized by one lock; retention and compression
/// are serialized by a second one.
pub struct RotatingFileSink {
    policy: RotationPolicy,
    active: Mutex<ActiveFile>,
    mill_lock: Mutex<()>,
}

impl RotatingFileSink {
    /// Open (or create) the active log file, appending to existing content.
    pub fn open(policy: RotationPolicy) -> Result<Self, SinkError> {
        let (file, size) = open_active(&policy.path)?;
        Ok(Self {
            policy,
            active: Mutex::new(ActiveFile {
                file: Some(file),
                size,
            }),
            mill_lock: Mutex::new(()),
        })
    }

    fn rotate(&self, active: &mut ActiveFile) -> Result<(), SinkError> {
        let path = &self.policy.path;

        // Close before renaming.
        active.file = None;

        let backup = self.next_backup_path(Utc::now());
        fs::rename(path, &backup).map_err(|source| SinkError::Rotate {
            path: path.clone(),
            source,
        })?;

        let (file, size) = open_active(path)?;
        active.file = Some(file);
        active.size = size;

        info!(backup = %backup.display(), "log_file_rotated");
        Ok(())
    }

    /// Backup name for a rotation at `at`.
    ///
    /// The stamp always sorts after every existing backup, so retention never
    /// mistakes the newest rotation for the oldest.
    fn next_backup_path(&self, mut at: DateTime<Utc>) -> PathBuf {
        if let Some(newest) = self.backups().ok().and_then(|b| b.into_iter().next()) {
            if at <= newest.rotated_at {
                at = newest.rotated_at + TimeDelta::milliseconds(1);
            }
        }

        let (prefix, ext) = self.name_parts();
        let dir = self.dir();
        loop {
            let name = format!("{}{}{}", prefix, at.format(BACKUP_TIME_FORMAT), ext);
            let candidate = dir.join(&name);
            let compressed = dir.join(format!("{}{}", name, COMPRESS_SUFFIX));
            if !candidate.exists() && !compressed.exists() {
                return candidate;
            }
            at += TimeDelta::milliseconds(1);
        }
    }

    /// Remove expired backups and compress the survivors.
    ///
    /// Failures here are logged; they never fail the write that triggered them.
    fn mill(&self) {
        let _guard = self.mill_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut keep = match self.backups() {
            Ok(backups) => backups,
            Err(e) => {
                warn!(error = %e, "log_backups_list_failed");
                return;
            }
        };

        let mut expired = Vec::new();

        if self.policy.max_backups > 0 && keep.len() > self.policy.max_backups {
            expired.extend(keep.split_off(self.policy.max_backups));
        }

        if self.policy.max_age_days > 0 {
            let cutoff = i64::try_from(self.policy.max_age_days)
                .ok()
                .and_then(TimeDelta::try_days)
                .and_then(|age| Utc::now().checked_sub_signed(age));
            if let Some(cutoff) = cutoff {
                let (old, fresh): (Vec<_>, Vec<_>) =
                    keep.into_iter().partition(|b| b.rotated_at < cutoff);
                expired.extend(old);
                keep = fresh;
            }
        }

        for backup in &expired {
            if let Err(e) = fs::remove_file(&backup.path) {
                warn!(path = %backup.path.display(), error = %e, "log_backup_remove_failed");
            }
        }

        if self.policy.compress {
            for backup in keep.iter().filter(|b| !b.compressed) {
                if let Err(e) = compress_file(&backup.path) {
                    warn!(error = %e, "log_backup_compress_failed");
                }
            }
        }
    }

    /// Rotated files for this log, newest first.
    fn backups(&self) -> io::Result<Vec<Backup>> {
        let (prefix, ext) = self.name_parts();
        let mut backups = Vec::new();

        for dir_entry in fs::read_dir(self.dir())? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            let (base, compressed) = match name.strip_suffix(COMPRESS_SUFFIX) {
                Some(base) => (base, true),
                None => (name.as_str(), false),
            };
            let Some(stamp) = base
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_suffix(ext.as_str()))
            else {
                continue;
            };
            if let Ok(rotated_at) = NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT) {
                backups.push(Backup {
                    path: dir_entry.path(),
                    rotated_at: rotated_at.and_utc(),
                    compressed,
                });
            }
        }

        backups.sort_by(|a, b| b.rotated_at.cmp(&a.rotated_at));
        Ok(backups)
    }

    fn dir(&self) -> PathBuf {
        match self.policy.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Backup name pieces: `hooks.log` → (`hooks-`, `.log`).
    fn name_parts(&self) -> (String, String) {
        let stem = self
            .policy
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .policy
            .path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (format!("{}-", stem), ext)
    }
}

impl Sink for RotatingFileSink {
    fn write(&self, line: &[u8]) -> Result<(), SinkError> {
        let rotated = {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            let len = line.len() as u64;

            if active.file.is_none() {
                // A previous rotation failed half way; start over on the active path.
                let (file, size) = open_active(&self.policy.path)?;
                active.file = Some(file);
                active.size = size;
            }

            // An entry larger than the threshold still lands in a fresh file.
            let rotated = active.size > 0 && active.size + len > self.policy.max_size();
            if rotated {
                self.rotate(&mut active)?;
            }

            let file = active
                .file
                .as_mut()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "log file not open"))?;
            file.write_all(line)?;
            active.size += len;
            rotated
        };

        if rotated {
            self.mill();
        }
        Ok(())
    }
}

fn open_active(path: &Path) -> Result<(File, u64), SinkError> {
    let open_err = |source| SinkError::Open {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(open_err)?;
    }

    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }

    let file = options.open(path).map_err(open_err)?;
    let size = file.metadata().map_err(open_err)?.len();
    Ok((file, size))
}

/// Gzip `path` into `path.gz` and remove the original.
fn compress_file(path: &Path) -> Result<(), SinkError> {
    let compress_err = |source| SinkError::Compress {
        path: path.to_path_buf(),
        source,
    };

    let mut target = path.as_os_str().to_owned();
    target.push(COMPRESS_SUFFIX);
    let target = PathBuf::from(target);

    let mut reader = BufReader::new(File::open(path).map_err(compress_err)?);
    let output = File::create(&target).map_err(compress_err)?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut reader, &mut encoder).map_err(compress_err)?;
    let output = encoder.finish().map_err(compress_err)?;
    output.sync_all().map_err(compress_err)?;

    fs::remove_file(path).map_err(compress_err)?;
    Ok(())
}
