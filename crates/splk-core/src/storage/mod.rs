//! Cold storage - gzip-framed JSONL archive for anything the Kernel
//! garbage-collects, plus recompilation of a fresh in-memory state from
//! the archive.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SplkError};

/// One archived record. `kind` discriminates what `payload` holds
/// (`"interaction"`, `"signal"`, `"hypothesis"`, `"rule"`) so
/// `recompile_brain` can dispatch without a second file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub kind: String,
    pub reason: String,
    pub archived_at: chrono::DateTime<Utc>,
    pub payload: Value,
}

/// Summary of a `recompile_brain` pass, surfaced to callers so they can
/// log or alert on unexpectedly large recoveries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecompileReport {
    pub entries_read: usize,
    pub rules_recovered: usize,
    pub hypotheses_recovered: usize,
    pub truncated_lines_skipped: usize,
}

pub struct ColdStorage {
    stem: PathBuf,
    max_bytes: u64,
}

impl ColdStorage {
    /// `stem` is a file path without extension; the active file is
    /// `<stem>.jsonl.gz`, and rotated files are
    /// `<stem>_<YYYYMMDD_HHMMSS>.jsonl.gz`.
    pub fn new(stem: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            stem: stem.into(),
            max_bytes,
        }
    }

    fn active_path(&self) -> PathBuf {
        self.stem.with_extension("jsonl.gz")
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.active_path().parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn rotate_if_needed(&self) -> Result<()> {
        let path = self.active_path();
        if !path.exists() {
            return Ok(());
        }
        let size = fs::metadata(&path)?.len();
        if size < self.max_bytes {
            return Ok(());
        }
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let rotated = self
            .stem
            .with_file_name(format!(
                "{}_{stamp}.jsonl.gz",
                self.stem.file_name().and_then(|s| s.to_str()).unwrap_or("archive")
            ));
        fs::rename(&path, rotated)?;
        Ok(())
    }

    fn append(&self, kind: &str, reason: &str, payload: Value) -> Result<()> {
        self.ensure_parent()?;
        self.rotate_if_needed()?;
        let entry = ArchiveEntry {
            kind: kind.to_string(),
            reason: reason.to_string(),
            archived_at: Utc::now(),
            payload,
        };
        let line = serde_json::to_string(&entry)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.active_path())?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(line.as_bytes())?;
        encoder.write_all(b"\n")?;
        encoder.finish()?;
        Ok(())
    }

    pub fn archive_interaction(&self, log: &crate::types::InteractionLog, reason: &str) -> Result<()> {
        self.append("interaction", reason, serde_json::to_value(log)?)
    }

    pub fn archive_signal(&self, signal: &crate::types::Signal, reason: &str) -> Result<()> {
        self.append("signal", reason, serde_json::to_value(signal)?)
    }

    pub fn archive_hypothesis(&self, hypothesis: &crate::types::Hypothesis, reason: &str) -> Result<()> {
        self.append("hypothesis", reason, serde_json::to_value(hypothesis)?)
    }

    pub fn archive_rule(&self, rule: &crate::types::ScopedRule, reason: &str) -> Result<()> {
        self.append("rule", reason, serde_json::to_value(rule)?)
    }

    /// Read every archived entry across the active file and any rotated
    /// siblings in the same directory, tolerating a truncated final line
    /// in a file that was written to mid-crash.
    ///
    /// Each `append` finishes its own `GzEncoder`, so a file with more than
    /// one entry is a concatenation of independent gzip members; a
    /// single-member `GzDecoder` would silently stop after the first one,
    /// so this reads through all of them with `MultiGzDecoder`.
    pub fn read_entries(&self) -> Result<(Vec<ArchiveEntry>, usize)> {
        let mut entries = Vec::new();
        let mut skipped = 0;

        for path in self.archive_files()? {
            let file = File::open(&path)?;
            let decoder = MultiGzDecoder::new(file);
            let reader = BufReader::new(decoder);
            for line in reader.lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(_) => {
                        skipped += 1;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ArchiveEntry>(&line) {
                    Ok(entry) => entries.push(entry),
                    Err(_) => skipped += 1,
                }
            }
        }
        Ok((entries, skipped))
    }

    fn archive_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let active = self.active_path();
        if active.exists() {
            files.push(active);
        }
        if let Some(dir) = self.stem.parent() {
            if dir.exists() {
                let prefix = self
                    .stem
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or("archive")
                    .to_string();
                for entry in fs::read_dir(dir)? {
                    let entry = entry?;
                    let name = entry.file_name();
                    let name = name.to_string_lossy();
                    if name.starts_with(&format!("{prefix}_")) && name.ends_with(".jsonl.gz") {
                        files.push(entry.path());
                    }
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Replay every archived rule and hypothesis into a fresh kernel,
    /// restoring whatever the garbage collector evicted. Entries whose
    /// `payload` no longer deserializes into the current schema are
    /// counted in `truncated_lines_skipped` rather than failing the pass.
    pub fn recompile_brain(&self, kernel: &crate::kernel::Kernel) -> Result<RecompileReport> {
        let (entries, truncated) = self.read_entries()?;
        let mut report = RecompileReport {
            entries_read: entries.len(),
            truncated_lines_skipped: truncated,
            ..Default::default()
        };

        for entry in entries {
            match entry.kind.as_str() {
                "rule" => match serde_json::from_value::<crate::types::ScopedRule>(entry.payload) {
                    Ok(rule) => {
                        kernel.restore_rule(rule);
                        report.rules_recovered += 1;
                    }
                    Err(_) => report.truncated_lines_skipped += 1,
                },
                "hypothesis" => {
                    match serde_json::from_value::<crate::types::Hypothesis>(entry.payload) {
                        Ok(hyp) => {
                            kernel.restore_hypothesis(hyp);
                            report.hypotheses_recovered += 1;
                        }
                        Err(_) => report.truncated_lines_skipped += 1,
                    }
                }
                _ => {}
            }
        }
        Ok(report)
    }
}

/// Guard against an archive path outside any writable root, surfaced as a
/// validation error rather than a raw IO failure.
pub fn validate_archive_root(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(SplkError::Validation("archive path must not be empty".into()));
    }
    Ok(())
}
