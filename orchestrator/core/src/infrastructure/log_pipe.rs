// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `LogPipe` — follows a container's log stream into a rotating
//! per-container file set and serves bounded tail reads.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bollard::container::LogsOptions;
use bollard::Docker;
use chrono::Utc;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::SupervisorConfig;

pub struct LogPipe {
    docker: Docker,
    container_name: String,
    log_dir: PathBuf,
    max_size_bytes: u64,
    max_files: u32,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl LogPipe {
    pub fn new(docker: Docker, container_name: String, config: &SupervisorConfig) -> Self {
        Self {
            docker,
            container_name,
            log_dir: config.log_dir.clone(),
            max_size_bytes: config.log_max_size_bytes(),
            max_files: config.log_max_files,
            running: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    fn current_log_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}-1.log", self.container_name))
    }

    fn history_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}-log-history.txt", self.container_name))
    }

    fn write_banner(&self, label: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.log_dir)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_log_path())?;
        writeln!(file, "=== {label} {} ===", Utc::now().to_rfc3339())
    }

    /// Opens the follow=true logs endpoint and appends payload text to the
    /// current rotation file.
    pub fn start_streaming(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.write_banner("log stream opened") {
            warn!(error = %e, "failed to write log open banner");
        }

        let docker = self.docker.clone();
        let container_name = self.container_name.clone();
        let log_path = self.current_log_path();
        let rotated_prefix = self.container_name.clone();
        let log_dir = self.log_dir.clone();
        let max_size = self.max_size_bytes;
        let max_files = self.max_files;
        let running = self.running.clone();

        let handle = tokio::spawn(async move {
            let options = Some(LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                timestamps: true,
                ..Default::default()
            });

            let mut stream = docker.logs(&container_name, options);
            while running.load(Ordering::SeqCst) {
                match stream.next().await {
                    Some(Ok(output)) => {
                        let text = String::from_utf8_lossy(output.into_bytes().as_ref()).to_string();
                        if let Err(e) = append_with_rotation(&log_path, &text, max_size, &log_dir, &rotated_prefix, max_files) {
                            warn!(error = %e, "failed to write log line");
                        }
                    }
                    Some(Err(e)) => {
                        warn!(container = %container_name, error = %e, "log stream error, stopping");
                        break;
                    }
                    None => break,
                }
            }
        });

        self.task = Some(handle);
    }

    pub fn stop_streaming(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Err(e) = self.write_banner("log stream closed") {
            warn!(error = %e, "failed to write log close banner");
        }
    }

    /// Newest-to-oldest by numeric suffix, last `n_lines` non-empty lines
    /// overall.
    pub fn get_recent(&self, n_lines: usize) -> String {
        read_recent_lines(&self.log_dir, &self.container_name, self.max_files, n_lines)
    }

    /// Deletes all log files and the history file.
    pub fn cleanup(&self) {
        for index in 1..=self.max_files.max(1) {
            let path = self.log_dir.join(format!("{}-{index}.log", self.container_name));
            let _ = std::fs::remove_file(path);
        }
        let _ = std::fs::remove_file(self.history_path());
    }
}

/// Append `text` to `path`, rotating according to size-threshold policy
/// before the write would exceed `max_size`.
fn append_with_rotation(
    path: &Path,
    text: &str,
    max_size: u64,
    log_dir: &Path,
    container_name: &str,
    max_files: u32,
) -> std::io::Result<()> {
    let current_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if current_size + text.len() as u64 > max_size && current_size > 0 {
        rotate(log_dir, container_name, max_files)?;
    }

    std::fs::create_dir_all(log_dir)?;
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    Ok(())
}

/// Read files oldest-index-last (`<name>-1.log` is newest) and return the
/// last `n_lines` non-empty lines across all of them, in file order.
fn read_recent_lines(log_dir: &Path, container_name: &str, max_files: u32, n_lines: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    for index in 1..=max_files.max(1) {
        let path = log_dir.join(format!("{container_name}-{index}.log"));
        if let Ok(file) = std::fs::File::open(&path) {
            for line in BufReader::new(file).lines().map_while(Result::ok) {
                if !line.trim().is_empty() {
                    lines.push(line);
                }
            }
        }
    }
    let start = lines.len().saturating_sub(n_lines);
    lines[start..].join("\n")
}

fn rotate(log_dir: &Path, container_name: &str, max_files: u32) -> std::io::Result<()> {
    for index in (1..max_files).rev() {
        let from = log_dir.join(format!("{container_name}-{index}.log"));
        let to = log_dir.join(format!("{container_name}-{}.log", index + 1));
        if from.exists() {
            std::fs::rename(from, to)?;
        }
    }
    let oldest = log_dir.join(format!("{container_name}-{max_files}.log"));
    let _ = std::fs::remove_file(oldest);

    append_rotation_history(log_dir, container_name)
}

/// Appends a dated entry to `<container_name>-log-history.txt`, the
/// rotation bookkeeping file `cleanup` deletes alongside the numbered logs.
fn append_rotation_history(log_dir: &Path, container_name: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let path = log_dir.join(format!("{container_name}-log-history.txt"));
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "=== rotated {} ===", Utc::now().to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rotation_renames_and_caps_retained_files() {
        let dir = tempdir().unwrap();
        let name = "test-container";
        std::fs::write(dir.path().join(format!("{name}-1.log")), "old content").unwrap();

        rotate(dir.path(), name, 2).unwrap();

        assert!(dir.path().join(format!("{name}-2.log")).exists());
        assert!(!dir.path().join(format!("{name}-1.log")).exists());
    }

    #[test]
    fn rotation_appends_a_history_entry_per_call() {
        let dir = tempdir().unwrap();
        let name = "test-container";
        std::fs::write(dir.path().join(format!("{name}-1.log")), "old content").unwrap();

        rotate(dir.path(), name, 2).unwrap();
        rotate(dir.path(), name, 2).unwrap();

        let history = std::fs::read_to_string(dir.path().join(format!("{name}-log-history.txt"))).unwrap();
        assert_eq!(history.lines().count(), 2);
        assert!(history.lines().all(|line| line.starts_with("=== rotated ")));
    }

    #[test]
    fn append_with_rotation_creates_file_and_appends_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("svc-1.log");
        append_with_rotation(&path, "hello world", 1024, dir.path(), "svc", 2).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "hello world\n");
    }

    #[test]
    fn get_recent_trims_to_requested_line_count() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("svc-1.log"), "a\nb\nc\n").unwrap();
        let recent = read_recent_lines(dir.path(), "svc", 2, 2);
        assert_eq!(recent, "b\nc");
    }

    #[test]
    fn get_recent_skips_blank_lines() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("svc-1.log"), "a\n\nb\n\n").unwrap();
        let recent = read_recent_lines(dir.path(), "svc", 2, 10);
        assert_eq!(recent, "a\nb");
    }
}
