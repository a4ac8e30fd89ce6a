//! Cross-process guard for a knowledge base file.
//!
//! Writers in one process are serialized by the store; across processes the
//! last atomic rename would silently drop the other process's answers. The
//! guard is a `.teachbot.lock` file holding the owner's PID, created with
//! `create_new` so exactly one process can win it.

use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE_NAME: &str = ".teachbot.lock";

/// Exclusive claim on a knowledge base directory, released on drop.
#[derive(Debug)]
pub struct ProcessLock {
    lock_path: PathBuf,
    held: bool,
}

/// What an existing lock file says about its owner.
#[derive(Debug, PartialEq, Eq)]
enum Holder {
    Live(u32),
    /// Created but the PID is not written yet.
    Claiming,
    Stale(u32),
    Unreadable(String),
    /// Removed between our failed create and the read.
    Gone,
}

impl ProcessLock {
    /// Lock the directory holding the knowledge base file at `kb_path`.
    pub fn for_knowledge_base(kb_path: &Path) -> Result<Self> {
        let dir = match kb_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Self::acquire(dir)
    }

    /// Lock `data_dir`, failing if a live process already holds it.
    ///
    /// A stale or unreadable lock is cleared once and creation retried; if
    /// someone else wins that retry the call fails.
    pub fn acquire<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let lock_path = data_dir.join(LOCK_FILE_NAME);
        let pid = std::process::id();

        for attempt in 0..2 {
            if create_exclusive(&lock_path, pid)? {
                tracing::debug!(pid, path = %lock_path.display(), "Acquired process lock");
                return Ok(Self {
                    lock_path,
                    held: true,
                });
            }

            match inspect(&lock_path) {
                Holder::Live(owner) => bail!(
                    "Another teachbot instance is using this knowledge base (PID: {owner})\n\
                     \n\
                     Stop the other instance, or if none is running remove the lock file:\n\
                     \x20   rm {}",
                    lock_path.display()
                ),
                Holder::Claiming => bail!(
                    "Another teachbot instance is acquiring {}",
                    lock_path.display()
                ),
                Holder::Gone => {}
                Holder::Stale(owner) if attempt == 0 => {
                    tracing::info!(owner, path = %lock_path.display(), "Clearing stale lock file");
                    clear(&lock_path)?;
                }
                Holder::Unreadable(reason) if attempt == 0 => {
                    tracing::warn!(%reason, path = %lock_path.display(), "Replacing unreadable lock file");
                    clear(&lock_path)?;
                }
                Holder::Stale(_) | Holder::Unreadable(_) => break,
            }
        }

        bail!(
            "Could not acquire {}: it was taken again while clearing a stale lock",
            lock_path.display()
        )
    }

    /// Remove the lock file now instead of on drop.
    pub fn release(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        match fs::remove_file(&self.lock_path) {
            Ok(()) => tracing::debug!(path = %self.lock_path.display(), "Released process lock"),
            Err(e) => tracing::warn!(error = %e, "Failed to remove lock file"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// `Ok(false)` when the lock file already exists.
fn create_exclusive(lock_path: &Path, pid: u32) -> Result<bool> {
    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(lock_path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to create lock file {}", lock_path.display()))
        }
    };

    let written = file
        .write_all(format!("{pid}\n").as_bytes())
        .and_then(|()| file.sync_all());
    if let Err(e) = written {
        let _ = fs::remove_file(lock_path);
        return Err(e).context("Failed to write PID to lock file");
    }
    Ok(true)
}

fn inspect(lock_path: &Path) -> Holder {
    let contents = match fs::read_to_string(lock_path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Holder::Gone,
        Err(e) => return Holder::Unreadable(e.to_string()),
    };

    let text = contents.trim();
    if text.is_empty() {
        return Holder::Claiming;
    }
    match text.parse::<u32>() {
        Ok(pid) if is_running(pid) => Holder::Live(pid),
        Ok(pid) => Holder::Stale(pid),
        Err(_) => Holder::Unreadable(format!("not a PID: {text:?}")),
    }
}

fn clear(lock_path: &Path) -> Result<()> {
    match fs::remove_file(lock_path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e)
            .with_context(|| format!("Failed to remove lock file {}", lock_path.display())),
        _ => Ok(()),
    }
}

/// True if `pid` is this process or a live teachbot process.
#[cfg(unix)]
fn is_running(pid: u32) -> bool {
    pid == std::process::id()
        || fs::read_to_string(format!("/proc/{pid}/cmdline"))
            .map_or(false, |cmdline| cmdline.contains("teachbot"))
}

#[cfg(not(unix))]
fn is_running(_pid: u32) -> bool {
    // No cheap liveness check; treat the lock as held
    true
}
