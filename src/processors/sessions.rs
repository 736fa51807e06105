//! Session discovery and task assignment.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::config::TaskSpec;

/// Errors that can occur while walking sessions.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("found {sessions} session directories but {tasks} tasks are declared")]
    TaskCountMismatch { sessions: usize, tasks: usize },

    #[error("session directory '{0}' has no task declared")]
    UndeclaredSession(String),

    #[error("task for session '{0}' has no matching directory")]
    MissingSession(String),

    #[error("file name '{name}' does not contain a device ID before date token '{date}'")]
    DeviceIdNotFound { name: String, date: String },
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// A session directory paired with the task recorded in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    pub session: String,
    pub path: PathBuf,
    pub task: String,
    pub run: u32,
}

fn read_sorted(dir: &Path, want_dirs: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SessionError::DirectoryNotFound(dir.to_path_buf()));
    }

    let read_error = |e| SessionError::ReadDir {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        let keep = if want_dirs { path.is_dir() } else { path.is_file() };
        if keep {
            entries.push(path);
        }
    }

    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// List session directories under `root`, sorted by name.
///
/// Plain files next to the session folders are ignored.
pub fn list_sessions(root: &Path) -> Result<Vec<PathBuf>> {
    read_sorted(root, true)
}

/// List device exports inside a session directory, sorted by name.
///
/// Hidden files (names starting with '.') are skipped.
pub fn list_device_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let files = read_sorted(dir, false)?;
    Ok(files
        .into_iter()
        .filter(|path| !file_name(path).starts_with('.'))
        .collect())
}

/// Extract the device ID from an export file name.
///
/// Exports are named `<device>_<date>_<vendor suffix>.csv`; the ID is the
/// text before the date token with its trailing separator removed.
///
/// # Examples
///
/// ```
/// use movella_bids::processors::sessions::device_id_from_file_name;
///
/// let id = device_id_from_file_name("3_20240729_101501.csv", "20240729").unwrap();
/// assert_eq!(id, "3");
/// ```
pub fn device_id_from_file_name(name: &str, date: &str) -> Result<String> {
    let not_found = || SessionError::DeviceIdNotFound {
        name: name.to_string(),
        date: date.to_string(),
    };

    let (prefix, _) = name.split_once(date).ok_or_else(not_found)?;

    let mut chars = prefix.chars();
    chars.next_back();
    let id = chars.as_str();

    if id.is_empty() {
        return Err(not_found());
    }
    Ok(id.to_string())
}

/// Pair each session directory with a task.
///
/// When every task names a session, pairing is by directory name and any
/// unmatched directory or task is an error. Otherwise pairing is by sorted
/// position and the counts must be equal; nothing is truncated.
///
/// # Arguments
///
/// * `sessions` - Session directories, sorted
/// * `tasks` - Declared tasks
pub fn assign_tasks(sessions: &[PathBuf], tasks: &[TaskSpec]) -> Result<Vec<SessionPlan>> {
    if !TaskSpec::all_keyed(tasks) {
        if sessions.len() != tasks.len() {
            return Err(SessionError::TaskCountMismatch {
                sessions: sessions.len(),
                tasks: tasks.len(),
            });
        }

        return Ok(sessions
            .iter()
            .zip(tasks)
            .map(|(path, task)| SessionPlan {
                session: file_name(path),
                path: path.clone(),
                task: task.name.clone(),
                run: task.run,
            })
            .collect());
    }

    let by_name: HashMap<String, &PathBuf> =
        sessions.iter().map(|path| (file_name(path), path)).collect();

    for task in tasks {
        if let Some(session) = &task.session {
            if !by_name.contains_key(session) {
                return Err(SessionError::MissingSession(session.clone()));
            }
        }
    }

    let mut plans = Vec::with_capacity(sessions.len());
    for path in sessions {
        let name = file_name(path);
        let task = tasks
            .iter()
            .find(|t| t.session.as_deref() == Some(name.as_str()))
            .ok_or_else(|| SessionError::UndeclaredSession(name.clone()))?;

        debug!("Session {} -> task {} run {}", name, task.name, task.run);
        plans.push(SessionPlan {
            session: name,
            path: path.clone(),
            task: task.name.clone(),
            run: task.run,
        });
    }

    Ok(plans)
}
