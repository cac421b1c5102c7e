use crate::error::AppError;
use crate::model::{ActionLogEntry, Task, TaskDraft, TaskStatus, User};
use crate::storage::{BoardState, RecordStore, WriteOutcome};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use time::OffsetDateTime;

pub const SCHEMA_VERSION: u32 = 1;
pub const STORE_ENV_VAR: &str = "TASKBOARD_STORE_PATH";
const STORE_FILE_NAME: &str = "board.json";

#[derive(Debug, Serialize, Deserialize)]
struct StoredBoard {
    schema_version: u32,
    #[serde(flatten)]
    state: BoardState,
}

pub fn default_store_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("taskboard").join(STORE_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("taskboard")
            .join(STORE_FILE_NAME))
    }
}

pub fn load_state(path: &Path) -> Result<BoardState, AppError> {
    if !path.exists() {
        return Ok(BoardState::default());
    }

    let content = std::fs::read_to_string(path).map_err(|err| AppError::io(err.to_string()))?;
    let stored: StoredBoard =
        serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))?;

    if !(1..=SCHEMA_VERSION).contains(&stored.schema_version) {
        return Err(AppError::invalid_data("schema_version mismatch"));
    }

    let mut seen = HashSet::new();
    if let Some(duplicate) = stored
        .state
        .tasks
        .iter()
        .find(|task| !seen.insert(task.id.as_str()))
    {
        return Err(AppError::invalid_data(format!(
            "duplicate task id {}",
            duplicate.id
        )));
    }

    Ok(stored.state)
}

fn store_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Writes the whole board to a sibling temp file and renames it over `path`,
/// so readers see either the old board or the new one.
pub fn save_state(path: &Path, state: &BoardState) -> Result<(), AppError> {
    let dir = store_dir(path);
    std::fs::create_dir_all(dir).map_err(|err| AppError::store(err.to_string()))?;

    let stored = StoredBoard {
        schema_version: SCHEMA_VERSION,
        state: state.clone(),
    };
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;

    let mut staged = NamedTempFile::new_in(dir).map_err(|err| AppError::store(err.to_string()))?;
    staged
        .write_all(content.as_bytes())
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|err| AppError::store(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        staged
            .as_file()
            .set_permissions(permissions)
            .map_err(|err| AppError::store(err.to_string()))?;
    }

    staged
        .persist(path)
        .map_err(|err| AppError::store(err.error.to_string()))?;
    Ok(())
}

/// `board.json` is guarded by `board.json.lock` next to it.
fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from(STORE_FILE_NAME));
    name.push(".lock");
    store_dir(path).join(name)
}

/// Takes the exclusive cross-process lock for `path`. Released when the
/// returned file is dropped.
fn lock_exclusive(path: &Path) -> Result<File, AppError> {
    let dir = store_dir(path);
    std::fs::create_dir_all(dir).map_err(|err| AppError::store(err.to_string()))?;
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path(path))
        .map_err(|err| AppError::store(err.to_string()))?;
    file.lock().map_err(|err| AppError::store(err.to_string()))?;
    Ok(file)
}

/// Durable store backed by one JSON file.
///
/// Every write loads, edits and saves the file while holding both an
/// in-process mutex and an exclusive lock on the sibling `.lock` file, so
/// conditional writes stay atomic across threads and across processes
/// sharing the file. Reads take no lock; saves replace the file by rename.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read<R>(&self, read: impl FnOnce(&BoardState) -> R) -> Result<R, AppError> {
        let state = load_state(&self.path)?;
        Ok(read(&state))
    }

    fn write<R>(
        &self,
        write: impl FnOnce(&mut BoardState) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        let _guard = self.lock.lock();
        let _file_lock = lock_exclusive(&self.path)?;
        let mut state = load_state(&self.path)?;
        let before = state.clone();
        let result = write(&mut state)?;
        if state != before {
            save_state(&self.path, &state)?;
        }
        Ok(result)
    }
}

impl RecordStore for JsonStore {
    fn find_task(&self, id: &str) -> Result<Option<Task>, AppError> {
        self.read(|state| state.find_task(id).cloned())
    }

    fn list_tasks(&self) -> Result<Vec<Task>, AppError> {
        self.read(|state| state.tasks.clone())
    }

    fn insert_task(&self, draft: TaskDraft) -> Result<Task, AppError> {
        self.write(|state| Ok(state.insert_task(draft)))
    }

    fn update_task_if(
        &self,
        id: &str,
        expected: Option<OffsetDateTime>,
        edit: &mut dyn FnMut(&mut Task),
    ) -> Result<WriteOutcome, AppError> {
        self.write(|state| Ok(state.update_task_if(id, expected, edit)))
    }

    fn delete_task_if(
        &self,
        id: &str,
        expected: Option<OffsetDateTime>,
    ) -> Result<WriteOutcome, AppError> {
        self.write(|state| Ok(state.delete_task_if(id, expected)))
    }

    fn count_tasks_by_assignee(
        &self,
        statuses: &[TaskStatus],
    ) -> Result<HashMap<String, usize>, AppError> {
        self.read(|state| state.count_tasks_by_assignee(statuses))
    }

    fn find_user(&self, id: &str) -> Result<Option<User>, AppError> {
        self.read(|state| state.find_user(id).cloned())
    }

    fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.read(|state| state.users.clone())
    }

    fn insert_user(&self, name: &str, email: &str) -> Result<User, AppError> {
        self.write(|state| state.insert_user(name, email))
    }

    fn append_log(
        &self,
        actor: &str,
        action: &str,
        task: Option<&str>,
    ) -> Result<ActionLogEntry, AppError> {
        self.write(|state| Ok(state.append_log(actor, action, task)))
    }

    fn recent_logs(&self, limit: usize) -> Result<Vec<ActionLogEntry>, AppError> {
        self.read(|state| state.recent_logs(limit))
    }
}
