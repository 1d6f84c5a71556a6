//! Per-user system prompt templates (spec §3's System Prompt Template
//! entity; supplemented from `original_source/` per SPEC_FULL §2), stored
//! as one JSON file per template under `system_messages/<user>/<name>.json`
//! plus a `selected_message.json` pointer, rather than a database table —
//! this mirrors the original's file-backed `systemMessageManager.py`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SystemMessageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed template file: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("template not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMessageTemplate {
    pub name: String,
    pub message: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SelectedPointer {
    selected_name: String,
}

pub struct SystemMessageStore {
    base_dir: PathBuf,
}

impl SystemMessageStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn user_dir(&self, user: &str) -> PathBuf {
        self.base_dir.join(user)
    }

    fn template_path(&self, user: &str, name: &str) -> PathBuf {
        self.user_dir(user).join(format!("{name}.json"))
    }

    fn selected_path(&self, user: &str) -> PathBuf {
        self.user_dir(user).join("selected_message.json")
    }

    pub fn save(&self, user: &str, name: &str, message: &str, description: &str) -> Result<SystemMessageTemplate, SystemMessageError> {
        let dir = self.user_dir(user);
        fs::create_dir_all(&dir)?;

        let created_at = match self.get(user, name) {
            Ok(existing) => existing.created_at,
            Err(SystemMessageError::NotFound(_)) => Utc::now(),
            Err(e) => return Err(e),
        };

        let template = SystemMessageTemplate {
            name: name.to_string(),
            message: message.to_string(),
            description: description.to_string(),
            created_at,
            updated_at: Utc::now(),
        };
        write_json(&self.template_path(user, name), &template)?;
        Ok(template)
    }

    pub fn get(&self, user: &str, name: &str) -> Result<SystemMessageTemplate, SystemMessageError> {
        let path = self.template_path(user, name);
        if !path.exists() {
            return Err(SystemMessageError::NotFound(name.to_string()));
        }
        Ok(read_json(&path)?)
    }

    pub fn list(&self, user: &str) -> Result<Vec<SystemMessageTemplate>, SystemMessageError> {
        let dir = self.user_dir(user);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut templates = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.file_name().and_then(|n| n.to_str()) == Some("selected_message.json") {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                templates.push(read_json::<SystemMessageTemplate>(&path)?);
            }
        }
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    pub fn delete(&self, user: &str, name: &str) -> Result<(), SystemMessageError> {
        let path = self.template_path(user, name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        if self.selected_name(user)?.as_deref() == Some(name) {
            let selected = self.selected_path(user);
            if selected.exists() {
                fs::remove_file(selected)?;
            }
        }
        Ok(())
    }

    pub fn select(&self, user: &str, name: &str) -> Result<(), SystemMessageError> {
        self.get(user, name)?;
        write_json(&self.selected_path(user), &SelectedPointer { selected_name: name.to_string() })?;
        Ok(())
    }

    pub fn selected_name(&self, user: &str) -> Result<Option<String>, SystemMessageError> {
        let path = self.selected_path(user);
        if !path.exists() {
            return Ok(None);
        }
        let pointer: SelectedPointer = read_json(&path)?;
        Ok(Some(pointer.selected_name))
    }

    /// The active system prompt text for `user`, or `None` if none selected
    /// (callers fall back to a backend-level default system prompt).
    pub fn selected_message(&self, user: &str) -> Result<Option<String>, SystemMessageError> {
        match self.selected_name(user)? {
            Some(name) => Ok(Some(self.get(user, &name)?.message)),
            None => Ok(None),
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SystemMessageError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, SystemMessageError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_select_exposes_the_message_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = SystemMessageStore::new(dir.path());

        store.save("alice", "friendly", "Be friendly and concise.", "default tone").unwrap();
        store.select("alice", "friendly").unwrap();

        assert_eq!(store.selected_message("alice").unwrap().as_deref(), Some("Be friendly and concise."));
    }

    #[test]
    fn deleting_the_selected_template_clears_the_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let store = SystemMessageStore::new(dir.path());

        store.save("alice", "only", "message text", "").unwrap();
        store.select("alice", "only").unwrap();
        store.delete("alice", "only").unwrap();

        assert_eq!(store.selected_name("alice").unwrap(), None);
    }

    #[test]
    fn no_selection_yields_none_without_erroring() {
        let dir = tempfile::tempdir().unwrap();
        let store = SystemMessageStore::new(dir.path());
        assert_eq!(store.selected_message("bob").unwrap(), None);
    }
}
