//! On-disk persistence for generated prompts and test results.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/
//!   <slug>.json              # StoredPrompt
//!   index.json               # [IndexEntry]
//!   tests/<slug>__<name>.json
//! ```
//!
//! Everything is pretty-printed JSON written atomically.

mod atomic;

pub use atomic::atomic_write;

use crate::error::{ForgeError, Result};
use crate::generation::GeneratedPrompt;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const INDEX_FILE: &str = "index.json";
const TESTS_DIR: &str = "tests";

/// A generated prompt as saved on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPrompt {
    pub slug: String,
    /// RFC 3339, UTC.
    pub generated_at: String,
    #[serde(flatten)]
    pub prompt: GeneratedPrompt,
}

/// One line of `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub task: String,
    pub slug: String,
    pub requested_variables: Vec<String>,
    pub identified_variables: BTreeSet<String>,
}

impl IndexEntry {
    pub fn new(slug: &str, prompt: &GeneratedPrompt) -> Self {
        Self {
            task: prompt.task.clone(),
            slug: slug.to_string(),
            requested_variables: prompt.requested_variables.clone(),
            identified_variables: prompt.identified_variables.clone(),
        }
    }
}

/// Prompt store rooted at an output directory.
#[derive(Debug, Clone)]
pub struct PromptStore {
    root: PathBuf,
}

impl PromptStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prompt_path(&self, slug: &str) -> PathBuf {
        self.root.join(format!("{}.json", slug))
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn test_result_path(&self, slug: &str, name: &str) -> PathBuf {
        self.root
            .join(TESTS_DIR)
            .join(format!("{}__{}.json", slug, name))
    }

    /// Save `prompt` as `<slug>.json`, stamped with the current time.
    pub fn save_prompt(&self, slug: &str, prompt: &GeneratedPrompt) -> Result<StoredPrompt> {
        let stored = StoredPrompt {
            slug: slug.to_string(),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            prompt: prompt.clone(),
        };

        let path = self.prompt_path(slug);
        write_json(&path, &stored)?;
        debug!(path = %path.display(), "Saved prompt");
        Ok(stored)
    }

    pub fn load_prompt(&self, slug: &str) -> Result<StoredPrompt> {
        ensure_file_component("slug", slug)?;
        let path = self.prompt_path(slug);
        if !path.exists() {
            return Err(ForgeError::UserError(format!(
                "Prompt file not found for slug '{}' at {}\n\nFix: run `promptforge generate` for this task first, or check --output-dir.",
                slug,
                path.display()
            )));
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            ForgeError::UserError(format!("failed to read '{}': {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ForgeError::UserError(format!(
                "failed to parse prompt file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Replace `index.json` with `entries`.
    pub fn write_index(&self, entries: &[IndexEntry]) -> Result<()> {
        write_json(&self.index_path(), entries)
    }

    /// Save a test-case result as `tests/<slug>__<name>.json`.
    pub fn save_test_result(
        &self,
        slug: &str,
        name: &str,
        payload: &serde_json::Value,
    ) -> Result<PathBuf> {
        ensure_file_component("slug", slug)?;
        ensure_file_component("test case name", name)?;
        let path = self.test_result_path(slug, name);
        write_json(&path, payload)?;
        debug!(path = %path.display(), "Saved test result");
        Ok(path)
    }
}

/// Reject values that would not stay a single file name inside the store.
fn ensure_file_component(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(ForgeError::UserError(format!(
            "invalid {} '{}': must not be empty, '.', '..' or contain path separators",
            what, value
        )));
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value).map_err(|e| {
        ForgeError::UserError(format!("failed to serialize '{}': {}", path.display(), e))
    })?;
    json.push('\n');
    atomic_write(path, json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_prompt() -> GeneratedPrompt {
        GeneratedPrompt {
            task: "Summarize a support ticket".to_string(),
            requested_variables: vec!["TICKET".to_string()],
            identified_variables: BTreeSet::from(["$TICKET".to_string()]),
            floating_variables: Vec::new(),
            metaprompt_thinking: String::new(),
            metaprompt_response: "<Instructions><ticket>{$TICKET}</ticket></Instructions>"
                .to_string(),
            floating_variable_analysis: None,
            raw_prompt_template: "<ticket>{$TICKET}</ticket>".to_string(),
            final_prompt_template: "<ticket>{$TICKET}</ticket>".to_string(),
            override_applied: false,
        }
    }

    #[test]
    fn test_save_and_load_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let store = PromptStore::new(temp_dir.path().join("generated_prompts"));

        let saved = store
            .save_prompt("summarize-a-support-ticket", &sample_prompt())
            .unwrap();
        let loaded = store.load_prompt("summarize-a-support-ticket").unwrap();

        assert_eq!(loaded, saved);
        assert_eq!(loaded.prompt.prompt(), "<ticket>{$TICKET}</ticket>");
        assert!(chrono::DateTime::parse_from_rfc3339(&loaded.generated_at).is_ok());
    }

    #[test]
    fn test_saved_prompt_is_flat_json() {
        let temp_dir = TempDir::new().unwrap();
        let store = PromptStore::new(temp_dir.path());

        store.save_prompt("ticket", &sample_prompt()).unwrap();

        let raw = fs::read_to_string(temp_dir.path().join("ticket.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["slug"], "ticket");
        assert_eq!(value["task"], "Summarize a support ticket");
        assert_eq!(value["final_prompt_template"], "<ticket>{$TICKET}</ticket>");
    }

    #[test]
    fn test_load_missing_prompt_names_slug() {
        let temp_dir = TempDir::new().unwrap();
        let store = PromptStore::new(temp_dir.path());

        let err = store.load_prompt("nope").unwrap_err();
        let message = err.to_string();

        assert!(matches!(err, ForgeError::UserError(_)));
        assert!(message.contains("'nope'"));
        assert!(message.contains("nope.json"));
    }

    #[test]
    fn test_load_corrupt_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let store = PromptStore::new(temp_dir.path());
        fs::write(store.prompt_path("bad"), "not json").unwrap();

        let err = store.load_prompt("bad").unwrap_err();
        assert!(err.to_string().contains("failed to parse prompt file"));
    }

    #[test]
    fn test_write_index() {
        let temp_dir = TempDir::new().unwrap();
        let store = PromptStore::new(temp_dir.path());
        let entry = IndexEntry::new("ticket", &sample_prompt());

        store.write_index(std::slice::from_ref(&entry)).unwrap();

        let raw = fs::read_to_string(store.index_path()).unwrap();
        let entries: Vec<IndexEntry> = serde_json::from_str(&raw).unwrap();
        assert_eq!(entries, vec![entry]);
    }

    #[test]
    fn test_save_test_result_path() {
        let temp_dir = TempDir::new().unwrap();
        let store = PromptStore::new(temp_dir.path());

        let path = store
            .save_test_result("ticket", "refund_request", &serde_json::json!({"output": "ok"}))
            .unwrap();

        assert_eq!(
            path,
            temp_dir.path().join("tests").join("ticket__refund_request.json")
        );
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["output"], "ok");
    }

    #[test]
    fn test_save_test_result_rejects_path_names() {
        let temp_dir = TempDir::new().unwrap();
        let store = PromptStore::new(temp_dir.path().join("out"));
        let payload = serde_json::json!({"output": "ok"});

        for name in ["../escape", "nested/case", "..", ""] {
            let err = store.save_test_result("ticket", name, &payload).unwrap_err();
            assert!(matches!(err, ForgeError::UserError(_)), "name {name:?}");
        }
        assert!(store.save_test_result("../x", "case", &payload).is_err());

        assert!(!temp_dir.path().join("out").exists());
        assert!(!temp_dir.path().join("escape.json").exists());
    }

    #[test]
    fn test_load_prompt_rejects_path_slug() {
        let temp_dir = TempDir::new().unwrap();
        let store = PromptStore::new(temp_dir.path());

        let err = store.load_prompt("../ticket").unwrap_err();
        assert!(err.to_string().starts_with("invalid slug '../ticket'"));
    }
}
