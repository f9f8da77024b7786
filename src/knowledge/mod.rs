//! Keyword-triggered canned answers.
//!
//! The table is loaded once at startup (built-in or from a TOML file) and is
//! immutable afterwards; callers share it behind an `Arc`.

mod builtin;
mod matching;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use builtin::BUILTIN_ENTRIES;
use matching::contains_whole_phrase;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub key: String,
    pub keywords: Vec<String>,
    pub response: String,
    pub category: String,
}

/// A successful lookup. Borrowed from the table it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KnowledgeMatch<'a> {
    pub key: &'a str,
    pub response: &'a str,
    pub category: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeStats {
    pub total_entries: usize,
    pub categories: usize,
    pub total_keywords: usize,
}

#[derive(Debug, Deserialize)]
struct KnowledgeFile {
    #[serde(default, rename = "entry")]
    entries: Vec<KnowledgeEntry>,
}

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    /// Build a table from entries in priority order. Keywords are trimmed and
    /// lowercased; duplicate keys and empty fields are rejected.
    pub fn new(entries: Vec<KnowledgeEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(entries.len());

        for mut entry in entries {
            entry.key = entry.key.trim().to_string();
            anyhow::ensure!(!entry.key.is_empty(), "knowledge entry with empty key");
            anyhow::ensure!(
                seen.insert(entry.key.clone()),
                "duplicate knowledge entry key: {}",
                entry.key
            );
            anyhow::ensure!(
                !entry.response.trim().is_empty(),
                "knowledge entry {} has an empty response",
                entry.key
            );
            anyhow::ensure!(
                !entry.category.trim().is_empty(),
                "knowledge entry {} has an empty category",
                entry.key
            );

            entry.keywords = entry
                .keywords
                .iter()
                .map(|keyword| keyword.trim().to_lowercase())
                .collect();
            anyhow::ensure!(
                !entry.keywords.is_empty() && entry.keywords.iter().all(|k| !k.is_empty()),
                "knowledge entry {} needs at least one non-empty keyword",
                entry.key
            );

            normalized.push(entry);
        }

        Ok(Self {
            entries: normalized,
        })
    }

    /// The table compiled into the binary.
    pub fn builtin() -> Self {
        let entries = BUILTIN_ENTRIES
            .iter()
            .map(|entry| KnowledgeEntry {
                key: entry.key.to_string(),
                keywords: entry.keywords.iter().map(|k| (*k).to_string()).collect(),
                response: entry.response.to_string(),
                category: entry.category.to_string(),
            })
            .collect();
        Self { entries }
    }

    /// Load a `[[entry]]` TOML table from disk.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read knowledge base {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid knowledge base {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: KnowledgeFile = toml::from_str(contents).context("parse knowledge base TOML")?;
        anyhow::ensure!(!file.entries.is_empty(), "knowledge base has no entries");
        Self::new(file.entries)
    }

    /// `path` when configured, the built-in table otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_toml_file(path),
            None => Ok(Self::builtin()),
        }
    }

    /// First entry (in table order) with a keyword occurring as a whole word
    /// in `query`, compared case-insensitively.
    pub fn find_match(&self, query: &str) -> Option<KnowledgeMatch<'_>> {
        let normalized = query.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        self.entries
            .iter()
            .find(|entry| {
                entry
                    .keywords
                    .iter()
                    .any(|keyword| contains_whole_phrase(&normalized, keyword))
            })
            .map(|entry| KnowledgeMatch {
                key: &entry.key,
                response: &entry.response,
                category: &entry.category,
            })
    }

    /// Category label → entry keys, keys in table order.
    pub fn categories(&self) -> BTreeMap<String, Vec<String>> {
        let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in &self.entries {
            categories
                .entry(entry.category.clone())
                .or_default()
                .push(entry.key.clone());
        }
        categories
    }

    pub fn stats(&self) -> KnowledgeStats {
        KnowledgeStats {
            total_entries: self.entries.len(),
            categories: self.categories().len(),
            total_keywords: self.entries.iter().map(|e| e.keywords.len()).sum(),
        }
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::builtin()
    }
}
