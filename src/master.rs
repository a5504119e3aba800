use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::cache::LoadOnce;
use crate::flatfile::Table;

pub const TAGS_FILE: &str = "tags.csv";
pub const INDUSTRIES_FILE: &str = "industries.csv";
pub const BENEFITS_FILE: &str = "benefits.csv";

/// ID → display name.
pub type Dictionary = HashMap<String, String>;

/// What an ID that is not in its dictionary turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Show the ID itself.
    RawId,
    /// Show nothing.
    Empty,
}

/// Tag and benefit lists keep unknown IDs visible.
pub const LIST_FALLBACK: FallbackPolicy = FallbackPolicy::RawId;
/// A lone industry ID that does not resolve is blanked.
pub const SINGLE_FALLBACK: FallbackPolicy = FallbackPolicy::Empty;

/// The tag, industry and benefit dictionaries, each read from `data_dir`
/// on first use and kept until the resolver is dropped or reset.
#[derive(Debug)]
pub struct MasterData {
    data_dir: PathBuf,
    tags: LoadOnce<Dictionary>,
    industries: LoadOnce<Dictionary>,
    benefits: LoadOnce<Dictionary>,
}

impl MasterData {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            tags: LoadOnce::new(),
            industries: LoadOnce::new(),
            benefits: LoadOnce::new(),
        }
    }

    pub fn tags(&self) -> Result<&Dictionary> {
        self.tags
            .get_or_try_load(|| load_dictionary(&self.data_dir.join(TAGS_FILE)))
    }

    pub fn industries(&self) -> Result<&Dictionary> {
        self.industries
            .get_or_try_load(|| load_dictionary(&self.data_dir.join(INDUSTRIES_FILE)))
    }

    pub fn benefits(&self) -> Result<&Dictionary> {
        self.benefits
            .get_or_try_load(|| load_dictionary(&self.data_dir.join(BENEFITS_FILE)))
    }

    pub fn resolve_tag_ids(&self, ids: &str) -> Result<Vec<String>> {
        Ok(resolve_list(self.tags()?, ids, LIST_FALLBACK))
    }

    pub fn resolve_benefit_ids(&self, ids: &str) -> Result<Vec<String>> {
        Ok(resolve_list(self.benefits()?, ids, LIST_FALLBACK))
    }

    pub fn resolve_industry_id(&self, id: &str) -> Result<String> {
        Ok(resolve_one(self.industries()?, id.trim(), SINGLE_FALLBACK))
    }

    /// Forget every loaded dictionary.
    pub fn reset(&mut self) {
        self.tags.reset();
        self.industries.reset();
        self.benefits.reset();
    }
}

fn load_dictionary(path: &Path) -> Result<Dictionary> {
    let table = Table::read(path)?;
    let mut dictionary = Dictionary::new();

    for record in table.records() {
        let id = record.field(0).trim();
        if id.is_empty() {
            continue;
        }
        let name = record.field(1).trim();
        if dictionary.contains_key(id) {
            warn!("Duplicate id {} in {}, keeping the first", id, path.display());
            continue;
        }
        dictionary.insert(id.to_string(), name.to_string());
    }

    debug!("Loaded {} entries from {}", dictionary.len(), path.display());
    Ok(dictionary)
}

/// Resolve a comma-separated ID list, keeping input order and duplicates.
/// Blank tokens and IDs that resolve to an empty name are dropped.
pub fn resolve_list(dictionary: &Dictionary, ids: &str, fallback: FallbackPolicy) -> Vec<String> {
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| resolve_one(dictionary, id, fallback))
        .filter(|name| !name.is_empty())
        .collect()
}

pub fn resolve_one(dictionary: &Dictionary, id: &str, fallback: FallbackPolicy) -> String {
    match (dictionary.get(id), fallback) {
        (Some(name), _) => name.clone(),
        (None, FallbackPolicy::RawId) => id.to_string(),
        (None, FallbackPolicy::Empty) => String::new(),
    }
}
