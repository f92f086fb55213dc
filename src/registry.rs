// src/registry.rs
//! # Feed Source Registry
//! Explicitly owned set of monitored locations, keyed by TIPLOC.
//! Insertion order is preserved so every tick dispatches in the same order.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// One monitored location. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    tiploc: String,
    /// Numeric display id of the downstream board, if any.
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    name: Option<String>,
}

impl FeedSource {
    pub fn new(tiploc: impl Into<String>) -> Self {
        Self {
            tiploc: tiploc.into().trim().to_string(),
            id: None,
            name: None,
        }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn tiploc(&self) -> &str {
        &self.tiploc
    }

    pub fn id(&self) -> Option<u32> {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Re-applies the constructor's trimming after serde deserialization.
    pub(crate) fn normalized(mut self) -> Self {
        self.tiploc = self.tiploc.trim().to_string();
        self.name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("feed source identifier is empty")]
    EmptyIdentifier,
    #[error("feed source `{0}` is already registered")]
    Duplicate(String),
}

#[derive(Debug, Default, Clone)]
pub struct FeedSourceRegistry {
    sources: Vec<FeedSource>,
    index: HashSet<String>,
}

impl FeedSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sources<I>(sources: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = FeedSource>,
    {
        let mut registry = Self::new();
        for source in sources {
            registry.register(source)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, source: FeedSource) -> Result<(), RegistryError> {
        if source.tiploc.is_empty() {
            return Err(RegistryError::EmptyIdentifier);
        }
        if !self.index.insert(source.tiploc.clone()) {
            return Err(RegistryError::Duplicate(source.tiploc));
        }
        self.sources.push(source);
        Ok(())
    }

    pub fn get(&self, tiploc: &str) -> Option<&FeedSource> {
        if !self.index.contains(tiploc) {
            return None;
        }
        self.sources.iter().find(|s| s.tiploc == tiploc)
    }

    /// Sources in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &FeedSource> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
