use std::collections::HashMap;
use tracing::debug;

use crate::domain::{IdAllocator, SubProject, SubProjectId};
use crate::error::{NormalizeError, Result};
use crate::observability::metrics;

/// Identity key of a sub-project after name normalization
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SubProjectKey {
    name: String,
    parent: Option<String>,
    year: i32,
}

/// Trim and collapse internal whitespace runs to one space. No case folding.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_parent(parent: Option<&str>) -> Option<String> {
    parent.map(normalize_name).filter(|p| !p.is_empty())
}

/// Assigns and deduplicates sub-project identity for one run.
///
/// `resolve` takes `&mut self`: sharing a registry across threads needs
/// external locking, and parallel documents should use separate registries
/// folded together with [`SubProjectRegistry::merge`].
pub struct SubProjectRegistry {
    by_key: HashMap<SubProjectKey, SubProjectId>,
    entries: Vec<SubProject>,
    ids: IdAllocator,
    code_prefix: String,
}

impl SubProjectRegistry {
    pub fn new() -> Self {
        Self::with_code_prefix("SUB")
    }

    pub fn with_code_prefix(prefix: &str) -> Self {
        Self {
            by_key: HashMap::new(),
            entries: Vec::new(),
            ids: IdAllocator::new(),
            code_prefix: prefix.to_string(),
        }
    }

    /// Return the id for (name, parent, year), creating one on first sight
    pub fn resolve(&mut self, name: &str, parent_name: Option<&str>, document_year: i32) -> SubProjectId {
        let key = SubProjectKey {
            name: normalize_name(name),
            parent: normalize_parent(parent_name),
            year: document_year,
        };

        if let Some(id) = self.by_key.get(&key) {
            metrics::registry::record_resolved(false);
            return *id;
        }

        let id = SubProjectId(self.ids.next_id());
        let sub_project = SubProject {
            id,
            project_code: format!("{}-{}-{:03}", self.code_prefix, document_year, id.0),
            name: key.name.clone(),
            parent_name: key.parent.clone(),
            document_year,
        };
        debug!(
            "Registered sub-project {} '{}' ({})",
            id, sub_project.name, sub_project.project_code
        );
        metrics::registry::record_resolved(true);

        self.entries.push(sub_project);
        self.by_key.insert(key, id);
        id
    }

    pub fn get(&self, id: SubProjectId) -> Option<&SubProject> {
        // Ids are dense from 1 in insertion order
        let index = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.entries.get(index).filter(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubProject> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<SubProject> {
        self.entries.clone()
    }

    /// Check that no equivalent triple was given two ids
    pub fn verify(&self) -> Result<()> {
        let mut seen: HashMap<SubProjectKey, SubProjectId> = HashMap::new();
        for entry in &self.entries {
            let key = SubProjectKey {
                name: normalize_name(&entry.name),
                parent: normalize_parent(entry.parent_name.as_deref()),
                year: entry.document_year,
            };
            if let Some(existing) = seen.insert(key, entry.id) {
                return Err(NormalizeError::RegistryConflict {
                    message: format!(
                        "sub-project '{}' ({}) registered as both {} and {}",
                        entry.name, entry.document_year, existing, entry.id
                    ),
                });
            }
        }
        if seen.len() != self.by_key.len() {
            return Err(NormalizeError::RegistryConflict {
                message: format!(
                    "index holds {} keys for {} sub-projects",
                    self.by_key.len(),
                    seen.len()
                ),
            });
        }
        Ok(())
    }

    /// Fold another registry into this one. Returns a map from the other
    /// registry's ids to ids in this registry.
    pub fn merge(&mut self, other: &SubProjectRegistry) -> HashMap<SubProjectId, SubProjectId> {
        other
            .iter()
            .map(|entry| {
                let id = self.resolve(&entry.name, entry.parent_name.as_deref(), entry.document_year);
                (entry.id, id)
            })
            .collect()
    }
}

impl Default for SubProjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
