//! Icon-set merge algorithm.
//!
//! Merges an ordered list of icon-set bundles into one type-to-icon
//! mapping under a conflict policy, recording provenance for every key
//! and producing a resolution checksum over the logical inputs.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::canonical::checksum_of;
use crate::icon_set::IconSetBundle;
use crate::SCHEMA_VERSION;

/// Maximum number of distinct type keys after merging.
pub const MAX_RESOLVED_TYPE_KEYS: usize = 5000;

/// Rule applied when two sources map the same type key to different
/// icons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IconConflictPolicy {
    #[default]
    Reject,
    FirstWins,
    LastWins,
}

impl fmt::Display for IconConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IconConflictPolicy::Reject => "reject",
            IconConflictPolicy::FirstWins => "first-wins",
            IconConflictPolicy::LastWins => "last-wins",
        })
    }
}

/// Identity of one merged source: the exact bundle that contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconSetSourceRef {
    pub icon_set_id: String,
    pub icon_set_version: u32,
    pub checksum: String,
}

/// Provenance for one resolved type key: the winning icon, the source
/// it was selected from, and every source that offered the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeSource {
    pub key: String,
    pub icon: String,
    pub selected_from: IconSetSourceRef,
    pub candidates: Vec<IconSetSourceRef>,
}

/// Result of merging icon-set bundles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconResolution {
    pub conflict_policy: IconConflictPolicy,
    pub resolved_entries: BTreeMap<String, String>,
    pub sources: Vec<IconSetSourceRef>,
    pub key_sources: BTreeMap<String, NodeTypeSource>,
    pub checksum: String,
}

impl IconResolution {
    /// Node type keys in sorted order.
    pub fn node_types(&self) -> Vec<String> {
        self.resolved_entries.keys().cloned().collect()
    }
}

/// Why a merge could not produce a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconMergeError {
    /// Two sources disagree on a key under the `reject` policy.
    KeyConflict {
        key: String,
        existing_icon: String,
        incoming_icon: String,
    },
    /// The merge produced no entries at all.
    Empty,
    /// The merge produced more distinct keys than the engine supports.
    TooManyKeys { count: usize },
}

impl fmt::Display for IconMergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IconMergeError::KeyConflict {
                key,
                existing_icon,
                incoming_icon,
            } => write!(
                f,
                "Node type key '{key}' maps to multiple icons ('{existing_icon}' vs '{incoming_icon}') under reject policy."
            ),
            IconMergeError::Empty => write!(f, "Resolved icon map is empty."),
            IconMergeError::TooManyKeys { count } => write!(
                f,
                "Resolved icon map has {count} type keys, max is {MAX_RESOLVED_TYPE_KEYS}."
            ),
        }
    }
}

impl std::error::Error for IconMergeError {}

/// Merges `bundles` in order under `policy`.
///
/// Order matters for `first-wins`/`last-wins`; under `reject` any
/// disagreement fails regardless of order. The checksum covers only the
/// policy, the exact source identities, and the resolved entries, with
/// sources sorted by identity so caller ordering does not leak into the
/// digest beyond which icon actually won.
pub fn merge_icon_sets(
    bundles: &[IconSetBundle],
    policy: IconConflictPolicy,
) -> Result<IconResolution, IconMergeError> {
    let mut resolved_entries: BTreeMap<String, String> = BTreeMap::new();
    let mut key_sources: BTreeMap<String, NodeTypeSource> = BTreeMap::new();
    let mut sources: Vec<IconSetSourceRef> = Vec::with_capacity(bundles.len());

    for bundle in bundles {
        let source = IconSetSourceRef {
            icon_set_id: bundle.icon_set_id.clone(),
            icon_set_version: bundle.version,
            checksum: bundle.checksum.clone(),
        };
        sources.push(source.clone());

        for (key, icon) in &bundle.entries {
            match key_sources.get_mut(key) {
                None => {
                    key_sources.insert(
                        key.clone(),
                        NodeTypeSource {
                            key: key.clone(),
                            icon: icon.clone(),
                            selected_from: source.clone(),
                            candidates: vec![source.clone()],
                        },
                    );
                    resolved_entries.insert(key.clone(), icon.clone());
                }
                Some(provenance) => {
                    provenance.candidates.push(source.clone());
                    let existing = &resolved_entries[key];
                    if existing == icon {
                        continue;
                    }
                    match policy {
                        IconConflictPolicy::Reject => {
                            return Err(IconMergeError::KeyConflict {
                                key: key.clone(),
                                existing_icon: existing.clone(),
                                incoming_icon: icon.clone(),
                            });
                        }
                        IconConflictPolicy::FirstWins => {}
                        IconConflictPolicy::LastWins => {
                            provenance.icon = icon.clone();
                            provenance.selected_from = source.clone();
                            resolved_entries.insert(key.clone(), icon.clone());
                        }
                    }
                }
            }
        }
    }

    if resolved_entries.is_empty() {
        return Err(IconMergeError::Empty);
    }
    if resolved_entries.len() > MAX_RESOLVED_TYPE_KEYS {
        return Err(IconMergeError::TooManyKeys {
            count: resolved_entries.len(),
        });
    }

    let mut hashed_sources = sources.clone();
    hashed_sources.sort_by(|a, b| {
        (&a.icon_set_id, a.icon_set_version).cmp(&(&b.icon_set_id, b.icon_set_version))
    });
    let checksum = checksum_of(&resolution_payload(policy, &hashed_sources, &resolved_entries));
    Ok(IconResolution {
        conflict_policy: policy,
        resolved_entries,
        sources,
        key_sources,
        checksum,
    })
}

fn resolution_payload(
    policy: IconConflictPolicy,
    sources: &[IconSetSourceRef],
    resolved_entries: &BTreeMap<String, String>,
) -> Value {
    json!({
        "schemaVersion": SCHEMA_VERSION,
        "conflictPolicy": policy,
        "sources": sources,
        "resolvedEntries": resolved_entries,
    })
}
