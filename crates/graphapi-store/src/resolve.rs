//! Ad-hoc icon-set resolution against published snapshots.
//!
//! Backs the preview endpoint that lets a client try out a set of
//! icon-set references and a conflict policy without creating a graph
//! type. The graph-type composer funnels through the same fetch and
//! merge so both paths fail identically.

use serde::{Deserialize, Serialize};
use serde_json::json;

use graphapi_core::graph_type::IconSetRef;
use graphapi_core::icon_set::IconSetBundle;
use graphapi_core::resolve::{
    merge_icon_sets, IconConflictPolicy, IconMergeError, IconResolution,
};
use graphapi_core::{Stage, SCHEMA_VERSION};

use crate::error::StoreError;
use crate::icon_sets::IconSetStore;

/// One reference in a preview resolution. Unlike a graph-type ref it
/// may target a draft, and the version may be omitted to take the
/// latest at the stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveIconSetRef {
    pub icon_set_id: String,
    #[serde(default)]
    pub stage: Stage,
    pub icon_set_version: Option<u32>,
}

/// Request body for resolving icon sets without a graph type.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveIconSetsRequest {
    pub icon_set_refs: Vec<ResolveIconSetRef>,
    #[serde(default)]
    pub conflict_policy: IconConflictPolicy,
}

/// The resolution with full per-key provenance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveIconSetsResponse {
    pub schema_version: String,
    pub conflict_policy: IconConflictPolicy,
    pub sources: Vec<graphapi_core::IconSetSourceRef>,
    pub resolved_entries: std::collections::BTreeMap<String, String>,
    pub key_sources: std::collections::BTreeMap<String, graphapi_core::NodeTypeSource>,
    pub node_types: Vec<String>,
    pub checksum: String,
}

/// Fetches each referenced published icon set and merges them under
/// `policy`. Shared by the preview endpoint and the graph-type
/// composer.
pub(crate) fn fetch_and_merge(
    store: &IconSetStore,
    references: &[IconSetRef],
    policy: IconConflictPolicy,
) -> Result<(Vec<IconSetBundle>, IconResolution), StoreError> {
    if references.is_empty() {
        return Err(StoreError::validation(
            "VALIDATION_ERROR",
            "iconSetRefs must not be empty.",
        ));
    }
    let mut bundles = Vec::with_capacity(references.len());
    for reference in references {
        let bundle = store
            .get_bundle(
                &reference.icon_set_id,
                Stage::Published,
                Some(reference.icon_set_version),
            )
            .map_err(|cause| {
                StoreError::not_found(
                    "GRAPH_TYPE_ICONSET_REF_INVALID",
                    format!(
                        "Iconset reference '{}@{}' cannot be resolved.",
                        reference.icon_set_id, reference.icon_set_version
                    ),
                )
                .with_details(json!({
                    "iconSetId": reference.icon_set_id,
                    "iconSetVersion": reference.icon_set_version,
                    "cause": cause.code,
                }))
            })?;
        if let Some(pinned) = &reference.checksum {
            if *pinned != bundle.checksum {
                return Err(StoreError::conflict(
                    "GRAPH_TYPE_ICONSET_REF_INVALID",
                    format!(
                        "Iconset reference '{}@{}' does not match its pinned checksum.",
                        reference.icon_set_id, reference.icon_set_version
                    ),
                )
                .with_details(json!({
                    "iconSetId": reference.icon_set_id,
                    "iconSetVersion": reference.icon_set_version,
                    "expectedChecksum": pinned,
                    "actualChecksum": bundle.checksum,
                })));
            }
        }
        bundles.push(bundle);
    }
    let resolution =
        merge_icon_sets(&bundles, policy).map_err(|err| map_merge_error(err, policy))?;
    Ok((bundles, resolution))
}

fn map_merge_error(err: IconMergeError, policy: IconConflictPolicy) -> StoreError {
    match err {
        IconMergeError::KeyConflict {
            key,
            existing_icon,
            incoming_icon,
        } => StoreError::conflict(
            "ICONSET_KEY_CONFLICT",
            format!("Icon key '{key}' is mapped by more than one iconset."),
        )
        .with_details(json!({
            "key": key,
            "existingIcon": existing_icon,
            "incomingIcon": incoming_icon,
            "conflictPolicy": policy.to_string(),
        })),
        IconMergeError::Empty => StoreError::validation(
            "GRAPH_TYPE_ICONSET_REF_INVALID",
            "Iconset resolution produced no entries.",
        ),
        IconMergeError::TooManyKeys { count } => StoreError::validation(
            "VALIDATION_ERROR",
            format!("Iconset resolution produced {count} keys, exceeding the limit."),
        ),
    }
}

/// Resolves the request against stored icon sets. Each reference picks
/// its own stage; fetch failures pass through with their icon-set error
/// codes.
pub fn resolve_icon_sets(
    store: &IconSetStore,
    request: &ResolveIconSetsRequest,
) -> Result<ResolveIconSetsResponse, StoreError> {
    if request.icon_set_refs.is_empty() {
        return Err(StoreError::validation(
            "VALIDATION_ERROR",
            "iconSetRefs must not be empty.",
        ));
    }
    let mut bundles = Vec::with_capacity(request.icon_set_refs.len());
    for reference in &request.icon_set_refs {
        bundles.push(store.get_bundle(
            &reference.icon_set_id,
            reference.stage,
            reference.icon_set_version,
        )?);
    }
    let resolution = merge_icon_sets(&bundles, request.conflict_policy)
        .map_err(|err| map_merge_error(err, request.conflict_policy))?;
    Ok(ResolveIconSetsResponse {
        schema_version: SCHEMA_VERSION.to_string(),
        conflict_policy: resolution.conflict_policy,
        node_types: resolution.node_types(),
        sources: resolution.sources,
        resolved_entries: resolution.resolved_entries,
        key_sources: resolution.key_sources,
        checksum: resolution.checksum,
    })
}
