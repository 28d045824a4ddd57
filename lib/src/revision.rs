// Copyright 2024 The Uplift Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt::{Debug, Error, Formatter};

use indexmap::IndexMap;

use crate::platform::{MigrateConfig, PlatformConfig, PlatformTag};

/// Opaque identifier of a toolkit version, conceptually a content hash.
/// Equality is identity; there is no ordering between revisions.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RevisionId(String);

impl Debug for RevisionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.debug_tuple("RevisionId").field(&self.0).finish()
    }
}

impl std::fmt::Display for RevisionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.write_str(&self.0)
    }
}

impl RevisionId {
    pub fn new(value: impl Into<String>) -> Self {
        RevisionId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RevisionId {
    fn from(value: &str) -> Self {
        RevisionId::new(value)
    }
}

/// The revisions to materialize base templates from, and which platforms
/// each revision covers.
#[derive(Clone, Debug)]
pub struct ResolvedRevisions {
    /// Deduplicated; the root platform's revision comes first when present.
    pub revisions: Vec<RevisionId>,
    pub revision_to_configs: IndexMap<RevisionId, Vec<PlatformConfig>>,
}

/// Maps the per-platform recorded revisions to the ordered revision list to
/// materialize. Platforms without a recorded base revision fall back to
/// `fallback_revision`. An explicit `base_override` short-circuits the
/// per-platform bookkeeping and maps every configured platform to it.
///
/// The root-platform revision is ordered first so that platform scaffolds
/// overlay onto a consistent root.
pub fn resolve_revisions(
    config: &MigrateConfig,
    fallback_revision: &RevisionId,
    base_override: Option<&RevisionId>,
) -> ResolvedRevisions {
    let mut revision_to_configs: IndexMap<RevisionId, Vec<PlatformConfig>> = IndexMap::new();
    if let Some(base) = base_override {
        revision_to_configs.insert(
            base.clone(),
            config.platform_configs.values().cloned().collect(),
        );
        return ResolvedRevisions {
            revisions: vec![base.clone()],
            revision_to_configs,
        };
    }

    let mut root_revision = None;
    for platform_config in config.platform_configs.values() {
        let effective = platform_config
            .base_revision
            .clone()
            .unwrap_or_else(|| fallback_revision.clone());
        if platform_config.platform == PlatformTag::Root {
            root_revision = Some(effective.clone());
        }
        revision_to_configs
            .entry(effective)
            .or_default()
            .push(platform_config.clone());
    }

    let mut revisions: Vec<RevisionId> = revision_to_configs
        .keys()
        .filter(|revision| Some(*revision) != root_revision.as_ref())
        .cloned()
        .collect();
    if let Some(root_revision) = root_revision {
        revisions.insert(0, root_revision);
    }
    ResolvedRevisions {
        revisions,
        revision_to_configs,
    }
}
