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

//! Materializes synthetic reference templates: acquires SDK checkouts at
//! the required revisions and regenerates scaffolds from them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tempfile::TempDir;
use thiserror::Error;

use crate::file_util;
use crate::merge::MergeType;
use crate::platform::PlatformTag;
use crate::project::ScaffoldLanguages;
use crate::project_path::ProjectPath;
use crate::revision::RevisionId;
use crate::toolkit::{CreateRequest, SdkCheckout, Toolkit};

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("No SDK could be materialized for revision {revision} (fallback chain exhausted)")]
    RevisionUnavailable { revision: RevisionId },
    #[error("Error setting up scratch directory")]
    SetUpDir(#[source] std::io::Error),
    #[error("Error listing generated template files")]
    ListFiles(#[source] std::io::Error),
}

/// What the materializer hands back to the orchestrator when all templates
/// are generated.
pub struct MaterializedState {
    /// Scratch SDK clones, still owned; dropping them deletes the clones.
    pub scratch_dirs: Vec<TempDir>,
    /// Revision actually cloned → checkout location.
    pub sdk_dirs: IndexMap<RevisionId, PathBuf>,
    /// Default merge type per generated base-template file; first
    /// generation pass wins.
    pub merge_types: IndexMap<ProjectPath, MergeType>,
}

/// Generates template scaffolds for the revisions the resolver picked. SDK
/// clones are cached by the revision actually cloned, so revisions that
/// fall back to the same one share a checkout.
pub struct TemplateMaterializer<'a> {
    toolkit: &'a Toolkit,
    project_name: &'a str,
    org: &'a str,
    languages: ScaffoldLanguages,
    fallback_revision: RevisionId,
    target_revision: RevisionId,
    checkouts: IndexMap<RevisionId, SdkCheckout>,
    /// Requested revision → revision that ended up standing in for it.
    effective: IndexMap<RevisionId, RevisionId>,
    scratch_dirs: Vec<TempDir>,
    merge_types: IndexMap<ProjectPath, MergeType>,
}

impl<'a> TemplateMaterializer<'a> {
    pub fn new(
        toolkit: &'a Toolkit,
        project_name: &'a str,
        org: &'a str,
        languages: ScaffoldLanguages,
        fallback_revision: RevisionId,
        target_revision: RevisionId,
    ) -> Self {
        TemplateMaterializer {
            toolkit,
            project_name,
            org,
            languages,
            fallback_revision,
            target_revision,
            checkouts: IndexMap::new(),
            effective: IndexMap::new(),
            scratch_dirs: vec![],
            merge_types: IndexMap::new(),
        }
    }

    /// Acquires an SDK for `revision`, trying the revision itself, then the
    /// fallback revision, then the target revision. Returns the revision
    /// that was actually materialized.
    fn acquire_sdk(&mut self, revision: &RevisionId) -> Result<RevisionId, MaterializeError> {
        if let Some(effective) = self.effective.get(revision) {
            return Ok(effective.clone());
        }
        let mut candidates = vec![revision.clone()];
        for fallback in [&self.fallback_revision, &self.target_revision] {
            if !candidates.contains(fallback) {
                candidates.push(fallback.clone());
            }
        }
        for candidate in candidates {
            if self.checkouts.contains_key(&candidate) {
                self.effective.insert(revision.clone(), candidate.clone());
                return Ok(candidate);
            }
            let scratch = TempDir::with_prefix("uplift-sdk-")
                .map_err(MaterializeError::SetUpDir)?;
            match self.toolkit.clone_revision(&candidate, scratch.path()) {
                Ok(checkout) => {
                    self.scratch_dirs.push(scratch);
                    self.checkouts.insert(candidate.clone(), checkout);
                    self.effective.insert(revision.clone(), candidate.clone());
                    return Ok(candidate);
                }
                Err(err) => {
                    tracing::warn!(
                        %candidate,
                        ?err,
                        "could not clone the SDK, trying the next fallback"
                    );
                }
            }
        }
        Err(MaterializeError::RevisionUnavailable {
            revision: revision.clone(),
        })
    }

    /// Regenerates the scaffold for `revision` into `out_dir`, overlaying
    /// whatever previous passes generated. With `record_merge_types`, files
    /// newly present afterwards get their default merge type: two-way when
    /// the template was effectively generated at the target revision (no
    /// usable ancestor), three-way otherwise.
    pub fn materialize(
        &mut self,
        revision: &RevisionId,
        platforms: &[PlatformTag],
        out_dir: &Path,
        record_merge_types: bool,
    ) -> Result<RevisionId, MaterializeError> {
        let effective = self.acquire_sdk(revision)?;
        let before: HashSet<ProjectPath> = file_util::list_files_recursively(out_dir)
            .map_err(MaterializeError::ListFiles)?
            .into_iter()
            .collect();

        let platforms: Vec<PlatformTag> = platforms
            .iter()
            .copied()
            .filter(|platform| *platform != PlatformTag::Root)
            .collect();
        let checkout = &self.checkouts[&effective];
        checkout
            .create_app(&CreateRequest {
                project_name: self.project_name,
                org: self.org,
                languages: self.languages,
                platforms: &platforms,
                out_dir,
            })
            .map_err(|err| {
                tracing::warn!(?err, %effective, "scaffold generation failed");
                MaterializeError::RevisionUnavailable {
                    revision: revision.clone(),
                }
            })?;

        if record_merge_types {
            let default_type = if effective == self.target_revision {
                MergeType::TwoWay
            } else {
                MergeType::ThreeWay
            };
            let after = file_util::list_files_recursively(out_dir)
                .map_err(MaterializeError::ListFiles)?;
            for file in after {
                if !before.contains(&file) {
                    self.merge_types.entry(file).or_insert(default_type);
                }
            }
        }
        Ok(effective)
    }

    pub fn into_state(self) -> MaterializedState {
        MaterializedState {
            scratch_dirs: self.scratch_dirs,
            sdk_dirs: self
                .checkouts
                .iter()
                .map(|(revision, checkout)| (revision.clone(), checkout.root().to_path_buf()))
                .collect(),
            merge_types: self.merge_types,
        }
    }
}
