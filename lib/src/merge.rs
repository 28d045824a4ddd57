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

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::metadata::MetadataMerger;
use crate::project_path::ProjectPath;
use crate::vcs::{GitTool, VcsError};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Vcs(#[from] VcsError),
    #[error("I/O error reading {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Custom merge for {path} failed")]
    Custom {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// How a file is merged: against a common ancestor from the base template,
/// or directly against the target when no usable ancestor exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeType {
    TwoWay,
    ThreeWay,
}

/// A merged file body. Raw bytes are used when any participant is not valid
/// UTF-8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergedBody {
    Text(String),
    Binary(Vec<u8>),
}

impl MergedBody {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => MergedBody::Text(text),
            Err(err) => MergedBody::Binary(err.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MergedBody::Text(text) => text.as_bytes(),
            MergedBody::Binary(bytes) => bytes,
        }
    }
}

/// Result of merging one file.
#[derive(Clone, Debug)]
pub struct MergeOutcome {
    pub local_path: ProjectPath,
    pub body: MergedBody,
    pub has_conflict: bool,
    /// Unresolved hunks the merge tool reported; 0 for clean merges.
    pub conflict_count: u32,
}

impl MergeOutcome {
    /// A clean outcome that simply takes the target's bytes.
    pub fn taking_target(local_path: ProjectPath, target: Vec<u8>) -> Self {
        MergeOutcome {
            local_path,
            body: MergedBody::from_bytes(target),
            has_conflict: false,
            conflict_count: 0,
        }
    }
}

/// A per-path specialized merger that overrides the generic merge.
pub trait CustomMerger: Send + Sync {
    fn matches(&self, path: &ProjectPath) -> bool;

    fn merge(
        &self,
        path: &ProjectPath,
        current: &[u8],
        base: Option<&[u8]>,
        target: &[u8],
    ) -> Result<MergeOutcome, MergeError>;
}

/// Ordered list of custom mergers; the first match wins.
#[derive(Default)]
pub struct CustomMergeRegistry {
    mergers: Vec<Box<dyn CustomMerger>>,
}

impl CustomMergeRegistry {
    pub fn empty() -> Self {
        CustomMergeRegistry::default()
    }

    /// The stock registry: today only the migration metadata file gets a
    /// semantic merge.
    pub fn standard() -> Self {
        let mut registry = CustomMergeRegistry::empty();
        registry.register(Box::new(MetadataMerger));
        registry
    }

    pub fn register(&mut self, merger: Box<dyn CustomMerger>) {
        self.mergers.push(merger);
    }

    pub fn find(&self, path: &ProjectPath) -> Option<&dyn CustomMerger> {
        self.mergers
            .iter()
            .map(|merger| merger.as_ref())
            .find(|merger| merger.matches(path))
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, MergeError> {
    std::fs::read(path).map_err(|source| MergeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Merges one file through the external tool. `base_path` must be given for
/// [`MergeType::ThreeWay`]; a missing `target_path` stands for a file the
/// target template deleted and merges against empty content.
///
/// If any participant is not valid UTF-8 the text merge is skipped and the
/// outcome degrades to taking the target's bytes (the current bytes when the
/// target is gone), without a conflict.
pub fn merge_files(
    git: &GitTool,
    merge_type: MergeType,
    local_path: &ProjectPath,
    current_path: &Path,
    base_path: Option<&Path>,
    target_path: Option<&Path>,
) -> Result<MergeOutcome, MergeError> {
    debug_assert!(base_path.is_some() || merge_type == MergeType::TwoWay);
    let current = read_file(current_path)?;
    let target = match target_path {
        Some(path) => Some(read_file(path)?),
        None => None,
    };
    let base = match (merge_type, base_path) {
        (MergeType::ThreeWay, Some(path)) => Some(read_file(path)?),
        _ => None,
    };

    let is_text = |bytes: &Option<Vec<u8>>| {
        bytes
            .as_deref()
            .map_or(true, |bytes| std::str::from_utf8(bytes).is_ok())
    };
    let text_mergeable =
        std::str::from_utf8(&current).is_ok() && is_text(&target) && is_text(&base);
    if !text_mergeable {
        let body = target.unwrap_or(current);
        return Ok(MergeOutcome::taking_target(local_path.clone(), body));
    }

    // The tool wants three real files; stand in an empty one for a deleted
    // target.
    let empty_target = match target_path {
        Some(_) => None,
        None => {
            let mut file = tempfile::NamedTempFile::with_prefix("uplift-target-")
                .map_err(|source| MergeError::Io {
                    path: current_path.to_path_buf(),
                    source,
                })?;
            file.flush().map_err(|source| MergeError::Io {
                path: current_path.to_path_buf(),
                source,
            })?;
            Some(file)
        }
    };
    let target_file_path =
        target_path.unwrap_or_else(|| empty_target.as_ref().unwrap().path());
    let ancestor = match merge_type {
        MergeType::ThreeWay => base_path,
        MergeType::TwoWay => None,
    };
    let merged = git.merge_file(current_path, ancestor, target_file_path)?;
    Ok(MergeOutcome {
        local_path: local_path.clone(),
        body: MergedBody::from_bytes(merged.body),
        has_conflict: merged.conflict_count > 0,
        conflict_count: merged.conflict_count,
    })
}
