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

use std::path::Path;

use crate::vcs::{GitTool, VcsError};

/// Classification of one ordered file pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffOutcome {
    Equal,
    /// The files differ; carries the tool's patch so it can be shown to the
    /// user.
    Changed { patch: String },
    /// Only the second file exists.
    AddedOnly,
    /// Only the first file exists.
    DeletedOnly,
    /// The repo's ignore rules cover the file; it is not compared.
    IgnoredByVcs,
}

impl DiffOutcome {
    pub fn is_equal(&self) -> bool {
        matches!(self, DiffOutcome::Equal)
    }

    pub fn patch(&self) -> Option<&str> {
        match self {
            DiffOutcome::Changed { patch } => Some(patch),
            _ => None,
        }
    }
}

/// Diffs the ordered pair `(left, right)`. When `ignore_repo` is given, the
/// repo's ignore rules are consulted first and win over everything else.
pub fn diff_files(
    git: &GitTool,
    ignore_repo: Option<(&Path, &str)>,
    left: &Path,
    right: &Path,
) -> Result<DiffOutcome, VcsError> {
    if let Some((repo_root, rel_path)) = ignore_repo {
        if git.is_ignored(repo_root, rel_path)? {
            return Ok(DiffOutcome::IgnoredByVcs);
        }
    }
    match (left.is_file(), right.is_file()) {
        (false, true) => return Ok(DiffOutcome::AddedOnly),
        (true, false) => return Ok(DiffOutcome::DeletedOnly),
        (false, false) => return Ok(DiffOutcome::Equal),
        (true, true) => {}
    }
    let diff = git.diff_no_index(left, right)?;
    if diff.changed {
        Ok(DiffOutcome::Changed {
            patch: String::from_utf8_lossy(&diff.patch).into_owned(),
        })
    } else {
        Ok(DiffOutcome::Equal)
    }
}

/// The patch body from its first hunk marker onward. Strips the headers
/// (which name the compared files and so differ between otherwise-identical
/// deltas) while keeping every hunk. Patches without a hunk marker are
/// returned whole.
pub fn patch_from_first_hunk(patch: &str) -> &str {
    if patch.starts_with("@@") {
        return patch;
    }
    match patch.find("\n@@") {
        Some(i) => &patch[i + 1..],
        None => patch,
    }
}
