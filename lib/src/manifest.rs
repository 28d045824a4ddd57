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

//! Serializes a computed migration as an on-disk working directory the user
//! can inspect, plus the manifest index consumed by `status` and `apply`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::file_util;
use crate::migrate::{MigrationResult, WORKING_DIR_NAME};

/// Name of the manifest index inside the working directory.
pub const MANIFEST_FILE: &str = "manifest.toml";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error under {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize the manifest")]
    Serialize(#[from] toml_edit::ser::Error),
    #[error("Failed to parse the manifest")]
    Deserialize(#[from] toml_edit::de::Error),
}

/// Index of the working directory's contents by classification. Lists are
/// path-sorted so reruns on identical inputs are byte-identical.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationManifest {
    pub merged_files: Vec<String>,
    pub conflict_files: Vec<String>,
    pub added_files: Vec<String>,
    pub deleted_files: Vec<String>,
}

impl MigrationManifest {
    pub fn from_result(result: &MigrationResult) -> Self {
        let mut manifest = MigrationManifest::default();
        for outcome in &result.merge_results {
            let path = outcome.local_path.as_str().to_owned();
            if outcome.has_conflict {
                manifest.conflict_files.push(path);
            } else {
                manifest.merged_files.push(path);
            }
        }
        manifest.added_files.extend(
            result
                .added_files
                .iter()
                .map(|file| file.local_path.as_str().to_owned()),
        );
        manifest.deleted_files.extend(
            result
                .deleted_files
                .iter()
                .map(|file| file.local_path.as_str().to_owned()),
        );
        manifest.merged_files.sort();
        manifest.conflict_files.sort();
        manifest.added_files.sort();
        manifest.deleted_files.sort();
        manifest
    }

    pub fn is_empty(&self) -> bool {
        self.merged_files.is_empty()
            && self.conflict_files.is_empty()
            && self.added_files.is_empty()
            && self.deleted_files.is_empty()
    }

    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        Ok(toml_edit::de::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String, ManifestError> {
        Ok(toml_edit::ser::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        MigrationManifest::parse(&text)
    }

    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let text = self.to_toml()?;
        std::fs::write(path, text).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Writes every staged file of `result` into the working directory under
/// `project_root`, plus the manifest index. Returns the working directory
/// path.
pub fn write_working_directory(
    result: &MigrationResult,
    project_root: &Path,
) -> Result<PathBuf, ManifestError> {
    let working_dir = project_root.join(WORKING_DIR_NAME);
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ManifestError::Io { path, source }
    };
    std::fs::create_dir_all(&working_dir).map_err(io_err(&working_dir))?;
    for outcome in &result.merge_results {
        let dest = outcome.local_path.to_fs_path(&working_dir);
        file_util::write_file_with_parents(&dest, outcome.body.as_bytes())
            .map_err(io_err(&dest))?;
    }
    for added in &result.added_files {
        let dest = added.local_path.to_fs_path(&working_dir);
        file_util::copy_file_with_parents(&added.source, &dest).map_err(io_err(&dest))?;
    }
    let manifest = MigrationManifest::from_result(result);
    manifest.save(&working_dir.join(MANIFEST_FILE))?;
    Ok(working_dir)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn toml_round_trip() {
        let manifest = MigrationManifest {
            merged_files: vec!["android/build.gradle".to_string()],
            conflict_files: vec!["aspen.toml".to_string()],
            added_files: vec!["ios/RunnerTests/Info.plist".to_string()],
            deleted_files: vec!["web/old.js".to_string()],
        };
        let text = manifest.to_toml().unwrap();
        assert_eq!(MigrationManifest::parse(&text).unwrap(), manifest);
    }

    #[test]
    fn parse_known_shape() {
        let manifest = MigrationManifest::parse(indoc! {r#"
            merged_files = ["a.txt"]
            conflict_files = []
            added_files = ["b.txt", "c.txt"]
            deleted_files = []
        "#})
        .unwrap();
        assert_eq!(manifest.merged_files, vec!["a.txt"]);
        assert_eq!(manifest.added_files, vec!["b.txt", "c.txt"]);
        assert!(manifest.conflict_files.is_empty());
        assert!(!manifest.is_empty());
        assert!(MigrationManifest::default().is_empty());
    }
}
