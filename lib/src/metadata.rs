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

//! The migration metadata file: which revisions generated each platform's
//! scaffold and which paths the engine must leave alone.

use std::path::Path;

use indexmap::IndexMap;
use thiserror::Error;
use toml_edit::{value, Array, DocumentMut, Item, Table};

use crate::merge::{CustomMerger, MergeError, MergeOutcome, MergedBody};
use crate::platform::{MigrateConfig, PlatformConfig, PlatformTag, UnmanagedPath};
use crate::project_path::ProjectPath;
use crate::revision::RevisionId;

/// Name of the metadata file at the project root.
pub const METADATA_FILE: &str = ".uplift.toml";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to read {path}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse migration metadata")]
    Parse(#[from] toml_edit::TomlError),
    #[error("Invalid migration metadata: {0}")]
    Invalid(String),
}

/// Parsed contents of [`METADATA_FILE`]. A missing file loads as the
/// default value; the engine must tolerate projects without prior state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProjectMetadata {
    /// Toolkit revision the project was last created or migrated with.
    pub version_revision: Option<RevisionId>,
    pub platforms: IndexMap<PlatformTag, PlatformConfig>,
    pub unmanaged_paths: Vec<UnmanagedPath>,
}

impl ProjectMetadata {
    pub fn load(project_root: &Path) -> Result<Self, MetadataError> {
        let path = project_root.join(METADATA_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ProjectMetadata::default());
            }
            Err(source) => return Err(MetadataError::Read { path, source }),
        };
        ProjectMetadata::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, MetadataError> {
        let doc: DocumentMut = text.parse()?;
        let version_revision = doc
            .get("version_revision")
            .and_then(Item::as_str)
            .map(RevisionId::new);

        let mut platforms = IndexMap::new();
        if let Some(table) = doc.get("platforms").and_then(Item::as_table) {
            for (name, item) in table.iter() {
                let tag: PlatformTag = name
                    .parse()
                    .map_err(|err| MetadataError::Invalid(format!("{err}")))?;
                let revision_of = |key: &str| {
                    item.as_table_like()
                        .and_then(|table| table.get(key))
                        .and_then(Item::as_str)
                        .map(RevisionId::new)
                };
                platforms.insert(
                    tag,
                    PlatformConfig {
                        platform: tag,
                        base_revision: revision_of("base_revision"),
                        create_revision: revision_of("create_revision"),
                    },
                );
            }
        }

        let mut unmanaged_paths = vec![];
        if let Some(array) = doc.get("unmanaged_files").and_then(Item::as_array) {
            for entry in array.iter() {
                let entry = entry.as_str().ok_or_else(|| {
                    MetadataError::Invalid("unmanaged_files entries must be strings".to_string())
                })?;
                let path = UnmanagedPath::parse(entry)
                    .map_err(|err| MetadataError::Invalid(format!("{err}")))?;
                unmanaged_paths.push(path);
            }
        }

        Ok(ProjectMetadata {
            version_revision,
            platforms,
            unmanaged_paths,
        })
    }

    pub fn to_toml(&self) -> String {
        let mut doc = DocumentMut::new();
        if let Some(revision) = &self.version_revision {
            doc["version_revision"] = value(revision.as_str());
        }
        if !self.unmanaged_paths.is_empty() {
            let mut array = Array::new();
            for path in &self.unmanaged_paths {
                array.push(path.to_config_string());
            }
            doc["unmanaged_files"] = value(array);
        }
        if !self.platforms.is_empty() {
            let mut platforms = Table::new();
            platforms.set_implicit(true);
            for (tag, config) in &self.platforms {
                let mut table = Table::new();
                if let Some(revision) = &config.base_revision {
                    table["base_revision"] = value(revision.as_str());
                }
                if let Some(revision) = &config.create_revision {
                    table["create_revision"] = value(revision.as_str());
                }
                platforms.insert(tag.as_str(), Item::Table(table));
            }
            doc.insert("platforms", Item::Table(platforms));
        }
        doc.to_string()
    }

    pub fn migrate_config(&self) -> MigrateConfig {
        MigrateConfig {
            platform_configs: self.platforms.clone(),
            unmanaged_paths: self.unmanaged_paths.clone(),
        }
    }
}

/// Semantic merger for the metadata file. A text merge of two revision
/// tables is never what the user wants; instead the target's version fields
/// are applied while the user's own records survive.
pub struct MetadataMerger;

impl MetadataMerger {
    fn merge_metadata(current: &ProjectMetadata, target: &ProjectMetadata) -> ProjectMetadata {
        let mut platforms = IndexMap::new();
        for (tag, target_config) in &target.platforms {
            let merged = match current.platforms.get(tag) {
                Some(current_config) => PlatformConfig {
                    platform: *tag,
                    // The new baseline comes from the target; when the
                    // project was created is user history.
                    base_revision: target_config
                        .base_revision
                        .clone()
                        .or_else(|| current_config.base_revision.clone()),
                    create_revision: current_config
                        .create_revision
                        .clone()
                        .or_else(|| target_config.create_revision.clone()),
                },
                None => target_config.clone(),
            };
            platforms.insert(*tag, merged);
        }
        for (tag, current_config) in &current.platforms {
            if !platforms.contains_key(tag) {
                platforms.insert(*tag, current_config.clone());
            }
        }

        let mut unmanaged_paths = current.unmanaged_paths.clone();
        for path in &target.unmanaged_paths {
            if !unmanaged_paths.contains(path) {
                unmanaged_paths.push(path.clone());
            }
        }

        ProjectMetadata {
            version_revision: target
                .version_revision
                .clone()
                .or_else(|| current.version_revision.clone()),
            platforms,
            unmanaged_paths,
        }
    }
}

impl CustomMerger for MetadataMerger {
    fn matches(&self, path: &ProjectPath) -> bool {
        path.as_str() == METADATA_FILE
    }

    fn merge(
        &self,
        path: &ProjectPath,
        current: &[u8],
        _base: Option<&[u8]>,
        target: &[u8],
    ) -> Result<MergeOutcome, MergeError> {
        let parse = |bytes: &[u8]| -> Result<ProjectMetadata, MergeError> {
            let text = std::str::from_utf8(bytes).map_err(|err| MergeError::Custom {
                path: path.as_str().to_owned(),
                source: Box::new(err),
            })?;
            ProjectMetadata::parse(text).map_err(|err| MergeError::Custom {
                path: path.as_str().to_owned(),
                source: Box::new(err),
            })
        };
        let merged = MetadataMerger::merge_metadata(&parse(current)?, &parse(target)?);
        Ok(MergeOutcome {
            local_path: path.clone(),
            body: MergedBody::Text(merged.to_toml()),
            has_conflict: false,
            conflict_count: 0,
        })
    }
}
