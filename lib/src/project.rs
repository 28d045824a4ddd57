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

//! The toolkit's own view of the user's project: its app manifest and the
//! platform languages its scaffolds were generated with.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use crate::file_util;

/// Name of the toolkit's project manifest at the project root.
pub const APP_MANIFEST_FILE: &str = "aspen.toml";

/// Organization used for scaffold generation when the manifest has none.
pub const DEFAULT_ORG: &str = "com.example";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("{path} does not look like a scaffolded project (no {APP_MANIFEST_FILE})")]
    MissingManifest { path: PathBuf },
    #[error("Failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {APP_MANIFEST_FILE}")]
    Parse(#[from] toml_edit::TomlError),
    #[error("{APP_MANIFEST_FILE} has no project name")]
    MissingName,
    #[error(r#""{0}" is not a known project template kind"#)]
    UnknownTemplateKind(String),
}

/// What kind of project the manifest declares. Only apps can be migrated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateKind {
    App,
    Module,
    Plugin,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::App => "app",
            TemplateKind::Module => "module",
            TemplateKind::Plugin => "plugin",
        }
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = ProjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" => Ok(TemplateKind::App),
            "module" => Ok(TemplateKind::Module),
            "plugin" => Ok(TemplateKind::Plugin),
            other => Err(ProjectError::UnknownTemplateKind(other.to_string())),
        }
    }
}

/// The fields of `aspen.toml` the engine needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppManifest {
    pub name: String,
    pub org: String,
    pub template: TemplateKind,
}

impl AppManifest {
    pub fn load(project_root: &Path) -> Result<Self, ProjectError> {
        let path = project_root.join(APP_MANIFEST_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProjectError::MissingManifest {
                    path: project_root.to_path_buf(),
                });
            }
            Err(source) => return Err(ProjectError::Read { path, source }),
        };
        AppManifest::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ProjectError> {
        let doc: DocumentMut = text.parse()?;
        let name = doc
            .get("name")
            .and_then(Item::as_str)
            .ok_or(ProjectError::MissingName)?
            .to_owned();
        let org = doc
            .get("org")
            .and_then(Item::as_str)
            .unwrap_or(DEFAULT_ORG)
            .to_owned();
        let template = match doc.get("template").and_then(Item::as_str) {
            Some(kind) => kind.parse()?,
            None => TemplateKind::App,
        };
        Ok(AppManifest {
            name,
            org,
            template,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AndroidLanguage {
    Kotlin,
    Java,
}

impl AndroidLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AndroidLanguage::Kotlin => "kotlin",
            AndroidLanguage::Java => "java",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IosLanguage {
    Swift,
    ObjC,
}

impl IosLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IosLanguage::Swift => "swift",
            IosLanguage::ObjC => "objc",
        }
    }
}

/// The languages the scaffold generator must be told to use so that the
/// synthetic templates match the user's project.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaffoldLanguages {
    pub android: AndroidLanguage,
    pub ios: IosLanguage,
}

impl Default for ScaffoldLanguages {
    fn default() -> Self {
        ScaffoldLanguages {
            android: AndroidLanguage::Kotlin,
            ios: IosLanguage::Swift,
        }
    }
}

impl ScaffoldLanguages {
    /// Infers the languages from the files present in the user's project.
    /// Defaults win when a platform directory is absent or unreadable.
    pub fn detect(project_root: &Path) -> Self {
        let mut languages = ScaffoldLanguages::default();
        match file_util::list_files_recursively(&project_root.join("android")) {
            Ok(files) => {
                let has = |ext: &str| {
                    files
                        .iter()
                        .any(|file| file.extension() == Some(ext))
                };
                if has("java") && !has("kt") {
                    languages.android = AndroidLanguage::Java;
                }
            }
            Err(err) => tracing::debug!(?err, "could not inspect android sources"),
        }
        match file_util::list_files_recursively(&project_root.join("ios")) {
            Ok(files) => {
                if files.iter().any(|file| file.extension() == Some("m")) {
                    languages.ios = IosLanguage::ObjC;
                }
            }
            Err(err) => tracing::debug!(?err, "could not inspect ios sources"),
        }
        languages
    }
}
