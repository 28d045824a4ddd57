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

use std::str::FromStr;

use indexmap::IndexMap;
use thiserror::Error;

use crate::project_path::{ProjectPath, ProjectPathError};
use crate::revision::RevisionId;

/// The platforms a scaffolded project can carry. `Root` is a pseudo-platform
/// for the top-level, platform-agnostic template files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlatformTag {
    Root,
    Android,
    Ios,
    Macos,
    Linux,
    Windows,
    Web,
}

impl PlatformTag {
    pub const ALL: [PlatformTag; 7] = [
        PlatformTag::Root,
        PlatformTag::Android,
        PlatformTag::Ios,
        PlatformTag::Macos,
        PlatformTag::Linux,
        PlatformTag::Windows,
        PlatformTag::Web,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformTag::Root => "root",
            PlatformTag::Android => "android",
            PlatformTag::Ios => "ios",
            PlatformTag::Macos => "macos",
            PlatformTag::Linux => "linux",
            PlatformTag::Windows => "windows",
            PlatformTag::Web => "web",
        }
    }
}

impl std::fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error(r#""{0}" is not a known platform"#)]
pub struct UnknownPlatformError(pub String);

impl FromStr for PlatformTag {
    type Err = UnknownPlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlatformTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| UnknownPlatformError(s.to_string()))
    }
}

/// Which toolkit revision generated a platform's scaffold and which it was
/// last migrated to. Absent revisions trigger the fallback policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformConfig {
    pub platform: PlatformTag,
    pub base_revision: Option<RevisionId>,
    pub create_revision: Option<RevisionId>,
}

/// A project path the user has declared off-limits to the engine. A `Dir`
/// entry covers everything beneath it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnmanagedPath {
    File(ProjectPath),
    Dir(ProjectPath),
}

impl UnmanagedPath {
    /// Parses a config entry; a trailing separator designates a directory.
    pub fn parse(value: &str) -> Result<Self, ProjectPathError> {
        match value.strip_suffix('/') {
            Some(dir) => Ok(UnmanagedPath::Dir(ProjectPath::parse(dir)?)),
            None => Ok(UnmanagedPath::File(ProjectPath::parse(value)?)),
        }
    }

    pub fn covers(&self, path: &ProjectPath) -> bool {
        match self {
            UnmanagedPath::File(file) => file == path,
            UnmanagedPath::Dir(dir) => path.starts_with_dir(dir.as_str()),
        }
    }

    /// The config rendering, with a trailing slash for directories.
    pub fn to_config_string(&self) -> String {
        match self {
            UnmanagedPath::File(file) => file.as_str().to_owned(),
            UnmanagedPath::Dir(dir) => format!("{}/", dir.as_str()),
        }
    }
}

/// Per-platform revision records plus the user's unmanaged paths; the
/// resolver's and classifier's input.
#[derive(Clone, Debug, Default)]
pub struct MigrateConfig {
    pub platform_configs: IndexMap<PlatformTag, PlatformConfig>,
    pub unmanaged_paths: Vec<UnmanagedPath>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_tag_round_trip() {
        for tag in PlatformTag::ALL {
            assert_eq!(tag.as_str().parse::<PlatformTag>(), Ok(tag));
        }
        assert_eq!(
            "amiga".parse::<PlatformTag>(),
            Err(UnknownPlatformError("amiga".to_string()))
        );
    }

    #[test]
    fn unmanaged_path_parse() {
        assert_eq!(
            UnmanagedPath::parse("vendor/").unwrap(),
            UnmanagedPath::Dir(ProjectPath::from("vendor"))
        );
        assert_eq!(
            UnmanagedPath::parse("lib/secrets.kt").unwrap(),
            UnmanagedPath::File(ProjectPath::from("lib/secrets.kt"))
        );
        assert!(UnmanagedPath::parse("/abs").is_err());
    }

    #[test]
    fn unmanaged_path_covers() {
        let dir = UnmanagedPath::parse("vendor/").unwrap();
        assert!(dir.covers(&ProjectPath::from("vendor/anything.txt")));
        assert!(dir.covers(&ProjectPath::from("vendor/sub/deep.txt")));
        assert!(!dir.covers(&ProjectPath::from("vendored/file.txt")));

        let file = UnmanagedPath::parse("lib/secrets.kt").unwrap();
        assert!(file.covers(&ProjectPath::from("lib/secrets.kt")));
        assert!(!file.covers(&ProjectPath::from("lib/secrets.kt.bak")));
    }

    #[test]
    fn unmanaged_path_config_string_round_trip() {
        for entry in ["vendor/", "lib/secrets.kt"] {
            assert_eq!(
                UnmanagedPath::parse(entry).unwrap().to_config_string(),
                entry
            );
        }
    }
}
