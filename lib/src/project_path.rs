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
use std::path::{Component, Path, PathBuf};

use thiserror::Error as ThisError;

#[derive(Debug, ThisError, PartialEq, Eq, Clone)]
pub enum ProjectPathError {
    #[error(r#"Path "{0}" is absolute"#)]
    Absolute(String),
    #[error(r#"Path "{0}" contains a "." or ".." component"#)]
    DotComponent(String),
    #[error(r#"Path "{0}" contains an empty component"#)]
    EmptyComponent(String),
    #[error("Path is not valid UTF-8")]
    NotUtf8,
}

/// A file path relative to a project root, with `/` separators. The
/// canonical key for every file the engine touches.
///
/// Never absolute and never contains `.` or `..` components, so joining it
/// onto a root cannot escape that root.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectPath {
    value: String,
}

impl Debug for ProjectPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.write_fmt(format_args!("{:?}", &self.value))
    }
}

impl std::fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.write_str(&self.value)
    }
}

impl ProjectPath {
    pub fn parse(value: impl Into<String>) -> Result<Self, ProjectPathError> {
        let value = value.into();
        if value.starts_with('/') {
            return Err(ProjectPathError::Absolute(value));
        }
        for component in value.split('/') {
            match component {
                "" => return Err(ProjectPathError::EmptyComponent(value)),
                "." | ".." => return Err(ProjectPathError::DotComponent(value)),
                _ => {}
            }
        }
        Ok(ProjectPath { value })
    }

    /// Converts a path produced by walking the filesystem (relative to some
    /// root, in the platform's separator) to its canonical slash form.
    pub fn from_fs_relative(path: &Path) -> Result<Self, ProjectPathError> {
        let mut components = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(name) => {
                    components.push(name.to_str().ok_or(ProjectPathError::NotUtf8)?);
                }
                Component::CurDir => {}
                _ => {
                    return Err(ProjectPathError::Absolute(
                        path.to_string_lossy().into_owned(),
                    ));
                }
            }
        }
        ProjectPath::parse(components.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.value.split('/')
    }

    pub fn file_name(&self) -> &str {
        self.value.rsplit('/').next().unwrap()
    }

    /// The part of the file name after the last `.`, if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(i) if i > 0 => Some(&name[i + 1..]),
            _ => None,
        }
    }

    /// Whether this path is `dir` itself or lies under it. `dir` may be
    /// given with or without a trailing slash.
    pub fn starts_with_dir(&self, dir: &str) -> bool {
        let dir = dir.strip_suffix('/').unwrap_or(dir);
        self.value == dir
            || (self.value.len() > dir.len()
                && self.value.starts_with(dir)
                && self.value.as_bytes()[dir.len()] == b'/')
    }

    pub fn join(&self, component: &str) -> Result<Self, ProjectPathError> {
        ProjectPath::parse(format!("{}/{component}", self.value))
    }

    /// The filesystem location of this path under `root`.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut result = root.to_path_buf();
        result.extend(self.components());
        result
    }
}

impl From<&str> for ProjectPath {
    fn from(value: &str) -> Self {
        ProjectPath::parse(value).unwrap()
    }
}
