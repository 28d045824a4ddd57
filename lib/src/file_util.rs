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

use std::io;
use std::path::Path;

use crate::project_path::ProjectPath;

/// Lists every regular file under `root`, as sorted project paths. Symlinks
/// are not followed. Returns an empty list if `root` does not exist.
pub fn list_files_recursively(root: &Path) -> io::Result<Vec<ProjectPath>> {
    let mut result = vec![];
    if !root.is_dir() {
        return Ok(result);
    }
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        for entry in dir.read_dir()? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                dirs.push(entry.path());
            } else if file_type.is_file() {
                let relative = entry
                    .path()
                    .strip_prefix(root)
                    .expect("entry must be under the walked root")
                    .to_path_buf();
                let path = ProjectPath::from_fs_relative(&relative).map_err(|err| {
                    io::Error::new(io::ErrorKind::InvalidData, err.to_string())
                })?;
                result.push(path);
            }
        }
    }
    result.sort();
    Ok(result)
}

/// Writes `contents`, creating missing parent directories.
pub fn write_file_with_parents(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
}

/// Copies `source` to `dest`, creating missing parent directories.
pub fn copy_file_with_parents(source: &Path, dest: &Path) -> io::Result<u64> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(source, dest)
}
