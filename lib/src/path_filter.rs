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

//! Pure predicates deciding which paths the engine may touch.

use crate::platform::MigrateConfig;
use crate::project_path::ProjectPath;

/// Files that always belong to the user, regardless of config. The entry
/// file is also covered by the `lib/` prefix below; it stays listed so the
/// set remains meaningful if the source prefixes ever change.
const STATIC_SKIPPED_FILES: &[&str] = &[
    "lib/main.kt",
    "ios/Runner.xcodeproj/project.pbxproj",
    "README.md",
];

/// Directories whose contents are never template-managed: VCS metadata, the
/// toolkit's build cache, and the user's sources, tests and assets.
const STATIC_SKIPPED_PREFIXES: &[&str] = &[
    ".git/",
    ".aspen_tool/",
    "lib/",
    "test/",
    "assets/",
];

/// Extensions that are replaced wholesale instead of text-merged.
const SKIP_MERGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Whether `path` is on the always-user-owned list. Such paths are absent
/// from every engine output.
pub fn is_statically_skipped(path: &ProjectPath) -> bool {
    STATIC_SKIPPED_FILES
        .iter()
        .any(|file| path.as_str() == *file)
        || STATIC_SKIPPED_PREFIXES
            .iter()
            .any(|prefix| path.starts_with_dir(prefix))
}

/// Whether `path` has a binary-ish extension that should never be handed to
/// the text merge tool.
pub fn is_skip_merge(path: &ProjectPath) -> bool {
    match path.extension() {
        Some(extension) => SKIP_MERGE_EXTENSIONS
            .iter()
            .any(|skip| extension.eq_ignore_ascii_case(skip)),
        None => false,
    }
}

/// Whether the user has declared `path` off-limits, directly or via a
/// directory prefix.
pub fn is_unmanaged(path: &ProjectPath, config: &MigrateConfig) -> bool {
    config
        .unmanaged_paths
        .iter()
        .any(|unmanaged| unmanaged.covers(path))
}
