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

use pretty_assertions::assert_eq;
use uplift_lib::manifest::{write_working_directory, MigrationManifest, MANIFEST_FILE};
use uplift_lib::migrate::compute_migration;

use crate::fixtures::*;

#[test]
fn test_working_directory_holds_every_staged_file() {
    let fixture = standard_fixture();
    fixture
        .project
        .write_file("android/build.gradle", "plugins {\n    id 'custom'\n}\n");
    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();

    let working_dir = write_working_directory(&result, fixture.project.root()).unwrap();
    // Merged bodies land at their original relative paths.
    for outcome in &result.merge_results {
        let staged = std::fs::read(outcome.local_path.to_fs_path(&working_dir)).unwrap();
        assert_eq!(staged, outcome.body.as_bytes());
    }
    // Added files are copied byte-for-byte from the target template.
    for added in &result.added_files {
        let staged = std::fs::read(added.local_path.to_fs_path(&working_dir)).unwrap();
        assert_eq!(staged, std::fs::read(&added.source).unwrap());
    }
    // Deleted files are only listed, never staged.
    for deleted in &result.deleted_files {
        assert!(!deleted.local_path.to_fs_path(&working_dir).exists());
    }

    let manifest = MigrationManifest::load(&working_dir.join(MANIFEST_FILE)).unwrap();
    assert_eq!(manifest, MigrationManifest::from_result(&result));
    assert_eq!(manifest.conflict_files, vec!["android/build.gradle"]);
    assert_eq!(manifest.added_files, vec!["ios/RunnerTests/Info.plist"]);
    assert_eq!(manifest.deleted_files, vec!["android/settings.gradle"]);
    assert_eq!(
        manifest.merged_files,
        vec![".uplift.toml", "config.toml", "icon.png"]
    );
}

#[test]
fn test_empty_migration_writes_empty_manifest() {
    let fixture = standard_fixture();
    // Migrating to the base revision itself stages nothing.
    let mut options = fixture.options();
    options.target_revision = Some(BASE_REV.into());
    let result = compute_migration(&fixture.env, &options).unwrap();
    assert!(result.is_empty());

    let working_dir = write_working_directory(&result, fixture.project.root()).unwrap();
    let manifest = MigrationManifest::load(&working_dir.join(MANIFEST_FILE)).unwrap();
    assert!(manifest.is_empty());
}

#[test]
fn test_reruns_write_byte_identical_manifests() {
    let fixture = standard_fixture();
    fixture
        .project
        .write_file("config.toml", "top\nalpha\nbeta\ngamma\n");

    let manifest_bytes = |fixture: &Fixture| {
        let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
        let working_dir = write_working_directory(&result, fixture.project.root()).unwrap();
        let bytes = std::fs::read(working_dir.join(MANIFEST_FILE)).unwrap();
        std::fs::remove_dir_all(&working_dir).unwrap();
        bytes
    };
    assert_eq!(manifest_bytes(&fixture), manifest_bytes(&fixture));
}
