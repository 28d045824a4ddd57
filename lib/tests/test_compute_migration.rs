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

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use testutils::{TemplateSet, TestProject};
use uplift_lib::merge::MergedBody;
use uplift_lib::metadata::ProjectMetadata;
use uplift_lib::migrate::{compute_migration, MigrateError, MigrationResult, WORKING_DIR_NAME};
use uplift_lib::platform::{PlatformTag, UnmanagedPath};
use uplift_lib::revision::RevisionId;

use crate::fixtures::*;

fn outcome_for<'a>(
    result: &'a MigrationResult,
    path: &str,
) -> &'a uplift_lib::merge::MergeOutcome {
    result
        .merge_results
        .iter()
        .find(|outcome| outcome.local_path.as_str() == path)
        .unwrap_or_else(|| panic!("no merge outcome for {path}"))
}

#[test]
fn test_unmodified_project_classifications() {
    let fixture = standard_fixture();
    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();

    assert_eq!(
        merged_paths(&result),
        vec![
            ".uplift.toml",
            "android/build.gradle",
            "config.toml",
            "icon.png"
        ]
    );
    assert_eq!(added_paths(&result), vec!["ios/RunnerTests/Info.plist"]);
    assert_eq!(deleted_paths(&result), vec!["android/settings.gradle"]);
    // Every merge on an unmodified project just takes the target.
    assert!(result.merge_results.iter().all(|outcome| !outcome.has_conflict));
}

#[test]
fn test_identical_revisions_produce_empty_result() {
    let mut templates = TemplateSet::new(TARGET_REV);
    for (path, contents) in target_template_files() {
        templates.add_file(TARGET_REV, path, contents.as_bytes());
    }
    templates.add_file(TARGET_REV, "icon.png", png_bytes(2));
    let project = TestProject::new();
    project.seed_from_template(
        &templates,
        TARGET_REV,
        &[PlatformTag::Android, PlatformTag::Ios],
    );
    let fixture = env_fixture(project, templates);

    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_user_edit_with_unchanged_template_is_left_alone() {
    let fixture = standard_fixture();
    // The template has the same gradle.properties in base and target.
    fixture
        .project
        .write_file("android/gradle.properties", "jvmargs=-Xmx4g\n");
    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    assert!(!all_output_paths(&result).contains(&"android/gradle.properties"));
}

#[test]
fn test_template_only_change_takes_target() {
    let fixture = standard_fixture();
    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    let outcome = outcome_for(&result, "android/build.gradle");
    assert!(!outcome.has_conflict);
    assert_eq!(
        outcome.body,
        MergedBody::Text("plugins {\n    id 'upgrade'\n}\n".to_string())
    );
}

#[test]
fn test_three_way_merge_combines_disjoint_edits() {
    let fixture = standard_fixture();
    fixture
        .project
        .write_file("config.toml", "top\nalpha\nbeta\ngamma\n");
    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    let outcome = outcome_for(&result, "config.toml");
    assert!(!outcome.has_conflict);
    assert_eq!(
        outcome.body,
        MergedBody::Text("top\nalpha\nbeta\ngamma\ndelta\n".to_string())
    );
}

#[test]
fn test_three_way_merge_conflicts_on_same_line() {
    let fixture = standard_fixture();
    fixture
        .project
        .write_file("android/build.gradle", "plugins {\n    id 'custom'\n}\n");
    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    let outcome = outcome_for(&result, "android/build.gradle");
    assert!(outcome.has_conflict);
    assert_eq!(outcome.conflict_count, 1);
    let MergedBody::Text(body) = &outcome.body else {
        panic!("conflicted text merge must stay text");
    };
    assert!(body.contains("<<<<<<< current"));
    assert!(body.contains("    id 'custom'"));
    assert!(body.contains("    id 'upgrade'"));
    assert!(body.contains(">>>>>>> target"));
}

#[test]
fn test_target_added_file_is_classified_added() {
    let fixture = standard_fixture();
    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    assert_eq!(added_paths(&result), vec!["ios/RunnerTests/Info.plist"]);
    assert!(!merged_paths(&result).contains(&"ios/RunnerTests/Info.plist"));
}

#[test]
fn test_unmanaged_paths_produce_no_outputs() {
    let mut templates = standard_templates();
    templates.add_file(TARGET_REV, "vendor/generated.txt", b"generated\n");
    let fixture = fixture_with_templates(templates);
    fixture.project.write_file(
        ".uplift.toml",
        format!("unmanaged_files = [\"vendor/\"]\n{}", metadata_toml(BASE_REV)),
    );
    fixture
        .project
        .write_file("vendor/custom.txt", "user-owned\n");

    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    assert!(all_output_paths(&result)
        .iter()
        .all(|path| !path.starts_with("vendor/")));

    // The metadata file reaches the custom merger: the target's version
    // lands while the user's unmanaged declaration survives.
    let outcome = outcome_for(&result, ".uplift.toml");
    assert!(!outcome.has_conflict);
    let MergedBody::Text(body) = &outcome.body else {
        panic!("metadata merge must produce text");
    };
    let merged = ProjectMetadata::parse(body).unwrap();
    assert_eq!(merged.version_revision, Some(RevisionId::from(TARGET_REV)));
    assert!(merged
        .unmanaged_paths
        .contains(&UnmanagedPath::parse("vendor/").unwrap()));
}

#[test]
fn test_unreachable_base_revision_falls_back_to_target() {
    let fixture = standard_fixture();
    fixture
        .project
        .write_file(".uplift.toml", metadata_toml("gone9999"));

    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    // The whole run is served by the target SDK; nothing is declared
    // missing.
    assert_eq!(
        result.sdk_dirs.keys().collect::<Vec<_>>(),
        vec![&RevisionId::from(TARGET_REV)]
    );
    assert!(added_paths(&result).is_empty());
    assert!(deleted_paths(&result).is_empty());
    // With base == target, project edits are the user's own; only the
    // wholesale-replaced binary is staged.
    assert_eq!(merged_paths(&result), vec!["icon.png"]);
}

#[test]
fn test_unmodified_deleted_file_is_classified_deleted() {
    let fixture = standard_fixture();
    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    assert_eq!(deleted_paths(&result), vec!["android/settings.gradle"]);
    let deleted = &result.deleted_files[0];
    assert_eq!(
        deleted.source,
        deleted.local_path.to_fs_path(fixture.project.root())
    );
}

#[test]
fn test_modified_deleted_file_surfaces_as_conflict() {
    let fixture = standard_fixture();
    fixture
        .project
        .write_file("android/settings.gradle", "include ':application'\n");
    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    assert!(deleted_paths(&result).is_empty());
    let outcome = outcome_for(&result, "android/settings.gradle");
    assert!(outcome.has_conflict);
    let MergedBody::Text(body) = &outcome.body else {
        panic!("expected a text conflict body");
    };
    assert!(body.contains("include ':application'"));
    assert!(body.contains("<<<<<<< current"));
}

#[test]
fn test_binary_file_degrades_to_target_bytes() {
    let mut templates = standard_templates();
    templates.add_file(BASE_REV, "data.bin", [0u8, 159, 9]);
    templates.add_file(TARGET_REV, "data.bin", [0u8, 160, 9]);
    let fixture = fixture_with_templates(templates);
    fixture.project.write_file("data.bin", [7u8, 7, 7]);

    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    let outcome = outcome_for(&result, "data.bin");
    assert!(!outcome.has_conflict);
    assert_eq!(outcome.body, MergedBody::Binary(vec![0, 160, 9]));
}

#[test]
fn test_skip_merge_extension_is_replaced_wholesale() {
    let fixture = standard_fixture();
    // Even a user-modified image is replaced, never text-merged.
    fixture.project.write_file("icon.png", png_bytes(77));
    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    let outcome = outcome_for(&result, "icon.png");
    assert!(!outcome.has_conflict);
    assert_eq!(outcome.body, MergedBody::Binary(png_bytes(2)));
}

#[test]
fn test_user_created_file_also_added_by_target_is_merged_not_added() {
    let mut templates = standard_templates();
    templates.add_file(TARGET_REV, "notes.cfg", b"from-template\n");
    let fixture = fixture_with_templates(templates);
    fixture.project.write_file("notes.cfg", "from-user\n");

    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    let outcome = outcome_for(&result, "notes.cfg");
    assert!(outcome.has_conflict);
    assert!(!added_paths(&result).contains(&"notes.cfg"));
}

#[test]
fn test_user_only_files_are_left_alone() {
    let fixture = standard_fixture();
    fixture.project.write_file("docs/notes.md", "scratch\n");
    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    assert!(!all_output_paths(&result).contains(&"docs/notes.md"));
}

#[test]
fn test_static_skip_list_never_appears_in_outputs() {
    let mut templates = standard_templates();
    // The target rewrites the entry file and the README; both stay
    // user-owned.
    templates.add_file(TARGET_REV, "lib/main.kt", b"fun main() { upgraded() }\n");
    templates.add_file(TARGET_REV, "README.md", b"# counter v2\n");
    let fixture = fixture_with_templates(templates);

    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    let outputs = all_output_paths(&result);
    assert!(!outputs.contains(&"lib/main.kt"));
    assert!(!outputs.contains(&"README.md"));
    assert!(outputs.iter().all(|path| !path.starts_with("lib/")));
}

#[test]
fn test_vcs_ignored_files_are_skipped() {
    let fixture = standard_fixture();
    fixture.project.write_file("build/out.txt", "artifact\n");
    let result = compute_migration(&fixture.env, &fixture.options()).unwrap();
    let outputs = all_output_paths(&result);
    assert!(outputs.iter().all(|path| !path.starts_with("build/")));
    // local.properties differs in the target but is covered by gitignore.
    assert!(!outputs.contains(&"android/local.properties"));
}

#[test]
fn test_existing_working_directory_is_a_recoverable_error() {
    let fixture = standard_fixture();
    std::fs::create_dir_all(fixture.project.root().join(WORKING_DIR_NAME)).unwrap();
    let result = compute_migration(&fixture.env, &fixture.options());
    assert_matches!(result, Err(MigrateError::WorkingDirectoryExists { .. }));
}

#[test]
fn test_module_projects_are_unsupported() {
    let fixture = standard_fixture();
    fixture
        .project
        .write_file("aspen.toml", "name = \"counter\"\ntemplate = \"module\"\n");
    let result = compute_migration(&fixture.env, &fixture.options());
    assert_matches!(result, Err(MigrateError::UnsupportedProjectShape { .. }));
}

#[test]
fn test_cancellation_is_respected() {
    let fixture = standard_fixture();
    fixture.env.request_cancellation();
    let result = compute_migration(&fixture.env, &fixture.options());
    assert_matches!(result, Err(MigrateError::Cancelled));
}

#[test]
fn test_platform_filter_restricts_the_migration() {
    let fixture = standard_fixture();
    let mut options = fixture.options();
    options.platforms = Some(vec![PlatformTag::Ios]);
    let result = compute_migration(&fixture.env, &options).unwrap();
    // Android was filtered out of the config, so its template files are
    // never generated and nothing android-specific is staged.
    assert!(all_output_paths(&result)
        .iter()
        .all(|path| !path.starts_with("android/")));
    assert_eq!(added_paths(&result), vec!["ios/RunnerTests/Info.plist"]);
}

#[test]
fn test_results_are_stable_across_reruns() {
    let fixture = standard_fixture();
    fixture
        .project
        .write_file("config.toml", "top\nalpha\nbeta\ngamma\n");
    let first = compute_migration(&fixture.env, &fixture.options()).unwrap();
    let second = compute_migration(&fixture.env, &fixture.options()).unwrap();
    assert_eq!(merged_paths(&first), merged_paths(&second));
    assert_eq!(added_paths(&first), added_paths(&second));
    assert_eq!(deleted_paths(&first), deleted_paths(&second));
    for (left, right) in first.merge_results.iter().zip(&second.merge_results) {
        assert_eq!(left.body, right.body);
        assert_eq!(left.has_conflict, right.has_conflict);
    }
}
