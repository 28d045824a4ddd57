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

//! A scripted pair of toolkit revisions exercising every classification:
//! template-only changes, a deleted file, an added file, and files no side
//! touches.

use std::sync::Arc;

use testutils::{FakeCommandRunner, TemplateSet, TestProject};
use uplift_lib::migrate::{MigrateEnv, MigrateOptions, MigrationResult};
use uplift_lib::platform::PlatformTag;

pub const BASE_REV: &str = "aaaa1111";
pub const TARGET_REV: &str = "bbbb2222";

pub fn metadata_toml(revision: &str) -> String {
    let mut text = format!("version_revision = \"{revision}\"\n");
    for platform in ["root", "android", "ios"] {
        text.push_str(&format!(
            "\n[platforms.{platform}]\nbase_revision = \"{revision}\"\ncreate_revision = \
             \"{revision}\"\n"
        ));
    }
    text
}

fn shared_files(revision: &str) -> Vec<(&'static str, String)> {
    vec![
        (
            "aspen.toml",
            "name = \"counter\"\norg = \"com.example\"\n".to_string(),
        ),
        (".uplift.toml", metadata_toml(revision)),
        (
            ".gitignore",
            ".aspen_tool/\nbuild/\nandroid/local.properties\n".to_string(),
        ),
        ("README.md", "# counter\n".to_string()),
        ("lib/main.kt", "fun main() {}\n".to_string()),
        (
            "ios/Runner/Info.plist",
            "<plist><key>CFBundleName</key></plist>\n".to_string(),
        ),
        ("android/gradle.properties", "jvmargs=-Xmx2g\n".to_string()),
    ]
}

/// The base revision's template tree.
pub fn base_template_files() -> Vec<(&'static str, String)> {
    let mut files = shared_files(BASE_REV);
    files.extend([
        ("config.toml", "alpha\nbeta\ngamma\n".to_string()),
        ("android/build.gradle", "plugins {\n}\n".to_string()),
        ("android/settings.gradle", "include ':app'\n".to_string()),
        ("android/local.properties", "sdk.dir=/old\n".to_string()),
    ]);
    files
}

/// The target revision's template tree: `config.toml` gains a line,
/// `android/build.gradle` changes, `android/settings.gradle` is dropped,
/// `ios/RunnerTests/Info.plist` and a new icon appear.
pub fn target_template_files() -> Vec<(&'static str, String)> {
    let mut files = shared_files(TARGET_REV);
    files.extend([
        ("config.toml", "alpha\nbeta\ngamma\ndelta\n".to_string()),
        (
            "android/build.gradle",
            "plugins {\n    id 'upgrade'\n}\n".to_string(),
        ),
        (
            "ios/RunnerTests/Info.plist",
            "<plist><key>TestBundle</key></plist>\n".to_string(),
        ),
        ("android/local.properties", "sdk.dir=/new\n".to_string()),
    ]);
    files
}

/// A not-quite-PNG whose first bytes are invalid UTF-8, like the real
/// format.
pub fn png_bytes(seed: u8) -> Vec<u8> {
    vec![0x89, b'P', b'N', b'G', seed]
}

pub fn standard_templates() -> TemplateSet {
    let mut templates = TemplateSet::new(TARGET_REV);
    for (path, contents) in base_template_files() {
        templates.add_file(BASE_REV, path, contents.as_bytes());
    }
    for (path, contents) in target_template_files() {
        templates.add_file(TARGET_REV, path, contents.as_bytes());
    }
    templates.add_file(BASE_REV, "icon.png", png_bytes(1));
    templates.add_file(TARGET_REV, "icon.png", png_bytes(2));
    templates
}

pub struct Fixture {
    pub project: TestProject,
    pub env: MigrateEnv,
}

impl Fixture {
    pub fn options(&self) -> MigrateOptions {
        MigrateOptions::new(self.project.root())
    }
}

/// A project scaffolded at the base revision, migrating to the target
/// revision installed in the fake SDK.
pub fn standard_fixture() -> Fixture {
    fixture_with_templates(standard_templates())
}

pub fn fixture_with_templates(templates: TemplateSet) -> Fixture {
    let project = TestProject::new();
    project.seed_from_template(
        &templates,
        BASE_REV,
        &[PlatformTag::Android, PlatformTag::Ios],
    );
    env_fixture(project, templates)
}

pub fn env_fixture(project: TestProject, templates: TemplateSet) -> Fixture {
    let env = MigrateEnv::new(
        Arc::new(FakeCommandRunner::new(templates)),
        "/opt/aspen-sdk",
    );
    Fixture { project, env }
}

pub fn merged_paths(result: &MigrationResult) -> Vec<&str> {
    result
        .merge_results
        .iter()
        .map(|outcome| outcome.local_path.as_str())
        .collect()
}

pub fn added_paths(result: &MigrationResult) -> Vec<&str> {
    result
        .added_files
        .iter()
        .map(|file| file.local_path.as_str())
        .collect()
}

pub fn deleted_paths(result: &MigrationResult) -> Vec<&str> {
    result
        .deleted_files
        .iter()
        .map(|file| file.local_path.as_str())
        .collect()
}

pub fn all_output_paths(result: &MigrationResult) -> Vec<&str> {
    let mut paths = merged_paths(result);
    paths.extend(added_paths(result));
    paths.extend(deleted_paths(result));
    paths
}
