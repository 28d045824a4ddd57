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

//! Test fixtures for the uplift-lib crate: temp dirs, project scaffolds,
//! and a fake [`CommandRunner`] that implements the external `git`/`aspen`
//! contract in-process so engine tests need no real binaries.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use tempfile::TempDir;
use uplift_lib::exec::{CommandOutput, CommandRunner, ExecError, Invocation};
use uplift_lib::platform::PlatformTag;
use uplift_lib::toolkit::TOOLKIT_BIN;

mod fake_git;

pub use fake_git::{merge_three_way, render_patch};

pub fn new_temp_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("uplift-test-")
        .tempdir()
        .unwrap()
}

/// Checks that every `test_*.rs` under `test_dir` is declared as a module
/// in the `runner.rs` harness.
pub fn assert_no_forgotten_test_files(test_dir: &Path) {
    let runner_path = test_dir.join("runner.rs");
    let runner = std::fs::read_to_string(&runner_path).unwrap();
    let entries = std::fs::read_dir(test_dir).unwrap();
    for entry in entries {
        let path = entry.unwrap().path();
        if let Some(ext) = path.extension() {
            let name = path.file_stem().unwrap();
            if ext == "rs" && name != "runner" {
                let search = format!("mod {};", name.to_str().unwrap());
                assert!(
                    runner.contains(&search),
                    "missing `{search}` declaration in {}",
                    runner_path.display()
                );
            }
        }
    }
}

/// A scaffolded project rooted in its own temp dir.
pub struct TestProject {
    _temp_dir: TempDir,
    root: PathBuf,
}

impl TestProject {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let temp_dir = new_temp_dir();
        let root = temp_dir.path().join("project");
        std::fs::create_dir_all(&root).unwrap();
        TestProject {
            _temp_dir: temp_dir,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write_file(&self, path: &str, contents: impl AsRef<[u8]>) {
        let path = self.root.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    pub fn read_file(&self, path: &str) -> Vec<u8> {
        std::fs::read(self.root.join(path)).unwrap()
    }

    pub fn read_string(&self, path: &str) -> String {
        String::from_utf8(self.read_file(path)).unwrap()
    }

    pub fn delete_file(&self, path: &str) {
        std::fs::remove_file(self.root.join(path)).unwrap();
    }

    /// Seeds the project with a template's files, the way the scaffold
    /// generator would lay them out: root files plus the listed platform
    /// scaffolds.
    pub fn seed_from_template(
        &self,
        templates: &TemplateSet,
        revision: &str,
        platforms: &[PlatformTag],
    ) {
        for (path, contents) in templates.files_for(revision, platforms) {
            self.write_file(&path, contents);
        }
    }
}

/// The scripted toolkit: which template tree each revision generates, and
/// which revisions cannot be cloned at all.
#[derive(Clone, Debug, Default)]
pub struct TemplateSet {
    installed_revision: String,
    revisions: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    unreachable: BTreeSet<String>,
}

impl TemplateSet {
    pub fn new(installed_revision: &str) -> Self {
        TemplateSet {
            installed_revision: installed_revision.to_string(),
            revisions: BTreeMap::new(),
            unreachable: BTreeSet::new(),
        }
    }

    pub fn installed_revision(&self) -> &str {
        &self.installed_revision
    }

    pub fn add_file(&mut self, revision: &str, path: &str, contents: impl AsRef<[u8]>) {
        self.revisions
            .entry(revision.to_string())
            .or_default()
            .insert(path.to_string(), contents.as_ref().to_vec());
    }

    /// Makes `clone` fail for `revision` even if it has template files.
    pub fn mark_unreachable(&mut self, revision: &str) {
        self.unreachable.insert(revision.to_string());
    }

    fn is_cloneable(&self, revision: &str) -> bool {
        self.revisions.contains_key(revision) && !self.unreachable.contains(revision)
    }

    /// The files `create` would generate at `revision` for the given
    /// platform list: root files always, platform directories only when
    /// requested.
    pub fn files_for(
        &self,
        revision: &str,
        platforms: &[PlatformTag],
    ) -> Vec<(String, Vec<u8>)> {
        let Some(files) = self.revisions.get(revision) else {
            return vec![];
        };
        files
            .iter()
            .filter(|(path, _)| {
                let first = path.split('/').next().unwrap();
                match first.parse::<PlatformTag>() {
                    Ok(platform) if platform != PlatformTag::Root => {
                        platforms.contains(&platform)
                    }
                    _ => true,
                }
            })
            .map(|(path, contents)| (path.clone(), contents.clone()))
            .collect_vec()
    }
}

/// [`CommandRunner`] that emulates the external tools the engine drives:
/// `git init`/`check-ignore`/`diff --no-index`/`merge-file`/`rev-parse`,
/// and `aspen clone`/`create` against a [`TemplateSet`].
#[derive(Debug)]
pub struct FakeCommandRunner {
    templates: TemplateSet,
}

impl FakeCommandRunner {
    pub fn new(templates: TemplateSet) -> Self {
        FakeCommandRunner { templates }
    }

    fn output(exit_code: i32, stdout: impl Into<Vec<u8>>, stderr: &str) -> CommandOutput {
        CommandOutput {
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    fn handle_git(&self, args: &[String]) -> CommandOutput {
        match args {
            [init, dir] if init == "init" => {
                if std::fs::create_dir_all(Path::new(dir).join(".git")).is_err() {
                    return Self::output(128, "", "fatal: could not create repository");
                }
                Self::output(0, "", "")
            }
            [dash_c, repo, check, path] if dash_c == "-C" && check == "check-ignore" => {
                let ignored = is_ignored_by_fake_rules(Path::new(repo), path);
                Self::output(if ignored { 0 } else { 1 }, "", "")
            }
            [dash_c, _repo, rev_parse, head] if dash_c == "-C" && rev_parse == "rev-parse" && head == "HEAD" => {
                Self::output(0, format!("{}\n", self.templates.installed_revision), "")
            }
            [diff, no_index, left, right] if diff == "diff" && no_index == "--no-index" => {
                fake_git::run_diff(Path::new(left), Path::new(right))
            }
            [merge_file, rest @ ..] if merge_file == "merge-file" => {
                fake_git::run_merge_file(rest)
            }
            _ => Self::output(129, "", "fatal: unsupported fake git invocation"),
        }
    }

    fn handle_toolkit(&self, program: &Path, args: &[String]) -> CommandOutput {
        let sdk_root = program
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        match args.first().map(String::as_str) {
            Some("clone") => {
                let [_, revision, dest] = args else {
                    return Self::output(64, "", "usage: aspen clone <revision> <directory>");
                };
                if !self.templates.is_cloneable(revision) {
                    return Self::output(
                        1,
                        "",
                        &format!("error: revision '{revision}' is not available"),
                    );
                }
                let dest = Path::new(dest);
                if std::fs::create_dir_all(dest.join("bin")).is_err()
                    || std::fs::write(dest.join("bin").join(TOOLKIT_BIN), b"#!fake\n").is_err()
                    || std::fs::write(dest.join("REVISION"), revision).is_err()
                {
                    return Self::output(1, "", "error: could not write the checkout");
                }
                Self::output(0, "", "")
            }
            Some("create") => {
                let revision = match std::fs::read_to_string(sdk_root.join("REVISION")) {
                    Ok(revision) => revision,
                    Err(_) => {
                        return Self::output(1, "", "error: not inside an SDK checkout");
                    }
                };
                self.handle_create(&revision, &args[1..])
            }
            _ => Self::output(64, "", "usage: aspen <clone|create> ..."),
        }
    }

    fn handle_create(&self, revision: &str, args: &[String]) -> CommandOutput {
        let mut platforms: Vec<PlatformTag> = vec![];
        let mut out_dir: Option<PathBuf> = None;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--template=app" => {}
                "--org" | "--project-name" | "--android-language" | "--ios-language" => {
                    iter.next();
                }
                "--platforms" => {
                    let Some(csv) = iter.next() else {
                        return Self::output(64, "", "error: --platforms needs a value");
                    };
                    for name in csv.split(',') {
                        match name.parse() {
                            Ok(platform) => platforms.push(platform),
                            Err(_) => {
                                return Self::output(
                                    64,
                                    "",
                                    &format!("error: unknown platform '{name}'"),
                                );
                            }
                        }
                    }
                }
                positional => out_dir = Some(PathBuf::from(positional)),
            }
        }
        let Some(out_dir) = out_dir else {
            return Self::output(64, "", "error: no output directory");
        };
        if !self.templates.revisions.contains_key(revision) {
            return Self::output(1, "", &format!("error: unknown revision '{revision}'"));
        }
        for (path, contents) in self.templates.files_for(revision, &platforms) {
            let dest = out_dir.join(&path);
            // Successive generation passes overlay; existing files win.
            if dest.exists() {
                continue;
            }
            if let Some(parent) = dest.parent() {
                if std::fs::create_dir_all(parent).is_err() {
                    return Self::output(1, "", "error: could not create output directories");
                }
            }
            if std::fs::write(&dest, contents).is_err() {
                return Self::output(1, "", "error: could not write generated file");
            }
        }
        Self::output(0, "", "")
    }
}

impl CommandRunner for FakeCommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ExecError> {
        let program = Path::new(&invocation.program);
        let args: Vec<String> = invocation
            .args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let name = program.file_name().and_then(OsStr::to_str).unwrap_or("");
        let output = match name {
            "git" => self.handle_git(&args),
            TOOLKIT_BIN => self.handle_toolkit(program, &args),
            _ => Self::output(127, "", &format!("fake runner: unknown program '{name}'")),
        };
        Ok(output)
    }
}

/// Exact-path `.gitignore` lookalike: a line matches the path itself, or is
/// a `dir/` prefix covering everything beneath it.
fn is_ignored_by_fake_rules(repo_root: &Path, path: &str) -> bool {
    let Ok(rules) = std::fs::read_to_string(repo_root.join(".gitignore")) else {
        return false;
    };
    rules.lines().map(str::trim).any(|line| {
        if line.is_empty() || line.starts_with('#') {
            return false;
        }
        match line.strip_suffix('/') {
            Some(dir) => path == dir || path.starts_with(&format!("{dir}/")),
            None => path == line,
        }
    })
}
