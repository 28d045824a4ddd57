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

//! Thin wrapper over the version-control tool. The engine never diffs or
//! merges file contents itself; every byte of patch and merge output comes
//! from here.

use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::exec::{CommandRunner, ExecError, Invocation};
use crate::revision::RevisionId;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("git {command} failed with exit code {exit_code:?}:\n{stderr}")]
    CommandFailed {
        command: &'static str,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("Error setting up merge ancestor file")]
    SetUpAncestor(#[source] std::io::Error),
}

/// Unified diff of one file pair, as reported by the tool.
#[derive(Clone, Debug)]
pub struct FileDiff {
    pub changed: bool,
    pub patch: Vec<u8>,
}

/// Merge output for one file. `conflict_count` is the tool's count of
/// unresolved hunks; the markers are embedded in `body`.
#[derive(Clone, Debug)]
pub struct FileMerge {
    pub conflict_count: u32,
    pub body: Vec<u8>,
}

/// Handle on the external `git` binary (the command name may be rebound).
#[derive(Clone, Debug)]
pub struct GitTool {
    runner: Arc<dyn CommandRunner>,
    program: OsString,
}

impl GitTool {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        GitTool {
            runner,
            program: "git".into(),
        }
    }

    pub fn with_program(runner: Arc<dyn CommandRunner>, program: impl AsRef<OsStr>) -> Self {
        GitTool {
            runner,
            program: program.as_ref().to_owned(),
        }
    }

    fn invocation(&self) -> Invocation {
        Invocation::new(&self.program)
    }

    /// Initializes a repository in `dir` so that ignore queries and merges
    /// have a repo to work against. Idempotent.
    pub fn init(&self, dir: &Path) -> Result<(), VcsError> {
        let output = self.runner.run(&self.invocation().arg("init").arg(dir))?;
        if !output.success() {
            return Err(VcsError::CommandFailed {
                command: "init",
                exit_code: output.exit_code,
                stderr: output.stderr_lossy(),
            });
        }
        Ok(())
    }

    /// Whether the repo at `repo_root` ignores `path` (relative to the
    /// root).
    pub fn is_ignored(&self, repo_root: &Path, path: &str) -> Result<bool, VcsError> {
        let output = self.runner.run(
            &self
                .invocation()
                .arg("-C")
                .arg(repo_root)
                .arg("check-ignore")
                .arg(path),
        )?;
        match output.exit_code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            exit_code => Err(VcsError::CommandFailed {
                command: "check-ignore",
                exit_code,
                stderr: output.stderr_lossy(),
            }),
        }
    }

    /// Textual diff of two files outside any index. Exit code 1 (the files
    /// differ) is a result, not a failure.
    pub fn diff_no_index(&self, left: &Path, right: &Path) -> Result<FileDiff, VcsError> {
        let output = self.runner.run(
            &self
                .invocation()
                .arg("diff")
                .arg("--no-index")
                .arg(left)
                .arg(right),
        )?;
        match output.exit_code {
            Some(0) => Ok(FileDiff {
                changed: false,
                patch: output.stdout,
            }),
            Some(1) => Ok(FileDiff {
                changed: true,
                patch: output.stdout,
            }),
            exit_code => Err(VcsError::CommandFailed {
                command: "diff",
                exit_code,
                stderr: output.stderr_lossy(),
            }),
        }
    }

    /// Merges `current` and `target`, three-way through `base` when given,
    /// two-way against an empty ancestor otherwise. The exit code is the
    /// tool's conflict count.
    pub fn merge_file(
        &self,
        current: &Path,
        base: Option<&Path>,
        target: &Path,
    ) -> Result<FileMerge, VcsError> {
        let mut invocation = self.invocation().arg("merge-file").arg("-p");
        if base.is_some() {
            invocation = invocation.arg("--diff3");
        }
        // Keep the empty two-way ancestor alive until the tool has run.
        let empty_ancestor = match base {
            Some(_) => None,
            None => {
                let mut file = tempfile::NamedTempFile::with_prefix("uplift-ancestor-")
                    .map_err(VcsError::SetUpAncestor)?;
                file.flush().map_err(VcsError::SetUpAncestor)?;
                Some(file)
            }
        };
        let base_path = base.unwrap_or_else(|| empty_ancestor.as_ref().unwrap().path());
        let invocation = invocation
            .args(["-L", "current", "-L", "base", "-L", "target"])
            .arg(current)
            .arg(base_path)
            .arg(target);
        let output = self.runner.run(&invocation)?;
        match output.exit_code {
            Some(code) if (0..=127).contains(&code) => Ok(FileMerge {
                conflict_count: code as u32,
                body: output.stdout,
            }),
            exit_code => Err(VcsError::CommandFailed {
                command: "merge-file",
                exit_code,
                stderr: output.stderr_lossy(),
            }),
        }
    }

    /// The commit a checkout at `dir` is at.
    pub fn rev_parse_head(&self, dir: &Path) -> Result<RevisionId, VcsError> {
        let output = self.runner.run(
            &self
                .invocation()
                .arg("-C")
                .arg(dir)
                .arg("rev-parse")
                .arg("HEAD"),
        )?;
        if !output.success() {
            return Err(VcsError::CommandFailed {
                command: "rev-parse",
                exit_code: output.exit_code,
                stderr: output.stderr_lossy(),
            });
        }
        Ok(RevisionId::new(output.stdout_lossy().trim()))
    }
}
