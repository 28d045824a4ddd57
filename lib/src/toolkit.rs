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

//! Invocations of the toolkit SDK: cloning it at a revision and running its
//! scaffold generator. The SDK root is located by the host.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use itertools::Itertools;
use thiserror::Error;

use crate::exec::{CommandRunner, ExecError, Invocation};
use crate::platform::PlatformTag;
use crate::project::ScaffoldLanguages;
use crate::revision::RevisionId;
use crate::vcs::{GitTool, VcsError};

/// Name of the toolkit binary inside an SDK checkout's `bin/`.
pub const TOOLKIT_BIN: &str = "aspen";

#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("aspen {command} failed with exit code {exit_code:?}:\n{stderr}")]
    CommandFailed {
        command: &'static str,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error(transparent)]
    Vcs(#[from] VcsError),
}

/// The installed toolkit SDK.
#[derive(Clone, Debug)]
pub struct Toolkit {
    runner: Arc<dyn CommandRunner>,
    root: PathBuf,
}

impl Toolkit {
    pub fn new(runner: Arc<dyn CommandRunner>, root: impl Into<PathBuf>) -> Self {
        Toolkit {
            runner,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn binary_path(&self) -> PathBuf {
        self.root.join("bin").join(TOOLKIT_BIN)
    }

    /// The framework revision the installed SDK is at. The SDK is a git
    /// checkout; its HEAD is the revision.
    pub fn installed_revision(&self, git: &GitTool) -> Result<RevisionId, ToolkitError> {
        Ok(git.rev_parse_head(&self.root)?)
    }

    /// Clones the toolkit at `revision` into `dest`. A failure here feeds
    /// the materializer's fallback chain; callers decide whether it is
    /// fatal.
    pub fn clone_revision(
        &self,
        revision: &RevisionId,
        dest: &Path,
    ) -> Result<SdkCheckout, ToolkitError> {
        let output = self.runner.run(
            &Invocation::new(self.binary_path())
                .arg("clone")
                .arg(revision.as_str())
                .arg(dest),
        )?;
        if !output.success() {
            return Err(ToolkitError::CommandFailed {
                command: "clone",
                exit_code: output.exit_code,
                stderr: output.stderr_lossy(),
            });
        }
        Ok(SdkCheckout {
            runner: self.runner.clone(),
            root: dest.to_path_buf(),
        })
    }
}

/// An SDK cloned at some revision, able to run its own scaffold generator.
#[derive(Clone, Debug)]
pub struct SdkCheckout {
    runner: Arc<dyn CommandRunner>,
    root: PathBuf,
}

/// One scaffold-generator run.
#[derive(Clone, Debug)]
pub struct CreateRequest<'a> {
    pub project_name: &'a str,
    pub org: &'a str,
    pub languages: ScaffoldLanguages,
    /// Platform scaffolds to generate, besides the root files; empty
    /// generates the root files only.
    pub platforms: &'a [PlatformTag],
    pub out_dir: &'a Path,
}

impl SdkCheckout {
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn binary_path(&self) -> PathBuf {
        self.root.join("bin").join(TOOLKIT_BIN)
    }

    /// Runs the generator into `request.out_dir`. Files already present in
    /// the output directory are left untouched, so successive runs overlay.
    pub fn create_app(&self, request: &CreateRequest) -> Result<(), ToolkitError> {
        let mut invocation = Invocation::new(self.binary_path())
            .arg("create")
            .arg("--template=app")
            .args(["--org", request.org])
            .args(["--project-name", request.project_name])
            .args(["--android-language", request.languages.android.as_str()])
            .args(["--ios-language", request.languages.ios.as_str()]);
        if !request.platforms.is_empty() {
            let csv = request
                .platforms
                .iter()
                .map(PlatformTag::as_str)
                .join(",");
            invocation = invocation.args(["--platforms", &csv]);
        }
        let output = self.runner.run(&invocation.arg(request.out_dir))?;
        if !output.success() {
            return Err(ToolkitError::CommandFailed {
                command: "create",
                exit_code: output.exit_code,
                stderr: output.stderr_lossy(),
            });
        }
        Ok(())
    }
}
