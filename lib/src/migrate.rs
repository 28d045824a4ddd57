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

//! The compute orchestrator: drives materialization, classification and
//! merging end to end and assembles the [`MigrationResult`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;
use tempfile::TempDir;
use thiserror::Error;

use crate::diff::{self, DiffOutcome};
use crate::exec::CommandRunner;
use crate::file_util;
use crate::merge::{self, CustomMergeRegistry, MergeOutcome, MergeType};
use crate::metadata::{MetadataError, ProjectMetadata};
use crate::path_filter;
use crate::platform::PlatformTag;
use crate::project::{AppManifest, ProjectError, ScaffoldLanguages, TemplateKind};
use crate::project_path::ProjectPath;
use crate::revision::{resolve_revisions, RevisionId};
use crate::template::{MaterializeError, TemplateMaterializer};
use crate::toolkit::{Toolkit, ToolkitError};
use crate::vcs::{GitTool, VcsError};

/// Name of the staging directory the engine creates under the project root.
pub const WORKING_DIR_NAME: &str = "uplift_working_dir";

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error(
        "A previous migration already has staged changes at {path}; apply or abandon it before \
         starting a new one"
    )]
    WorkingDirectoryExists { path: PathBuf },
    #[error("Only app projects can be migrated; this project is a {kind}")]
    UnsupportedProjectShape { kind: TemplateKind },
    #[error("The migration was cancelled")]
    Cancelled,
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error(transparent)]
    Toolkit(#[from] ToolkitError),
    #[error(transparent)]
    Vcs(#[from] VcsError),
    #[error("I/O error under {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything the orchestrator needs from the outside world: the process
/// runner and the toolkit location, plus a cancellation flag. There are no
/// process-wide singletons.
#[derive(Clone, Debug)]
pub struct MigrateEnv {
    runner: Arc<dyn CommandRunner>,
    toolkit_root: PathBuf,
    cancel: Arc<AtomicBool>,
}

impl MigrateEnv {
    pub fn new(runner: Arc<dyn CommandRunner>, toolkit_root: impl Into<PathBuf>) -> Self {
        MigrateEnv {
            runner,
            toolkit_root: toolkit_root.into(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn git(&self) -> GitTool {
        GitTool::new(self.runner.clone())
    }

    pub fn toolkit(&self) -> Toolkit {
        Toolkit::new(self.runner.clone(), self.toolkit_root.clone())
    }

    /// Asks a running computation to stop at its next stage boundary.
    pub fn request_cancellation(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    fn check_cancelled(&self) -> Result<(), MigrateError> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(MigrateError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Caller-facing knobs of [`compute_migration`].
#[derive(Clone, Debug)]
pub struct MigrateOptions {
    pub verbose: bool,
    pub project_root: PathBuf,
    /// Use this directory as the base template instead of materializing one.
    /// Borrowed; never released by the engine.
    pub base_app_path: Option<PathBuf>,
    /// Use this directory as the target template instead of materializing
    /// one. Borrowed; never released by the engine.
    pub target_app_path: Option<PathBuf>,
    /// Treat every platform as scaffolded at this revision.
    pub base_revision: Option<RevisionId>,
    /// Migrate to this revision instead of the installed one.
    pub target_revision: Option<RevisionId>,
    pub delete_temp_directories: bool,
    /// Restrict the migration to these platforms (the root pseudo-platform
    /// is always included).
    pub platforms: Option<Vec<PlatformTag>>,
    pub prefer_two_way_merge: bool,
}

impl MigrateOptions {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        MigrateOptions {
            verbose: false,
            project_root: project_root.into(),
            base_app_path: None,
            target_app_path: None,
            base_revision: None,
            target_revision: None,
            delete_temp_directories: true,
            platforms: None,
            prefer_two_way_merge: false,
        }
    }
}

/// An added or deleted file pending commit to the working directory.
#[derive(Clone, Debug)]
pub struct FilePendingMigration {
    pub local_path: ProjectPath,
    /// Where the current bytes of the file live (target template for added
    /// files, the project for deleted ones).
    pub source: PathBuf,
}

/// The computed migration. Scratch directories are owned by this value;
/// dropping it (or calling [`MigrationResult::release_temp_directories`])
/// deletes them, so consume the staged files first.
#[derive(Debug)]
pub struct MigrationResult {
    pub merge_results: Vec<MergeOutcome>,
    pub added_files: Vec<FilePendingMigration>,
    pub deleted_files: Vec<FilePendingMigration>,
    pub base_template_dir: PathBuf,
    pub target_template_dir: PathBuf,
    /// Revision actually cloned → SDK checkout location.
    pub sdk_dirs: IndexMap<RevisionId, PathBuf>,
    temp_dirs: Vec<TempDir>,
}

impl MigrationResult {
    pub fn conflict_outcomes(&self) -> impl Iterator<Item = &MergeOutcome> {
        self.merge_results
            .iter()
            .filter(|outcome| outcome.has_conflict)
    }

    pub fn is_empty(&self) -> bool {
        self.merge_results.is_empty()
            && self.added_files.is_empty()
            && self.deleted_files.is_empty()
    }

    /// Deletes the owned scratch directories now instead of at drop time.
    pub fn release_temp_directories(&mut self) {
        self.temp_dirs.clear();
    }

    /// Leaves the owned scratch directories on disk for inspection.
    pub fn keep_temp_directories(&mut self) {
        for dir in self.temp_dirs.drain(..) {
            let path = dir.into_path();
            tracing::info!(?path, "keeping scratch directory");
        }
    }
}

/// What the per-file sweep decided for one project file.
enum FileDecision {
    Nothing,
    Merge(MergeOutcome),
    Delete,
}

/// Computes the migration for the project at `options.project_root`,
/// without touching the project itself.
pub fn compute_migration(
    env: &MigrateEnv,
    options: &MigrateOptions,
) -> Result<MigrationResult, MigrateError> {
    let project_root = &options.project_root;
    let working_dir = project_root.join(WORKING_DIR_NAME);
    if working_dir.exists() {
        return Err(MigrateError::WorkingDirectoryExists { path: working_dir });
    }

    let manifest = AppManifest::load(project_root)?;
    if manifest.template != TemplateKind::App {
        return Err(MigrateError::UnsupportedProjectShape {
            kind: manifest.template,
        });
    }
    let metadata = ProjectMetadata::load(project_root)?;
    let git = env.git();
    let toolkit = env.toolkit();

    let (fallback_revision, target_revision) = match (
        metadata.version_revision.clone(),
        options.target_revision.clone(),
    ) {
        (Some(fallback), Some(target)) => (fallback, target),
        (fallback, target) => {
            let installed = toolkit.installed_revision(&git)?;
            (
                fallback.unwrap_or_else(|| installed.clone()),
                target.unwrap_or(installed),
            )
        }
    };
    if options.verbose {
        tracing::debug!(%fallback_revision, %target_revision, "revisions determined");
    }

    let mut config = metadata.migrate_config();
    if let Some(platforms) = &options.platforms {
        config
            .platform_configs
            .retain(|tag, _| *tag == PlatformTag::Root || platforms.contains(tag));
    }
    let languages = ScaffoldLanguages::detect(project_root);
    env.check_cancelled()?;

    let resolved = resolve_revisions(&config, &fallback_revision, options.base_revision.as_ref());

    let mut temp_dirs: Vec<TempDir> = vec![];
    let mut scratch_template_dir = |prefix: &str| -> Result<PathBuf, MigrateError> {
        let dir = TempDir::with_prefix(prefix).map_err(|source| MigrateError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
        let path = dir.path().to_path_buf();
        temp_dirs.push(dir);
        Ok(path)
    };
    let base_template_dir = match &options.base_app_path {
        Some(path) => path.clone(),
        None => scratch_template_dir("uplift-base-")?,
    };
    let target_template_dir = match &options.target_app_path {
        Some(path) => path.clone(),
        None => scratch_template_dir("uplift-target-")?,
    };

    let mut materializer = TemplateMaterializer::new(
        &toolkit,
        &manifest.name,
        &manifest.org,
        languages,
        fallback_revision.clone(),
        target_revision.clone(),
    );
    if options.base_app_path.is_none() {
        for revision in &resolved.revisions {
            env.check_cancelled()?;
            let platforms: Vec<PlatformTag> = resolved.revision_to_configs[revision]
                .iter()
                .map(|platform_config| platform_config.platform)
                .collect();
            let effective =
                materializer.materialize(revision, &platforms, &base_template_dir, true)?;
            tracing::debug!(%revision, %effective, "materialized base template pass");
        }
    }
    if options.target_app_path.is_none() {
        let all_platforms: Vec<PlatformTag> =
            config.platform_configs.keys().copied().collect();
        materializer.materialize(&target_revision, &all_platforms, &target_template_dir, false)?;
    }
    let state = materializer.into_state();
    temp_dirs.extend(state.scratch_dirs);
    let merge_types = state.merge_types;
    let sdk_dirs = state.sdk_dirs;
    env.check_cancelled()?;

    // Diff and merge need repos to exist in all three trees.
    git.init(&base_template_dir)?;
    git.init(&target_template_dir)?;
    git.init(project_root)?;

    let list_filtered = |root: &Path| -> Result<Vec<ProjectPath>, MigrateError> {
        Ok(file_util::list_files_recursively(root)
            .map_err(|source| MigrateError::Io {
                path: root.to_path_buf(),
                source,
            })?
            .into_iter()
            .filter(|file| !path_filter::is_statically_skipped(file))
            .collect())
    };
    let base_files = list_filtered(&base_template_dir)?;
    let target_files = list_filtered(&target_template_dir)?;

    // Template delta: how every base-template file moved toward the target.
    let diff_entries: Vec<(ProjectPath, DiffOutcome)> = base_files
        .par_iter()
        .map(|file| {
            let left = file.to_fs_path(&base_template_dir);
            let right = file.to_fs_path(&target_template_dir);
            let outcome = diff::diff_files(
                &git,
                Some((base_template_dir.as_path(), file.as_str())),
                &left,
                &right,
            )
            .unwrap_or_else(|err| {
                tracing::warn!(%file, ?err, "template diff failed; treating as changed");
                DiffOutcome::Changed {
                    patch: String::new(),
                }
            });
            (file.clone(), outcome)
        })
        .collect();
    let mut diff_map: IndexMap<ProjectPath, DiffOutcome> = diff_entries.into_iter().collect();
    for file in &target_files {
        if !diff_map.contains_key(file) {
            diff_map.insert(file.clone(), DiffOutcome::AddedOnly);
        }
    }
    let mut added_files: Vec<FilePendingMigration> = target_files
        .iter()
        .filter(|file| diff_map[*file] == DiffOutcome::AddedOnly)
        .filter(|file| !path_filter::is_unmanaged(file, &config))
        .map(|file| FilePendingMigration {
            local_path: (*file).clone(),
            source: file.to_fs_path(&target_template_dir),
        })
        .collect();
    env.check_cancelled()?;

    // Per-project-file decisions. The sweep is read-only and the input list
    // is sorted, so parallelism cannot change the output order.
    let project_files: Vec<ProjectPath> = list_filtered(project_root)?
        .into_iter()
        .filter(|file| !file.starts_with_dir(WORKING_DIR_NAME))
        .filter(|file| !path_filter::is_unmanaged(file, &config))
        .collect();
    let registry = CustomMergeRegistry::standard();
    let context = FileContext {
        git: &git,
        project_root,
        base_template_dir: &base_template_dir,
        target_template_dir: &target_template_dir,
        diff_map: &diff_map,
        merge_types: &merge_types,
        registry: &registry,
        prefer_two_way: options.prefer_two_way_merge,
    };
    let decisions: Vec<(ProjectPath, FileDecision)> = project_files
        .par_iter()
        .map(|file| (file.clone(), decide_file(&context, file)))
        .collect();
    env.check_cancelled()?;

    let mut merge_results = vec![];
    let mut deleted_files = vec![];
    let mut merged_paths: HashSet<ProjectPath> = HashSet::new();
    for (file, decision) in decisions {
        match decision {
            FileDecision::Nothing => {}
            FileDecision::Merge(outcome) => {
                merged_paths.insert(file);
                merge_results.push(outcome);
            }
            FileDecision::Delete => deleted_files.push(FilePendingMigration {
                source: file.to_fs_path(project_root),
                local_path: file,
            }),
        }
    }
    // A file can reach the merge path while also being target-new (the user
    // created it locally); the merge outcome is its one classification.
    added_files.retain(|added| !merged_paths.contains(&added.local_path));

    let mut result = MigrationResult {
        merge_results,
        added_files,
        deleted_files,
        base_template_dir,
        target_template_dir,
        sdk_dirs,
        temp_dirs,
    };
    if !options.delete_temp_directories {
        result.keep_temp_directories();
    }
    Ok(result)
}

struct FileContext<'a> {
    git: &'a GitTool,
    project_root: &'a Path,
    base_template_dir: &'a Path,
    target_template_dir: &'a Path,
    diff_map: &'a IndexMap<ProjectPath, DiffOutcome>,
    merge_types: &'a IndexMap<ProjectPath, MergeType>,
    registry: &'a CustomMergeRegistry,
    prefer_two_way: bool,
}

/// Classifies one project file. Failures on the file degrade to taking the
/// target (or doing nothing); they never abort the run.
fn decide_file(context: &FileContext<'_>, file: &ProjectPath) -> FileDecision {
    let current = file.to_fs_path(context.project_root);
    let base = file.to_fs_path(context.base_template_dir);
    let target = file.to_fs_path(context.target_template_dir);

    match context.git.is_ignored(context.project_root, file.as_str()) {
        Ok(true) => return FileDecision::Nothing,
        Ok(false) => {}
        Err(err) => {
            tracing::warn!(%file, ?err, "ignore query failed; treating as not ignored");
        }
    }

    // Binary-ish files are replaced wholesale, never text-merged.
    if path_filter::is_skip_merge(file) {
        if !target.is_file() {
            return FileDecision::Nothing;
        }
        return match (std::fs::read(&current), std::fs::read(&target)) {
            (Ok(current_bytes), Ok(target_bytes)) if current_bytes == target_bytes => {
                FileDecision::Nothing
            }
            (Ok(_), Ok(target_bytes)) => FileDecision::Merge(MergeOutcome::taking_target(
                file.clone(),
                target_bytes,
            )),
            (current_read, target_read) => {
                let err = current_read.err().or(target_read.err());
                tracing::warn!(%file, ?err, "could not read binary file; skipping");
                FileDecision::Nothing
            }
        };
    }

    let diff_or_changed = |left: &Path, right: &Path| {
        diff::diff_files(context.git, None, left, right).unwrap_or_else(|err| {
            tracing::warn!(%file, ?err, "diff failed; treating as changed");
            DiffOutcome::Changed {
                patch: String::new(),
            }
        })
    };
    let user_diff = diff_or_changed(&current, &base);
    let target_diff = diff_or_changed(&current, &target);

    // Already at the target; nothing to stage.
    if target_diff.is_equal() {
        return FileDecision::Nothing;
    }

    if user_diff.is_equal() {
        // The user never touched the file; it follows the template delta.
        return match context.diff_map.get(file) {
            Some(DiffOutcome::DeletedOnly) => FileDecision::Delete,
            Some(DiffOutcome::Changed { .. }) => take_target(file, &target),
            _ => FileDecision::Nothing,
        };
    }

    // The user changed the file. Only merge if the template moved too;
    // user-only changes (and user-only files) are left alone.
    match context.diff_map.get(file) {
        Some(
            DiffOutcome::Changed { .. } | DiffOutcome::AddedOnly | DiffOutcome::DeletedOnly,
        ) => {}
        _ => return FileDecision::Nothing,
    }

    if let Some(merger) = context.registry.find(file) {
        match run_custom_merger(merger, file, &current, &base, &target) {
            Ok(outcome) => return FileDecision::Merge(outcome),
            Err(err) => {
                tracing::warn!(%file, ?err, "custom merge failed; taking the target");
                return take_target(file, &target);
            }
        }
    }

    let mut merge_type = context
        .merge_types
        .get(file)
        .copied()
        .unwrap_or(MergeType::TwoWay);
    if context.prefer_two_way {
        merge_type = MergeType::TwoWay;
    } else if let (Some(user_patch), Some(target_patch)) =
        (user_diff.patch(), target_diff.patch())
    {
        // The current file differs from base and target by the same delta,
        // so the user already carries the target's change; a three-way
        // merge would revert it.
        if diff::patch_from_first_hunk(user_patch) == diff::patch_from_first_hunk(target_patch)
        {
            merge_type = MergeType::TwoWay;
        }
    }
    if merge_type == MergeType::ThreeWay && !base.is_file() {
        merge_type = MergeType::TwoWay;
    }

    let base_arg = (merge_type == MergeType::ThreeWay).then(|| base.as_path());
    let target_arg = target.is_file().then(|| target.as_path());
    match merge::merge_files(context.git, merge_type, file, &current, base_arg, target_arg) {
        Ok(outcome) => FileDecision::Merge(outcome),
        Err(err) => {
            tracing::warn!(%file, ?err, "merge failed; taking the target");
            if target.is_file() {
                take_target(file, &target)
            } else {
                FileDecision::Nothing
            }
        }
    }
}

fn run_custom_merger(
    merger: &dyn merge::CustomMerger,
    file: &ProjectPath,
    current: &Path,
    base: &Path,
    target: &Path,
) -> Result<MergeOutcome, merge::MergeError> {
    let read = |path: &Path| -> Result<Vec<u8>, merge::MergeError> {
        std::fs::read(path).map_err(|source| merge::MergeError::Io {
            path: path.to_path_buf(),
            source,
        })
    };
    let current_bytes = read(current)?;
    let base_bytes = base.is_file().then(|| read(base)).transpose()?;
    let target_bytes = if target.is_file() {
        read(target)?
    } else {
        vec![]
    };
    merger.merge(file, &current_bytes, base_bytes.as_deref(), &target_bytes)
}

fn take_target(file: &ProjectPath, target: &Path) -> FileDecision {
    match std::fs::read(target) {
        Ok(bytes) => FileDecision::Merge(MergeOutcome::taking_target(file.clone(), bytes)),
        Err(err) => {
            tracing::warn!(%file, ?err, "could not read the target file; skipping");
            FileDecision::Nothing
        }
    }
}
