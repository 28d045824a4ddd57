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

//! Library for Uplift - a non-destructive template migration engine for
//! scaffolded app projects.
//!
//! The engine regenerates the template a project was scaffolded from (the
//! base), the template it should move to (the target), diffs both against
//! the user's tree, and stages per-file merge outcomes plus a manifest in a
//! working directory. The user's project is never modified; applying the
//! staged files is the host's job.

#![deny(unused_must_use)]

pub mod diff;
pub mod exec;
pub mod file_util;
pub mod manifest;
pub mod merge;
pub mod metadata;
pub mod migrate;
pub mod path_filter;
pub mod platform;
pub mod project;
pub mod project_path;
pub mod revision;
pub mod template;
pub mod toolkit;
pub mod vcs;
