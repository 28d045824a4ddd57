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

//! In-process stand-ins for `git diff --no-index` and `git merge-file`,
//! faithful enough for engine tests: unified patches with real hunks, and a
//! line-level three-way merge with conflict markers and a conflict-count
//! exit code.

use std::path::Path;

use uplift_lib::exec::CommandOutput;

fn output(exit_code: i32, stdout: impl Into<Vec<u8>>, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(exit_code),
        stdout: stdout.into(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

pub(crate) fn run_diff(left: &Path, right: &Path) -> CommandOutput {
    let (Ok(left_bytes), Ok(right_bytes)) = (std::fs::read(left), std::fs::read(right)) else {
        return output(128, "", "fatal: could not read the files to diff");
    };
    if left_bytes == right_bytes {
        return output(0, "", "");
    }
    let left_label = left.to_string_lossy();
    let right_label = right.to_string_lossy();
    let patch = match (
        std::str::from_utf8(&left_bytes),
        std::str::from_utf8(&right_bytes),
    ) {
        (Ok(left_text), Ok(right_text)) => {
            render_patch(&left_label, &right_label, left_text, right_text)
        }
        _ => format!("Binary files a/{left_label} and b/{right_label} differ\n"),
    };
    output(1, patch, "")
}

/// A unified patch without context lines. Everything from the first hunk
/// marker onward depends only on the compared contents, as the engine's
/// merge-type selector expects of real git output.
pub fn render_patch(left_label: &str, right_label: &str, left: &str, right: &str) -> String {
    let mut patch = format!(
        "diff --git a/{left_label} b/{right_label}\n--- a/{left_label}\n+++ b/{right_label}\n"
    );
    let results = diff::lines(left, right);
    let mut left_line = 1u32;
    let mut right_line = 1u32;
    let mut i = 0;
    while i < results.len() {
        match &results[i] {
            diff::Result::Both(..) => {
                left_line += 1;
                right_line += 1;
                i += 1;
            }
            _ => {
                let hunk_left_start = left_line;
                let hunk_right_start = right_line;
                let mut removed = vec![];
                let mut added = vec![];
                while i < results.len() {
                    match &results[i] {
                        diff::Result::Left(line) => {
                            removed.push(*line);
                            left_line += 1;
                        }
                        diff::Result::Right(line) => {
                            added.push(*line);
                            right_line += 1;
                        }
                        diff::Result::Both(..) => break,
                    }
                    i += 1;
                }
                patch.push_str(&format!(
                    "@@ -{hunk_left_start},{} +{hunk_right_start},{} @@\n",
                    removed.len(),
                    added.len()
                ));
                for line in removed {
                    patch.push_str(&format!("-{line}\n"));
                }
                for line in added {
                    patch.push_str(&format!("+{line}\n"));
                }
            }
        }
    }
    patch
}

pub(crate) fn run_merge_file(args: &[String]) -> CommandOutput {
    let mut paths: Vec<&str> = vec![];
    let mut labels: Vec<&str> = vec![];
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-p" | "--diff3" => {}
            "-L" => {
                if let Some(label) = iter.next() {
                    labels.push(label);
                }
            }
            positional => paths.push(positional),
        }
    }
    let &[current, base, target] = &paths[..] else {
        return output(129, "", "usage: git merge-file [-p] current base target");
    };
    let read_text = |path: &str| -> Result<String, CommandOutput> {
        let bytes = std::fs::read(path)
            .map_err(|_| output(129, "", "fatal: could not read a merge input"))?;
        String::from_utf8(bytes).map_err(|_| output(255, "", "fatal: binary merge input"))
    };
    let (current, base, target) = match (read_text(current), read_text(base), read_text(target))
    {
        (Ok(current), Ok(base), Ok(target)) => (current, base, target),
        (Err(err), ..) | (_, Err(err), _) | (.., Err(err)) => return err,
    };
    let current_label = labels.first().copied().unwrap_or("current");
    let target_label = labels.get(2).copied().unwrap_or("target");
    let (merged, conflicts) =
        merge_three_way_labeled(&base, &current, &target, current_label, target_label);
    output(conflicts.min(127) as i32, merged, "")
}

/// Line-level three-way merge. Returns the merged body and the number of
/// conflict hunks; conflicts are rendered with the standard markers.
pub fn merge_three_way(base: &str, current: &str, target: &str) -> (String, usize) {
    merge_three_way_labeled(base, current, target, "current", "target")
}

/// One maximal run of lines one side changed, anchored at a base position.
#[derive(Clone, Debug)]
struct Edit {
    start: usize,
    base_len: usize,
    lines: Vec<String>,
}

fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

fn edits_against_base(base: &[&str], side: &[&str]) -> Vec<Edit> {
    let mut edits: Vec<Edit> = vec![];
    let mut pending: Option<Edit> = None;
    let mut base_pos = 0;
    for hunk in diff::slice(base, side) {
        match hunk {
            diff::Result::Both(..) => {
                if let Some(edit) = pending.take() {
                    edits.push(edit);
                }
                base_pos += 1;
            }
            diff::Result::Left(_) => {
                pending
                    .get_or_insert_with(|| Edit {
                        start: base_pos,
                        base_len: 0,
                        lines: vec![],
                    })
                    .base_len += 1;
                base_pos += 1;
            }
            diff::Result::Right(line) => {
                pending
                    .get_or_insert_with(|| Edit {
                        start: base_pos,
                        base_len: 0,
                        lines: vec![],
                    })
                    .lines
                    .push((*line).to_string());
            }
        }
    }
    if let Some(edit) = pending.take() {
        edits.push(edit);
    }
    edits
}

/// The region `[start, end)` of the base with one side's edits applied.
fn apply_edits(base: &[&str], edits: &[Edit], start: usize, end: usize) -> String {
    let mut result = String::new();
    let mut pos = start;
    for edit in edits {
        for line in &base[pos..edit.start] {
            result.push_str(line);
        }
        for line in &edit.lines {
            result.push_str(line);
        }
        pos = edit.start + edit.base_len;
    }
    for line in &base[pos..end] {
        result.push_str(line);
    }
    result
}

fn push_ensuring_newline(out: &mut String, content: &str) {
    out.push_str(content);
    if !content.is_empty() && !content.ends_with('\n') {
        out.push('\n');
    }
}

fn merge_three_way_labeled(
    base: &str,
    current: &str,
    target: &str,
    current_label: &str,
    target_label: &str,
) -> (String, usize) {
    let base_lines = split_lines(base);
    let current_edits = edits_against_base(&base_lines, &split_lines(current));
    let target_edits = edits_against_base(&base_lines, &split_lines(target));

    let mut out = String::new();
    let mut conflicts = 0;
    let mut pos = 0;
    let mut ci = 0;
    let mut ti = 0;
    loop {
        let next_current = current_edits.get(ci).map(|edit| edit.start);
        let next_target = target_edits.get(ti).map(|edit| edit.start);
        let next = match (next_current, next_target) {
            (None, None) => base_lines.len(),
            (Some(c), None) => c,
            (None, Some(t)) => t,
            (Some(c), Some(t)) => c.min(t),
        };
        for line in &base_lines[pos..next] {
            out.push_str(line);
        }
        pos = next;
        if next_current.is_none() && next_target.is_none() {
            break;
        }

        // Absorb every edit overlapping the changed region, starting with
        // whichever edits begin exactly here, then chaining overlaps.
        let start = next;
        let mut end = start;
        let mut c_end = ci;
        let mut t_end = ti;
        let mut grew = true;
        while grew {
            grew = false;
            while let Some(edit) = current_edits.get(c_end) {
                if edit.start < end || (edit.start == start && c_end == ci) {
                    end = end.max(edit.start + edit.base_len);
                    c_end += 1;
                    grew = true;
                } else {
                    break;
                }
            }
            while let Some(edit) = target_edits.get(t_end) {
                if edit.start < end || (edit.start == start && t_end == ti) {
                    end = end.max(edit.start + edit.base_len);
                    t_end += 1;
                    grew = true;
                } else {
                    break;
                }
            }
        }

        let from_current = &current_edits[ci..c_end];
        let from_target = &target_edits[ti..t_end];
        if from_target.is_empty() {
            out.push_str(&apply_edits(&base_lines, from_current, start, end));
        } else if from_current.is_empty() {
            out.push_str(&apply_edits(&base_lines, from_target, start, end));
        } else {
            let left = apply_edits(&base_lines, from_current, start, end);
            let right = apply_edits(&base_lines, from_target, start, end);
            if left == right {
                out.push_str(&left);
            } else {
                conflicts += 1;
                out.push_str(&format!("<<<<<<< {current_label}\n"));
                push_ensuring_newline(&mut out, &left);
                out.push_str("=======\n");
                push_ensuring_newline(&mut out, &right);
                out.push_str(&format!(">>>>>>> {target_label}\n"));
            }
        }
        ci = c_end;
        ti = t_end;
        pos = end;
    }
    (out, conflicts)
}
