//! Parsing of model output into edits.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```([\w+-]*)[ \t]*\r?\n(.*?)```").expect("valid regex"));
static FILE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<file\s+path=["']([^"']+)["']\s*>\r?\n?(.*?)</file>"#).expect("valid regex")
});
static PATCH_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<patch>\r?\n?(.*?)</patch>").expect("valid regex"));

/// A search/replace pair applied once to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchReplace {
    pub search: String,
    pub replace: String,
}

/// What a multi-file answer asks to do with one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// Write the whole file (create or replace).
    Write { path: String, content: String },
    /// Apply search/replace pairs to an existing file.
    Edit { path: String, edits: Vec<SearchReplace> },
    /// Apply a unified diff to an existing file.
    Patch { path: String, diff: String },
}

impl FileChange {
    pub fn path(&self) -> &str {
        match self {
            Self::Write { path, .. } | Self::Edit { path, .. } | Self::Patch { path, .. } => path,
        }
    }
}

/// Pull the first JSON object out of model text.
///
/// Tries a ```json fence, then any fenced block, then the first balanced
/// `{...}` span (brace matching skips braces inside strings).
pub fn extract_json(text: &str) -> Option<Value> {
    let fences: Vec<(&str, &str)> = FENCE
        .captures_iter(text)
        .filter_map(|caps| Some((caps.get(1)?.as_str(), caps.get(2)?.as_str())))
        .collect();

    let parsed = |body: &str| serde_json::from_str::<Value>(body.trim()).ok().filter(Value::is_object);

    fences
        .iter()
        .filter(|(lang, _)| lang.eq_ignore_ascii_case("json"))
        .find_map(|(_, body)| parsed(body))
        .or_else(|| fences.iter().find_map(|(_, body)| parsed(body)))
        .or_else(|| {
            balanced_objects(text)
                .into_iter()
                .find_map(|span| serde_json::from_str::<Value>(span).ok())
        })
}

/// Top-level `{...}` spans in order of appearance.
fn balanced_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        spans.push(&text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

/// Search/replace pairs from a single-file answer.
///
/// Accepts `{"fixes":[{"search","replace"}]}` or one top-level
/// `search`/`replace` pair.
pub fn parse_search_replace(json: &Value) -> Vec<SearchReplace> {
    if let Some(fixes) = json.get("fixes").and_then(Value::as_array) {
        return fixes.iter().filter_map(pair).collect();
    }
    pair(json).into_iter().collect()
}

fn pair(value: &Value) -> Option<SearchReplace> {
    let search = value.get("search")?.as_str()?;
    let replace = value.get("replace")?.as_str()?;
    (!search.is_empty()).then(|| SearchReplace {
        search: search.to_string(),
        replace: replace.to_string(),
    })
}

/// Changes from a multi-file answer.
///
/// JSON `{"files":[...]}` wins; otherwise `<file path="...">` blocks, then
/// `<patch>` unified diffs (the target path comes from the `+++` header).
pub fn parse_file_changes(text: &str) -> Vec<FileChange> {
    if let Some(json) = extract_json(text) {
        if let Some(files) = json.get("files").and_then(Value::as_array) {
            let changes: Vec<FileChange> = files.iter().filter_map(json_change).collect();
            if !changes.is_empty() {
                return changes;
            }
        }
    }

    let blocks: Vec<FileChange> = FILE_BLOCK
        .captures_iter(text)
        .map(|caps| FileChange::Write {
            path: caps[1].trim().to_string(),
            content: strip_fence(&caps[2]),
        })
        .collect();
    if !blocks.is_empty() {
        return blocks;
    }

    PATCH_BLOCK
        .captures_iter(text)
        .flat_map(|caps| split_patch(&caps[1]))
        .collect()
}

fn json_change(value: &Value) -> Option<FileChange> {
    let path = value.get("path")?.as_str()?.trim().to_string();
    if path.is_empty() {
        return None;
    }
    let action = value.get("action").and_then(Value::as_str).unwrap_or("replace");

    match action {
        "edit" => {
            let mut edits: Vec<SearchReplace> = value
                .get("edits")
                .and_then(Value::as_array)
                .map(|list| list.iter().filter_map(pair).collect())
                .unwrap_or_default();
            edits.extend(pair(value));
            (!edits.is_empty()).then_some(FileChange::Edit { path, edits })
        }
        "patch" => {
            let diff = value.get("diff").or_else(|| value.get("patch"))?.as_str()?;
            Some(FileChange::Patch {
                path,
                diff: diff.to_string(),
            })
        }
        _ => {
            let content = value.get("content")?.as_str()?;
            Some(FileChange::Write {
                path,
                content: content.to_string(),
            })
        }
    }
}

/// Drop a single surrounding code fence from a file block body.
fn strip_fence(body: &str) -> String {
    let trimmed = body.trim_matches('\n');
    if let Some(caps) = FENCE.captures(trimmed) {
        if caps.get(0).is_some_and(|m| m.start() == 0 && m.end() == trimmed.len()) {
            return caps[2].to_string();
        }
    }
    let mut content = trimmed.to_string();
    content.push('\n');
    content
}

/// Split a multi-file unified diff into one patch per target file.
///
/// `--- ` only starts a file header when the next line is `+++ `; inside a
/// hunk it is a removed line that itself begins with `-- `.
fn split_patch(diff: &str) -> Vec<FileChange> {
    let mut changes = Vec::new();
    let mut current: Option<(String, String)> = None;
    let mut lines = diff.lines().peekable();

    while let Some(line) = lines.next() {
        if line.starts_with("diff --git ") {
            continue;
        }
        let header = line
            .strip_prefix("--- ")
            .zip(lines.peek().and_then(|next| next.strip_prefix("+++ ")));
        if let Some((old, new)) = header {
            lines.next();
            if let Some((path, body)) = current.take() {
                changes.push(FileChange::Patch { path, diff: body });
            }
            let path = strip_diff_prefix(new);
            let body = format!("--- {}\n+++ {}\n", old.trim_end(), new.trim_end());
            current = Some((path, body));
            continue;
        }
        if current.is_none() {
            if let Some(new) = line.strip_prefix("+++ ") {
                let path = strip_diff_prefix(new);
                let body = format!("--- a/{path}\n+++ {}\n", new.trim_end());
                current = Some((path, body));
                continue;
            }
        }
        if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }
    if let Some((path, body)) = current {
        changes.push(FileChange::Patch { path, diff: body });
    }
    changes
}

fn strip_diff_prefix(header: &str) -> String {
    let path = header.split('\t').next().unwrap_or(header).trim();
    path.strip_prefix("b/")
        .or_else(|| path.strip_prefix("a/"))
        .unwrap_or(path)
        .to_string()
}

/// Apply a unified diff to `original`.
pub fn apply_patch(original: &str, diff: &str) -> Result<String, String> {
    let patch = diffy::Patch::from_str(diff).map_err(|e| format!("invalid patch: {e}"))?;
    diffy::apply(original, &patch).map_err(|e| format!("patch does not apply: {e}"))
}

/// Apply each pair once, in order. Fails on the first search text that
/// is not present.
pub fn apply_search_replace(content: &str, edits: &[SearchReplace]) -> Result<String, String> {
    let mut updated = content.to_string();
    for (i, edit) in edits.iter().enumerate() {
        if !updated.contains(&edit.search) {
            return Err(format!("search text #{} not found in file", i + 1));
        }
        updated = updated.replacen(&edit.search, &edit.replace, 1);
    }
    Ok(updated)
}

/// Heuristic check that model output is a whole file rather than an
/// excerpt: no `TODO` markers and balanced curly braces.
pub fn is_complete_file(content: &str) -> bool {
    if content.contains("TODO") {
        return false;
    }
    let mut depth: i64 = 0;
    for c in content.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}
