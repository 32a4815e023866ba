//! Project scanning and prompt context assembly.
//!
//! The engine detects the project language from its manifests, walks the
//! source tree, extracts per-language imports into an [`ImportGraph`] and
//! picks the files a fix strategy should see for a given error.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use walkdir::{DirEntry, WalkDir};

use crate::domain::models::config::ContextConfig;
use crate::domain::models::{ClassifiedError, ContextFile, FixContext, Language, MissingModule};

const SKIPPED_DIRS: [&str; 16] = [
    "node_modules",
    ".git",
    "target",
    "dist",
    "build",
    "out",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    "vendor",
    ".next",
    ".dart_tool",
    ".gradle",
    ".idea",
    "coverage",
];

/// Subdirectories checked when the root has no recognisable manifest.
const NESTED_PROJECT_DIRS: [&str; 5] = ["backend", "frontend", "server", "client", "app"];

const RESOLVE_EXTENSIONS: [&str; 14] = [
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "vue", "py", "dart", "sol", "rb", "php", "h", "hpp",
];

macro_rules! regexes {
    ($($pattern:expr),+ $(,)?) => {
        LazyLock::new(|| vec![$(Regex::new($pattern).expect("valid regex")),+])
    };
}

static JS_IMPORTS: LazyLock<Vec<Regex>> = regexes![
    r#"(?m)^\s*import\s+(?:[\w*{}\s,$]+\s+from\s+)?['"]([^'"]+)['"]"#,
    r#"(?m)^\s*export\s+[\w*{}\s,$]+\s+from\s+['"]([^'"]+)['"]"#,
    r#"require\(\s*['"]([^'"]+)['"]\s*\)"#,
    r#"import\(\s*['"]([^'"]+)['"]\s*\)"#,
];
static PY_IMPORTS: LazyLock<Vec<Regex>> = regexes![
    r"(?m)^\s*from\s+(\.*[\w.]*)\s+import\b",
    r"(?m)^\s*import\s+([\w.]+)",
];
static JAVA_IMPORTS: LazyLock<Vec<Regex>> =
    regexes![r"(?m)^\s*import\s+(?:static\s+)?([\w.]+?)(?:\.\*)?\s*;"];
static GO_IMPORTS: LazyLock<Vec<Regex>> = regexes![r#"(?m)^\s*(?:import\s+)?(?:[\w.]+\s+)?"([\w./-]+)"\s*$"#];
static RUST_IMPORTS: LazyLock<Vec<Regex>> = regexes![
    r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+(\w+)\s*;",
    r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+((?:crate|super|self)(?:::\w+)+)",
];
static C_IMPORTS: LazyLock<Vec<Regex>> = regexes![r#"(?m)^\s*#\s*include\s*"([^"]+)""#];
static CSHARP_IMPORTS: LazyLock<Vec<Regex>> = regexes![r"(?m)^\s*using\s+(?:static\s+)?([\w.]+)\s*;"];
static PHP_IMPORTS: LazyLock<Vec<Regex>> = regexes![
    r#"(?:require|include)(?:_once)?\s*\(?\s*(?:__DIR__\s*\.\s*)?['"]([^'"]+)['"]"#,
    r"(?m)^\s*use\s+([\w\\]+)\s*;",
];
static RUBY_IMPORTS: LazyLock<Vec<Regex>> = regexes![
    r#"(?m)^\s*require_relative\s+['"]([^'"]+)['"]"#,
    r#"(?m)^\s*require\s+['"]([^'"]+)['"]"#,
];
static DART_IMPORTS: LazyLock<Vec<Regex>> =
    regexes![r#"(?m)^\s*(?:import|export|part)\s+['"]([^'"]+)['"]"#];
static SOLIDITY_IMPORTS: LazyLock<Vec<Regex>> =
    regexes![r#"(?m)^\s*import\s+(?:[^'";]*\s+from\s+)?['"]([^'"]+)['"]"#];

static MISSING_MODULE_PATTERNS: LazyLock<Vec<Regex>> = regexes![
    r#"Cannot find module ['"]([^'"]+)['"]"#,
    r#"Can't resolve ['"]([^'"]+)['"]"#,
    r#"Failed to resolve import ['"]([^'"]+)['"]"#,
    r#"No module named ['"]?([\w.]+)['"]?"#,
    r#"cannot find package ['"]([^'"]+)['"]"#,
    r"no required module provides package (\S+?);?(?:\s|$)",
    r"unresolved import `([^`]+)`",
    r"package ([\w.]+) does not exist",
    r#"fatal error: ['"]?([^'":\s]+)['"]?:? (?:No such file or directory|file not found)"#,
    r"cannot load such file -- (\S+)",
    r#"Target of URI doesn't exist: ['"]([^'"]+)['"]"#,
    r#"Source "([^"]+)" not found"#,
];

/// A source file found by [`ContextEngine::scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Project-relative path with forward slashes.
    pub path: String,
    /// Language inferred from the extension
    pub language: Language,
    /// Size in bytes
    pub size: u64,
}

/// Result of walking a project tree.
#[derive(Debug, Clone)]
pub struct ProjectSnapshot {
    /// Absolute project root
    pub root: PathBuf,
    /// Detected project language
    pub language: Language,
    /// Source files in scan order
    pub files: Vec<SourceFile>,
    /// The walk stopped at `max_files`.
    pub truncated: bool,
}

impl ProjectSnapshot {
    /// Whether `path` was found by the scan.
    pub fn contains(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path == path)
    }
}

/// Project-internal import edges between scanned files.
#[derive(Debug, Clone, Default)]
pub struct ImportGraph {
    imports: BTreeMap<String, BTreeSet<String>>,
    importers: BTreeMap<String, BTreeSet<String>>,
}

impl ImportGraph {
    fn add_edge(&mut self, from: &str, to: &str) {
        self.imports
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.importers
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());
    }

    /// Project files `path` imports.
    pub fn imports_of(&self, path: &str) -> Vec<&str> {
        self.imports
            .get(path)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Project files that import `path`.
    pub fn importers_of(&self, path: &str) -> Vec<&str> {
        self.importers
            .get(path)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Number of import edges.
    pub fn edge_count(&self) -> usize {
        self.imports.values().map(BTreeSet::len).sum()
    }
}

/// Scans projects and assembles [`FixContext`] values.
#[derive(Debug, Clone, Default)]
pub struct ContextEngine {
    config: ContextConfig,
}

impl ContextEngine {
    /// Engine with the given limits.
    pub const fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Detect the project language from manifests at the root, falling
    /// back to common nested project directories.
    pub fn detect_language(root: &Path) -> Language {
        let detected = detect_in_dir(root);
        if detected != Language::Unknown {
            return detected;
        }
        NESTED_PROJECT_DIRS
            .iter()
            .map(|dir| root.join(dir))
            .filter(|dir| dir.is_dir())
            .map(|dir| detect_in_dir(&dir))
            .find(|lang| *lang != Language::Unknown)
            .unwrap_or(Language::Unknown)
    }

    /// [`Self::detect_language`] on the blocking thread pool.
    pub async fn detect_language_async(root: &Path) -> Language {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || Self::detect_language(&root))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Language detection task failed");
                Language::Unknown
            })
    }

    /// Walk source files under `root`, skipping dependency and build
    /// directories, up to `max_files`.
    pub fn scan(&self, root: &Path) -> ProjectSnapshot {
        let mut files = Vec::new();
        let mut truncated = false;

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(language) = language_for_path(entry.path()) else {
                continue;
            };
            if files.len() >= self.config.max_files {
                truncated = true;
                break;
            }
            let Some(path) = relative_path(root, entry.path()) else {
                continue;
            };
            files.push(SourceFile {
                path,
                language,
                size: entry.metadata().map(|m| m.len()).unwrap_or(0),
            });
        }

        tracing::debug!(
            root = %root.display(),
            files = files.len(),
            truncated,
            "Scanned project"
        );

        ProjectSnapshot {
            root: root.to_path_buf(),
            language: Self::detect_language(root),
            files,
            truncated,
        }
    }

    /// Raw import targets in `content`, using the language of `path`.
    pub fn extract_imports(path: &str, content: &str) -> Vec<String> {
        let Some(language) = language_for_path(Path::new(path)) else {
            return Vec::new();
        };
        let patterns: &[Regex] = match language {
            Language::JavaScript | Language::TypeScript | Language::Angular | Language::Vue => {
                &JS_IMPORTS
            }
            Language::Python => &PY_IMPORTS,
            Language::Java => &JAVA_IMPORTS,
            Language::Go => return extract_go_imports(content),
            Language::Rust => &RUST_IMPORTS,
            Language::C | Language::Cpp => &C_IMPORTS,
            Language::CSharp => &CSHARP_IMPORTS,
            Language::Php => &PHP_IMPORTS,
            Language::Ruby => return extract_ruby_imports(content),
            Language::Dart => &DART_IMPORTS,
            Language::Solidity => &SOLIDITY_IMPORTS,
            Language::Unknown => return Vec::new(),
        };

        let mut seen = HashSet::new();
        patterns
            .iter()
            .flat_map(|re| re.captures_iter(content))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .filter(|target| seen.insert(target.clone()))
            .collect()
    }

    /// Build the project-internal import graph of a snapshot.
    pub fn import_graph(&self, snapshot: &ProjectSnapshot) -> ImportGraph {
        let known: HashSet<&str> = snapshot.files.iter().map(|f| f.path.as_str()).collect();
        let mut graph = ImportGraph::default();

        for file in &snapshot.files {
            let Ok(content) = std::fs::read_to_string(snapshot.root.join(&file.path)) else {
                continue;
            };
            for target in Self::extract_imports(&file.path, &content) {
                if let Some(resolved) = resolve_import(&file.path, &target, file.language, &known) {
                    if resolved != file.path {
                        graph.add_edge(&file.path, &resolved);
                    }
                }
            }
        }
        graph
    }

    /// Modules an error reports as missing, in order of appearance.
    pub fn find_missing_modules(error_text: &str) -> Vec<MissingModule> {
        let mut found: Vec<(usize, String)> = MISSING_MODULE_PATTERNS
            .iter()
            .flat_map(|re| re.captures_iter(error_text))
            .filter_map(|caps| caps.get(1).map(|m| (m.start(), m.as_str().to_string())))
            .collect();
        found.sort_by_key(|(pos, _)| *pos);

        let mut seen = HashSet::new();
        found
            .into_iter()
            .filter(|(_, name)| seen.insert(name.clone()))
            .map(|(_, name)| MissingModule {
                relative: name.starts_with('.') || name.starts_with('/'),
                name,
            })
            .collect()
    }

    /// Assemble the files a strategy should see for `classified`.
    ///
    /// Runs the blocking directory walk on the blocking thread pool.
    pub async fn build_context(
        &self,
        root: &Path,
        classified: &ClassifiedError,
        window_text: &str,
    ) -> FixContext {
        let engine = self.clone();
        let root_buf = root.to_path_buf();
        let classified_owned = classified.clone();
        let window = window_text.to_string();

        match tokio::task::spawn_blocking(move || {
            engine.build_context_blocking(&root_buf, &classified_owned, &window)
        })
        .await
        {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(error = %e, "Context build task failed; using error text only");
                FixContext::new(root, classified.language, window_text)
            }
        }
    }

    /// Synchronous body of [`Self::build_context`].
    pub fn build_context_blocking(
        &self,
        root: &Path,
        classified: &ClassifiedError,
        window_text: &str,
    ) -> FixContext {
        let snapshot = self.scan(root);
        let language = if classified.language == Language::Unknown {
            snapshot.language
        } else {
            classified.language
        };

        let mut context = FixContext::new(root, language, window_text);
        context.missing_modules = Self::find_missing_modules(&classified.original_message);
        context.project_files = snapshot
            .files
            .iter()
            .take(200)
            .map(|f| f.path.clone())
            .collect();

        let mut budget = Budget::new(self.config.max_context_files, self.config.max_context_bytes);

        let primary = classified
            .file_path
            .as_deref()
            .and_then(|p| project_relative(root, p))
            .filter(|p| root.join(p).is_file());

        if let Some(primary_path) = &primary {
            context.primary_file = budget.take(root, primary_path);
        }

        let mut related: Vec<String> = Vec::new();
        if let Some(primary_path) = &primary {
            let graph = self.import_graph(&snapshot);
            related.extend(graph.imports_of(primary_path).into_iter().map(String::from));
            related.extend(
                graph
                    .importers_of(primary_path)
                    .into_iter()
                    .map(String::from),
            );
        }
        for missing in context.missing_modules.iter().filter(|m| m.relative) {
            related.extend(similar_files(&snapshot, &missing.name));
        }

        let mut seen: HashSet<String> = primary.iter().cloned().collect();
        for path in related {
            if !seen.insert(path.clone()) {
                continue;
            }
            match budget.take(root, &path) {
                Some(file) => context.related_files.push(file),
                None if budget.exhausted() => break,
                None => {}
            }
        }

        tracing::debug!(
            language = %context.language,
            primary = context.primary_file.as_ref().map_or("-", |f| f.path.as_str()),
            related = context.related_files.len(),
            bytes = context.total_bytes(),
            "Built fix context"
        );
        context
    }
}

/// File-count and byte budget for prompt context.
struct Budget {
    files_left: usize,
    bytes_left: usize,
}

impl Budget {
    const fn new(files: usize, bytes: usize) -> Self {
        Self {
            files_left: files,
            bytes_left: bytes,
        }
    }

    const fn exhausted(&self) -> bool {
        self.files_left == 0 || self.bytes_left == 0
    }

    fn take(&mut self, root: &Path, path: &str) -> Option<ContextFile> {
        if self.exhausted() {
            return None;
        }
        let content = std::fs::read_to_string(root.join(path)).ok()?;
        let (content, truncated) = if content.len() > self.bytes_left {
            (truncate_at_char_boundary(&content, self.bytes_left), true)
        } else {
            (content, false)
        };
        self.files_left -= 1;
        self.bytes_left -= content.len();
        Some(ContextFile {
            path: path.to_string(),
            content,
            truncated,
        })
    }
}

fn truncate_at_char_boundary(text: &str, max: usize) -> String {
    let mut end = max.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

fn detect_in_dir(dir: &Path) -> Language {
    let has = |name: &str| dir.join(name).exists();

    if has("angular.json") {
        return Language::Angular;
    }
    if has("hardhat.config.js") || has("hardhat.config.ts") || has("foundry.toml") {
        return Language::Solidity;
    }
    if has("package.json") {
        let deps = package_json_dependencies(&dir.join("package.json"));
        if deps.contains("@angular/core") {
            return Language::Angular;
        }
        if deps.contains("vue") || deps.contains("nuxt") {
            return Language::Vue;
        }
        if deps.contains("hardhat") {
            return Language::Solidity;
        }
        if has("tsconfig.json") || deps.contains("typescript") {
            return Language::TypeScript;
        }
        return Language::JavaScript;
    }
    if has("tsconfig.json") {
        return Language::TypeScript;
    }
    if has("pubspec.yaml") {
        return Language::Dart;
    }
    if has("Cargo.toml") {
        return Language::Rust;
    }
    if has("go.mod") {
        return Language::Go;
    }
    if has("pom.xml") || has("build.gradle") || has("build.gradle.kts") {
        return Language::Java;
    }
    if has("requirements.txt") || has("pyproject.toml") || has("setup.py") || has("Pipfile") {
        return Language::Python;
    }
    if has("composer.json") {
        return Language::Php;
    }
    if has("Gemfile") {
        return Language::Ruby;
    }
    if has_file_with_extension(dir, &["csproj", "sln"]) {
        return Language::CSharp;
    }
    if has("CMakeLists.txt") || has_file_with_extension(dir, &["cpp", "cc", "hpp"]) {
        return Language::Cpp;
    }
    if has("Makefile") && has_file_with_extension(dir, &["c"]) {
        return Language::C;
    }
    Language::Unknown
}

fn package_json_dependencies(path: &Path) -> HashSet<String> {
    let Ok(text) = std::fs::read_to_string(path) else {
        return HashSet::new();
    };
    let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) else {
        return HashSet::new();
    };
    ["dependencies", "devDependencies", "peerDependencies"]
        .iter()
        .filter_map(|key| json.get(key).and_then(serde_json::Value::as_object))
        .flat_map(|deps| deps.keys().cloned())
        .collect()
}

fn has_file_with_extension(dir: &Path, extensions: &[&str]) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries.filter_map(Result::ok).any(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| extensions.contains(&e))
            })
        })
        .unwrap_or(false)
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn language_for_path(path: &Path) -> Option<Language> {
    let ext = path.extension()?.to_str()?;
    Some(match ext {
        "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
        "ts" | "tsx" => Language::TypeScript,
        "vue" => Language::Vue,
        "py" => Language::Python,
        "java" | "kt" => Language::Java,
        "go" => Language::Go,
        "rs" => Language::Rust,
        "c" | "h" => Language::C,
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => Language::Cpp,
        "cs" => Language::CSharp,
        "php" => Language::Php,
        "rb" => Language::Ruby,
        "dart" => Language::Dart,
        "sol" => Language::Solidity,
        _ => return None,
    })
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(
        rel.components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
    )
}

/// Map an error's file path to a root-relative one, if it lies inside root.
fn project_relative(root: &Path, file: &str) -> Option<String> {
    let path = Path::new(file);
    if path.is_absolute() {
        relative_path(root, path)
    } else {
        normalize_relative(file)
    }
}

/// Collapse `.` and `..` segments; `None` if the path escapes its base.
fn normalize_relative(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

fn join(dir: &str, rest: &str) -> String {
    if dir.is_empty() {
        rest.to_string()
    } else {
        format!("{dir}/{rest}")
    }
}

/// Resolve an import target to a scanned project file.
fn resolve_import(
    from: &str,
    target: &str,
    language: Language,
    known: &HashSet<&str>,
) -> Option<String> {
    let dir = parent_dir(from);
    let first_existing = |candidates: Vec<String>| {
        candidates
            .into_iter()
            .find(|candidate| known.contains(candidate.as_str()))
    };

    match language {
        Language::Python => {
            let dots = target.chars().take_while(|c| *c == '.').count();
            let module_path = target[dots..].replace('.', "/");
            let base = if dots > 0 {
                let mut base = dir.to_string();
                for _ in 1..dots {
                    base = parent_dir(&base).to_string();
                }
                join(&base, &module_path)
            } else {
                module_path
            };
            let exact = first_existing(vec![
                format!("{base}.py"),
                format!("{base}/__init__.py"),
            ]);
            exact.or_else(|| suffix_match(known, &format!("{base}.py")))
        }
        Language::Java => suffix_match(known, &format!("{}.java", target.replace('.', "/"))),
        Language::Rust => {
            if let Some(rest) = target
                .strip_prefix("crate::")
                .or_else(|| target.strip_prefix("self::"))
                .or_else(|| target.strip_prefix("super::"))
            {
                let first = rest.split("::").next()?;
                suffix_match(known, &format!("{first}.rs"))
                    .or_else(|| suffix_match(known, &format!("{first}/mod.rs")))
            } else {
                first_existing(vec![
                    join(dir, &format!("{target}.rs")),
                    join(dir, &format!("{target}/mod.rs")),
                ])
            }
        }
        Language::C | Language::Cpp => {
            let local = normalize_relative(&join(dir, target))?;
            first_existing(vec![local]).or_else(|| suffix_match(known, &format!("/{target}")))
        }
        Language::Ruby => {
            let local = normalize_relative(&join(dir, target))?;
            first_existing(vec![format!("{local}.rb"), local])
        }
        _ => {
            if !(target.starts_with("./") || target.starts_with("../")) {
                return None;
            }
            let base = normalize_relative(&join(dir, target))?;
            let mut candidates = vec![base.clone()];
            candidates.extend(RESOLVE_EXTENSIONS.iter().map(|ext| format!("{base}.{ext}")));
            candidates.extend(
                ["ts", "tsx", "js", "jsx"]
                    .iter()
                    .map(|ext| format!("{base}/index.{ext}")),
            );
            first_existing(candidates)
        }
    }
}

fn suffix_match(known: &HashSet<&str>, suffix: &str) -> Option<String> {
    let suffix = suffix.trim_start_matches('/');
    let slash_suffix = format!("/{suffix}");
    let mut matches: Vec<&str> = known
        .iter()
        .copied()
        .filter(|path| *path == suffix || path.ends_with(&slash_suffix))
        .collect();
    matches.sort_unstable();
    matches.first().map(|p| (*p).to_string())
}

/// Files whose stem matches the last segment of a missing relative import.
fn similar_files(snapshot: &ProjectSnapshot, missing: &str) -> Vec<String> {
    let Some(stem) = missing
        .rsplit('/')
        .next()
        .map(|s| s.split('.').next().unwrap_or(s).to_lowercase())
        .filter(|s| !s.is_empty())
    else {
        return Vec::new();
    };
    snapshot
        .files
        .iter()
        .filter(|f| {
            let name = f.path.rsplit('/').next().unwrap_or(&f.path);
            let file_stem = name.split('.').next().unwrap_or(name).to_lowercase();
            file_stem == stem || file_stem.trim_end_matches('s') == stem.trim_end_matches('s')
        })
        .map(|f| f.path.clone())
        .collect()
}

fn extract_go_imports(content: &str) -> Vec<String> {
    static SINGLE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?m)^\s*import\s+(?:[\w.]+\s+)?"([^"]+)""#).expect("valid regex")
    });
    static BLOCK: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)import\s*\((.*?)\)").expect("valid regex"));

    let mut imports: Vec<String> = SINGLE
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect();
    for block in BLOCK.captures_iter(content) {
        imports.extend(
            GO_IMPORTS
                .iter()
                .flat_map(|re| re.captures_iter(&block[1]))
                .map(|caps| caps[1].to_string()),
        );
    }
    imports.dedup();
    imports
}

fn extract_ruby_imports(content: &str) -> Vec<String> {
    let relative = &RUBY_IMPORTS[0];
    let plain = &RUBY_IMPORTS[1];
    relative
        .captures_iter(content)
        .map(|caps| {
            let target = &caps[1];
            if target.starts_with('.') {
                target.to_string()
            } else {
                format!("./{target}")
            }
        })
        .chain(plain.captures_iter(content).map(|caps| caps[1].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ErrorCategory, ErrorType};
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, path: &str, content: &str) {
        let full = root.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    fn node_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "package.json", r#"{"dependencies":{"express":"^4"}}"#);
        write(
            root,
            "src/index.js",
            "const app = require('./app');\nconst express = require('express');\n",
        );
        write(
            root,
            "src/app.js",
            "import { router } from './routes/user';\nexport default router;\n",
        );
        write(root, "src/routes/user.js", "export const router = 1;\n");
        write(root, "node_modules/express/index.js", "module.exports = {};\n");
        dir
    }

    fn classified(file: Option<&str>, message: &str) -> ClassifiedError {
        ClassifiedError {
            error_type: ErrorType::Import,
            category: ErrorCategory::Import,
            language: Language::Unknown,
            is_claude_fixable: true,
            file_path: file.map(String::from),
            line_number: Some(1),
            original_message: message.to_string(),
            suggested_action: String::new(),
            confidence: 0.9,
            extracted_context: BTreeMap::new(),
            rule_id: None,
        }
    }

    #[test]
    fn detects_languages_from_manifests() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "go.mod", "module x\n");
        assert_eq!(ContextEngine::detect_language(dir.path()), Language::Go);

        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "package.json",
            r#"{"dependencies":{"vue":"^3"}}"#,
        );
        assert_eq!(ContextEngine::detect_language(dir.path()), Language::Vue);

        let dir = TempDir::new().unwrap();
        write(dir.path(), "package.json", "{}");
        write(dir.path(), "tsconfig.json", "{}");
        assert_eq!(
            ContextEngine::detect_language(dir.path()),
            Language::TypeScript
        );
    }

    #[test]
    fn detects_nested_backend_projects() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "backend/pom.xml", "<project/>");
        assert_eq!(ContextEngine::detect_language(dir.path()), Language::Java);
    }

    #[test]
    fn scan_skips_dependency_directories() {
        let dir = node_project();
        let snapshot = ContextEngine::default().scan(dir.path());
        assert_eq!(snapshot.language, Language::JavaScript);
        assert!(snapshot.contains("src/index.js"));
        assert!(!snapshot.files.iter().any(|f| f.path.contains("node_modules")));
        assert!(!snapshot.truncated);
    }

    #[test]
    fn scan_respects_max_files() {
        let dir = node_project();
        let engine = ContextEngine::new(ContextConfig {
            max_files: 1,
            ..ContextConfig::default()
        });
        let snapshot = engine.scan(dir.path());
        assert_eq!(snapshot.files.len(), 1);
        assert!(snapshot.truncated);
    }

    #[test]
    fn extracts_imports_per_language() {
        let js = ContextEngine::extract_imports(
            "a.ts",
            "import x from './x';\nimport { y } from \"lib\";\nconst z = require('./z');",
        );
        assert_eq!(js, vec!["./x", "lib", "./z"]);

        let py = ContextEngine::extract_imports("a.py", "from .models import User\nimport os.path\n");
        assert_eq!(py, vec![".models", "os.path"]);

        let go = ContextEngine::extract_imports(
            "main.go",
            "package main\n\nimport (\n\t\"fmt\"\n\tlog \"github.com/x/log\"\n)\n",
        );
        assert_eq!(go, vec!["fmt", "github.com/x/log"]);

        let rs = ContextEngine::extract_imports("src/lib.rs", "mod parser;\nuse crate::parser::Token;\n");
        assert_eq!(rs, vec!["parser", "crate::parser::Token"]);
    }

    #[test]
    fn import_graph_resolves_relative_paths() {
        let dir = node_project();
        let engine = ContextEngine::default();
        let snapshot = engine.scan(dir.path());
        let graph = engine.import_graph(&snapshot);

        assert_eq!(graph.imports_of("src/index.js"), vec!["src/app.js"]);
        assert_eq!(graph.imports_of("src/app.js"), vec!["src/routes/user.js"]);
        assert_eq!(graph.importers_of("src/app.js"), vec!["src/index.js"]);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn finds_missing_modules_in_error_text() {
        let modules = ContextEngine::find_missing_modules(
            "Error: Cannot find module './routes/users'\nModuleNotFoundError: No module named 'numpy'",
        );
        assert_eq!(
            modules,
            vec![
                MissingModule {
                    name: "./routes/users".into(),
                    relative: true
                },
                MissingModule {
                    name: "numpy".into(),
                    relative: false
                },
            ]
        );
    }

    #[test]
    fn build_context_collects_neighbours_within_budget() {
        let dir = node_project();
        let engine = ContextEngine::default();
        let err = classified(
            Some("src/app.js"),
            "Error: Cannot find module './routes/users'",
        );

        let context = engine.build_context_blocking(dir.path(), &err, "window");
        assert_eq!(context.language, Language::JavaScript);
        assert_eq!(context.primary_file.as_ref().unwrap().path, "src/app.js");
        let related: Vec<&str> = context.related_files.iter().map(|f| f.path.as_str()).collect();
        assert!(related.contains(&"src/routes/user.js"));
        assert!(related.contains(&"src/index.js"));
        assert_eq!(context.error_window, "window");
    }

    #[test]
    fn build_context_truncates_to_byte_budget() {
        let dir = node_project();
        write(dir.path(), "src/big.js", &"x".repeat(1000));
        let engine = ContextEngine::new(ContextConfig {
            max_context_bytes: 100,
            ..ContextConfig::default()
        });
        let err = classified(Some("src/big.js"), "SyntaxError");

        let context = engine.build_context_blocking(dir.path(), &err, "");
        let primary = context.primary_file.unwrap();
        assert_eq!(primary.content.len(), 100);
        assert!(primary.truncated);
        assert!(context.related_files.is_empty());
    }

    #[test]
    fn paths_outside_the_root_are_ignored() {
        let dir = node_project();
        let err = classified(Some("../../etc/passwd"), "boom");
        let context = ContextEngine::default().build_context_blocking(dir.path(), &err, "");
        assert!(context.primary_file.is_none());
    }

    #[tokio::test]
    async fn async_build_context_matches_blocking() {
        let dir = node_project();
        let engine = ContextEngine::default();
        let err = classified(Some("src/index.js"), "ReferenceError: x is not defined");
        let context = engine.build_context(dir.path(), &err, "w").await;
        assert_eq!(context.primary_file.unwrap().path, "src/index.js");
    }
}
