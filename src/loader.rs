//! Module loading through a file reader and a list of source paths.
//!
//! Candidate files are tried one at a time, in order; the first readable one
//! wins and nothing is reported until every candidate has been tried.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::backend::{FileReader, Lang, LoadRequest, LoadedSource, Loader};
use crate::errors::ReplError;
use crate::session::ModuleIndex;
use crate::syntax::Symbol;

/// Dependency manifest of the Closure library, relative to a source path.
pub const DEPS_FILE: &str = "goog/deps.js";

/// Namespaces bundled with the compiler; loading them is a no-op.
const SKIP_NAMESPACES: &[&str] = &[
    "cljs.core",
    "cljs.env",
    "cljs.pprint",
    "cljs.tools.reader",
    "clojure.walk",
    "goog.array",
    "goog.object",
    "goog.string",
    "goog.string.StringBuffer",
];

/// Macro namespaces bundled with the compiler.
const SKIP_MACRO_NAMESPACES: &[&str] = &[
    "cljs.core",
    "cljs.env.macros",
    "cljs.analyzer.macros",
    "cljs.compiler.macros",
    "cljs.pprint",
];

const MACRO_EXTENSIONS: &[&str] = &[".clj", ".cljc"];
const SOURCE_EXTENSIONS: &[&str] = &[".cljs", ".cljc", ".js"];

// ============================================================================
// FILE READERS
// ============================================================================

/// Reads from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

#[async_trait]
impl FileReader for FsReader {
    async fn read_file(&self, path: &str) -> Option<String> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::trace!(path, error = %e, "file not readable");
                None
            }
        }
    }
}

/// Loader used when nothing was configured: every module is missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLoader;

#[async_trait]
impl Loader for NullLoader {
    async fn load(&self, request: &LoadRequest) -> Result<Option<LoadedSource>, ReplError> {
        tracing::debug!(name = %request.name, "no loader configured");
        Ok(None)
    }
}

// ============================================================================
// CANDIDATE SEARCH
// ============================================================================

/// `src_path` joined with `file`, tolerating a missing or doubled separator.
pub fn join_path(src_path: &str, file: &str) -> String {
    if src_path.is_empty() {
        return file.to_string();
    }
    format!(
        "{}/{}",
        src_path.trim_end_matches('/'),
        file.trim_start_matches('/')
    )
}

/// `file` under every source path, in source path order.
pub fn file_paths(src_paths: &[String], file: &str) -> Vec<String> {
    src_paths.iter().map(|src| join_path(src, file)).collect()
}

/// Candidates for a module path without extension: extension-major, then
/// source path order.
pub fn candidate_paths(src_paths: &[String], macros: bool, path: &str) -> Vec<String> {
    let extensions = if macros {
        MACRO_EXTENSIONS
    } else {
        SOURCE_EXTENSIONS
    };
    extensions
        .iter()
        .flat_map(|ext| file_paths(src_paths, &format!("{}{}", path, ext)))
        .collect()
}

/// Read candidates in order and stop at the first readable one.
pub async fn read_first(
    reader: &dyn FileReader,
    candidates: &[String],
    verbose: bool,
) -> Option<LoadedSource> {
    for candidate in candidates {
        if verbose {
            tracing::info!(path = %candidate, "trying to read");
        }
        if let Some(source) = reader.read_file(candidate).await {
            tracing::debug!(path = %candidate, "read succeeded");
            return Some(LoadedSource {
                lang: lang_of(candidate),
                source,
                file: Some(candidate.clone()),
            });
        }
    }
    tracing::debug!(tried = candidates.len(), "no candidate could be read");
    None
}

fn lang_of(path: &str) -> Lang {
    if path.ends_with(".js") {
        Lang::Js
    } else {
        Lang::Clj
    }
}

pub fn is_skipped(request: &LoadRequest) -> bool {
    let skip = if request.macros {
        SKIP_MACRO_NAMESPACES
    } else {
        SKIP_NAMESPACES
    };
    skip.contains(&request.name.as_str())
}

// ============================================================================
// PATH LOADER
// ============================================================================

/// Loader built from a file reader and source paths.
pub struct PathLoader {
    reader: Arc<dyn FileReader>,
    src_paths: Vec<String>,
    index: ModuleIndex,
    verbose: bool,
}

impl PathLoader {
    pub fn new(reader: Arc<dyn FileReader>, src_paths: Vec<String>, index: ModuleIndex) -> Self {
        Self {
            reader,
            src_paths,
            index,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn closure_candidates(&self, request: &LoadRequest) -> Vec<String> {
        match self.index.get(&request.name) {
            Some(path) => file_paths(&self.src_paths, path),
            None => file_paths(&self.src_paths, &format!("{}.js", request.path)),
        }
    }
}

#[async_trait]
impl Loader for PathLoader {
    async fn load(&self, request: &LoadRequest) -> Result<Option<LoadedSource>, ReplError> {
        if is_skipped(request) {
            tracing::debug!(name = %request.name, "skipping bundled namespace");
            return Ok(Some(LoadedSource {
                lang: Lang::Js,
                source: String::new(),
                file: None,
            }));
        }

        let candidates = if request.path.starts_with("goog/") {
            self.closure_candidates(request)
        } else {
            candidate_paths(&self.src_paths, request.macros, &request.path)
        };

        Ok(read_first(self.reader.as_ref(), &candidates, self.verbose).await)
    }
}

// ============================================================================
// MODULE INDEX DISCOVERY
// ============================================================================

static ADD_DEPENDENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"goog\.addDependency\(\s*['"]([^'"]+)['"]\s*,\s*\[([^\]]*)\]"#)
        .expect("dependency pattern is valid")
});

static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"]([^'"]+)['"]"#).expect("quoted pattern is valid"));

/// Provide → path pairs of a `deps.js` manifest. Paths are made relative to
/// the source path, i.e. prefixed with `goog/`.
pub fn parse_deps(manifest: &str) -> Vec<(Symbol, String)> {
    let mut pairs = Vec::new();
    for caps in ADD_DEPENDENCY.captures_iter(manifest) {
        let path = caps[1].trim_start_matches("./");
        let full_path = join_path("goog", path);
        for provide in QUOTED.captures_iter(&caps[2]) {
            pairs.push((Symbol::new(&provide[1]), full_path.clone()));
        }
    }
    pairs
}

/// Scan each source path for the dependency manifest.
pub async fn discover_module_index(
    reader: &dyn FileReader,
    src_paths: &[String],
) -> Vec<(Symbol, String)> {
    let mut pairs = Vec::new();
    for manifest in file_paths(src_paths, DEPS_FILE) {
        if let Some(text) = reader.read_file(&manifest).await {
            let found = parse_deps(&text);
            tracing::debug!(manifest = %manifest, provides = found.len(), "module index");
            pairs.extend(found);
        }
    }
    pairs
}
