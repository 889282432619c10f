//! The transform: source tree → [`ServerBuild`].
//!
//! # Source layout
//! ```text
//! app/
//!   root.html                  document shell, must contain {{{ outlet }}}
//!   routes/
//!     index.html               /
//!     _account.login.html      /login          (`_` segments are pathless)
//!     app.index.html           /app
//!     bands.$band_id.html      /bands/:band_id
//!     docs/$.html              /docs/*         (directories act like dots)
//! ```
//!
//! A route file may start with TOML front matter between `+++` lines
//! (`title`, `status`, `redirect`).
//!
//! # Design Decisions
//! - Reading and compiling are separate so the development loader can
//!   fingerprint the tree and skip unchanged rebuilds
//! - Every diagnostic names the source file (and line for template errors)

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use serde::Deserialize;

use crate::render::bundle::{rank, CompiledRoute, PatternSegment, ServerBuild, FORMAT_VERSION};
use crate::render::template::{Template, TemplateError};

pub const DOCUMENT_FILE: &str = "root.html";
pub const ROUTES_DIR: &str = "routes";
const ROUTE_EXTENSION: &str = ".html";
const FRONT_MATTER_FENCE: &str = "+++";

/// Variables available to every template.
const REQUEST_VARIABLES: [&str; 5] = ["title", "path", "method", "query", "request_id"];

/// Transform failure.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid UTF-8")]
    NotUtf8 { path: String },
    #[error("missing document shell {path}")]
    MissingDocument { path: String },
    #[error("{file}:{}: {}", .source.line, .source.message)]
    Template {
        file: String,
        #[source]
        source: TemplateError,
    },
    #[error("{file}: invalid front matter: {message}")]
    FrontMatter { file: String, message: String },
    #[error("{file}: invalid route name: {message}")]
    RouteName { file: String, message: String },
    #[error("{file}: unknown variable '{name}'")]
    UnknownVariable { file: String, name: String },
    #[error("{file}: document shell must contain {{{{{{ outlet }}}}}}")]
    MissingOutlet { file: String },
    #[error("routes {first} and {second} both match {pattern}")]
    DuplicateRoute {
        pattern: String,
        first: String,
        second: String,
    },
    #[error("cannot write bundle {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot serialize bundle: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One source file, path relative to the source root with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub contents: String,
}

/// Snapshot of everything the transform reads.
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
    files: Vec<SourceFile>,
}

impl SourceTree {
    /// Read `root.html` and every `routes/**/*.html` under `root`.
    pub fn read(root: &Path) -> Result<Self, CompileError> {
        let mut files = Vec::new();

        let document = root.join(DOCUMENT_FILE);
        if !document.is_file() {
            return Err(CompileError::MissingDocument {
                path: document.display().to_string(),
            });
        }
        files.push(read_source(root, &document)?);

        let routes = root.join(ROUTES_DIR);
        if routes.is_dir() {
            collect_routes(root, &routes, &mut files)?;
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    /// Build a tree from in-memory files.
    pub fn from_files(root: impl Into<PathBuf>, mut files: Vec<SourceFile>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            root: root.into(),
            files,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Content hash over every path and its contents.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for file in &self.files {
            hasher.update(&(file.path.len() as u64).to_le_bytes());
            hasher.update(file.path.as_bytes());
            hasher.update(&(file.contents.len() as u64).to_le_bytes());
            hasher.update(file.contents.as_bytes());
        }
        hasher.finalize()
    }

    fn get(&self, path: &str) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.path == path)
    }
}

fn read_source(root: &Path, path: &Path) -> Result<SourceFile, CompileError> {
    let display = path.display().to_string();
    let bytes = fs::read(path).map_err(|source| CompileError::Io {
        path: display.clone(),
        source,
    })?;
    let contents = String::from_utf8(bytes).map_err(|_| CompileError::NotUtf8 { path: display })?;
    let relative = path
        .strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    Ok(SourceFile {
        path: relative,
        contents,
    })
}

fn collect_routes(root: &Path, dir: &Path, out: &mut Vec<SourceFile>) -> Result<(), CompileError> {
    let entries = WalkDir::new(dir).skip_hidden(false).follow_links(false);
    for entry in entries {
        let entry = entry.map_err(|e| CompileError::Io {
            path: dir.display().to_string(),
            source: std::io::Error::other(e.to_string()),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path.as_path());
        let hidden = relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'));
        if hidden || !entry.file_name().to_string_lossy().ends_with(ROUTE_EXTENSION) {
            continue;
        }
        out.push(read_source(root, &path)?);
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FrontMatter {
    title: Option<String>,
    status: Option<u16>,
    redirect: Option<String>,
}

/// Split optional `+++` front matter from the body.
///
/// Returns the front matter, the body and the number of lines the front
/// matter occupied (for template line numbers).
fn split_front_matter<'a>(
    file: &str,
    contents: &'a str,
) -> Result<(FrontMatter, &'a str, usize), CompileError> {
    let mut lines = contents.split_inclusive('\n');
    match lines.next() {
        Some(first) if first.trim_end() == FRONT_MATTER_FENCE => {}
        _ => return Ok((FrontMatter::default(), contents, 0)),
    }

    let mut offset = contents.split_inclusive('\n').next().map_or(0, str::len);
    let header_start = offset;
    let mut consumed_lines = 1;
    for line in lines {
        consumed_lines += 1;
        if line.trim_end() == FRONT_MATTER_FENCE {
            let header = &contents[header_start..offset];
            let front: FrontMatter = toml::from_str(header).map_err(|e| CompileError::FrontMatter {
                file: file.to_string(),
                message: e.message().to_string(),
            })?;
            return Ok((front, &contents[offset + line.len()..], consumed_lines));
        }
        offset += line.len();
    }

    Err(CompileError::FrontMatter {
        file: file.to_string(),
        message: format!("missing closing '{FRONT_MATTER_FENCE}'"),
    })
}

/// Turn a route file path (relative to `routes/`) into a pattern.
pub fn route_pattern(file: &str) -> Result<Vec<PatternSegment>, CompileError> {
    let invalid = |message: String| CompileError::RouteName {
        file: file.to_string(),
        message,
    };

    let stem = file
        .strip_suffix(ROUTE_EXTENSION)
        .ok_or_else(|| invalid(format!("expected a '{ROUTE_EXTENSION}' file")))?;
    let names: Vec<&str> = stem.split(['.', '/']).collect();

    let mut pattern = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let last = i + 1 == names.len();
        if name.is_empty() {
            return Err(invalid("empty segment".to_string()));
        }
        if last && *name == "index" {
            continue;
        }
        if name.starts_with('_') {
            continue;
        }
        if *name == "$" {
            if !last {
                return Err(invalid("splat '$' must be the final segment".to_string()));
            }
            pattern.push(PatternSegment::Splat);
        } else if let Some(param) = name.strip_prefix('$') {
            if !param.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid(format!("invalid param name '{param}'")));
            }
            pattern.push(PatternSegment::Param(param.to_string()));
        } else if name.contains('$') {
            return Err(invalid(format!("'$' may only start a segment ('{name}')")));
        } else {
            pattern.push(PatternSegment::Static((*name).to_string()));
        }
    }
    Ok(pattern)
}

fn is_request_variable(name: &str) -> bool {
    REQUEST_VARIABLES.iter().any(|v| *v == name)
}

fn parse_template(file: &str, src: &str, line_offset: usize) -> Result<Template, CompileError> {
    Template::parse(src).map_err(|mut source| {
        source.line += line_offset;
        CompileError::Template {
            file: file.to_string(),
            source,
        }
    })
}

fn check_variables<'a, F>(file: &str, template: &'a Template, allowed: F) -> Result<(), CompileError>
where
    F: Fn(&'a str) -> bool,
{
    match template.variables().find(|name| !allowed(*name)) {
        Some(name) => Err(CompileError::UnknownVariable {
            file: file.to_string(),
            name: name.to_string(),
        }),
        None => Ok(()),
    }
}

fn compile_route(file: &SourceFile) -> Result<CompiledRoute, CompileError> {
    let id = file
        .path
        .strip_prefix(ROUTES_DIR)
        .and_then(|p| p.strip_prefix('/'))
        .unwrap_or(&file.path)
        .to_string();

    let pattern = route_pattern(&id)?;
    let (front, body_src, offset) = split_front_matter(&file.path, &file.contents)?;

    if let Some(status) = front.status {
        let valid = if front.redirect.is_some() {
            (300..=399).contains(&status)
        } else {
            (100..=599).contains(&status)
        };
        if !valid {
            return Err(CompileError::FrontMatter {
                file: file.path.clone(),
                message: format!("status {status} is not allowed here"),
            });
        }
    }
    if let Some(target) = &front.redirect {
        if target.is_empty() || axum::http::HeaderValue::from_str(target).is_err() {
            return Err(CompileError::FrontMatter {
                file: file.path.clone(),
                message: format!("redirect target '{target}' is not a valid header value"),
            });
        }
    }

    let body = parse_template(&file.path, body_src, offset)?;
    let route = CompiledRoute {
        id,
        pattern,
        title: front.title,
        status: front.status,
        redirect: front.redirect,
        body,
    };

    {
        let params: Vec<&str> = route.param_names().collect();
        check_variables(&file.path, &route.body, |name| {
            is_request_variable(name)
                || name.starts_with("query.")
                || name
                    .strip_prefix("params.")
                    .is_some_and(|p| params.contains(&p))
        })?;
    }
    Ok(route)
}

/// Patterns that match exactly the same paths share a shape.
fn match_shape(route: &CompiledRoute) -> Vec<&str> {
    route
        .pattern
        .iter()
        .map(|segment| match segment {
            PatternSegment::Static(s) => s.as_str(),
            PatternSegment::Param(_) => "$",
            PatternSegment::Splat => "*",
        })
        .collect()
}

/// Compile a source tree.
pub fn compile(tree: &SourceTree) -> Result<ServerBuild, CompileError> {
    let document_file = tree
        .get(DOCUMENT_FILE)
        .ok_or_else(|| CompileError::MissingDocument {
            path: tree.root().join(DOCUMENT_FILE).display().to_string(),
        })?;
    let document = parse_template(DOCUMENT_FILE, &document_file.contents, 0)?;
    check_variables(DOCUMENT_FILE, &document, |name| {
        name == "outlet" || is_request_variable(name) || name.starts_with("query.")
    })?;
    if !document.variables().any(|name| name == "outlet") {
        return Err(CompileError::MissingOutlet {
            file: DOCUMENT_FILE.to_string(),
        });
    }

    let route_prefix = format!("{ROUTES_DIR}/");
    let mut routes = tree
        .files()
        .iter()
        .filter(|f| f.path.starts_with(&route_prefix))
        .map(compile_route)
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen: HashMap<Vec<&str>, &CompiledRoute> = HashMap::new();
    for route in &routes {
        if let Some(first) = seen.insert(match_shape(route), route) {
            return Err(CompileError::DuplicateRoute {
                pattern: route.pattern_string(),
                first: first.id.clone(),
                second: route.id.clone(),
            });
        }
    }

    routes.sort_by(rank);

    Ok(ServerBuild {
        format_version: FORMAT_VERSION,
        document,
        routes,
    })
}

/// Compile `source` and write the bundle JSON to `out`.
pub fn build_bundle(source: &Path, out: &Path) -> Result<ServerBuild, CompileError> {
    let tree = SourceTree::read(source)?;
    let build = compile(&tree)?;
    let json = serde_json::to_vec_pretty(&build)?;

    let write_err = |source| CompileError::Write {
        path: out.display().to_string(),
        source,
    };
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let staging = out.with_extension("json.tmp");
    fs::write(&staging, json).map_err(write_err)?;
    fs::rename(&staging, out).map_err(write_err)?;
    Ok(build)
}
