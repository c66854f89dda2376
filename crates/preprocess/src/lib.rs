//! Text-level preprocessing applied to fragment shaders before compilation.
//!
//! Two transforms are supported, both optional:
//!
//! - `#include` resolution. A line whose first non-blank text is `#include` is
//!   replaced by the referenced file. Line breaks inside the spliced file become
//!   `;` so the splice occupies exactly one line of the including source; the
//!   include line keeps its own terminator.
//! - Uniform injection. [`STANDARD_UNIFORMS`] is prepended once. Sources that
//!   already start with the block are left alone, so running the transform on
//!   its own output is a no-op.
//!
//! A missing or unreadable include target is a hard failure
//! ([`PreprocessError::Include`]); nothing is passed through to the shader
//! compiler unresolved.

mod uniforms;

pub use uniforms::{CHANNEL_COUNT, STANDARD_UNIFORMS, STANDARD_UNIFORM_NAMES};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Directive recognised at the start of a line.
pub const INCLUDE_DIRECTIVE: &str = "#include";

/// Nesting limit for includes that themselves include files.
pub const DEFAULT_MAX_DEPTH: usize = 16;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("failed to read shader source at {path}")]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read include '{target}' (resolved to {path})")]
    Include {
        target: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("include directive on line {line} names no file: {text}")]
    MalformedInclude { line: usize, text: String },

    #[error("include cycle detected at {0}")]
    IncludeCycle(PathBuf),

    #[error("includes nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Configurable preprocessing pass.
///
/// `include_root` is the directory relative include targets resolve against;
/// nested includes resolve against the directory of the file that contains
/// them.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    allow_includes: bool,
    add_uniforms: bool,
    include_root: PathBuf,
    max_depth: usize,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self {
            allow_includes: false,
            add_uniforms: false,
            include_root: PathBuf::from("."),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_includes(mut self, allow: bool) -> Self {
        self.allow_includes = allow;
        self
    }

    pub fn add_uniforms(mut self, add: bool) -> Self {
        self.add_uniforms = add;
        self
    }

    pub fn include_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.include_root = root.into();
        self
    }

    /// Deepest include nesting accepted. The root source is level zero, so
    /// `max_depth(0)` rejects every include.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Preprocesses in-memory source text.
    pub fn run(&self, source: &str) -> Result<String, PreprocessError> {
        let body = if self.allow_includes {
            let mut stack = Vec::new();
            self.expand(source, &self.include_root, &mut stack, 0)?
        } else {
            source.to_string()
        };
        Ok(self.with_uniforms(body))
    }

    /// Reads and preprocesses a shader file. Includes resolve against the
    /// file's directory regardless of `include_root`.
    pub fn run_file(&self, path: &Path) -> Result<String, PreprocessError> {
        let source = fs::read_to_string(path).map_err(|source| PreprocessError::Source {
            path: path.to_path_buf(),
            source,
        })?;
        let body = if self.allow_includes {
            let canonical = fs::canonicalize(path).map_err(|source| PreprocessError::Source {
                path: path.to_path_buf(),
                source,
            })?;
            let root = canonical
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.include_root.clone());
            let mut stack = vec![canonical];
            self.expand(&source, &root, &mut stack, 0)?
        } else {
            source
        };
        Ok(self.with_uniforms(body))
    }

    fn with_uniforms(&self, body: String) -> String {
        if !self.add_uniforms || body.starts_with(STANDARD_UNIFORMS) {
            return body;
        }
        let mut output = String::with_capacity(STANDARD_UNIFORMS.len() + body.len());
        output.push_str(STANDARD_UNIFORMS);
        output.push_str(&body);
        output
    }

    fn expand(
        &self,
        source: &str,
        directory: &Path,
        stack: &mut Vec<PathBuf>,
        depth: usize,
    ) -> Result<String, PreprocessError> {
        let mut output = String::with_capacity(source.len());
        for (index, line) in source.split_inclusive('\n').enumerate() {
            let (text, terminator) = split_terminator(line);
            let Some(target) = include_target(text) else {
                output.push_str(line);
                continue;
            };
            if target.is_empty() {
                return Err(PreprocessError::MalformedInclude {
                    line: index + 1,
                    text: text.trim().to_string(),
                });
            }
            let spliced = self.splice(&target, directory, stack, depth)?;
            output.push_str(&spliced);
            output.push_str(terminator);
        }
        Ok(output)
    }

    fn splice(
        &self,
        target: &str,
        directory: &Path,
        stack: &mut Vec<PathBuf>,
        depth: usize,
    ) -> Result<String, PreprocessError> {
        if depth >= self.max_depth {
            return Err(PreprocessError::TooDeep(self.max_depth));
        }

        let path = directory.join(target);
        let include_error = |source| PreprocessError::Include {
            target: target.to_string(),
            path: path.clone(),
            source,
        };
        let canonical = fs::canonicalize(&path).map_err(include_error)?;
        if stack.contains(&canonical) {
            return Err(PreprocessError::IncludeCycle(canonical));
        }
        let text = fs::read_to_string(&canonical).map_err(include_error)?;

        let parent = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| directory.to_path_buf());
        stack.push(canonical);
        let expanded = self.expand(&text, &parent, stack, depth + 1);
        let canonical = stack.pop();
        let expanded = expanded?;

        if let Some(canonical) = canonical {
            tracing::trace!(include = %canonical.display(), "spliced include");
        }
        Ok(flatten_lines(&expanded))
    }
}

/// Preprocesses `source`, resolving includes against the current directory.
pub fn preprocess(
    source: &str,
    allow_includes: bool,
    add_uniforms: bool,
) -> Result<String, PreprocessError> {
    Preprocessor::new()
        .allow_includes(allow_includes)
        .add_uniforms(add_uniforms)
        .run(source)
}

/// Reads and preprocesses the shader at `path`, resolving includes against
/// the file's directory.
pub fn preprocess_file(
    path: &Path,
    allow_includes: bool,
    add_uniforms: bool,
) -> Result<String, PreprocessError> {
    Preprocessor::new()
        .allow_includes(allow_includes)
        .add_uniforms(add_uniforms)
        .run_file(path)
}

fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(text) = line.strip_suffix("\r\n") {
        (text, "\r\n")
    } else if let Some(text) = line.strip_suffix('\n') {
        (text, "\n")
    } else {
        (line, "")
    }
}

/// Returns the cleaned include target when `line` is an include directive.
fn include_target(line: &str) -> Option<String> {
    let rest = line.trim_start().strip_prefix(INCLUDE_DIRECTIVE)?;
    Some(
        rest.chars()
            .filter(|ch| !ch.is_whitespace() && !matches!(ch, '"' | '<' | '>'))
            .collect(),
    )
}

fn flatten_lines(text: &str) -> String {
    text.trim_end_matches(['\r', '\n'])
        .replace("\r\n", ";")
        .replace('\n', ";")
}
