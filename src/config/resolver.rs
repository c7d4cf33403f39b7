//! Configuration file resolution.
//!
//! Loads a primary INI file and merges every file matched by its
//! `DEFAULT.config_glob` option into one [`ConfigurationMap`].

use std::path::{Component, Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use super::map::DEFAULT_SECTION;
use super::parser::parse_ini;
use super::{ConfigResult, ConfigurationError, ConfigurationMap};

/// Reserved `DEFAULT` option naming extra files to merge.
pub const CONFIG_GLOB_OPTION: &str = "config_glob";

/// Builds a [`ConfigurationMap`] from a primary file and its glob-matched siblings.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    /// Files merged so far, in load order
    loaded: Vec<PathBuf>,
}

impl ConfigResolver {
    /// Create a new resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Files merged by the last resolution, in load order.
    pub fn loaded_files(&self) -> &[PathBuf] {
        &self.loaded
    }

    /// Resolve a single primary file.
    pub fn resolve(&mut self, primary: &Path) -> ConfigResult<ConfigurationMap> {
        self.resolve_all(std::slice::from_ref(&primary.to_path_buf()))
    }

    /// Resolve several primary files in order, each with its own glob expansion.
    ///
    /// Every primary file must exist; a glob matching nothing is not an error.
    pub fn resolve_all(&mut self, primaries: &[PathBuf]) -> ConfigResult<ConfigurationMap> {
        self.loaded.clear();
        let mut map = ConfigurationMap::new();

        for primary in primaries {
            let sections = parse_ini(primary)?;
            let pattern = sections
                .get(DEFAULT_SECTION)
                .and_then(|defaults| defaults.get(CONFIG_GLOB_OPTION))
                .cloned();
            map.merge(sections);
            self.loaded.push(primary.clone());

            let Some(pattern) = pattern else {
                continue;
            };
            for path in expand_glob(primary, &pattern)? {
                if is_same_file(&path, primary) {
                    continue;
                }
                tracing::debug!(file = %path.display(), "Merging sub-configuration");
                map.merge(parse_ini(&path)?);
                self.loaded.push(path);
            }
        }

        Ok(map)
    }
}

/// Resolve one file with a throwaway resolver.
pub fn resolve(primary: &Path) -> ConfigResult<ConfigurationMap> {
    ConfigResolver::new().resolve(primary)
}

/// List files matching `pattern`, sorted by name.
///
/// Relative patterns are anchored at the primary file's directory.
fn expand_glob(primary: &Path, pattern: &str) -> ConfigResult<Vec<PathBuf>> {
    let pattern_path = Path::new(pattern.trim());
    let base = if pattern_path.is_absolute() {
        PathBuf::new()
    } else {
        primary.parent().map(Path::to_path_buf).unwrap_or_default()
    };

    // Leading components without wildcards select the directory to walk
    let mut root = base;
    let mut wild: Vec<String> = Vec::new();
    for component in pattern_path.components() {
        let text = component.as_os_str().to_string_lossy();
        if wild.is_empty() && !has_wildcard(&text) {
            match component {
                Component::CurDir => {}
                _ => root.push(component),
            }
        } else {
            wild.push(text.into_owned());
        }
    }

    if wild.is_empty() {
        return Ok(if root.is_file() { vec![root] } else { Vec::new() });
    }

    let matcher = glob_regex(&wild.join("/")).map_err(|message| ConfigurationError::Glob {
        pattern: pattern.to_string(),
        message,
    })?;
    let walk_root = if root.as_os_str().is_empty() { PathBuf::from(".") } else { root };
    if !walk_root.is_dir() {
        return Ok(Vec::new());
    }

    let matches = WalkDir::new(&walk_root)
        .min_depth(wild.len())
        .max_depth(wild.len())
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .strip_prefix(&walk_root)
                .map(|relative| {
                    let relative: Vec<_> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    matcher.is_match(&relative.join("/"))
                })
                .unwrap_or(false)
        })
        .map(walkdir::DirEntry::into_path)
        .collect();

    Ok(matches)
}

fn has_wildcard(text: &str) -> bool {
    text.contains(['*', '?', '['])
}

/// Translate a shell glob into an anchored regex. Wildcards never cross `/`.
fn glob_regex(glob: &str) -> Result<Regex, String> {
    let mut expression = String::from("^");
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => expression.push_str("[^/]*"),
            '?' => expression.push_str("[^/]"),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                if chars.peek() == Some(&'!') {
                    chars.next();
                    class.push('^');
                }
                for next in chars.by_ref() {
                    if next == ']' {
                        closed = true;
                        break;
                    }
                    if next == '\\' || next == '^' {
                        class.push('\\');
                    }
                    class.push(next);
                }
                if !closed {
                    return Err("unterminated character class".to_string());
                }
                expression.push('[');
                expression.push_str(&class);
                expression.push(']');
            }
            other => expression.push_str(&regex::escape(&other.to_string())),
        }
    }
    expression.push('$');

    Regex::new(&expression).map_err(|e| e.to_string())
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
