//! INI parser.
//!
//! Reads `[SECTION]` / `key = value` files into ordered section maps.

use std::path::Path;

use indexmap::IndexMap;

use super::{ConfigResult, ConfigurationError};

/// Ordered options of one section.
pub type Options = IndexMap<String, String>;

/// Ordered sections of one file, `DEFAULT` included.
pub type Sections = IndexMap<String, Options>;

/// Parse an INI file from disk.
pub fn parse_ini(path: &Path) -> ConfigResult<Sections> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| ConfigurationError::Io { path: path.to_path_buf(), source })?;
    parse_ini_str(&content, path)
}

/// Parse INI text. `origin` is only used in error messages.
pub fn parse_ini_str(content: &str, origin: &Path) -> ConfigResult<Sections> {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;
    let mut last_option: Option<String> = None;

    for (index, raw) in content.lines().enumerate() {
        let line_number = index + 1;
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            last_option = None;
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        // Indented lines continue the previous value
        if raw.starts_with(char::is_whitespace) {
            if let (Some(section), Some(option)) = (&current, &last_option) {
                if let Some(value) =
                    sections.get_mut(section).and_then(|options| options.get_mut(option))
                {
                    if !value.is_empty() {
                        value.push('\n');
                    }
                    value.push_str(trimmed);
                    continue;
                }
            }
        }

        if let Some(name) = trimmed.strip_prefix('[') {
            let name = name.strip_suffix(']').ok_or_else(|| ConfigurationError::Parse {
                path: origin.to_path_buf(),
                line: line_number,
                message: format!("unterminated section header '{trimmed}'"),
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigurationError::Parse {
                    path: origin.to_path_buf(),
                    line: line_number,
                    message: "empty section name".to_string(),
                });
            }
            sections.entry(name.to_string()).or_default();
            current = Some(name.to_string());
            last_option = None;
            continue;
        }

        let Some(section) = current.as_ref() else {
            return Err(ConfigurationError::Parse {
                path: origin.to_path_buf(),
                line: line_number,
                message: format!("option outside of any section: '{trimmed}'"),
            });
        };

        let (key, value) = split_option(trimmed).ok_or_else(|| ConfigurationError::Parse {
            path: origin.to_path_buf(),
            line: line_number,
            message: format!("expected 'key = value', found '{trimmed}'"),
        })?;

        sections.entry(section.clone()).or_default().insert(key.to_string(), value.to_string());
        last_option = Some(key.to_string());
    }

    Ok(sections)
}

/// Split `key = value` or `key: value` on whichever delimiter comes first.
fn split_option(line: &str) -> Option<(&str, &str)> {
    let position = line.find(['=', ':'])?;
    let key = line[..position].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, line[position + 1..].trim()))
}
