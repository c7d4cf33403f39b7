//! The resolved, typed configuration store.

use std::collections::HashMap;

use chrono::{NaiveDateTime, TimeDelta};

use super::parser::{Options, Sections};
use super::time::{parse_datetime, parse_relative_time};
use super::{ConfigResult, ConfigurationError};

/// Name of the section whose options every other section inherits.
pub const DEFAULT_SECTION: &str = "DEFAULT";

/// Comma-separated `key:value` pairs exposed by field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedFields {
    fields: Vec<(String, String)>,
}

impl NamedFields {
    /// Value of a field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.iter().find(|(name, _)| name == field).map(|(_, value)| value.as_str())
    }

    /// Field names in source order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Typed key/value store built from one or more merged INI files.
///
/// Immutable once built. Options of the `DEFAULT` section are visible from
/// every other section unless the section sets them itself.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationMap {
    sections: Sections,
}

impl ConfigurationMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from already-parsed sections (a single source, no merging).
    pub fn from_sections(sections: Sections) -> Self {
        let mut map = Self::new();
        map.merge(sections);
        map
    }

    /// Merge a later-loaded source into this one.
    ///
    /// Later values win, except in `DEFAULT` where the first value is kept.
    pub(crate) fn merge(&mut self, sections: Sections) {
        for (name, options) in sections {
            let target = self.sections.entry(name.clone()).or_default();
            for (option, value) in options {
                if name == DEFAULT_SECTION {
                    target.entry(option).or_insert(value);
                } else {
                    target.insert(option, value);
                }
            }
        }
    }

    /// Section names in load order (`DEFAULT` excluded).
    pub fn sections(&self) -> Vec<&str> {
        self.sections.keys().map(String::as_str).filter(|name| *name != DEFAULT_SECTION).collect()
    }

    /// Whether a section exists.
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Option names visible from a section, inherited `DEFAULT` options included.
    pub fn options(&self, section: &str) -> ConfigResult<Vec<&str>> {
        let local = self.section(section)?;
        let mut names: Vec<&str> = local.keys().map(String::as_str).collect();
        if section != DEFAULT_SECTION {
            if let Some(defaults) = self.sections.get(DEFAULT_SECTION) {
                names.extend(
                    defaults.keys().map(String::as_str).filter(|name| !local.contains_key(*name)),
                );
            }
        }
        Ok(names)
    }

    /// Option names set in the section itself, in file order.
    pub fn local_options(&self, section: &str) -> ConfigResult<Vec<&str>> {
        Ok(self.section(section)?.keys().map(String::as_str).collect())
    }

    /// Whether an option is visible from a section.
    pub fn has_option(&self, section: &str, option: &str) -> bool {
        self.lookup(section, option).is_some()
    }

    /// Required raw value.
    pub fn get(&self, section: &str, option: &str) -> ConfigResult<&str> {
        if !self.sections.contains_key(section) {
            return Err(ConfigurationError::MissingSection(section.to_string()));
        }
        self.lookup(section, option).ok_or_else(|| ConfigurationError::MissingOption {
            section: section.to_string(),
            option: option.to_string(),
        })
    }

    /// Optional raw value; `None` when the section or option is absent.
    pub fn get_optional(&self, section: &str, option: &str) -> Option<&str> {
        self.lookup(section, option)
    }

    /// Optional raw value with a fallback.
    pub fn get_or<'a>(&'a self, section: &str, option: &str, default: &'a str) -> &'a str {
        self.lookup(section, option).unwrap_or(default)
    }

    /// Required integer.
    pub fn get_int(&self, section: &str, option: &str) -> ConfigResult<i64> {
        let value = self.get(section, option)?;
        coerce_int(section, option, value)
    }

    /// Optional integer; a present but malformed value is still an error.
    pub fn get_int_optional(&self, section: &str, option: &str) -> ConfigResult<Option<i64>> {
        self.lookup(section, option).map(|value| coerce_int(section, option, value)).transpose()
    }

    /// Required float.
    pub fn get_float(&self, section: &str, option: &str) -> ConfigResult<f64> {
        let value = self.get(section, option)?;
        coerce_float(section, option, value)
    }

    /// Optional float.
    pub fn get_float_optional(&self, section: &str, option: &str) -> ConfigResult<Option<f64>> {
        self.lookup(section, option).map(|value| coerce_float(section, option, value)).transpose()
    }

    /// Required boolean (`1/yes/true/on`, `0/no/false/off`, any case).
    pub fn get_boolean(&self, section: &str, option: &str) -> ConfigResult<bool> {
        let value = self.get(section, option)?;
        coerce_boolean(section, option, value)
    }

    /// Optional boolean.
    pub fn get_boolean_optional(&self, section: &str, option: &str) -> ConfigResult<Option<bool>> {
        self.lookup(section, option).map(|value| coerce_boolean(section, option, value)).transpose()
    }

    /// Comma-separated list, trimmed, in source order.
    pub fn get_list(&self, section: &str, option: &str) -> ConfigResult<Vec<String>> {
        Ok(split_list(self.get(section, option)?))
    }

    /// Optional comma-separated list.
    pub fn get_list_optional(&self, section: &str, option: &str) -> Option<Vec<String>> {
        self.lookup(section, option).map(split_list)
    }

    /// Comma-separated values as a fixed-size sequence.
    pub fn get_tuple(&self, section: &str, option: &str) -> ConfigResult<Box<[String]>> {
        Ok(self.get_list(section, option)?.into_boxed_slice())
    }

    /// Comma-separated `key:value` pairs as an unordered map.
    pub fn get_dictionary(
        &self,
        section: &str,
        option: &str,
    ) -> ConfigResult<HashMap<String, String>> {
        Ok(self.get_ordered_dictionary(section, option)?.into_iter().collect())
    }

    /// Comma-separated `key:value` pairs in source order.
    pub fn get_ordered_dictionary(
        &self,
        section: &str,
        option: &str,
    ) -> ConfigResult<Vec<(String, String)>> {
        let value = self.get(section, option)?;
        split_pairs(value)
            .ok_or_else(|| ConfigurationError::invalid(section, option, value, "key:value pairs"))
    }

    /// Comma-separated `key:value` pairs exposed as named fields.
    pub fn get_named_tuple(&self, section: &str, option: &str) -> ConfigResult<NamedFields> {
        Ok(NamedFields { fields: self.get_ordered_dictionary(section, option)? })
    }

    /// Required relative time (e.g. `1 hr 30 min`).
    pub fn get_relativetime(&self, section: &str, option: &str) -> ConfigResult<TimeDelta> {
        let value = self.get(section, option)?;
        coerce_relativetime(section, option, value)
    }

    /// Optional relative time.
    pub fn get_relativetime_optional(
        &self,
        section: &str,
        option: &str,
    ) -> ConfigResult<Option<TimeDelta>> {
        self.lookup(section, option)
            .map(|value| coerce_relativetime(section, option, value))
            .transpose()
    }

    /// Required absolute timestamp (e.g. `2024-06-01 08:00:00`).
    pub fn get_datetime(&self, section: &str, option: &str) -> ConfigResult<NaiveDateTime> {
        let value = self.get(section, option)?;
        coerce_datetime(section, option, value)
    }

    /// Optional absolute timestamp.
    pub fn get_datetime_optional(
        &self,
        section: &str,
        option: &str,
    ) -> ConfigResult<Option<NaiveDateTime>> {
        self.lookup(section, option).map(|value| coerce_datetime(section, option, value)).transpose()
    }

    fn section(&self, section: &str) -> ConfigResult<&Options> {
        self.sections
            .get(section)
            .ok_or_else(|| ConfigurationError::MissingSection(section.to_string()))
    }

    fn lookup(&self, section: &str, option: &str) -> Option<&str> {
        let local = self.sections.get(section)?;
        local
            .get(option)
            .or_else(|| self.sections.get(DEFAULT_SECTION).and_then(|defaults| defaults.get(option)))
            .map(String::as_str)
    }
}

fn coerce_int(section: &str, option: &str, value: &str) -> ConfigResult<i64> {
    value.trim().parse().map_err(|_| ConfigurationError::invalid(section, option, value, "an integer"))
}

fn coerce_float(section: &str, option: &str, value: &str) -> ConfigResult<f64> {
    value.trim().parse().map_err(|_| ConfigurationError::invalid(section, option, value, "a number"))
}

fn coerce_boolean(section: &str, option: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        _ => Err(ConfigurationError::invalid(section, option, value, "a boolean")),
    }
}

fn coerce_relativetime(section: &str, option: &str, value: &str) -> ConfigResult<TimeDelta> {
    parse_relative_time(value)
        .ok_or_else(|| ConfigurationError::invalid(section, option, value, "'<amount> <unit>' pairs"))
}

fn coerce_datetime(section: &str, option: &str, value: &str) -> ConfigResult<NaiveDateTime> {
    parse_datetime(value)
        .ok_or_else(|| ConfigurationError::invalid(section, option, value, "'YYYY-MM-DD HH:MM:SS'"))
}

fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty()).map(String::from).collect()
}

fn split_pairs(value: &str) -> Option<Vec<(String, String)>> {
    split_list(value)
        .iter()
        .map(|pair| {
            let (key, value) = pair.split_once(':')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
