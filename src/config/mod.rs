//! Layered INI configuration.
//!
//! A primary file plus every file matched by its `DEFAULT.config_glob`
//! option are merged into one [`ConfigurationMap`] that offers strict and
//! optional lookups with type coercion (numbers, booleans, lists, maps,
//! relative durations and absolute timestamps).

mod error;
mod map;
mod parser;
mod resolver;
mod time;

pub use error::{ConfigResult, ConfigurationError};
pub use map::{ConfigurationMap, NamedFields, DEFAULT_SECTION};
pub use parser::{parse_ini, parse_ini_str, Options, Sections};
pub use resolver::{resolve, ConfigResolver, CONFIG_GLOB_OPTION};
pub use time::{parse_datetime, parse_relative_time};
