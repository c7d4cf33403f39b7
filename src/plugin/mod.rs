//! Plugin system for ape.
//!
//! A plugin is a named factory: given the resolved configuration and the
//! section it should read, it builds an [`Operation`]. Plugins are found by
//! name through the [`PluginRegistry`].
//!
//! # Example Configuration
//!
//! ```ini
//! [APE]
//! op_1 = Dummy, naptime
//!
//! [naptime]
//! plugin = Sleep
//! total = 1 Second
//! ```

mod error;
mod help;
mod registry;

use std::io::IsTerminal;

pub use error::{PluginError, PluginResult};
pub use help::{terminal_width, HelpPage, HelpSections};
pub use registry::{
    lowercase_key, KeyFunction, PluginConstructor, PluginEntry, PluginExport, PluginMap,
    PluginModule, PluginRegistry, DEFAULT_EXCLUSIONS,
};

use crate::config::{ConfigurationError, ConfigurationMap};
use crate::runner::Operation;

/// Option naming the plugin that reads a section.
pub const PLUGIN_OPTION: &str = "plugin";

/// A named producer of operations.
pub trait Plugin {
    /// Declared plugin name.
    fn name(&self) -> &'static str;

    /// Section read when none is given.
    fn default_section(&self) -> &'static str;

    /// Build an operation from `context.section()` of the configuration.
    fn product(&self, context: &mut ProductContext<'_>) -> anyhow::Result<Box<dyn Operation>>;

    /// Sample configuration text.
    fn config(&self) -> String {
        format!("[{}]\n{} = {}\n", self.default_section(), PLUGIN_OPTION, self.name())
    }

    /// Print the sample configuration to stdout.
    fn fetch_config(&self) {
        println!("{}", self.config());
    }

    /// Ordered help sections.
    fn sections(&self) -> HelpSections {
        vec![("Name", self.name().to_string()), ("Configuration", self.config())]
    }

    /// Help page wrapped to `width` columns, styled when stdout is a terminal.
    fn help(&self, width: usize) -> String {
        HelpPage::new(self.sections()).styled(std::io::stdout().is_terminal()).render(width)
    }
}

impl std::fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin").field("name", &self.name()).finish()
    }
}

/// Everything a plugin needs while building its product.
#[derive(Debug)]
pub struct ProductContext<'a> {
    configuration: &'a ConfigurationMap,
    registry: &'a mut PluginRegistry,
    section: String,
    stack: Vec<String>,
}

impl<'a> ProductContext<'a> {
    /// Create a context positioned at no section.
    pub fn new(configuration: &'a ConfigurationMap, registry: &'a mut PluginRegistry) -> Self {
        Self { configuration, registry, section: String::new(), stack: Vec::new() }
    }

    /// The resolved configuration.
    pub fn configuration(&self) -> &'a ConfigurationMap {
        self.configuration
    }

    /// The section the plugin being built should read.
    pub fn section(&self) -> &str {
        &self.section
    }

    /// The plugin registry.
    pub fn registry(&mut self) -> &mut PluginRegistry {
        self.registry
    }

    /// Look up `plugin` and build it against `section` (or its default
    /// section).
    ///
    /// Fails with [`ConfigurationError::Cycle`] when the section is already
    /// being built further up.
    pub fn build(
        &mut self,
        plugin: &str,
        section: Option<&str>,
    ) -> anyhow::Result<Box<dyn Operation>> {
        let entry = self.registry.get_plugin(plugin)?;
        let instance = entry.construct();
        let section = section.unwrap_or_else(|| instance.default_section()).to_string();

        if self.stack.contains(&section) {
            return Err(ConfigurationError::Cycle { section }.into());
        }

        tracing::debug!(plugin = instance.name(), section = %section, "Building product");
        self.stack.push(section.clone());
        let previous = std::mem::replace(&mut self.section, section);
        let product = instance.product(self);
        self.section = previous;
        self.stack.pop();

        product
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_ini_str, ConfigurationMap};
    use std::path::Path;

    fn configuration(text: &str) -> ConfigurationMap {
        ConfigurationMap::from_sections(parse_ini_str(text, Path::new("test.ini")).unwrap())
    }

    #[test]
    fn test_build_uses_default_section() {
        let config = configuration("[SLEEP]\ntotal = 1 second\n");
        let mut registry = PluginRegistry::default();
        let mut context = ProductContext::new(&config, &mut registry);

        let operation = context.build("sleep", None).unwrap();
        assert_eq!(operation.name(), "SLEEP");
        assert_eq!(context.section(), "");
    }

    #[test]
    fn test_build_unknown_plugin() {
        let config = ConfigurationMap::new();
        let mut registry = PluginRegistry::default();
        let mut context = ProductContext::new(&config, &mut registry);

        let error = context.build("nonexistent", None).unwrap_err();
        assert!(matches!(error.downcast_ref::<PluginError>(), Some(PluginError::NotFound(_))));
    }

    #[test]
    fn test_build_detects_cycles() {
        let config = configuration("[APE]\nop = loop\n\n[loop]\nplugin = Ape\nop = loop\n");
        let mut registry = PluginRegistry::default();
        let mut context = ProductContext::new(&config, &mut registry);

        let error = context.build("Ape", None).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<ConfigurationError>(),
            Some(ConfigurationError::Cycle { section }) if section == "loop"
        ));
    }

    #[test]
    fn test_default_help_mentions_name() {
        struct Bare;
        impl Plugin for Bare {
            fn name(&self) -> &'static str {
                "Bare"
            }
            fn default_section(&self) -> &'static str {
                "BARE"
            }
            fn product(&self, _: &mut ProductContext<'_>) -> anyhow::Result<Box<dyn Operation>> {
                anyhow::bail!("not buildable")
            }
        }

        assert_eq!(Bare.config(), "[BARE]\nplugin = Bare\n");
        let help = Bare.help(80);
        assert!(help.contains("NAME"));
        assert!(help.contains("Bare"));
    }
}
