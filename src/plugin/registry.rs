//! Plugin registry.
//!
//! Plugins are published through [`PluginModule`]s: static, enumerable
//! lists of named constructors. The registry scans its modules once, caches
//! the resulting name → constructor map and serves lookups from the cache
//! until [`PluginRegistry::refresh`] is called.

use std::sync::Arc;

use indexmap::IndexMap;

use super::{Plugin, PluginError, PluginResult};

/// Builds a fresh plugin instance.
pub type PluginConstructor = fn() -> Box<dyn Plugin>;

/// Transforms declared plugin names into lookup keys.
pub type KeyFunction = fn(&str) -> String;

/// Default lookup key: the ASCII-lowercased name.
pub fn lowercase_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Files skipped during discovery unless configured otherwise.
pub const DEFAULT_EXCLUSIONS: &[&str] = &["index", "__init__"];

/// One plugin published by a module.
#[derive(Debug, Clone, Copy)]
pub struct PluginExport {
    /// Source file (within the module) the plugin lives in
    pub file: &'static str,
    /// Declared plugin name
    pub name: &'static str,
    /// Constructor
    pub constructor: PluginConstructor,
}

/// A named collection of plugin exports.
#[derive(Debug, Clone)]
pub struct PluginModule {
    name: String,
    exports: Vec<PluginExport>,
}

impl PluginModule {
    /// Create an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), exports: Vec::new() }
    }

    /// Publish a plugin.
    pub fn export(
        mut self,
        file: &'static str,
        name: &'static str,
        constructor: PluginConstructor,
    ) -> Self {
        self.exports.push(PluginExport { file, name, constructor });
        self
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Published plugins, in registration order.
    pub fn exports(&self) -> &[PluginExport] {
        &self.exports
    }
}

/// A discovered plugin.
#[derive(Debug)]
pub struct PluginEntry {
    name: String,
    module: String,
    constructor: PluginConstructor,
}

impl PluginEntry {
    /// Declared plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module the plugin was discovered in.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Build a fresh plugin instance.
    pub fn construct(&self) -> Box<dyn Plugin> {
        (self.constructor)()
    }
}

/// Discovered plugins keyed by lookup key, in discovery order.
pub type PluginMap = IndexMap<String, Arc<PluginEntry>>;

/// Name → constructor registry with an explicit cache lifecycle.
///
/// Built-in modules are always scanned. Catalog modules are only scanned
/// once requested through [`PluginRegistry::set_external_modules`].
pub struct PluginRegistry {
    modules: Vec<PluginModule>,
    catalog: Vec<PluginModule>,
    external: Vec<String>,
    exclusions: Vec<String>,
    key_function: Option<KeyFunction>,
    cache: Option<PluginMap>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("modules", &self.modules.iter().map(PluginModule::name).collect::<Vec<_>>())
            .field("external", &self.external)
            .field("scanned", &self.is_scanned())
            .finish_non_exhaustive()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new(vec![crate::plugins::builtin_module()])
            .with_catalog(crate::plugins::catalog_modules())
    }
}

impl PluginRegistry {
    /// Create a registry over built-in modules, keyed by lower-cased name.
    pub fn new(modules: Vec<PluginModule>) -> Self {
        Self {
            modules,
            catalog: Vec::new(),
            external: Vec::new(),
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| (*s).to_string()).collect(),
            key_function: Some(lowercase_key),
            cache: None,
        }
    }

    /// Modules that may be requested by name.
    pub fn with_catalog(mut self, catalog: Vec<PluginModule>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Files to skip during discovery.
    pub fn with_exclusions(mut self, exclusions: Vec<String>) -> Self {
        self.exclusions = exclusions;
        self.cache = None;
        self
    }

    /// Key transform; `None` keeps declared names as-is.
    pub fn with_key_function(mut self, key_function: Option<KeyFunction>) -> Self {
        self.key_function = key_function;
        self.cache = None;
        self
    }

    /// Names of catalog modules available for [`Self::set_external_modules`].
    pub fn catalog_names(&self) -> Vec<&str> {
        self.catalog.iter().map(PluginModule::name).collect()
    }

    /// Request additional catalog modules. Invalidates the cache when the
    /// request changes.
    pub fn set_external_modules(&mut self, names: Vec<String>) {
        if names != self.external {
            self.external = names;
            self.cache = None;
        }
    }

    /// Whether the cache is populated.
    pub fn is_scanned(&self) -> bool {
        self.cache.is_some()
    }

    /// Drop the cache; the next lookup scans again.
    pub fn refresh(&mut self) {
        self.cache = None;
    }

    /// Scan every module and build a fresh map, ignoring the cache.
    ///
    /// Later exports replace earlier ones with the same key.
    pub fn discover(&self) -> PluginResult<PluginMap> {
        let mut sources: Vec<&PluginModule> = self.modules.iter().collect();
        for name in &self.external {
            let module = self
                .catalog
                .iter()
                .find(|module| module.name == *name)
                .ok_or_else(|| PluginError::UnknownModule(name.clone()))?;
            sources.push(module);
        }

        let mut plugins = PluginMap::new();
        for module in sources {
            for export in &module.exports {
                if self.exclusions.iter().any(|excluded| excluded == export.file) {
                    continue;
                }
                let key = self.key(export.name);
                let entry = Arc::new(PluginEntry {
                    name: export.name.to_string(),
                    module: module.name.clone(),
                    constructor: export.constructor,
                });
                if let Some(previous) = plugins.insert(key.clone(), entry) {
                    tracing::debug!(
                        plugin = %key,
                        replaced = previous.module(),
                        by = %module.name,
                        "Plugin name collision, keeping the later one"
                    );
                }
            }
        }

        tracing::debug!(count = plugins.len(), "Discovered plugins");
        Ok(plugins)
    }

    /// Look up a plugin by name.
    ///
    /// The same `Arc` is returned for every lookup between two refreshes.
    pub fn get_plugin(&mut self, name: &str) -> PluginResult<Arc<PluginEntry>> {
        let key = self.key(name);
        self.plugins()?.get(&key).cloned().ok_or_else(|| PluginError::NotFound(name.to_string()))
    }

    /// Whether a plugin is known under this name.
    pub fn contains(&mut self, name: &str) -> PluginResult<bool> {
        let key = self.key(name);
        Ok(self.plugins()?.contains_key(&key))
    }

    /// All known plugins, sorted by name.
    pub fn list_plugins(&mut self) -> PluginResult<Vec<Arc<PluginEntry>>> {
        let mut entries: Vec<_> = self.plugins()?.values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn plugins(&mut self) -> PluginResult<&PluginMap> {
        if self.cache.is_none() {
            self.cache = Some(self.discover()?);
        }
        let plugins: &PluginMap = self.cache.get_or_insert_with(PluginMap::new);
        Ok(plugins)
    }

    fn key(&self, name: &str) -> String {
        self.key_function.map_or_else(|| name.to_string(), |key_function| key_function(name))
    }
}
