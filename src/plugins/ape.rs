//! The root plugin: turns the `APE` section into an ordered run of plugins.

use std::time::Duration;

use crate::config::{ConfigResult, ConfigurationMap};
use crate::plugin::{HelpSections, Plugin, ProductContext, PLUGIN_OPTION};
use crate::runner::{BudgetPolicy, Hortator, Operation};

/// Section read by the root plugin.
pub const APE_SECTION: &str = "APE";

/// Relative time the whole run may take.
pub const TIME_LIMIT_OPTION: &str = "time_limit";

/// Absolute time by which the run should be over.
pub const END_TIME_OPTION: &str = "end_time";

const RESERVED_OPTIONS: [&str; 3] = [PLUGIN_OPTION, TIME_LIMIT_OPTION, END_TIME_OPTION];

const CONFIGURATION: &str = "[APE]
# the option names are just identifiers
# groups run top-down, plugins in a group left to right
<group_1> = <comma-separated list of plugins or sections>
<group_2> = <comma-separated list of plugins or sections>
# optional run budget (use one)
# time_limit = 1 hr 30 min
# end_time = 2024-06-01 08:00:00

# a section named in a group chooses its plugin
[<section_name>]
plugin = <plugin name>
";

const DESCRIPTION: &str = "{bold}ape{reset} is a plugin-based code runner. It reads one \
or more configuration files and looks for an [APE] section. Each option in that section is \
a list of plugins to execute in top-down, left-right order. An entry naming a section that \
has a {bold}plugin{reset} option builds that plugin from the section; any other entry is \
taken as a plugin name and built from the plugin's own section.

A failing operation is logged and the run moves on to the next one.";

const EXAMPLES: &str = "ape run ape.ini
ape run *.ini
ape check ape.ini
ape fetch Sleep
ape fetch --module parts Shell
ape list
ape help Sleep";

/// Root plugin producing a [`Hortator`] over the configured operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ape;

impl Ape {
    /// Build the flattened operation list of `section`.
    pub fn hortator(
        &self,
        context: &mut ProductContext<'_>,
        section: &str,
    ) -> anyhow::Result<Hortator> {
        let configuration = context.configuration();
        let policy = budget_policy(configuration, section)?;

        let mut operations = Vec::new();
        for group in configuration.local_options(section)? {
            if RESERVED_OPTIONS.contains(&group) {
                continue;
            }
            for entry in configuration.get_list(section, group)? {
                tracing::debug!(section, group, entry = %entry, "Adding operation");
                operations.push(build_entry(context, configuration, &entry)?);
            }
        }

        if operations.is_empty() {
            tracing::warn!(section, "No operations configured");
        }
        Ok(Hortator::new(section, operations, policy))
    }
}

impl Plugin for Ape {
    fn name(&self) -> &'static str {
        "Ape"
    }

    fn default_section(&self) -> &'static str {
        APE_SECTION
    }

    fn product(&self, context: &mut ProductContext<'_>) -> anyhow::Result<Box<dyn Operation>> {
        let section = context.section().to_string();
        Ok(Box::new(self.hortator(context, &section)?))
    }

    fn config(&self) -> String {
        CONFIGURATION.to_string()
    }

    fn sections(&self) -> HelpSections {
        vec![
            ("Name", "{blue}ape{reset} -- a plugin-based code runner".to_string()),
            (
                "Synopsis",
                "{bold}ape{reset} [--debug] [--silent] [--pudb] [--pdb] \
                 <run|fetch|list|check|help> ..."
                    .to_string(),
            ),
            ("Description", DESCRIPTION.to_string()),
            ("Configuration", CONFIGURATION.to_string()),
            ("Examples", EXAMPLES.to_string()),
        ]
    }
}

fn build_entry(
    context: &mut ProductContext<'_>,
    configuration: &ConfigurationMap,
    entry: &str,
) -> anyhow::Result<Box<dyn Operation>> {
    let plugin = configuration
        .has_section(entry)
        .then(|| configuration.get_optional(entry, PLUGIN_OPTION))
        .flatten();

    match plugin {
        Some(plugin) => context.build(plugin, Some(entry)),
        None => context.build(entry, None),
    }
}

/// Window policy from `time_limit`, deadline policy from `end_time`,
/// iteration policy otherwise.
fn budget_policy(configuration: &ConfigurationMap, section: &str) -> ConfigResult<BudgetPolicy> {
    if let Some(limit) = configuration.get_relativetime_optional(section, TIME_LIMIT_OPTION)? {
        return Ok(BudgetPolicy::Window(limit.to_std().unwrap_or(Duration::ZERO)));
    }
    if let Some(end) = configuration.get_datetime_optional(section, END_TIME_OPTION)? {
        return Ok(BudgetPolicy::Until(end));
    }
    Ok(BudgetPolicy::Iterations)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::{parse_ini_str, ConfigurationError};
    use crate::plugin::{PluginError, PluginRegistry};

    fn configuration(text: &str) -> ConfigurationMap {
        ConfigurationMap::from_sections(parse_ini_str(text, Path::new("ape.ini")).unwrap())
    }

    fn build(text: &str) -> anyhow::Result<Box<dyn Operation>> {
        let config = configuration(text);
        let mut registry = PluginRegistry::default();
        let mut context = ProductContext::new(&config, &mut registry);
        context.build("Ape", None)
    }

    #[test]
    fn test_groups_run_top_down_left_right() {
        let config = configuration(
            "[APE]
op_2 = Dummy, nap
op_1 = Dummy

[nap]
plugin = Sleep
total = 0 seconds
",
        );
        let mut registry = PluginRegistry::default();
        let mut context = ProductContext::new(&config, &mut registry);

        let hortator = Ape.hortator(&mut context, APE_SECTION).unwrap();
        assert_eq!(hortator.operation_names(), vec!["DUMMY", "nap", "DUMMY"]);
        assert_eq!(hortator.policy(), BudgetPolicy::Iterations);
        assert_eq!(hortator.name(), "APE");
    }

    #[test]
    fn test_time_limit_selects_window() {
        let config = configuration("[APE]\ntime_limit = 1 hr 30 min\nop = Dummy\n");
        assert_eq!(
            budget_policy(&config, APE_SECTION).unwrap(),
            BudgetPolicy::Window(Duration::from_secs(5400))
        );
    }

    #[test]
    fn test_end_time_selects_deadline() {
        let config = configuration("[APE]\nend_time = 2001-01-01 00:00:00\n");
        let end = crate::config::parse_datetime("2001-01-01 00:00:00").unwrap();
        assert_eq!(budget_policy(&config, APE_SECTION).unwrap(), BudgetPolicy::Until(end));
    }

    #[test]
    fn test_end_time_passing_before_the_call_runs_nothing() {
        let end = chrono::Local::now().naive_local() + chrono::TimeDelta::seconds(2);
        let config = configuration(&format!(
            "[APE]\nend_time = {}\nop = Dummy, Dummy, Dummy\n",
            end.format("%Y-%m-%d %H:%M:%S")
        ));
        let mut registry = PluginRegistry::default();
        let mut context = ProductContext::new(&config, &mut registry);
        let mut hortator = Ape.hortator(&mut context, APE_SECTION).unwrap();

        // The deadline counts from the call, not from the build
        std::thread::sleep(Duration::from_millis(2100));
        hortator.call().unwrap();

        let report = hortator.last_report().unwrap();
        assert_eq!(report.attempted, 0);
        assert!(report.stopped_early);
    }

    #[test]
    fn test_product_runs_operations() {
        let mut product = build("[APE]\nop_1 = Dummy, Dummy\nop_2 = Dummy\n").unwrap();
        product.call().unwrap();
    }

    #[test]
    fn test_reserved_options_are_not_groups() {
        // `plugin` would otherwise be read as a group holding the plugin "Ape"
        let product = build("[APE]\nplugin = Ape\ntime_limit = 1 day\nop = Dummy\n");
        assert!(product.is_ok());
    }

    #[test]
    fn test_unknown_entry_is_not_found() {
        let error = build("[APE]\nop = Dummy, Gorilla\n").unwrap_err();
        assert!(matches!(
            error.downcast_ref::<PluginError>(),
            Some(PluginError::NotFound(name)) if name == "Gorilla"
        ));
    }

    #[test]
    fn test_missing_section() {
        let error = build("[OTHER]\nop = Dummy\n").unwrap_err();
        assert!(matches!(
            error.downcast_ref::<ConfigurationError>(),
            Some(ConfigurationError::MissingSection(section)) if section == "APE"
        ));
    }

    #[test]
    fn test_nested_ape_section() {
        let mut product = build(
            "[APE]
op = inner, Dummy

[inner]
plugin = Ape
op = Dummy
",
        )
        .unwrap();
        product.call().unwrap();
    }

    #[test]
    fn test_help_and_config() {
        assert!(Ape.config().starts_with("[APE]"));
        let help = Ape.help(100);
        assert!(help.contains("SYNOPSIS"));
        assert!(help.contains("plugin-based code runner"));
    }
}
