//! ape - a plugin-based automation runner.
//!
//! Reads INI configuration files, builds the operations named in their
//! `[APE]` section and runs them one after another.

#![allow(clippy::single_match_else)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ape::config::{ConfigResolver, ConfigurationError, ConfigurationMap, DEFAULT_SECTION};
use ape::plugin::{terminal_width, PluginError, PluginRegistry, ProductContext};
use ape::plugins::MODULES_OPTION;

/// Plugin built by `run` and `check`, and the default for `fetch` and `help`.
const ROOT_PLUGIN: &str = "Ape";

/// Configuration file used when none is given.
const DEFAULT_CONFIG: &str = "ape.ini";

const CRASH_BANNER: &str = "***** Program Crash *****";

/// A plugin-based automation runner
#[derive(Parser)]
#[command(name = "ape")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Show debug messages
    #[arg(long, global = true)]
    debug: bool,

    /// Turn off logging
    #[arg(long, global = true, conflicts_with = "debug")]
    silent: bool,

    /// Post-mortem mode: print the full backtrace of a crash
    #[arg(long, global = true)]
    pudb: bool,

    /// Post-mortem mode: print the full backtrace of a crash
    #[arg(long, global = true)]
    pdb: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the operations configured in the given files
    Run {
        /// Configuration files
        #[arg(default_value = DEFAULT_CONFIG)]
        configfiles: Vec<PathBuf>,
    },

    /// Print sample configurations
    Fetch {
        /// Plugin names
        #[arg(default_value = ROOT_PLUGIN)]
        names: Vec<String>,

        /// Extra plugin modules to search
        #[arg(short, long)]
        module: Vec<String>,
    },

    /// List the known plugins
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check the configuration without running anything
    Check {
        /// Configuration files
        #[arg(default_value = DEFAULT_CONFIG)]
        configfiles: Vec<PathBuf>,
    },

    /// Show a plugin's help page
    Help {
        /// Plugin name
        #[arg(default_value = ROOT_PLUGIN)]
        name: String,
    },
}

fn main() -> ExitCode {
    // Capture backtraces on errors so crashes can be located
    if std::env::var_os("RUST_LIB_BACKTRACE").is_none() {
        std::env::set_var("RUST_LIB_BACKTRACE", "1");
    }

    let cli = Cli::parse();
    init_logging(&cli);

    let result = match cli.command {
        Commands::Run { configfiles } => cmd_run(&configfiles).map(|()| ExitCode::SUCCESS),
        Commands::Fetch { names, module } => {
            cmd_fetch(&names, module).map(|()| ExitCode::SUCCESS)
        }
        Commands::List { format } => cmd_list(&format).map(|()| ExitCode::SUCCESS),
        Commands::Check { configfiles } => cmd_check(&configfiles),
        Commands::Help { name } => cmd_help(&name).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            report_crash(&error, cli.pudb || cli.pdb);
            ExitCode::FAILURE
        }
    }
}

/// `--silent` and `--debug` win over `RUST_LOG`, which wins over `info`.
fn init_logging(cli: &Cli) {
    let filter = if cli.silent {
        EnvFilter::new("off")
    } else if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Resolve and run the configured operations.
fn cmd_run(configfiles: &[PathBuf]) -> Result<()> {
    let configuration = load_configuration(configfiles)?;
    let mut registry = registry_for(&configuration);
    let mut context = ProductContext::new(&configuration, &mut registry);

    let mut operation = context.build(ROOT_PLUGIN, None)?;
    operation.call()?;
    Ok(())
}

/// Print sample configurations.
fn cmd_fetch(names: &[String], modules: Vec<String>) -> Result<()> {
    let mut registry = PluginRegistry::default();
    registry.set_external_modules(modules);

    for name in names {
        match registry.get_plugin(name) {
            Ok(entry) => entry.construct().fetch_config(),
            Err(error @ PluginError::NotFound(_)) => tracing::error!("{error}"),
            Err(error) => return Err(error.into()),
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PluginSummary<'a> {
    name: &'a str,
    module: &'a str,
}

/// List the plugins that are always available.
fn cmd_list(format: &str) -> Result<()> {
    let mut registry = PluginRegistry::default();
    let entries = registry.list_plugins()?;

    match format {
        "json" => {
            let summaries: Vec<_> = entries
                .iter()
                .map(|entry| PluginSummary { name: entry.name(), module: entry.module() })
                .collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        _ => {
            for entry in &entries {
                println!("{}", entry.name());
            }
            let catalog = registry.catalog_names();
            if !catalog.is_empty() {
                println!("\nMore with --module: {}", catalog.join(", "));
            }
        }
    }

    Ok(())
}

/// Resolve and build without running. Configuration problems are reported
/// and turned into a failing exit status.
fn cmd_check(configfiles: &[PathBuf]) -> Result<ExitCode> {
    match check(configfiles) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(error) if is_configuration_problem(&error) => {
            tracing::error!("{error:#}");
            Ok(ExitCode::FAILURE)
        }
        Err(error) => Err(error),
    }
}

fn check(configfiles: &[PathBuf]) -> Result<()> {
    let configuration = load_configuration(configfiles)?;

    for section in configuration.sections() {
        println!("[{section}]");
        for option in configuration.local_options(section)? {
            println!("{option} = {}", configuration.get(section, option)?);
        }
        println!();
    }

    let mut registry = registry_for(&configuration);
    let mut context = ProductContext::new(&configuration, &mut registry);
    let operation = context.build(ROOT_PLUGIN, None)?;
    tracing::info!(operation = operation.name(), "Configuration checks out");
    Ok(())
}

/// Render a plugin's help page, or the list of plugins for unknown names.
fn cmd_help(name: &str) -> Result<()> {
    let mut registry = PluginRegistry::default();
    let catalog = registry.catalog_names().into_iter().map(str::to_string).collect();
    registry.set_external_modules(catalog);

    match registry.get_plugin(name) {
        Ok(entry) => print!("{}", entry.construct().help(terminal_width())),
        Err(PluginError::NotFound(_)) => {
            println!("'{name}' is not a known plugin.");
            println!("Known plugins:");
            for entry in registry.list_plugins()? {
                println!("    {}", entry.name());
            }
        }
        Err(error) => return Err(error.into()),
    }
    Ok(())
}

fn load_configuration(configfiles: &[PathBuf]) -> Result<ConfigurationMap> {
    let mut resolver = ConfigResolver::new();
    let configuration = resolver.resolve_all(configfiles)?;
    tracing::debug!(files = ?resolver.loaded_files(), "Loaded configuration");
    Ok(configuration)
}

/// A default registry that also scans the modules named in `[DEFAULT] modules`.
fn registry_for(configuration: &ConfigurationMap) -> PluginRegistry {
    let mut registry = PluginRegistry::default();
    if let Some(modules) = configuration.get_list_optional(DEFAULT_SECTION, MODULES_OPTION) {
        registry.set_external_modules(modules);
    }
    registry
}

fn is_configuration_problem(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| cause.is::<ConfigurationError>() || cause.is::<PluginError>())
}

/// Where a crash happened, read from a backtrace.
#[derive(Debug, PartialEq, Eq)]
struct CrashLocation {
    function: String,
    file: String,
    line: u32,
}

static FRAME_FUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+:\s+(?P<function>\S.*)$").expect("valid regex"));

static FRAME_LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*at\s+(?P<file>.+):(?P<line>\d+)(?::\d+)?$").expect("valid regex")
});

/// First frame of our own code in a rendered backtrace.
fn crash_location(backtrace: &str) -> Option<CrashLocation> {
    let mut function: Option<&str> = None;
    for line in backtrace.lines() {
        if let Some(capture) = FRAME_FUNCTION.captures(line) {
            function = capture.name("function").map(|m| m.as_str());
            continue;
        }
        let (Some(name), Some(capture)) = (function.take(), FRAME_LOCATION.captures(line)) else {
            continue;
        };
        if name.starts_with("ape::") {
            return Some(CrashLocation {
                function: name.to_string(),
                file: capture["file"].to_string(),
                line: capture["line"].parse().ok()?,
            });
        }
    }
    None
}

fn report_crash(error: &anyhow::Error, post_mortem: bool) {
    tracing::error!("{CRASH_BANNER}");
    for cause in error.chain() {
        tracing::error!("{cause}");
    }

    let backtrace = error.backtrace().to_string();
    match crash_location(&backtrace) {
        Some(location) => tracing::error!(
            file = %location.file,
            line = location.line,
            function = %location.function,
            "Crash location"
        ),
        None => tracing::debug!("No crash location in the backtrace"),
    }
    tracing::error!("{}", "*".repeat(CRASH_BANNER.len()));

    if post_mortem {
        eprintln!("{error:?}");
    } else {
        tracing::debug!("{error:?}");
    }
}
