//! Built-in plugins.
//!
//! `plugins` is always scanned. `parts` holds plugins that have to be
//! requested, e.g. with `fetch --module parts` or `modules = parts` in the
//! `DEFAULT` section.

mod ape;
mod dummy;
mod shell;
mod sleep;

pub use ape::{Ape, APE_SECTION, END_TIME_OPTION, TIME_LIMIT_OPTION};
pub use dummy::{Dummy, DummyOperation};
pub use shell::{Shell, ShellOperation, SHELL_SECTION};
pub use sleep::{Sleep, SleepOperation, SleepUntil, SLEEP_SECTION};

use crate::plugin::{Plugin, PluginModule};

/// Name of the always-scanned module.
pub const BUILTIN_MODULE: &str = "plugins";

/// Name of the on-request module.
pub const PARTS_MODULE: &str = "parts";

/// `DEFAULT` option listing extra modules to scan.
pub const MODULES_OPTION: &str = "modules";

fn ape() -> Box<dyn Plugin> {
    Box::new(Ape)
}

fn dummy() -> Box<dyn Plugin> {
    Box::new(Dummy)
}

fn sleep() -> Box<dyn Plugin> {
    Box::new(Sleep)
}

fn shell() -> Box<dyn Plugin> {
    Box::new(Shell)
}

/// The always-scanned module.
pub fn builtin_module() -> PluginModule {
    PluginModule::new(BUILTIN_MODULE)
        .export("ape", "Ape", ape)
        .export("dummy", "Dummy", dummy)
        .export("sleep", "Sleep", sleep)
}

/// Modules that can be requested by name.
pub fn catalog_modules() -> Vec<PluginModule> {
    vec![PluginModule::new(PARTS_MODULE).export("shell", "Shell", shell)]
}
