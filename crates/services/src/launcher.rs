//! Launching the external process that presents a module.
//!
//! The launcher is a capability the dashboard holds; module numbers resolve
//! through a configured registry instead of hardcoded executable paths, so
//! the same dashboard works on any machine the registry describes.

use std::collections::HashMap;
use std::process::Command;

use drill_core::model::ModuleNumber;

use crate::error::LaunchError;

/// How to start one module's process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchCommand {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// Capability for handing control to a module's presentation process.
pub trait ModuleLauncher: Send + Sync {
    /// Launch the process for `module`. Returns false when no launch target
    /// is registered for it.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError` when a registered target fails to spawn.
    fn launch(&self, module: ModuleNumber) -> Result<bool, LaunchError>;
}

/// Registry-backed launcher: one configured command per module.
#[derive(Debug, Default)]
pub struct RegistryLauncher {
    commands: HashMap<ModuleNumber, LaunchCommand>,
}

impl RegistryLauncher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_command(mut self, module: ModuleNumber, command: LaunchCommand) -> Self {
        self.commands.insert(module, command);
        self
    }

    #[must_use]
    pub fn command_for(&self, module: ModuleNumber) -> Option<&LaunchCommand> {
        self.commands.get(&module)
    }
}

impl ModuleLauncher for RegistryLauncher {
    fn launch(&self, module: ModuleNumber) -> Result<bool, LaunchError> {
        let Some(command) = self.commands.get(&module) else {
            tracing::warn!(%module, "no launch target registered");
            return Ok(false);
        };
        Command::new(&command.program)
            .args(&command.args)
            .spawn()
            .map_err(|source| LaunchError::Spawn { module, source })?;
        tracing::info!(%module, program = %command.program, "module process launched");
        Ok(true)
    }
}

/// Launcher that never starts anything; for tests and headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLauncher;

impl ModuleLauncher for NoopLauncher {
    fn launch(&self, _module: ModuleNumber) -> Result<bool, LaunchError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn registry_resolves_configured_modules() {
        let launcher = RegistryLauncher::new()
            .with_command(
                ModuleNumber::new(1),
                LaunchCommand::new("module-viewer", vec!["--module".into(), "1".into()]),
            )
            .with_command(
                ModuleNumber::new(2),
                LaunchCommand::new("module-viewer", vec!["--module".into(), "2".into()]),
            );

        let command = launcher.command_for(ModuleNumber::new(2)).unwrap();
        assert_eq!(command.program, "module-viewer");
        assert_eq!(command.args, vec!["--module", "2"]);
        assert!(launcher.command_for(ModuleNumber::new(3)).is_none());
    }

    #[test]
    fn unregistered_module_reports_not_launched() {
        let launcher = RegistryLauncher::new();
        assert_eq!(launcher.launch(ModuleNumber::new(5)).unwrap(), false);
    }

    #[test]
    fn noop_launcher_never_launches() {
        assert_eq!(NoopLauncher.launch(ModuleNumber::new(1)).unwrap(), false);
    }

    #[test]
    fn launcher_trait_object_is_usable_behind_dyn() {
        struct Recording(Mutex<Vec<ModuleNumber>>);
        impl ModuleLauncher for Recording {
            fn launch(&self, module: ModuleNumber) -> Result<bool, LaunchError> {
                self.0.lock().unwrap().push(module);
                Ok(true)
            }
        }

        let recording = Recording(Mutex::new(Vec::new()));
        let launcher: &dyn ModuleLauncher = &recording;
        assert!(launcher.launch(ModuleNumber::new(4)).unwrap());
        assert_eq!(*recording.0.lock().unwrap(), vec![ModuleNumber::new(4)]);
    }
}
