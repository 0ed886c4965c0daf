//! Application wiring
//!
//! Loads configuration, builds the standard registry over shared services,
//! and runs programs. The CLI is one host of this API; embedders can use it
//! directly:
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use cadence_core::application::ApplicationBuilder;
//!
//! let app = ApplicationBuilder::new().build()?;
//! let program = app.run("total: 1 |> add(2)", false).await?;
//! println!("{}", program.value);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::flow::{Context, Func};
use crate::interpreter::types::{TypeRegistry, Val};
use crate::interpreter::Interpreter;
use crate::stdlib::{Registry, Services};
use crate::triggers::{Trigger, TriggerScheduler};

pub struct Application {
    config: Config,
    registry: Registry,
}

/// An evaluated program whose triggers have not started yet
#[derive(Debug)]
pub struct Program {
    pub value: Val,
    pub triggers: Vec<Trigger>,
    types: Arc<TypeRegistry>,
    context: Context,
}

impl Application {
    /// Pure instantiation, no I/O
    pub fn new(config: Config, registry: Registry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Evaluate a program; `system` marks the run as a trusted system context
    pub async fn run(&self, source: &str, system: bool) -> Result<Program> {
        let context = if system {
            Context::system()
        } else {
            Context::new()
        };
        let mut interpreter = Interpreter::new(&self.registry).with_context(context.clone());
        let evaluation = interpreter.eval_source(source).await?;
        tracing::debug!(triggers = evaluation.triggers.len(), "program evaluated");

        Ok(Program {
            value: evaluation.value,
            triggers: evaluation.triggers,
            types: interpreter.types().clone(),
            context,
        })
    }

    pub async fn run_file(&self, path: &Path, system: bool) -> Result<Program> {
        let source = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.run(&source, system).await
    }

    /// Start the program's triggers; stop them with `shutdown`
    pub fn start_triggers(&self, program: Program) -> TriggerScheduler {
        let mut scheduler =
            TriggerScheduler::new(program.types, program.context, self.config.triggers.settings());
        scheduler.spawn_all(program.triggers);
        scheduler
    }
}

/// Builder for constructing an `Application`
#[derive(Default)]
pub struct ApplicationBuilder {
    config_path: Option<PathBuf>,
    config: Option<Config>,
    functions: Vec<(String, Func)>,
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Use this configuration instead of loading one
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Add a host function on top of the standard set
    pub fn function(mut self, name: impl Into<String>, func: Func) -> Self {
        self.functions.push((name.into(), func));
        self
    }

    pub fn build(self) -> Result<Application> {
        let config = match self.config {
            Some(config) => config,
            None => Config::builder()
                .config_path(self.config_path)
                .build()
                .context("Failed to load configuration")?,
        };

        let mut registry = Registry::with_services(Services::from_config(&config));
        for (name, func) in self.functions {
            registry.register(name, func);
        }
        Ok(Application::new(config, registry))
    }
}
