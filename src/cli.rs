// Copyright © 2024 ModFlow. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command-line interface for ModFlow
//!
//! This module provides the command-line interface for resolving and
//! configuring module manifests. It handles argument parsing, command
//! execution and output rendering.
//!
//! # Examples
//!
//! Basic usage example to parse a `run` command with a JSON audit:
//!
//! ```
//! use modflow::cli;
//!
//! let matches = cli::build().get_matches_from(vec![
//!     "modflow",
//!     "run",
//!     "--manifest",
//!     "modules.toml",
//!     "--format",
//!     "json"
//! ]);
//!
//! let run_cmd = matches.subcommand_matches("run").unwrap();
//! assert_eq!(run_cmd.get_one::<String>("format").unwrap(), "json");
//! ```

use crate::core::config::{AuditFormat, Config, ConfigBuilder, DEFAULT_ENV_PREFIX};
use crate::core::error::{ModFlowError, Result};
use crate::manifest::Manifest;
use crate::module::ModuleId;
use crate::services::{ServiceCollection, ServiceRegistryExt};
use crate::{ModFlow, ResolutionPlan};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{debug, info};
use std::io::Write;
use std::path::PathBuf;

/// The current version of ModFlow, as defined in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn manifest_arg() -> Arg {
    Arg::new("manifest")
        .short('m')
        .long("manifest")
        .help("Module manifest (falls back to `manifest` in the config)")
        .value_parser(value_parser!(PathBuf))
}

fn root_arg() -> Arg {
    Arg::new("root")
        .short('r')
        .long("root")
        .help("Root module (falls back to `root` in the config)")
        .value_parser(value_parser!(String))
}

/// Builds and configures the ModFlow command-line interface.
pub fn build() -> Command {
    debug!("Building CLI command structure");

    Command::new("modflow")
        .author("ModFlow Contributors")
        .about("Resolves module dependencies and configures them in order.")
        .version(VERSION)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Configuration file")
                .global(true)
                .value_parser(value_parser!(PathBuf))
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Verbose mode (-v, -vv)")
                .global(true)
                .action(ArgAction::Count)
        )
        .subcommand(
            Command::new("plan")
                .about("Print the configuration order")
                .arg(manifest_arg())
                .arg(root_arg())
        )
        .subcommand(
            Command::new("graph")
                .about("Print the dependency closure of the root")
                .arg(manifest_arg())
                .arg(root_arg())
        )
        .subcommand(
            Command::new("run")
                .about("Configure every module and print the audit trail")
                .arg(manifest_arg())
                .arg(root_arg())
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .help("Audit output format")
                        .value_parser(["text", "json"])
                )
        )
        .after_help(
            "\x1b[1;4mLicense:\x1b[0m\n  The project is licensed under the terms of \
             both the MIT license and the Apache License (Version 2.0)."
        )
}

/// Executes already parsed arguments, writing command output to `out`.
pub fn execute_matches(matches: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let config = load_config(matches.get_one::<PathBuf>("config"))?;

    match matches.subcommand() {
        Some(("plan", sub_matches)) => {
            let plan = resolve(&config, sub_matches)?;
            write_plan(&plan, out)
        }
        Some(("graph", sub_matches)) => {
            let plan = resolve(&config, sub_matches)?;
            write_graph(&plan, out)
        }
        Some(("run", sub_matches)) => {
            let format = match sub_matches.get_one::<String>("format") {
                Some(format) => format.parse()?,
                None => config.pipeline.audit_format,
            };
            run_pipeline(&config, sub_matches, format, out)
        }
        _ => Err(ModFlowError::internal_error("Unknown command")),
    }
}

/// Loads the configuration, from `path` when given, with `MODFLOW_`
/// environment overrides.
fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let builder = ConfigBuilder::new().with_env_prefix(DEFAULT_ENV_PREFIX);
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            builder.with_file(path).build()
        }
        None => builder.build(),
    }
}

fn flow_for(config: &Config, sub_matches: &ArgMatches) -> Result<(ModFlow, ModuleId)> {
    let manifest_path = sub_matches
        .get_one::<PathBuf>("manifest")
        .or(config.manifest.as_ref())
        .ok_or_else(|| {
            ModFlowError::config_error(
                "No manifest given; pass --manifest or set `manifest` in the configuration",
                None,
            )
        })?;
    let root = sub_matches
        .get_one::<String>("root")
        .map(ModuleId::new)
        .or_else(|| config.root.clone())
        .ok_or_else(|| {
            ModFlowError::config_error(
                "No root module given; pass --root or set `root` in the configuration",
                None,
            )
        })?;

    debug!("Using manifest {:?} with root `{}`", manifest_path, root);
    let catalog = Manifest::load(manifest_path)?.into_catalog()?;
    let flow = ModFlow::new(catalog).with_config(config.pipeline);
    Ok((flow, root))
}

fn resolve(config: &Config, sub_matches: &ArgMatches) -> Result<ResolutionPlan> {
    let (flow, root) = flow_for(config, sub_matches)?;
    flow.plan(&root)
}

fn write_plan(plan: &ResolutionPlan, out: &mut dyn Write) -> Result<()> {
    for (index, module) in plan.modules().iter().enumerate() {
        writeln!(out, "{}. {} ({})", index + 1, module.name(), module.id())?;
    }
    Ok(())
}

fn write_graph(plan: &ResolutionPlan, out: &mut dyn Write) -> Result<()> {
    for id in plan.order() {
        let dependencies = plan.graph().dependencies(id).unwrap_or_default();
        if dependencies.is_empty() {
            writeln!(out, "{}", id)?;
        } else {
            let joined = dependencies
                .iter()
                .map(ModuleId::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "{} -> {}", id, joined)?;
        }
    }
    Ok(())
}

fn run_pipeline(
    config: &Config,
    sub_matches: &ArgMatches,
    format: AuditFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let (flow, root) = flow_for(config, sub_matches)?;

    let mut services = ServiceCollection::new();
    services.add_singleton(config.to_settings());

    let context = flow.configure_modules(&root, services)?;
    match format {
        AuditFormat::Text => write!(out, "{}", context.configures())?,
        AuditFormat::Json => writeln!(out, "{}", context.configures().to_json()?)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
[[module]]
id = "app"
name = "Application"
depends_on = ["domain"]

[[module]]
id = "domain"
depends_on = ["common"]

[[module]]
id = "common"
"#;

    fn get_matches(args: Vec<&str>) -> ArgMatches {
        build().get_matches_from(args)
    }

    fn run(args: Vec<&str>) -> Result<String> {
        let mut out = Vec::new();
        execute_matches(&get_matches(args), &mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn write_manifest(dir: &TempDir, content: &str) -> String {
        let path = dir.path().join("modules.toml");
        fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_plan_command() {
        let matches = get_matches(vec![
            "modflow",
            "plan",
            "--manifest",
            "modules.toml",
            "--root",
            "app",
        ]);
        let plan_cmd = matches.subcommand_matches("plan").unwrap();

        assert_eq!(
            plan_cmd.get_one::<PathBuf>("manifest").unwrap(),
            &PathBuf::from("modules.toml")
        );
        assert_eq!(plan_cmd.get_one::<String>("root").unwrap(), "app");
    }

    #[test]
    fn test_global_flags() {
        let matches = get_matches(vec![
            "modflow", "graph", "-vv", "--config", "modflow.toml",
        ]);
        assert_eq!(matches.get_count("verbose"), 2);
        assert_eq!(
            matches.get_one::<PathBuf>("config").unwrap(),
            &PathBuf::from("modflow.toml")
        );
    }

    #[test]
    fn test_invalid_format_is_rejected() {
        let result = build().try_get_matches_from(vec![
            "modflow", "run", "--format", "yaml",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_execute_plan_and_graph() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(&dir, MANIFEST);

        let plan = run(vec![
            "modflow", "plan", "-m", manifest.as_str(), "-r", "app",
        ])
        .unwrap();
        assert_eq!(
            plan,
            "1. common (common)\n2. domain (domain)\n3. Application (app)\n"
        );

        let graph = run(vec![
            "modflow", "graph", "-m", manifest.as_str(), "-r", "app",
        ])
        .unwrap();
        assert_eq!(graph, "common\ndomain -> common\napp -> domain\n");
    }

    #[test]
    fn test_execute_run_json() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(&dir, MANIFEST);

        let output = run(vec![
            "modflow", "run", "-m", manifest.as_str(), "-r", "app", "-f", "json",
        ])
        .unwrap();
        let audit: serde_json::Value = serde_json::from_str(&output).unwrap();
        let actions = audit.as_array().unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[2]["module_id"], "app");
        assert_eq!(actions[2]["prev_name"], "domain");
    }

    #[test]
    fn test_missing_root_is_config_error() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(&dir, MANIFEST);

        let err = run(vec!["modflow", "plan", "-m", manifest.as_str()]).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }
}
