//! CLI subcommands — init, validate, synth, outputs.

use crate::constructs::stack::{DeploymentStack, StackProps};
use crate::core::{config, env, graph, synth};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new shipstack project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate shipstack.yaml and the stack it declares
    Validate {
        /// Path to shipstack.yaml
        #[arg(short, long, default_value = "shipstack.yaml")]
        file: PathBuf,
    },

    /// Synthesize the deployment template
    Synth {
        /// Path to shipstack.yaml
        #[arg(short, long, default_value = "shipstack.yaml")]
        file: PathBuf,

        /// Write the template here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the declared outputs and published parameters
    Outputs {
        /// Path to shipstack.yaml
        #[arg(short, long, default_value = "shipstack.yaml")]
        file: PathBuf,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Synth { file, output } => cmd_synth(&file, output.as_deref()),
        Commands::Outputs { file } => cmd_outputs(&file),
    }
}

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("shipstack.yaml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }

    std::fs::create_dir_all(path).map_err(|e| format!("cannot create dir: {}", e))?;
    std::fs::write(&config_path, config::CONFIG_TEMPLATE)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    println!("Initialized shipstack project at {}", path.display());
    println!("  Created: {}", config_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let (graph, config) = declare_from_file(file)?;
    println!(
        "OK: {} ({} resources, {} parameters, {} outputs)",
        config.name,
        graph.resources().len(),
        graph.registry().len(),
        graph.outputs().len()
    );
    Ok(())
}

fn cmd_synth(file: &Path, output: Option<&Path>) -> Result<(), String> {
    let (graph, _config) = declare_from_file(file)?;
    let target = env::DeployTarget::from_process_env();
    let template = synth::render(&graph, &target)?;

    match output {
        Some(path) => {
            synth::write_template(path, &template)?;
            println!("Wrote {}", path.display());
            println!("  Resources: {}", graph.resources().len());
            println!("  Fingerprint: {}", synth::fingerprint(&template));
        }
        None => {
            let pretty = serde_json::to_string_pretty(&template)
                .map_err(|e| format!("serialize error: {}", e))?;
            println!("{}", pretty);
        }
    }
    Ok(())
}

fn cmd_outputs(file: &Path) -> Result<(), String> {
    let (graph, config) = declare_from_file(file)?;

    println!("Stack: {}", config.name);
    println!();
    println!("Outputs:");
    for (name, value) in graph.outputs() {
        println!("  {} = {}", name, describe(value));
    }
    println!();
    println!("Parameters:");
    for (key, value) in graph.registry().iter() {
        println!("  {} = {}", key, describe(value));
    }
    Ok(())
}

/// Parse the config, validate it, declare the stack, and validate the graph.
fn declare_from_file(file: &Path) -> Result<(graph::ResourceGraph, config::StackConfig), String> {
    let stack_config = config::parse_config_file(file)?;
    let config_errors = config::validate_config(&stack_config);
    if !config_errors.is_empty() {
        for e in &config_errors {
            eprintln!("  ERROR: {}", e);
        }
        return Err(format!("{} validation error(s)", config_errors.len()));
    }

    let props = StackProps::from_config(&stack_config);
    let (graph, _) = DeploymentStack::declare(&props)?;

    let graph_errors = graph.validate();
    if !graph_errors.is_empty() {
        for e in &graph_errors {
            eprintln!("  ERROR: {}", e);
        }
        return Err(format!("{} validation error(s)", graph_errors.len()));
    }

    Ok((graph, stack_config))
}

fn describe(value: &crate::core::types::Value) -> String {
    match value {
        crate::core::types::Value::Literal(s) => s.clone(),
        crate::core::types::Value::Attr { resource, attr } => {
            format!("<{}.{}>", resource, attr)
        }
    }
}
