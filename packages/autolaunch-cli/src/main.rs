//! Autolaunch CLI - register an application to start at user login
//!
//! This binary drives the `autolaunch` library from the shell:
//! - Enable, disable or toggle a login item
//! - Report whether a login item is registered
//! - Show the detected platform and config file location

mod config;

use anyhow::{Context, Result};
use autolaunch::{AppDescriptor, Backend, Platform};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::{AppOverrides, ConfigSource};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "autolaunch")]
#[command(version)]
#[command(about = "Register an application to start at user login")]
#[command(long_about = "
Autolaunch registers an application as a per-user startup item using the
native mechanism of the running system:

  Linux    ~/.config/autostart/<name>.desktop
  Windows  HKCU\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Run
  macOS    System Events login item, or ~/Library/LaunchAgents/<name>.plist

Quick start:
  autolaunch enable --name MyApp --exe /usr/local/bin/myapp --arg --minimized
  autolaunch status --name MyApp --exe /usr/local/bin/myapp
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Config file to read the application from
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Args, Clone, Default)]
pub struct AppArgs {
    /// Application name, used as the registration key
    #[arg(short, long)]
    pub name: Option<String>,

    /// Executable to start at login
    #[arg(short, long)]
    pub exe: Option<PathBuf>,

    /// Argument passed to the executable (repeatable)
    #[arg(short, long = "arg", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Ignore arguments from the config file
    #[arg(long, conflicts_with = "args")]
    pub no_args: bool,

    /// macOS only: use a LaunchAgent plist instead of a login item
    #[arg(long, overrides_with = "no_launch_agent")]
    pub launch_agent: bool,

    /// macOS only: use a login item even if the config file asks for a LaunchAgent
    #[arg(long, overrides_with = "launch_agent")]
    pub no_launch_agent: bool,
}

impl From<AppArgs> for AppOverrides {
    fn from(args: AppArgs) -> Self {
        let app_args = if args.no_args {
            Some(Vec::new())
        } else if args.args.is_empty() {
            None
        } else {
            Some(args.args)
        };

        let use_launch_agent = match (args.launch_agent, args.no_launch_agent) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };

        AppOverrides {
            name: args.name,
            executable: args.exe,
            args: app_args,
            use_launch_agent,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the application at login
    Enable(AppArgs),

    /// Stop starting the application at login
    Disable(AppArgs),

    /// Flip the current state
    Toggle(AppArgs),

    /// Show whether the application starts at login
    Status(AppArgs),

    /// Show the detected platform
    Platform,

    /// Show configuration paths and an example config file
    Config,
}

#[derive(Clone, Copy)]
enum Action {
    Enable,
    Disable,
    Toggle,
    Status,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("autolaunch={},autolaunch_cli={}", log_level, log_level).into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Enable(args) => cmd_app(&cli, Action::Enable, args),
        Commands::Disable(args) => cmd_app(&cli, Action::Disable, args),
        Commands::Toggle(args) => cmd_app(&cli, Action::Toggle, args),
        Commands::Status(args) => cmd_app(&cli, Action::Status, args),
        Commands::Platform => cmd_platform(&cli),
        Commands::Config => cmd_config(&cli),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn resolve_descriptor(cli: &Cli, args: &AppArgs) -> Result<AppDescriptor> {
    let resolved = config::resolve_app(&args.clone().into(), cli.config.as_deref());
    if resolved.name_source == ConfigSource::Default {
        tracing::debug!("No application name given on the command line, environment or config file");
    }
    resolved
        .into_descriptor()
        .context("Could not describe the application to launch")
}

fn cmd_app(cli: &Cli, action: Action, args: &AppArgs) -> Result<()> {
    let app = resolve_descriptor(cli, args)?;
    let backend: &dyn Backend = autolaunch::shared_backend()?;

    let enabled = apply_action(backend, action, &app)?;

    match cli.format {
        OutputFormat::Text => {
            let state = if enabled { "enabled" } else { "disabled" };
            match action {
                Action::Status => println!("Autostart for '{}' is {}", app.name(), state),
                _ => println!("✓ Autostart for '{}' is now {}", app.name(), state),
            }
        }
        OutputFormat::Json => println!("{}", app_report(&app, enabled)?),
    }

    Ok(())
}

/// Run `action` and return the registration state it leaves behind.
///
/// Enable and disable report the state they requested rather than querying
/// again, since a query is not guaranteed to observe the change (macOS login
/// items only report through the helper's failure output).
fn apply_action(backend: &dyn Backend, action: Action, app: &AppDescriptor) -> Result<bool> {
    let enabled = match action {
        Action::Enable => {
            backend.enable(app)?;
            true
        }
        Action::Disable => {
            backend.disable(app)?;
            false
        }
        Action::Toggle => backend.toggle(app)?,
        Action::Status => backend.is_enabled(app)?,
    };
    Ok(enabled)
}

/// JSON report for `app`. Fails instead of panicking when the executable
/// path is not valid UTF-8.
fn app_report(app: &AppDescriptor, enabled: bool) -> Result<serde_json::Value> {
    let app = serde_json::to_value(app).context("Failed to serialize application for JSON output")?;
    let platform = serde_json::to_value(Platform::current())
        .context("Failed to serialize platform for JSON output")?;

    Ok(serde_json::json!({
        "app": app,
        "platform": platform,
        "enabled": enabled,
    }))
}

fn cmd_platform(cli: &Cli) -> Result<()> {
    let platform = Platform::current();
    let supported = autolaunch::create_backend(platform).is_ok();

    match cli.format {
        OutputFormat::Text => {
            println!("Platform: {}", platform);
            println!("Supported: {}", if supported { "yes" } else { "no" });
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "platform": platform,
                    "supported": supported,
                })
            );
        }
    }

    Ok(())
}

fn cmd_config(cli: &Cli) -> Result<()> {
    let path = config::config_file_path(cli.config.as_deref())
        .map(|p| p.display().to_string())
        .unwrap_or_else(config::get_config_file_path_string);

    match cli.format {
        OutputFormat::Text => {
            println!("Config file: {}", path);
            println!();
            println!("Example:");
            println!("{}", config::generate_example_config());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "config_file": path,
                    "default_config_file": config::get_config_file_path_string(),
                })
            );
        }
    }

    Ok(())
}
