//! Resolves which application the CLI operates on.
//!
//! Each setting is taken from the first source that provides it:
//! 1. Command-line flags
//! 2. Environment variables (`AUTOLAUNCH_NAME`, `AUTOLAUNCH_EXE`)
//! 3. Config file (`--config`, `AUTOLAUNCH_CONFIG`, or `~/.config/autolaunch/config.toml`)
//! 4. Defaults

use anyhow::{Context, Result};
use autolaunch::AppDescriptor;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable name for the config file override
const ENV_CONFIG_PATH: &str = "AUTOLAUNCH_CONFIG";

/// Environment variable name for the application name
const ENV_APP_NAME: &str = "AUTOLAUNCH_NAME";

/// Environment variable name for the application executable
const ENV_APP_EXECUTABLE: &str = "AUTOLAUNCH_EXE";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    app: Option<AppConfig>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AppConfig {
    name: Option<String>,
    executable: Option<PathBuf>,
    args: Option<Vec<String>>,
    use_launch_agent: Option<bool>,
}

/// Settings given on the command line. `None` defers to the other sources.
#[derive(Debug, Clone, Default)]
pub struct AppOverrides {
    pub name: Option<String>,
    pub executable: Option<PathBuf>,
    /// `Some(vec![])` clears arguments set by the config file
    pub args: Option<Vec<String>>,
    pub use_launch_agent: Option<bool>,
}

/// Where a setting came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigSource {
    /// Nothing provided it
    Default,
    /// Loaded from environment variable
    Environment,
    /// Loaded from config file
    ConfigFile,
    /// Given as a command-line flag
    CommandLine,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
            ConfigSource::CommandLine => write!(f, "command line"),
        }
    }
}

/// Application settings after all sources were merged
#[derive(Debug, Clone)]
pub struct ResolvedApp {
    pub name: Option<String>,
    pub executable: Option<PathBuf>,
    pub args: Vec<String>,
    pub use_launch_agent: bool,
    /// Source of the name (for logging)
    pub name_source: ConfigSource,
}

impl ResolvedApp {
    /// Validate the settings into a descriptor
    pub fn into_descriptor(self) -> autolaunch::Result<AppDescriptor> {
        let mut builder = AppDescriptor::builder()
            .args(self.args)
            .use_launch_agent(self.use_launch_agent);
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        if let Some(executable) = self.executable {
            builder = builder.executable(executable);
        }
        builder.build()
    }
}

/// Default location of the config file
fn get_config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("autolaunch").join("config.toml"))
}

/// Config file to read: the explicit path, then the environment, then the default
pub fn config_file_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        let path = path.trim();
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    get_config_file_path()
}

/// Parse config file content
pub fn parse_config(content: &str) -> Result<ConfigFile> {
    toml::from_str(content).context("Failed to parse config file")
}

/// Load the config file. A missing file is not an error; an unreadable or
/// malformed one is logged and ignored.
pub fn load_config_file(path: &Path) -> Option<ConfigFile> {
    if !path.exists() {
        tracing::debug!("No config file at {:?}", path);
        return None;
    }

    match fs::read_to_string(path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {:#}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

/// Merge command-line, environment, and config file settings
pub fn resolve_app(overrides: &AppOverrides, config_path: Option<&Path>) -> ResolvedApp {
    let file = config_file_path(config_path).and_then(|path| load_config_file(&path));
    resolve_app_with(overrides, file, |key| std::env::var(key).ok())
}

fn resolve_app_with(
    overrides: &AppOverrides,
    file: Option<ConfigFile>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedApp {
    let file = file.and_then(|f| f.app).unwrap_or_default();
    let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let (name, name_source) = if let Some(name) = overrides.name.clone() {
        (Some(name), ConfigSource::CommandLine)
    } else if let Some(name) = env(ENV_APP_NAME) {
        (Some(name), ConfigSource::Environment)
    } else if let Some(name) = file.name {
        (Some(name), ConfigSource::ConfigFile)
    } else {
        (None, ConfigSource::Default)
    };

    let executable = overrides
        .executable
        .clone()
        .or_else(|| env(ENV_APP_EXECUTABLE).map(PathBuf::from))
        .or(file.executable);

    let args = overrides
        .args
        .clone()
        .or(file.args)
        .unwrap_or_default();

    let use_launch_agent = overrides
        .use_launch_agent
        .or(file.use_launch_agent)
        .unwrap_or(false);

    tracing::debug!("Application name from {}: {:?}", name_source, name);

    ResolvedApp {
        name,
        executable,
        args,
        use_launch_agent,
        name_source,
    }
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/autolaunch/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# Autolaunch Configuration
# Place this file at: ~/.config/autolaunch/config.toml

[app]
# Registration key, also shown in Task Manager's Startup tab on Windows
# name = "MyApp"

# Binary to start at login (must exist; must be absolute on macOS)
# executable = "/usr/local/bin/myapp"

# Arguments passed at startup. "--hidden" or "--minimized" start macOS login items hidden
# args = ["--minimized"]

# macOS only: write a LaunchAgent plist instead of a login item
# use_launch_agent = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_command_line_wins() {
        let overrides = AppOverrides {
            name: Some("FromFlag".to_string()),
            executable: Some(PathBuf::from("/bin/flag")),
            args: Some(vec!["--flag".to_string()]),
            use_launch_agent: None,
        };
        let file = parse_config(
            r#"
            [app]
            name = "FromFile"
            executable = "/bin/file"
            args = ["--file"]
            use_launch_agent = true
            "#,
        )
        .unwrap();
        let env = HashMap::from([(ENV_APP_NAME, "FromEnv"), (ENV_APP_EXECUTABLE, "/bin/env")]);

        let resolved = resolve_app_with(&overrides, Some(file), |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(resolved.name.as_deref(), Some("FromFlag"));
        assert_eq!(resolved.name_source, ConfigSource::CommandLine);
        assert_eq!(resolved.executable, Some(PathBuf::from("/bin/flag")));
        assert_eq!(resolved.args, ["--flag"]);
        assert!(resolved.use_launch_agent);
    }

    #[test]
    fn test_environment_before_file() {
        let file = parse_config("[app]\nname = \"FromFile\"\nexecutable = \"/bin/file\"\n").unwrap();
        let env = HashMap::from([(ENV_APP_NAME, "  FromEnv  ")]);

        let resolved = resolve_app_with(&AppOverrides::default(), Some(file), |k| {
            env.get(k).map(|v| v.to_string())
        });

        assert_eq!(resolved.name.as_deref(), Some("FromEnv"));
        assert_eq!(resolved.name_source, ConfigSource::Environment);
        assert_eq!(resolved.executable, Some(PathBuf::from("/bin/file")));
    }

    #[test]
    fn test_file_values_and_defaults() {
        let file = parse_config("[app]\nname = \"FromFile\"\nargs = [\"--hidden\"]\n").unwrap();
        let resolved = resolve_app_with(&AppOverrides::default(), Some(file), no_env);

        assert_eq!(resolved.name_source, ConfigSource::ConfigFile);
        assert_eq!(resolved.args, ["--hidden"]);
        assert!(resolved.executable.is_none());
        assert!(!resolved.use_launch_agent);

        let resolved = resolve_app_with(&AppOverrides::default(), None, no_env);
        assert_eq!(resolved.name_source, ConfigSource::Default);
        assert!(resolved.name.is_none());
        assert!(resolved.args.is_empty());
    }

    #[test]
    fn test_command_line_can_reset_file_values() {
        let file = parse_config(
            "[app]\nname = \"FromFile\"\nargs = [\"--file\"]\nuse_launch_agent = true\n",
        )
        .unwrap();
        let overrides = AppOverrides {
            args: Some(Vec::new()),
            use_launch_agent: Some(false),
            ..AppOverrides::default()
        };

        let resolved = resolve_app_with(&overrides, Some(file), no_env);

        assert!(resolved.args.is_empty());
        assert!(!resolved.use_launch_agent);
        assert_eq!(resolved.name.as_deref(), Some("FromFile"));
    }

    #[test]
    fn test_unknown_app_keys_are_rejected() {
        assert!(parse_config("[app]\nnmae = \"typo\"\n").is_err());
        assert!(parse_config("").unwrap().app.is_none());
    }

    #[test]
    fn test_malformed_config_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[app\nname = ").unwrap();
        assert!(load_config_file(&path).is_none());
        assert!(load_config_file(&dir.path().join("missing.toml")).is_none());
    }

    #[test]
    fn test_into_descriptor_validates() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("app");
        fs::write(&exe, b"").unwrap();

        let resolved = ResolvedApp {
            name: Some("TestApp".to_string()),
            executable: Some(exe.clone()),
            args: vec!["--flag".to_string()],
            use_launch_agent: true,
            name_source: ConfigSource::CommandLine,
        };
        let app = resolved.clone().into_descriptor().unwrap();
        assert_eq!(app.name(), "TestApp");
        assert_eq!(app.args(), ["--flag"]);
        assert!(app.use_launch_agent());

        let missing_name = ResolvedApp {
            name: None,
            ..resolved
        };
        assert!(missing_name.into_descriptor().unwrap_err().is_validation());
    }

    #[test]
    fn test_example_config_parses() {
        let config = parse_config(&generate_example_config()).unwrap();
        let app = config.app.unwrap();
        assert!(app.name.is_none());
        assert!(app.executable.is_none());
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let explicit = Path::new("/tmp/explicit.toml");
        assert_eq!(config_file_path(Some(explicit)), Some(explicit.to_path_buf()));
    }
}
