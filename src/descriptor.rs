//! The application descriptor handed to every backend.
//!
//! An [`AppDescriptor`] is validated once when it is built and never changes
//! afterwards, so it can be cloned and shared between threads freely.

use crate::error::{AutoLaunchError, Result};
use crate::platform::{self, Backend};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Launch arguments that ask a macOS login item to start hidden
const HIDDEN_LAUNCH_FLAGS: [&str; 2] = ["--hidden", "--minimized"];

/// Describes an application to start at user login
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDescriptor {
    /// Registration key on every platform. On Windows this is also the name
    /// shown in Task Manager's Startup tab.
    name: String,
    executable: PathBuf,
    args: Vec<String>,
    /// macOS only: write a launch agent plist instead of a login item
    use_launch_agent: bool,
}

impl AppDescriptor {
    pub fn builder() -> AppDescriptorBuilder {
        AppDescriptorBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The executable as it was given to the builder
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn use_launch_agent(&self) -> bool {
        self.use_launch_agent
    }

    /// The executable resolved against the current directory
    pub fn absolute_executable(&self) -> PathBuf {
        std::path::absolute(&self.executable).unwrap_or_else(|_| self.executable.clone())
    }

    /// Render the command line used by the desktop entry and the Run key:
    /// the absolute executable path followed by the arguments, space separated.
    ///
    /// Only the path is quoted when `quotes` is set. Arguments are emitted
    /// verbatim.
    pub fn startup_command(&self, quotes: bool) -> String {
        let path = self.absolute_executable();
        let mut command = if quotes {
            format!("\"{}\"", path.display())
        } else {
            path.display().to_string()
        };

        if !self.args.is_empty() {
            command.push(' ');
            command.push_str(&self.args.join(" "));
        }

        command
    }

    /// Quoted form of [`startup_command`](Self::startup_command)
    pub fn default_startup_command(&self) -> String {
        self.startup_command(true)
    }

    /// Whether the arguments ask for the application to start hidden
    pub fn is_hidden_launch(&self) -> bool {
        self.args
            .iter()
            .any(|arg| HIDDEN_LAUNCH_FLAGS.contains(&arg.as_str()))
    }

    /// Register this application with the shared backend. No effect if it is
    /// already registered.
    pub fn enable(&self) -> Result<()> {
        platform::shared_backend()?.enable(self)
    }

    /// Remove the registration from the shared backend. No effect if it is
    /// not registered.
    pub fn disable(&self) -> Result<()> {
        platform::shared_backend()?.disable(self)
    }

    pub fn is_enabled(&self) -> Result<bool> {
        platform::shared_backend()?.is_enabled(self)
    }

    /// Flip the registration state, returning the new state
    pub fn toggle(&self) -> Result<bool> {
        platform::shared_backend()?.toggle(self)
    }
}

/// Builder for [`AppDescriptor`]
#[derive(Debug, Clone, Default)]
pub struct AppDescriptorBuilder {
    name: Option<String>,
    executable: Option<PathBuf>,
    args: Vec<String>,
    use_launch_agent: bool,
}

impl AppDescriptorBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The binary to start. It must exist when [`build`](Self::build) is called.
    pub fn executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    /// Append a single argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replace the argument list
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn use_launch_agent(mut self, use_launch_agent: bool) -> Self {
        self.use_launch_agent = use_launch_agent;
        self
    }

    pub fn build(self) -> Result<AppDescriptor> {
        let name = match self.name {
            Some(name) if !name.is_empty() => name,
            Some(_) => {
                return Err(AutoLaunchError::Validation(
                    "Application name cannot be empty".to_string(),
                ));
            }
            None => {
                return Err(AutoLaunchError::Validation(
                    "Application name is required".to_string(),
                ));
            }
        };

        let executable = self.executable.ok_or_else(|| {
            AutoLaunchError::Validation("Application executable is required".to_string())
        })?;

        if !executable.exists() {
            return Err(AutoLaunchError::Validation(format!(
                "File {} does not exist",
                executable.display()
            )));
        }

        Ok(AppDescriptor {
            name,
            executable,
            args: self.args,
            use_launch_agent: self.use_launch_agent,
        })
    }
}
