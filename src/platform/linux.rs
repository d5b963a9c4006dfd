use crate::descriptor::AppDescriptor;
use crate::error::{AutoLaunchError, Result};
use crate::platform::Backend;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Starts applications through freedesktop autostart entries in
/// `~/.config/autostart`
#[derive(Debug, Clone)]
pub struct LinuxBackend {
    autostart_dir: PathBuf,
}

impl LinuxBackend {
    pub fn for_current_user() -> Result<Self> {
        Ok(Self::with_home(super::home_dir()?))
    }

    /// Use `home` in place of the current user's home directory
    pub fn with_home(home: impl AsRef<Path>) -> Self {
        Self {
            autostart_dir: home.as_ref().join(".config").join("autostart"),
        }
    }

    pub fn autostart_dir(&self) -> &Path {
        &self.autostart_dir
    }

    /// Path of the desktop entry written for `app`
    pub fn desktop_file(&self, app: &AppDescriptor) -> PathBuf {
        self.autostart_dir.join(format!("{}.desktop", app.name()))
    }
}

/// Render the desktop entry for `app`
pub(crate) fn desktop_entry(app: &AppDescriptor) -> String {
    format!(
        r#"[Desktop Entry]
Type=Application
Version=1.0
Name={name}
Comment={name} startup script
Exec={exec}
StartupNotify=false
Terminal=false
"#,
        name = app.name(),
        exec = app.startup_command(false)
    )
}

impl Backend for LinuxBackend {
    fn enable(&self, app: &AppDescriptor) -> Result<()> {
        fs::create_dir_all(&self.autostart_dir)
            .map_err(|e| AutoLaunchError::io("Failed to create autostart directory", e))?;

        let desktop_file = self.desktop_file(app);
        if desktop_file.exists() {
            tracing::debug!("Desktop entry {:?} already exists", desktop_file);
            return Ok(());
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&desktop_file)
            .map_err(|e| AutoLaunchError::io("Failed to create desktop file", e))?;
        file.write_all(desktop_entry(app).as_bytes())
            .map_err(|e| AutoLaunchError::io("Failed to write desktop file", e))?;

        tracing::info!("Enabled autostart for {} at {:?}", app.name(), desktop_file);
        Ok(())
    }

    fn disable(&self, app: &AppDescriptor) -> Result<()> {
        let desktop_file = self.desktop_file(app);

        match fs::remove_file(&desktop_file) {
            Ok(()) => {
                tracing::info!("Disabled autostart for {}", app.name());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AutoLaunchError::io("Failed to remove desktop file", e)),
        }
    }

    fn is_enabled(&self, app: &AppDescriptor) -> Result<bool> {
        Ok(self.desktop_file(app).exists())
    }
}
