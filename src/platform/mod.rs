//! Native startup backends and the selection of one for the running system.

mod linux;
mod macos;
mod windows;

pub use linux::LinuxBackend;
pub use macos::{MacBackend, OsaScript, ScriptOutput, ScriptRunner, escape_java};
pub use windows::{RegistryStore, WindowsBackend, startup_approved_allows_launch};

#[cfg(target_os = "windows")]
pub use windows::CurrentUserRegistry;

use crate::descriptor::AppDescriptor;
use crate::error::{AutoLaunchError, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::OnceLock;

/// One native mechanism for starting an application at user login.
///
/// Every operation is idempotent: enabling a registered application or
/// disabling an unregistered one leaves the native store unchanged. Backends
/// keep no state of their own, the native store is always read fresh.
pub trait Backend: Send + Sync {
    /// Register the application. No effect if a registration under the same
    /// name already exists.
    fn enable(&self, app: &AppDescriptor) -> Result<()>;

    /// Remove the registration. No effect if there is none.
    fn disable(&self, app: &AppDescriptor) -> Result<()>;

    /// Whether a registration under the application's name currently exists
    fn is_enabled(&self, app: &AppDescriptor) -> Result<bool>;

    /// Flip the registration state and return the new state.
    ///
    /// The check and the change are separate native calls, so a concurrent
    /// writer can interleave between them.
    fn toggle(&self, app: &AppDescriptor) -> Result<bool> {
        if self.is_enabled(app)? {
            self.disable(app)?;
            Ok(false)
        } else {
            self.enable(app)?;
            Ok(true)
        }
    }
}

/// Operating system families with a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linux,
    Windows,
    MacOs,
    Unsupported,
}

impl Platform {
    /// The platform this binary was compiled for
    pub fn current() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` value to a platform
    pub fn from_os_name(os: &str) -> Self {
        match os {
            "linux" => Platform::Linux,
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            _ => Platform::Unsupported,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Linux => write!(f, "linux"),
            Platform::Windows => write!(f, "windows"),
            Platform::MacOs => write!(f, "macos"),
            Platform::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Build the backend for `platform`, bound to the current user
pub fn create_backend(platform: Platform) -> Result<Box<dyn Backend>> {
    tracing::debug!("Creating startup backend for {}", platform);

    match platform {
        Platform::Linux => Ok(Box::new(LinuxBackend::for_current_user()?)),
        Platform::MacOs => Ok(Box::new(MacBackend::for_current_user()?)),
        #[cfg(target_os = "windows")]
        Platform::Windows => Ok(Box::new(WindowsBackend::for_current_user())),
        #[cfg(not(target_os = "windows"))]
        Platform::Windows => Err(AutoLaunchError::UnsupportedPlatform(
            "the Windows registry is only reachable from Windows builds".to_string(),
        )),
        Platform::Unsupported => Err(AutoLaunchError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        )),
    }
}

static SHARED_BACKEND: OnceLock<Box<dyn Backend>> = OnceLock::new();

/// The process-wide backend for the running platform, created on first use.
///
/// Backends hold no resources, so the handle lives for the rest of the
/// process. If creation fails the error is returned and the next call tries
/// again.
pub fn shared_backend() -> Result<&'static dyn Backend> {
    if let Some(backend) = SHARED_BACKEND.get() {
        return Ok(backend.as_ref());
    }

    let backend = create_backend(Platform::current())?;
    Ok(SHARED_BACKEND.get_or_init(|| backend).as_ref())
}

/// Resolve the current user's home directory
pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(AutoLaunchError::HomeDirectoryUnavailable)
}
