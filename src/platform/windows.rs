use crate::descriptor::AppDescriptor;
use crate::error::{AutoLaunchError, Result};
use crate::platform::Backend;
use std::io::{self, ErrorKind};

/// Values under this key are started by Explorer at login
pub const RUN_KEY: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\Run";

/// Task Manager's per-entry enabled/disabled override for [`RUN_KEY`]
pub const STARTUP_APPROVED_KEY: &str =
    r"SOFTWARE\Microsoft\Windows\CurrentVersion\Explorer\StartupApproved\Run";

/// Marks an entry as enabled in Task Manager's Startup tab
const STARTUP_APPROVED_ENABLED: [u8; 12] = [
    0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Access to the current user's registry hive.
///
/// A missing key or value must surface as [`ErrorKind::NotFound`]; the
/// backend relies on that to tell "not registered" apart from real failures.
pub trait RegistryStore: Send + Sync {
    fn get_string(&self, key: &str, name: &str) -> io::Result<String>;

    /// Write a string value, creating `key` if needed
    fn set_string(&self, key: &str, name: &str, value: &str) -> io::Result<()>;

    fn get_binary(&self, key: &str, name: &str) -> io::Result<Vec<u8>>;

    /// Write a binary value, creating `key` if needed
    fn set_binary(&self, key: &str, name: &str, value: &[u8]) -> io::Result<()>;

    fn delete_value(&self, key: &str, name: &str) -> io::Result<()>;
}

/// Starts applications through the `HKEY_CURRENT_USER` Run key
pub struct WindowsBackend {
    registry: Box<dyn RegistryStore>,
}

impl WindowsBackend {
    pub fn new(registry: impl RegistryStore + 'static) -> Self {
        Self {
            registry: Box::new(registry),
        }
    }

    #[cfg(target_os = "windows")]
    pub fn for_current_user() -> Self {
        Self::new(CurrentUserRegistry)
    }

    fn is_approved_in_task_manager(&self, app: &AppDescriptor) -> io::Result<bool> {
        let value = self.registry.get_binary(STARTUP_APPROVED_KEY, app.name())?;
        Ok(startup_approved_allows_launch(&value))
    }
}

impl std::fmt::Debug for WindowsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsBackend").finish_non_exhaustive()
    }
}

/// Whether a StartupApproved value leaves the entry enabled.
///
/// Task Manager flips the leading bytes when the user disables an entry and
/// stamps the trailing eight bytes with the time of that change, so only the
/// trailing eight bytes are inspected.
pub fn startup_approved_allows_launch(value: &[u8]) -> bool {
    value.len() >= 8 && value[value.len() - 8..].iter().all(|&b| b == 0)
}

impl Backend for WindowsBackend {
    fn enable(&self, app: &AppDescriptor) -> Result<()> {
        let command = app.startup_command(true);
        tracing::debug!("Writing Run value {} = {}", app.name(), command);

        self.registry
            .set_string(RUN_KEY, app.name(), &command)
            .map_err(|e| AutoLaunchError::registry("Failed to set Run value", e))?;
        self.registry
            .set_binary(STARTUP_APPROVED_KEY, app.name(), &STARTUP_APPROVED_ENABLED)
            .map_err(|e| AutoLaunchError::registry("Failed to set StartupApproved value", e))?;

        tracing::info!("Enabled autostart for {}", app.name());
        Ok(())
    }

    fn disable(&self, app: &AppDescriptor) -> Result<()> {
        match self.registry.delete_value(RUN_KEY, app.name()) {
            Ok(()) => {
                tracing::info!("Disabled autostart for {}", app.name());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No Run value for {}, nothing to remove", app.name());
                Ok(())
            }
            Err(e) => Err(AutoLaunchError::registry("Failed to delete Run value", e)),
        }
    }

    fn is_enabled(&self, app: &AppDescriptor) -> Result<bool> {
        let registered = self
            .registry
            .get_string(RUN_KEY, app.name())
            .and_then(|_| self.is_approved_in_task_manager(app));

        match registered {
            Ok(enabled) => Ok(enabled),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No startup entry for {}: {}", app.name(), e);
                Ok(false)
            }
            Err(e) => Err(AutoLaunchError::registry("Failed to read startup entry", e)),
        }
    }
}

#[cfg(target_os = "windows")]
mod hkcu {
    use super::RegistryStore;
    use std::io;
    use winreg::enums::*;
    use winreg::{RegKey, RegValue};

    /// [`RegistryStore`] backed by `HKEY_CURRENT_USER`
    #[derive(Debug, Clone, Copy, Default)]
    pub struct CurrentUserRegistry;

    impl RegistryStore for CurrentUserRegistry {
        fn get_string(&self, key: &str, name: &str) -> io::Result<String> {
            let hkcu = RegKey::predef(HKEY_CURRENT_USER);
            hkcu.open_subkey_with_flags(key, KEY_READ)?.get_value(name)
        }

        fn set_string(&self, key: &str, name: &str, value: &str) -> io::Result<()> {
            let hkcu = RegKey::predef(HKEY_CURRENT_USER);
            let (key, _) = hkcu.create_subkey(key)?;
            key.set_value(name, &value.to_string())
        }

        fn get_binary(&self, key: &str, name: &str) -> io::Result<Vec<u8>> {
            let hkcu = RegKey::predef(HKEY_CURRENT_USER);
            let value = hkcu
                .open_subkey_with_flags(key, KEY_READ)?
                .get_raw_value(name)?;
            Ok(value.bytes)
        }

        fn set_binary(&self, key: &str, name: &str, value: &[u8]) -> io::Result<()> {
            let hkcu = RegKey::predef(HKEY_CURRENT_USER);
            let (key, _) = hkcu.create_subkey(key)?;
            key.set_raw_value(
                name,
                &RegValue {
                    bytes: value.to_vec(),
                    vtype: REG_BINARY,
                },
            )
        }

        fn delete_value(&self, key: &str, name: &str) -> io::Result<()> {
            let hkcu = RegKey::predef(HKEY_CURRENT_USER);
            hkcu.open_subkey_with_flags(key, KEY_SET_VALUE)?
                .delete_value(name)
        }
    }
}

#[cfg(target_os = "windows")]
pub use hkcu::CurrentUserRegistry;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Stored {
        String(String),
        Binary(Vec<u8>),
    }

    /// In-memory hive keyed by (key, value name)
    #[derive(Default, Clone)]
    struct MemoryRegistry {
        values: Arc<Mutex<HashMap<(String, String), Stored>>>,
        fail_with: Arc<Mutex<Option<ErrorKind>>>,
    }

    impl MemoryRegistry {
        fn get(&self, key: &str, name: &str) -> io::Result<Stored> {
            if let Some(kind) = *self.fail_with.lock().unwrap() {
                return Err(io::Error::from(kind));
            }
            self.values
                .lock()
                .unwrap()
                .get(&(key.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| io::Error::from(ErrorKind::NotFound))
        }

        fn put(&self, key: &str, name: &str, value: Stored) -> io::Result<()> {
            if let Some(kind) = *self.fail_with.lock().unwrap() {
                return Err(io::Error::from(kind));
            }
            self.values
                .lock()
                .unwrap()
                .insert((key.to_string(), name.to_string()), value);
            Ok(())
        }
    }

    impl RegistryStore for MemoryRegistry {
        fn get_string(&self, key: &str, name: &str) -> io::Result<String> {
            match self.get(key, name)? {
                Stored::String(s) => Ok(s),
                Stored::Binary(_) => Err(io::Error::from(ErrorKind::InvalidData)),
            }
        }

        fn set_string(&self, key: &str, name: &str, value: &str) -> io::Result<()> {
            self.put(key, name, Stored::String(value.to_string()))
        }

        fn get_binary(&self, key: &str, name: &str) -> io::Result<Vec<u8>> {
            match self.get(key, name)? {
                Stored::Binary(b) => Ok(b),
                Stored::String(_) => Err(io::Error::from(ErrorKind::InvalidData)),
            }
        }

        fn set_binary(&self, key: &str, name: &str, value: &[u8]) -> io::Result<()> {
            self.put(key, name, Stored::Binary(value.to_vec()))
        }

        fn delete_value(&self, key: &str, name: &str) -> io::Result<()> {
            if let Some(kind) = *self.fail_with.lock().unwrap() {
                return Err(io::Error::from(kind));
            }
            self.values
                .lock()
                .unwrap()
                .remove(&(key.to_string(), name.to_string()))
                .map(|_| ())
                .ok_or_else(|| io::Error::from(ErrorKind::NotFound))
        }
    }

    fn fixture() -> (tempfile::NamedTempFile, MemoryRegistry, WindowsBackend, AppDescriptor) {
        let exe = tempfile::NamedTempFile::new().unwrap();
        let app = AppDescriptor::builder()
            .name("TestApp")
            .executable(exe.path())
            .arg("--flag")
            .build()
            .unwrap();
        let registry = MemoryRegistry::default();
        let backend = WindowsBackend::new(registry.clone());
        (exe, registry, backend, app)
    }

    #[test]
    fn test_startup_approved_predicate() {
        assert!(!startup_approved_allows_launch(&[]));
        assert!(!startup_approved_allows_launch(&[0; 7]));
        assert!(startup_approved_allows_launch(&[0; 8]));
        assert!(startup_approved_allows_launch(&STARTUP_APPROVED_ENABLED));
        assert!(startup_approved_allows_launch(&[
            0x03, 0xff, 0x10, 0x7f, 0, 0, 0, 0, 0, 0, 0, 0
        ]));
        assert!(!startup_approved_allows_launch(&[
            0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01
        ]));
        assert!(!startup_approved_allows_launch(&[
            0x03, 0, 0, 0, 0x9a, 0x3c, 0x11, 0x28, 0x5e, 0xd2, 0xda, 0x01
        ]));
    }

    #[test]
    fn test_enable_writes_both_values() {
        let (exe, registry, backend, app) = fixture();
        backend.enable(&app).unwrap();

        assert_eq!(
            registry.get_string(RUN_KEY, "TestApp").unwrap(),
            format!("\"{}\" --flag", exe.path().display())
        );
        assert_eq!(
            registry.get_binary(STARTUP_APPROVED_KEY, "TestApp").unwrap(),
            STARTUP_APPROVED_ENABLED
        );
        assert!(backend.is_enabled(&app).unwrap());
    }

    #[test]
    fn test_enable_overwrites_user_disabled_override() {
        let (_exe, registry, backend, app) = fixture();
        registry
            .set_binary(STARTUP_APPROVED_KEY, "TestApp", &[0x03, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8])
            .unwrap();
        registry.set_string(RUN_KEY, "TestApp", "stale").unwrap();
        assert!(!backend.is_enabled(&app).unwrap());

        backend.enable(&app).unwrap();
        assert!(backend.is_enabled(&app).unwrap());
        assert_ne!(registry.get_string(RUN_KEY, "TestApp").unwrap(), "stale");
    }

    #[test]
    fn test_missing_run_value_is_not_enabled() {
        let (_exe, registry, backend, app) = fixture();
        assert!(!backend.is_enabled(&app).unwrap());

        backend.enable(&app).unwrap();
        registry.delete_value(RUN_KEY, "TestApp").unwrap();

        // the override stays behind but is not enough on its own
        assert!(registry.get_binary(STARTUP_APPROVED_KEY, "TestApp").is_ok());
        assert!(!backend.is_enabled(&app).unwrap());
    }

    #[test]
    fn test_missing_override_is_not_enabled() {
        let (_exe, registry, backend, app) = fixture();
        registry.set_string(RUN_KEY, "TestApp", "\"app\"").unwrap();
        assert!(!backend.is_enabled(&app).unwrap());
    }

    #[test]
    fn test_disable_removes_only_run_value() {
        let (_exe, registry, backend, app) = fixture();
        backend.enable(&app).unwrap();
        backend.disable(&app).unwrap();

        assert!(!backend.is_enabled(&app).unwrap());
        assert_eq!(
            registry.get_string(RUN_KEY, "TestApp").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(registry.get_binary(STARTUP_APPROVED_KEY, "TestApp").is_ok());
    }

    #[test]
    fn test_disable_when_not_enabled() {
        let (_exe, _registry, backend, app) = fixture();
        backend.disable(&app).unwrap();
        backend.disable(&app).unwrap();
    }

    #[test]
    fn test_other_registry_errors_propagate() {
        let (_exe, registry, backend, app) = fixture();
        *registry.fail_with.lock().unwrap() = Some(ErrorKind::PermissionDenied);

        assert!(matches!(
            backend.disable(&app).unwrap_err(),
            AutoLaunchError::Registry { .. }
        ));
        assert!(matches!(
            backend.is_enabled(&app).unwrap_err(),
            AutoLaunchError::Registry { .. }
        ));
        assert!(matches!(
            backend.enable(&app).unwrap_err(),
            AutoLaunchError::Registry { .. }
        ));
    }

    #[test]
    fn test_enable_twice_and_toggle() {
        let (_exe, _registry, backend, app) = fixture();
        backend.enable(&app).unwrap();
        backend.enable(&app).unwrap();
        assert!(backend.is_enabled(&app).unwrap());

        assert!(!backend.toggle(&app).unwrap());
        assert!(backend.toggle(&app).unwrap());
        assert!(backend.is_enabled(&app).unwrap());
    }
}
