use std::io;
use thiserror::Error;

/// Errors raised while describing an application or touching a native startup store
#[derive(Debug, Error)]
pub enum AutoLaunchError {
    /// The descriptor is incomplete or unusable on this platform
    #[error("Invalid app descriptor: {0}")]
    Validation(String),

    /// Filesystem or process-spawn failure
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// Registry access failed for a reason other than a missing key or value
    #[error("Registry operation failed ({context}): {source}")]
    Registry {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The scripting helper ran but reported failure
    #[error("Script helper failed with {}: {stderr}", exit_code_label(.code))]
    HelperProcess { code: Option<i32>, stderr: String },

    /// No backend exists for the running operating system
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Neither `$HOME` nor the user database yields a home directory
    #[error("Could not determine the current user's home directory")]
    HomeDirectoryUnavailable,
}

impl AutoLaunchError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        AutoLaunchError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn registry(context: impl Into<String>, source: io::Error) -> Self {
        AutoLaunchError::Registry {
            context: context.into(),
            source,
        }
    }

    /// Whether this error came from descriptor validation
    pub fn is_validation(&self) -> bool {
        matches!(self, AutoLaunchError::Validation(_))
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, AutoLaunchError>;
