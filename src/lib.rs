//! Per-user login items for Linux, Windows and macOS.
//!
//! One contract, three native mechanisms:
//! - Linux: a freedesktop entry in `~/.config/autostart`
//! - Windows: a `HKEY_CURRENT_USER` Run value plus its Task Manager override
//! - macOS: a launch agent plist, or a System Events login item via `osascript`
//!
//! The native store is the only source of truth. Nothing is cached between
//! calls and every call blocks the calling thread until the native operation
//! completes.
//!
//! # Example
//!
//! ```no_run
//! use autolaunch::AppDescriptor;
//!
//! fn main() -> autolaunch::Result<()> {
//!     let app = AppDescriptor::builder()
//!         .name("Everything")
//!         .executable("/Applications/Everything.app/Contents/MacOS/Everything")
//!         .arg("--minimized")
//!         // macOS only: write a launch agent instead of a login item
//!         .use_launch_agent(true)
//!         .build()?;
//!
//!     app.enable()?;
//!     assert!(app.is_enabled()?);
//!     app.toggle()?;
//!     app.disable()?;
//!     Ok(())
//! }
//! ```
//!
//! Callers that prefer to pass the backend around explicitly can build one
//! with [`platform::create_backend`] and call the [`Backend`] methods on it.

pub mod descriptor;
pub mod error;
pub mod platform;

// Re-export commonly used types
pub use descriptor::{AppDescriptor, AppDescriptorBuilder};
pub use error::{AutoLaunchError, Result};
pub use platform::{Backend, Platform, create_backend, shared_backend};
