//! helper-codesign: keep a privileged helper tool's signing requirements in
//! step with the certificate an Xcode build signs with.
//!
//! Run as a "Run Script" build phase, the tool reads the build's signing
//! identity, asks `codesign` for the matching designated requirement and
//! writes it into the app's `SMPrivilegedExecutables`, the helper's
//! `SMAuthorizedClients` and the helper's launchd descriptor.

pub mod config;
pub mod document;
pub mod error;
pub mod identity;
pub mod patch;
pub mod pipeline;

pub use config::{BuildEnv, Settings};
pub use error::{Error, Result};
pub use identity::{CodeSigner, Codesign, SigningRequirement};
pub use pipeline::Report;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
