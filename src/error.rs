//! Error types for helper-codesign.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using helper-codesign's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Which of the three property lists an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlistRole {
    /// The main application's Info.plist.
    AppInfo,
    /// The privileged helper tool's Info.plist.
    HelperInfo,
    /// The helper tool's launchd descriptor.
    HelperLaunchd,
}

impl fmt::Display for PlistRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlistRole::AppInfo => write!(f, "main app Info.plist"),
            PlistRole::HelperInfo => write!(f, "helper Info.plist"),
            PlistRole::HelperLaunchd => write!(f, "helper launchd.plist"),
        }
    }
}

/// Errors raised while configuring the helper's signing requirements.
///
/// Every variant is fatal for the build phase; nothing is retried.
#[derive(Error, Debug)]
pub enum Error {
    // Build environment errors
    /// `CODE_SIGN_IDENTITY` is unset or empty.
    #[error("could not get the current build identity: CODE_SIGN_IDENTITY is not set")]
    MissingIdentity,

    /// A required build setting is missing from the environment.
    #[error("build setting {0} is not set")]
    MissingEnv(&'static str),

    // Property list errors
    /// A property list that must already exist was not found.
    #[error("there is no {role} at {}", path.display())]
    PlistNotFound {
        /// Which property list is missing.
        role: PlistRole,
        /// Path that was checked.
        path: PathBuf,
    },

    /// A property list could not be read or decoded.
    #[error("problem reading {}: {message}", path.display())]
    PlistRead {
        /// Path of the property list.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },

    /// A property list could not be encoded or written.
    #[error("problem writing {}: {message}", path.display())]
    PlistWrite {
        /// Path of the property list.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },

    /// A key needed to derive a value is absent or has the wrong type.
    #[error("{key} missing from {}", path.display())]
    MissingKey {
        /// The property list key.
        key: &'static str,
        /// Path of the property list.
        path: PathBuf,
    },

    // Signing tool errors
    /// External command failed.
    #[error("command failed: {command}: {message}")]
    CommandFailed {
        /// The command that failed.
        command: String,
        /// Error message.
        message: String,
    },

    /// The signing tool produced output that could not be interpreted.
    #[error("unexpected output from {command}: {output:?}")]
    UnexpectedOutput {
        /// The command whose output was rejected.
        command: String,
        /// The raw output.
        output: String,
    },

    // Configuration errors
    /// The project settings file is malformed.
    #[error("configuration error: {0}")]
    Config(String),

    // IO errors
    /// IO error wrapper.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a command failed error.
    pub fn command_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a read error for the property list at `path`.
    pub fn plist_read(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::PlistRead {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a write error for the property list at `path`.
    pub fn plist_write(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::PlistWrite {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
