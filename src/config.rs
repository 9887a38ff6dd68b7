//! Build environment and project settings.
//!
//! [`BuildEnv`] carries the Xcode build settings the tool consumes.
//! [`Settings`] carries the per-project knobs (helper plist locations, helper
//! name override, signing tool), optionally loaded from a TOML file in the
//! project directory.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identifier codesign assigns to the scratch file, and the placeholder
/// replaced in the designated requirement.
pub const SCRATCH_IDENTIFIER: &str = "SUB_SIGNING_IDENTITY";

/// Default helper Info.plist location, relative to the project directory.
pub const DEFAULT_HELPER_INFO: &str = "Privileged Helper/helper-Info.plist";

/// Default helper launchd descriptor location, relative to the project directory.
pub const DEFAULT_HELPER_LAUNCHD: &str = "Privileged Helper/helper-Launchd.plist";

/// Default signing tool.
pub const DEFAULT_CODESIGN: &str = "codesign";

/// Suffix appended to the bundle id to name the helper.
pub const HELPER_SUFFIX: &str = "helper";

/// Settings file looked up in the project directory.
pub const SETTINGS_FILE_NAME: &str = "helper-codesign.toml";

/// Diagnostic log written when debug logging is enabled.
pub const DEBUG_LOG_PATH: &str = "/tmp/_helper_codesign.log";

/// Xcode build settings consumed by the tool.
///
/// Empty values are treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    /// `BUILT_PRODUCTS_DIR`.
    pub built_products_dir: Option<PathBuf>,
    /// `CODE_SIGN_IDENTITY`.
    pub code_sign_identity: Option<String>,
    /// `PRODUCT_SETTINGS_PATH`, the main app's Info.plist.
    pub product_settings_path: Option<PathBuf>,
    /// `PRODUCT_NAME`.
    pub product_name: Option<String>,
    /// `PRODUCT_BUNDLE_IDENTIFIER`.
    pub product_bundle_identifier: Option<String>,
    /// `PROJECT_DIR`.
    pub project_dir: Option<PathBuf>,
}

impl BuildEnv {
    /// Drop empty strings so callers only ever see meaningful values.
    pub fn normalized(mut self) -> Self {
        fn keep<T: AsRef<std::ffi::OsStr>>(v: Option<T>) -> Option<T> {
            v.filter(|s| !s.as_ref().is_empty())
        }
        self.built_products_dir = keep(self.built_products_dir);
        self.code_sign_identity = keep(self.code_sign_identity);
        self.product_settings_path = keep(self.product_settings_path);
        self.product_name = keep(self.product_name);
        self.product_bundle_identifier = keep(self.product_bundle_identifier);
        self.project_dir = keep(self.project_dir);
        self
    }

    /// The signing identity, or [`Error::MissingIdentity`].
    pub fn identity(&self) -> Result<&str> {
        self.code_sign_identity
            .as_deref()
            .ok_or(Error::MissingIdentity)
    }

    /// The build products directory.
    pub fn built_products_dir(&self) -> Result<&Path> {
        self.built_products_dir
            .as_deref()
            .ok_or(Error::MissingEnv("BUILT_PRODUCTS_DIR"))
    }

    /// The main app's Info.plist path.
    pub fn product_settings_path(&self) -> Result<&Path> {
        self.product_settings_path
            .as_deref()
            .ok_or(Error::MissingEnv("PRODUCT_SETTINGS_PATH"))
    }

    /// The product name.
    pub fn product_name(&self) -> Result<&str> {
        self.product_name
            .as_deref()
            .ok_or(Error::MissingEnv("PRODUCT_NAME"))
    }

    /// The project directory.
    pub fn project_dir(&self) -> Result<&Path> {
        self.project_dir
            .as_deref()
            .ok_or(Error::MissingEnv("PROJECT_DIR"))
    }
}

/// Per-project settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Helper Info.plist, relative to the project directory.
    pub helper_info: PathBuf,

    /// Helper launchd descriptor, relative to the project directory.
    pub helper_launchd: PathBuf,

    /// Helper executable name when it is not `<bundle-id>.helper`.
    pub helper_name_override: Option<String>,

    /// Signing tool to invoke.
    pub codesign: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            helper_info: PathBuf::from(DEFAULT_HELPER_INFO),
            helper_launchd: PathBuf::from(DEFAULT_HELPER_LAUNCHD),
            helper_name_override: None,
            codesign: DEFAULT_CODESIGN.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`.
    ///
    /// If the file doesn't exist, returns the default settings.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        Self::parse(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse settings from TOML text.
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Default settings file location for a project.
    pub fn default_path(project_dir: &Path) -> PathBuf {
        project_dir.join(SETTINGS_FILE_NAME)
    }

    /// Full path of the helper Info.plist.
    pub fn helper_info_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.helper_info)
    }

    /// Full path of the helper launchd descriptor.
    pub fn helper_launchd_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.helper_launchd)
    }

    /// Helper identifier for an app bundle id.
    ///
    /// An empty override counts as no override.
    pub fn helper_id(&self, bundle_id: &str) -> String {
        match self.helper_name_override.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}.{}", bundle_id, HELPER_SUFFIX),
        }
    }
}
