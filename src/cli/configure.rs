//! Configure command implementation.

use clap::Args;
use helper_codesign::config::{BuildEnv, Settings};
use helper_codesign::{pipeline, Codesign, Error};
use std::path::PathBuf;

/// Patch the app and helper property lists for the current signing identity.
///
/// Every input defaults to the Xcode build setting of the same name, so the
/// build phase runs the tool without arguments.
#[derive(Args, Debug)]
pub struct ConfigureCmd {
    /// Directory for the scratch signing file.
    #[arg(long, env = "BUILT_PRODUCTS_DIR", value_name = "DIR")]
    pub built_products_dir: Option<PathBuf>,

    /// Code signing identity used by the build.
    #[arg(long, env = "CODE_SIGN_IDENTITY", value_name = "IDENTITY")]
    pub code_sign_identity: Option<String>,

    /// Main app Info.plist.
    #[arg(long, env = "PRODUCT_SETTINGS_PATH", value_name = "PATH")]
    pub product_settings_path: Option<PathBuf>,

    /// Product name, used to derive the bundle id.
    #[arg(long, env = "PRODUCT_NAME", value_name = "NAME")]
    pub product_name: Option<String>,

    /// Main app bundle identifier.
    #[arg(long, env = "PRODUCT_BUNDLE_IDENTIFIER", value_name = "ID")]
    pub product_bundle_identifier: Option<String>,

    /// Project root the helper plist paths are relative to.
    #[arg(long, env = "PROJECT_DIR", value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Settings file (default: <PROJECT_DIR>/helper-codesign.toml if present).
    #[arg(long, env = "HELPER_CODESIGN_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Helper Info.plist, relative to the project directory.
    #[arg(long, value_name = "PATH")]
    pub helper_info: Option<PathBuf>,

    /// Helper launchd descriptor, relative to the project directory.
    #[arg(long, value_name = "PATH")]
    pub helper_launchd: Option<PathBuf>,

    /// Helper identifier, when it is not <bundle-id>.helper.
    #[arg(long, env = "HELPER_CODESIGN_HELPER_NAME", value_name = "ID")]
    pub helper_name: Option<String>,

    /// Signing tool to invoke.
    #[arg(long, env = "HELPER_CODESIGN_TOOL", value_name = "PROGRAM")]
    pub codesign: Option<String>,

    /// Append diagnostics to /tmp/_helper_codesign.log.
    ///
    /// The environment form accepts Xcode-style values (YES/NO, 1/0, true/false).
    #[arg(
        long,
        env = "HELPER_CODESIGN_DEBUG",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub debug_log: bool,
}

impl ConfigureCmd {
    /// Execute the configure command.
    pub fn run(self) -> helper_codesign::Result<()> {
        let settings = self.settings()?;
        let env = self.build_env();
        let signer = Codesign::new(settings.codesign.clone());

        let report = pipeline::run(&env, &settings, &signer)?;

        println!(
            "Configured helper {} for {}",
            report.ids.helper_id, report.ids.bundle_id
        );
        println!("  {}", report.app_info_plist.display());
        println!("  {}", report.helper_info_plist.display());
        println!("  {}", report.helper_launchd_plist.display());

        Ok(())
    }

    fn build_env(&self) -> BuildEnv {
        BuildEnv {
            built_products_dir: self.built_products_dir.clone(),
            code_sign_identity: self.code_sign_identity.clone(),
            product_settings_path: self.product_settings_path.clone(),
            product_name: self.product_name.clone(),
            product_bundle_identifier: self.product_bundle_identifier.clone(),
            project_dir: self.project_dir.clone(),
        }
        .normalized()
    }

    /// Settings file values with command line overrides applied.
    fn settings(&self) -> helper_codesign::Result<Settings> {
        let mut settings = match (&self.config, &self.project_dir) {
            (Some(path), _) => {
                if !path.is_file() {
                    return Err(Error::Config(format!(
                        "settings file not found: {}",
                        path.display()
                    )));
                }
                Settings::load(path)?
            }
            (None, Some(dir)) if !dir.as_os_str().is_empty() => {
                Settings::load(&Settings::default_path(dir))?
            }
            (None, _) => Settings::default(),
        };

        if let Some(ref path) = self.helper_info {
            settings.helper_info = path.clone();
        }
        if let Some(ref path) = self.helper_launchd {
            settings.helper_launchd = path.clone();
        }
        if let Some(ref name) = self.helper_name {
            settings.helper_name_override = Some(name.clone());
        }
        if let Some(ref program) = self.codesign {
            settings.codesign = program.clone();
        }

        tracing::debug!(settings = ?settings, "resolved settings");
        Ok(settings)
    }
}
