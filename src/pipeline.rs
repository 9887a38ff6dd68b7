//! The build-phase pipeline.
//!
//! Steps run strictly in order and the first error aborts the run:
//!
//! 1. resolve the designated requirement of the signing identity
//! 2. patch the main app's Info.plist
//! 3. patch the helper's Info.plist
//! 4. patch (or create) the helper's launchd descriptor

use crate::config::{BuildEnv, Settings};
use crate::error::Result;
use crate::identity::{resolve_signing_requirement, CodeSigner};
use crate::patch::{self, HelperIds};
use std::path::PathBuf;

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Identifiers written into the property lists.
    pub ids: HelperIds,
    /// Main app Info.plist.
    pub app_info_plist: PathBuf,
    /// Helper Info.plist.
    pub helper_info_plist: PathBuf,
    /// Helper launchd descriptor.
    pub helper_launchd_plist: PathBuf,
}

/// Run the whole pipeline.
pub fn run(env: &BuildEnv, settings: &Settings, signer: &dyn CodeSigner) -> Result<Report> {
    let requirement = resolve_signing_requirement(env, signer)?;

    // Checked up front so a missing PROJECT_DIR cannot leave the app plist
    // patched without its helper counterpart.
    let project_dir = env.project_dir()?;
    let helper_info_plist = settings.helper_info_path(project_dir);
    let helper_launchd_plist = settings.helper_launchd_path(project_dir);

    let ids = patch::update_app_info_plist(&requirement, env, settings)?;
    patch::update_helper_info_plist(&requirement, &helper_info_plist, &ids.bundle_id)?;
    patch::update_helper_launchd(&helper_launchd_plist, &ids.helper_id)?;

    tracing::info!(bundle_id = %ids.bundle_id, helper_id = %ids.helper_id, "helper signing configured");

    Ok(Report {
        ids,
        app_info_plist: env.product_settings_path()?.to_path_buf(),
        helper_info_plist,
        helper_launchd_plist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_HELPER_INFO, DEFAULT_HELPER_LAUNCHD, SCRATCH_IDENTIFIER};
    use crate::error::{Error, PlistRole};
    use crate::identity::fake::FakeSigner;
    use crate::patch::{AUTHORIZED_CLIENTS_KEY, PRIVILEGED_EXECUTABLES_KEY};
    use plist::{Dictionary, Value};
    use std::path::Path;

    struct Project {
        _dir: tempfile::TempDir,
        root: PathBuf,
        env: BuildEnv,
    }

    fn write_plist(path: &Path, dict: Dictionary) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        Value::Dictionary(dict).to_file_xml(path).unwrap();
    }

    fn identifier_dict(id: &str) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert("CFBundleIdentifier".to_string(), Value::from(id));
        dict
    }

    /// A project tree with the app Info.plist and, optionally, the helper's.
    fn project(with_helper_info: bool) -> Project {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let build = root.join("build");
        std::fs::create_dir_all(&build).unwrap();

        let app_plist = root.join("App/Info.plist");
        write_plist(
            &app_plist,
            identifier_dict("com.example.$(PRODUCT_NAME:rfc1034identifier)"),
        );
        if with_helper_info {
            write_plist(
                &root.join(DEFAULT_HELPER_INFO),
                identifier_dict("com.example.App.helper"),
            );
        }

        let env = BuildEnv {
            built_products_dir: Some(build),
            code_sign_identity: Some("Apple Development".to_string()),
            product_settings_path: Some(app_plist),
            product_name: Some("App".to_string()),
            product_bundle_identifier: None,
            project_dir: Some(root.clone()),
        };

        Project {
            _dir: dir,
            root,
            env,
        }
    }

    fn read(path: &Path) -> Dictionary {
        Value::from_file(path).unwrap().into_dictionary().unwrap()
    }

    #[test]
    fn test_run_patches_all_three_plists() {
        let project = project(true);
        let signer = FakeSigner::new();

        let report = run(&project.env, &Settings::default(), &signer).unwrap();

        assert_eq!(report.ids.bundle_id, "com.example.App");
        assert_eq!(report.ids.helper_id, "com.example.App.helper");
        assert_eq!(report.helper_launchd_plist, project.root.join(DEFAULT_HELPER_LAUNCHD));

        let app = read(&report.app_info_plist);
        let executables = app
            .get(PRIVILEGED_EXECUTABLES_KEY)
            .and_then(Value::as_dictionary)
            .unwrap();
        let app_req = executables
            .get("com.example.App.helper")
            .and_then(Value::as_string)
            .unwrap();

        let helper = read(&report.helper_info_plist);
        let helper_req = helper
            .get(AUTHORIZED_CLIENTS_KEY)
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .and_then(Value::as_string)
            .unwrap();

        assert!(app_req.contains("\"com.example.App.helper\""));
        assert!(helper_req.contains("\"com.example.App\""));
        for req in [app_req, helper_req] {
            assert!(!req.contains(SCRATCH_IDENTIFIER));
        }

        let launchd = read(&report.helper_launchd_plist);
        assert_eq!(
            launchd.get("Label").and_then(Value::as_string),
            Some("com.example.App.helper")
        );
    }

    #[test]
    fn test_missing_identity_modifies_nothing() {
        let mut project = project(true);
        project.env.code_sign_identity = None;
        let app_plist = project.env.product_settings_path.clone().unwrap();
        let before = std::fs::read(&app_plist).unwrap();
        let signer = FakeSigner::new();

        let err = run(&project.env, &Settings::default(), &signer).unwrap_err();

        assert!(matches!(err, Error::MissingIdentity));
        assert!(signer.calls.borrow().is_empty());
        assert_eq!(std::fs::read(&app_plist).unwrap(), before);
        assert!(!project.root.join(DEFAULT_HELPER_LAUNCHD).exists());
    }

    #[test]
    fn test_missing_helper_plist_stops_before_launchd() {
        let project = project(false);
        let signer = FakeSigner::new();

        let err = run(&project.env, &Settings::default(), &signer).unwrap_err();

        assert!(matches!(
            err,
            Error::PlistNotFound {
                role: PlistRole::HelperInfo,
                ..
            }
        ));
        assert!(!project.root.join(DEFAULT_HELPER_LAUNCHD).exists());
    }

    #[test]
    fn test_missing_project_dir_modifies_nothing() {
        let mut project = project(true);
        project.env.project_dir = None;
        let app_plist = project.env.product_settings_path.clone().unwrap();
        let before = std::fs::read(&app_plist).unwrap();

        let err = run(&project.env, &Settings::default(), &FakeSigner::new()).unwrap_err();

        assert!(matches!(err, Error::MissingEnv("PROJECT_DIR")));
        assert_eq!(std::fs::read(&app_plist).unwrap(), before);
    }

    #[test]
    fn test_custom_helper_locations() {
        let project = project(false);
        write_plist(
            &project.root.join("Helper/Info.plist"),
            identifier_dict("com.example.App.helper"),
        );
        let settings = Settings {
            helper_info: PathBuf::from("Helper/Info.plist"),
            helper_launchd: PathBuf::from("Helper/Launchd.plist"),
            ..Default::default()
        };

        let report = run(&project.env, &settings, &FakeSigner::new()).unwrap();

        assert_eq!(report.helper_launchd_plist, project.root.join("Helper/Launchd.plist"));
        assert!(report.helper_launchd_plist.is_file());
    }
}
