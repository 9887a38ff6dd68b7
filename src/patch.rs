//! Property list edits.
//!
//! Each function loads one document, applies its edit and writes it back.

use crate::config::{BuildEnv, Settings};
use crate::document::PlistDocument;
use crate::error::{Error, PlistRole, Result};
use crate::identity::SigningRequirement;
use plist::{Dictionary, Value};
use std::path::Path;

/// App Info.plist key mapping helper ids to their requirements.
pub const PRIVILEGED_EXECUTABLES_KEY: &str = "SMPrivilegedExecutables";

/// Helper Info.plist key listing requirements of allowed clients.
pub const AUTHORIZED_CLIENTS_KEY: &str = "SMAuthorizedClients";

/// Bundle identifier key.
pub const BUNDLE_IDENTIFIER_KEY: &str = "CFBundleIdentifier";

/// launchd job label key.
pub const LABEL_KEY: &str = "Label";

/// launchd Mach service registration key.
pub const MACH_SERVICES_KEY: &str = "MachServices";

/// Identifiers of the app and its helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperIds {
    /// The main app's bundle identifier.
    pub bundle_id: String,
    /// The helper tool's identifier.
    pub helper_id: String,
}

/// Derive a bundle id from an Info.plist `CFBundleIdentifier` and the product name.
///
/// The identifier is cut at its first unresolved `$(...)` macro and trailing
/// dots are dropped before the product name is appended.
pub fn derive_bundle_id(plist_identifier: &str, product_name: &str) -> String {
    let prefix = match plist_identifier.find('$') {
        Some(idx) => &plist_identifier[..idx],
        None => plist_identifier,
    };
    format!("{}.{}", prefix.trim_end_matches('.'), product_name)
}

/// Write the helper's requirement into the main app's Info.plist.
///
/// Uses `PRODUCT_BUNDLE_IDENTIFIER` when set, otherwise derives the bundle id
/// from the plist itself.
pub fn update_app_info_plist(
    requirement: &SigningRequirement,
    env: &BuildEnv,
    settings: &Settings,
) -> Result<HelperIds> {
    let path = env.product_settings_path()?;
    let mut doc = PlistDocument::open(path, PlistRole::AppInfo)?;

    let bundle_id = match env.product_bundle_identifier.as_deref() {
        Some(id) => id.to_string(),
        None => {
            let identifier =
                doc.get_str(BUNDLE_IDENTIFIER_KEY)
                    .ok_or_else(|| Error::MissingKey {
                        key: BUNDLE_IDENTIFIER_KEY,
                        path: path.to_path_buf(),
                    })?;
            let derived = derive_bundle_id(identifier, env.product_name()?);
            tracing::debug!(from = %identifier, bundle_id = %derived, "derived bundle id");
            derived
        }
    };
    let helper_id = settings.helper_id(&bundle_id);

    let mut executables = Dictionary::new();
    executables.insert(
        helper_id.clone(),
        Value::from(requirement.for_identifier(&helper_id)),
    );
    doc.set(PRIVILEGED_EXECUTABLES_KEY, Value::Dictionary(executables));

    tracing::debug!(path = %path.display(), contents = %doc.to_xml_string(), "app Info.plist");
    doc.save()?;

    Ok(HelperIds {
        bundle_id,
        helper_id,
    })
}

/// Authorize the app as a client in the helper's Info.plist.
pub fn update_helper_info_plist(
    requirement: &SigningRequirement,
    path: &Path,
    bundle_id: &str,
) -> Result<()> {
    let mut doc = PlistDocument::open(path, PlistRole::HelperInfo)?;

    let client = Value::from(requirement.for_identifier(bundle_id));
    doc.set(AUTHORIZED_CLIENTS_KEY, Value::Array(vec![client]));

    tracing::debug!(path = %path.display(), contents = %doc.to_xml_string(), "helper Info.plist");
    doc.save()
}

/// Point the helper's launchd descriptor at `helper_id`.
///
/// Creates the descriptor if it does not exist; other keys are kept.
pub fn update_helper_launchd(path: &Path, helper_id: &str) -> Result<()> {
    let mut doc = PlistDocument::open_or_default(path)?;

    let mut services = Dictionary::new();
    services.insert(helper_id.to_string(), Value::Boolean(true));
    doc.set(LABEL_KEY, helper_id);
    doc.set(MACH_SERVICES_KEY, Value::Dictionary(services));

    tracing::debug!(path = %path.display(), contents = %doc.to_xml_string(), "helper launchd.plist");
    doc.save()
}
