//! Signing identity resolution.
//!
//! The designated requirement of the current signing certificate is obtained
//! by signing an empty scratch file and asking `codesign` to print the
//! requirement it embedded. The scratch file's identifier
//! ([`SCRATCH_IDENTIFIER`]) then appears in the requirement text and is later
//! swapped for the real app or helper identifier.

use crate::config::{BuildEnv, SCRATCH_IDENTIFIER};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Marker preceding the requirement expression in `codesign -d -r -` output.
const REQUIREMENT_MARKER: &str = "=> ";

/// Seam around the external signing tool.
pub trait CodeSigner {
    /// Sign `path` with `identity`, replacing any existing signature.
    fn sign(&self, identity: &str, path: &Path) -> Result<()>;

    /// Print the designated requirement of the signed file at `path`.
    ///
    /// Returns the tool's raw stdout.
    fn designated_requirement(&self, path: &Path) -> Result<String>;
}

/// The platform `codesign` utility.
#[derive(Debug, Clone)]
pub struct Codesign {
    program: String,
}

impl Codesign {
    /// Use the signing tool at `program` (a name on `PATH` or a full path).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Display form of an invocation, for error messages.
    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }

    fn run(&self, args: &[&str], path: &Path) -> Result<String> {
        let command = self.describe(args);
        tracing::debug!(command = %command, path = %path.display(), "running signing tool");

        let output = Command::new(&self.program)
            .args(args)
            .arg(path)
            .output()
            .map_err(|e| Error::command_failed(&command, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::command_failed(
                command,
                failure_message(&stderr, &output.status),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl CodeSigner for Codesign {
    fn sign(&self, identity: &str, path: &Path) -> Result<()> {
        self.run(&["--force", "--sign", identity], path).map(|_| ())
    }

    fn designated_requirement(&self, path: &Path) -> Result<String> {
        self.run(&["-d", "-r", "-"], path)
    }
}

/// Describe a failed run from its stderr and exit status.
fn failure_message(stderr: &str, status: &impl std::fmt::Display) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        status.to_string()
    } else {
        format!("{} ({})", stderr, status)
    }
}

/// Designated requirement of the build's signing certificate.
///
/// Still references [`SCRATCH_IDENTIFIER`]; use
/// [`for_identifier`](Self::for_identifier) to produce a requirement for a
/// real bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequirement(String);

impl SigningRequirement {
    /// Extract the requirement from `codesign -d -r -` output.
    ///
    /// Takes the text between the first `=> ` and the next one (if any),
    /// with trailing line breaks removed.
    pub fn parse(output: &str) -> Option<Self> {
        let text = output.split(REQUIREMENT_MARKER).nth(1)?;
        let text = text.trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            return None;
        }
        Some(Self(text.to_string()))
    }

    /// The requirement text as reported by the signing tool.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The requirement with the scratch identifier replaced by `identifier`.
    pub fn for_identifier(&self, identifier: &str) -> String {
        self.0.replace(SCRATCH_IDENTIFIER, identifier)
    }
}

impl std::fmt::Display for SigningRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Empty file that is removed when dropped.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn create(dir: &Path) -> Result<Self> {
        let path = dir.join(SCRATCH_IDENTIFIER);
        std::fs::write(&path, b"")?;
        Ok(Self { path })
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove scratch file");
            }
        }
    }
}

/// Resolve the designated requirement for the build's signing identity.
///
/// Fails with [`Error::MissingIdentity`] before touching the filesystem if
/// no identity is configured.
pub fn resolve_signing_requirement(
    env: &BuildEnv,
    signer: &dyn CodeSigner,
) -> Result<SigningRequirement> {
    let identity = env.identity()?;
    let build_dir = env.built_products_dir()?;

    tracing::info!(identity = %identity, "resolving signing requirement");

    let scratch = ScratchFile::create(build_dir)?;
    signer.sign(identity, &scratch.path)?;
    let output = signer.designated_requirement(&scratch.path)?;

    let requirement =
        SigningRequirement::parse(&output).ok_or_else(|| Error::UnexpectedOutput {
            command: "codesign -d -r -".to_string(),
            output: output.clone(),
        })?;

    tracing::debug!(requirement = %requirement, "resolved signing requirement");
    Ok(requirement)
}
