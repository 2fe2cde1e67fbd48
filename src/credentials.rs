use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use zeroize::Zeroize;

use crate::error::{LedgerError, Result};

/// Checked in order; the second name is the one the backup job used.
pub const CREDENTIAL_ENV_VARS: &[&str] = &["GCP_SA_CREDENTIALS", "GSPREAD_SERVICE_ACCOUNT_CREDENTIALS"];

/// Service-account key document. Only the fields needed to identify the
/// account are kept.
#[derive(Deserialize)]
pub struct ServiceAccount {
    #[serde(rename = "type", default)]
    pub account_type: String,
    #[serde(default)]
    pub project_id: Option<String>,
    pub client_email: String,
    #[serde(default)]
    private_key: String,
}

impl ServiceAccount {
    pub fn has_private_key(&self) -> bool {
        !self.private_key.is_empty()
    }
}

impl Drop for ServiceAccount {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("account_type", &self.account_type)
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CredentialOrigin {
    Env(&'static str),
    File(PathBuf),
}

impl fmt::Display for CredentialOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env(var) => write!(f, "env:{var}"),
            Self::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub account: ServiceAccount,
    pub origin: CredentialOrigin,
}

/// Environment first, then the local key file.
pub fn resolve(credentials_file: &Path) -> Result<Credentials> {
    resolve_with(|var| std::env::var(var).ok(), credentials_file)
}

fn resolve_with(
    lookup: impl Fn(&str) -> Option<String>,
    credentials_file: &Path,
) -> Result<Credentials> {
    for &var in CREDENTIAL_ENV_VARS {
        let Some(mut raw) = lookup(var).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let parsed = parse_account(&raw, &format!("environment variable {var}"));
        raw.zeroize();
        let account = parsed?;
        tracing::info!(origin = %var, client_email = %account.client_email, "credentials resolved");
        return Ok(Credentials {
            account,
            origin: CredentialOrigin::Env(var),
        });
    }

    if credentials_file.exists() {
        let mut raw = std::fs::read_to_string(credentials_file)?;
        let parsed = parse_account(&raw, &credentials_file.display().to_string());
        raw.zeroize();
        let account = parsed?;
        tracing::info!(
            origin = %credentials_file.display(),
            client_email = %account.client_email,
            "credentials resolved"
        );
        return Ok(Credentials {
            account,
            origin: CredentialOrigin::File(credentials_file.to_path_buf()),
        });
    }

    Err(LedgerError::Configuration(format!(
        "no credentials: set {} or provide {}",
        CREDENTIAL_ENV_VARS.join(" / "),
        credentials_file.display()
    )))
}

fn parse_account(raw: &str, origin: &str) -> Result<ServiceAccount> {
    let account: ServiceAccount = serde_json::from_str(raw)
        .map_err(|e| LedgerError::Configuration(format!("invalid credentials in {origin}: {e}")))?;
    if !account.has_private_key() {
        tracing::warn!(%origin, "service account has no private key");
    }
    Ok(account)
}
