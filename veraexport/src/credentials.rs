//! Veracode API credentials and client configuration
//!
//! Credentials come from `VERACODE_API_KEY_ID` / `VERACODE_API_KEY_SECRET` when both
//! are set, otherwise from the Veracode credentials file (`~/.veracode/credentials`
//! or `$VERACODE_CREDENTIALS_FILE`), using the profile named by
//! `VERACODE_API_PROFILE` (default `default`):
//!
//! ```text
//! [default]
//! veracode_api_key_id = <id>
//! veracode_api_key_secret = <secret>
//! ```
//!
//! Key names are matched case-insensitively, `:` works as a separator, and a
//! `;` or `#` after whitespace starts an inline comment.
use crate::validation::Region;
use config::{Config, File, FileFormat};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use veracode_reporting::{VeracodeConfig, VeracodeCredentials};

const ENV_API_KEY_ID: &str = "VERACODE_API_KEY_ID";
const ENV_API_KEY_SECRET: &str = "VERACODE_API_KEY_SECRET";
const ENV_CREDENTIALS_FILE: &str = "VERACODE_CREDENTIALS_FILE";
const ENV_PROFILE: &str = "VERACODE_API_PROFILE";
const ENV_DISABLE_CERT_VALIDATION: &str = "VERAEXPORT_DISABLE_CERT_VALIDATION";

const FILE_KEY_ID: &str = "veracode_api_key_id";
const FILE_KEY_SECRET: &str = "veracode_api_key_secret";
const DEFAULT_PROFILE: &str = "default";

/// Custom error types for credential operations
#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    #[error("Credential validation failed: {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Missing required credentials: {missing}")]
    MissingCredentials { missing: String },

    #[error("Cannot read credentials file {path}: {source}")]
    FileError {
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("Profile '{profile}' not found in credentials file {path}")]
    ProfileNotFound { profile: String, path: PathBuf },
}

/// Validate API credential with optimized character checking
///
/// # Errors
///
/// Returns a message if the value is empty or not alphanumeric
pub fn validate_api_credential(value: &str, field_name: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{field_name} cannot be empty"));
    }

    if !value.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(format!(
            "{field_name} must contain only alphanumeric characters"
        ));
    }

    Ok(())
}

/// Drop the `vera01..-` prefix some newer API keys carry
fn strip_key_prefix(value: &str) -> &str {
    match value.split_once('-') {
        Some((prefix, rest)) if prefix.starts_with("vera01") => rest,
        _ => value,
    }
}

fn checked_credentials(
    api_id: &str,
    api_key: &str,
    id_field: &str,
    key_field: &str,
) -> Result<VeracodeCredentials, CredentialError> {
    let api_id = strip_key_prefix(api_id.trim());
    let api_key = strip_key_prefix(api_key.trim());

    validate_api_credential(api_id, id_field).map_err(|message| {
        CredentialError::ValidationError {
            field: id_field.to_string(),
            message,
        }
    })?;
    validate_api_credential(api_key, key_field).map_err(|message| {
        CredentialError::ValidationError {
            field: key_field.to_string(),
            message,
        }
    })?;

    Ok(VeracodeCredentials::new(api_id, api_key))
}

/// Load credentials from the environment or the credentials file
///
/// # Errors
///
/// Returns `CredentialError` if no source provides valid credentials
pub fn load_veracode_credentials() -> Result<VeracodeCredentials, CredentialError> {
    load_veracode_credentials_with(|name| std::env::var(name).ok(), dirs::home_dir())
}

/// Credential lookup with an injectable environment and home directory
fn load_veracode_credentials_with<F>(
    env: F,
    home_dir: Option<PathBuf>,
) -> Result<VeracodeCredentials, CredentialError>
where
    F: Fn(&str) -> Option<String>,
{
    if let (Some(api_id), Some(api_key)) = (env(ENV_API_KEY_ID), env(ENV_API_KEY_SECRET)) {
        debug!("Loading Veracode credentials from environment variables");
        let credentials =
            checked_credentials(&api_id, &api_key, ENV_API_KEY_ID, ENV_API_KEY_SECRET)?;
        info!("Loaded Veracode credentials from environment");
        return Ok(credentials);
    }

    let path = env(ENV_CREDENTIALS_FILE)
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".veracode").join("credentials")))
        .ok_or_else(|| CredentialError::MissingCredentials {
            missing: format!(
                "{ENV_API_KEY_ID}/{ENV_API_KEY_SECRET} environment variables or a credentials file"
            ),
        })?;
    let profile = env(ENV_PROFILE).unwrap_or_else(|| DEFAULT_PROFILE.to_string());

    if !path.exists() {
        return Err(CredentialError::MissingCredentials {
            missing: format!(
                "{ENV_API_KEY_ID}/{ENV_API_KEY_SECRET} environment variables or credentials file {}",
                path.display()
            ),
        });
    }

    let credentials = load_credentials_file(&path, &profile)?;
    info!(
        "Loaded Veracode credentials from {} (profile '{}')",
        path.display(),
        profile
    );
    Ok(credentials)
}

/// Read one profile of a Veracode credentials file
///
/// # Errors
///
/// Returns `CredentialError` if the file cannot be read, the profile is missing, or
/// the profile lacks valid key values
pub fn load_credentials_file(
    path: &Path,
    profile: &str,
) -> Result<VeracodeCredentials, CredentialError> {
    let file_error = |source| CredentialError::FileError {
        path: path.to_path_buf(),
        source,
    };

    let sections: HashMap<String, config::Value> = Config::builder()
        .add_source(File::from(path).format(FileFormat::Ini))
        .build()
        .and_then(|settings| settings.try_deserialize())
        .map_err(file_error)?;

    let entries = profile_entries(sections, profile).ok_or_else(|| {
        CredentialError::ProfileNotFound {
            profile: profile.to_string(),
            path: path.to_path_buf(),
        }
    })?;

    let api_id = entries
        .get(FILE_KEY_ID)
        .ok_or_else(|| CredentialError::MissingCredentials {
            missing: format!("{FILE_KEY_ID} in profile '{profile}'"),
        })?;
    let api_key = entries
        .get(FILE_KEY_SECRET)
        .ok_or_else(|| CredentialError::MissingCredentials {
            missing: format!("{FILE_KEY_SECRET} in profile '{profile}'"),
        })?;

    checked_credentials(api_id, api_key, FILE_KEY_ID, FILE_KEY_SECRET)
}

/// Values of one INI section keyed by lower-cased name, or `None` if there is no such section
fn profile_entries(
    mut sections: HashMap<String, config::Value>,
    profile: &str,
) -> Option<HashMap<String, String>> {
    let name = if sections.contains_key(profile) {
        profile.to_string()
    } else {
        sections
            .keys()
            .find(|name| name.eq_ignore_ascii_case(profile))?
            .clone()
    };
    let table = sections.remove(&name)?.into_table().ok()?;

    Some(
        table
            .into_iter()
            .filter_map(|(key, value)| {
                let value = value.into_string().ok()?;
                Some((
                    key.to_ascii_lowercase(),
                    strip_inline_comment(&value).to_string(),
                ))
            })
            .collect(),
    )
}

/// Cut a trailing `; comment` or `# comment`
fn strip_inline_comment(value: &str) -> &str {
    let end = value
        .char_indices()
        .find(|&(i, c)| (c == ';' || c == '#') && value[..i].ends_with(char::is_whitespace))
        .map_or(value.len(), |(i, _)| i);
    value[..end].trim()
}

/// Build the API client configuration for a region, applying environment overrides
#[must_use]
pub fn create_veracode_config(credentials: VeracodeCredentials, region: Region) -> VeracodeConfig {
    debug!("🔗 Creating VeracodeConfig for region {}", region);
    let config = VeracodeConfig::from_credentials(credentials).with_region(region.into());
    configure_veracode_with_env_vars(config, |name| std::env::var(name).ok())
}

/// Apply certificate and proxy settings from environment variables
fn configure_veracode_with_env_vars<F>(mut config: VeracodeConfig, env: F) -> VeracodeConfig
where
    F: Fn(&str) -> Option<String>,
{
    if env(ENV_DISABLE_CERT_VALIDATION).is_some() {
        config = config.with_certificate_validation_disabled();
        warn!(
            "⚠️  WARNING: Certificate validation disabled for Veracode API via {ENV_DISABLE_CERT_VALIDATION}"
        );
        warn!("   This should only be used in development environments!");
    }

    let proxy_url = ["HTTPS_PROXY", "https_proxy", "HTTP_PROXY", "http_proxy"]
        .iter()
        .find_map(|name| env(name));

    if let Some(url) = proxy_url {
        debug!("🔒 Proxy configuration detected from environment: {}", url);
        config = config.with_proxy(&url);

        let username = env("PROXY_USERNAME").or_else(|| env("proxy_username"));
        let password = env("PROXY_PASSWORD").or_else(|| env("proxy_password"));

        if let (Some(u), Some(p)) = (username, password) {
            debug!("🔐 Proxy authentication credentials found in environment");
            config = config.with_proxy_auth(&u, &p);
        }
    }

    config
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const CREDENTIALS_FILE: &str = "\
# Veracode API credentials
[default]
veracode_api_key_id = abc123
veracode_api_key_secret = 0123456789abcdef

[audit]
veracode_api_key_id=vera01ei-def456
veracode_api_key_secret=vera01es-fedcba9876543210
";

    fn write_credentials(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("credentials");
        fs::write(&path, content).expect("write credentials");
        path
    }

    #[test]
    fn test_validate_api_credential() {
        assert!(validate_api_credential("test123", "TEST_FIELD").is_ok());
        assert!(validate_api_credential("", "TEST_FIELD").is_err());
        assert!(validate_api_credential("test-123", "TEST_FIELD").is_err());
        assert!(validate_api_credential("test@123", "TEST_FIELD").is_err());
    }

    #[test]
    fn test_environment_takes_precedence() {
        let env = env_from(&[
            (ENV_API_KEY_ID, "envid"),
            (ENV_API_KEY_SECRET, "abcdef"),
            (ENV_CREDENTIALS_FILE, "/nonexistent/credentials"),
        ]);

        let credentials = load_veracode_credentials_with(env, None).expect("env credentials");
        assert_eq!(credentials.expose_api_id(), "envid");
        assert_eq!(credentials.expose_api_key(), "abcdef");
    }

    #[test]
    fn test_invalid_environment_value_is_rejected() {
        let env = env_from(&[(ENV_API_KEY_ID, "bad id"), (ENV_API_KEY_SECRET, "abcdef")]);

        let result = load_veracode_credentials_with(env, None);
        assert!(matches!(
            result,
            Err(CredentialError::ValidationError { ref field, .. }) if field == ENV_API_KEY_ID
        ));
    }

    #[test]
    fn test_default_profile_from_home_directory() {
        let home = TempDir::new().expect("temp dir");
        let veracode_dir = home.path().join(".veracode");
        fs::create_dir(&veracode_dir).expect("create dir");
        fs::write(veracode_dir.join("credentials"), CREDENTIALS_FILE).expect("write");

        let credentials =
            load_veracode_credentials_with(env_from(&[]), Some(home.path().to_path_buf()))
                .expect("file credentials");
        assert_eq!(credentials.expose_api_id(), "abc123");
        assert_eq!(credentials.expose_api_key(), "0123456789abcdef");
    }

    #[test]
    fn test_named_profile_strips_key_prefix() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_credentials(&dir, CREDENTIALS_FILE);
        let path_str = path.to_str().expect("utf-8 path");
        let env = env_from(&[(ENV_CREDENTIALS_FILE, path_str), (ENV_PROFILE, "audit")]);

        let credentials = load_veracode_credentials_with(env, None).expect("profile credentials");
        assert_eq!(credentials.expose_api_id(), "def456");
        assert_eq!(credentials.expose_api_key(), "fedcba9876543210");
    }

    #[test]
    fn test_missing_profile() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_credentials(&dir, CREDENTIALS_FILE);

        let result = load_credentials_file(&path, "production");
        assert!(matches!(result, Err(CredentialError::ProfileNotFound { .. })));
    }

    #[test]
    fn test_profile_without_secret() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_credentials(&dir, "[default]\nveracode_api_key_id = abc123\n");

        let result = load_credentials_file(&path, "default");
        assert!(matches!(result, Err(CredentialError::MissingCredentials { .. })));
    }

    #[test]
    fn test_colon_separator_and_key_case() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_credentials(
            &dir,
            "[default]\nveracode_api_key_id: abc123\nVERACODE_API_KEY_SECRET = 0123456789abcdef\n",
        );

        let credentials = load_credentials_file(&path, "default").expect("credentials");
        assert_eq!(credentials.expose_api_id(), "abc123");
        assert_eq!(credentials.expose_api_key(), "0123456789abcdef");
    }

    #[test]
    fn test_inline_comments_are_ignored() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_credentials(
            &dir,
            "[default]\n; production account\nveracode_api_key_id = abc123 ; prod\nveracode_api_key_secret = 0123456789abcdef # rotated 2025-01\n",
        );

        let credentials = load_credentials_file(&path, "default").expect("credentials");
        assert_eq!(credentials.expose_api_id(), "abc123");
        assert_eq!(credentials.expose_api_key(), "0123456789abcdef");
    }

    #[test]
    fn test_strip_inline_comment() {
        assert_eq!(strip_inline_comment("abc123 ; prod"), "abc123");
        assert_eq!(strip_inline_comment("abc123\t# note"), "abc123");
        assert_eq!(strip_inline_comment("abc#123"), "abc#123");
        assert_eq!(strip_inline_comment("  abc123  "), "abc123");
    }

    #[test]
    fn test_unreadable_file() {
        let dir = TempDir::new().expect("temp dir");
        let result = load_credentials_file(&dir.path().join("missing"), "default");
        assert!(matches!(result, Err(CredentialError::FileError { .. })));
    }

    #[test]
    fn test_no_source_available() {
        let home = TempDir::new().expect("temp dir");
        let result =
            load_veracode_credentials_with(env_from(&[]), Some(home.path().to_path_buf()));
        assert!(matches!(result, Err(CredentialError::MissingCredentials { .. })));
    }

    #[test]
    fn test_proxy_and_certificate_overrides() {
        let config = VeracodeConfig::new("abc123", "0123456789abcdef");
        let env = env_from(&[
            ("https_proxy", "http://proxy.internal:3128"),
            ("PROXY_USERNAME", "svc"),
            ("PROXY_PASSWORD", "secret"),
            (ENV_DISABLE_CERT_VALIDATION, "1"),
        ]);

        let config = configure_veracode_with_env_vars(config, env);
        assert_eq!(config.proxy_url.as_deref(), Some("http://proxy.internal:3128"));
        assert!(config.proxy_username.is_some());
        assert!(config.proxy_password.is_some());
        assert!(!config.validate_certificates);
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        let config = configure_veracode_with_env_vars(
            VeracodeConfig::new("abc123", "0123456789abcdef"),
            env_from(&[]),
        );
        assert!(config.proxy_url.is_none());
        assert!(config.validate_certificates);
    }

    #[test]
    fn test_region_selects_base_url() {
        let config =
            VeracodeConfig::from_credentials(VeracodeCredentials::new("abc123", "abcdef"))
                .with_region(Region::European.into());
        assert_eq!(config.base_url, "https://api.veracode.eu");
    }
}
