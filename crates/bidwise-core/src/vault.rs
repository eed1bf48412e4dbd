use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

/// Wrapper for API keys and other sensitive strings; Debug and Display are redacted.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

pub type SecretFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + 'a>>;

/// Pluggable secret lookup.
pub trait VaultProvider: Send + Sync {
    fn get_secret(&self, key: &str) -> SecretFuture<'_>;
}

/// Reads secrets from process environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvVaultProvider;

impl VaultProvider for EnvVaultProvider {
    fn get_secret(&self, key: &str) -> SecretFuture<'_> {
        let value = std::env::var(key).ok().filter(|v| !v.is_empty());
        Box::pin(async move { Ok(value) })
    }
}

/// Fixed in-memory secrets, for tests and embedding callers.
#[derive(Default)]
pub struct StaticVaultProvider {
    secrets: HashMap<String, String>,
}

impl fmt::Debug for StaticVaultProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticVaultProvider")
            .field("secrets", &format_args!("[{} secrets]", self.secrets.len()))
            .finish()
    }
}

impl StaticVaultProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_secret(mut self, key: &str, value: &str) -> Self {
        self.secrets.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl VaultProvider for StaticVaultProvider {
    fn get_secret(&self, key: &str) -> SecretFuture<'_> {
        let result = self.secrets.get(key).cloned();
        Box::pin(async move { Ok(result) })
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn secret_expose_returns_inner() {
        let secret = Secret::new("sk-test");
        assert_eq!(secret.expose(), "sk-test");
    }

    #[test]
    fn secret_debug_and_display_are_redacted() {
        let secret = Secret::new("sk-test");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn static_vault_debug_hides_values() {
        let vault = StaticVaultProvider::new().with_secret("K", "value");
        let dbg = format!("{vault:?}");
        assert!(dbg.contains("[1 secrets]"));
        assert!(!dbg.contains("value"));
    }

    #[tokio::test]
    async fn static_vault_lookup() {
        let vault = StaticVaultProvider::new().with_secret("A", "1");
        assert_eq!(vault.get_secret("A").await.unwrap().as_deref(), Some("1"));
        assert!(vault.get_secret("B").await.unwrap().is_none());
    }

    #[tokio::test]
    #[serial]
    async fn env_vault_reads_and_skips_empty() {
        let key = "BIDWISE_TEST_VAULT_SECRET";
        unsafe { std::env::set_var(key, "test-value") };
        assert_eq!(
            EnvVaultProvider.get_secret(key).await.unwrap().as_deref(),
            Some("test-value")
        );
        unsafe { std::env::set_var(key, "") };
        assert!(EnvVaultProvider.get_secret(key).await.unwrap().is_none());
        unsafe { std::env::remove_var(key) };
        assert!(EnvVaultProvider.get_secret(key).await.unwrap().is_none());
    }
}
