use anyhow::Result;

/// External persistent storage for provider credentials, keyed by provider id.
pub trait SecretStore {
    fn get_secret(&self, provider: &str) -> Option<String>;

    fn set_secret(&self, provider: &str, secret: &str) -> Result<()>;
}
