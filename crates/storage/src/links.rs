//! Signed download links served by the API's `/files` route.

use std::time::Duration;

use analysis_core::signing::{sign_download, verify_download};
use chrono::Utc;

/// Issues and checks `{base}/files/{path}?expires=..&signature=..` links.
#[derive(Debug, Clone)]
pub struct LinkSigner {
    public_base_url: String,
    secret: String,
}

impl LinkSigner {
    pub fn new(public_base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            public_base_url,
            secret: secret.into(),
        }
    }

    pub fn url(&self, path: &str, ttl: Duration) -> String {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp().saturating_add(ttl_secs);
        self.url_expiring_at(path, expires)
    }

    pub fn url_expiring_at(&self, path: &str, expires: i64) -> String {
        let signature = sign_download(&self.secret, path, expires);
        format!(
            "{}/files/{path}?expires={expires}&signature={signature}",
            self.public_base_url
        )
    }

    /// Check `signature` for `path` and reject expired links.
    pub fn verify(
        &self,
        path: &str,
        expires: i64,
        signature: &str,
    ) -> Result<(), analysis_core::error::CoreError> {
        verify_download(&self.secret, path, expires, signature, Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        url.split(['?', '&'])
            .find_map(|pair| pair.strip_prefix(&format!("{name}=")))
            .unwrap()
    }

    #[test]
    fn issued_link_verifies() {
        let signer = LinkSigner::new("http://localhost:3000/", "secret");
        let url = signer.url("survival_analysis/1_data.csv", Duration::from_secs(60));

        assert!(url.starts_with("http://localhost:3000/files/survival_analysis/1_data.csv?"));
        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        let signature = query_param(&url, "signature");
        assert!(signer
            .verify("survival_analysis/1_data.csv", expires, signature)
            .is_ok());
    }

    #[test]
    fn tampered_path_or_expiry_rejected() {
        let signer = LinkSigner::new("http://localhost:3000", "secret");
        let expires = Utc::now().timestamp() + 60;
        let url = signer.url_expiring_at("a/1_x.csv", expires);
        let signature = query_param(&url, "signature");

        assert!(signer.verify("a/1_y.csv", expires, signature).is_err());
        assert!(signer.verify("a/1_x.csv", expires + 1, signature).is_err());
    }

    #[test]
    fn expired_link_rejected() {
        let signer = LinkSigner::new("http://localhost:3000", "secret");
        let expires = Utc::now().timestamp() - 1;
        let url = signer.url_expiring_at("a/1_x.csv", expires);
        assert!(signer
            .verify("a/1_x.csv", expires, query_param(&url, "signature"))
            .is_err());
    }
}
