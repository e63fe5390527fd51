//! HTTP-facing configuration shared by the handlers.

use anyhow::{anyhow, Context, Result};
use url::Url;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    public_url: String,
    cookie_secure: bool,
    trust_forwarded_headers: bool,
}

impl ApiConfig {
    /// # Errors
    /// Returns an error if `public_url` is not an absolute URL with a host.
    pub fn new(public_url: &str) -> Result<Self> {
        let parsed =
            Url::parse(public_url).with_context(|| format!("Invalid public URL: {public_url}"))?;
        if parsed.host_str().is_none() {
            return Err(anyhow!("Public URL must include a valid host: {public_url}"));
        }

        Ok(Self {
            public_url: public_url.trim_end_matches('/').to_string(),
            // Cookies only get `Secure` when clients reach us over HTTPS.
            cookie_secure: parsed.scheme() == "https",
            trust_forwarded_headers: false,
        })
    }

    #[must_use]
    pub fn with_trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }

    #[must_use]
    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn trust_forwarded_headers(&self) -> bool {
        self.trust_forwarded_headers
    }
}
