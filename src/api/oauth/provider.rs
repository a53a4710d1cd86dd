//! Shopify OAuth endpoints and shop domain rules.

use crate::config::Config;
use secrecy::SecretString;

/// Shopify app configuration as seen by the OAuth flow
pub struct ShopifyProvider {
    /// Client ID (API key)
    pub client_id: String,

    /// Client secret (API secret key)
    pub client_secret: SecretString,

    /// Scopes requested on install
    pub scopes: Vec<String>,

    /// Callback URL the platform redirects back to
    pub redirect_uri: String,

    shop_domain_suffix: String,
    platform_base_url: Option<String>,
}

impl ShopifyProvider {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client_id: config.shopify.client_id.clone(),
            client_secret: config.shopify.client_secret.clone(),
            scopes: config.shopify.scopes.clone(),
            redirect_uri: config.callback_url(),
            shop_domain_suffix: config.shopify.shop_domain_suffix.clone(),
            platform_base_url: config
                .shopify
                .platform_base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    fn shop_base_url(&self, shop: &str) -> String {
        match &self.platform_base_url {
            Some(base) => base.clone(),
            None => format!("https://{}", shop),
        }
    }

    /// Build authorization URL with state and redirect_uri
    pub fn build_auth_url(&self, shop: &str, state: &str) -> String {
        let scopes = self.scopes.join(",");
        format!(
            "{}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state={}",
            self.shop_base_url(shop),
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&scopes),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state)
        )
    }

    /// Token exchange endpoint for `shop`
    pub fn token_url(&self, shop: &str) -> String {
        format!("{}/admin/oauth/access_token", self.shop_base_url(shop))
    }

    /// Check that `shop` is a bare `<name><suffix>` hostname.
    ///
    /// The client secret is POSTed to this host during the exchange, so
    /// anything else (paths, ports, userinfo, foreign domains) is refused.
    pub fn is_valid_shop_domain(&self, shop: &str) -> bool {
        let Some(name) = shop.strip_suffix(self.shop_domain_suffix.as_str()) else {
            return false;
        };

        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphanumeric() => {}
            _ => return false,
        }

        chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ShopifyProvider {
        let mut config = Config::default();
        config.shopify.client_id = "test_client_id".to_string();
        config.shopify.scopes = vec!["read_orders".to_string(), "read_products".to_string()];
        ShopifyProvider::from_config(&config)
    }

    #[test]
    fn test_valid_shop_domains() {
        let provider = provider();
        assert!(provider.is_valid_shop_domain("foo.myshopify.com"));
        assert!(provider.is_valid_shop_domain("auto-shopai.myshopify.com"));
        assert!(provider.is_valid_shop_domain("Store42.myshopify.com"));

        assert!(!provider.is_valid_shop_domain(""));
        assert!(!provider.is_valid_shop_domain(".myshopify.com"));
        assert!(!provider.is_valid_shop_domain("-foo.myshopify.com"));
        assert!(!provider.is_valid_shop_domain("foo.example.com"));
        assert!(!provider.is_valid_shop_domain("evil.com/x.myshopify.com"));
        assert!(!provider.is_valid_shop_domain("evil.com#.myshopify.com"));
        assert!(!provider.is_valid_shop_domain("a.b.myshopify.com"));
        assert!(!provider.is_valid_shop_domain("foo.myshopify.com.evil.com"));
    }

    #[test]
    fn test_build_auth_url() {
        let provider = provider();
        let url = provider.build_auth_url("foo.myshopify.com", "random_state");

        assert!(url.starts_with("https://foo.myshopify.com/admin/oauth/authorize?"));
        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains("scope=read_orders%2Cread_products"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fshopify%2Foauth%2Fcallback"
        ));
        assert!(url.contains("state=random_state"));
    }

    #[test]
    fn test_token_url() {
        let provider = provider();
        assert_eq!(
            provider.token_url("foo.myshopify.com"),
            "https://foo.myshopify.com/admin/oauth/access_token"
        );
    }

    #[test]
    fn test_platform_base_url_override() {
        let mut config = Config::default();
        config.shopify.platform_base_url = Some("http://127.0.0.1:9999/".to_string());
        let provider = ShopifyProvider::from_config(&config);

        assert_eq!(
            provider.token_url("foo.myshopify.com"),
            "http://127.0.0.1:9999/admin/oauth/access_token"
        );
        assert!(provider
            .build_auth_url("foo.myshopify.com", "s")
            .starts_with("http://127.0.0.1:9999/admin/oauth/authorize?"));
    }
}
