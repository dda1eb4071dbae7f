//! Absolute storefront links used in emails.

use url::Url;

use attireburg_core::{Email, OrderId, StockKey};

use super::tokens::LinkSigner;

/// Builds links under the public base URL.
#[derive(Debug, Clone)]
pub struct Links {
    base_url: Url,
    signer: LinkSigner,
}

impl Links {
    #[must_use]
    pub const fn new(base_url: Url, signer: LinkSigner) -> Self {
        Self { base_url, signer }
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub const fn signer(&self) -> &LinkSigner {
        &self.signer
    }

    fn with_path(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.set_query(None);
        url
    }

    /// `/products/{slug}`, with `?variant=` when the link targets a variant.
    #[must_use]
    pub fn product_url(&self, slug: &str, key: StockKey) -> Url {
        let mut url = self.with_path(&["products", slug]);
        if let Some(variant_id) = key.variant_id {
            url.query_pairs_mut()
                .append_pair("variant", &variant_id.to_string());
        }
        url
    }

    /// Signed one-click unsubscribe link for a waitlist subscription.
    #[must_use]
    pub fn unsubscribe_url(&self, email: &Email, key: StockKey) -> Url {
        let mut url = self.with_path(&["api", "waitlist", "unsubscribe"]);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("email", email.as_str())
                .append_pair("productId", &key.product_id.to_string());
            if let Some(variant_id) = key.variant_id {
                query.append_pair("variantId", &variant_id.to_string());
            }
            query.append_pair("token", &self.signer.unsubscribe_token(email, key));
        }
        url
    }

    /// Account page where the customer can cancel a backorder.
    #[must_use]
    pub fn cancellation_url(&self, order_id: OrderId) -> Url {
        let mut url = self.with_path(&["account", "orders", &order_id.to_string()]);
        url.query_pairs_mut().append_pair("action", "cancel");
        url
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use attireburg_core::{ProductId, VariantId};
    use secrecy::SecretString;

    fn links(base: &str) -> Links {
        Links::new(
            Url::parse(base).unwrap(),
            LinkSigner::new(SecretString::from("link-signing-key-for-tests-0123456789")),
        )
    }

    #[test]
    fn test_product_url() {
        let links = links("https://attireburg.de");
        let key = StockKey::variant(ProductId::new(4), VariantId::new(9));
        assert_eq!(
            links.product_url("wool-coat", key).as_str(),
            "https://attireburg.de/products/wool-coat?variant=9"
        );
        assert_eq!(
            links
                .product_url("wool-coat", StockKey::product(ProductId::new(4)))
                .as_str(),
            "https://attireburg.de/products/wool-coat"
        );
    }

    #[test]
    fn test_base_path_is_kept() {
        let links = links("https://example.com/shop/");
        assert_eq!(
            links.cancellation_url(OrderId::new(12)).as_str(),
            "https://example.com/shop/account/orders/12?action=cancel"
        );
    }

    #[test]
    fn test_unsubscribe_url_carries_valid_token() {
        let links = links("https://attireburg.de");
        let email = Email::parse("alice@example.com").unwrap();
        let key = StockKey::variant(ProductId::new(1), VariantId::new(2));
        let url = links.unsubscribe_url(&email, key);

        assert_eq!(url.path(), "/api/waitlist/unsubscribe");
        let token = url
            .query_pairs()
            .find(|(k, _)| k == "token")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(links.signer().verify_unsubscribe(&email, key, &token));
        assert!(url.query_pairs().any(|(k, v)| k == "variantId" && v == "2"));
    }
}
