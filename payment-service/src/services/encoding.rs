//! Canonical parameter encoding for gateway signing and transport.
//!
//! Both forms drop empty values and order keys by byte value, then join
//! `key=value` pairs with `&`. The signing form uses the gateway's
//! form-urlencoded table (space as `+`); the transport form uses the
//! RFC 3986 table (space as `%20`). Each table must be applied identically
//! when building a request and when re-deriving a signature from a
//! callback, so both live here as pure functions.

use std::collections::BTreeMap;

/// Percent-encode `value` in the form-urlencoded table the gateway signs.
fn form_encode(value: &str) -> String {
    // A literal '%' becomes %25 first, so mapping %20 back to '+' is
    // unambiguous.
    urlencoding::encode(value).replace("%20", "+")
}

/// Canonical byte string fed to the signer.
pub fn signing_payload(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, form_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Canonical query string for the redirect URL.
pub fn query_string(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn keys_are_sorted_by_byte_value() {
        let p = params(&[("zeta", "1"), ("alpha", "2"), ("Mid", "3")]);
        // Uppercase sorts before lowercase in byte order.
        assert_eq!(signing_payload(&p), "Mid=3&alpha=2&zeta=1");
        assert_eq!(query_string(&p), "Mid=3&alpha=2&zeta=1");
    }

    #[test]
    fn empty_values_are_dropped() {
        let p = params(&[("amount", "10000"), ("bankCode", ""), ("locale", "en")]);
        assert_eq!(signing_payload(&p), "amount=10000&locale=en");
        assert_eq!(query_string(&p), "amount=10000&locale=en");
    }

    #[test]
    fn signing_form_uses_plus_for_space() {
        let p = params(&[("orderInfo", "Order ORD-1 payment")]);
        assert_eq!(signing_payload(&p), "orderInfo=Order+ORD-1+payment");
    }

    #[test]
    fn transport_form_uses_percent20_for_space() {
        let p = params(&[("orderInfo", "Order ORD-1 payment")]);
        assert_eq!(query_string(&p), "orderInfo=Order%20ORD-1%20payment");
    }

    #[test]
    fn reserved_characters_are_escaped() {
        let p = params(&[("orderInfo", "a=b&c d"), ("returnUrl", "https://shop.example/return")]);
        assert_eq!(
            signing_payload(&p),
            "orderInfo=a%3Db%26c+d&returnUrl=https%3A%2F%2Fshop.example%2Freturn"
        );
        assert_eq!(
            query_string(&p),
            "orderInfo=a%3Db%26c%20d&returnUrl=https%3A%2F%2Fshop.example%2Freturn"
        );
    }

    #[test]
    fn percent_literal_survives_plus_mapping() {
        let p = params(&[("orderInfo", "100% cotton")]);
        assert_eq!(signing_payload(&p), "orderInfo=100%25+cotton");
    }

    #[test]
    fn non_ascii_values_are_percent_encoded() {
        let p = params(&[("orderInfo", "Thanh toán")]);
        assert_eq!(signing_payload(&p), "orderInfo=Thanh+to%C3%A1n");
        assert_eq!(query_string(&p), "orderInfo=Thanh%20to%C3%A1n");
    }

    #[test]
    fn empty_map_encodes_to_empty_string() {
        let p = BTreeMap::new();
        assert_eq!(signing_payload(&p), "");
        assert_eq!(query_string(&p), "");
    }
}
