use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Sign a canonical parameter payload.
///
/// Returns the HMAC-SHA256 digest of `canonical` as lowercase hex.
pub fn sign(secret: &str, canonical: &str) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid key length: {}", e))?;
    mac.update(canonical.as_bytes());
    let result = mac.finalize();
    Ok(hex::encode(result.into_bytes()))
}

/// Verify a presented digest against a canonical payload.
///
/// The presented digest is normalized to lowercase hex before a
/// constant-time comparison. Malformed input fails verification, it never
/// errors.
pub fn verify(secret: &str, canonical: &str, presented: &str) -> bool {
    let Ok(expected) = sign(secret, canonical) else {
        return false;
    };
    let presented = presented.to_ascii_lowercase();

    if expected.len() != presented.len() {
        return false;
    }

    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let secret = "my_secret_key";
        let canonical = "amount=10000&command=pay&reference=ORD-1-aB3xQ9Zp";

        let digest = sign(secret, canonical).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(verify(secret, canonical, &digest));
    }

    #[test]
    fn digest_case_is_normalized() {
        let secret = "my_secret_key";
        let canonical = "amount=10000&command=pay";

        let digest = sign(secret, canonical).unwrap().to_uppercase();
        assert!(verify(secret, canonical, &digest));
    }

    #[test]
    fn tampered_payload_fails() {
        let secret = "my_secret_key";
        let canonical = "amount=10000&command=pay";

        let digest = sign(secret, canonical).unwrap();
        assert!(!verify(secret, "amount=10001&command=pay", &digest));
    }

    #[test]
    fn wrong_secret_fails() {
        let canonical = "amount=10000&command=pay";

        let digest = sign("secret_a", canonical).unwrap();
        assert!(!verify("secret_b", canonical, &digest));
    }

    #[test]
    fn malformed_digest_fails_without_error() {
        let secret = "my_secret_key";
        assert!(!verify(secret, "amount=10000", "not-a-digest"));
        assert!(!verify(secret, "amount=10000", ""));
    }
}
