// PKCE verifier / challenge pair (RFC 7636, S256 method).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

const VERIFIER_BYTES: usize = 32;

/// The only challenge method this client sends.
pub const CHALLENGE_METHOD: &str = "S256";

/// Generate a fresh code verifier: 32 random bytes, base64url without padding.
pub fn generate_verifier() -> SecretString {
    let mut bytes = [0u8; VERIFIER_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    SecretString::from(URL_SAFE_NO_PAD.encode(bytes))
}

/// Derive the S256 challenge: base64url(SHA-256(verifier)), unpadded.
pub fn challenge_for(verifier: &SecretString) -> String {
    let digest = Sha256::digest(verifier.expose_secret().as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_is_43_url_safe_chars() {
        let verifier = generate_verifier();
        let raw = verifier.expose_secret();
        assert_eq!(raw.len(), 43);
        assert!(
            raw.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn verifiers_are_not_reused() {
        let a = generate_verifier();
        let b = generate_verifier();
        assert_ne!(a.expose_secret(), b.expose_secret());
    }

    #[test]
    fn challenge_matches_rfc7636_appendix_b() {
        let verifier = SecretString::from("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(
            challenge_for(&verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn challenge_is_deterministic_and_unpadded() {
        let verifier = SecretString::from("fixed-verifier-input");
        let first = challenge_for(&verifier);
        let second = challenge_for(&verifier);
        assert_eq!(first, second);
        assert!(!first.contains(['+', '/', '=']));
    }
}
