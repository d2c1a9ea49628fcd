use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;

const ENTITY_SECRET_BYTES: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CiphertextError {
    #[error("entity secret must be 64 hex characters (32 bytes)")]
    InvalidSecret,
    #[error("entity public key is not a valid RSA PEM: {0}")]
    InvalidPublicKey(String),
    #[error("entity secret encryption failed: {0}")]
    Encryption(String),
}

/// Fresh random entity secret, hex encoded.
pub fn generate_entity_secret() -> String {
    let mut bytes = [0_u8; ENTITY_SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Encrypts the raw 32 secret bytes with RSA-OAEP(SHA-256) and returns the
/// base64 ciphertext. OAEP is randomized, so every call yields a new value.
pub fn encrypt_entity_secret(
    entity_secret_hex: &str,
    public_key_pem: &str,
) -> Result<String, CiphertextError> {
    let secret = decode_secret(entity_secret_hex)?;
    let public_key = decode_public_key(public_key_pem)?;

    let encrypted = public_key
        .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), &secret)
        .map_err(|error| CiphertextError::Encryption(error.to_string()))?;

    Ok(STANDARD.encode(encrypted))
}

fn decode_secret(entity_secret_hex: &str) -> Result<Vec<u8>, CiphertextError> {
    let trimmed = entity_secret_hex.trim();
    if trimmed.len() != ENTITY_SECRET_BYTES * 2 {
        return Err(CiphertextError::InvalidSecret);
    }
    hex::decode(trimmed).map_err(|_| CiphertextError::InvalidSecret)
}

// Circle serves SPKI ("BEGIN PUBLIC KEY"); PKCS#1 is accepted as well.
fn decode_public_key(pem: &str) -> Result<RsaPublicKey, CiphertextError> {
    let pem = pem.trim();
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|error| CiphertextError::InvalidPublicKey(error.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use rsa::pkcs1::EncodeRsaPublicKey;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::{Oaep, RsaPrivateKey};
    use sha2::Sha256;

    use super::{encrypt_entity_secret, generate_entity_secret, CiphertextError};

    pub(crate) const SECRET: &str =
        "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";

    pub(crate) fn test_key() -> (RsaPrivateKey, String) {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("key generation");
        let pem = private.to_public_key().to_public_key_pem(LineEnding::LF).expect("pem export");
        (private, pem)
    }

    fn decrypt(private: &RsaPrivateKey, ciphertext: &str) -> Vec<u8> {
        let bytes = STANDARD.decode(ciphertext).expect("base64");
        private.decrypt(Oaep::new::<Sha256>(), &bytes).expect("decrypts")
    }

    #[test]
    fn ciphertext_decrypts_to_raw_secret_bytes() {
        let (private, pem) = test_key();

        let first = encrypt_entity_secret(SECRET, &pem).expect("encrypts");
        let second = encrypt_entity_secret(SECRET, &pem).expect("encrypts");

        assert_ne!(first, second, "oaep output should be randomized");
        assert_eq!(decrypt(&private, &first), hex::decode(SECRET).expect("hex"));
        assert_eq!(decrypt(&private, &second).len(), 32);
    }

    #[test]
    fn pkcs1_public_keys_are_accepted() {
        let (private, _) = test_key();
        let pem = private.to_public_key().to_pkcs1_pem(LineEnding::LF).expect("pkcs1 export");

        let ciphertext = encrypt_entity_secret(SECRET, &pem).expect("encrypts");
        assert_eq!(decrypt(&private, &ciphertext), hex::decode(SECRET).expect("hex"));
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        let (_, pem) = test_key();

        assert_eq!(encrypt_entity_secret("abc", &pem), Err(CiphertextError::InvalidSecret));
        assert_eq!(
            encrypt_entity_secret(&"zz".repeat(32), &pem),
            Err(CiphertextError::InvalidSecret)
        );
        assert!(matches!(
            encrypt_entity_secret(SECRET, "not a pem"),
            Err(CiphertextError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn generated_secrets_are_fresh_hex() {
        let first = generate_entity_secret();
        let second = generate_entity_secret();

        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|ch| ch.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }
}
