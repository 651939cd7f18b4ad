//! Ed25519 key helpers.
//!
//! Secret keys travel as base58 strings in one of two layouts:
//!
//! - 32 bytes: the secret seed
//! - 64 bytes: seed followed by the public key (keypair file layout)

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::signer::keypair::keypair_from_seed;
use zeroize::Zeroizing;

use crate::types::{ClaimError, Result};

/// Ed25519 secret seed length (32 bytes)
pub const SECRET_KEY_LEN: usize = 32;

/// Seed plus public key (64 bytes)
pub const KEYPAIR_LEN: usize = 64;

/// Generate a new keypair from the OS RNG.
pub fn generate_keypair() -> (Keypair, Pubkey) {
    let keypair = Keypair::new();
    let pubkey = keypair.pubkey();
    (keypair, pubkey)
}

/// Decode a base58 secret key.
///
/// In the 64-byte layout the trailing public key must match the seed.
pub fn parse_secret_key(encoded: &str) -> Result<Keypair> {
    let bytes = Zeroizing::new(bs58::decode(encoded.trim()).into_vec()?);

    let seed = match bytes.len() {
        SECRET_KEY_LEN | KEYPAIR_LEN => &bytes[..SECRET_KEY_LEN],
        n => {
            return Err(ClaimError::Decode(format!(
                "secret key must be {SECRET_KEY_LEN} or {KEYPAIR_LEN} bytes, got {n}"
            )))
        }
    };

    let keypair = keypair_from_seed(seed).map_err(|e| ClaimError::Decode(format!("secret key: {e}")))?;
    if bytes.len() == KEYPAIR_LEN && keypair.pubkey().to_bytes()[..] != bytes[SECRET_KEY_LEN..] {
        return Err(ClaimError::Decode(
            "keypair public half does not match its secret".into(),
        ));
    }
    Ok(keypair)
}

/// Encode a keypair in the 64-byte layout.
pub fn encode_keypair(keypair: &Keypair) -> Zeroizing<String> {
    let bytes = Zeroizing::new(keypair.to_bytes());
    Zeroizing::new(bs58::encode(&bytes[..]).into_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_keypair_signs() {
        let (keypair, pubkey) = generate_keypair();
        let signature = keypair.sign_message(b"claim");
        assert!(signature.verify(pubkey.as_ref(), b"claim"));
    }

    #[test]
    fn test_parse_both_layouts() {
        let (keypair, pubkey) = generate_keypair();

        let seed = bs58::encode(&keypair.to_bytes()[..SECRET_KEY_LEN]).into_string();
        assert_eq!(parse_secret_key(&seed).unwrap().pubkey(), pubkey);

        let encoded = encode_keypair(&keypair);
        let parsed = parse_secret_key(&encoded).unwrap();
        assert_eq!(parsed.to_bytes(), keypair.to_bytes());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_secret_key("not-base58-0OIl").is_err());
        assert!(parse_secret_key(&bs58::encode([1u8; 16]).into_string()).is_err());

        let (a, _) = generate_keypair();
        let (_, b) = generate_keypair();
        let mut mismatched = a.to_bytes()[..SECRET_KEY_LEN].to_vec();
        mismatched.extend_from_slice(&b.to_bytes());
        assert!(matches!(
            parse_secret_key(&bs58::encode(mismatched).into_string()),
            Err(ClaimError::Decode(_))
        ));
    }
}
