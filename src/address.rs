//! P2PKH address derivation.
//!
//! scalar -> secp256k1 public key -> hash160 -> version byte -> double-SHA
//! checksum -> base58. See <https://en.bitcoin.it/wiki/Technical_background_of_version_1_Bitcoin_addresses>.

use secp256k1::{PublicKey, Secp256k1, SecretKey, Signing};
use thiserror::Error;

use crate::{base58, hash160, sha256d};

/// Mainnet P2PKH version byte.
pub const VERSION_P2PKH: u8 = 0x00;

/// How the public key is serialized before hashing. The two forms hash to
/// different addresses for the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PubkeyScheme {
    Compressed,
    Uncompressed,
}

#[derive(Debug, Error)]
pub enum DeriveError {
    /// The scalar is zero or not below the curve order.
    #[error("scalar is not a valid secp256k1 secret key: {0}")]
    InvalidScalar(#[from] secp256k1::Error),
}

/// Derives the Base58Check P2PKH address for a private-key scalar.
/// Deterministic for a given scalar and scheme.
pub fn derive_address<C: Signing>(
    secp: &Secp256k1<C>,
    scalar: &[u8; 32],
    scheme: PubkeyScheme,
) -> Result<String, DeriveError> {
    let secret = SecretKey::from_slice(scalar)?;
    let public = PublicKey::from_secret_key(secp, &secret);

    let pubkey_hash = match scheme {
        PubkeyScheme::Compressed => hash160(&public.serialize()),
        PubkeyScheme::Uncompressed => hash160(&public.serialize_uncompressed()),
    };

    let mut payload = [0_u8; base58::PAYLOAD_LEN];
    payload[0] = VERSION_P2PKH;
    payload[1..21].copy_from_slice(&pubkey_hash);
    let checksum = sha256d(&payload[..21]);
    payload[21..].copy_from_slice(&checksum[..4]);

    Ok(base58::encode(&payload))
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::hex;
    use secp256k1::constants::CURVE_ORDER;

    const SCALAR: [u8; 32] =
        hex!("be63955589062b68320f0a3d5b450551c67bbb5f6e5b34cec57738f3a96316a9");

    #[test]
    fn uncompressed_vector() {
        let secp = Secp256k1::signing_only();
        assert_eq!(
            derive_address(&secp, &SCALAR, PubkeyScheme::Uncompressed).unwrap(),
            "18pRzZBpMyrfPbcBBQcfVYMXoibm6fhqYs"
        );
    }

    #[test]
    fn compressed_vector() {
        let secp = Secp256k1::signing_only();
        assert_eq!(
            derive_address(&secp, &SCALAR, PubkeyScheme::Compressed).unwrap(),
            "1Dai8FBumerEYMzijW7hfMgD45HowqYzVP"
        );
    }

    #[test]
    fn deterministic() {
        let secp = Secp256k1::signing_only();
        let a = derive_address(&secp, &SCALAR, PubkeyScheme::Compressed).unwrap();
        let b = derive_address(&secp, &SCALAR, PubkeyScheme::Compressed).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_out_of_range_scalars() {
        let secp = Secp256k1::signing_only();
        assert!(derive_address(&secp, &[0_u8; 32], PubkeyScheme::Compressed).is_err());
        assert!(derive_address(&secp, &CURVE_ORDER, PubkeyScheme::Compressed).is_err());
    }

    #[test]
    fn derived_address_decodes_to_versioned_payload() {
        let secp = Secp256k1::signing_only();
        let addr = derive_address(&secp, &SCALAR, PubkeyScheme::Compressed).unwrap();
        let payload = base58::decode(&addr).unwrap();
        assert_eq!(payload[0], VERSION_P2PKH);
        assert_eq!(&payload[21..], &sha256d(&payload[..21])[..4]);
    }
}
