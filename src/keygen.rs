//! Candidate private-key generation.

use rand::RngCore;
use secp256k1::constants::CURVE_ORDER;

/// Draws 32 uniform random bytes with no range constraint.
pub fn random_key(rng: &mut impl RngCore) -> [u8; 32] {
    let mut key = [0_u8; 32];
    rng.fill_bytes(&mut key);
    key
}

/// Draws a scalar strictly below the curve order by rejection sampling.
///
/// A candidate at or above the order is discarded whole and all 32 bytes
/// are redrawn; anything finer-grained skews the distribution near the
/// boundary. The expected number of draws is within 2^-128 of one.
pub fn random_key_below_order(rng: &mut impl RngCore) -> [u8; 32] {
    loop {
        let key = random_key(rng);
        if is_below_order(&key) {
            return key;
        }
    }
}

/// Big-endian lexicographic comparison against the curve order.
#[inline]
pub fn is_below_order(key: &[u8; 32]) -> bool {
    *key < CURVE_ORDER
}
