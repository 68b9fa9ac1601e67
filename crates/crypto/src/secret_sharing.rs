//! Shamir threshold secret sharing.
//!
//! A miner's in-value is split into `total` shares, any `threshold` of which
//! reconstruct it. Shares are distributed off-chain among the other miners;
//! when a miner disappears without revealing, the peers reconstruct the
//! secret and submit the `(miner, revealed_value)` pair with the next round
//! transition.
//!
//! Arithmetic is over the prime field `GF(2^521 - 1)`: the modulus is a
//! Mersenne prime comfortably larger than any 256-bit secret, so every
//! in-value embeds without reduction.

use crate::{CryptoError, CryptoResult, InValue};
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

/// Byte length of an embedded secret.
const SECRET_SIZE: usize = 32;

/// The field modulus, `2^521 - 1`.
fn field_prime() -> BigUint {
    (BigUint::one() << 521u32) - BigUint::one()
}

/// One share of a split secret.
///
/// `index` is the x-coordinate the polynomial was evaluated at (1-based);
/// `value` is the big-endian y-coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretShare {
    /// 1-based evaluation point.
    pub index: u32,
    /// Big-endian field element.
    pub value: Vec<u8>,
}

/// Splits an in-value into `total` shares with reconstruction threshold
/// `threshold`.
///
/// A random polynomial of degree `threshold - 1` is sampled with the secret
/// as its constant term; share `i` is the polynomial evaluated at `x = i`.
pub fn split_secret(secret: &InValue, threshold: usize, total: usize) -> CryptoResult<Vec<SecretShare>> {
    if threshold == 0 || total == 0 {
        return Err(CryptoError::InvalidSharingParameters(
            "threshold and share count must be positive".into(),
        ));
    }
    if threshold > total {
        return Err(CryptoError::InvalidSharingParameters(format!(
            "threshold {} exceeds share count {}",
            threshold, total
        )));
    }

    let prime = field_prime();
    let mut rng = rand::thread_rng();

    // coefficients[0] is the secret itself
    let mut coefficients = Vec::with_capacity(threshold);
    coefficients.push(BigUint::from_bytes_be(secret.as_bytes()));
    for _ in 1..threshold {
        coefficients.push(rng.gen_biguint_below(&prime));
    }

    let shares = (1..=total as u32)
        .map(|index| {
            let x = BigUint::from(index);
            // Horner evaluation of the polynomial at x, mod p
            let mut y = BigUint::zero();
            for coefficient in coefficients.iter().rev() {
                y = (y * &x + coefficient) % &prime;
            }
            SecretShare {
                index,
                value: y.to_bytes_be(),
            }
        })
        .collect();

    Ok(shares)
}

/// Reconstructs an in-value from at least `threshold` shares.
///
/// Uses Lagrange interpolation at `x = 0`. Reconstruction from crafted or
/// mismatched shares yields an arbitrary value; callers must validate the
/// result against the on-chain commitment before trusting it.
pub fn reconstruct_secret(shares: &[SecretShare], threshold: usize) -> CryptoResult<InValue> {
    if threshold == 0 {
        return Err(CryptoError::InvalidSharingParameters(
            "threshold must be positive".into(),
        ));
    }
    if shares.len() < threshold {
        return Err(CryptoError::InsufficientShares {
            threshold,
            provided: shares.len(),
        });
    }

    let prime = field_prime();
    let points: Vec<(BigUint, BigUint)> = shares[..threshold]
        .iter()
        .map(|share| {
            (
                BigUint::from(share.index),
                BigUint::from_bytes_be(&share.value) % &prime,
            )
        })
        .collect();

    let mut secret = BigUint::zero();
    for (i, (x_i, y_i)) in points.iter().enumerate() {
        // Lagrange basis polynomial evaluated at zero:
        //   l_i(0) = prod_{j != i} x_j / (x_j - x_i)
        let mut numerator = BigUint::one();
        let mut denominator = BigUint::one();
        for (j, (x_j, _)) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            numerator = (numerator * x_j) % &prime;
            // (x_j - x_i) mod p, kept non-negative
            let diff = (&prime + x_j - x_i) % &prime;
            denominator = (denominator * diff) % &prime;
        }
        if denominator.is_zero() {
            return Err(CryptoError::InvalidSharingParameters(
                "duplicate share index".into(),
            ));
        }
        // Fermat inverse: denominator^(p-2) mod p
        let inverse = denominator.modpow(&(&prime - 2u32), &prime);
        let term = (y_i * numerator % &prime) * inverse % &prime;
        secret = (secret + term) % &prime;
    }

    let bytes = secret.to_bytes_be();
    if bytes.len() > SECRET_SIZE {
        return Err(CryptoError::InvalidSharingParameters(
            "reconstructed value exceeds 256 bits".into(),
        ));
    }
    let mut padded = [0u8; SECRET_SIZE];
    padded[SECRET_SIZE - bytes.len()..].copy_from_slice(&bytes);
    Ok(InValue::new(padded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_reconstruct() {
        let secret = InValue::random();
        let shares = split_secret(&secret, 3, 5).unwrap();
        assert_eq!(shares.len(), 5);

        let recovered = reconstruct_secret(&shares[..3], 3).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn any_threshold_subset_works() {
        let secret = InValue::random();
        let shares = split_secret(&secret, 3, 5).unwrap();

        let subset = [shares[4].clone(), shares[1].clone(), shares[2].clone()];
        let recovered = reconstruct_secret(&subset, 3).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn below_threshold_fails() {
        let secret = InValue::random();
        let shares = split_secret(&secret, 3, 5).unwrap();
        let result = reconstruct_secret(&shares[..2], 3);
        assert!(matches!(
            result,
            Err(CryptoError::InsufficientShares { threshold: 3, provided: 2 })
        ));
    }

    #[test]
    fn too_few_shares_to_split() {
        let secret = InValue::random();
        assert!(split_secret(&secret, 4, 3).is_err());
        assert!(split_secret(&secret, 0, 3).is_err());
    }

    #[test]
    fn wrong_shares_do_not_reveal() {
        let secret = InValue::random();
        let shares_a = split_secret(&secret, 2, 3).unwrap();
        let shares_b = split_secret(&InValue::random(), 2, 3).unwrap();

        let mixed = [shares_a[0].clone(), shares_b[1].clone()];
        let recovered = reconstruct_secret(&mixed, 2).unwrap();
        assert_ne!(recovered, secret);
    }
}
