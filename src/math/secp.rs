//! Thin wrappers over the k256 secp256k1 implementation.
//!
//! The walk core only needs a handful of operations: parse and serialize
//! SEC1 points, point addition, `k*G`, and the tweak-add `P + k*G` used to
//! seed the wild herd. Everything scalar-shaped crosses this boundary as a
//! `BigUint` so callers never touch field internals.

use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::elliptic_curve::PrimeField;
use k256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};
use num_bigint::BigUint;
use once_cell::sync::Lazy;

use crate::error::SolverError;
use crate::utils::encoding;

/// Order of the secp256k1 group, big-endian hex.
pub const ORDER_HEX: &str = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";

/// Group order as an arbitrary-precision integer.
pub static ORDER: Lazy<BigUint> =
    Lazy::new(|| BigUint::parse_bytes(ORDER_HEX.as_bytes(), 16).expect("curve order constant"));

/// Parse a SEC1-encoded public key (33-byte compressed or 65-byte
/// uncompressed).
pub fn parse_point(bytes: &[u8]) -> Result<ProjectivePoint, SolverError> {
    let encoded = EncodedPoint::from_bytes(bytes)
        .map_err(|_| SolverError::InvalidInput("malformed SEC1 point encoding".into()))?;
    let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or_else(|| SolverError::InvalidInput("point is not on the secp256k1 curve".into()))?;
    Ok(ProjectivePoint::from(affine))
}

/// 33-byte compressed encoding. The identity has no compressed form, which
/// is the one curve-level failure a walker can run into.
pub fn serialize_compressed(point: &ProjectivePoint) -> Result<[u8; 33], SolverError> {
    let encoded = point.to_affine().to_encoded_point(true);
    let bytes = encoded.as_bytes();
    if bytes.len() != 33 {
        return Err(SolverError::CurveOperation(
            "identity point has no compressed encoding",
        ));
    }
    let mut out = [0u8; 33];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// 65-byte uncompressed encoding (`0x04 || X || Y`).
pub fn serialize_uncompressed(point: &ProjectivePoint) -> Result<[u8; 65], SolverError> {
    let encoded = point.to_affine().to_encoded_point(false);
    let bytes = encoded.as_bytes();
    if bytes.len() != 65 {
        return Err(SolverError::CurveOperation(
            "identity point has no uncompressed encoding",
        ));
    }
    let mut out = [0u8; 65];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Reduce an arbitrary-precision integer mod n into a field scalar.
pub fn scalar_from_biguint(value: &BigUint) -> Scalar {
    let reduced = value % &*ORDER;
    let bytes = encoding::biguint_to_bytes32(&reduced);
    Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(bytes)))
        .expect("reduced value is below the group order")
}

pub fn scalar_to_biguint(scalar: &Scalar) -> BigUint {
    BigUint::from_bytes_be(&scalar.to_bytes())
}

/// `k * G`.
pub fn mul_generator(k: &BigUint) -> ProjectivePoint {
    ProjectivePoint::GENERATOR * scalar_from_biguint(k)
}

/// `P + k * G`, the tweak-add the wild herd seeds with.
pub fn add_scalar(point: &ProjectivePoint, k: &BigUint) -> ProjectivePoint {
    *point + mul_generator(k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Num;

    #[test]
    fn order_matches_known_constant() {
        let expected = BigUint::from_str_radix(
            "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141",
            16,
        )
        .unwrap();
        assert_eq!(*ORDER, expected);
    }

    #[test]
    fn generator_round_trips_through_sec1() {
        let g = ProjectivePoint::GENERATOR;
        let compressed = serialize_compressed(&g).unwrap();
        assert_eq!(compressed.len(), 33);
        assert!(compressed[0] == 0x02 || compressed[0] == 0x03);
        assert_eq!(parse_point(&compressed).unwrap(), g);

        let uncompressed = serialize_uncompressed(&g).unwrap();
        assert_eq!(uncompressed[0], 0x04);
        assert_eq!(parse_point(&uncompressed).unwrap(), g);
    }

    #[test]
    fn mul_generator_matches_repeated_addition() {
        let five = mul_generator(&BigUint::from(5u32));
        let g = ProjectivePoint::GENERATOR;
        assert_eq!(five, g + g + g + g + g);
    }

    #[test]
    fn add_scalar_is_tweak_add() {
        let base = mul_generator(&BigUint::from(100u32));
        let tweaked = add_scalar(&base, &BigUint::from(23u32));
        assert_eq!(tweaked, mul_generator(&BigUint::from(123u32)));
    }

    #[test]
    fn scalar_conversion_reduces_mod_n() {
        let wrapped = &*ORDER + BigUint::from(9u32);
        let scalar = scalar_from_biguint(&wrapped);
        assert_eq!(scalar_to_biguint(&scalar), BigUint::from(9u32));
    }

    #[test]
    fn serialize_identity_is_an_error() {
        let identity = ProjectivePoint::IDENTITY;
        assert!(serialize_compressed(&identity).is_err());
        assert!(serialize_uncompressed(&identity).is_err());
    }

    #[test]
    fn parse_rejects_malformed_encodings() {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x05; // not a SEC1 tag
        assert!(parse_point(&bytes).is_err());
        assert!(parse_point(&[0x02, 0x01]).is_err());
        assert!(parse_point(&[]).is_err());
    }
}
