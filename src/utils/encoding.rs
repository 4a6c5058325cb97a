//! Big-endian scalar codecs shared by the walk, the accelerator arrays and
//! the checkpoint format.

use num_bigint::BigUint;

/// Serialize to 32 bytes big-endian, zero-padded. Values wider than 256 bits
/// keep their low 32 bytes, matching the fixed lanes of the accelerator
/// arrays.
pub fn biguint_to_bytes32(value: &BigUint) -> [u8; 32] {
    let raw = value.to_bytes_be();
    let mut out = [0u8; 32];
    let take = raw.len().min(32);
    out[32 - take..].copy_from_slice(&raw[raw.len() - take..]);
    out
}

pub fn bytes_to_biguint(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Lower-case hex, padded to a whole number of bytes.
pub fn biguint_to_hex(value: &BigUint) -> String {
    let mut s = value.to_str_radix(16);
    if s.len() % 2 == 1 {
        s.insert(0, '0');
    }
    s
}

pub fn hex_to_biguint(s: &str) -> Option<BigUint> {
    if s.is_empty() {
        return None;
    }
    BigUint::parse_bytes(s.as_bytes(), 16)
}
