//! Derive the compressed public key for a private key. Handy for
//! fabricating search targets with a known answer.

use anyhow::{bail, Result};
use clap::Parser;
use num_bigint::BigUint;
use num_traits::Zero;

use rangeroo::math::secp;
use rangeroo::utils::encoding;

#[derive(Parser)]
#[command(name = "genkey", about = "Print the compressed public key for a private key")]
struct Args {
    /// Private key in hex (optionally 0x-prefixed)
    private_key: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let hex_str = args
        .private_key
        .strip_prefix("0x")
        .unwrap_or(args.private_key.as_str());
    let Some(key) = BigUint::parse_bytes(hex_str.as_bytes(), 16) else {
        bail!("private key is not valid hex: {}", args.private_key);
    };
    if key.is_zero() || key >= *secp::ORDER {
        bail!("private key must lie in [1, n)");
    }

    let point = secp::mul_generator(&key);
    let compressed = secp::serialize_compressed(&point)?;
    println!("Private: {}", encoding::biguint_to_hex(&key));
    println!("Public:  {}", hex::encode(compressed));
    Ok(())
}
