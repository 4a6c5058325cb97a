//! Byte-level codecs and logging setup.

pub mod encoding;
pub mod logging;
