//! Curve arithmetic surface consumed by the walk core.

pub mod secp;
