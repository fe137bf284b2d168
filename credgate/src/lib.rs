//! Trust primitives for a service's request and credential boundary: time-bound
//! HMAC request signatures and Argon2id password credentials. Both components
//! are stateless; configuration loading lives in `config` and feeds them
//! already-validated values.

pub mod clock;
pub mod config;
pub mod crypto;
