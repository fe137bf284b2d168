//! Password credentials built around Argon2id.
//!
//! A credential is the pair (salt, hash), each unpadded base64, stored by the
//! caller. Verification reads the output length from the stored hash so records
//! made with an older key length still verify.

use argon2::{Algorithm, Argon2, Params, Version, MIN_SALT_LEN};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use zeroize::Zeroizing;

use crate::crypto::encoding;

/// Interactive-login profile from the OWASP password storage cheat sheet:
/// - memory_cost: 19 MiB
/// - time_cost: 2 iterations
/// - parallelism: 1 lane
const TIME_COST: u32 = 2;
const MEMORY_COST_KIB: u32 = 19 * 1024;
const PARALLELISM: u32 = 1;
const KEY_LEN: u32 = 32;
const SALT_LEN: u32 = 16;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("invalid argon2 parameters: {0}")]
    InvalidParams(String),
    #[error("secure random source unavailable: {0}")]
    EntropyUnavailable(String),
    #[error("stored {field} is corrupt: {reason}")]
    Decode { field: &'static str, reason: String },
    #[error("argon2 derivation failed: {0}")]
    Derivation(String),
}

/// Argon2id cost knobs plus output and salt sizes. Every field must be non-zero;
/// nothing is substituted for a zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashParams {
    /// Iterations.
    pub time_cost: u32,
    /// Memory in KiB.
    pub memory_cost_kib: u32,
    /// Lanes.
    pub parallelism: u32,
    /// Derived key length in bytes.
    pub key_len: u32,
    /// Salt length in bytes.
    pub salt_len: u32,
}

impl HashParams {
    pub const RECOMMENDED: HashParams = HashParams {
        time_cost: TIME_COST,
        memory_cost_kib: MEMORY_COST_KIB,
        parallelism: PARALLELISM,
        key_len: KEY_LEN,
        salt_len: SALT_LEN,
    };

    /// Checks every field, including the limits Argon2 itself imposes
    /// (memory of at least 8 KiB per lane, key of at least 4 bytes, salt of at
    /// least 8 bytes).
    pub fn validate(&self) -> Result<(), PasswordError> {
        self.check_costs()?;
        if self.key_len == 0 || self.salt_len == 0 {
            return Err(PasswordError::InvalidParams(
                "key and salt lengths must be non-zero".to_string(),
            ));
        }
        if (self.salt_len as usize) < MIN_SALT_LEN {
            return Err(PasswordError::InvalidParams(format!(
                "salt length {} is below the minimum of {MIN_SALT_LEN} bytes",
                self.salt_len
            )));
        }
        self.argon2(self.key_len as usize)
            .map(|_| ())
            .map_err(|e| PasswordError::InvalidParams(format!("{e}")))
    }

    fn check_costs(&self) -> Result<(), PasswordError> {
        if self.time_cost == 0 || self.memory_cost_kib == 0 || self.parallelism == 0 {
            return Err(PasswordError::InvalidParams(
                "time, memory and parallelism must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    fn argon2(&self, output_len: usize) -> Result<Argon2<'static>, argon2::Error> {
        let params = Params::new(
            self.memory_cost_kib,
            self.time_cost,
            self.parallelism,
            Some(output_len),
        )?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for HashParams {
    fn default() -> Self {
        Self::RECOMMENDED
    }
}

/// A stored password record: unpadded base64 salt and hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub salt: String,
    pub hash: String,
}

/// Hashes `password` under a fresh random salt.
///
/// Parameters are checked before any randomness is drawn. A failing random
/// source is reported, never replaced.
pub fn hash_password(password: &str, params: &HashParams) -> Result<Credential, PasswordError> {
    hash_password_with_rng(password, params, &mut OsRng)
}

fn hash_password_with_rng<R: RngCore + CryptoRng>(
    password: &str,
    params: &HashParams,
    rng: &mut R,
) -> Result<Credential, PasswordError> {
    if password.is_empty() {
        return Err(PasswordError::EmptyPassword);
    }
    params.validate()?;
    let argon2 = params
        .argon2(params.key_len as usize)
        .map_err(|e| PasswordError::InvalidParams(format!("{e}")))?;

    let mut salt = vec![0u8; params.salt_len as usize];
    rng.try_fill_bytes(&mut salt)
        .map_err(|e| PasswordError::EntropyUnavailable(format!("{e}")))?;

    let mut hash = Zeroizing::new(vec![0u8; params.key_len as usize]);
    argon2
        .hash_password_into(password.as_bytes(), &salt, &mut hash)
        .map_err(|e| PasswordError::Derivation(format!("{e}")))?;

    Ok(Credential {
        salt: encoding::encode(&salt),
        hash: encoding::encode(&hash),
    })
}

/// Checks `password` against a stored salt and hash.
///
/// `Ok(false)` is a wrong password. `Err(Decode)` means the stored record is
/// unusable and should be treated as data corruption, not as a failed login.
/// Only the cost fields of `params` are used; the output length comes from the
/// stored hash.
pub fn verify_password(
    password: &str,
    stored_salt: &str,
    stored_hash: &str,
    params: &HashParams,
) -> Result<bool, PasswordError> {
    params.check_costs()?;

    let salt = encoding::decode(stored_salt).map_err(|e| corrupt("salt", format!("{e}")))?;
    let want = Zeroizing::new(
        encoding::decode(stored_hash).map_err(|e| corrupt("hash", format!("{e}")))?,
    );

    let argon2 = params.argon2(want.len()).map_err(|e| match e {
        argon2::Error::OutputTooShort | argon2::Error::OutputTooLong => {
            corrupt("hash", format!("{e}"))
        }
        other => PasswordError::InvalidParams(format!("{other}")),
    })?;

    let mut got = Zeroizing::new(vec![0u8; want.len()]);
    argon2
        .hash_password_into(password.as_bytes(), &salt, &mut got)
        .map_err(|e| match e {
            argon2::Error::SaltTooShort | argon2::Error::SaltTooLong => {
                corrupt("salt", format!("{e}"))
            }
            other => PasswordError::Derivation(format!("{other}")),
        })?;

    Ok(encoding::constant_time_eq(&got, &want))
}

/// `verify_password` over a `Credential`.
pub fn verify_credential(
    password: &str,
    credential: &Credential,
    params: &HashParams,
) -> Result<bool, PasswordError> {
    verify_password(password, &credential.salt, &credential.hash, params)
}

fn corrupt(field: &'static str, reason: String) -> PasswordError {
    warn!(field, %reason, "stored credential could not be decoded");
    PasswordError::Decode { field, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Argon2's floor for one lane; keeps the suite fast.
    const FAST: HashParams = HashParams {
        time_cost: 1,
        memory_cost_kib: 8,
        parallelism: 1,
        key_len: 32,
        salt_len: 16,
    };

    #[test]
    fn hashes_and_verifies_passwords() {
        let cred = hash_password("credgate-test-password", &FAST).expect("hashing should succeed");
        assert!(verify_credential("credgate-test-password", &cred, &FAST).unwrap());
        assert!(!verify_credential("credgate-test-passwore", &cred, &FAST).unwrap());
    }

    #[test]
    fn encodes_requested_lengths_without_padding() {
        let cred = hash_password("pw", &FAST).unwrap();
        assert!(!cred.salt.contains('=') && !cred.hash.contains('='));
        assert_eq!(encoding::decode(&cred.salt).unwrap().len(), 16);
        assert_eq!(encoding::decode(&cred.hash).unwrap().len(), 32);
    }

    #[test]
    fn salts_are_random_per_call() {
        let a = hash_password("same", &FAST).unwrap();
        let b = hash_password("same", &FAST).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
        assert!(verify_credential("same", &a, &FAST).unwrap());
        assert!(verify_credential("same", &b, &FAST).unwrap());
    }

    #[test]
    fn verifies_records_with_a_different_key_length() {
        let old = HashParams { key_len: 64, ..FAST };
        let cred = hash_password("legacy", &old).unwrap();
        assert!(verify_credential("legacy", &cred, &FAST).unwrap());
        assert!(!verify_credential("Legacy", &cred, &FAST).unwrap());
    }

    #[test]
    fn cost_mismatch_does_not_verify() {
        let cred = hash_password("pw", &FAST).unwrap();
        let other = HashParams { time_cost: 2, ..FAST };
        assert!(!verify_credential("pw", &cred, &other).unwrap());
    }

    /// Random source that always fails and counts how often it was asked.
    #[derive(Default)]
    struct FailingRng {
        draws: usize,
    }

    impl RngCore for FailingRng {
        fn next_u32(&mut self) -> u32 {
            unreachable!("only try_fill_bytes is used")
        }

        fn next_u64(&mut self) -> u64 {
            unreachable!("only try_fill_bytes is used")
        }

        fn fill_bytes(&mut self, _dest: &mut [u8]) {
            unreachable!("only try_fill_bytes is used")
        }

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            self.draws += 1;
            Err(rand::Error::new(std::io::Error::other("entropy pool exhausted")))
        }
    }

    impl CryptoRng for FailingRng {}

    #[test]
    fn entropy_failure_is_reported_not_replaced() {
        let mut rng = FailingRng::default();
        let result = hash_password_with_rng("pw", &FAST, &mut rng);
        assert!(matches!(
            result,
            Err(PasswordError::EntropyUnavailable(ref msg)) if msg.contains("exhausted")
        ));
        assert_eq!(rng.draws, 1);
    }

    #[test]
    fn params_are_checked_before_drawing_randomness() {
        let mut rng = FailingRng::default();
        let zero = HashParams { time_cost: 0, ..FAST };
        assert!(matches!(
            hash_password_with_rng("pw", &zero, &mut rng),
            Err(PasswordError::InvalidParams(_))
        ));
        assert!(matches!(
            hash_password_with_rng("", &FAST, &mut rng),
            Err(PasswordError::EmptyPassword)
        ));
        assert_eq!(rng.draws, 0);
    }

    #[test]
    fn rejects_empty_password() {
        assert!(matches!(hash_password("", &FAST), Err(PasswordError::EmptyPassword)));
    }

    #[test]
    fn rejects_zero_and_unusable_params() {
        let bad = [
            HashParams { time_cost: 0, ..FAST },
            HashParams { memory_cost_kib: 0, ..FAST },
            HashParams { parallelism: 0, ..FAST },
            HashParams { key_len: 0, ..FAST },
            HashParams { salt_len: 0, ..FAST },
            HashParams { salt_len: 4, ..FAST },
            HashParams { key_len: 2, ..FAST },
            HashParams { memory_cost_kib: 8, parallelism: 4, ..FAST },
        ];
        for params in bad {
            assert!(
                matches!(hash_password("pw", &params), Err(PasswordError::InvalidParams(_))),
                "{params:?} should be rejected"
            );
        }
    }

    #[test]
    fn recommended_profile_is_the_default() {
        let params = HashParams::default();
        assert_eq!(params, HashParams::RECOMMENDED);
        assert_eq!(params.memory_cost_kib, 19 * 1024);
        assert_eq!((params.time_cost, params.parallelism), (2, 1));
        assert_eq!((params.key_len, params.salt_len), (32, 16));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn corrupt_records_are_errors_not_mismatches() {
        let cred = hash_password("pw", &FAST).unwrap();
        let cases = [
            (cred.salt.as_str(), "%%%not-base64%%%", "hash"),
            ("%%%", cred.hash.as_str(), "salt"),
            (cred.salt.as_str(), "", "hash"),
            ("AAAA", cred.hash.as_str(), "salt"),
        ];
        for (salt, hash, expected) in cases {
            match verify_password("pw", salt, hash, &FAST) {
                Err(PasswordError::Decode { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected decode error for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn verify_rejects_zero_costs() {
        let cred = hash_password("pw", &FAST).unwrap();
        let zero = HashParams { time_cost: 0, ..FAST };
        assert!(matches!(
            verify_credential("pw", &cred, &zero),
            Err(PasswordError::InvalidParams(_))
        ));
    }

    #[test]
    fn credential_serializes_as_salt_and_hash() {
        let cred = Credential { salt: "c2FsdA".into(), hash: "aGFzaA".into() };
        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json, serde_json::json!({ "salt": "c2FsdA", "hash": "aGFzaA" }));
    }
}
