//! Cryptographic core. `authsig` and `passwords` are independent; they share
//! only the encoding and constant-time comparison helpers in `encoding`.

pub mod authsig;
pub mod encoding;
pub mod passwords;
