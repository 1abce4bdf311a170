//! Challenge/response password scrambling for `mysql_native_password`.

use sha1::{Digest, Sha1};

fn sha1(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Scramble a password against the server's handshake salt.
///
/// `SHA1(password) XOR SHA1(salt ++ SHA1(SHA1(password)))`. Deterministic
/// for fixed inputs; always 20 bytes. An empty password produces an empty
/// auth response instead (handled by the caller).
pub fn scramble_password(password: &str, salt: &[u8]) -> [u8; 20] {
    let password_hash = sha1(password.as_bytes());
    let mut stage = Sha1::new();
    stage.update(salt);
    stage.update(sha1(&password_hash));
    let scramble: [u8; 20] = stage.finalize().into();

    let mut result = [0u8; 20];
    for (i, byte) in result.iter_mut().enumerate() {
        *byte = password_hash[i] ^ scramble[i];
    }
    result
}
