use sha2::{Digest, Sha256};

/// Short SHA-256 fingerprint of an opaque token or receipt, safe to log
pub fn fingerprint(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    format!("{:x}", digest)[..16].to_string()
}
