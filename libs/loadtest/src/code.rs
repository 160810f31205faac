//! Random channel codes for upsert payloads.

use rand::Rng;

const ALPHABET: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Returns `length` uppercase ASCII letters drawn uniformly at random.
///
/// Codes are not deduplicated, two iterations may well send the same one.
pub fn make_code(length: usize) -> String {
    make_code_with(&mut rand::thread_rng(), length)
}

pub fn make_code_with<R: Rng>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
