/// XORs `payload` in place with `key`, byte `i` with `key[i % 4]`.
///
/// Masking and unmasking are the same operation.
#[inline]
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    let mut words = payload.chunks_exact_mut(4);
    for word in &mut words {
        word[0] ^= key[0];
        word[1] ^= key[1];
        word[2] ^= key[2];
        word[3] ^= key[3];
    }
    for (byte, k) in words.into_remainder().iter_mut().zip(key) {
        *byte ^= k;
    }
}
