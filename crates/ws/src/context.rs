use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Source of randomness for mask keys and handshake keys.
///
/// Every connection owns one; seed it with [`from_seed`](Self::from_seed) for
/// reproducible frames in tests.
#[derive(Debug, Clone)]
pub struct WsContext {
    rng: StdRng,
}

impl WsContext {
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// A fresh key for one outgoing frame.
    pub fn mask_key(&mut self) -> [u8; 4] {
        self.rng.r#gen()
    }

    /// The 16 random bytes behind a `Sec-WebSocket-Key`.
    pub fn nonce(&mut self) -> [u8; 16] {
        let mut nonce = [0u8; 16];
        self.rng.fill_bytes(&mut nonce);
        nonce
    }
}

impl Default for WsContext {
    fn default() -> Self {
        Self::new()
    }
}
