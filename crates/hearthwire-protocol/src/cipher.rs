//! The per-connection packet cipher.
//!
//! Secured payloads are XORed with a keystream derived from the
//! negotiated [`CipherParameters`]. The keystream is *stateful*: every
//! packet advances it, so the n-th packet can only be recovered by a
//! cipher that has already processed packets 1..n-1 in the same order.
//!
//! That has two consequences callers must respect:
//!
//! 1. A [`Cipher`] belongs to exactly one connection and is driven from
//!    that connection's receive loop only. It is deliberately not
//!    `Clone`.
//! 2. A secured packet that fails to decode cannot be skipped. The
//!    streams are out of sync from then on, so the connection is dropped.
//!
//! Inbound and outbound directions have independent streams that start
//! from the same initial condition. A client's outbound stream mirrors
//! the server's inbound stream and vice versa.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Salt used before a session negotiates its own.
pub const DEFAULT_SALT: &[u8] = b"UrkcnItnI";

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

// ---------------------------------------------------------------------------
// CipherParameters
// ---------------------------------------------------------------------------

/// Selects the acknowledgement shape used during encryption-init.
///
/// Both modes run the same transform; only the ack layout differs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum CipherMode {
    /// Four-byte ack: `u8, u8, u16`.
    #[default]
    Standard,
    /// Five-byte ack: `u8, u16, u16`.
    Extended,
}

impl CipherMode {
    /// Maps the `type` byte of an encryption-init packet. Anything
    /// nonzero selects [`CipherMode::Extended`].
    pub fn from_init_byte(value: u8) -> Self {
        if value == 0 {
            Self::Standard
        } else {
            Self::Extended
        }
    }
}

/// Everything needed to build a connection's cipher. Immutable once
/// negotiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParameters {
    /// Raw salt bytes, carried verbatim through redirects.
    pub salt: Vec<u8>,
    pub seed: u32,
    #[serde(default)]
    pub mode: CipherMode,
}

impl CipherParameters {
    pub fn new(salt: impl Into<Vec<u8>>, seed: u32, mode: CipherMode) -> Self {
        Self {
            salt: salt.into(),
            seed,
            mode,
        }
    }

    /// Same salt and seed, different ack mode.
    pub fn with_mode(mut self, mode: CipherMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for CipherParameters {
    fn default() -> Self {
        Self::new(DEFAULT_SALT, 0, CipherMode::Standard)
    }
}

// ---------------------------------------------------------------------------
// KeyStream
// ---------------------------------------------------------------------------

/// One direction's keystream state.
#[derive(Debug)]
struct KeyStream {
    state: u64,
    ordinal: u8,
}

impl KeyStream {
    fn new(params: &CipherParameters) -> Self {
        // FNV-1a over seed and salt gives the initial condition.
        let mut state: u64 = 0xCBF2_9CE4_8422_2325;
        for byte in params.seed.to_be_bytes().iter().chain(&params.salt) {
            state ^= u64::from(*byte);
            state = state.wrapping_mul(0x0000_0100_0000_01B3);
        }
        Self { state, ordinal: 0 }
    }

    /// Advances to the next packet and XORs `data` with its keystream.
    fn apply(&mut self, salt: &[u8], data: &mut [u8]) {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        let base = mix(self.state);

        let mut block = 0u64;
        for (i, byte) in data.iter_mut().enumerate() {
            if i % 8 == 0 {
                block = mix(base ^ ((i / 8) as u64).wrapping_mul(GOLDEN_GAMMA));
            }
            let key = (block >> ((i % 8) * 8)) as u8;
            let pepper = if salt.is_empty() {
                0
            } else {
                salt[(i + self.ordinal as usize) % salt.len()]
            };
            *byte ^= key ^ pepper;
        }

        self.ordinal = self.ordinal.wrapping_add(1);
    }
}

/// SplitMix64 finalizer.
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// ---------------------------------------------------------------------------
// Cipher
// ---------------------------------------------------------------------------

/// Stateful symmetric transform for one connection.
#[derive(Debug)]
pub struct Cipher {
    params: CipherParameters,
    inbound: KeyStream,
    outbound: KeyStream,
    processed: u64,
}

impl Cipher {
    pub fn new(params: CipherParameters) -> Self {
        let inbound = KeyStream::new(&params);
        let outbound = KeyStream::new(&params);
        Self {
            params,
            inbound,
            outbound,
            processed: 0,
        }
    }

    pub fn parameters(&self) -> &CipherParameters {
        &self.params
    }

    /// Number of packets pushed through either direction so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Encrypts an outgoing payload in place.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        self.outbound.apply(&self.params.salt, data);
        self.processed += 1;
    }

    /// Decrypts an incoming payload in place.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        self.inbound.apply(&self.params.salt, data);
        self.processed += 1;
    }

    /// Encrypts an outgoing payload, returning the ciphertext.
    pub fn seal(&mut self, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::from(payload);
        self.encrypt(&mut buf);
        buf.freeze()
    }

    /// Decrypts an incoming payload, returning the plaintext.
    pub fn open(&mut self, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::from(payload);
        self.decrypt(&mut buf);
        buf.freeze()
    }
}
