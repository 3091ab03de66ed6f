//! obscurity: batched secp256k1 key-space search.
//!
//! The engine walks private keys in groups, amortizing the expensive
//! modular inversion across a whole batch of candidate points and
//! multiplying every computed point into six candidates via the curve
//! endomorphism. Four match modes share that pipeline:
//!
//! - `address`: vanity prefixes, full addresses and wildcards over
//!   P2PKH / P2SH / Bech32 outputs
//! - `mask`: raw public-key X-coordinate bit masks
//! - `signature`: ECDSA / BIP-340 nonce grinding for a target R.x
//! - `txid`: transaction-id grinding over a nonce window
//!
//! Setup builds a [`target::MatchTarget`] and a
//! [`coordinator::SearchEngine`]; `run_with` blocks driving CPU and
//! accelerator workers until the stop condition is met, delivering
//! verified [`reconstruct::FoundKey`] results to the caller's sink.

pub mod address;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod group;
pub mod hashing;
pub mod math;
pub mod pattern;
pub mod predicate;
pub mod reconstruct;
pub mod record;
pub mod stats;
pub mod target;
pub mod worker;

pub use coordinator::{SearchConfig, SearchEngine};
pub use error::{EngineError, Result};
pub use reconstruct::{FoundKey, FoundPayload};
pub use target::{AddressTarget, KeyMode, Mask256, MatchTarget, SignatureTarget, TxidTarget};
