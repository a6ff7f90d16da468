//! Crypto Module
//!
//! Symmetric encryption of the serialized store document at rest.

mod algorithm;
mod cipher;
mod envelope;


pub use algorithm::CipherAlgorithm;
pub use cipher::{Cipher, CipherMaterial};
pub use envelope::Envelope;

// == Public Constants ==
/// Block size shared by every supported algorithm, and therefore the iv length
pub const IV_SIZE: usize = 16;
