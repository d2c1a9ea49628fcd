//! Circle developer-controlled wallets over REST.

pub mod ciphertext;
pub mod client;

pub use ciphertext::{encrypt_entity_secret, generate_entity_secret, CiphertextError};
pub use client::{CircleClient, CreatedWallet};
