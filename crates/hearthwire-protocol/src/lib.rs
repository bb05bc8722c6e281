//! Wire protocol for Hearthwire.
//!
//! This crate defines the bytes a game client and the server exchange
//! inside each transport frame:
//!
//! - **Packets** ([`Packet`], [`PacketWriter`], [`PacketReader`]): an
//!   opcode byte followed by big-endian integers and length-prefixed
//!   strings.
//! - **Opcodes** ([`ClientOpcode`], [`ServerOpcode`]): the fixed table
//!   for the client version we speak, including which packets are
//!   secured.
//! - **Cipher** ([`Cipher`], [`CipherParameters`]): the stateful
//!   transform applied to secured payloads.
//! - **Formats** ([`formats`]): concrete layouts for every packet the
//!   server reads or writes.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (frame bodies) and the
//! server's dispatcher. It doesn't know about sockets, accounts or
//! maps; it only knows how packets look.
//!
//! ```text
//! Transport (frame body) → Protocol (opcode + plaintext) → Dispatcher
//! ```

mod cipher;
mod error;
pub mod formats;
mod opcode;
mod packet;
mod redirect;

pub use cipher::{Cipher, CipherMode, CipherParameters, DEFAULT_SALT};
pub use error::FrameError;
pub use formats::{ClientFormat, ServerFormat};
pub use opcode::{ClientOpcode, ServerOpcode};
pub use packet::{Packet, PacketReader, PacketWriter};
pub use redirect::{RedirectCredentials, RedirectKind};
