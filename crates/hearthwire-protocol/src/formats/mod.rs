//! Concrete packet layouts.
//!
//! Each client packet is a [`ClientFormat`]: it can be read off a
//! payload (server side) and written (client side, tests). Each server
//! packet is a [`ServerFormat`]; the few that tests or tools need to
//! read back also expose a `parse` function.

mod client;
mod server;

pub use client::{
    BoardRequest, Click, DialogResponse, EncryptionInit, EnterWorld,
    GroupRequest, Heartbeat, LeaveGame, Login, MenuResponse, SocialStatus,
    TimerSync, Turn, UseSkill, Walk, WorldMapClick,
};
pub use server::{
    Animation, BoardResponse, BoardSummary, CooldownNotice, DialogView,
    EncryptionAck, GroupUpdate, KeepaliveAck, Location, LoginResult,
    LogoutAck, MapLoaded, ParsedPortalDescriptor, PortalDescriptor,
    PortalDestination, PostSummary, Redirect, SystemMessage, TurnNotice,
    WalkAck,
};

use bytes::Bytes;

use crate::{ClientOpcode, FrameError, Packet, PacketReader, PacketWriter, ServerOpcode};

/// A packet the client sends.
pub trait ClientFormat: Sized {
    const OPCODE: ClientOpcode;

    /// Reads the fields in wire order.
    fn read(reader: &mut PacketReader) -> Result<Self, FrameError>;

    /// Writes the fields in wire order.
    fn write(&self, writer: &mut PacketWriter);

    /// Parses a whole (already decrypted) payload.
    fn parse(payload: Bytes) -> Result<Self, FrameError> {
        Self::read(&mut PacketReader::new(payload))
    }

    /// Builds a plaintext packet, as a client would before encryption.
    fn to_packet(&self) -> Packet {
        let mut writer = PacketWriter::new();
        self.write(&mut writer);
        writer.into_packet(Self::OPCODE.as_u8())
    }
}

/// A packet the server sends.
pub trait ServerFormat {
    const OPCODE: ServerOpcode;

    /// Writes the fields in wire order.
    fn write(&self, writer: &mut PacketWriter);

    /// Builds a plaintext packet; the connection loop encrypts it if the
    /// opcode is secured.
    fn to_packet(&self) -> Packet {
        let mut writer = PacketWriter::new();
        self.write(&mut writer);
        writer.into_packet(Self::OPCODE.as_u8())
    }
}
