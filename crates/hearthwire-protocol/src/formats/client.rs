//! Client → server packet layouts.

use super::ClientFormat;
use crate::{ClientOpcode, FrameError, PacketReader, PacketWriter, RedirectCredentials};

/// Reads an optional trailing `string8`; an exhausted payload means
/// the field was left off.
fn read_optional_text(
    reader: &mut PacketReader,
) -> Result<Option<String>, FrameError> {
    if reader.is_empty() {
        return Ok(None);
    }
    reader.read_text8().map(Some)
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Requests encryption. `kind` 0 asks for the four-byte ack, anything
/// else for the five-byte ack. A client may append its own seed and
/// salt; otherwise the server's defaults apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionInit {
    pub kind: u8,
    pub custom_key: Option<(u32, Vec<u8>)>,
}

impl ClientFormat for EncryptionInit {
    const OPCODE: ClientOpcode = ClientOpcode::EncryptionInit;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        let kind = reader.read_u8()?;
        let custom_key = if reader.is_empty() {
            None
        } else {
            let seed = reader.read_u32()?;
            let salt = reader.read_string8()?.to_vec();
            Some((seed, salt))
        };
        Ok(Self { kind, custom_key })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.kind);
        if let Some((seed, salt)) = &self.custom_key {
            writer.write_u32(*seed).write_string8(salt);
        }
    }
}

/// Credentials presented at the login role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub username: String,
    pub password: String,
}

impl ClientFormat for Login {
    const OPCODE: ClientOpcode = ClientOpcode::Login;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        Ok(Self {
            username: reader.read_text8()?,
            password: reader.read_text8()?,
        })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer
            .write_string8(&self.username)
            .write_string8(&self.password);
    }
}

/// Redirect credentials presented at the world role. Numbers travel as
/// decimal text, the salt as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnterWorld {
    pub credentials: RedirectCredentials,
}

impl ClientFormat for EnterWorld {
    const OPCODE: ClientOpcode = ClientOpcode::EnterWorld;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        let seed = reader.read_decimal8("seed")?;
        let salt = reader.read_string8()?.to_vec();
        let username = reader.read_text8()?;
        let serial = reader.read_decimal8("serial")?;
        Ok(Self {
            credentials: RedirectCredentials {
                serial,
                username,
                salt,
                seed,
            },
        })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer
            .write_string8(self.credentials.seed.to_string())
            .write_string8(&self.credentials.salt)
            .write_string8(&self.credentials.username)
            .write_string8(self.credentials.serial.to_string());
    }
}

/// Keepalive. The payload is a single byte, normally zero; an empty
/// payload is tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Heartbeat {
    pub value: u8,
}

impl ClientFormat for Heartbeat {
    const OPCODE: ClientOpcode = ClientOpcode::Heartbeat;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        let value = if reader.is_empty() { 0 } else { reader.read_u8()? };
        Ok(Self { value })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.value);
    }
}

/// Client clock tick, sent periodically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerSync {
    pub ticks: u32,
}

impl ClientFormat for TimerSync {
    const OPCODE: ClientOpcode = ClientOpcode::TimerSync;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        let ticks = if reader.remaining() >= 4 {
            reader.read_u32()?
        } else {
            0
        };
        Ok(Self { ticks })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u32(self.ticks);
    }
}

// ---------------------------------------------------------------------------
// Movement and actions
// ---------------------------------------------------------------------------

/// One step in `direction` (0 up, 1 right, 2 down, 3 left).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Walk {
    pub direction: u8,
}

impl ClientFormat for Walk {
    const OPCODE: ClientOpcode = ClientOpcode::Walk;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        Ok(Self {
            direction: reader.read_u8()?,
        })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.direction);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Turn {
    pub direction: u8,
}

impl ClientFormat for Turn {
    const OPCODE: ClientOpcode = ClientOpcode::Turn;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        Ok(Self {
            direction: reader.read_u8()?,
        })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.direction);
    }
}

/// `kind` 0 returns to the login role, 1 quits outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveGame {
    pub kind: u8,
}

impl ClientFormat for LeaveGame {
    const OPCODE: ClientOpcode = ClientOpcode::LeaveGame;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        Ok(Self {
            kind: reader.read_u8()?,
        })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.kind);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseSkill {
    pub slot: u8,
}

impl ClientFormat for UseSkill {
    const OPCODE: ClientOpcode = ClientOpcode::UseSkill;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        Ok(Self {
            slot: reader.read_u8()?,
        })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.slot);
    }
}

/// Picks a destination on the open world map by area id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldMapClick {
    pub area_id: u16,
}

impl ClientFormat for WorldMapClick {
    const OPCODE: ClientOpcode = ClientOpcode::WorldMapClick;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        Ok(Self {
            area_id: reader.read_u16()?,
        })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u16(self.area_id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocialStatus {
    pub status: u8,
}

impl ClientFormat for SocialStatus {
    const OPCODE: ClientOpcode = ClientOpcode::SocialStatus;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        Ok(Self {
            status: reader.read_u8()?,
        })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.status);
    }
}

/// `kind` 2 invites `target` to a group, 3 leaves the current group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRequest {
    pub kind: u8,
    pub target: String,
}

impl GroupRequest {
    pub const INVITE: u8 = 0x02;
    pub const LEAVE: u8 = 0x03;
}

impl ClientFormat for GroupRequest {
    const OPCODE: ClientOpcode = ClientOpcode::GroupRequest;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        let kind = reader.read_u8()?;
        let target = read_optional_text(reader)?.unwrap_or_default();
        Ok(Self { kind, target })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.kind).write_string8(&self.target);
    }
}

// ---------------------------------------------------------------------------
// Interaction
// ---------------------------------------------------------------------------

/// Clicked an object (NPC, popup) by serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Click {
    pub kind: u8,
    pub serial: u32,
}

impl ClientFormat for Click {
    const OPCODE: ClientOpcode = ClientOpcode::Click;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        Ok(Self {
            kind: reader.read_u8()?,
            serial: reader.read_u32()?,
        })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.kind).write_u32(self.serial);
    }
}

/// Picked answer `answer` (1-based) from the menu shown by `serial`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuResponse {
    pub serial: u32,
    pub answer: u16,
    pub input: Option<String>,
}

impl ClientFormat for MenuResponse {
    const OPCODE: ClientOpcode = ClientOpcode::MenuResponse;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        Ok(Self {
            serial: reader.read_u32()?,
            answer: reader.read_u16()?,
            input: read_optional_text(reader)?,
        })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u32(self.serial).write_u16(self.answer);
        if let Some(input) = &self.input {
            writer.write_string8(input);
        }
    }
}

/// Navigation inside a dialog window.
///
/// `step` 1 means next, 0 or 2 close, anything above 2 back. A
/// `script_id` of `0xFFFF` with step 0 force-closes the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogResponse {
    pub serial: u32,
    pub script_id: u16,
    pub step: u16,
    pub input: Option<String>,
}

impl DialogResponse {
    pub const NO_SCRIPT: u16 = u16::MAX;
}

impl ClientFormat for DialogResponse {
    const OPCODE: ClientOpcode = ClientOpcode::DialogResponse;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        Ok(Self {
            serial: reader.read_u32()?,
            script_id: reader.read_u16()?,
            step: reader.read_u16()?,
            input: read_optional_text(reader)?,
        })
    }

    fn write(&self, writer: &mut PacketWriter) {
        writer
            .write_u32(self.serial)
            .write_u16(self.script_id)
            .write_u16(self.step);
        if let Some(input) = &self.input {
            writer.write_string8(input);
        }
    }
}

// ---------------------------------------------------------------------------
// Boards
// ---------------------------------------------------------------------------

/// Message board and mail operations. Board 0 is the player's mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardRequest {
    ListBoards,
    ReadBoard {
        board: u16,
    },
    ReadPost {
        board: u16,
        post_id: u16,
    },
    Post {
        board: u16,
        subject: String,
        body: String,
    },
    Delete {
        board: u16,
        post_id: u16,
    },
    SendMail {
        board: u16,
        to: String,
        subject: String,
        body: String,
    },
}

impl ClientFormat for BoardRequest {
    const OPCODE: ClientOpcode = ClientOpcode::Board;

    fn read(reader: &mut PacketReader) -> Result<Self, FrameError> {
        let kind = reader.read_u8()?;
        let request = match kind {
            0x01 => Self::ListBoards,
            0x02 => Self::ReadBoard {
                board: reader.read_u16()?,
            },
            0x03 => Self::ReadPost {
                board: reader.read_u16()?,
                post_id: reader.read_u16()?,
            },
            0x04 => Self::Post {
                board: reader.read_u16()?,
                subject: reader.read_text8()?,
                body: reader.read_text16()?,
            },
            0x05 => Self::Delete {
                board: reader.read_u16()?,
                post_id: reader.read_u16()?,
            },
            0x06 => Self::SendMail {
                board: reader.read_u16()?,
                to: reader.read_text8()?,
                subject: reader.read_text8()?,
                body: reader.read_text16()?,
            },
            other => return Err(FrameError::UnknownOpcode(other)),
        };
        Ok(request)
    }

    fn write(&self, writer: &mut PacketWriter) {
        match self {
            Self::ListBoards => {
                writer.write_u8(0x01);
            }
            Self::ReadBoard { board } => {
                writer.write_u8(0x02).write_u16(*board);
            }
            Self::ReadPost { board, post_id } => {
                writer.write_u8(0x03).write_u16(*board).write_u16(*post_id);
            }
            Self::Post {
                board,
                subject,
                body,
            } => {
                writer
                    .write_u8(0x04)
                    .write_u16(*board)
                    .write_string8(subject)
                    .write_string16(body);
            }
            Self::Delete { board, post_id } => {
                writer.write_u8(0x05).write_u16(*board).write_u16(*post_id);
            }
            Self::SendMail {
                board,
                to,
                subject,
                body,
            } => {
                writer
                    .write_u8(0x06)
                    .write_u16(*board)
                    .write_string8(to)
                    .write_string8(subject)
                    .write_string16(body);
            }
        }
    }
}
