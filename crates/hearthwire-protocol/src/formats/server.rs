//! Server → client packet layouts.

use std::net::Ipv4Addr;

use bytes::Bytes;

use super::ServerFormat;
use crate::{
    CipherMode, FrameError, PacketReader, PacketWriter, RedirectCredentials,
    RedirectKind, ServerOpcode,
};

// ---------------------------------------------------------------------------
// Handshake and session
// ---------------------------------------------------------------------------

/// Reply to encryption-init. The shape depends on the requested mode:
///
/// - [`CipherMode::Standard`]: `u8 0x00, u8 0x00, u16 0x0000`
/// - [`CipherMode::Extended`]: `u8 0x01, u16 0x0000, u16 0x0000`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionAck {
    pub mode: CipherMode,
}

impl ServerFormat for EncryptionAck {
    const OPCODE: ServerOpcode = ServerOpcode::EncryptionAck;

    fn write(&self, writer: &mut PacketWriter) {
        match self.mode {
            CipherMode::Standard => {
                writer.write_u8(0x00).write_u8(0x00).write_u16(0x0000);
            }
            CipherMode::Extended => {
                writer.write_u8(0x01).write_u16(0x0000).write_u16(0x0000);
            }
        }
    }
}

/// Keepalive acknowledgement: a single zero byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeepaliveAck;

impl ServerFormat for KeepaliveAck {
    const OPCODE: ServerOpcode = ServerOpcode::Ack;

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(0x00);
    }
}

/// Outcome of a login attempt. Code 0 is success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResult {
    pub code: u8,
    pub message: String,
}

impl LoginResult {
    pub const OK: u8 = 0x00;
    pub const BAD_CREDENTIALS: u8 = 0x03;
    pub const CORRUPT_RECORD: u8 = 0x05;

    pub fn ok() -> Self {
        Self {
            code: Self::OK,
            message: String::new(),
        }
    }

    pub fn rejected(code: u8, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn parse(payload: Bytes) -> Result<Self, FrameError> {
        let mut reader = PacketReader::new(payload);
        Ok(Self {
            code: reader.read_u8()?,
            message: reader.read_text8()?,
        })
    }
}

impl ServerFormat for LoginResult {
    const OPCODE: ServerOpcode = ServerOpcode::LoginResult;

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.code).write_string8(&self.message);
    }
}

/// Tells the client to reconnect elsewhere and present `credentials`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub address: Ipv4Addr,
    pub port: u16,
    pub credentials: RedirectCredentials,
    pub kind: RedirectKind,
}

impl Redirect {
    /// Reads a redirect back, as a client would.
    pub fn parse(payload: Bytes) -> Result<Self, FrameError> {
        let mut reader = PacketReader::new(payload);
        let address = Ipv4Addr::from(reader.read_u32()?);
        let port = reader.read_u16()?;
        let seed = reader.read_decimal8("seed")?;
        let salt = reader.read_string8()?.to_vec();
        let username = reader.read_text8()?;
        let serial = reader.read_decimal8("serial")?;
        let raw_kind = reader.read_text8()?;
        let kind = RedirectKind::from_wire(&raw_kind).ok_or(
            FrameError::InvalidNumber {
                field: "type",
                value: raw_kind,
            },
        )?;

        Ok(Self {
            address,
            port,
            credentials: RedirectCredentials {
                serial,
                username,
                salt,
                seed,
            },
            kind,
        })
    }
}

impl ServerFormat for Redirect {
    const OPCODE: ServerOpcode = ServerOpcode::Redirect;

    fn write(&self, writer: &mut PacketWriter) {
        writer
            .write_bytes(&self.address.octets())
            .write_u16(self.port)
            .write_string8(self.credentials.seed.to_string())
            .write_string8(&self.credentials.salt)
            .write_string8(&self.credentials.username)
            .write_string8(self.credentials.serial.to_string())
            .write_string8(self.kind.as_wire());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogoutAck;

impl ServerFormat for LogoutAck {
    const OPCODE: ServerOpcode = ServerOpcode::LogoutAck;

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(0x01);
    }
}

/// Text shown to the player. `kind` picks where the client shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemMessage {
    pub kind: u8,
    pub text: String,
}

impl SystemMessage {
    /// Bottom status bar.
    pub const BAR: u8 = 0x03;
    /// Modal popup.
    pub const POPUP: u8 = 0x08;

    pub fn bar(text: impl Into<String>) -> Self {
        Self {
            kind: Self::BAR,
            text: text.into(),
        }
    }

    pub fn popup(text: impl Into<String>) -> Self {
        Self {
            kind: Self::POPUP,
            text: text.into(),
        }
    }

    pub fn parse(payload: Bytes) -> Result<Self, FrameError> {
        let mut reader = PacketReader::new(payload);
        Ok(Self {
            kind: reader.read_u8()?,
            text: reader.read_text16()?,
        })
    }
}

impl ServerFormat for SystemMessage {
    const OPCODE: ServerOpcode = ServerOpcode::SystemMessage;

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.kind).write_string16(&self.text);
    }
}

// ---------------------------------------------------------------------------
// Map and movement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapLoaded {
    pub map_id: u16,
    pub width: u16,
    pub height: u16,
    pub name: String,
}

impl ServerFormat for MapLoaded {
    const OPCODE: ServerOpcode = ServerOpcode::MapLoaded;

    fn write(&self, writer: &mut PacketWriter) {
        writer
            .write_u16(self.map_id)
            .write_u16(self.width)
            .write_u16(self.height)
            .write_string8(&self.name);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub x: u16,
    pub y: u16,
}

impl Location {
    pub fn parse(payload: Bytes) -> Result<Self, FrameError> {
        let mut reader = PacketReader::new(payload);
        Ok(Self {
            x: reader.read_u16()?,
            y: reader.read_u16()?,
        })
    }
}

impl ServerFormat for Location {
    const OPCODE: ServerOpcode = ServerOpcode::Location;

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u16(self.x).write_u16(self.y);
    }
}

/// Confirms a step and echoes where it started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkAck {
    pub direction: u8,
    pub from_x: u16,
    pub from_y: u16,
}

impl ServerFormat for WalkAck {
    const OPCODE: ServerOpcode = ServerOpcode::WalkAck;

    fn write(&self, writer: &mut PacketWriter) {
        writer
            .write_u8(self.direction)
            .write_u16(self.from_x)
            .write_u16(self.from_y);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnNotice {
    pub serial: u32,
    pub direction: u8,
}

impl ServerFormat for TurnNotice {
    const OPCODE: ServerOpcode = ServerOpcode::Turn;

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u32(self.serial).write_u8(self.direction);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Animation {
    pub serial: u32,
    pub animation: u16,
    pub speed: u16,
}

impl ServerFormat for Animation {
    const OPCODE: ServerOpcode = ServerOpcode::Animation;

    fn write(&self, writer: &mut PacketWriter) {
        writer
            .write_u32(self.serial)
            .write_u16(self.animation)
            .write_u16(self.speed);
    }
}

/// Starts a cooldown timer on a skill slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownNotice {
    pub slot: u8,
    pub seconds: u32,
}

impl ServerFormat for CooldownNotice {
    const OPCODE: ServerOpcode = ServerOpcode::Cooldown;

    fn write(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.slot).write_u32(self.seconds);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupUpdate {
    pub members: Vec<String>,
}

impl ServerFormat for GroupUpdate {
    const OPCODE: ServerOpcode = ServerOpcode::GroupUpdate;

    fn write(&self, writer: &mut PacketWriter) {
        let count = self.members.len().min(u8::MAX as usize);
        writer.write_u8(count as u8);
        for member in &self.members[..count] {
            writer.write_string8(member);
        }
    }
}

// ---------------------------------------------------------------------------
// Portal descriptor
// ---------------------------------------------------------------------------

/// Marker byte between the descriptor header and its records.
const PORTAL_MARKER: u8 = 0x09;

/// One clickable destination on a world map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalDestination {
    /// Position on the world map screen.
    pub x: u16,
    pub y: u16,
    pub name: String,
    pub area_id: u16,
    /// Where the player lands in the target area.
    pub dest_x: u16,
    pub dest_y: u16,
}

impl PortalDestination {
    fn encoded_len(&self) -> usize {
        2 + 2 + 1 + self.name.len().min(u8::MAX as usize) + 2 + 2 + 2
    }
}

/// The world map screen for field `field_number`.
///
/// `destinations` may contain empty slots. They count toward the
/// declared count byte but emit no record, which is how the client
/// expects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalDescriptor {
    pub field_number: u16,
    pub destinations: Vec<Option<PortalDestination>>,
}

/// What a client reads back from a [`PortalDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPortalDescriptor {
    pub name: String,
    pub declared_count: u8,
    pub destinations: Vec<PortalDestination>,
}

impl PortalDescriptor {
    pub fn field_name(&self) -> String {
        format!("field{:03}", self.field_number)
    }

    /// Bytes this descriptor occupies once written.
    pub fn encoded_len(&self) -> usize {
        let header = 1 + self.field_name().len() + 1 + 1;
        header
            + self
                .destinations
                .iter()
                .flatten()
                .map(PortalDestination::encoded_len)
                .sum::<usize>()
    }

    /// Reads records until the payload runs out. The declared count is
    /// reported but not trusted.
    pub fn parse(payload: Bytes) -> Result<ParsedPortalDescriptor, FrameError> {
        let mut reader = PacketReader::new(payload);
        let name = reader.read_text8()?;
        let declared_count = reader.read_u8()?;
        let _marker = reader.read_u8()?;

        let mut destinations = Vec::new();
        while !reader.is_empty() {
            // Y goes out first.
            let y = reader.read_u16()?;
            let x = reader.read_u16()?;
            destinations.push(PortalDestination {
                x,
                y,
                name: reader.read_text8()?,
                area_id: reader.read_u16()?,
                dest_x: reader.read_u16()?,
                dest_y: reader.read_u16()?,
            });
        }

        Ok(ParsedPortalDescriptor {
            name,
            declared_count,
            destinations,
        })
    }
}

impl ServerFormat for PortalDescriptor {
    const OPCODE: ServerOpcode = ServerOpcode::PortalDescriptor;

    fn write(&self, writer: &mut PacketWriter) {
        let declared = self.destinations.len().min(u8::MAX as usize);
        writer
            .write_string8(self.field_name())
            .write_u8(declared as u8)
            .write_u8(PORTAL_MARKER);

        for dest in self.destinations.iter().flatten() {
            writer
                .write_u16(dest.y)
                .write_u16(dest.x)
                .write_string8(&dest.name)
                .write_u16(dest.area_id)
                .write_u16(dest.dest_x)
                .write_u16(dest.dest_y);
        }
    }
}

// ---------------------------------------------------------------------------
// Dialog
// ---------------------------------------------------------------------------

/// A dialog window: prompt plus answer buttons, shown on behalf of the
/// object with `serial`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogView {
    pub serial: u32,
    pub step: u16,
    pub prompt: String,
    pub answers: Vec<String>,
}

impl DialogView {
    /// Step id that tells the client to close its dialog window.
    pub const CLOSE_STEP: u16 = u16::MAX;

    pub fn closed(serial: u32) -> Self {
        Self {
            serial,
            step: Self::CLOSE_STEP,
            prompt: String::new(),
            answers: Vec::new(),
        }
    }

    pub fn is_close(&self) -> bool {
        self.step == Self::CLOSE_STEP
    }

    pub fn parse(payload: Bytes) -> Result<Self, FrameError> {
        let mut reader = PacketReader::new(payload);
        let serial = reader.read_u32()?;
        let step = reader.read_u16()?;
        let prompt = reader.read_text16()?;
        let count = reader.read_u8()?;
        let answers = (0..count)
            .map(|_| reader.read_text8())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            serial,
            step,
            prompt,
            answers,
        })
    }
}

impl ServerFormat for DialogView {
    const OPCODE: ServerOpcode = ServerOpcode::Dialog;

    fn write(&self, writer: &mut PacketWriter) {
        let count = self.answers.len().min(u8::MAX as usize);
        writer
            .write_u32(self.serial)
            .write_u16(self.step)
            .write_string16(&self.prompt)
            .write_u8(count as u8);
        for answer in &self.answers[..count] {
            writer.write_string8(answer);
        }
    }
}

// ---------------------------------------------------------------------------
// Boards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSummary {
    pub id: u16,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSummary {
    pub id: u16,
    pub author: String,
    pub subject: String,
}

/// Everything the server sends under the `BoardResult` opcode. The
/// first byte selects the shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardResponse {
    Boards(Vec<BoardSummary>),
    Posts {
        board: u16,
        posts: Vec<PostSummary>,
    },
    Post {
        board: u16,
        post_id: u16,
        author: String,
        subject: String,
        body: String,
    },
    /// Result of a post, delete or mail request.
    Outcome {
        success: bool,
        message: String,
    },
}

impl BoardResponse {
    const BOARDS: u8 = 0x01;
    const POSTS: u8 = 0x02;
    const POST: u8 = 0x03;
    const OUTCOME: u8 = 0x06;

    pub fn success(message: impl Into<String>) -> Self {
        Self::Outcome {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Outcome {
            success: false,
            message: message.into(),
        }
    }

    pub fn parse(payload: Bytes) -> Result<Self, FrameError> {
        let mut reader = PacketReader::new(payload);
        let kind = reader.read_u8()?;
        let response = match kind {
            Self::BOARDS => {
                let count = reader.read_u16()?;
                let boards = (0..count)
                    .map(|_| {
                        Ok(BoardSummary {
                            id: reader.read_u16()?,
                            name: reader.read_text8()?,
                        })
                    })
                    .collect::<Result<Vec<_>, FrameError>>()?;
                Self::Boards(boards)
            }
            Self::POSTS => {
                let board = reader.read_u16()?;
                let count = reader.read_u16()?;
                let posts = (0..count)
                    .map(|_| {
                        Ok(PostSummary {
                            id: reader.read_u16()?,
                            author: reader.read_text8()?,
                            subject: reader.read_text8()?,
                        })
                    })
                    .collect::<Result<Vec<_>, FrameError>>()?;
                Self::Posts { board, posts }
            }
            Self::POST => Self::Post {
                board: reader.read_u16()?,
                post_id: reader.read_u16()?,
                author: reader.read_text8()?,
                subject: reader.read_text8()?,
                body: reader.read_text16()?,
            },
            Self::OUTCOME => Self::Outcome {
                success: reader.read_u8()? != 0,
                message: reader.read_text8()?,
            },
            other => return Err(FrameError::UnknownOpcode(other)),
        };
        Ok(response)
    }
}

impl ServerFormat for BoardResponse {
    const OPCODE: ServerOpcode = ServerOpcode::BoardResult;

    fn write(&self, writer: &mut PacketWriter) {
        match self {
            Self::Boards(boards) => {
                writer.write_u8(Self::BOARDS).write_u16(boards.len() as u16);
                for board in boards {
                    writer.write_u16(board.id).write_string8(&board.name);
                }
            }
            Self::Posts { board, posts } => {
                writer
                    .write_u8(Self::POSTS)
                    .write_u16(*board)
                    .write_u16(posts.len() as u16);
                for post in posts {
                    writer
                        .write_u16(post.id)
                        .write_string8(&post.author)
                        .write_string8(&post.subject);
                }
            }
            Self::Post {
                board,
                post_id,
                author,
                subject,
                body,
            } => {
                writer
                    .write_u8(Self::POST)
                    .write_u16(*board)
                    .write_u16(*post_id)
                    .write_string8(author)
                    .write_string8(subject)
                    .write_string16(body);
            }
            Self::Outcome { success, message } => {
                writer
                    .write_u8(Self::OUTCOME)
                    .write_u8(u8::from(*success))
                    .write_string8(message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_ack_standard_is_four_bytes() {
        let packet = EncryptionAck {
            mode: CipherMode::Standard,
        }
        .to_packet();

        assert_eq!(packet.opcode, 0x00);
        assert_eq!(&packet.payload[..], &[0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_encryption_ack_extended_is_five_bytes() {
        let packet = EncryptionAck {
            mode: CipherMode::Extended,
        }
        .to_packet();

        assert_eq!(&packet.payload[..], &[0x01, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_keepalive_ack_is_single_zero() {
        assert_eq!(&KeepaliveAck.to_packet().payload[..], &[0x00]);
    }

    fn destination(x: u16, y: u16, name: &str) -> PortalDestination {
        PortalDestination {
            x,
            y,
            name: name.into(),
            area_id: 500,
            dest_x: 10,
            dest_y: 12,
        }
    }

    #[test]
    fn test_portal_descriptor_name_is_zero_padded() {
        let descriptor = PortalDescriptor {
            field_number: 7,
            destinations: Vec::new(),
        };
        assert_eq!(descriptor.field_name(), "field007");
    }

    #[test]
    fn test_portal_descriptor_size_counts_only_present_records() {
        let descriptor = PortalDescriptor {
            field_number: 1,
            destinations: vec![
                Some(destination(100, 40, "Mileth")),
                None,
                Some(destination(220, 80, "Abel__")),
                Some(destination(30, 190, "Rucesi")),
            ],
        };

        let payload = descriptor.to_packet().payload;

        // name (1 + 8), count, marker
        let header = 1 + 8 + 1 + 1;
        // y, x, name (1 + 6), area, dest x, dest y
        let record = 2 + 2 + 1 + 6 + 2 + 2 + 2;
        assert_eq!(payload.len(), header + 3 * record);
        assert_eq!(descriptor.encoded_len(), payload.len());
        // Declared count still includes the empty slot.
        assert_eq!(payload[9], 4);
        assert_eq!(payload[10], 0x09);
    }

    #[test]
    fn test_portal_descriptor_parse_undoes_axis_swap() {
        let descriptor = PortalDescriptor {
            field_number: 12,
            destinations: vec![
                Some(destination(100, 40, "Mileth")),
                None,
                Some(destination(220, 80, "Abel")),
            ],
        };
        let payload = descriptor.to_packet().payload;

        // First record starts right after the header: Y first.
        assert_eq!(&payload[11..13], &40u16.to_be_bytes());
        assert_eq!(&payload[13..15], &100u16.to_be_bytes());

        let parsed = PortalDescriptor::parse(payload).unwrap();
        let coords: Vec<(u16, u16)> =
            parsed.destinations.iter().map(|d| (d.x, d.y)).collect();

        assert_eq!(parsed.name, "field012");
        assert_eq!(parsed.declared_count, 3);
        assert_eq!(coords, vec![(100, 40), (220, 80)]);
    }

    #[test]
    fn test_redirect_layout_and_parse() {
        let redirect = Redirect {
            address: Ipv4Addr::new(127, 0, 0, 1),
            port: 2611,
            credentials: RedirectCredentials {
                serial: 99,
                username: "ayla".into(),
                salt: b"pepper".to_vec(),
                seed: 3,
            },
            kind: RedirectKind::LoginHandoff,
        };

        let payload = redirect.to_packet().payload;

        assert_eq!(&payload[..4], &[127, 0, 0, 1]);
        assert_eq!(&payload[4..6], &2611u16.to_be_bytes());
        assert_eq!(&payload[6..8], &[1, b'3']);
        assert_eq!(&payload[payload.len() - 2..], &[1, b'1']);
        assert_eq!(Redirect::parse(payload).unwrap(), redirect);
    }

    #[test]
    fn test_dialog_view_closed_uses_sentinel_step() {
        let view = DialogView::closed(42);
        let parsed = DialogView::parse(view.to_packet().payload).unwrap();

        assert!(parsed.is_close());
        assert_eq!(parsed.serial, 42);
        assert!(parsed.answers.is_empty());
    }

    #[test]
    fn test_board_outcome_layout() {
        let payload = BoardResponse::failure("gone").to_packet().payload;

        assert_eq!(&payload[..], &[0x06, 0x00, 4, b'g', b'o', b'n', b'e']);
    }

    #[test]
    fn test_board_posts_parse() {
        let response = BoardResponse::Posts {
            board: 2,
            posts: vec![PostSummary {
                id: 5,
                author: "Ayla".into(),
                subject: "Selling wolf fur".into(),
            }],
        };

        assert_eq!(
            BoardResponse::parse(response.to_packet().payload).unwrap(),
            response
        );
    }
}
