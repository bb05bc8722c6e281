//! Opcode tables for both directions.
//!
//! The opcode set is fixed by the client version we speak. Each enum
//! knows its wire byte and whether the payload goes through the packet
//! cipher ("secured") or travels in the clear.

use std::fmt;

use crate::FrameError;

/// Declares an opcode enum with `u8` discriminants, a `TryFrom<u8>`
/// impl, and a list of the variants that bypass the cipher.
macro_rules! opcodes {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
        plaintext: [$($plain:ident),* $(,)?]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $name {
            /// Every opcode in this direction, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the wire byte.
            pub fn as_u8(self) -> u8 {
                self as u8
            }

            /// Returns `true` if payloads with this opcode pass through
            /// the packet cipher.
            pub fn is_secured(self) -> bool {
                !matches!(self, $($name::$plain)|*)
            }
        }

        impl TryFrom<u8> for $name {
            type Error = FrameError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok($name::$variant), )+
                    other => Err(FrameError::UnknownOpcode(other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:?}(0x{:02X})", self, self.as_u8())
            }
        }
    };
}

opcodes! {
    /// Packets a client sends to the server.
    pub enum ClientOpcode {
        /// Username + password at the login role.
        Login = 0x03,
        MapDataRequest = 0x05,
        Walk = 0x06,
        LeaveGame = 0x0B,
        /// Redirect credentials presented at the world role.
        EnterWorld = 0x10,
        Turn = 0x11,
        Assail = 0x13,
        GroupRequest = 0x2E,
        Refresh = 0x38,
        /// Answer chosen from a menu (1-based index).
        MenuResponse = 0x39,
        /// Next/back/close navigation in a dialog.
        DialogResponse = 0x3A,
        Board = 0x3B,
        UseSkill = 0x3E,
        WorldMapClick = 0x3F,
        Click = 0x43,
        Heartbeat = 0x45,
        EncryptionInit = 0x57,
        TimerSync = 0x75,
        SocialStatus = 0x79,
    }
    plaintext: [Login, EnterWorld, Heartbeat, EncryptionInit, TimerSync]
}

opcodes! {
    /// Packets the server sends to a client.
    pub enum ServerOpcode {
        EncryptionAck = 0x00,
        LoginResult = 0x02,
        Redirect = 0x03,
        Location = 0x04,
        SystemMessage = 0x0A,
        WalkAck = 0x0B,
        Turn = 0x11,
        Animation = 0x1A,
        PortalDescriptor = 0x2E,
        GroupUpdate = 0x2F,
        Dialog = 0x30,
        BoardResult = 0x31,
        Cooldown = 0x3F,
        Ack = 0x49,
        LogoutAck = 0x4C,
        MapLoaded = 0x58,
    }
    plaintext: [EncryptionAck, LoginResult, Redirect, Ack, LogoutAck]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_opcode_round_trips_every_variant() {
        for op in ClientOpcode::ALL {
            assert_eq!(ClientOpcode::try_from(op.as_u8()), Ok(*op));
        }
    }

    #[test]
    fn test_client_opcode_unknown_byte_is_error() {
        assert_eq!(
            ClientOpcode::try_from(0x00),
            Err(FrameError::UnknownOpcode(0x00))
        );
    }

    #[test]
    fn test_handshake_and_keepalive_bypass_cipher() {
        assert!(!ClientOpcode::EncryptionInit.is_secured());
        assert!(!ClientOpcode::EnterWorld.is_secured());
        assert!(!ClientOpcode::Heartbeat.is_secured());
        assert!(!ServerOpcode::EncryptionAck.is_secured());
        assert!(!ServerOpcode::Redirect.is_secured());
        assert!(!ServerOpcode::Ack.is_secured());
    }

    #[test]
    fn test_game_packets_are_secured() {
        assert!(ClientOpcode::Walk.is_secured());
        assert!(ClientOpcode::DialogResponse.is_secured());
        assert!(ClientOpcode::Board.is_secured());
        assert!(ServerOpcode::Dialog.is_secured());
        assert!(ServerOpcode::PortalDescriptor.is_secured());
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(ClientOpcode::Walk.to_string(), "Walk(0x06)");
    }
}
