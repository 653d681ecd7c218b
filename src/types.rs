//! Wire protocol types for client-server communication.
//!
//! The connection layer only speaks the bootstrap surface of the protocol:
//! HELLO, AUTH, PING, and GET_CONFIG. Frames are a fixed little-endian
//! header followed by key and value (commands) or payload (responses).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    /// Invalid opcode
    #[error("Invalid opcode: {0}")]
    InvalidOpCode(u8),

    /// Invalid status code
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(u8),

    /// Message too large
    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),
}

/// Protocol version
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Size of a serialized command header in bytes
pub const COMMAND_HEADER_SIZE: usize = 24;
/// Size of a serialized response header in bytes
pub const RESPONSE_HEADER_SIZE: usize = 16;

/// Command opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Feature/version exchange performed once per connection
    Hello = 0x01,
    /// PLAIN username/password authentication
    Auth = 0x02,
    /// Liveness and readiness probe
    Ping = 0x03,
    /// Fetch the cluster topology
    GetConfig = 0x04,
}

impl TryFrom<u8> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(OpCode::Hello),
            0x02 => Ok(OpCode::Auth),
            0x03 => Ok(OpCode::Ping),
            0x04 => Ok(OpCode::GetConfig),
            _ => Err(ProtocolError::InvalidOpCode(value)),
        }
    }
}

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// Operation succeeded
    Ok = 0x00,
    /// General error
    Error = 0x01,
    /// Authentication required before this operation
    AuthRequired = 0x02,
    /// Authentication failed
    AuthFailed = 0x03,
    /// Permission denied
    PermissionDenied = 0x04,
    /// Node is up but not yet able to serve traffic
    NotReady = 0x05,
}

impl TryFrom<u8> for StatusCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        match value {
            0x00 => Ok(StatusCode::Ok),
            0x01 => Ok(StatusCode::Error),
            0x02 => Ok(StatusCode::AuthRequired),
            0x03 => Ok(StatusCode::AuthFailed),
            0x04 => Ok(StatusCode::PermissionDenied),
            0x05 => Ok(StatusCode::NotReady),
            _ => Err(ProtocolError::InvalidStatusCode(value)),
        }
    }
}

/// Command header (24 bytes, little-endian)
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CommandHeader {
    /// Operation code
    pub opcode: u8,
    /// Command flags
    pub flags: u8,
    /// Protocol version
    pub version: u8,
    /// Reserved for future use
    pub reserved: u8,
    /// Client-local sequence ID
    pub seq: u32,
    /// Key length in bytes
    pub key_len: u32,
    /// Value length in bytes
    pub value_len: u32,
    /// Extra data
    pub extra: u64,
}

impl CommandHeader {
    /// Create a new command header
    pub fn new(opcode: OpCode, seq: u32) -> Self {
        Self {
            opcode: opcode as u8,
            flags: 0,
            version: PROTOCOL_VERSION,
            reserved: 0,
            seq,
            key_len: 0,
            value_len: 0,
            extra: 0,
        }
    }

    /// Set the key and value lengths
    pub fn with_lengths(mut self, key_len: u32, value_len: u32) -> Self {
        self.key_len = key_len;
        self.value_len = value_len;
        self
    }

    /// Deserialize a command header from bytes
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < COMMAND_HEADER_SIZE {
            return Err(ProtocolError::InvalidFormat("command header too short".into()));
        }

        Ok(Self {
            opcode: bytes.get_u8(),
            flags: bytes.get_u8(),
            version: bytes.get_u8(),
            reserved: bytes.get_u8(),
            seq: bytes.get_u32_le(),
            key_len: bytes.get_u32_le(),
            value_len: bytes.get_u32_le(),
            extra: bytes.get_u64_le(),
        })
    }
}

/// Command structure
#[derive(Debug, Clone)]
pub struct Command {
    /// Command header
    pub header: CommandHeader,
    /// Key (if any)
    pub key: Bytes,
    /// Value (if any)
    pub value: Bytes,
}

impl Command {
    /// Create a new command
    pub fn new(header: CommandHeader, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        let key = key.into();
        let value = value.into();
        Self {
            header: header.with_lengths(key.len() as u32, value.len() as u32),
            key,
            value,
        }
    }

    /// Create a HELLO command
    pub fn hello(seq: u32, payload: impl Into<Bytes>) -> Self {
        Self::new(CommandHeader::new(OpCode::Hello, seq), Bytes::new(), payload)
    }

    /// Create an AUTH command
    pub fn auth(seq: u32, payload: impl Into<Bytes>) -> Self {
        Self::new(CommandHeader::new(OpCode::Auth, seq), Bytes::new(), payload)
    }

    /// Create a PING command
    pub fn ping(seq: u32) -> Self {
        Self::new(
            CommandHeader::new(OpCode::Ping, seq),
            Bytes::new(),
            Bytes::new(),
        )
    }

    /// Create a GET_CONFIG command
    pub fn get_config(seq: u32) -> Self {
        Self::new(
            CommandHeader::new(OpCode::GetConfig, seq),
            Bytes::new(),
            Bytes::new(),
        )
    }

    /// Serialize the command to bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buf =
            BytesMut::with_capacity(COMMAND_HEADER_SIZE + self.key.len() + self.value.len());

        // Header is little-endian throughout
        buf.put_u8(self.header.opcode);
        buf.put_u8(self.header.flags);
        buf.put_u8(self.header.version);
        buf.put_u8(self.header.reserved);
        buf.put_u32_le(self.header.seq);
        buf.put_u32_le(self.header.key_len);
        buf.put_u32_le(self.header.value_len);
        buf.put_u64_le(self.header.extra);

        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);

        buf.freeze()
    }
}

/// Response header (16 bytes, little-endian)
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct ResponseHeader {
    /// Status code
    pub status: u8,
    /// Response flags
    pub flags: u8,
    /// Reserved
    pub reserved: u16,
    /// Sequence number
    pub seq: u32,
    /// Payload length
    pub payload_len: u32,
    /// Extra data
    pub extra: u32,
}

impl ResponseHeader {
    /// Create a new response header
    pub fn new(status: StatusCode, seq: u32) -> Self {
        Self {
            status: status as u8,
            flags: 0,
            reserved: 0,
            seq,
            payload_len: 0,
            extra: 0,
        }
    }

    /// Set the payload length
    pub fn with_payload_len(mut self, len: u32) -> Self {
        self.payload_len = len;
        self
    }
}

/// Response structure
#[derive(Debug, Clone)]
pub struct Response {
    /// Response header
    pub header: ResponseHeader,
    /// Response payload
    pub payload: Bytes,
}

impl Response {
    /// Create a new response
    pub fn new(header: ResponseHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            header: header.with_payload_len(payload.len() as u32),
            payload,
        }
    }

    /// Create a success response
    pub fn ok(seq: u32, payload: impl Into<Bytes>) -> Self {
        Self::new(ResponseHeader::new(StatusCode::Ok, seq), payload)
    }

    /// Create a response with the given status and no payload
    pub fn status_only(status: StatusCode, seq: u32) -> Self {
        Self::new(ResponseHeader::new(status, seq), Bytes::new())
    }

    /// Serialize the response to bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RESPONSE_HEADER_SIZE + self.payload.len());

        buf.put_u8(self.header.status);
        buf.put_u8(self.header.flags);
        buf.put_u16_le(self.header.reserved);
        buf.put_u32_le(self.header.seq);
        buf.put_u32_le(self.header.payload_len);
        buf.put_u32_le(self.header.extra);

        buf.extend_from_slice(&self.payload);

        buf.freeze()
    }

    /// Deserialize a response from bytes
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < RESPONSE_HEADER_SIZE {
            return Err(ProtocolError::InvalidFormat("response too short".into()));
        }

        // Header is little-endian throughout
        let status = StatusCode::try_from(bytes.get_u8())?;
        let flags = bytes.get_u8();
        let reserved = bytes.get_u16_le();
        let seq = bytes.get_u32_le();
        let payload_len = bytes.get_u32_le() as usize;
        let extra = bytes.get_u32_le();

        if bytes.remaining() < payload_len {
            return Err(ProtocolError::InvalidFormat(
                "invalid payload length".into(),
            ));
        }

        let payload = bytes.copy_to_bytes(payload_len);

        Ok(Self {
            header: ResponseHeader {
                status: status as u8,
                flags,
                reserved,
                seq,
                payload_len: payload_len as u32,
                extra,
            },
            payload,
        })
    }

    /// Check if the response indicates success
    pub fn is_ok(&self) -> bool {
        matches!(StatusCode::try_from(self.header.status), Ok(StatusCode::Ok))
    }

    /// Get the status code
    pub fn status(&self) -> StatusCode {
        StatusCode::try_from(self.header.status).unwrap_or(StatusCode::Error)
    }
}

// ============================================================================
// Handshake and topology payloads
// ============================================================================

/// HELLO request payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloRequest {
    /// Client agent string
    pub agent: String,
    /// Protocol version the client speaks
    pub protocol: u8,
}

/// HELLO response payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloResponse {
    /// Server version string
    pub version: String,
    /// Identifier of the answering node
    pub node: String,
}

/// AUTH request payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
}

/// AUTH response payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Whether authentication succeeded
    pub success: bool,
    /// Error message on failure
    pub error: Option<String>,
}

/// Cluster topology as reported by the manager service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Cluster name
    pub name: String,
    /// Member nodes
    pub nodes: Vec<NodeConfig>,
}

/// A single node entry in the cluster topology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Hostname or IP address
    pub host: String,
    /// Data service port
    pub data_port: u16,
    /// Manager service port
    pub manager_port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_header_survives_framing() {
        let cmd = Command::hello(7, Bytes::from_static(b"{\"agent\":\"x\",\"protocol\":1}"));
        let bytes = cmd.to_bytes();
        assert_eq!(bytes.len(), COMMAND_HEADER_SIZE + cmd.value.len());

        let header = CommandHeader::from_bytes(&bytes).unwrap();
        assert_eq!(header.opcode, OpCode::Hello as u8);
        assert_eq!(header.seq, 7);
        assert_eq!(header.key_len, 0);
        assert_eq!(header.value_len, cmd.value.len() as u32);
    }

    #[test]
    fn response_status_maps_through_framing() {
        let bytes = Response::status_only(StatusCode::NotReady, 3).to_bytes();
        let response = Response::from_bytes(&bytes).unwrap();
        assert_eq!(response.status(), StatusCode::NotReady);
        assert_eq!(response.header.seq, 3);
        assert!(!response.is_ok());
    }

    #[test]
    fn rejects_unknown_opcode() {
        assert!(OpCode::try_from(0x7F).is_err());
    }
}
