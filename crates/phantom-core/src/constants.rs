//! Core constants for the Phantom camera protocol.
//!
//! This module defines the protocol-level constants shared by the client,
//! the data reassembly engine and the camera emulator. All values are fixed
//! by the camera firmware; changing them breaks compatibility with real
//! cameras.
//!
//! # Protocol Structure
//!
//! Commands and responses on the control connection are single text lines:
//!
//! ```text
//! <verb> [<tokens> | {key:value, ...}]<CR><LF>
//! OK! [{key:value, ...}]<CR><LF>
//! ERR: <reason><CR><LF>
//! ```
//!
//! Multi-line responses stay on one physical line: their lines are joined by the
//! two *characters* `\r\n` (backslash, `r`, backslash, `n`), not by a real line break.
//!
//! # Usage
//!
//! ```
//! use phantom_core::constants::*;
//!
//! assert_eq!(CONTROL_PORT, 7115);
//! assert_eq!(LINE_TERMINATOR, "\r\n");
//! assert_eq!(RESPONSE_SEPARATOR, "\\r\\n");
//! ```

// ============================================================================
// Control Connection
// ============================================================================

/// TCP port on which every camera accepts its control connection.
pub const CONTROL_PORT: u16 = 7115;

/// Default local port for the secondary TCP data channel.
///
/// The camera connects back to this port after a `startdata` command.
pub const DEFAULT_DATA_PORT: u16 = 7116;

/// Default timeout for control connection I/O, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Real line terminator ending every command and response.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Escaped separator joining the lines of a multi-line response.
///
/// This is the four-character text `\r\n`, distinct from [`LINE_TERMINATOR`].
pub const RESPONSE_SEPARATOR: &str = r"\r\n";

/// Success marker preceding a response payload.
pub const OK_MARKER: &str = "OK!";

/// Alternate spelling of the success marker sent by some firmware revisions.
pub const OK_MARKER_ALT: &str = "Ok!";

/// Failure marker; the rest of the line is the reason.
pub const ERROR_MARKER: &str = "ERR:";

// ============================================================================
// Command Verbs
// ============================================================================

pub const CMD_GET: &str = "get";
pub const CMD_SET: &str = "set";
pub const CMD_IMG: &str = "img";
pub const CMD_XIMG: &str = "ximg";
pub const CMD_STARTDATA: &str = "startdata";
pub const CMD_ILOAD: &str = "iload";
pub const CMD_TRIG: &str = "trig";
pub const CMD_REC: &str = "rec";
pub const CMD_BYE: &str = "bye";

// ============================================================================
// Raw Ethernet Data Channel
// ============================================================================

/// Ethernet protocol identifier carried by every image frame a camera sends
/// over its 10G interface.
pub const ETHERNET_PROTOCOL_ID: u16 = 0x88B7;

/// Length of a hardware address in bytes.
pub const MAC_LENGTH: usize = 6;

/// Plain Ethernet header: destination, source, protocol id.
pub const STANDARD_HEADER_LENGTH: usize = 14;

/// Zero padding that follows the protocol id in the padded frame layout.
pub const HEADER_PADDING_LENGTH: usize = 18;

/// Padded header used by the 10G variant of the data channel.
pub const PADDED_HEADER_LENGTH: usize = STANDARD_HEADER_LENGTH + HEADER_PADDING_LENGTH;

/// Default total size of one raw frame, header included.
pub const DEFAULT_FRAME_SIZE: usize = 1500;

/// Largest frame the raw listener accepts in one receive call.
pub const MAX_RECEIVE_FRAME: usize = 10_000;

/// Default network interface for the raw data channel.
pub const DEFAULT_INTERFACE: &str = "enp1s0";

// ============================================================================
// TCP Data Channel
// ============================================================================

/// Number of trailing bytes the camera may drop from a TCP image transfer.
///
/// A transfer that ends at most this many bytes short is padded with zeros.
pub const STREAM_TOLERANCE: usize = 100;

/// Read chunk size used while receiving image data.
pub const DATA_CHUNK_SIZE: usize = 512 * 1024;

/// Largest image payload a client accepts from an image response (1 GiB).
pub const MAX_IMAGE_BYTES: usize = 1 << 30;

// ============================================================================
// Discovery
// ============================================================================

/// UDP port cameras listen on for discovery broadcasts.
pub const DISCOVERY_PORT: u16 = 7380;

/// Payload of a discovery request.
pub const DISCOVERY_REQUEST: &[u8] = b"phantom?";

/// Marker that every valid discovery response starts with.
pub const DISCOVERY_MARKER: &str = "PH16";

/// How long discovery waits for responses, in milliseconds.
pub const DISCOVERY_TIMEOUT_MS: u64 = 5_000;
