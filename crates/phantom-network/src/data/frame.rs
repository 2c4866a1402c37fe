//! Raw Ethernet frame layout of the 10G data channel.
//!
//! ```text
//! [6 bytes dst MAC][6 bytes src MAC][2 bytes protocol id][18 bytes zero padding][payload]
//! ```
//!
//! The padding is only present in the [`HeaderLayout::Padded`] variant; a
//! deployment uses one layout for every frame.

use super::TransferSession;
use crate::TransferError;
use phantom_core::{MacAddress, constants::*};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Header length variant, fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderLayout {
    /// Plain 14-byte Ethernet header.
    Standard,
    /// 14-byte header followed by 18 reserved zero bytes.
    #[default]
    Padded,
}

impl HeaderLayout {
    pub fn header_len(&self) -> usize {
        match self {
            HeaderLayout::Standard => STANDARD_HEADER_LENGTH,
            HeaderLayout::Padded => PADDED_HEADER_LENGTH,
        }
    }
}

/// One parsed frame, borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetFrame<'a> {
    pub destination: MacAddress,
    pub source: MacAddress,
    pub protocol_id: u16,
    pub payload: &'a [u8],
}

impl<'a> EthernetFrame<'a> {
    /// Split `bytes` into header fields and payload. `None` if the frame is
    /// shorter than the header.
    pub fn parse(bytes: &'a [u8], layout: HeaderLayout) -> Option<Self> {
        if bytes.len() < layout.header_len() {
            return None;
        }
        let mac = |offset: usize| {
            let mut octets = [0u8; MAC_LENGTH];
            octets.copy_from_slice(&bytes[offset..offset + MAC_LENGTH]);
            MacAddress::new(octets)
        };
        Some(Self {
            destination: mac(0),
            source: mac(MAC_LENGTH),
            protocol_id: u16::from_be_bytes([bytes[12], bytes[13]]),
            payload: &bytes[layout.header_len()..],
        })
    }
}

/// Build the header shared by every frame of one transfer.
pub fn build_header(
    source: MacAddress,
    destination: MacAddress,
    protocol_id: u16,
    layout: HeaderLayout,
) -> Vec<u8> {
    let mut header = Vec::with_capacity(layout.header_len());
    header.extend_from_slice(&destination.octets());
    header.extend_from_slice(&source.octets());
    header.extend_from_slice(&protocol_id.to_be_bytes());
    header.resize(layout.header_len(), 0);
    header
}

/// Fragment `payload` into frames of at most `frame_size` bytes.
///
/// # Errors
/// Returns `TransferError::InvalidFrame` if `frame_size` leaves no room for
/// payload after the header.
pub fn build_frames(
    payload: &[u8],
    source: MacAddress,
    destination: MacAddress,
    protocol_id: u16,
    frame_size: usize,
    layout: HeaderLayout,
) -> Result<Vec<Vec<u8>>, TransferError> {
    let header = build_header(source, destination, protocol_id, layout);
    let room = frame_size.saturating_sub(header.len());
    if room == 0 {
        return Err(TransferError::InvalidFrame(format!(
            "frame size {frame_size} does not exceed the {}-byte header",
            header.len()
        )));
    }

    Ok(payload
        .chunks(room)
        .map(|slice| {
            let mut frame = Vec::with_capacity(header.len() + slice.len());
            frame.extend_from_slice(&header);
            frame.extend_from_slice(slice);
            frame
        })
        .collect())
}

/// Collects the payloads of matching frames into one transfer.
#[derive(Debug)]
pub struct FrameAssembler {
    protocol_id: u16,
    layout: HeaderLayout,
    session: TransferSession,
    discarded: usize,
}

impl FrameAssembler {
    pub fn new(protocol_id: u16, layout: HeaderLayout) -> Self {
        Self {
            protocol_id,
            layout,
            session: TransferSession::new(),
            discarded: 0,
        }
    }

    /// Declare the payload size. Returns `true` if already complete.
    pub fn set_expected(&mut self, size: usize) -> bool {
        self.session.set_expected(size)
    }

    /// Feed one received frame. Frames with another protocol id, or shorter
    /// than the header, are discarded. Returns `true` once complete.
    pub fn accept(&mut self, bytes: &[u8]) -> bool {
        match EthernetFrame::parse(bytes, self.layout) {
            Some(frame) if frame.protocol_id == self.protocol_id => {
                self.session.push(frame.payload)
            }
            other => {
                self.discarded += 1;
                trace!(
                    protocol_id = ?other.map(|f| f.protocol_id),
                    len = bytes.len(),
                    "Discarded frame"
                );
                self.session.is_complete()
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    pub fn received(&self) -> usize {
        self.session.received()
    }

    /// Number of frames ignored so far.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Payload of the completed transfer, truncated to the declared size.
    pub fn take(&mut self) -> Vec<u8> {
        self.session.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: MacAddress = MacAddress::new([0x02, 0, 0, 0, 0, 0x01]);
    const DST: MacAddress = MacAddress::new([0x02, 0, 0, 0, 0, 0x02]);

    #[test]
    fn test_padded_header_layout() {
        let header = build_header(SRC, DST, 0x88B7, HeaderLayout::Padded);
        assert_eq!(header.len(), 32);
        assert_eq!(&header[..6], &DST.octets());
        assert_eq!(&header[6..12], &SRC.octets());
        assert_eq!(&header[12..14], &[0x88, 0xB7]);
        assert!(header[14..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_build_frames_fragments_payload() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
        let frames = build_frames(&payload, SRC, DST, 0x88B7, 1500, HeaderLayout::Padded).unwrap();

        // 1468 payload bytes per frame
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].len(), 1500);
        assert_eq!(frames[1].len(), 1500);
        assert_eq!(frames[2].len(), 32 + 3000 - 2 * 1468);

        let rebuilt: Vec<u8> = frames.iter().flat_map(|f| f[32..].to_vec()).collect();
        assert_eq!(rebuilt, payload);
    }

    #[test]
    fn test_build_frames_rejects_tiny_frame_size() {
        assert!(matches!(
            build_frames(&[1, 2, 3], SRC, DST, 0x88B7, 32, HeaderLayout::Padded),
            Err(TransferError::InvalidFrame(_))
        ));
        assert!(build_frames(&[1, 2, 3], SRC, DST, 0x88B7, 15, HeaderLayout::Standard).is_ok());
    }

    #[test]
    fn test_parse_frame() {
        let frames = build_frames(&[9, 8, 7], SRC, DST, 0x88B7, 100, HeaderLayout::Standard).unwrap();
        let frame = EthernetFrame::parse(&frames[0], HeaderLayout::Standard).unwrap();
        assert_eq!(frame.destination, DST);
        assert_eq!(frame.source, SRC);
        assert_eq!(frame.protocol_id, 0x88B7);
        assert_eq!(frame.payload, &[9, 8, 7]);
        assert!(EthernetFrame::parse(&frames[0][..10], HeaderLayout::Standard).is_none());
    }

    #[test]
    fn test_assembler_ignores_foreign_protocol() {
        let mut assembler = FrameAssembler::new(0x88B7, HeaderLayout::Padded);
        assembler.set_expected(100);

        let foreign = build_frames(&[0xAA; 64], SRC, DST, 0x0800, 1500, HeaderLayout::Padded).unwrap();
        assert!(!assembler.accept(&foreign[0]));
        assert_eq!(assembler.received(), 0);
        assert_eq!(assembler.discarded(), 1);

        assert!(!assembler.accept(&[0u8; 8]));
        assert_eq!(assembler.discarded(), 2);
    }

    #[test]
    fn test_assembler_truncates_overshoot() {
        let mut assembler = FrameAssembler::new(0x88B7, HeaderLayout::Padded);
        assembler.set_expected(100);

        let first = build_frames(&[1; 60], SRC, DST, 0x88B7, 1500, HeaderLayout::Padded).unwrap();
        let second = build_frames(&[2; 60], SRC, DST, 0x88B7, 1500, HeaderLayout::Padded).unwrap();
        assert!(!assembler.accept(&first[0]));
        assert!(assembler.accept(&second[0]));

        let bytes = assembler.take();
        assert_eq!(bytes.len(), 100);
        assert!(bytes[..60].iter().all(|&b| b == 1));
        assert!(bytes[60..].iter().all(|&b| b == 2));
    }

    #[test]
    fn test_assembler_buffers_before_size_known() {
        let mut assembler = FrameAssembler::new(0x88B7, HeaderLayout::Standard);
        let frames = build_frames(&[5; 40], SRC, DST, 0x88B7, 34, HeaderLayout::Standard).unwrap();
        for frame in &frames {
            assert!(!assembler.accept(frame));
        }
        assert!(assembler.set_expected(40));
        assert_eq!(assembler.take(), vec![5; 40]);
    }
}
