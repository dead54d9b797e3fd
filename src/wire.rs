//! On-the-wire RTP and FEC header layouts (§6). All multi-byte fields are
//! big-endian, matching the sender in `moonshine/src/session/stream/audio/encoder.rs`
//! and `src/session/stream/mod.rs::RtpHeader` (which use `to_be_bytes` for the
//! same fields in the opposite direction).

#[cfg(test)]
use crate::config::PAYLOAD_TYPE_AUDIO;

/// `0x80`: RTPv2, no padding, no extension, no CSRC.
pub const RTP_VERSION_FLAGS: u8 = 0x80;

pub const RTP_HEADER_LEN: usize = 12;
pub const FEC_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
	pub version_flags: u8,
	pub payload_type: u8,
	pub sequence_number: u16,
	pub timestamp: u32,
	pub ssrc: u32,
}

impl RtpHeader {
	pub fn parse(bytes: &[u8]) -> Option<RtpHeader> {
		if bytes.len() < RTP_HEADER_LEN {
			return None;
		}

		Some(RtpHeader {
			version_flags: bytes[0],
			payload_type: bytes[1],
			sequence_number: u16::from_be_bytes([bytes[2], bytes[3]]),
			timestamp: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
			ssrc: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
		})
	}

	pub fn write(&self, out: &mut [u8]) {
		debug_assert!(out.len() >= RTP_HEADER_LEN);
		out[0] = self.version_flags;
		out[1] = self.payload_type;
		out[2..4].copy_from_slice(&self.sequence_number.to_be_bytes());
		out[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
		out[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
	}
}

/// FEC header, immediately following the RTP header for `payload_type == 127`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FecHeader {
	pub payload_type: u8,
	pub fec_shard_index: u8,
	pub base_sequence_number: u16,
	pub base_timestamp: u32,
	pub ssrc: u32,
}

impl FecHeader {
	pub fn parse(bytes: &[u8]) -> Option<FecHeader> {
		if bytes.len() < FEC_HEADER_LEN {
			return None;
		}

		Some(FecHeader {
			payload_type: bytes[0],
			fec_shard_index: bytes[1],
			base_sequence_number: u16::from_be_bytes([bytes[2], bytes[3]]),
			base_timestamp: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
			ssrc: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
		})
	}

	#[cfg(test)]
	pub fn write(&self, out: &mut [u8]) {
		debug_assert!(out.len() >= FEC_HEADER_LEN);
		out[0] = self.payload_type;
		out[1] = self.fec_shard_index;
		out[2..4].copy_from_slice(&self.base_sequence_number.to_be_bytes());
		out[4..8].copy_from_slice(&self.base_timestamp.to_be_bytes());
		out[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
	}
}
