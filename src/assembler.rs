//! Block identity derivation, lookup/creation, and shard storage (spec.md §4.2-§4.4).

use crate::block::FecBlock;
use crate::block_list::BlockList;
use crate::config::{DATA_SHARDS, FEC_SHARDS, PAYLOAD_TYPE_AUDIO, PAYLOAD_TYPE_FEC};
use crate::error::RejectReason;
use crate::wire::{FecHeader, RtpHeader, FEC_HEADER_LEN, RTP_HEADER_LEN};

/// Which shard of a block an inbound packet carries.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ShardKind {
	Data { index: usize },
	Fec { index: usize },
}

/// The block a packet belongs to, plus which shard within it (§4.2).
pub(crate) struct Derived {
	/// The inbound packet's own RTP sequence number (distinct from `base_seq`
	/// for FEC shards, used for OOS tracking and the fast-path comparison).
	pub pkt_seq: u16,
	pub base_seq: u16,
	pub base_ts: u32,
	pub ssrc: u32,
	pub payload_type: u8,
	pub block_size: u16,
	pub shard: ShardKind,
}

/// Derives block identity and shard index for one inbound packet. Rejects
/// anything malformed or carrying a payload type this queue doesn't handle.
pub(crate) fn derive(packet: &[u8], audio_packet_duration_ms: u32) -> Result<Derived, RejectReason> {
	let header = RtpHeader::parse(packet).ok_or(RejectReason::TooShortForRtpHeader)?;

	match header.payload_type {
		PAYLOAD_TYPE_AUDIO => {
			let offset = header.sequence_number % DATA_SHARDS as u16;
			let base_seq = header.sequence_number.wrapping_sub(offset);
			let block_size = (packet.len() - RTP_HEADER_LEN) as u16;

			Ok(Derived {
				pkt_seq: header.sequence_number,
				base_seq,
				base_ts: header.timestamp.wrapping_sub(offset as u32 * audio_packet_duration_ms),
				ssrc: header.ssrc,
				payload_type: header.payload_type,
				block_size,
				shard: ShardKind::Data { index: offset as usize },
			})
		},
		PAYLOAD_TYPE_FEC => {
			if packet.len() < RTP_HEADER_LEN + FEC_HEADER_LEN {
				return Err(RejectReason::TooShortForFecHeader);
			}
			let fec_header = FecHeader::parse(&packet[RTP_HEADER_LEN..]).ok_or(RejectReason::TooShortForFecHeader)?;
			if fec_header.fec_shard_index as usize >= FEC_SHARDS {
				return Err(RejectReason::FecShardIndexOutOfRange(fec_header.fec_shard_index));
			}
			let block_size = (packet.len() - RTP_HEADER_LEN - FEC_HEADER_LEN) as u16;

			Ok(Derived {
				pkt_seq: header.sequence_number,
				base_seq: fec_header.base_sequence_number,
				base_ts: fec_header.base_timestamp,
				ssrc: fec_header.ssrc,
				payload_type: fec_header.payload_type,
				block_size,
				shard: ShardKind::Fec { index: fec_header.fec_shard_index as usize },
			})
		},
		other => Err(RejectReason::UnknownPayloadType(other)),
	}
}

/// Outcome of locating (or creating) the block a derived packet targets.
pub(crate) enum Located {
	/// Index into the block list of the block to admit the shard into.
	Index(usize),
	Reject(RejectReason),
}

/// Implements spec.md §4.3: walk the ordered list, validate or create.
pub(crate) fn find_or_create(blocks: &mut BlockList, derived: &Derived, now_ms: u64) -> Located {
	if let Some(index) = blocks.index_of(derived.base_seq) {
		let existing = blocks.get(index);
		if existing.ssrc != derived.ssrc || existing.payload_type != derived.payload_type || existing.base_ts != derived.base_ts {
			// spec.md's Open Questions: the reference asserts then proceeds;
			// treated here as a dropped malformed packet.
			return Located::Reject(RejectReason::BlockMetadataMismatch);
		}
		if existing.block_size != derived.block_size {
			return Located::Reject(RejectReason::BlockSizeMismatch);
		}
		if existing.fully_reassembled {
			return Located::Reject(RejectReason::BlockAlreadyComplete);
		}
		return Located::Index(index);
	}

	let index = blocks.insert_new(derived.base_seq, derived.base_ts, derived.ssrc, derived.payload_type, derived.block_size, now_ms);
	Located::Index(index)
}

/// Admits a data shard into `block` at `index` (spec.md §4.4). Returns `false`
/// if it was a duplicate.
pub(crate) fn admit_data_shard(block: &mut FecBlock, index: usize, packet: &[u8]) -> bool {
	if !block.marks[index] {
		return false;
	}
	block.data_packets[index][..packet.len()].copy_from_slice(packet);
	block.marks[index] = false;
	block.data_shards_received += 1;
	true
}

/// Admits a parity shard into `block` at `index` (spec.md §4.4). Returns
/// `false` if it was a duplicate.
pub(crate) fn admit_fec_shard(block: &mut FecBlock, index: usize, parity_payload: &[u8]) -> bool {
	let mark_index = DATA_SHARDS + index;
	if !block.marks[mark_index] {
		return false;
	}
	block.fec_packets[index][..parity_payload.len()].copy_from_slice(parity_payload);
	block.marks[mark_index] = false;
	block.fec_shards_received += 1;
	true
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::wire::{RtpHeader, RTP_VERSION_FLAGS};

	fn audio_packet(seq: u16, ts: u32, payload_len: usize) -> Vec<u8> {
		let header = RtpHeader { version_flags: RTP_VERSION_FLAGS, payload_type: PAYLOAD_TYPE_AUDIO, sequence_number: seq, timestamp: ts, ssrc: 0xDEAD_BEEF };
		let mut packet = vec![0u8; RTP_HEADER_LEN + payload_len];
		header.write(&mut packet);
		packet
	}

	#[test]
	fn derives_audio_block_identity() {
		let packet = audio_packet(22, 1010, 160);
		let derived = derive(&packet, 1).unwrap();
		assert_eq!(derived.base_seq, 20);
		assert_eq!(derived.base_ts, 1008); // 1010 - 2
		assert_eq!(derived.block_size, 160);
		match derived.shard {
			ShardKind::Data { index } => assert_eq!(index, 2),
			_ => panic!("expected a data shard"),
		}
	}

	#[test]
	fn rejects_fec_shard_index_out_of_range() {
		let header = RtpHeader { version_flags: RTP_VERSION_FLAGS, payload_type: PAYLOAD_TYPE_FEC, sequence_number: 0, timestamp: 0, ssrc: 0 };
		let fec_header = FecHeader { payload_type: PAYLOAD_TYPE_AUDIO, fec_shard_index: 9, base_sequence_number: 20, base_timestamp: 1000, ssrc: 0xDEAD_BEEF };
		let mut packet = vec![0u8; RTP_HEADER_LEN + FEC_HEADER_LEN + 160];
		header.write(&mut packet);
		fec_header.write(&mut packet[RTP_HEADER_LEN..]);

		assert_eq!(derive(&packet, 5).unwrap_err(), RejectReason::FecShardIndexOutOfRange(9));
	}

	#[test]
	fn rejects_unknown_payload_type() {
		let header = RtpHeader { version_flags: RTP_VERSION_FLAGS, payload_type: 42, sequence_number: 0, timestamp: 0, ssrc: 0 };
		let mut packet = vec![0u8; RTP_HEADER_LEN + 10];
		header.write(&mut packet);
		assert_eq!(derive(&packet, 5).unwrap_err(), RejectReason::UnknownPayloadType(42));
	}

	#[test]
	fn duplicate_data_shard_is_rejected() {
		let mut block = FecBlock::new(20, 1000, 0xDEAD_BEEF, 97, 160, 0);
		let packet = audio_packet(20, 1000, 160);
		assert!(admit_data_shard(&mut block, 0, &packet));
		assert!(!admit_data_shard(&mut block, 0, &packet));
	}
}
