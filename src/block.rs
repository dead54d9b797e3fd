//! A single in-flight or just-completed FEC block (spec.md §3 `FecBlock`).

use bytes::BytesMut;

use crate::config::{DATA_SHARDS, FEC_SHARDS, TOTAL_SHARDS};
use crate::wire::RTP_HEADER_LEN;

/// One reassembly unit: `D` data shards and `P` parity shards protecting them.
pub struct FecBlock {
	pub base_seq: u16,
	pub base_ts: u32,
	pub ssrc: u32,
	pub payload_type: u8,
	pub block_size: u16,

	/// `dataPackets[D]`: full RTP packet (header + payload) per data index.
	pub data_packets: [BytesMut; DATA_SHARDS],
	/// `fecPackets[P]`: raw parity payload per parity index.
	pub fec_packets: [BytesMut; FEC_SHARDS],

	/// `marks[T]`: `true` = shard missing, `false` = present.
	pub marks: [bool; TOTAL_SHARDS],
	pub data_shards_received: u16,
	pub fec_shards_received: u16,

	pub next_data_packet_index: u16,
	pub fully_reassembled: bool,
	pub allow_discontinuity: bool,
	pub queue_time_ms: u64,
}

impl FecBlock {
	pub fn new(base_seq: u16, base_ts: u32, ssrc: u32, payload_type: u8, block_size: u16, queue_time_ms: u64) -> Self {
		let mut block = Self {
			base_seq,
			base_ts,
			ssrc,
			payload_type,
			block_size,
			data_packets: std::array::from_fn(|_| BytesMut::zeroed(RTP_HEADER_LEN + block_size as usize)),
			fec_packets: std::array::from_fn(|_| BytesMut::zeroed(block_size as usize)),
			marks: [true; TOTAL_SHARDS],
			data_shards_received: 0,
			fec_shards_received: 0,
			next_data_packet_index: 0,
			fully_reassembled: false,
			allow_discontinuity: false,
			queue_time_ms,
		};
		block.reset_buffers();
		block
	}

	/// Re-initialises an existing (free-cached) allocation for reuse with a
	/// new identity, keeping its shard buffers iff `block_size` matches.
	pub fn reinit(&mut self, base_seq: u16, base_ts: u32, ssrc: u32, payload_type: u8, block_size: u16, queue_time_ms: u64) {
		debug_assert_eq!(self.block_size, block_size, "caller must only reuse cache entries with a matching block_size");
		self.base_seq = base_seq;
		self.base_ts = base_ts;
		self.ssrc = ssrc;
		self.payload_type = payload_type;
		self.queue_time_ms = queue_time_ms;
		self.marks = [true; TOTAL_SHARDS];
		self.data_shards_received = 0;
		self.fec_shards_received = 0;
		self.next_data_packet_index = 0;
		self.fully_reassembled = false;
		self.allow_discontinuity = false;
		self.reset_buffers();
	}

	fn reset_buffers(&mut self) {
		for packet in &mut self.data_packets {
			packet.iter_mut().for_each(|byte| *byte = 0);
		}
		for packet in &mut self.fec_packets {
			packet.iter_mut().for_each(|byte| *byte = 0);
		}
	}

	pub fn can_recover(&self) -> bool {
		self.data_shards_received + self.fec_shards_received >= DATA_SHARDS as u16
	}

	pub fn is_drained(&self) -> bool {
		self.next_data_packet_index as usize >= DATA_SHARDS
	}

	pub fn data_shard_present(&self, index: usize) -> bool {
		!self.marks[index]
	}

	/// Checks invariant 6 of spec.md §3:
	/// `dataShardsReceived + fecShardsReceived = T - popcount(marks)`.
	#[cfg(debug_assertions)]
	pub fn debug_check_mark_invariant(&self) {
		let present = self.marks.iter().filter(|missing| !**missing).count() as u16;
		debug_assert_eq!(self.data_shards_received + self.fec_shards_received, present);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_block_has_all_marks_missing() {
		let block = FecBlock::new(20, 1000, 0xDEAD_BEEF, 97, 160, 0);
		assert!(block.marks.iter().all(|missing| *missing));
		assert_eq!(block.data_shards_received, 0);
		assert_eq!(block.fec_shards_received, 0);
		assert!(!block.can_recover());
		assert!(!block.is_drained());
	}

	#[test]
	fn reinit_clears_state_but_keeps_allocation() {
		let mut block = FecBlock::new(20, 1000, 0xDEAD_BEEF, 97, 160, 0);
		block.marks[0] = false;
		block.data_shards_received = 1;
		block.fully_reassembled = true;

		block.reinit(24, 1020, 0xDEAD_BEEF, 97, 160, 50);

		assert_eq!(block.base_seq, 24);
		assert_eq!(block.queue_time_ms, 50);
		assert!(block.marks.iter().all(|missing| *missing));
		assert_eq!(block.data_shards_received, 0);
		assert!(!block.fully_reassembled);
	}
}
