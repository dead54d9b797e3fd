//! FEC recovery (spec.md §4.5) and the debug validation mode (spec.md §4.7, §9).

use reed_solomon::ReedSolomon;

use crate::block::FecBlock;
use crate::config::{DATA_SHARDS, FEC_SHARDS, RS_PARITY_MATRIX_PATCH, TOTAL_SHARDS};
use crate::error::FecQueueError;
use crate::wire::{RtpHeader, RTP_HEADER_LEN, RTP_VERSION_FLAGS};

/// Constructs the Reed-Solomon handle for this queue's fixed (D, P) and
/// applies the sender-matching parity patch (spec.md §6, §9). This must run
/// immediately after construction, before any `reconstruct` call.
pub(crate) fn new_patched_reed_solomon() -> Result<ReedSolomon, FecQueueError> {
	let mut rs = ReedSolomon::new(DATA_SHARDS, FEC_SHARDS).map_err(|reason| FecQueueError::ReedSolomon {
		data_shards: DATA_SHARDS,
		fec_shards: FEC_SHARDS,
		reason,
	})?;
	rs.set_parity_matrix(RS_PARITY_MATRIX_PATCH);
	Ok(rs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecoveryOutcome {
	NotEnoughShards,
	/// Already reassembled, either previously or just now without invoking
	/// Reed-Solomon at all (spec.md §4.5: "If dataShardsReceived == D, no
	/// Reed-Solomon call is needed").
	AllDataPresent,
	Recovered,
	/// A hard contract violation of the RS primitive (spec.md §7): logged,
	/// the block is left un-reassembled and will eventually time out.
	ReconstructFailed,
}

/// Attempts to complete `block` given the shards admitted so far.
pub(crate) fn try_recover(block: &mut FecBlock, rs: &ReedSolomon, audio_packet_duration_ms: u32) -> RecoveryOutcome {
	if block.fully_reassembled {
		return RecoveryOutcome::AllDataPresent;
	}
	if !block.can_recover() {
		return RecoveryOutcome::NotEnoughShards;
	}
	if block.data_shards_received == DATA_SHARDS as u16 {
		block.fully_reassembled = true;
		return RecoveryOutcome::AllDataPresent;
	}

	match reconstruct(block, rs) {
		Ok(()) => {
			for index in 0..DATA_SHARDS {
				if block.marks[index] {
					synthesize_rtp_header(block, index, audio_packet_duration_ms);
					block.marks[index] = false;
					block.data_shards_received += 1;
				}
			}
			block.fully_reassembled = true;
			RecoveryOutcome::Recovered
		},
		Err(message) => {
			tracing::error!(base_seq = block.base_seq, "Reed-Solomon reconstruction failed despite sufficient shards: {message}");
			RecoveryOutcome::ReconstructFailed
		},
	}
}

fn reconstruct(block: &mut FecBlock, rs: &ReedSolomon) -> Result<(), String> {
	let marks = block.marks;
	let mut shards: Vec<&mut [u8]> = Vec::with_capacity(TOTAL_SHARDS);
	for packet in &mut block.data_packets {
		shards.push(&mut packet[RTP_HEADER_LEN..]);
	}
	for packet in &mut block.fec_packets {
		shards.push(&mut packet[..]);
	}
	rs.reconstruct(&mut shards, &marks)
}

fn synthesize_rtp_header(block: &mut FecBlock, index: usize, audio_packet_duration_ms: u32) {
	let header = RtpHeader {
		version_flags: RTP_VERSION_FLAGS,
		payload_type: block.payload_type,
		sequence_number: block.base_seq.wrapping_add(index as u16),
		timestamp: block.base_ts.wrapping_add(index as u32 * audio_packet_duration_ms),
		ssrc: block.ssrc,
	};
	header.write(&mut block.data_packets[index][..RTP_HEADER_LEN]);
}

/// Debug validation mode (spec.md §9): re-marks one already-reconstructed
/// data shard as missing, reruns recovery, and checks the result is
/// bit-identical. Never panics; a mismatch is logged and reported back to the
/// caller so tests (and callers who want to) can count failures, matching
/// spec.md §7's "nothing in this core ever aborts the process".
///
/// `shard_to_check` rotates over a counter rather than `rand`, so a failing
/// check is reproducible across runs with the same input sequence.
pub(crate) fn debug_validate(block: &mut FecBlock, rs: &ReedSolomon, check_counter: u64) -> bool {
	debug_assert!(block.fully_reassembled);

	let index = (check_counter % DATA_SHARDS as u64) as usize;
	let original = block.data_packets[index].clone();

	block.marks[index] = true;
	let reconstruct_result = reconstruct(block, rs);
	block.marks[index] = false;

	match reconstruct_result {
		Ok(()) => {
			let matches = block.data_packets[index] == original;
			if !matches {
				tracing::error!(base_seq = block.base_seq, shard = index, "debug validation: reconstructed shard does not match the original bit-for-bit");
				// Restore the known-good bytes so the corrupted debug rerun
				// never leaks into what gets emitted upstream.
				block.data_packets[index] = original;
			}
			matches
		},
		Err(message) => {
			tracing::error!(base_seq = block.base_seq, shard = index, "debug validation: reconstruction of a shard that was already present failed: {message}");
			block.data_packets[index] = original;
			false
		},
	}
}
