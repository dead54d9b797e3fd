//! Receive-side RTP audio reassembly and Reed-Solomon FEC queue.
//!
//! A single-threaded, allocation-amortised state machine that sits between a
//! socket receiving RTP audio and FEC packets and a decoder that wants audio
//! packets back in strict sequence order, recovering a missing data packet
//! from its protecting FEC block where possible instead of surfacing a gap.
//!
//! See `SPEC_FULL.md` for the full module-by-module design and `DESIGN.md`
//! for how each part is grounded.

mod assembler;
mod block;
mod block_list;
mod clock;
mod config;
mod error;
mod queue;
mod recovery;
mod sequencer;
mod timeout;
mod wire;

pub use clock::{FakeClock, MonotonicClock, SystemClock};
pub use config::QueueConfig;
pub use error::FecQueueError;
pub use queue::{AddPacketStatus, FecQueue, QueuedPacket};
pub use sequencer::{is_before16, is_before32};

#[cfg(test)]
mod integration_tests {
	use super::*;
	use crate::wire::{FecHeader, RtpHeader, FEC_HEADER_LEN, RTP_HEADER_LEN, RTP_VERSION_FLAGS};

	const SSRC: u32 = 0xDEAD_BEEF;
	const AUDIO_DURATION_MS: u32 = 5;

	fn audio_packet(seq: u16, payload: &[u8]) -> Vec<u8> {
		let header = RtpHeader {
			version_flags: RTP_VERSION_FLAGS,
			payload_type: 97,
			sequence_number: seq,
			timestamp: seq as u32 * AUDIO_DURATION_MS,
			ssrc: SSRC,
		};
		let mut packet = vec![0u8; RTP_HEADER_LEN + payload.len()];
		header.write(&mut packet);
		packet[RTP_HEADER_LEN..].copy_from_slice(payload);
		packet
	}

	fn fec_packet(pkt_seq: u16, fec_index: u8, base_seq: u16, payload: &[u8]) -> Vec<u8> {
		let header = RtpHeader {
			version_flags: RTP_VERSION_FLAGS,
			payload_type: 127,
			sequence_number: pkt_seq,
			timestamp: 0,
			ssrc: SSRC,
		};
		let fec_header = FecHeader {
			payload_type: 97,
			fec_shard_index: fec_index,
			base_sequence_number: base_seq,
			base_timestamp: base_seq as u32 * AUDIO_DURATION_MS,
			ssrc: SSRC,
		};
		let mut packet = vec![0u8; RTP_HEADER_LEN + FEC_HEADER_LEN + payload.len()];
		header.write(&mut packet);
		fec_header.write(&mut packet[RTP_HEADER_LEN..]);
		packet[RTP_HEADER_LEN + FEC_HEADER_LEN..].copy_from_slice(payload);
		packet
	}

	fn init_tracing() {
		let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).try_init();
	}

	fn new_queue() -> FecQueue<FakeClock> {
		init_tracing();
		FecQueue::with_clock(QueueConfig::new(AUDIO_DURATION_MS), FakeClock::new()).unwrap()
	}

	/// Scenario 1 (spec.md §8): the first packet the session ever sees lands
	/// mid-block (seq 17 of block [16, 19]); the queue skips that partial
	/// block entirely instead of waiting forever for seq 16.
	#[test]
	fn first_packet_mid_block_skips_to_the_next_boundary() {
		let mut queue = new_queue();
		let status = queue.add_packet(&audio_packet(17, &[0; 4]));
		assert_eq!(status, AddPacketStatus::Accepted);
		assert!(queue.get_queued_packet(0).is_none());
	}

	/// Scenario 2: once synchronised, in-order arrivals take the fast path and
	/// are immediately handed back without ever touching Reed-Solomon.
	#[test]
	fn in_order_packets_take_the_fast_path() {
		let mut queue = new_queue();
		queue.add_packet(&audio_packet(17, &[0; 4])); // sync-skip onto block [20, 23]

		for seq in 20u16..24 {
			let status = queue.add_packet(&audio_packet(seq, &[seq as u8; 4]));
			assert_eq!(status, AddPacketStatus::HandleNow, "seq {seq} should be immediately handleable");
		}
		assert!(queue.get_queued_packet(0).is_none(), "fast-path packets are handled by the caller, not queued");
	}

	/// Scenario 3: one data packet lost, the rest of the block plus one parity
	/// shard arrive; Reed-Solomon recovers the missing packet and the full
	/// block drains in order.
	#[test]
	fn single_data_loss_is_recovered_via_fec() {
		let mut queue = new_queue();
		queue.add_packet(&audio_packet(17, &[0; 4])); // sync onto block [20, 23]

		let payloads: [[u8; 4]; 4] = [[10, 11, 12, 13], [20, 21, 22, 23], [30, 31, 32, 33], [40, 41, 42, 43]];
		let mut data_shards: Vec<Vec<u8>> = payloads.iter().map(|payload| payload.to_vec()).collect();
		let mut fec_shards: Vec<Vec<u8>> = vec![vec![0u8; 4]; 2];
		{
			let mut refs: Vec<&mut [u8]> = data_shards.iter_mut().map(|shard| shard.as_mut_slice()).collect();
			refs.extend(fec_shards.iter_mut().map(|shard| shard.as_mut_slice()));
			let rs = crate::recovery::new_patched_reed_solomon().unwrap();
			rs.encode(&mut refs).unwrap();
		}

		// seq 20 arrives; seq 21 is lost; seq 22, 23, and one FEC shard arrive.
		assert_eq!(queue.add_packet(&audio_packet(20, &data_shards[0])), AddPacketStatus::HandleNow);
		assert_eq!(queue.add_packet(&audio_packet(22, &data_shards[2])), AddPacketStatus::Accepted);
		assert_eq!(queue.add_packet(&audio_packet(23, &data_shards[3])), AddPacketStatus::Accepted);
		let status = queue.add_packet(&fec_packet(1000, 0, 20, &fec_shards[0]));
		assert_eq!(status, AddPacketStatus::PacketReady);

		let recovered = queue.get_queued_packet(0).expect("seq 21 should have been recovered");
		let header = RtpHeader::parse(&recovered.buffer).unwrap();
		assert_eq!(header.sequence_number, 21);
		assert_eq!(&recovered.buffer[RTP_HEADER_LEN..], &data_shards[1][..]);

		let next = queue.get_queued_packet(0).expect("seq 22 was already in hand");
		assert_eq!(RtpHeader::parse(&next.buffer).unwrap().sequence_number, 22);
		let last = queue.get_queued_packet(0).expect("seq 23 was already in hand");
		assert_eq!(RtpHeader::parse(&last.buffer).unwrap().sequence_number, 23);
		assert!(queue.get_queued_packet(0).is_none());
	}

	/// Scenario 4: a duplicate of an already-admitted shard is silently dropped.
	#[test]
	fn duplicate_shard_is_rejected() {
		let mut queue = new_queue();
		queue.add_packet(&audio_packet(17, &[0; 4]));
		assert_eq!(queue.add_packet(&audio_packet(20, &[1, 2, 3, 4])), AddPacketStatus::HandleNow);
		// seq 20 has already drained (block hadn't more shards pending at index 0);
		// re-admit another packet from the same block to exercise the duplicate path.
		assert_eq!(queue.add_packet(&audio_packet(21, &[5, 6, 7, 8])), AddPacketStatus::HandleNow);
		assert_eq!(queue.add_packet(&audio_packet(21, &[9, 9, 9, 9])), AddPacketStatus::Accepted);
	}

	/// Scenario 5 (spec.md §8), fast-mode branch: no out-of-sequence arrival
	/// has been observed yet, so `enforceQueueConstraints`'s `!receivedOosData`
	/// clause alone is enough to declare the stalled head block lost the
	/// instant the next block arrives — no clock advance needed for this branch.
	#[test]
	fn unrecoverable_loss_times_out_immediately_in_fast_mode() {
		let mut queue = new_queue();
		queue.add_packet(&audio_packet(17, &[0; 4])); // sync onto block [20, 23]

		assert_eq!(queue.add_packet(&audio_packet(20, &[1, 2, 3, 4])), AddPacketStatus::HandleNow);
		// seq 21 is lost and no parity ever arrives; seq 24 belongs to the next
		// block, and its arrival alone is enough to give up on block [20, 23].
		let status = queue.add_packet(&audio_packet(24, &[9, 9, 9, 9]));
		assert_eq!(status, AddPacketStatus::PacketReady, "a placeholder becomes emittable the instant the block times out");

		for expected_seq in 21u16..24 {
			let placeholder = queue.get_queued_packet(0).unwrap_or_else(|| panic!("expected a placeholder for seq {expected_seq}"));
			assert_eq!(placeholder.payload_length, 0);
		}

		// nextRtpSequenceNumber has caught up to 24; the shard already admitted
		// for block [24, 27] is now the head and ready to emit.
		let recovered = queue.get_queued_packet(0).expect("seq 24 was already in hand");
		assert_eq!(RtpHeader::parse(&recovered.buffer).unwrap().sequence_number, 24);
		assert!(queue.get_queued_packet(0).is_none());
	}

	/// Scenario 5 (spec.md §8), OOS/slow-mode branch: once a genuinely
	/// out-of-sequence packet has been observed, `enforceQueueConstraints`
	/// falls back to its second clause and the stalled head block is only
	/// declared lost once the full `D * AudioPacketDuration +
	/// RTPQ_OOS_WAIT_TIME_MS` grace window has elapsed.
	#[test]
	fn unrecoverable_loss_waits_out_the_grace_window_once_oos() {
		let clock = FakeClock::new();
		let mut queue = FecQueue::with_clock(QueueConfig::new(AUDIO_DURATION_MS), clock.clone()).unwrap();
		queue.add_packet(&audio_packet(17, &[0; 4])); // sync onto block [20, 23]
		assert_eq!(queue.add_packet(&audio_packet(20, &[1, 2, 3, 4])), AddPacketStatus::HandleNow);

		// A genuinely out-of-sequence arrival flips the sequencer into slow
		// mode; it's dropped (seq 18 precedes the admissible window) but the
		// OOS flag sticks, so the fast-mode clause no longer applies on its own.
		assert_eq!(queue.add_packet(&audio_packet(18, &[0; 4])), AddPacketStatus::Accepted);

		let threshold = QueueConfig::new(AUDIO_DURATION_MS).block_timeout_ms();

		// Just under the grace window: the next block has arrived, but block
		// [20, 23] is not declared lost yet.
		clock.advance(threshold - 1);
		let status = queue.add_packet(&audio_packet(24, &[9, 9, 9, 9]));
		assert_eq!(status, AddPacketStatus::Accepted, "the grace window has not fully elapsed yet");
		assert!(queue.get_queued_packet(0).is_none());

		// Past the grace window: admitting any further shard for the non-head
		// block re-runs the timeout check and the block is finally lost.
		clock.advance(2);
		let status = queue.add_packet(&fec_packet(1001, 0, 24, &[9, 9, 9, 9]));
		assert_eq!(status, AddPacketStatus::PacketReady);

		for expected_seq in 21u16..24 {
			let placeholder = queue.get_queued_packet(0).unwrap_or_else(|| panic!("expected a placeholder for seq {expected_seq}"));
			assert_eq!(placeholder.payload_length, 0);
		}

		let recovered = queue.get_queued_packet(0).expect("seq 24 was already in hand");
		assert_eq!(RtpHeader::parse(&recovered.buffer).unwrap().sequence_number, 24);
		assert!(queue.get_queued_packet(0).is_none(), "seq 25 is still missing and block [24, 27] hasn't timed out");
	}

	/// Scenario 6: a block whose size disagrees with one already on record
	/// permanently disables FEC handling for the remainder of the session.
	#[test]
	fn block_size_mismatch_disables_fec_for_the_session() {
		let mut queue = new_queue();
		queue.add_packet(&audio_packet(17, &[0; 4]));
		queue.add_packet(&audio_packet(20, &[1, 2, 3, 4]));
		assert!(!queue.incompatible_server());

		// seq 22 claims a different block_size for the same block [20, 23].
		let status = queue.add_packet(&audio_packet(22, &[1, 2, 3, 4, 5, 6]));
		assert_eq!(status, AddPacketStatus::Accepted);
		assert!(queue.incompatible_server());

		// From here on every audio packet is handed straight through.
		assert_eq!(queue.add_packet(&audio_packet(23, &[9; 4])), AddPacketStatus::HandleNow);
	}
}
