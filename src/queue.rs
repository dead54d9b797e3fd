//! The top-level queue tying the sequencer, block list, assembler, recovery,
//! and emission/timeout policy together (spec.md §2, §4, §5).

use reed_solomon::ReedSolomon;

use crate::assembler::{self, Located, ShardKind};
use crate::block_list::BlockList;
use crate::clock::{MonotonicClock, SystemClock};
use crate::config::{QueueConfig, DATA_SHARDS, PAYLOAD_TYPE_AUDIO};
use crate::error::FecQueueError;
use crate::recovery::{self, RecoveryOutcome};
use crate::sequencer::{is_before16, Sequencer};
use crate::timeout;
use crate::wire::{RtpHeader, RTP_HEADER_LEN};

/// Return status of [`FecQueue::add_packet`], matching spec.md §6's
/// `{0, HANDLE_NOW, PACKET_READY}` contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPacketStatus {
	/// Packet accepted (or dropped) but there is nothing further to do right now.
	Accepted,
	/// The packet just passed in is the next one to decode; the caller may
	/// bypass the queue for it instead of round-tripping through
	/// [`FecQueue::get_queued_packet`].
	HandleNow,
	/// The caller must drain via [`FecQueue::get_queued_packet`] until it
	/// returns `None`.
	PacketReady,
}

/// A packet (or loss placeholder) handed back by [`FecQueue::get_queued_packet`].
#[derive(Debug, Clone)]
pub struct QueuedPacket {
	/// `custom_header_len` leading bytes of caller scratch space, followed by
	/// the RTP packet (header + payload) when `payload_length > 0`.
	pub buffer: Vec<u8>,
	/// RTP header + audio payload length, or `0` for a loss placeholder.
	pub payload_length: usize,
}

/// Receive-side RTP audio reassembly and FEC queue (spec.md §2).
pub struct FecQueue<C: MonotonicClock = SystemClock> {
	config: QueueConfig,
	sequencer: Sequencer,
	blocks: BlockList,
	reed_solomon: ReedSolomon,
	incompatible_server: bool,
	clock: C,
	debug_validation_counter: u64,
	debug_validation_failures: u64,
}

impl FecQueue<SystemClock> {
	/// `Initialize`: zero state, install the patched Reed-Solomon handle, and
	/// enter synchronising mode.
	pub fn new(config: QueueConfig) -> Result<Self, FecQueueError> {
		Self::with_clock(config, SystemClock::new())
	}
}

impl<C: MonotonicClock> FecQueue<C> {
	pub fn with_clock(config: QueueConfig, clock: C) -> Result<Self, FecQueueError> {
		let reed_solomon = recovery::new_patched_reed_solomon()?;
		Ok(Self {
			blocks: BlockList::new(config.cached_fec_block_limit),
			config,
			sequencer: Sequencer::new(),
			reed_solomon,
			incompatible_server: false,
			clock,
			debug_validation_counter: 0,
			debug_validation_failures: 0,
		})
	}

	/// `Cleanup`. Identical to dropping the queue; this exists for callers who
	/// want the drain to happen at a specific, visible point in their code
	/// rather than wherever the value happens to go out of scope.
	pub fn cleanup(self) {}

	pub fn incompatible_server(&self) -> bool {
		self.incompatible_server
	}

	pub fn synchronizing(&self) -> bool {
		self.sequencer.synchronizing
	}

	/// Count of debug-validation mismatches observed so far (spec.md §9).
	/// Always `0` unless `QueueConfig::debug_validate_recovery` is set.
	pub fn debug_validation_failures(&self) -> u64 {
		self.debug_validation_failures
	}

	pub fn add_packet(&mut self, packet: &[u8]) -> AddPacketStatus {
		#[cfg(debug_assertions)]
		self.blocks.debug_check_invariants();
		let status = self.add_packet_inner(packet);
		#[cfg(debug_assertions)]
		self.blocks.debug_check_invariants();
		status
	}

	fn add_packet_inner(&mut self, packet: &[u8]) -> AddPacketStatus {
		if self.incompatible_server {
			return self.add_packet_bypassed(packet);
		}

		let derived = match assembler::derive(packet, self.config.audio_packet_duration_ms) {
			Ok(derived) => derived,
			Err(reason) => {
				tracing::debug!(?reason, "rejected inbound packet");
				return AddPacketStatus::Accepted;
			},
		};

		if !self.sequencer.synced() {
			self.sequencer.synchronize_on(derived.base_seq, DATA_SHARDS as u16);
			tracing::debug!(base_seq = derived.base_seq, "synchronised; discarding partial first block");
			return AddPacketStatus::Accepted;
		}

		self.sequencer.observe_sequence_number(derived.pkt_seq);

		if is_before16(derived.base_seq, self.sequencer.oldest_rtp_base_sequence_number) {
			tracing::debug!(base_seq = derived.base_seq, reason = %crate::error::RejectReason::PreSynchronization, "rejected inbound packet");
			return AddPacketStatus::Accepted;
		}

		let index = match assembler::find_or_create(&mut self.blocks, &derived, self.clock.now_ms()) {
			Located::Index(index) => index,
			Located::Reject(reason) => {
				if reason == crate::error::RejectReason::BlockSizeMismatch {
					tracing::warn!("block size mismatch against existing block; disabling FEC for this session");
					self.incompatible_server = true;
				} else {
					tracing::debug!(?reason, "rejected inbound packet");
				}
				return AddPacketStatus::Accepted;
			},
		};

		let admitted = match derived.shard {
			ShardKind::Data { index: shard_index } => assembler::admit_data_shard(self.blocks.get_mut(index), shard_index, packet),
			ShardKind::Fec { index: fec_index } => {
				let parity_payload = &packet[RTP_HEADER_LEN + crate::wire::FEC_HEADER_LEN..];
				assembler::admit_fec_shard(self.blocks.get_mut(index), fec_index, parity_payload)
			},
		};

		if !admitted {
			tracing::debug!(base_seq = derived.base_seq, reason = %crate::error::RejectReason::DuplicateShard, "rejected inbound packet");
			return AddPacketStatus::Accepted;
		}

		// Fast path (spec.md §4.4): the packet just admitted is the very next
		// one the decoder wants. Only ever true for a data shard landing in
		// the head block; never invokes Reed-Solomon.
		if let ShardKind::Data { index: shard_index } = derived.shard {
			if index == 0 && derived.pkt_seq == self.sequencer.next_rtp_sequence_number {
				let _ = shard_index;
				self.sequencer.next_rtp_sequence_number = self.sequencer.next_rtp_sequence_number.wrapping_add(1);
				let drained = {
					let head = self.blocks.get_mut(0);
					head.next_data_packet_index += 1;
					head.is_drained()
				};
				if drained {
					self.free_block(0);
				}
				return AddPacketStatus::HandleNow;
			}
		}

		let outcome = recovery::try_recover(self.blocks.get_mut(index), &self.reed_solomon, self.config.audio_packet_duration_ms);
		if self.config.debug_validate_recovery && matches!(outcome, RecoveryOutcome::Recovered | RecoveryOutcome::AllDataPresent) {
			let counter = self.debug_validation_counter;
			self.debug_validation_counter = self.debug_validation_counter.wrapping_add(1);
			if !recovery::debug_validate(self.blocks.get_mut(index), &self.reed_solomon, counter) {
				self.debug_validation_failures += 1;
			}
		}

		// spec.md §4.5: timeout check runs after admitting a packet that
		// belongs to a block other than the head (index 0 is always the head).
		if index != 0 {
			self.maybe_timeout_head();
		}

		if self.queue_has_packet_ready(0) || self.queue_has_discontinuity_ready(0) {
			AddPacketStatus::PacketReady
		} else {
			AddPacketStatus::Accepted
		}
	}

	fn add_packet_bypassed(&mut self, packet: &[u8]) -> AddPacketStatus {
		match RtpHeader::parse(packet) {
			Some(header) if header.payload_type == PAYLOAD_TYPE_AUDIO => AddPacketStatus::HandleNow,
			_ => {
				tracing::debug!(reason = %crate::error::RejectReason::IncompatibleServer, "rejected inbound packet");
				AddPacketStatus::Accepted
			},
		}
	}

	pub fn get_queued_packet(&mut self, custom_header_len: usize) -> Option<QueuedPacket> {
		#[cfg(debug_assertions)]
		self.blocks.debug_check_invariants();
		let result = self.get_queued_packet_inner(custom_header_len);
		#[cfg(debug_assertions)]
		self.blocks.debug_check_invariants();
		result
	}

	fn get_queued_packet_inner(&mut self, custom_header_len: usize) -> Option<QueuedPacket> {
		if self.blocks.is_empty() {
			return None;
		}

		let next_index = self.blocks.get(0).next_data_packet_index as usize;
		if next_index >= DATA_SHARDS {
			// Invariant: a drained block is freed immediately; should be unreachable.
			return None;
		}

		if self.blocks.get(0).allow_discontinuity && self.blocks.get(0).marks[next_index] {
			let buffer = vec![0u8; custom_header_len];
			self.advance_after_emit();
			return Some(QueuedPacket { buffer, payload_length: 0 });
		}

		if self.queue_has_packet_ready(0) {
			let block = self.blocks.get(0);
			let packet_len = RTP_HEADER_LEN + block.block_size as usize;
			let mut buffer = vec![0u8; custom_header_len + packet_len];
			buffer[custom_header_len..].copy_from_slice(&block.data_packets[next_index][..packet_len]);
			self.advance_after_emit();
			return Some(QueuedPacket { buffer, payload_length: packet_len });
		}

		None
	}

	fn queue_has_packet_ready(&self, index: usize) -> bool {
		let block = self.blocks.get(index);
		let next = block.next_data_packet_index as usize;
		next < DATA_SHARDS && block.data_shard_present(next) && block.base_seq.wrapping_add(next as u16) == self.sequencer.next_rtp_sequence_number
	}

	/// Mirrors `get_queued_packet`'s placeholder branch (spec.md §4.6 rule 1):
	/// true once a block has been declared lost and its next shard is still
	/// missing, so `add_packet` can signal `PacketReady` the moment
	/// `maybe_timeout_head` makes a placeholder emittable, not only when a
	/// real shard is already in hand.
	fn queue_has_discontinuity_ready(&self, index: usize) -> bool {
		if index >= self.blocks.len() {
			return false;
		}
		let block = self.blocks.get(index);
		let next = block.next_data_packet_index as usize;
		block.allow_discontinuity && next < DATA_SHARDS && block.marks[next]
	}

	fn advance_after_emit(&mut self) {
		self.sequencer.next_rtp_sequence_number = self.sequencer.next_rtp_sequence_number.wrapping_add(1);
		let drained = {
			let head = self.blocks.get_mut(0);
			head.next_data_packet_index += 1;
			head.is_drained()
		};
		if drained {
			self.free_block(0);
		}
	}

	fn maybe_timeout_head(&mut self) {
		let Some(head) = self.blocks.head() else {
			return;
		};
		if !timeout::should_timeout(head, self.sequencer.received_oos_data, self.clock.now_ms(), &self.config) {
			return;
		}

		let head_base_seq = head.base_seq;
		self.blocks.get_mut(0).allow_discontinuity = true;
		if is_before16(self.sequencer.next_rtp_sequence_number, head_base_seq) {
			self.sequencer.next_rtp_sequence_number = head_base_seq;
		}
	}

	fn free_block(&mut self, index: usize) {
		let block = self.blocks.remove_to_cache(index);
		self.blocks.release_to_cache(block);
		let new_oldest = self.blocks.head().map_or(self.sequencer.next_rtp_sequence_number, |head| head.base_seq);
		self.sequencer.advance_oldest_base_to(new_oldest);
		if self.sequencer.synchronizing {
			self.sequencer.mark_synchronized();
		}
	}
}

impl<C: MonotonicClock> Drop for FecQueue<C> {
	/// `Cleanup` (spec.md §5): drains both the block list and the free-block
	/// cache explicitly, then releases the Reed-Solomon handle via its own `Drop`.
	fn drop(&mut self) {
		self.blocks.drain();
	}
}
