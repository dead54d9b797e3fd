//! Error types. Grounded in `nvfbc/src/error.rs`, the one library-style crate
//! in the teacher workspace with a `thiserror` error enum (the app-level code
//! elsewhere in that workspace mostly logs-and-continues with `Result<_, ()>`,
//! which spec.md §7 rules out here: every reject site needs a specific,
//! loggable reason, not a unit error).

use thiserror::Error;

/// Returned from [`crate::FecQueue::new`]. The only way this crate fails
/// outright, per spec.md §7 ("nothing in this core ever aborts the process").
#[derive(Error, Debug)]
pub enum FecQueueError {
	#[error("failed to construct Reed-Solomon handle for ({data_shards}, {fec_shards}): {reason}")]
	ReedSolomon {
		data_shards: usize,
		fec_shards: usize,
		reason: String,
	},
}

/// Internal classification of why an inbound packet was not admitted. Never
/// surfaced to callers directly; every reject site logs one of these at
/// `tracing::debug!` or `tracing::warn!` and then degrades to the caller-visible
/// outcome spec.md §7 mandates (silent drop, or drop-with-log).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RejectReason {
	#[error("packet shorter than an RTP header")]
	TooShortForRtpHeader,
	#[error("FEC packet shorter than an RTP + FEC header")]
	TooShortForFecHeader,
	#[error("unknown RTP payload type {0}")]
	UnknownPayloadType(u8),
	#[error("FEC shard index {0} is out of range")]
	FecShardIndexOutOfRange(u8),
	#[error("duplicate or already-present shard")]
	DuplicateShard,
	#[error("block is already fully reassembled")]
	BlockAlreadyComplete,
	#[error("block size disagrees with the block already on record")]
	BlockSizeMismatch,
	#[error("block timestamp/SSRC disagrees with the block already on record")]
	BlockMetadataMismatch,
	#[error("FEC permanently disabled for this session")]
	IncompatibleServer,
	#[error("packet precedes the currently admissible sequence window")]
	PreSynchronization,
}
