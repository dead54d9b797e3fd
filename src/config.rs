//! Compile-time shard geometry and runtime session configuration.
//!
//! `D`, `P` and `T` are fixed at compile time per spec.md §2 ("MUST be fixed,
//! not configurable at runtime"). The values are pinned at `D = 4, P = 2` to
//! match the sender this queue talks to: `moonshine/src/session/stream/audio/encoder.rs`
//! hard-codes `NR_DATA_SHARDS = 4` and `NR_PARITY_SHARDS = 2` for the audio FEC
//! path, and the 8-byte parity-matrix patch below only makes sense for `P = 2`.

/// Number of data shards per FEC block ("D").
pub const DATA_SHARDS: usize = 4;
/// Number of parity shards per FEC block ("P").
pub const FEC_SHARDS: usize = 2;
/// Total shards per FEC block ("T = D + P").
pub const TOTAL_SHARDS: usize = DATA_SHARDS + FEC_SHARDS;

pub const PAYLOAD_TYPE_AUDIO: u8 = 97;
pub const PAYLOAD_TYPE_FEC: u8 = 127;

/// Replaces the Reed-Solomon library's default generator/parity rows
/// immediately after construction (spec.md §6, §9). Without this patch the
/// library reconstructs against a different parity matrix than the one the
/// sender actually used to encode, which silently corrupts recovered shards.
pub const RS_PARITY_MATRIX_PATCH: [u8; 8] = [0x77, 0x40, 0x38, 0x0E, 0xC7, 0xA7, 0x0D, 0x6C];

/// Default cap on the LIFO free-block cache (spec.md §3).
pub const DEFAULT_CACHED_FEC_BLOCK_LIMIT: usize = 8;

/// Default `RTPQ_OOS_WAIT_TIME_MS`. Not given numerically in spec.md (an Open
/// Question); chosen as a conservative window well beyond ordinary jitter so
/// that a block is only abandoned once a later block has definitively arrived
/// (`!receivedOosData`) or this much additional time has passed without one.
/// See DESIGN.md for the resolution.
pub const DEFAULT_OOS_WAIT_TIME_MS: u64 = 500;

/// Runtime, per-session configuration. Everything here is set once at session
/// start and never re-read from environment variables, CLI flags, or disk
/// (spec.md §6: "No environment variables, CLI, or persisted state").
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
	/// Milliseconds spanned by a single audio packet's worth of samples.
	pub audio_packet_duration_ms: u32,
	/// Cap on the LIFO free-block cache; overflow is released to the allocator.
	pub cached_fec_block_limit: usize,
	/// `RTPQ_OOS_WAIT_TIME_MS`: additional grace period before a stalled head
	/// block is declared lost while no later block has arrived.
	pub oos_wait_time_ms: u64,
	/// Debug-only: re-run recovery on every completed block against an
	/// artificially re-marked shard and compare bit-for-bit (spec.md §9).
	/// Off by default; never enable in production, it does real extra work
	/// per block.
	pub debug_validate_recovery: bool,
}

impl QueueConfig {
	pub fn new(audio_packet_duration_ms: u32) -> Self {
		Self {
			audio_packet_duration_ms,
			cached_fec_block_limit: DEFAULT_CACHED_FEC_BLOCK_LIMIT,
			oos_wait_time_ms: DEFAULT_OOS_WAIT_TIME_MS,
			debug_validate_recovery: false,
		}
	}

	/// The full block timeout window: `D * AudioPacketDuration + RTPQ_OOS_WAIT_TIME_MS`.
	pub fn block_timeout_ms(&self) -> u64 {
		DATA_SHARDS as u64 * self.audio_packet_duration_ms as u64 + self.oos_wait_time_ms
	}
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self::new(5)
	}
}
