//! Block timeout policy (spec.md §4.5 "enforceQueueConstraints").

use crate::block::FecBlock;
use crate::config::QueueConfig;

/// The head block is declared lost when either a later block has already
/// arrived in fast mode (`!received_oos_data`), or it has simply sat around
/// too long (`D * AudioPacketDuration + RTPQ_OOS_WAIT_TIME_MS`).
pub(crate) fn should_timeout(head: &FecBlock, received_oos_data: bool, now_ms: u64, config: &QueueConfig) -> bool {
	!received_oos_data || now_ms.saturating_sub(head.queue_time_ms) > config.block_timeout_ms()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn block() -> FecBlock {
		FecBlock::new(20, 1000, 0xDEAD_BEEF, 97, 160, 100)
	}

	#[test]
	fn fast_mode_times_out_immediately() {
		let config = QueueConfig::new(5);
		assert!(should_timeout(&block(), false, 100, &config));
	}

	#[test]
	fn oos_mode_waits_for_the_full_window() {
		let config = QueueConfig::new(5);
		let head = block();
		assert!(!should_timeout(&head, true, 100 + config.block_timeout_ms(), &config));
		assert!(should_timeout(&head, true, 100 + config.block_timeout_ms() + 1, &config));
	}
}
