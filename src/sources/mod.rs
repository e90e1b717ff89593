//! Built-in sources.
//!
//! A compiled source writes a bounded number of generated events to its own
//! stream and completes. It reads nothing, so it owns no offset cursor.

pub mod random_binary;
pub mod test_source;

#[cfg(test)]
mod test_source_test;

pub use random_binary::RandomBinarySource;
pub use test_source::TestSource;

use crate::component::{Lifecycle, RunState};
use crate::error::Result;
use crate::event::Body;
use crate::runtime::StreamingRuntime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use uuid::Uuid;

/// Writes `count` bodies produced by `make_body(n)` for `n` in `0..count`.
///
/// Cancellation is checked before each write. A failed write cancels the
/// source and is returned.
pub(crate) async fn emit_events<F>(
  lifecycle: &mut Lifecycle,
  runtime: &dyn StreamingRuntime,
  cancel: &CancellationToken,
  producer_type: &str,
  producer_id: Uuid,
  count: u64,
  mut make_body: F,
) -> Result<RunState>
where
  F: FnMut(u64) -> Body + Send,
{
  lifecycle.enter(RunState::Running)?;
  for n in 0..count {
    if cancel.is_cancelled() {
      debug!(node = %producer_id, written = n, "source cancelled");
      lifecycle.enter(RunState::Cancelled)?;
      return Ok(RunState::Cancelled);
    }
    if let Err(e) = runtime
      .write_events(make_body(n), producer_type, producer_id)
      .await
    {
      error!(node = %producer_id, error = %e, "source write failed");
      lifecycle.cancel();
      return Err(e.into());
    }
  }
  debug!(node = %producer_id, written = count, "source complete");
  lifecycle.enter(RunState::Complete)?;
  Ok(RunState::Complete)
}
