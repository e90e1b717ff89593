//! Built-in processors.
//!
//! A compiled processor reads its upstream streams through offset cursors,
//! writes one event to its own stream per unit of work, and completes when its
//! reads come back empty. Windowed state lives in a [`crate::memory::Memory`]
//! owned by the compiled node for the length of one run.

pub mod crossing;
pub mod pipe;
pub mod sma;

#[cfg(test)]
mod sma_test;

pub use crossing::{Crossing, Direction};
pub use pipe::Pipe;
pub use sma::Sma;

use crate::component::{Lifecycle, RunState};
use crate::error::{Result, Violation};
use crate::event::{Body, Event};
use crate::port::Output;
use crate::reader::StreamReader;
use crate::runtime::StreamingRuntime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Reports a processor output that names no attribute to write.
pub(crate) fn output_violation(component: &str, output: &Output) -> Option<Violation> {
  output.primary_attribute().is_none().then(|| Violation::ConstraintViolated {
    component: component.to_string(),
    parameter: output.name.clone(),
    message: "output needs an attribute".to_string(),
  })
}

/// Single-input processing loop.
///
/// Reads batches until one comes back empty, calling `process` once per
/// message with a body and writing whatever it returns to the processor's own
/// stream. Messages without a body, and messages `process` declines, are
/// logged and skipped. Cancellation is checked before each read.
pub(crate) async fn drive_single_input<F>(
  lifecycle: &mut Lifecycle,
  runtime: &dyn StreamingRuntime,
  cancel: &CancellationToken,
  reader: &mut StreamReader,
  producer_type: &str,
  producer_id: Uuid,
  mut process: F,
) -> Result<RunState>
where
  F: FnMut(&Event) -> Option<Body> + Send,
{
  lifecycle.enter(RunState::Running)?;
  loop {
    if cancel.is_cancelled() {
      debug!(node = %producer_id, offset = %reader.position(), "processor cancelled");
      lifecycle.enter(RunState::Cancelled)?;
      return Ok(RunState::Cancelled);
    }

    let batch = match reader.next_batch(runtime).await {
      Ok(batch) => batch,
      Err(e) => {
        error!(node = %producer_id, error = %e, "processor read failed");
        lifecycle.cancel();
        return Err(e);
      }
    };
    if batch.is_empty() {
      debug!(node = %producer_id, offset = %reader.position(), "processor complete");
      lifecycle.enter(RunState::Complete)?;
      return Ok(RunState::Complete);
    }

    for message in batch {
      let Some(event) = message.event() else {
        warn!(node = %producer_id, message = %message.id, "event is null");
        continue;
      };
      let Some(body) = process(&event) else {
        debug!(node = %producer_id, message = %message.id, "event skipped");
        continue;
      };
      if let Err(e) = runtime.write_events(body, producer_type, producer_id).await {
        error!(node = %producer_id, error = %e, "processor write failed");
        lifecycle.cancel();
        return Err(e.into());
      }
    }
  }
}
