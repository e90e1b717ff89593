//! Built-in sinks.
//!
//! A compiled sink drains one upstream stream through an offset cursor,
//! performing a side effect per message instead of writing events. Its drain
//! loop finishes with a [`crate::component::SinkStatus`]: `COMPLETE` when the
//! log is exhausted, `BACK_LOG` when it stopped early and more data may exist,
//! `CANCELLED` when interrupted.

pub mod console;

#[cfg(test)]
mod console_test;

pub use console::ConsoleSink;
