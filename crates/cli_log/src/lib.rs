//! `cli_log` formats structured log records as single, human readable lines for command line
//! tools.
//!
//! It offers:
//! - A [`CliHandler`] that renders [`Record`]s (time, level, optional source location, message
//!   and key/value [`Attr`]s) and writes them to any [`std::io::Write`] sink without
//!   interleaving lines from concurrent callers.
//! - Immutable context derivation through [`CliHandler::with_attrs`] and
//!   [`CliHandler::with_group`]: bound attributes are rendered once and reused for every record,
//!   and group names prefix the keys of attributes added afterwards.
//! - With the `tracing` feature, a [`CliLayer`] that plugs the handler into a
//!   [`tracing_subscriber::Registry`], binding span fields as handler attributes.
//! - With the `serde` feature, a deserializable [`HandlerConfig`].
//!
//! A rendered line looks like:
//!
//! ```text
//! 2023-09-20T12:24:43Z INFO message wa=1 wb=2 p1.wc=3 p1.p2.c=foo p1.p2.b=true
//! ```

#[cfg(feature = "serde")]
mod config;
mod handler;
mod level;
mod record;
#[cfg(feature = "tracing")]
mod subscriber;
mod value;

#[cfg(feature = "serde")]
pub use self::config::HandlerConfig;
#[cfg(feature = "tracing")]
pub use self::subscriber::CliLayer;
pub use self::{
    handler::{CliHandler, HandlerOptions},
    level::{Level, LevelVar, Leveler, ParseLevelError},
    record::{Record, Source},
    value::{Attr, Value},
};
