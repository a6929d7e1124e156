//! Deserializable handler configuration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{HandlerOptions, Level};

/// The serializable subset of [`HandlerOptions`], for loading from configuration files.
///
/// Both fields are optional; unknown fields are rejected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandlerConfig {
    /// Output the source code position of log statements.
    pub add_source: bool,

    /// The minimum level of records to output, e.g. `"info"` or `"debug+2"`.
    pub level: Level,
}

impl From<HandlerConfig> for HandlerOptions {
    fn from(config: HandlerConfig) -> Self {
        Self {
            add_source: config.add_source,
            level: Some(Arc::new(config.level)),
        }
    }
}
