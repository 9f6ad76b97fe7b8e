#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub use delayline_common::unix_micros;
pub use delayline_config::{ConfigError, RouteEntry, RouteFile, TargetEntry};
pub use delayline_router::*;
