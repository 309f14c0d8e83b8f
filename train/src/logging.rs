//! Tracing setup.

use crate::common::*;
use std::env;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

/// Install the global subscriber. The `RUST_LOG` variable selects the
/// verbosity, which is `INFO` if unset.
pub fn init_tracing() -> Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).compact();
    let filter_layer = {
        let filter = EnvFilter::from_default_env();
        if env::var("RUST_LOG").is_err() {
            filter.add_directive(LevelFilter::INFO.into())
        } else {
            filter
        }
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| format_err!("failed to install the tracing subscriber: {}", err))?;
    Ok(())
}
