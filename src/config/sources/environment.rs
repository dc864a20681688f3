//! Environment source: LOOM__SECTION__KEY, e.g. LOOM__EXECUTOR__MAX_WORKERS=8.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment};

pub const ENV_PREFIX: &str = "LOOM";

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}
