//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

use super::DEFAULT_GEMINI_BASE_URL;

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources override earlier ones key by key; tables are merged, not replaced.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("generation.base_url", DEFAULT_GEMINI_BASE_URL)?
        .set_default("pipeline.soul_percent", 40)?
        .set_default("pipeline.max_fanout_retries", 1)?
        .set_default("pipeline.retry_delay_ms", 1000)
}
