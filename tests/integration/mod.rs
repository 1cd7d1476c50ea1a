//! Integration tests for the WoodVision generation studio

mod config_loading;
mod prompt_semantics;
mod refinement;
mod sku_history;
mod test_utils;
