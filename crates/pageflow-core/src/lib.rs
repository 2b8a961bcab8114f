mod config;
pub use config::{
    config_schema_json, load_config, write_schema_file, Config, DriverConfig,
    DEFAULT_CONTINUATION_KEY, DEFAULT_REQUEST_ID_SEPARATOR,
};
pub mod continuation;
pub mod util;

#[cfg(test)]
mod test_support;

pub use pageflow_frames as frames;
