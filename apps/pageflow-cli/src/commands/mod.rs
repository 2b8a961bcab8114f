pub mod config;
pub mod replay;

pub use config::ConfigCmd;
pub use replay::ReplayArgs;
