pub mod config_cmd;
pub mod context_cmd;
