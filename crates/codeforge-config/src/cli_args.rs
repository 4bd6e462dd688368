use std::path::PathBuf;

/// CLI overrides applied on top of file and default configuration
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub safety_buffer: Option<usize>,
    pub max_iterations: Option<u32>,
    pub per_chunk_max_attempts: Option<u32>,
    pub per_call_timeout_secs: Option<u64>,
    pub request_deadline_secs: Option<u64>,
    pub execute_validation: Option<bool>,
}
