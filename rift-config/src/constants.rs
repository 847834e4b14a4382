//! Default values shared by the configuration sections.

/// File name looked up in every configuration layer.
pub const CONFIG_FILE_NAME: &str = "rift.toml";

/// Directory under the user's home that holds the user layer.
pub const USER_CONFIG_DIR: &str = ".rift";

#[cfg(unix)]
pub const SYSTEM_CONFIG_PATH: &str = "/etc/rift/rift.toml";

pub mod env {
    pub const CONFIG_PATH: &str = "RIFT_CONFIG_PATH";
    pub const WORKSPACE: &str = "RIFT_WORKSPACE";
    pub const OLLAMA_URL: &str = "RIFT_OLLAMA_URL";
    pub const MAIN_MODEL: &str = "OLLAMA_MAIN_MODEL";
    pub const AI_ENABLED: &str = "AI_ENABLED";
}

pub mod tools {
    /// Tools that may be spawned when no `[tools] allowed` list is configured.
    pub const DEFAULT_ALLOWED: &[&str] = &[
        "nmap",
        "nuclei",
        "subfinder",
        "ffuf",
        "whois",
        "dig",
        "curl",
    ];
    pub const DEFAULT_MAX_LINE_BYTES: usize = 16 * 1024;
    pub const DEFAULT_KILL_GRACE_MS: u64 = 500;
    pub const DEFAULT_OUTPUT_DRAIN_MS: u64 = 250;
}

pub mod inference {
    pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
    pub const DEFAULT_MODEL: &str = "mistral:7b-instruct-v0.2-q4_0";
    pub const DEFAULT_MAX_PROMPT_CHARS: usize = 4_000;
    pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 5;
    pub const DEFAULT_TEMPERATURE: f32 = 0.5;
    pub const DEFAULT_TOP_P: f32 = 0.9;
    pub const DEFAULT_NUM_CTX: u32 = 4_096;
    pub const DEFAULT_REPEAT_PENALTY: f32 = 1.1;
}

pub mod debug {
    pub const DEFAULT_TRACE_TARGETS: &[&str] = &["rift", "rift_exec", "rift_inference", "rift_config"];
}
