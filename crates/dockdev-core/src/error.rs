use std::path::PathBuf;

/// Hard failures of the provisioning workflow.
///
/// Creation propagates the first of these upward and stops; the deletion
/// path never raises them past a single step — each step's outcome is
/// collected into the cleanup report instead.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// The container runtime could not be reached (and, interactively,
    /// the user declined to start it or starting it failed).
    #[error("container runtime is not running or not reachable")]
    RuntimeUnavailable,

    /// A required configuration value was absent from `.env` and the
    /// process environment.
    #[error("missing required configuration: {key}")]
    ConfigMissing { key: String },

    /// The project directory already exists. A second creation of the
    /// same domain is rejected, not merged.
    #[error("project already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    /// The allocation range is exhausted.
    #[error("no free addresses left in subnet {subnet}.0/24")]
    NoCapacity { subnet: String },

    /// A dependency never became ready within its retry budget.
    #[error("{service} did not become ready after {attempts} attempts")]
    DependencyTimeout { service: String, attempts: u32 },

    /// An external tool exited non-zero. Carries the tool's combined
    /// output so the operator sees what the tool saw.
    #[error("{tool} failed:\n{output}")]
    ToolFailure { tool: String, output: String },
}
