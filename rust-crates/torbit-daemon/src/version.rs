//! Version information and build metadata display

use std::fmt;

/// Build metadata for `--build-info`
pub struct VersionInfo {
    /// Package version from Cargo.toml
    pub daemon_version: &'static str,
    /// Target triple (e.g., x86_64-unknown-linux-gnu)
    pub target: &'static str,
    /// Build profile (debug or release)
    pub profile: &'static str,
    pub git_commit: Option<&'static str>,
    pub build_timestamp: &'static str,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            daemon_version: env!("CARGO_PKG_VERSION"),
            target: env!("TORBIT_TARGET"),
            profile: if cfg!(debug_assertions) {
                "debug"
            } else {
                "release"
            },
            git_commit: option_env!("TORBIT_GIT_COMMIT"),
            build_timestamp: env!("TORBIT_BUILD_TIMESTAMP"),
        }
    }

    /// Transports the acceptor can listen on
    pub fn transports(&self) -> Vec<&'static str> {
        vec!["tcp", "unix"]
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "torbit-daemon {}", self.daemon_version)?;
        writeln!(f)?;

        writeln!(f, "Build Information:")?;
        writeln!(f, "  Target:       {}", self.target)?;
        writeln!(f, "  Profile:      {}", self.profile)?;
        writeln!(f, "  Build Date:   {}", self.build_timestamp)?;

        if let Some(commit) = self.git_commit {
            writeln!(f, "  Git Commit:   {}", commit)?;
        }

        writeln!(f)?;
        writeln!(f, "Protocol:")?;
        writeln!(f, "  • newline-delimited UTF-8 text")?;
        writeln!(f, "  • transports: {}", self.transports().join(", "))?;

        Ok(())
    }
}

/// Short version string
pub fn version_short() -> String {
    format!("torbit-daemon {}", env!("CARGO_PKG_VERSION"))
}

/// Long version string with build metadata
pub fn version_long() -> String {
    VersionInfo::current().to_string()
}
