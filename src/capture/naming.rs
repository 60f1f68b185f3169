//! Destination naming for finished frames.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How each new artifact is named inside the output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NamingPolicy {
    /// Every frame replaces the previous one at the same path.
    #[default]
    Overwrite,
    /// `<stem>-000001.<ext>`, counting up per run.
    Sequence,
    /// `<stem>-20240102_030405_678-000001.<ext>` in UTC. The trailing run sequence keeps
    /// frames finished within the same millisecond apart.
    Timestamp,
}

impl std::str::FromStr for NamingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(NamingPolicy::Overwrite),
            "sequence" => Ok(NamingPolicy::Sequence),
            "timestamp" => Ok(NamingPolicy::Timestamp),
            other => Err(format!(
                "unknown naming policy '{}' (expected overwrite, sequence or timestamp)",
                other
            )),
        }
    }
}

/// Hands out artifact paths according to a [`NamingPolicy`].
#[derive(Debug, Clone)]
pub struct ArtifactNamer {
    dir: PathBuf,
    stem: String,
    ext: String,
    policy: NamingPolicy,
    issued: u64,
}

impl ArtifactNamer {
    pub fn new(dir: impl Into<PathBuf>, file_name: &str, policy: NamingPolicy) -> Self {
        let as_path = Path::new(file_name);
        let stem = as_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "frame".to_string());
        let ext = as_path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "jpg".to_string());
        Self {
            dir: dir.into(),
            stem,
            ext,
            policy,
            issued: 0,
        }
    }

    pub fn policy(&self) -> NamingPolicy {
        self.policy
    }

    /// Number of paths handed out so far.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// Path for the next artifact. Returns the 1-based sequence number alongside.
    pub fn next_path(&mut self) -> (u64, PathBuf) {
        self.issued += 1;
        let name = match self.policy {
            NamingPolicy::Overwrite => format!("{}.{}", self.stem, self.ext),
            NamingPolicy::Sequence => format!("{}-{:06}.{}", self.stem, self.issued, self.ext),
            NamingPolicy::Timestamp => format!(
                "{}-{}-{:06}.{}",
                self.stem,
                Utc::now().format("%Y%m%d_%H%M%S_%3f"),
                self.issued,
                self.ext
            ),
        };
        (self.issued, self.dir.join(name))
    }
}
