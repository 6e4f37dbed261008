use std::str::FromStr;

/// When operators may ban participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BanPolicy {
    /// Any phase. Removing a matched participant re-links their ring.
    #[default]
    Permissive,
    /// Join phase only, before any ring exists.
    JoinOnly,
}

impl FromStr for BanPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "join-only" | "join_only" => Ok(Self::JoinOnly),
            other => Err(anyhow::anyhow!(
                "unknown ban policy '{}' (expected permissive or join-only)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SwapConfig {
    pub ban_policy: BanPolicy,
    /// Fixed seed for the matching shuffle. `None` seeds from the OS.
    pub match_seed: Option<u64>,
}
