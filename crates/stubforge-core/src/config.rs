//! Runtime configuration with environment overrides.

use crate::analysis::matcher::MatchPolicy;

pub const DEFAULT_NAMESPACE: &str = "stubforge";

/// Knobs shared by ingestion, matching and generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForgeConfig {
    /// Seed for the literal generator; `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub match_policy: MatchPolicy,
    /// Prefix of every persisted state key.
    pub namespace: String,
    /// Java package declared at the top of generated sources.
    pub java_package: Option<String>,
    /// Parse directory batches on the rayon pool.
    pub parallel_ingest: bool,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            seed: None,
            match_policy: MatchPolicy::Fuzzy,
            namespace: DEFAULT_NAMESPACE.to_string(),
            java_package: None,
            parallel_ingest: true,
        }
    }
}

impl ForgeConfig {
    /// Build a config from `STUBFORGE_*` environment variables, falling back
    /// to the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ForgeConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let seed = lookup("STUBFORGE_SEED").and_then(|v| v.trim().parse::<u64>().ok());

        let match_policy = lookup("STUBFORGE_MATCH_POLICY")
            .and_then(|v| MatchPolicy::parse(&v))
            .unwrap_or(defaults.match_policy);

        let namespace = lookup("STUBFORGE_NAMESPACE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.namespace);

        let java_package = lookup("STUBFORGE_JAVA_PACKAGE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let parallel_ingest = match lookup("STUBFORGE_PARALLEL_INGEST") {
            Some(val) => {
                let v = val.trim().to_lowercase();
                !matches!(v.as_str(), "0" | "false" | "no" | "off")
            }
            None => defaults.parallel_ingest,
        };

        Self {
            seed,
            match_policy,
            namespace,
            java_package,
            parallel_ingest,
        }
    }

    /// Fully qualified persistence key for a collection.
    pub fn state_key(&self, collection: &str) -> String {
        format!("{}:{collection}", self.namespace)
    }
}
