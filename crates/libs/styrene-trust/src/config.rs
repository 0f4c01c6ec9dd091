use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Per-manager resource limits. A limit of `0` is treated as unlimited, and
/// every limit is `0` unless the host configures it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// Non-helper associations allowed on one boundary.
    pub max_participants_per_boundary: usize,
    /// Pending waiting-process entries allowed on one boundary.
    pub max_waiting_per_boundary: usize,
    /// Live boundaries one helper session may own at a time.
    pub max_boundaries_per_helper: usize,
}

impl ManagerConfig {
    /// A config with every limit disabled. Same as [`Default`].
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}

/// `true` if `current` has already reached `max`. `max == 0` never blocks.
pub(crate) fn at_limit(current: usize, max: usize) -> bool {
    max != 0 && current >= max
}
