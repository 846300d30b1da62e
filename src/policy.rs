//! Existence-conditioned write policies.

use core::fmt;
use core::str::FromStr;

/// How `TraceMap::update` treats an existing or missing key.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum UpdatePolicy {
    /// Insert if missing, replace if present (`BPF_ANY`).
    #[default]
    CreateOrUpdate,
    /// Insert only if missing (`BPF_NOEXIST`).
    CreateOnly,
    /// Replace only if present (`BPF_EXIST`).
    UpdateOnly,
}

/// Raw flag value that names no policy.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown update flag: {0}")]
pub struct UnknownPolicy(pub u64);

impl UpdatePolicy {
    pub const BPF_ANY: u64 = 0;
    pub const BPF_NOEXIST: u64 = 1;
    pub const BPF_EXIST: u64 = 2;

    /// Decode the flag word accepted by `bpf_map_update_elem`.
    pub fn from_flags(flags: u64) -> Result<Self, UnknownPolicy> {
        match flags {
            Self::BPF_ANY => Ok(UpdatePolicy::CreateOrUpdate),
            Self::BPF_NOEXIST => Ok(UpdatePolicy::CreateOnly),
            Self::BPF_EXIST => Ok(UpdatePolicy::UpdateOnly),
            other => Err(UnknownPolicy(other)),
        }
    }

    pub fn flags(self) -> u64 {
        match self {
            UpdatePolicy::CreateOrUpdate => Self::BPF_ANY,
            UpdatePolicy::CreateOnly => Self::BPF_NOEXIST,
            UpdatePolicy::UpdateOnly => Self::BPF_EXIST,
        }
    }

    pub fn allows_create(self) -> bool {
        !matches!(self, UpdatePolicy::UpdateOnly)
    }

    pub fn allows_replace(self) -> bool {
        !matches!(self, UpdatePolicy::CreateOnly)
    }
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpdatePolicy::CreateOrUpdate => "any",
            UpdatePolicy::CreateOnly => "noexist",
            UpdatePolicy::UpdateOnly => "exist",
        })
    }
}

/// Accepts `any`/`noexist`/`exist` (case-insensitive, optional `BPF_`
/// prefix) or the numeric flag.
impl FromStr for UpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let name = lower.strip_prefix("bpf_").unwrap_or(&lower);
        match name {
            "any" => Ok(UpdatePolicy::CreateOrUpdate),
            "noexist" => Ok(UpdatePolicy::CreateOnly),
            "exist" => Ok(UpdatePolicy::UpdateOnly),
            _ => name
                .parse::<u64>()
                .map_err(|_| format!("unknown update policy: {s}"))
                .and_then(|n| Self::from_flags(n).map_err(|e| e.to_string())),
        }
    }
}
