//! GPU tier selection.
//!
//! The tier is picked from substrings of the model identifier. This is a
//! proxy for parameter count, not a classifier.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Class of accelerator hardware an endpoint is provisioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuTier {
    /// RTX 4090 24GB.
    Small,
    /// RTX A6000 48GB.
    Medium,
    /// A100 80GB.
    Large,
    /// H200 141GB.
    XLarge,
}

impl GpuTier {
    /// All tiers, smallest first.
    pub const ALL: [Self; 4] = [Self::Small, Self::Medium, Self::Large, Self::XLarge];

    /// RunPod GPU pool ID.
    #[must_use]
    pub fn provider_gpu_id(self) -> &'static str {
        match self {
            Self::Small => "ADA_24",
            Self::Medium => "AMPERE_48",
            Self::Large => "AMPERE_80",
            Self::XLarge => "HOPPER_141",
        }
    }

    /// Human-readable GPU name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Small => "RTX 4090 24GB",
            Self::Medium => "RTX A6000 48GB",
            Self::Large => "A100 80GB",
            Self::XLarge => "H200 141GB",
        }
    }

    /// Serverless price in USD per second of worker time.
    #[must_use]
    pub fn rate_per_second(self) -> f64 {
        match self {
            Self::Small => 0.000_31,
            Self::Medium => 0.000_34,
            Self::Large => 0.000_76,
            Self::XLarge => 0.001_55,
        }
    }

    /// Serverless price in USD per hour.
    #[must_use]
    pub fn hourly_rate(self) -> f64 {
        self.rate_per_second() * 3600.0
    }
}

impl std::fmt::Display for GpuTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Small => write!(f, "small"),
            Self::Medium => write!(f, "medium"),
            Self::Large => write!(f, "large"),
            Self::XLarge => write!(f, "xlarge"),
        }
    }
}

impl FromStr for GpuTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown GPU tier: {s}"))
    }
}

/// Pick the GPU tier for a model. First matching rule wins.
///
/// DeepSeek V3/R1 checkpoints get the largest tier. Their distilled
/// variants are settled before the size rules and get [`GpuTier::Large`].
#[must_use]
pub fn select_tier(model_id: &str) -> GpuTier {
    let id = model_id.to_lowercase();

    let frontier = id.contains("deepseek-v3") || id.contains("deepseek-r1");
    if frontier && !id.contains("distill") {
        GpuTier::XLarge
    } else if frontier
        || id.contains("qwen3-coder-next")
        || id.contains("70b")
        || id.contains("80b")
    {
        GpuTier::Large
    } else if id.contains("32b") {
        GpuTier::Medium
    } else {
        GpuTier::Small
    }
}
