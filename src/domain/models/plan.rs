//! Two-lane plans: a main option and a backup option.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::slots::Intent;

/// Which lane of a plan an option occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKey {
    Main,
    Backup,
}

impl OptionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Backup => "backup",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "main" | "primary" => Some(Self::Main),
            "backup" | "secondary" => Some(Self::Backup),
            _ => None,
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executable option of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOption {
    pub key: OptionKey,
    pub intent: Intent,
    pub title: String,
    pub place: String,
    pub eta_min: u32,
    pub amount: u32,
    pub risk: String,
    /// One-line summary, equal to the first ranked reason.
    pub reason: String,
    /// Up to three ranked reasons.
    pub reasons: Vec<String>,
    pub requires_payment: bool,
    pub requires_permission: bool,
    pub requires_confirmation: bool,
    pub candidate_id: String,
}

impl PlanOption {
    /// Amount above which confirmation is required even without payment.
    pub const CONFIRMATION_AMOUNT: u32 = 260;

    /// Same option moved to another lane.
    pub fn rekeyed(&self, key: OptionKey) -> Self {
        Self {
            key,
            ..self.clone()
        }
    }
}

/// A plan always carries both lanes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub intent: Intent,
    pub city: String,
    pub main: PlanOption,
    pub backup: PlanOption,
    /// Number of candidates that survived search and ranking.
    pub candidates_considered: usize,
}

impl Plan {
    pub fn option(&self, key: OptionKey) -> &PlanOption {
        match key {
            OptionKey::Main => &self.main,
            OptionKey::Backup => &self.backup,
        }
    }

    /// Whether the backup lane is a re-keyed copy of main.
    pub fn has_degenerate_backup(&self) -> bool {
        self.main.candidate_id == self.backup.candidate_id
    }
}
