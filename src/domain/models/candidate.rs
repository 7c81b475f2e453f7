//! Catalog rows and the scored candidates built from them.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::slots::Intent;

/// One static catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub name: String,
    pub base_eta_min: u32,
    pub base_price: u32,
    /// Baseline risk in `[0, 1]`.
    pub base_risk: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CatalogRow {
    pub fn new(name: &str, base_eta_min: u32, base_price: u32, base_risk: f64, tags: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            base_eta_min,
            base_price,
            base_risk,
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
        }
    }
}

/// Per-city catalog grouped by resource family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSet {
    pub eat: Vec<CatalogRow>,
    pub trip: Vec<CatalogRow>,
    pub hotel: Vec<CatalogRow>,
}

impl CatalogSet {
    /// Rows searched for an intent. Combos pair each food or lodging row with
    /// a transport row, cycling through the transport list.
    pub fn rows_for(&self, intent: Intent) -> Vec<CatalogRow> {
        match intent {
            Intent::Eat | Intent::Unknown => self.eat.clone(),
            Intent::Travel => self.trip.clone(),
            Intent::Hotel => self.hotel.clone(),
            Intent::ComboEatTravel => zip_with_rides(&self.eat, &self.trip),
            Intent::ComboHotelTravel => zip_with_rides(&self.hotel, &self.trip),
        }
    }
}

fn zip_with_rides(primary: &[CatalogRow], rides: &[CatalogRow]) -> Vec<CatalogRow> {
    if rides.is_empty() {
        return primary.to_vec();
    }
    primary
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let ride = &rides[index % rides.len()];
            let mut tags = row.tags.clone();
            tags.extend(ride.tags.iter().cloned());
            tags.dedup();
            CatalogRow {
                name: format!("{} + {}", row.name, ride.name),
                base_eta_min: row.base_eta_min.max(ride.base_eta_min),
                base_price: row.base_price + ride.base_price,
                base_risk: (row.base_risk + ride.base_risk) / 2.0,
                tags,
            }
        })
        .collect()
}

/// Coarse risk label attached to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 0.35 {
            Self::Low
        } else if score < 0.6 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A simulated concrete resource scored during one planning pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub intent: Intent,
    pub title: String,
    pub place: String,
    pub tags: Vec<String>,
    pub eta_min: u32,
    pub queue_min: u32,
    pub distance_min: u32,
    pub unit_price: u32,
    pub amount: u32,
    pub availability: f64,
    pub rating: f64,
    pub score: f64,
    pub risk: RiskLevel,
}

impl Candidate {
    /// Below this availability a candidate can never be reserved.
    pub const MIN_AVAILABILITY: f64 = 0.25;

    pub fn is_available(&self) -> bool {
        self.availability >= Self::MIN_AVAILABILITY
    }
}
