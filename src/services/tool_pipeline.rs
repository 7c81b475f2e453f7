//! Simulated tool pipeline: search, constrain, reserve, route and prove.
//!
//! Every tool is a pure function of its inputs and a seed string, so a plan
//! or run replays identically for identical slot state.

use crate::domain::models::candidate::{Candidate, CatalogRow, CatalogSet, RiskLevel};
use crate::domain::models::plan::OptionKey;
use crate::domain::models::run::{FailureCode, ProofRecord, RouteInfo, TrafficLevel};
use crate::domain::models::slots::{Budget, BudgetTier, Intent, SlotRecord, time_pressure};
use crate::services::deterministic::{seeded_chance, seeded_float, seeded_pick, seeded_range, stable_hash32};

/// Candidates kept after ranking.
pub const MAX_CANDIDATES: usize = 6;

/// Slack allowed over the budget cap before a candidate overflows.
const BUDGET_TOLERANCE: f64 = 1.04;

const BASE_QUEUE_LIMIT_MIN: f64 = 20.0;

/// Billable units for an intent: diners, rooms or rides.
pub fn units_for(intent: Intent, party_size: u32) -> u32 {
    let party = party_size.max(1);
    match intent {
        Intent::Eat | Intent::Unknown | Intent::ComboEatTravel | Intent::ComboHotelTravel => party,
        Intent::Hotel => party.div_ceil(2),
        Intent::Travel => party.div_ceil(4),
    }
}

fn tier_cap_per_unit(intent: Intent, tier: BudgetTier) -> u32 {
    let (eat, trip, hotel) = match tier {
        BudgetTier::Low => (80, 60, 350),
        BudgetTier::Mid => (160, 150, 800),
        BudgetTier::High => (400, 400, 2000),
    };
    let ride_extra = match tier {
        BudgetTier::Low => 40,
        BudgetTier::Mid => 80,
        BudgetTier::High => 150,
    };
    match intent {
        Intent::Eat | Intent::Unknown => eat,
        Intent::Travel => trip,
        Intent::Hotel => hotel,
        Intent::ComboEatTravel => eat + ride_extra,
        Intent::ComboHotelTravel => hotel + ride_extra,
    }
}

/// Total spend cap for the request, `None` when no budget is known.
///
/// Explicit amounts are read per unit, like tiers.
pub fn budget_cap(intent: Intent, budget: Option<&Budget>, units: u32) -> Option<u32> {
    let per_unit = match budget? {
        Budget::Tier(tier) => tier_cap_per_unit(intent, *tier),
        Budget::Amount(amount) => *amount,
    };
    Some(per_unit * units.max(1))
}

/// Longest acceptable queue in minutes.
pub fn queue_limit(slots: &SlotRecord) -> f64 {
    let pressure = time_pressure(slots.time_constraint.as_ref());
    let limit = BASE_QUEUE_LIMIT_MIN * (1.0 - 0.5 * pressure);
    if slots.has_preference("queue_flexible_after_fail") {
        limit * 1.5
    } else {
        limit
    }
}

fn queue_base(intent: Intent) -> f64 {
    match intent {
        Intent::Eat | Intent::Unknown => 18.0,
        Intent::Travel => 6.0,
        Intent::Hotel => 4.0,
        Intent::ComboEatTravel | Intent::ComboHotelTravel => 12.0,
    }
}

fn availability_floor(intent: Intent) -> f64 {
    match intent {
        Intent::Eat | Intent::Unknown => 0.14,
        Intent::Travel => 0.10,
        Intent::Hotel => 0.18,
        Intent::ComboEatTravel | Intent::ComboHotelTravel => 0.16,
    }
}

fn candidate_title(intent: Intent, name: &str) -> String {
    match intent {
        Intent::Eat | Intent::Unknown => format!("Table at {name}"),
        Intent::Travel => format!("{name} ride"),
        Intent::Hotel => format!("Room at {name}"),
        Intent::ComboEatTravel => format!("Dinner and ride: {name}"),
        Intent::ComboHotelTravel => format!("Stay and ride: {name}"),
    }
}

/// Turn one catalog row into a scored candidate.
pub fn build_candidate_from_catalog_row(
    row: &CatalogRow,
    index: usize,
    intent: Intent,
    slots: &SlotRecord,
    seed: &str,
) -> Candidate {
    let key = format!("{}#{index}", row.name);
    let draw = |field: &str| seeded_float(seed, &format!("{key}|{field}"));
    let pressure = time_pressure(slots.time_constraint.as_ref());

    let variation = seeded_range(seed, &format!("{key}|price"), 0.88, 1.12);
    let demand = if pressure > 0.0 { 1.08 + 0.08 * pressure } else { 1.0 };
    let unit_price = (f64::from(row.base_price) * variation * demand).round().max(1.0) as u32;
    let amount = unit_price * units_for(intent, slots.party_size_or_default());

    let jitter = draw("queue") * 20.0 - 6.0;
    let queue_min = (queue_base(intent) + jitter + pressure * 8.0).max(0.0).round() as u32;

    let distance_min = 4 + (draw("distance") * 20.0).round() as u32;
    let raw_eta = f64::from(row.base_eta_min + distance_min);
    let eta_min = if slots.has_preference("walk_first") {
        (raw_eta * 1.08).round() as u32
    } else {
        raw_eta as u32
    };

    let floor = availability_floor(intent);
    let availability = floor + draw("availability") * (1.0 - floor);
    let rating = ((3.6 + draw("rating") * 1.3) * 10.0).round() / 10.0;

    let mut queue_penalty = f64::from(queue_min);
    if slots.has_preference("no_queue") {
        queue_penalty *= 1.25;
    }
    let score = rating * 17.0 - queue_penalty * 0.65 - f64::from(amount) * 0.05 - f64::from(distance_min) * 0.2;

    let risk_score = row.base_risk + (1.0 - availability) * 0.4 + f64::from(queue_min) / 100.0;

    Candidate {
        id: format!("cand_{:08x}", stable_hash32(&format!("{seed}|{}|{index}", row.name))),
        intent,
        title: candidate_title(intent, &row.name),
        place: row.name.clone(),
        tags: row.tags.clone(),
        eta_min,
        queue_min,
        distance_min,
        unit_price,
        amount,
        availability,
        rating,
        score,
        risk: RiskLevel::from_score(risk_score),
    }
}

/// Search the catalog, score every row and keep the best candidates.
pub fn search_candidates(catalog: &CatalogSet, slots: &SlotRecord, seed: &str) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = catalog
        .rows_for(slots.intent)
        .iter()
        .enumerate()
        .map(|(index, row)| build_candidate_from_catalog_row(row, index, slots.intent, slots, seed))
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates.truncate(MAX_CANDIDATES);
    candidates
}

/// Outcome of the constraint tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintCheck {
    pub code: Option<FailureCode>,
    pub cap: Option<u32>,
    pub queue_limit: f64,
}

impl ConstraintCheck {
    pub fn passed(&self) -> bool {
        self.code.is_none()
    }
}

/// Check availability, then budget, then queue (queue only with `no_queue`).
pub fn check_constraints(candidate: &Candidate, slots: &SlotRecord) -> ConstraintCheck {
    let units = units_for(candidate.intent, slots.party_size_or_default());
    let cap = budget_cap(candidate.intent, slots.budget.as_ref(), units);
    let limit = queue_limit(slots);

    let code = if !candidate.is_available() {
        Some(FailureCode::ResourceUnavailable)
    } else if cap.is_some_and(|cap| f64::from(candidate.amount) > f64::from(cap) * BUDGET_TOLERANCE) {
        Some(FailureCode::BudgetOverflow)
    } else if slots.has_preference("no_queue") && f64::from(candidate.queue_min) > limit {
        Some(FailureCode::QueueTooLong)
    } else {
        None
    };

    ConstraintCheck {
        code,
        cap,
        queue_limit: limit,
    }
}

/// Outcome of the reservation tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub locked: bool,
    pub hold_id: Option<String>,
}

/// Try to hold a candidate. Unavailable candidates never lock; available ones
/// soft-fail 12 % of the time on the main lane and 3 % on the backup lane.
pub fn reserve(candidate: &Candidate, option_key: OptionKey, seed: &str) -> Reservation {
    if !candidate.is_available() {
        return Reservation {
            locked: false,
            hold_id: None,
        };
    }
    let soft_fail = match option_key {
        OptionKey::Main => 0.12,
        OptionKey::Backup => 0.03,
    };
    let key = format!("{}|reserve|{option_key}", candidate.id);
    if seeded_chance(seed, &key, soft_fail) {
        return Reservation {
            locked: false,
            hold_id: None,
        };
    }
    Reservation {
        locked: true,
        hold_id: Some(format!("HOLD-{:06X}", stable_hash32(&format!("{seed}|{key}")) & 0x00FF_FFFF)),
    }
}

const TRAFFIC_LEVELS: [TrafficLevel; 3] = [TrafficLevel::Light, TrafficLevel::Moderate, TrafficLevel::Heavy];

/// Route to a candidate: jittered eta, traffic level and a fare range.
pub fn route(candidate: &Candidate, seed: &str) -> RouteInfo {
    let key = format!("{}|route", candidate.id);
    let traffic = seeded_pick(seed, &format!("{key}|traffic"), &TRAFFIC_LEVELS)
        .copied()
        .unwrap_or(TrafficLevel::Moderate);
    let jitter = seeded_range(seed, &format!("{key}|eta"), -3.0, 6.0).round();
    let mut eta = (f64::from(candidate.eta_min) + jitter).max(1.0) as u32;
    if traffic == TrafficLevel::Heavy {
        eta += 5;
    }
    let distance = f64::from(candidate.distance_min);
    RouteInfo {
        eta_min: eta,
        traffic,
        cost_low: (distance * 2.1).round() as u32,
        cost_high: (distance * 3.4).round() as u32,
    }
}

/// Proof of booking keyed by run, place and amount.
pub fn generate_proof(run_id: &str, place: &str, amount: u32) -> ProofRecord {
    let hash = stable_hash32(&format!("{run_id}|{place}|{amount}"));
    ProofRecord {
        proof_id: format!("PRF-{hash:08X}"),
        summary: format!("{place}, ¥{amount}, run {run_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::slots::TimeConstraint;
    use crate::domain::ports::CatalogSource;
    use crate::infrastructure::catalog::StaticCatalog;

    fn eat_slots() -> SlotRecord {
        SlotRecord {
            intent: Intent::Eat,
            city: Some("Shanghai".to_string()),
            budget: Some(Budget::Tier(BudgetTier::Mid)),
            party_size: Some(2),
            ..Default::default()
        }
    }

    fn candidate(amount: u32, queue_min: u32, availability: f64) -> Candidate {
        Candidate {
            id: "cand_test".to_string(),
            intent: Intent::Eat,
            title: "t".to_string(),
            place: "p".to_string(),
            tags: vec![],
            eta_min: 20,
            queue_min,
            distance_min: 10,
            unit_price: amount / 2,
            amount,
            availability,
            rating: 4.2,
            score: 50.0,
            risk: RiskLevel::Low,
        }
    }

    #[test]
    fn test_units() {
        assert_eq!(units_for(Intent::Eat, 5), 5);
        assert_eq!(units_for(Intent::Hotel, 3), 2);
        assert_eq!(units_for(Intent::Travel, 5), 2);
        assert_eq!(units_for(Intent::ComboHotelTravel, 3), 3);
        assert_eq!(units_for(Intent::Travel, 0), 1);
    }

    #[test]
    fn test_budget_caps() {
        let mid = Budget::Tier(BudgetTier::Mid);
        assert_eq!(budget_cap(Intent::Eat, Some(&mid), 2), Some(320));
        assert_eq!(budget_cap(Intent::ComboEatTravel, Some(&mid), 2), Some(480));
        assert_eq!(budget_cap(Intent::Hotel, Some(&Budget::Amount(500)), 1), Some(500));
        assert_eq!(budget_cap(Intent::Eat, None, 2), None);
    }

    #[test]
    fn test_queue_limit_shrinks_under_pressure() {
        let mut slots = eat_slots();
        assert!((queue_limit(&slots) - 20.0).abs() < 1e-9);
        slots.time_constraint = Some(TimeConstraint::Asap);
        assert!((queue_limit(&slots) - 10.0).abs() < 1e-9);
        slots.add_preference("queue_flexible_after_fail");
        assert!((queue_limit(&slots) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_candidate_fields_within_ranges() {
        let row = CatalogRow::new("Test Kitchen", 10, 100, 0.3, &[]);
        let slots = eat_slots();
        for index in 0..20 {
            let c = build_candidate_from_catalog_row(&row, index, Intent::Eat, &slots, "seed");
            assert!((88..=112).contains(&c.unit_price), "{}", c.unit_price);
            assert_eq!(c.amount, c.unit_price * 2);
            assert!((4..=24).contains(&c.distance_min));
            assert_eq!(c.eta_min, 10 + c.distance_min);
            assert!(c.availability >= 0.14 && c.availability < 1.0);
            assert!(c.rating >= 3.6 && c.rating <= 4.9);
            assert!(c.queue_min <= 32);
            assert!(c.id.starts_with("cand_") && c.id.len() == 13);
        }
    }

    #[test]
    fn test_search_is_sorted_truncated_and_deterministic() {
        let catalog = StaticCatalog::new().catalog_for(Some("Shanghai"));
        let slots = eat_slots();
        let first = search_candidates(&catalog, &slots, "seed-1");
        let second = search_candidates(&catalog, &slots, "seed-1");
        assert_eq!(first, second);
        assert!(first.len() <= MAX_CANDIDATES);
        assert!(first.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_constraint_order() {
        let mut slots = eat_slots();
        slots.add_preference("no_queue");

        let check = check_constraints(&candidate(900, 40, 0.1), &slots);
        assert_eq!(check.code, Some(FailureCode::ResourceUnavailable));

        let check = check_constraints(&candidate(900, 40, 0.9), &slots);
        assert_eq!(check.code, Some(FailureCode::BudgetOverflow));
        assert_eq!(check.cap, Some(320));

        let check = check_constraints(&candidate(330, 40, 0.9), &slots);
        assert_eq!(check.code, Some(FailureCode::QueueTooLong));

        let check = check_constraints(&candidate(300, 12, 0.9), &slots);
        assert!(check.passed());
    }

    #[test]
    fn test_queue_ignored_without_no_queue() {
        let check = check_constraints(&candidate(300, 60, 0.9), &eat_slots());
        assert!(check.passed());
    }

    #[test]
    fn test_unavailable_never_locks() {
        let reservation = reserve(&candidate(100, 0, 0.1), OptionKey::Backup, "seed");
        assert!(!reservation.locked);
        assert!(reservation.hold_id.is_none());
    }

    #[test]
    fn test_route_cost_range_tracks_distance() {
        let route = route(&candidate(100, 0, 0.9), "seed");
        assert_eq!(route.cost_low, 21);
        assert_eq!(route.cost_high, 34);
        assert!(route.eta_min >= 17);
    }

    #[test]
    fn test_proof_is_keyed_by_run_place_amount() {
        let a = generate_proof("run-1", "Noodle Lab", 84);
        let b = generate_proof("run-1", "Noodle Lab", 84);
        let c = generate_proof("run-2", "Noodle Lab", 84);
        assert_eq!(a, b);
        assert_ne!(a.proof_id, c.proof_id);
        assert!(a.proof_id.starts_with("PRF-"));
        assert_eq!(a.proof_id.len(), 12);
    }
}
