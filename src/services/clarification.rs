//! Clarification policy: decide whether to ask the user or proceed to planning.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::models::slots::{Budget, BudgetTier, Intent, SlotEvidence, SlotKey, SlotRecord, TimeConstraint};

/// Slots that must hold a value before planning an intent. Never empty.
pub fn critical_slots(intent: Intent) -> &'static [SlotKey] {
    match intent {
        Intent::Eat | Intent::Hotel => &[SlotKey::City, SlotKey::Budget, SlotKey::PartySize],
        Intent::Travel => &[SlotKey::City, SlotKey::TimeConstraint],
        Intent::ComboEatTravel | Intent::ComboHotelTravel => &[
            SlotKey::City,
            SlotKey::Budget,
            SlotKey::PartySize,
            SlotKey::TimeConstraint,
        ],
        Intent::Unknown => &[SlotKey::Intent],
    }
}

/// Slots worth asking about, in asking order.
///
/// Unknown intent yields exactly `[intent]`. Otherwise the critical gaps are
/// joined by the per-intent ask-first rules. For food, budget and party size
/// are both asked unless at least one of them was stated explicitly, even
/// when a value is already present.
pub fn clarification_missing_slots(slots: &SlotRecord, evidence: &SlotEvidence) -> Vec<SlotKey> {
    if !slots.intent.is_known() {
        return vec![SlotKey::Intent];
    }

    let mut missing: Vec<SlotKey> = critical_slots(slots.intent)
        .iter()
        .copied()
        .filter(|key| !slots.has_value(*key))
        .collect();

    let forced: Vec<SlotKey> = match slots.intent {
        Intent::Eat => {
            if evidence.get(SlotKey::Budget) || evidence.get(SlotKey::PartySize) {
                Vec::new()
            } else {
                vec![SlotKey::Budget, SlotKey::PartySize]
            }
        }
        Intent::Travel => absent(slots, &[SlotKey::TimeConstraint]),
        Intent::Hotel => absent(slots, &[SlotKey::Budget, SlotKey::PartySize]),
        Intent::ComboEatTravel | Intent::ComboHotelTravel => absent(
            slots,
            &[SlotKey::TimeConstraint, SlotKey::Budget, SlotKey::PartySize],
        ),
        Intent::Unknown => Vec::new(),
    };
    missing.extend(forced);

    prioritize_missing_slots(slots.intent, &missing)
}

fn absent(slots: &SlotRecord, keys: &[SlotKey]) -> Vec<SlotKey> {
    keys.iter().copied().filter(|key| !slots.has_value(*key)).collect()
}

fn priority_order(intent: Intent) -> &'static [SlotKey] {
    match intent {
        Intent::Eat => &[
            SlotKey::City,
            SlotKey::Budget,
            SlotKey::PartySize,
            SlotKey::TimeConstraint,
            SlotKey::Area,
        ],
        Intent::Travel => &[
            SlotKey::City,
            SlotKey::TimeConstraint,
            SlotKey::PartySize,
            SlotKey::Budget,
        ],
        Intent::Hotel => &[
            SlotKey::City,
            SlotKey::Budget,
            SlotKey::PartySize,
            SlotKey::TimeConstraint,
        ],
        Intent::ComboEatTravel | Intent::ComboHotelTravel => &[
            SlotKey::City,
            SlotKey::TimeConstraint,
            SlotKey::Budget,
            SlotKey::PartySize,
        ],
        Intent::Unknown => &[],
    }
}

/// Order `missing` by the intent's fixed priority. Intent always comes first,
/// unlisted keys go last, ties break by slot name, duplicates are dropped.
pub fn prioritize_missing_slots(intent: Intent, missing: &[SlotKey]) -> Vec<SlotKey> {
    let order = priority_order(intent);
    let rank = |key: SlotKey| -> usize {
        if key == SlotKey::Intent {
            return 0;
        }
        order
            .iter()
            .position(|k| *k == key)
            .map_or(99, |index| index + 1)
    };

    let mut keys = missing.to_vec();
    keys.sort_by(|a, b| rank(*a).cmp(&rank(*b)).then_with(|| a.as_str().cmp(b.as_str())));
    keys.dedup();
    keys
}

/// Fill the gaps in `missing` (and the critical slots of an assumed intent)
/// with defaults. Never sets evidence. Returns the keys that were filled.
pub fn apply_assumptions_for_missing_slots(
    slots: &mut SlotRecord,
    missing: &[SlotKey],
    default_city: &str,
) -> Vec<SlotKey> {
    let mut assumed = Vec::new();
    let mut keys = missing.to_vec();

    if keys.contains(&SlotKey::Intent) && !slots.intent.is_known() {
        slots.intent = Intent::Eat;
        assumed.push(SlotKey::Intent);
        keys.extend_from_slice(critical_slots(Intent::Eat));
    }

    for key in prioritize_missing_slots(slots.intent, &keys) {
        if slots.has_value(key) {
            continue;
        }
        let filled = match key {
            SlotKey::City => {
                slots.city = Some(default_city.to_string());
                true
            }
            SlotKey::Budget => {
                slots.budget = Some(Budget::Tier(BudgetTier::Mid));
                true
            }
            SlotKey::PartySize => {
                slots.party_size = Some(2);
                true
            }
            SlotKey::TimeConstraint => {
                slots.time_constraint = Some(TimeConstraint::Asap);
                true
            }
            SlotKey::Intent
            | SlotKey::Area
            | SlotKey::Preferences
            | SlotKey::ExecutionPermission => false,
        };
        if filled {
            assumed.push(key);
        }
    }
    assumed
}

fn slot_question(intent: Intent, key: SlotKey) -> &'static str {
    match key {
        SlotKey::Intent => "what you would like me to arrange: a meal, a ride or a hotel",
        SlotKey::City => "which city you are in",
        SlotKey::Area => "which area you prefer",
        SlotKey::Budget if intent == Intent::Hotel => "your budget per night",
        SlotKey::Budget => "your budget per person",
        SlotKey::PartySize => "how many people are coming",
        SlotKey::TimeConstraint => "when you need it",
        SlotKey::Preferences => "any preferences I should know about",
        SlotKey::ExecutionPermission => "whether I may book it directly",
    }
}

/// Plain-language question covering the first two missing slots.
pub fn clarification_question(intent: Intent, missing: &[SlotKey]) -> String {
    let parts: Vec<&str> = missing
        .iter()
        .take(2)
        .map(|key| slot_question(intent, *key))
        .collect();
    if parts.is_empty() {
        return "Anything else I should know before planning?".to_string();
    }
    format!("Could you tell me {}?", parts.join(" and "))
}

/// Outcome of one clarification evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ClarificationDecision {
    Ask {
        missing: Vec<SlotKey>,
        question: String,
    },
    Proceed {
        /// Keys filled with defaults because the ask bound was reached.
        assumed: Vec<SlotKey>,
    },
}

/// Bounded asking policy.
#[derive(Debug, Clone)]
pub struct ClarificationPolicy {
    max_turns: u32,
    default_city: String,
}

impl ClarificationPolicy {
    pub fn new(max_turns: u32, default_city: impl Into<String>) -> Self {
        Self {
            max_turns,
            default_city: default_city.into(),
        }
    }

    /// Ask while the bound allows, otherwise assume defaults and proceed.
    /// `ask_count` only moves on a real asking turn.
    pub fn evaluate(
        &self,
        slots: &mut SlotRecord,
        evidence: &SlotEvidence,
        ask_count: &mut u32,
    ) -> ClarificationDecision {
        let missing = clarification_missing_slots(slots, evidence);
        if missing.is_empty() {
            return ClarificationDecision::Proceed { assumed: Vec::new() };
        }

        if *ask_count < self.max_turns {
            *ask_count += 1;
            let question = clarification_question(slots.intent, &missing);
            debug!(ask_count = *ask_count, ?missing, "Asking for missing slots");
            return ClarificationDecision::Ask { missing, question };
        }

        let assumed = apply_assumptions_for_missing_slots(slots, &missing, &self.default_city);
        debug!(?assumed, "Ask bound reached, assuming defaults");
        ClarificationDecision::Proceed { assumed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eat_slots() -> SlotRecord {
        SlotRecord {
            intent: Intent::Eat,
            ..Default::default()
        }
    }

    #[test]
    fn test_critical_slots_never_empty() {
        for intent in Intent::ALL {
            assert!(!critical_slots(intent).is_empty(), "{intent}");
            assert_eq!(critical_slots(intent), critical_slots(intent));
        }
    }

    #[test]
    fn test_unknown_intent_asks_only_intent() {
        let slots = SlotRecord {
            city: Some("Shanghai".to_string()),
            ..Default::default()
        };
        assert_eq!(
            clarification_missing_slots(&slots, &SlotEvidence::new()),
            vec![SlotKey::Intent]
        );
    }

    #[test]
    fn test_eat_forces_budget_and_party_without_evidence() {
        let mut slots = eat_slots();
        slots.city = Some("Shanghai".to_string());
        slots.budget = Some(Budget::Tier(BudgetTier::Mid));
        slots.party_size = Some(2);

        let missing = clarification_missing_slots(&slots, &SlotEvidence::new());
        assert_eq!(missing, vec![SlotKey::Budget, SlotKey::PartySize]);

        let mut evidence = SlotEvidence::new();
        evidence.mark(SlotKey::PartySize);
        assert!(clarification_missing_slots(&slots, &evidence).is_empty());
    }

    #[test]
    fn test_hotel_forces_only_absent_values() {
        let slots = SlotRecord {
            intent: Intent::Hotel,
            city: Some("Beijing".to_string()),
            budget: Some(Budget::Amount(600)),
            ..Default::default()
        };
        assert_eq!(
            clarification_missing_slots(&slots, &SlotEvidence::new()),
            vec![SlotKey::PartySize]
        );
    }

    #[test]
    fn test_combo_order_puts_time_before_budget() {
        let slots = SlotRecord {
            intent: Intent::ComboEatTravel,
            ..Default::default()
        };
        assert_eq!(
            clarification_missing_slots(&slots, &SlotEvidence::new()),
            vec![
                SlotKey::City,
                SlotKey::TimeConstraint,
                SlotKey::Budget,
                SlotKey::PartySize
            ]
        );
    }

    #[test]
    fn test_prioritize_dedups_and_ranks_unlisted_last() {
        let ordered = prioritize_missing_slots(
            Intent::Travel,
            &[
                SlotKey::Preferences,
                SlotKey::TimeConstraint,
                SlotKey::City,
                SlotKey::Area,
                SlotKey::TimeConstraint,
                SlotKey::Intent,
            ],
        );
        assert_eq!(
            ordered,
            vec![
                SlotKey::Intent,
                SlotKey::City,
                SlotKey::TimeConstraint,
                SlotKey::Area,
                SlotKey::Preferences
            ]
        );
    }

    #[test]
    fn test_assumptions_fill_defaults_without_evidence() {
        let mut slots = SlotRecord::default();
        let assumed = apply_assumptions_for_missing_slots(&mut slots, &[SlotKey::Intent], "Shanghai");
        assert_eq!(slots.intent, Intent::Eat);
        assert_eq!(slots.city.as_deref(), Some("Shanghai"));
        assert_eq!(slots.budget, Some(Budget::Tier(BudgetTier::Mid)));
        assert_eq!(slots.party_size, Some(2));
        assert_eq!(
            assumed,
            vec![SlotKey::Intent, SlotKey::City, SlotKey::Budget, SlotKey::PartySize]
        );
    }

    #[test]
    fn test_policy_asks_twice_then_assumes() {
        let policy = ClarificationPolicy::new(2, "Shanghai");
        let mut slots = eat_slots();
        let evidence = SlotEvidence::new();
        let mut asks = 0;

        assert!(matches!(
            policy.evaluate(&mut slots, &evidence, &mut asks),
            ClarificationDecision::Ask { .. }
        ));
        assert!(matches!(
            policy.evaluate(&mut slots, &evidence, &mut asks),
            ClarificationDecision::Ask { .. }
        ));
        assert_eq!(asks, 2);

        match policy.evaluate(&mut slots, &evidence, &mut asks) {
            ClarificationDecision::Proceed { assumed } => {
                assert!(assumed.contains(&SlotKey::Budget));
                assert!(assumed.contains(&SlotKey::PartySize));
            }
            other => panic!("expected proceed, got {other:?}"),
        }
        assert_eq!(asks, 2);
        assert_eq!(slots.budget, Some(Budget::Tier(BudgetTier::Mid)));
        assert_eq!(slots.party_size, Some(2));

        // Values now present; the ask-first rule still fires but the bound holds.
        assert_eq!(
            policy.evaluate(&mut slots, &evidence, &mut asks),
            ClarificationDecision::Proceed { assumed: Vec::new() }
        );
    }

    #[test]
    fn test_question_mentions_first_two_slots() {
        let question = clarification_question(
            Intent::Eat,
            &[SlotKey::Budget, SlotKey::PartySize, SlotKey::City],
        );
        assert!(question.contains("budget per person"));
        assert!(question.contains("how many people"));
        assert!(!question.contains("city"));
    }
}
