//! Slot domain model.
//!
//! A conversation owns exactly one [`SlotRecord`] holding the structured data
//! extracted from the user's turns, and a parallel [`SlotEvidence`] record
//! that remembers which values were stated explicitly rather than inferred.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Literal values that must never be stored in a slot.
pub const SENTINEL_VALUES: [&str; 4] = ["", "unknown", "null", "undefined"];

/// Coarse task category driving which slots are critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Eat,
    Travel,
    Hotel,
    ComboEatTravel,
    ComboHotelTravel,
    Unknown,
}

impl Default for Intent {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Intent {
    /// Every intent, in declaration order.
    pub const ALL: [Intent; 6] = [
        Self::Eat,
        Self::Travel,
        Self::Hotel,
        Self::ComboEatTravel,
        Self::ComboHotelTravel,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eat => "eat",
            Self::Travel => "travel",
            Self::Hotel => "hotel",
            Self::ComboEatTravel => "combo_eat_travel",
            Self::ComboHotelTravel => "combo_hotel_travel",
            Self::Unknown => "unknown",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "eat" | "food" => Some(Self::Eat),
            "travel" | "trip" => Some(Self::Travel),
            "hotel" | "stay" => Some(Self::Hotel),
            "combo_eat_travel" => Some(Self::ComboEatTravel),
            "combo_hotel_travel" => Some(Self::ComboHotelTravel),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    pub fn is_combo(&self) -> bool {
        matches!(self, Self::ComboEatTravel | Self::ComboHotelTravel)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualitative budget level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetTier {
    Low,
    Mid,
    High,
}

impl BudgetTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" | "cheap" => Some(Self::Low),
            "mid" | "medium" => Some(Self::Mid),
            "high" | "premium" => Some(Self::High),
            _ => None,
        }
    }

    /// One level down, saturating at `Low`.
    pub fn downgrade(self) -> Self {
        match self {
            Self::High => Self::Mid,
            Self::Mid | Self::Low => Self::Low,
        }
    }
}

/// Budget slot: either a tier or an explicit amount in currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Budget {
    Tier(BudgetTier),
    Amount(u32),
}

impl Budget {
    /// Tier equivalent of this budget. Amount thresholds follow the
    /// qualitative split used by the extractor (<= 300 low, >= 1200 high).
    pub fn tier(&self) -> BudgetTier {
        match *self {
            Self::Tier(tier) => tier,
            Self::Amount(amount) if amount <= 300 => BudgetTier::Low,
            Self::Amount(amount) if amount >= 1200 => BudgetTier::High,
            Self::Amount(_) => BudgetTier::Mid,
        }
    }

    pub fn is_low(&self) -> bool {
        self.tier() == BudgetTier::Low
    }

    /// Tighten the budget by one step. Explicit amounts drop by 15 %.
    pub fn downgrade(self) -> Self {
        match self {
            Self::Tier(tier) => Self::Tier(tier.downgrade()),
            Self::Amount(amount) => Self::Amount((amount * 85) / 100),
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tier(tier) => f.write_str(tier.as_str()),
            Self::Amount(amount) => write!(f, "¥{amount}"),
        }
    }
}

/// Time constraint slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeConstraint {
    WithinMinutes { minutes: u32 },
    Tonight,
    Asap,
    Before { hour: u8, minute: u8 },
}

impl TimeConstraint {
    /// Time pressure in `[0, 1]`; higher means less slack.
    pub fn pressure(&self) -> f64 {
        match *self {
            Self::Asap => 1.0,
            Self::WithinMinutes { minutes } => ((90.0 - f64::from(minutes)) / 60.0).clamp(0.0, 1.0),
            Self::Before { .. } => 0.5,
            Self::Tonight => 0.2,
        }
    }
}

impl fmt::Display for TimeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WithinMinutes { minutes } => write!(f, "within {minutes} minutes"),
            Self::Tonight => f.write_str("tonight"),
            Self::Asap => f.write_str("asap"),
            Self::Before { hour, minute } => write!(f, "before {hour:02}:{minute:02}"),
        }
    }
}

/// Time pressure of an optional constraint (0 when unset).
pub fn time_pressure(time: Option<&TimeConstraint>) -> f64 {
    time.map_or(0.0, TimeConstraint::pressure)
}

/// Named slot keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKey {
    Intent,
    City,
    Area,
    Budget,
    TimeConstraint,
    PartySize,
    Preferences,
    ExecutionPermission,
}

impl SlotKey {
    pub const ALL: [SlotKey; 8] = [
        Self::Intent,
        Self::City,
        Self::Area,
        Self::Budget,
        Self::TimeConstraint,
        Self::PartySize,
        Self::Preferences,
        Self::ExecutionPermission,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intent => "intent",
            Self::City => "city",
            Self::Area => "area",
            Self::Budget => "budget",
            Self::TimeConstraint => "time_constraint",
            Self::PartySize => "party_size",
            Self::Preferences => "preferences",
            Self::ExecutionPermission => "execution_permission",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == s)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized slot record, one per conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    #[serde(default)]
    pub intent: Intent,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub budget: Option<Budget>,
    #[serde(default)]
    pub time_constraint: Option<TimeConstraint>,
    #[serde(default)]
    pub party_size: Option<u32>,
    #[serde(default)]
    pub preferences: BTreeSet<String>,
    #[serde(default)]
    pub execution_permission: bool,
}

impl SlotRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a slot currently holds a value.
    ///
    /// `execution_permission` only counts as a value when granted.
    pub fn has_value(&self, key: SlotKey) -> bool {
        match key {
            SlotKey::Intent => self.intent.is_known(),
            SlotKey::City => self.city.is_some(),
            SlotKey::Area => self.area.is_some(),
            SlotKey::Budget => self.budget.is_some(),
            SlotKey::TimeConstraint => self.time_constraint.is_some(),
            SlotKey::PartySize => self.party_size.is_some(),
            SlotKey::Preferences => !self.preferences.is_empty(),
            SlotKey::ExecutionPermission => self.execution_permission,
        }
    }

    pub fn has_preference(&self, tag: &str) -> bool {
        self.preferences.contains(tag)
    }

    /// Add a preference tag. Returns true when the tag was new.
    pub fn add_preference(&mut self, tag: &str) -> bool {
        match normalize_preference_tag(tag) {
            Some(tag) => self.preferences.insert(tag),
            None => false,
        }
    }

    pub fn party_size_or_default(&self) -> u32 {
        self.party_size.unwrap_or(2)
    }

    /// Whether `other` holds the same value for `key`.
    pub fn same_value(&self, other: &Self, key: SlotKey) -> bool {
        match key {
            SlotKey::Intent => self.intent == other.intent,
            SlotKey::City => self.city == other.city,
            SlotKey::Area => self.area == other.area,
            SlotKey::Budget => self.budget == other.budget,
            SlotKey::TimeConstraint => self.time_constraint == other.time_constraint,
            SlotKey::PartySize => self.party_size == other.party_size,
            SlotKey::Preferences => self.preferences == other.preferences,
            SlotKey::ExecutionPermission => self.execution_permission == other.execution_permission,
        }
    }
}

/// Trim a text slot and map sentinel values to `None`.
pub fn normalize_slot_text(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if SENTINEL_VALUES.contains(&trimmed.to_lowercase().as_str()) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Canonical form of a preference tag: trimmed, lower-cased, spaces and
/// hyphens folded into underscores.
pub fn normalize_preference_tag(tag: &str) -> Option<String> {
    let lowered = tag.trim().to_lowercase();
    if SENTINEL_VALUES.contains(&lowered.as_str()) {
        return None;
    }
    let folded: String = lowered
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();
    Some(folded)
}

/// Normalize a slot record in place. Idempotent.
pub fn normalize_slots_in_place(slots: &mut SlotRecord) {
    slots.city = normalize_slot_text(slots.city.take());
    slots.area = normalize_slot_text(slots.area.take());
    if slots.party_size == Some(0) {
        slots.party_size = None;
    }
    if slots.budget == Some(Budget::Amount(0)) {
        slots.budget = None;
    }
    slots.preferences = std::mem::take(&mut slots.preferences)
        .iter()
        .filter_map(|tag| normalize_preference_tag(tag))
        .collect();
}

/// Per-slot flags marking values supplied explicitly by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEvidence {
    #[serde(default)]
    pub intent: bool,
    #[serde(default)]
    pub city: bool,
    #[serde(default)]
    pub area: bool,
    #[serde(default)]
    pub budget: bool,
    #[serde(default)]
    pub time_constraint: bool,
    #[serde(default)]
    pub party_size: bool,
    #[serde(default)]
    pub preferences: bool,
    #[serde(default)]
    pub execution_permission: bool,
}

impl SlotEvidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: SlotKey) -> bool {
        match key {
            SlotKey::Intent => self.intent,
            SlotKey::City => self.city,
            SlotKey::Area => self.area,
            SlotKey::Budget => self.budget,
            SlotKey::TimeConstraint => self.time_constraint,
            SlotKey::PartySize => self.party_size,
            SlotKey::Preferences => self.preferences,
            SlotKey::ExecutionPermission => self.execution_permission,
        }
    }

    pub fn set(&mut self, key: SlotKey, explicit: bool) {
        let flag = match key {
            SlotKey::Intent => &mut self.intent,
            SlotKey::City => &mut self.city,
            SlotKey::Area => &mut self.area,
            SlotKey::Budget => &mut self.budget,
            SlotKey::TimeConstraint => &mut self.time_constraint,
            SlotKey::PartySize => &mut self.party_size,
            SlotKey::Preferences => &mut self.preferences,
            SlotKey::ExecutionPermission => &mut self.execution_permission,
        };
        *flag = explicit;
    }

    pub fn mark(&mut self, key: SlotKey) {
        self.set(key, true);
    }

    /// Fold this turn's explicit flags into the running record.
    pub fn absorb(&mut self, turn: &SlotEvidence) {
        for key in SlotKey::ALL {
            if turn.get(key) {
                self.mark(key);
            }
        }
    }

    /// Merge one turn into the running record.
    ///
    /// Keys stated this turn become explicit. Keys whose value changed without
    /// being stated lose their evidence. Everything else is kept.
    pub fn merge_turn(&mut self, before: &SlotRecord, after: &SlotRecord, turn: &SlotEvidence) {
        for key in SlotKey::ALL {
            if turn.get(key) {
                self.mark(key);
            } else if !before.same_value(after, key) {
                self.set(key, false);
            }
        }
    }

    pub fn explicit_keys(&self) -> Vec<SlotKey> {
        SlotKey::ALL.into_iter().filter(|key| self.get(*key)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.explicit_keys().is_empty()
    }
}

/// Phrase that the slot extractor maps back onto `tag`.
pub fn preference_phrase(tag: &str) -> Option<&'static str> {
    match tag {
        "vegetarian" => Some("vegetarian"),
        "vegan" => Some("vegan"),
        "halal" => Some("halal"),
        "no_spicy" => Some("not spicy"),
        "accessible" => Some("wheelchair accessible"),
        "kid_friendly" => Some("with kids"),
        "no_queue" => Some("no queue"),
        "walk_first" => Some("walking distance"),
        "metro_first" => Some("by metro"),
        "quiet" => Some("quiet"),
        "relaxed_pace" => Some("relaxed pace"),
        "fast_pace" => Some("in a rush"),
        "queue_flexible_after_fail" => Some("queue flexible"),
        _ => None,
    }
}

/// Render a slot record as a plain-language request the extractor can read back.
pub fn summarize_slots(slots: &SlotRecord) -> String {
    let mut parts: Vec<String> = Vec::new();
    let activity = match slots.intent {
        Intent::Eat => Some("I want to eat at a restaurant"),
        Intent::Travel => Some("I need a taxi ride"),
        Intent::Hotel => Some("I need a hotel stay"),
        Intent::ComboEatTravel => Some("I want to eat at a restaurant and take a taxi there"),
        Intent::ComboHotelTravel => Some("I need a hotel stay and a taxi ride"),
        Intent::Unknown => None,
    };
    if let Some(activity) = activity {
        parts.push(activity.to_string());
    }
    match (&slots.city, &slots.area) {
        (Some(city), Some(area)) => parts.push(format!("in {city} {area}")),
        (Some(city), None) => parts.push(format!("in {city}")),
        (None, Some(area)) => parts.push(format!("in {area}")),
        (None, None) => {}
    }
    if let Some(budget) = slots.budget {
        match budget {
            Budget::Tier(tier) => parts.push(format!("{} budget", tier.as_str())),
            Budget::Amount(amount) => parts.push(format!("budget {amount} yuan")),
        }
    }
    if let Some(party) = slots.party_size {
        parts.push(format!("for {party} people"));
    }
    if let Some(time) = slots.time_constraint {
        parts.push(time.to_string());
    }
    for tag in &slots.preferences {
        if let Some(phrase) = preference_phrase(tag) {
            parts.push(phrase.to_string());
        }
    }
    let mut summary = parts.join(", ");
    if slots.execution_permission {
        summary.push_str(". Go ahead and book it");
    }
    summary
}
