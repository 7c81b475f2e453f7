//! Heuristic, pattern-based slot extraction.
//!
//! Each turn is matched against bilingual keyword and number patterns. Values
//! found in the text overwrite the prior record and are marked as explicit;
//! everything else carries over from the prior record untouched.

use regex::Regex;
use tracing::debug;

use crate::domain::errors::DomainResult;
use crate::domain::models::slots::{
    Budget, BudgetTier, Intent, SlotEvidence, SlotKey, SlotRecord, TimeConstraint,
    normalize_slots_in_place,
};
use crate::infrastructure::catalog::gazetteer;

/// Result of reading one utterance against a prior record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Prior record updated with everything found in the text.
    pub slots: SlotRecord,
    /// Keys stated explicitly in this turn.
    pub evidence: SlotEvidence,
}

struct PreferenceRule {
    tag: &'static str,
    pattern: Regex,
}

/// Compiled extraction patterns.
pub struct SlotExtractor {
    food: Regex,
    transport: Regex,
    lodging: Regex,
    amount_prefix: Regex,
    amount_suffix: Regex,
    amount_budget: Regex,
    budget_low: Regex,
    budget_mid: Regex,
    budget_high: Regex,
    party_count: Regex,
    party_count_cn: Regex,
    party_numeral_cn: Regex,
    party_for: Regex,
    party_solo: Regex,
    party_couple: Regex,
    party_family: Regex,
    within_minutes: Regex,
    within_hours: Regex,
    half_hour: Regex,
    before_clock: Regex,
    before_clock_cn: Regex,
    tonight: Regex,
    asap: Regex,
    deny_booking: Regex,
    grant_booking: Regex,
    preferences: Vec<PreferenceRule>,
}

const PREFERENCE_PATTERNS: &[(&str, &str)] = &[
    ("vegetarian", r"(?i)\bvegetarian\b|素食|吃素"),
    ("vegan", r"(?i)\bvegan\b|纯素"),
    ("halal", r"(?i)\bhalal\b|清真"),
    ("no_spicy", r"(?i)\bnot spicy\b|\bno spicy\b|\bnon-spicy\b|\bmild\b|不辣|不要辣|不吃辣"),
    ("accessible", r"(?i)\bwheelchair\b|\baccessible\b|无障碍|轮椅"),
    ("kid_friendly", r"(?i)\bkids?\b|\bchildren\b|\bkid-friendly\b|带娃|亲子|小孩"),
    ("no_queue", r"(?i)\bno queue\b|\bno queuing\b|\bno waiting\b|\bwithout waiting\b|\bdon'?t want to wait\b|不排队|不想排队|免排队"),
    ("walk_first", r"(?i)\bwalk(?:ing)?\b|步行|走路"),
    ("metro_first", r"(?i)\bmetro\b|\bsubway\b|\bpublic transit\b|地铁"),
    ("quiet", r"(?i)\bquiet\b|安静"),
    ("relaxed_pace", r"(?i)\brelaxed\b|\bno (?:rush|hurry)\b|\bleisurely\b|悠闲|慢慢来"),
    ("fast_pace", r"(?i)\bin a (?:rush|hurry)\b|\bquick(?:ly)?\b|赶时间|快一点"),
    ("queue_flexible_after_fail", r"(?i)\bqueue flexible\b|\bcan wait a bit\b|可以等"),
];

impl SlotExtractor {
    pub fn new() -> DomainResult<Self> {
        let preferences = PREFERENCE_PATTERNS
            .iter()
            .map(|&(tag, pattern)| {
                Ok(PreferenceRule {
                    tag,
                    pattern: Regex::new(pattern)?,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(Self {
            food: Regex::new(
                r"(?i)\b(?:eat|eating|food|restaurants?|dinner|lunch|breakfast|brunch|meal|hotpot|dine|dining|cafe)\b|吃|餐厅|美食|饭|订位|火锅|餐",
            )?,
            transport: Regex::new(
                r"(?i)\b(?:taxi|cab|ride|airport|flight|train|route|transfer|drive|pick ?up)\b|\b(?:go|get) to\b|打车|机场|出行|路线|高铁|接送|叫车|火车",
            )?,
            lodging: Regex::new(
                r"(?i)\b(?:hotels?|stay|room|hostel|inn|accommodation|check[- ]in)\b|酒店|民宿|入住|宾馆|住宿",
            )?,
            amount_prefix: Regex::new(r"(?i)(?:[¥￥$]|\b(?:rmb|cny|usd))\s*(\d{1,6})")?,
            amount_suffix: Regex::new(r"(?i)(\d{1,6})\s*(?:元|块|(?:yuan|rmb|cny|usd|dollars?|bucks)\b)")?,
            amount_budget: Regex::new(
                r"(?i)(?:\bbudget\b(?:\s+(?:of|is|around|about))?|预算)\s*[:：]?\s*(\d{1,6})",
            )?,
            budget_low: Regex::new(
                r"(?i)\b(?:cheap|cheaper|affordable|inexpensive|budget[- ]friendly|low budget)\b|便宜|实惠|省钱",
            )?,
            budget_mid: Regex::new(r"(?i)\b(?:mid|mid-range|medium|moderate|mid budget)\b|中等|适中")?,
            budget_high: Regex::new(
                r"(?i)\b(?:premium|luxury|upscale|fancy|high-end|high budget)\b|高档|豪华|高端",
            )?,
            party_count: Regex::new(r"(?i)\b(\d{1,2})\s*(?:people|persons?|pax|guests?|adults|ppl)\b")?,
            party_count_cn: Regex::new(r"(\d{1,2})\s*(?:个人|人|位)")?,
            party_numeral_cn: Regex::new(r"([一二两三四五六七八九十])\s*(?:个人|人|位)")?,
            party_for: Regex::new(r"(?i)\bfor\s+(\d{1,2})\b\s*([a-z]*)")?,
            party_solo: Regex::new(r"(?i)\b(?:solo|alone|just me|by myself)\b|自己一个")?,
            party_couple: Regex::new(r"(?i)\b(?:couple|two of us|my partner|my wife|my husband)\b|情侣|我们俩")?,
            party_family: Regex::new(r"(?i)\bfamily\b|家人|全家|一家")?,
            within_minutes: Regex::new(r"(?i)(\d{1,3})\s*(?:minutes?|mins?\b|分钟)")?,
            within_hours: Regex::new(r"(?i)(\d{1,2})\s*(?:hours?\b|hrs?\b|个?小时)")?,
            half_hour: Regex::new(r"(?i)\bhalf an hour\b|半小时|半个小时")?,
            before_clock: Regex::new(r"(?i)\b(?:before|by)\s+(\d{1,2})(?:[:：](\d{2}))?\s*(am|pm)?\b")?,
            before_clock_cn: Regex::new(r"(\d{1,2})[:：点](\d{2})?\s*(?:之前|以前|前)")?,
            tonight: Regex::new(r"(?i)\btonight\b|\bthis evening\b|今晚|今天晚上")?,
            asap: Regex::new(r"(?i)\basap\b|\bas soon as possible\b|\bright now\b|\bimmediately\b|尽快|马上|立刻|立即")?,
            deny_booking: Regex::new(
                r"(?i)\b(?:don[’']?t|do not|dont)\s+book\b|\bnot (?:book|reserve) (?:it )?yet\b|\bjust (?:looking|browsing)\b|先别订|不要订|别订|只是看看|先看看",
            )?,
            grant_booking: Regex::new(
                r"(?i)\bbook it\b|\bgo ahead\b|\bplease book\b|\bbook (?:it )?for me\b|\breserve it\b|\bconfirm (?:the )?booking\b|帮我订|直接订|确认预订|下单",
            )?,
            preferences,
        })
    }

    /// Read `text` against `prior`. Pure: the same input always yields the same output.
    pub fn extract_slots(&self, text: &str, prior: &SlotRecord) -> Extraction {
        let mut slots = prior.clone();
        let mut evidence = SlotEvidence::new();

        if let Some(intent) = self.detect_intent(text) {
            slots.intent = intent;
            evidence.mark(SlotKey::Intent);
        }

        if let Some(place) = gazetteer::lookup(text) {
            let city_changed = slots.city.as_deref() != Some(place.city.as_str());
            slots.city = Some(place.city);
            if place.city_named {
                evidence.mark(SlotKey::City);
            }
            match place.area {
                Some(area) => {
                    slots.area = Some(area);
                    evidence.mark(SlotKey::Area);
                }
                None if city_changed => slots.area = None,
                None => {}
            }
        }

        if let Some(budget) = self.detect_budget(text) {
            slots.budget = Some(budget);
            evidence.mark(SlotKey::Budget);
        }

        if let Some(party) = self.detect_party(text) {
            slots.party_size = Some(party);
            evidence.mark(SlotKey::PartySize);
        }

        if let Some(time) = self.detect_time(text) {
            slots.time_constraint = Some(time);
            evidence.mark(SlotKey::TimeConstraint);
        }

        let mut matched_preference = false;
        for rule in &self.preferences {
            if rule.pattern.is_match(text) {
                slots.add_preference(rule.tag);
                matched_preference = true;
            }
        }
        if matched_preference {
            evidence.mark(SlotKey::Preferences);
        }

        if let Some(permission) = self.detect_permission(text) {
            slots.execution_permission = permission;
            evidence.mark(SlotKey::ExecutionPermission);
        }

        normalize_slots_in_place(&mut slots);

        debug!(
            intent = %slots.intent,
            explicit = ?evidence.explicit_keys(),
            "Extracted slots from utterance"
        );

        Extraction { slots, evidence }
    }

    fn detect_intent(&self, text: &str) -> Option<Intent> {
        let food = self.food.is_match(text);
        let transport = self.transport.is_match(text);
        let lodging = self.lodging.is_match(text);
        match (food, transport, lodging) {
            (_, true, true) => Some(Intent::ComboHotelTravel),
            (true, true, false) => Some(Intent::ComboEatTravel),
            (_, false, true) => Some(Intent::Hotel),
            (true, false, false) => Some(Intent::Eat),
            (false, true, false) => Some(Intent::Travel),
            (false, false, false) => None,
        }
    }

    fn detect_budget(&self, text: &str) -> Option<Budget> {
        let amount = [&self.amount_prefix, &self.amount_suffix, &self.amount_budget]
            .into_iter()
            .find_map(|pattern| capture_number(pattern, text, 1));
        if let Some(amount) = amount.filter(|a| *a > 0) {
            return Some(Budget::Amount(amount));
        }
        if self.budget_low.is_match(text) {
            Some(Budget::Tier(BudgetTier::Low))
        } else if self.budget_high.is_match(text) {
            Some(Budget::Tier(BudgetTier::High))
        } else if self.budget_mid.is_match(text) {
            Some(Budget::Tier(BudgetTier::Mid))
        } else {
            None
        }
    }

    fn detect_party(&self, text: &str) -> Option<u32> {
        let explicit = capture_number(&self.party_count, text, 1)
            .or_else(|| capture_number(&self.party_count_cn, text, 1))
            .or_else(|| {
                self.party_numeral_cn
                    .captures(text)
                    .and_then(|caps| chinese_numeral(&caps[1]))
            })
            .or_else(|| self.party_for_count(text));
        if let Some(count) = explicit.filter(|c| *c > 0) {
            return Some(count);
        }
        if self.party_family.is_match(text) {
            Some(3)
        } else if self.party_couple.is_match(text) {
            Some(2)
        } else if self.party_solo.is_match(text) {
            Some(1)
        } else {
            None
        }
    }

    /// "table for 4", but not "for 30 minutes" or "for 200 yuan".
    fn party_for_count(&self, text: &str) -> Option<u32> {
        self.party_for.captures_iter(text).find_map(|caps| {
            let unit = caps.get(2).map_or("", |m| m.as_str()).to_lowercase();
            let is_other_unit = ["min", "hour", "hr", "yuan", "rmb", "dollar", "buck", "usd", "cny"]
                .iter()
                .any(|prefix| unit.starts_with(prefix));
            if is_other_unit {
                None
            } else {
                caps[1].parse().ok()
            }
        })
    }

    fn detect_time(&self, text: &str) -> Option<TimeConstraint> {
        if let Some(minutes) = capture_number(&self.within_minutes, text, 1) {
            return Some(TimeConstraint::WithinMinutes { minutes });
        }
        if self.half_hour.is_match(text) {
            return Some(TimeConstraint::WithinMinutes { minutes: 30 });
        }
        if let Some(hours) = capture_number(&self.within_hours, text, 1).filter(|h| *h > 0) {
            return Some(TimeConstraint::WithinMinutes { minutes: hours * 60 });
        }
        if self.tonight.is_match(text) {
            return Some(TimeConstraint::Tonight);
        }
        if self.asap.is_match(text) {
            return Some(TimeConstraint::Asap);
        }
        self.detect_clock(text)
    }

    fn detect_clock(&self, text: &str) -> Option<TimeConstraint> {
        let (hour, minute, meridiem) = if let Some(caps) = self.before_clock.captures(text) {
            (
                caps.get(1)?.as_str().parse::<u8>().ok()?,
                caps.get(2).map_or(Some(0), |m| m.as_str().parse::<u8>().ok())?,
                caps.get(3).map(|m| m.as_str().to_lowercase()),
            )
        } else {
            let caps = self.before_clock_cn.captures(text)?;
            (
                caps.get(1)?.as_str().parse::<u8>().ok()?,
                caps.get(2).map_or(Some(0), |m| m.as_str().parse::<u8>().ok())?,
                None,
            )
        };
        let hour = match meridiem.as_deref() {
            Some("pm") if hour < 12 => hour + 12,
            Some("am") if hour == 12 => 0,
            _ => hour,
        };
        (hour < 24 && minute < 60).then_some(TimeConstraint::Before { hour, minute })
    }

    fn detect_permission(&self, text: &str) -> Option<bool> {
        if self.deny_booking.is_match(text) {
            Some(false)
        } else if self.grant_booking.is_match(text) {
            Some(true)
        } else {
            None
        }
    }
}

fn capture_number(pattern: &Regex, text: &str, group: usize) -> Option<u32> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(group))
        .and_then(|m| m.as_str().parse().ok())
}

fn chinese_numeral(numeral: &str) -> Option<u32> {
    match numeral {
        "一" => Some(1),
        "二" | "两" => Some(2),
        "三" => Some(3),
        "四" => Some(4),
        "五" => Some(5),
        "六" => Some(6),
        "七" => Some(7),
        "八" => Some(8),
        "九" => Some(9),
        "十" => Some(10),
        _ => None,
    }
}
