//! Builds a two-lane plan from the current slot record.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::candidate::Candidate;
use crate::domain::models::plan::{OptionKey, Plan, PlanOption};
use crate::domain::models::run::{StepKey, step_skeleton};
use crate::domain::models::slots::SlotRecord;
use crate::domain::ports::CatalogSource;
use crate::services::tool_pipeline::{ConstraintCheck, check_constraints, search_candidates};

/// Seed string for every seeded draw in a conversation's current state.
pub fn slot_seed(conversation_id: &str, slots: &SlotRecord) -> String {
    let prefs: Vec<&str> = slots.preferences.iter().map(String::as_str).collect();
    format!(
        "{conversation_id}|{}|{}|{}|{}|{}|{}|{}",
        slots.intent,
        slots.city.as_deref().unwrap_or("-"),
        slots.area.as_deref().unwrap_or("-"),
        slots.budget.map_or_else(|| "-".to_string(), |b| b.to_string()),
        slots.party_size.map_or_else(|| "-".to_string(), |p| p.to_string()),
        slots
            .time_constraint
            .map_or_else(|| "-".to_string(), |t| t.to_string()),
        prefs.join(","),
    )
}

/// Inputs to one planning pass.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub conversation_id: &'a str,
    pub slots: &'a SlotRecord,
}

/// Build the plan for `request`.
///
/// Main is the first candidate passing its constraints (else the best
/// candidate). Backup is the next passing candidate, else the next distinct
/// one, else a copy of main in the backup lane.
pub fn build_plan_from_slots(catalog: &dyn CatalogSource, request: PlanRequest<'_>) -> DomainResult<Plan> {
    let slots = request.slots;
    let seed = slot_seed(request.conversation_id, slots);
    let catalog_set = catalog.catalog_for(slots.city.as_deref());
    let candidates = search_candidates(&catalog_set, slots, &seed);

    let checks: Vec<ConstraintCheck> = candidates
        .iter()
        .map(|candidate| check_constraints(candidate, slots))
        .collect();

    let main_index = checks
        .iter()
        .position(ConstraintCheck::passed)
        .or((!candidates.is_empty()).then_some(0))
        .ok_or(DomainError::NoPlan)?;

    let backup_index = (0..checks.len())
        .find(|&index| index != main_index && checks[index].passed())
        .or_else(|| (0..candidates.len()).find(|&index| index != main_index));

    let main = candidate_to_plan_option(&candidates[main_index], OptionKey::Main, slots, &checks[main_index]);
    let backup = backup_index.map_or_else(
        || main.rekeyed(OptionKey::Backup),
        |index| candidate_to_plan_option(&candidates[index], OptionKey::Backup, slots, &checks[index]),
    );

    Ok(Plan {
        intent: slots.intent,
        city: slots.city.clone().unwrap_or_default(),
        main,
        backup,
        candidates_considered: candidates.len(),
    })
}

/// Assemble a plan option with up to three ranked reasons.
pub fn candidate_to_plan_option(
    candidate: &Candidate,
    key: OptionKey,
    slots: &SlotRecord,
    check: &ConstraintCheck,
) -> PlanOption {
    let mut reasons = Vec::with_capacity(3);

    reasons.push(match check.cap {
        Some(cap) if candidate.amount <= cap => {
            format!("Fits your budget: ¥{} of ¥{cap}", candidate.amount)
        }
        Some(cap) => format!("Slightly over budget: ¥{} vs ¥{cap}", candidate.amount),
        None => format!("Estimated total ¥{}", candidate.amount),
    });

    if slots.has_preference("no_queue") {
        let limit = check.queue_limit.round() as u32;
        if f64::from(candidate.queue_min) <= check.queue_limit {
            reasons.push(format!(
                "Queue about {} min, within your {limit} min limit",
                candidate.queue_min
            ));
        } else {
            reasons.push(format!(
                "Queue about {} min, above your {limit} min limit",
                candidate.queue_min
            ));
        }
    } else {
        reasons.push(format!("Best overall score {:.1}", candidate.score));
    }

    reasons.push(format!(
        "Rated {:.1}, {} min away",
        candidate.rating, candidate.distance_min
    ));

    let skeleton = step_skeleton(candidate.intent);
    let requires_payment = skeleton.contains(&StepKey::Pay);

    PlanOption {
        key,
        intent: candidate.intent,
        title: candidate.title.clone(),
        place: candidate.place.clone(),
        eta_min: candidate.eta_min,
        amount: candidate.amount,
        risk: format!(
            "{} risk: queue about {} min, {:.0}% availability",
            candidate.risk,
            candidate.queue_min,
            candidate.availability * 100.0
        ),
        reason: reasons[0].clone(),
        reasons,
        requires_payment,
        requires_permission: !slots.execution_permission,
        requires_confirmation: requires_payment || candidate.amount > PlanOption::CONFIRMATION_AMOUNT,
        candidate_id: candidate.id.clone(),
    }
}
