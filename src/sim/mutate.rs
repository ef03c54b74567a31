//! Card tuning deltas derived from balance recommendations.
//!
//! Only high-priority recommendations that name a card, or the control group,
//! become mutations. Global knobs and class baselines stay with a designer.
//! Mutations apply to an in-memory catalog; card files are never rewritten.

use serde::{Deserialize, Serialize};

use crate::engine::cards::CardCatalog;
use crate::engine::error::{SimError, SimResult};
use crate::engine::models::Card;
use crate::sim::metrics::{BalanceRecommendation, Priority, RecommendationKind, CONTROL_TARGET};

pub const MAX_ENERGY_COST: u32 = 10;
pub const MAX_CARD_DAMAGE: u32 = 20;
/// Extra energy charged to every hard-control card when control runs hot.
pub const CONTROL_ENERGY_STEP: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationField {
    Damage,
    Energy,
    Armor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOp {
    Add,
    Set,
    Multiply,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardChange {
    pub field: MutationField,
    pub operation: MutationOp,
    pub value: i32,
}

impl CardChange {
    pub fn add(field: MutationField, value: i32) -> Self {
        Self {
            field,
            operation: MutationOp::Add,
            value,
        }
    }

    fn apply_to(&self, current: i64) -> i64 {
        let value = i64::from(self.value);
        match self.operation {
            MutationOp::Add => current + value,
            MutationOp::Set => value,
            MutationOp::Multiply => current * value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMutation {
    pub card_id: String,
    pub changes: Vec<CardChange>,
    pub reason: String,
}

impl CardMutation {
    /// A copy of `card` with every change applied. Energy floors at 0; a cost
    /// above 10 or damage outside 0-20 rejects the whole mutation.
    pub fn apply(&self, card: &Card) -> SimResult<Card> {
        let reject = |reason: String| SimError::InvalidMutation {
            id: self.card_id.clone(),
            reason,
        };
        if card.id != self.card_id {
            return Err(reject(format!("applied to card '{}'", card.id)));
        }

        let mut card = card.clone();
        for change in &self.changes {
            match change.field {
                MutationField::Energy => {
                    let cost = change.apply_to(i64::from(card.cost)).max(0);
                    if cost > i64::from(MAX_ENERGY_COST) {
                        return Err(reject(format!("energy cost {cost} above {MAX_ENERGY_COST}")));
                    }
                    card.cost = cost as u32;
                }
                MutationField::Damage => {
                    let damage = change.apply_to(i64::from(card.damage.unwrap_or(0)));
                    if !(0..=i64::from(MAX_CARD_DAMAGE)).contains(&damage) {
                        return Err(reject(format!("damage {damage} outside 0-{MAX_CARD_DAMAGE}")));
                    }
                    card.damage = Some(damage as u32);
                }
                MutationField::Armor => {
                    return Err(reject("cards carry no armor rating".into()));
                }
            }
        }
        Ok(card)
    }
}

/// Turns recommendations into per-card changes against `catalog`.
///
/// Damage, energy and armor recommendations on a card id add the rounded
/// `suggested - current` gap, and a zero gap yields nothing. Control
/// recommendations add a flat energy step, to every control card when aimed
/// at the control group.
pub fn mutations_from_recommendations(
    recs: &[BalanceRecommendation],
    catalog: &CardCatalog,
) -> Vec<CardMutation> {
    let mut mutations = Vec::new();
    for rec in recs.iter().filter(|r| r.priority == Priority::High) {
        let control_step = || CardChange::add(MutationField::Energy, CONTROL_ENERGY_STEP);

        if rec.kind == RecommendationKind::Control && rec.target == CONTROL_TARGET {
            for card in catalog.iter().filter(|c| c.has_control()) {
                mutations.push(CardMutation {
                    card_id: card.id.clone(),
                    changes: vec![control_step()],
                    reason: rec.reason.clone(),
                });
            }
            continue;
        }
        if catalog.get(&rec.target).is_none() {
            tracing::debug!(recommendation = %rec.target, kind = %rec.kind, "no card to mutate");
            continue;
        }

        let gap = (rec.suggested - rec.current).round() as i32;
        let change = match rec.kind {
            RecommendationKind::Damage => CardChange::add(MutationField::Damage, gap),
            RecommendationKind::Energy => CardChange::add(MutationField::Energy, gap),
            RecommendationKind::Armor => CardChange::add(MutationField::Armor, gap),
            RecommendationKind::Control => control_step(),
            RecommendationKind::Baseline => continue,
        };
        if change.value == 0 {
            continue;
        }
        mutations.push(CardMutation {
            card_id: rec.target.clone(),
            changes: vec![change],
            reason: rec.reason.clone(),
        });
    }
    mutations
}

/// A copy of `catalog` with every mutation applied, or the first rejection.
pub fn apply_mutations(
    catalog: &CardCatalog,
    mutations: &[CardMutation],
) -> SimResult<CardCatalog> {
    let mut tuned = catalog.clone();
    for mutation in mutations {
        let card = tuned.get(&mutation.card_id).ok_or_else(|| SimError::InvalidMutation {
            id: mutation.card_id.clone(),
            reason: "card not in catalog".into(),
        })?;
        tuned.insert(mutation.apply(&card)?);
        tracing::debug!(card = %mutation.card_id, reason = %mutation.reason, "mutation applied");
    }
    Ok(tuned)
}
