//! Card catalog, player factory and card-effect resolution.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::engine::error::{SimError, SimResult};
use crate::engine::models::*;

// --- Class table ---

/// Per-class stat modifiers and class cards, applied on top of the base robot.
#[derive(Debug)]
pub struct ClassProfile {
    pub movement_bonus: u32,
    pub attack_bonus: u32,
    pub defense_bonus: u32,
    pub max_energy_bonus: u32,
    pub class_cards: &'static [&'static str],
}

static ENGINEER: ClassProfile = ClassProfile {
    movement_bonus: 0,
    attack_bonus: 0,
    defense_bonus: 1,
    max_energy_bonus: 1,
    class_cards: &["barricade", "repair_kit"],
};

static WARRIOR: ClassProfile = ClassProfile {
    movement_bonus: 0,
    attack_bonus: 1,
    defense_bonus: 0,
    max_energy_bonus: 0,
    class_cards: &["heavy_slam", "shield_bash"],
};

static MAGE: ClassProfile = ClassProfile {
    movement_bonus: 1,
    attack_bonus: 0,
    defense_bonus: 0,
    max_energy_bonus: 2,
    class_cards: &["arc_bolt", "mana_surge"],
};

static TRICKSTER: ClassProfile = ClassProfile {
    movement_bonus: 1,
    attack_bonus: 1,
    defense_bonus: 0,
    max_energy_bonus: 0,
    class_cards: &["blink", "stasis_field"],
};

pub fn class_profile(class: PlayerClass) -> &'static ClassProfile {
    match class {
        PlayerClass::Engineer => &ENGINEER,
        PlayerClass::Warrior => &WARRIOR,
        PlayerClass::Mage => &MAGE,
        PlayerClass::Trickster => &TRICKSTER,
    }
}

pub const BASE_HP: u32 = 20;
pub const BASE_ENERGY: u32 = 5;
pub const BASE_ROBOT: RobotStats = RobotStats {
    movement: 3,
    attack: 2,
    defense: 1,
    energy: 5,
};

/// Cards every class starts with, in deck order.
pub const BASE_DECK: [&str; 5] = [
    "overdrive",
    "pulse_strike",
    "pulse_strike",
    "watchtower",
    "auto_repair",
];

// --- Catalog ---

#[derive(Debug, Clone, Default)]
pub struct CardCatalog {
    cards: BTreeMap<String, Arc<Card>>,
}

static BASE_CATALOG: Lazy<CardCatalog> = Lazy::new(CardCatalog::with_base_set);

/// The process-wide built-in catalog.
pub fn base_catalog() -> &'static CardCatalog {
    &BASE_CATALOG
}

impl CardCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_set() -> Self {
        let mut catalog = Self::new();
        for card in base_cards() {
            catalog.insert(card);
        }
        catalog
    }

    pub fn insert(&mut self, card: Card) {
        self.cards.insert(card.id.clone(), Arc::new(card));
    }

    pub fn get(&self, id: &str) -> Option<Arc<Card>> {
        self.cards.get(id).cloned()
    }

    pub fn by_type(&self, card_type: CardType) -> Vec<Arc<Card>> {
        self.cards
            .values()
            .filter(|c| c.card_type == card_type)
            .cloned()
            .collect()
    }

    /// Cards in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Card>> {
        self.cards.values()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Builds a catalog from upstream card-pipeline records.
    pub fn from_records(records: Vec<CardRecord>) -> SimResult<Self> {
        let mut catalog = Self::new();
        for record in records {
            catalog.insert(Card::try_from(record)?);
        }
        Ok(catalog)
    }

    /// Loads a JSON array of card-pipeline records.
    pub fn load_json(path: &Path) -> SimResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SimError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let records: Vec<CardRecord> =
            serde_json::from_str(&content).map_err(|e| SimError::Parse {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let catalog = Self::from_records(records)?;
        tracing::info!(path = %path.display(), count = catalog.len(), "loaded card catalog");
        Ok(catalog)
    }

    /// Base deck plus class cards. Ids missing from this catalog are skipped.
    pub fn starting_deck(&self, class: PlayerClass) -> Vec<Arc<Card>> {
        BASE_DECK
            .iter()
            .chain(class_profile(class).class_cards.iter())
            .filter_map(|id| {
                let card = self.get(id);
                if card.is_none() {
                    tracing::debug!(card = id, "starting deck card not in catalog");
                }
                card
            })
            .collect()
    }

    pub fn create_player(&self, id: &str, name: &str, class: PlayerClass) -> Player {
        let profile = class_profile(class);
        let max_energy = BASE_ENERGY + profile.max_energy_bonus;
        Player {
            id: id.to_string(),
            name: name.to_string(),
            class,
            hp: BASE_HP,
            max_hp: BASE_HP,
            energy: max_energy,
            max_energy,
            hand: Vec::new(),
            deck: self.starting_deck(class),
            discard: Vec::new(),
            robot: Robot {
                stats: RobotStats {
                    movement: BASE_ROBOT.movement + profile.movement_bonus,
                    attack: BASE_ROBOT.attack + profile.attack_bonus,
                    defense: BASE_ROBOT.defense + profile.defense_bonus,
                    energy: max_energy,
                },
                upgrades: Vec::new(),
            },
            position: Position::new(0, 0),
            status: StatusEffects::default(),
        }
    }
}

fn base_cards() -> Vec<Card> {
    use EffectKind as K;
    use EffectTarget as T;

    let card = |id: &str, name: &str, card_type, cost, description: &str, rarity| Card {
        id: id.into(),
        name: name.into(),
        card_type,
        cost,
        description: description.into(),
        effects: Vec::new(),
        range: None,
        damage: None,
        duration: None,
        rarity,
    };

    vec![
        Card {
            effects: vec![CardEffect::new(K::Move, 2, T::Own, "Gain 2 additional movement")],
            ..card(
                "overdrive",
                "Overdrive",
                CardType::Action,
                2,
                "Double movement for this turn",
                Rarity::Common,
            )
        },
        Card {
            effects: vec![CardEffect::new(
                K::Damage,
                2,
                T::Enemy,
                "Deal 2 energy damage to all enemies in range",
            )],
            range: Some(3),
            damage: Some(2),
            ..card(
                "pulse_strike",
                "Pulse Strike",
                CardType::Action,
                3,
                "Energy attack that damages enemies in range",
                Rarity::Uncommon,
            )
        },
        Card {
            effects: vec![CardEffect::new(K::Build, 1, T::Terrain, "Place a watchtower structure")],
            ..card(
                "watchtower",
                "Watchtower",
                CardType::Structure,
                4,
                "Build a defensive structure that provides cover",
                Rarity::Common,
            )
        },
        Card {
            effects: vec![CardEffect::new(K::Heal, 1, T::Own, "Heal 1 HP at start of turn")],
            duration: Some(3),
            ..card(
                "auto_repair",
                "Auto-Repair",
                CardType::Program,
                2,
                "Automatically repair 1 HP at the start of each turn",
                Rarity::Uncommon,
            )
        },
        Card {
            effects: vec![CardEffect::new(K::Build, 1, T::Terrain, "Place a barricade")],
            ..card(
                "barricade",
                "Barricade",
                CardType::Structure,
                2,
                "Build a low wall that grants cover",
                Rarity::Common,
            )
        },
        Card {
            effects: vec![CardEffect::new(K::Heal, 3, T::Own, "Repair 3 HP")],
            ..card(
                "repair_kit",
                "Repair Kit",
                CardType::Action,
                2,
                "Patch up your robot",
                Rarity::Common,
            )
        },
        Card {
            range: Some(1),
            damage: Some(4),
            ..card(
                "heavy_slam",
                "Heavy Slam",
                CardType::Action,
                3,
                "Crushing melee blow",
                Rarity::Uncommon,
            )
        },
        Card {
            effects: vec![CardEffect::new(K::Control, 1, T::Enemy, "Stun target for 1 turn")],
            range: Some(1),
            damage: Some(1),
            ..card(
                "shield_bash",
                "Shield Bash",
                CardType::Action,
                2,
                "Bash and daze an adjacent enemy",
                Rarity::Rare,
            )
        },
        Card {
            range: Some(4),
            damage: Some(3),
            ..card(
                "arc_bolt",
                "Arc Bolt",
                CardType::Action,
                2,
                "Ranged lightning bolt",
                Rarity::Common,
            )
        },
        Card {
            effects: vec![CardEffect::new(K::Energy, 2, T::Own, "Gain 2 energy")],
            ..card(
                "mana_surge",
                "Mana Surge",
                CardType::Event,
                0,
                "Channel stored power",
                Rarity::Uncommon,
            )
        },
        Card {
            effects: vec![CardEffect::new(K::Move, 3, T::Own, "Teleport up to 3 tiles")],
            ..card("blink", "Blink", CardType::Action, 1, "Short-range teleport", Rarity::Common)
        },
        Card {
            effects: vec![CardEffect::new(
                K::Control,
                2,
                T::Enemy,
                "Immobilize target for 2 turns",
            )],
            range: Some(3),
            duration: Some(2),
            ..card(
                "stasis_field",
                "Stasis Field",
                CardType::Program,
                3,
                "Lock an enemy in place",
                Rarity::Rare,
            )
        },
    ]
}

// --- Upstream record schema ---

#[derive(Debug, Clone, Deserialize)]
pub struct RecordCost {
    pub energy: u32,
    #[serde(default)]
    pub exhaust: bool,
}

/// Card record as produced by the card-authoring pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub card_type: String,
    #[serde(default)]
    pub faction: Option<String>,
    pub rarity: String,
    pub cost: RecordCost,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub rules: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub stats: Option<serde_json::Value>,
    #[serde(default)]
    pub build_req: Option<serde_json::Value>,
}

impl TryFrom<CardRecord> for Card {
    type Error = SimError;

    fn try_from(record: CardRecord) -> SimResult<Card> {
        let bad = |reason: String| SimError::CardRecord {
            id: record.id.clone(),
            reason,
        };
        let card_type: CardType =
            serde_json::from_value(serde_json::Value::String(record.card_type.to_lowercase()))
                .map_err(|_| bad(format!("unknown type '{}'", record.card_type)))?;
        let rarity: Rarity =
            serde_json::from_value(serde_json::Value::String(record.rarity.to_lowercase()))
                .map_err(|_| bad(format!("unknown rarity '{}'", record.rarity)))?;

        let mut damage = None;
        let mut range = None;
        let mut duration = None;
        let mut effects = Vec::new();
        let own = |kind, v, text: String| CardEffect::new(kind, v, EffectTarget::Own, &text);
        let enemy = |v, text: String| {
            CardEffect::new(EffectKind::Control, v, EffectTarget::Enemy, &text)
        };
        for (key, value) in &record.rules {
            let Some(n) = value.as_u64() else {
                // Non-numeric rules are descriptive and carry no mechanics.
                if value.is_number() {
                    return Err(bad(format!("rule '{key}' must be a non-negative integer")));
                }
                continue;
            };
            let n32 = u32::try_from(n).map_err(|_| bad(format!("rule '{key}' out of range")))?;
            let v = n32 as i32;
            match key.as_str() {
                "damage" => damage = Some(n32),
                "range" => range = Some(n32),
                "duration" => duration = Some(n32),
                "heal" => effects.push(own(EffectKind::Heal, v, format!("Heal {n}"))),
                "move" => effects.push(own(EffectKind::Move, v, format!("Move {n}"))),
                "draw" => effects.push(own(EffectKind::Draw, v, format!("Draw {n}"))),
                "energy" => effects.push(own(EffectKind::Energy, v, format!("Gain {n} energy"))),
                "build" => effects.push(CardEffect::new(
                    EffectKind::Build,
                    v,
                    EffectTarget::Terrain,
                    "Place a structure",
                )),
                "stun" => effects.push(enemy(v, format!("Stun target for {n} turns"))),
                "immobilize" => effects.push(enemy(v, format!("Immobilize target for {n} turns"))),
                _ => {}
            }
        }

        Ok(Card {
            id: record.id,
            name: record.name,
            card_type,
            cost: record.cost.energy,
            description: record.text,
            effects,
            range,
            damage,
            duration,
            rarity,
        })
    }
}

// --- Resolution ---

/// What a card is played against.
#[derive(Debug)]
pub enum CardTarget<'a> {
    Unit(&'a mut Player),
    Tile(Position),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectResult {
    pub kind: EffectKind,
    pub success: bool,
    pub value: i32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub card_id: String,
    pub success: bool,
    pub effects: Vec<EffectResult>,
    pub message: String,
}

/// Applies a card's effects in order and deducts its cost.
///
/// Insufficient energy yields an unsuccessful resolution with no state change.
/// Unknown effect kinds succeed without touching state.
pub fn resolve_card(
    card: &Card,
    player: &mut Player,
    mut target: Option<CardTarget<'_>>,
) -> Resolution {
    if player.energy < card.cost {
        return Resolution {
            card_id: card.id.clone(),
            success: false,
            effects: Vec::new(),
            message: "Not enough energy to play this card".into(),
        };
    }

    let mut effects = Vec::with_capacity(card.effects.len());
    for effect in &card.effects {
        effects.push(apply_effect(card, effect, player, target.as_mut()));
    }

    player.energy = player.energy.saturating_sub(card.cost);

    Resolution {
        card_id: card.id.clone(),
        success: true,
        effects,
        message: format!("Played {}", card.name),
    }
}

fn apply_effect(
    card: &Card,
    effect: &CardEffect,
    player: &mut Player,
    target: Option<&mut CardTarget<'_>>,
) -> EffectResult {
    let amount = effect.value.max(0) as u32;
    let unit = match target {
        Some(CardTarget::Unit(p)) => Some(&mut **p),
        _ => None,
    };

    let message = match effect.kind {
        EffectKind::Damage => match unit {
            Some(t) => format!("Dealt {} damage", t.take_damage(amount)),
            None => "No target for damage".into(),
        },
        EffectKind::Heal => {
            let healed = match unit {
                Some(t) if effect.target == EffectTarget::Ally => t.heal(amount),
                _ => player.heal(amount),
            };
            format!("Healed {healed} HP")
        }
        EffectKind::Energy => {
            player.gain_energy(amount);
            format!("Gained {amount} energy")
        }
        EffectKind::Draw => format!("Drew {} cards", player.draw_cards(amount as usize)),
        EffectKind::Buff => {
            player.robot.stats.attack += amount;
            if card.card_type == CardType::Upgrade {
                player.robot.upgrades.push(card.id.clone());
            }
            format!("Attack +{amount}")
        }
        EffectKind::Control => match (unit, effect.control_kind()) {
            (Some(t), Some(kind)) => {
                t.apply_control(kind, amount);
                format!("Applied control for {amount} turns")
            }
            _ => "No target for control".into(),
        },
        EffectKind::Move => format!("Gained {amount} movement"),
        EffectKind::Build => "Built structure".into(),
        EffectKind::Program | EffectKind::Special | EffectKind::Unknown => {
            format!("Applied {:?} effect", effect.kind)
        }
    };

    EffectResult {
        kind: effect.kind,
        success: true,
        value: effect.value,
        message,
    }
}
