//! Tile catalog entries.

use serde::{Deserialize, Serialize};

/// Rarity tier, used for display and shop ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Rarity {
    /// Everyday tiles.
    #[default]
    Common,
    /// Slightly less frequent.
    Uncommon,
    /// Rare pickups and stronger enemies.
    Rare,
    /// Epic finds.
    Epic,
    /// Bosses and the like.
    Legendary,
}

/// Every kind of tile a grid cell can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TileKind {
    /// Open floor.
    Empty,
    /// The player's dragon.
    Player,
    /// Small coin pile.
    TreasureSmall,
    /// Medium coin pile.
    TreasureMedium,
    /// Large treasure chest.
    TreasureLarge,
    /// Weak melee enemy.
    EnemyWeak,
    /// Medium melee enemy.
    EnemyMedium,
    /// Strong melee enemy.
    EnemyStrong,
    /// Ranged enemy.
    EnemyArcher,
    /// Ranged caster.
    EnemyMage,
    /// A trap the player can see.
    TrapVisible,
    /// A trap that looks like floor until stepped on.
    TrapHidden,
    /// Small potion.
    HealSmall,
    /// Large potion.
    HealLarge,
    /// Boss enemy.
    Boss,
    /// Quest scroll.
    Quest,
    /// Teleports the player to a random empty cell.
    Portal,
    /// Armor pickup.
    Armor,
    /// Weapon pickup.
    Weapon,
    /// Impassable wall.
    Wall,
    /// Enemy spawner.
    Spawner,
}

impl TileKind {
    /// All kinds in declaration order.
    pub const ALL: [TileKind; 21] = [
        TileKind::Empty,
        TileKind::Player,
        TileKind::TreasureSmall,
        TileKind::TreasureMedium,
        TileKind::TreasureLarge,
        TileKind::EnemyWeak,
        TileKind::EnemyMedium,
        TileKind::EnemyStrong,
        TileKind::EnemyArcher,
        TileKind::EnemyMage,
        TileKind::TrapVisible,
        TileKind::TrapHidden,
        TileKind::HealSmall,
        TileKind::HealLarge,
        TileKind::Boss,
        TileKind::Quest,
        TileKind::Portal,
        TileKind::Armor,
        TileKind::Weapon,
        TileKind::Wall,
        TileKind::Spawner,
    ];

    /// The five regular enemy kinds, weakest first.
    pub const ENEMIES: [TileKind; 5] = [
        TileKind::EnemyWeak,
        TileKind::EnemyMedium,
        TileKind::EnemyStrong,
        TileKind::EnemyArcher,
        TileKind::EnemyMage,
    ];

    /// Kinds a spawner can produce.
    pub const SPAWNABLE: [TileKind; 3] = [
        TileKind::EnemyWeak,
        TileKind::EnemyMedium,
        TileKind::EnemyArcher,
    ];

    /// Whether this is one of the regular enemy kinds (bosses excluded).
    #[must_use]
    pub fn is_enemy(self) -> bool {
        Self::ENEMIES.contains(&self)
    }

    /// Whether this is a treasure pickup.
    #[must_use]
    pub const fn is_treasure(self) -> bool {
        matches!(
            self,
            TileKind::TreasureSmall | TileKind::TreasureMedium | TileKind::TreasureLarge
        )
    }

    /// Single-character glyph used by ASCII layouts.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            TileKind::Empty => '.',
            TileKind::Player => '@',
            TileKind::TreasureSmall => 't',
            TileKind::TreasureMedium => 'T',
            TileKind::TreasureLarge => '$',
            TileKind::EnemyWeak => 'w',
            TileKind::EnemyMedium => 'm',
            TileKind::EnemyStrong => 's',
            TileKind::EnemyArcher => 'a',
            TileKind::EnemyMage => 'g',
            TileKind::TrapVisible => '^',
            TileKind::TrapHidden => '~',
            TileKind::HealSmall => 'h',
            TileKind::HealLarge => 'H',
            TileKind::Boss => 'B',
            TileKind::Quest => '?',
            TileKind::Portal => 'O',
            TileKind::Armor => '[',
            TileKind::Weapon => '/',
            TileKind::Wall => '#',
            TileKind::Spawner => 'S',
        }
    }

    /// Inverse of [`glyph`](Self::glyph).
    #[must_use]
    pub fn from_glyph(glyph: char) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.glyph() == glyph)
    }
}

/// An immutable catalog entry. Grid cells hold copies of these.
///
/// The numeric effect fields are optional and their meaning depends on
/// [`kind`](Self::kind): `damage` is what an enemy or trap deals to the
/// player, `points` is score, `range` marks ranged attackers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileType {
    /// What this tile is.
    pub kind: TileKind,
    /// Display name.
    pub name: String,
    /// Display icon.
    pub icon: String,
    /// Rarity tier.
    #[serde(default)]
    pub rarity: Rarity,
    /// Damage dealt to the player.
    #[serde(default)]
    pub damage: Option<u32>,
    /// Health restored.
    #[serde(default)]
    pub heal: Option<u32>,
    /// Score granted.
    #[serde(default)]
    pub points: Option<u32>,
    /// Armor granted.
    #[serde(default)]
    pub armor: Option<u32>,
    /// Attack granted.
    #[serde(default)]
    pub attack: Option<u32>,
    /// Ranged attack reach in cells.
    #[serde(default)]
    pub range: Option<u32>,
}

impl TileType {
    /// A tile with display data only and no effect fields.
    #[must_use]
    pub fn bare(kind: TileKind, name: &str, icon: &str, rarity: Rarity) -> Self {
        Self {
            kind,
            name: name.to_string(),
            icon: icon.to_string(),
            rarity,
            damage: None,
            heal: None,
            points: None,
            armor: None,
            attack: None,
            range: None,
        }
    }

    /// Placeholder used when a catalog lacks an entry for `kind`.
    #[must_use]
    pub fn placeholder(kind: TileKind) -> Self {
        Self::bare(kind, &format!("{kind:?}"), &kind.glyph().to_string(), Rarity::Common)
    }

    fn with_damage(mut self, damage: u32) -> Self {
        self.damage = Some(damage);
        self
    }

    fn with_heal(mut self, heal: u32) -> Self {
        self.heal = Some(heal);
        self
    }

    fn with_points(mut self, points: u32) -> Self {
        self.points = Some(points);
        self
    }

    fn with_armor(mut self, armor: u32) -> Self {
        self.armor = Some(armor);
        self
    }

    fn with_attack(mut self, attack: u32) -> Self {
        self.attack = Some(attack);
        self
    }

    fn with_range(mut self, range: u32) -> Self {
        self.range = Some(range);
        self
    }
}

/// The built-in tile table.
#[must_use]
pub fn standard_tiles() -> Vec<TileType> {
    use Rarity::{Common, Epic, Legendary, Rare, Uncommon};

    vec![
        TileType::bare(TileKind::Empty, "Пусто", "", Common),
        TileType::bare(TileKind::Player, "Дракон", "🐉", Common),
        TileType::bare(TileKind::TreasureSmall, "Монеты", "🪙", Common).with_points(25),
        TileType::bare(TileKind::TreasureMedium, "Сокровище", "💰", Uncommon).with_points(50),
        TileType::bare(TileKind::TreasureLarge, "Сундук", "💎", Rare).with_points(100),
        TileType::bare(TileKind::EnemyWeak, "Гоблин", "👺", Common).with_damage(5),
        TileType::bare(TileKind::EnemyMedium, "Орк", "👹", Uncommon).with_damage(8),
        TileType::bare(TileKind::EnemyStrong, "Тролль", "🧌", Rare).with_damage(15),
        TileType::bare(TileKind::EnemyArcher, "Лучник", "🏹", Uncommon)
            .with_damage(6)
            .with_range(3),
        TileType::bare(TileKind::EnemyMage, "Маг", "🧙", Rare)
            .with_damage(10)
            .with_range(2),
        TileType::bare(TileKind::TrapVisible, "Ловушка", "⚠️", Common).with_damage(10),
        TileType::bare(TileKind::TrapHidden, "Скрытая ловушка", "", Uncommon).with_damage(15),
        TileType::bare(TileKind::HealSmall, "Зелье", "🧪", Common).with_heal(20),
        TileType::bare(TileKind::HealLarge, "Эликсир", "❤️", Uncommon).with_heal(50),
        TileType::bare(TileKind::Boss, "Босс", "🐲", Legendary)
            .with_damage(30)
            .with_points(500),
        TileType::bare(TileKind::Quest, "Квест", "📜", Epic).with_points(150),
        TileType::bare(TileKind::Portal, "Портал", "🌀", Rare),
        TileType::bare(TileKind::Armor, "Броня", "🛡️", Uncommon).with_armor(3),
        TileType::bare(TileKind::Weapon, "Оружие", "⚔️", Uncommon).with_attack(5),
        TileType::bare(TileKind::Wall, "Стена", "🧱", Common),
        TileType::bare(TileKind::Spawner, "Логово", "🕳️", Epic),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_round_trip_is_unique() {
        for kind in TileKind::ALL {
            assert_eq!(TileKind::from_glyph(kind.glyph()), Some(kind));
        }
        assert_eq!(TileKind::from_glyph('x'), None);
    }

    #[test]
    fn test_standard_tiles_cover_every_kind() {
        let tiles = standard_tiles();
        for kind in TileKind::ALL {
            assert_eq!(tiles.iter().filter(|t| t.kind == kind).count(), 1, "{kind:?}");
        }
    }

    #[test]
    fn test_ranged_enemies() {
        let tiles = standard_tiles();
        let ranged: Vec<_> = tiles
            .iter()
            .filter(|t| t.range.is_some())
            .map(|t| t.kind)
            .collect();
        assert_eq!(ranged, vec![TileKind::EnemyArcher, TileKind::EnemyMage]);
    }

    #[test]
    fn test_enemy_classification() {
        assert!(TileKind::EnemyMage.is_enemy());
        assert!(!TileKind::Boss.is_enemy());
        assert!(TileKind::TreasureLarge.is_treasure());
        assert!(!TileKind::Quest.is_treasure());
    }
}
