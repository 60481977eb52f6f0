//! Grid geometry and the value types that cross the wire.
//!
//! Animals serialize as `{x, y, emoji, bgColor}` and obstacles as
//! `{x, y, emoji}`, the shape the browser renderer draws from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Side length of the square world.
pub const GRID_SIZE: i32 = 50;
/// Side length of the agent's square viewport.
pub const VIEW_SIZE: i32 = 10;
/// Offset from the player to the viewport's leading edge.
pub const VIEW_RADIUS: i32 = 5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Grid centre, where the player spawns.
    pub const fn center() -> Self {
        Self::new(GRID_SIZE / 2, GRID_SIZE / 2)
    }

    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn in_bounds(self) -> bool {
        (0..GRID_SIZE).contains(&self.x) && (0..GRID_SIZE).contains(&self.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal direction. Parsed case-insensitively, serialized upper-case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Order tried when no direction is given.
    pub const ALL: [Direction; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Screen-space delta: y grows downward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            "LEFT" => Ok(Self::Left),
            "RIGHT" => Ok(Self::Right),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

impl TryFrom<String> for Direction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Animal species, carried on the wire as its emoji.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum Species {
    Tiger,
    Elephant,
    Giraffe,
    Monkey,
    Zebra,
    Lion,
    Pig,
    Koala,
}

impl Species {
    pub const ALL: [Species; 8] = [
        Self::Tiger,
        Self::Elephant,
        Self::Giraffe,
        Self::Monkey,
        Self::Zebra,
        Self::Lion,
        Self::Pig,
        Self::Koala,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Tiger => "🐯",
            Self::Elephant => "🐘",
            Self::Giraffe => "🦒",
            Self::Monkey => "🐒",
            Self::Zebra => "🦓",
            Self::Lion => "🦁",
            Self::Pig => "🐷",
            Self::Koala => "🐨",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Tiger => "tiger",
            Self::Elephant => "elephant",
            Self::Giraffe => "giraffe",
            Self::Monkey => "monkey",
            Self::Zebra => "zebra",
            Self::Lion => "lion",
            Self::Pig => "pig",
            Self::Koala => "koala",
        }
    }
}

impl From<Species> for &'static str {
    fn from(value: Species) -> Self {
        value.emoji()
    }
}

impl TryFrom<String> for Species {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|s| s.emoji() == value || s.name() == value)
            .ok_or_else(|| format!("unknown species: {value}"))
    }
}

/// Background colour tag, carried on the wire as its hex code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum ColorTag {
    Red,
    Green,
    Blue,
    Yellow,
    Pink,
    Sky,
    Orange,
    Purple,
}

impl ColorTag {
    pub const ALL: [ColorTag; 8] = [
        Self::Red,
        Self::Green,
        Self::Blue,
        Self::Yellow,
        Self::Pink,
        Self::Sky,
        Self::Orange,
        Self::Purple,
    ];

    pub fn hex(self) -> &'static str {
        match self {
            Self::Red => "#FF0000",
            Self::Green => "#00FF00",
            Self::Blue => "#0000FF",
            Self::Yellow => "#FFFF00",
            Self::Pink => "#FF00FF",
            Self::Sky => "#00FFFF",
            Self::Orange => "#FFA500",
            Self::Purple => "#800080",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Yellow => "yellow",
            Self::Pink => "pink",
            Self::Sky => "sky-blue",
            Self::Orange => "orange",
            Self::Purple => "purple",
        }
    }
}

impl From<ColorTag> for &'static str {
    fn from(value: ColorTag) -> Self {
        value.hex()
    }
}

impl TryFrom<String> for ColorTag {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|c| c.hex().eq_ignore_ascii_case(&value))
            .ok_or_else(|| format!("unknown color tag: {value}"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Animal {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "emoji")]
    pub species: Species,
    #[serde(rename = "bgColor")]
    pub color: ColorTag,
}

impl Animal {
    pub fn at(pos: Position, species: Species, color: ColorTag) -> Self {
        Self {
            x: pos.x,
            y: pos.y,
            species,
            color,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn descriptor(&self) -> AnimalDescriptor {
        AnimalDescriptor {
            emoji: self.species,
            bg_color: self.color,
        }
    }

    /// Plain-language label, e.g. "red tiger".
    pub fn describe(&self) -> String {
        format!("{} {}", self.color.name(), self.species.name())
    }
}

/// What the capture reports about a removed animal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimalDescriptor {
    pub emoji: Species,
    pub bg_color: ColorTag,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObstacleKind {
    #[default]
    #[serde(rename = "🌲")]
    Tree,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Obstacle {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "emoji", default)]
    pub kind: ObstacleKind,
}

impl Obstacle {
    pub fn tree(pos: Position) -> Self {
        Self {
            x: pos.x,
            y: pos.y,
            kind: ObstacleKind::Tree,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Result of a multi-cell move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    pub moved: bool,
    pub actual_steps: u32,
    pub blocked: bool,
    pub pos: Position,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchFailure {
    OutOfBounds,
    NoAnimal,
}

impl CatchFailure {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OutOfBounds => "out_of_bounds",
            Self::NoAnimal => "no_animal",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animal: Option<AnimalDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<CatchFailure>,
}

impl CatchOutcome {
    pub fn caught(animal: &Animal) -> Self {
        Self {
            success: true,
            animal: Some(animal.descriptor()),
            position: Some(animal.position()),
            reason: None,
        }
    }

    pub fn failed(reason: CatchFailure) -> Self {
        Self {
            success: false,
            animal: None,
            position: None,
            reason: Some(reason),
        }
    }
}

/// Full world snapshot sent to observers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub player: Position,
    pub animals: Vec<Animal>,
    pub obstacles: Vec<Obstacle>,
}
