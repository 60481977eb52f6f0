//! Authoritative grid state for one session.

mod viewport;

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use safari_core::grid::{
    Animal, CatchFailure, CatchOutcome, ColorTag, Direction, GameSnapshot, MoveOutcome,
    Obstacle, Position, Species, GRID_SIZE, VIEW_SIZE,
};
use safari_settings::WorldSettings;

pub use viewport::{view_start, AgentView};

pub const EXPLORE_MISSION: &str = "Explore the map";

pub struct GridWorld {
    player: Position,
    animals: Vec<Animal>,
    obstacles: Vec<Obstacle>,
    obstacle_cells: HashSet<Position>,
    obstacle_count: usize,
    animal_count: usize,
    rng: StdRng,
}

impl GridWorld {
    /// A freshly initialized world.
    pub fn new(settings: &WorldSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    pub fn seeded(settings: &WorldSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: &WorldSettings, rng: StdRng) -> Self {
        let mut world = Self {
            player: Position::center(),
            animals: Vec::new(),
            obstacles: Vec::new(),
            obstacle_cells: HashSet::new(),
            obstacle_count: settings.obstacle_count,
            animal_count: settings.animal_count,
            rng,
        };
        world.init_game();
        world
    }

    /// Fixed layout with the player at the grid centre.
    pub fn from_layout(animals: Vec<Animal>, obstacles: Vec<Obstacle>) -> Self {
        let obstacle_cells = obstacles.iter().map(Obstacle::position).collect();
        Self {
            player: Position::center(),
            obstacle_count: obstacles.len(),
            animal_count: animals.len(),
            animals,
            obstacles,
            obstacle_cells,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Reset: player to the centre, then obstacles and animals on distinct free cells.
    pub fn init_game(&mut self) {
        self.player = Position::center();
        self.animals.clear();
        self.obstacles.clear();
        self.obstacle_cells.clear();

        let free = (GRID_SIZE * GRID_SIZE) as usize - 1;
        let obstacle_count = self.obstacle_count.min(free);
        let animal_count = self.animal_count.min(free - obstacle_count);

        let mut occupied = HashSet::from([self.player]);
        for _ in 0..obstacle_count {
            let pos = self.random_free_cell(&occupied);
            occupied.insert(pos);
            self.obstacle_cells.insert(pos);
            self.obstacles.push(Obstacle::tree(pos));
        }
        for _ in 0..animal_count {
            let pos = self.random_free_cell(&occupied);
            occupied.insert(pos);
            let species = Species::ALL[self.rng.gen_range(0..Species::ALL.len())];
            let color = ColorTag::ALL[self.rng.gen_range(0..ColorTag::ALL.len())];
            self.animals.push(Animal::at(pos, species, color));
        }
        debug!(
            obstacles = self.obstacles.len(),
            animals = self.animals.len(),
            "world initialized"
        );
    }

    fn random_free_cell(&mut self, occupied: &HashSet<Position>) -> Position {
        loop {
            let pos = Position::new(
                self.rng.gen_range(0..GRID_SIZE),
                self.rng.gen_range(0..GRID_SIZE),
            );
            if !occupied.contains(&pos) {
                return pos;
            }
        }
    }

    fn animal_index(&self, pos: Position) -> Option<usize> {
        self.animals.iter().position(|a| a.position() == pos)
    }

    fn is_walkable(&self, pos: Position) -> bool {
        pos.in_bounds() && !self.obstacle_cells.contains(&pos) && self.animal_index(pos).is_none()
    }

    /// Advance one cell at a time; the first blocked sub-step ends the move.
    pub fn move_player(&mut self, direction: Direction, steps: u32) -> MoveOutcome {
        let mut actual_steps = 0;
        for _ in 0..steps {
            let next = self.player.step(direction);
            if !self.is_walkable(next) {
                break;
            }
            self.player = next;
            actual_steps += 1;
        }
        MoveOutcome {
            moved: actual_steps > 0,
            actual_steps,
            blocked: actual_steps < steps,
            pos: self.player,
        }
    }

    /// Remove the animal in the adjacent cell, if any.
    pub fn catch_animal(&mut self, direction: Direction) -> CatchOutcome {
        let target = self.player.step(direction);
        if !target.in_bounds() {
            return CatchOutcome::failed(CatchFailure::OutOfBounds);
        }
        match self.animal_index(target) {
            Some(idx) => {
                let animal = self.animals.remove(idx);
                CatchOutcome::caught(&animal)
            }
            None => CatchOutcome::failed(CatchFailure::NoAnimal),
        }
    }

    pub fn player(&self) -> Position {
        self.player
    }

    pub fn animals(&self) -> &[Animal] {
        &self.animals
    }

    pub fn state(&self) -> GameSnapshot {
        GameSnapshot {
            player: self.player,
            animals: self.animals.clone(),
            obstacles: self.obstacles.clone(),
        }
    }

    pub fn agent_view(&self) -> AgentView {
        let start = view_start(self.player);
        let mut view = AgentView {
            player: self.player,
            view_start: start,
            view_size: VIEW_SIZE,
            animals: Vec::new(),
            obstacles: Vec::new(),
        };
        view.animals = self
            .animals
            .iter()
            .filter(|a| view.contains(a.position()))
            .cloned()
            .collect();
        view.obstacles = self
            .obstacles
            .iter()
            .filter(|o| view.contains(o.position()))
            .copied()
            .collect();
        view
    }

    /// Name one to three distinct live animals as targets.
    pub fn generate_random_mission(&mut self) -> String {
        if self.animals.is_empty() {
            return EXPLORE_MISSION.to_string();
        }
        let count = self.animals.len().min(self.rng.gen_range(1..=3));
        let descriptions: Vec<String> = self
            .animals
            .choose_multiple(&mut self.rng, count)
            .map(Animal::describe)
            .collect();
        format!("Find the {}", descriptions.join(" and the "))
    }
}
