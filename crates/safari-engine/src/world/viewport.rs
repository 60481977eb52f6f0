use serde::Serialize;

use safari_core::grid::{Animal, Obstacle, Position, GRID_SIZE, VIEW_RADIUS, VIEW_SIZE};

/// The square the agent sees, in absolute grid coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentView {
    pub player: Position,
    pub view_start: Position,
    pub view_size: i32,
    pub animals: Vec<Animal>,
    pub obstacles: Vec<Obstacle>,
}

impl AgentView {
    pub fn contains(&self, pos: Position) -> bool {
        (self.view_start.x..self.view_start.x + self.view_size).contains(&pos.x)
            && (self.view_start.y..self.view_start.y + self.view_size).contains(&pos.y)
    }
}

/// Top-left corner of the window around `player`, clamped inside the grid.
pub fn view_start(player: Position) -> Position {
    let clamp = |v: i32| (v - VIEW_RADIUS).clamp(0, GRID_SIZE - VIEW_SIZE);
    Position::new(clamp(player.x), clamp(player.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view_for(player: Position) -> AgentView {
        AgentView {
            player,
            view_start: view_start(player),
            view_size: VIEW_SIZE,
            animals: vec![],
            obstacles: vec![],
        }
    }

    #[test]
    fn centred_window() {
        assert_eq!(view_start(Position::new(25, 25)), Position::new(20, 20));
    }

    #[test]
    fn window_stays_inside_at_every_corner() {
        let corners = [
            Position::new(0, 0),
            Position::new(GRID_SIZE - 1, 0),
            Position::new(0, GRID_SIZE - 1),
            Position::new(GRID_SIZE - 1, GRID_SIZE - 1),
        ];
        for corner in corners {
            let start = view_start(corner);
            assert!(start.x >= 0 && start.y >= 0);
            assert!(start.x + VIEW_SIZE <= GRID_SIZE);
            assert!(start.y + VIEW_SIZE <= GRID_SIZE);
            assert!(view_for(corner).contains(corner));
        }
    }

    #[test]
    fn window_edges() {
        let view = view_for(Position::new(25, 25));
        assert!(view.contains(Position::new(20, 29)));
        assert!(!view.contains(Position::new(30, 25)));
        assert!(!view.contains(Position::new(25, 19)));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn window_is_inside_grid(x in 0..GRID_SIZE, y in 0..GRID_SIZE) {
                let player = Position::new(x, y);
                let start = view_start(player);
                prop_assert!(start.x >= 0 && start.y >= 0);
                prop_assert!(start.x + VIEW_SIZE <= GRID_SIZE);
                prop_assert!(start.y + VIEW_SIZE <= GRID_SIZE);
                prop_assert!(view_for(player).contains(player));
            }

            #[test]
            fn window_is_centred_away_from_edges(
                x in VIEW_RADIUS..GRID_SIZE - VIEW_SIZE + VIEW_RADIUS,
                y in VIEW_RADIUS..GRID_SIZE - VIEW_SIZE + VIEW_RADIUS,
            ) {
                let start = view_start(Position::new(x, y));
                prop_assert_eq!(start, Position::new(x - VIEW_RADIUS, y - VIEW_RADIUS));
            }
        }
    }
}
