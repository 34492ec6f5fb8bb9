// Board geometry and fleet placement for the targeting game.
//
// A `Fleet` is the defender's secret layout. It only records where ships sit;
// which cells were hit is public information that lives in the session's
// fired bitmaps and is reconstructed by the client when needed.

use serde::{Deserialize, Serialize};

use crate::error::GameError;

#[cfg(feature = "rand")]
use rand::{seq::SliceRandom, Rng};

/// Board dimensions. Fixed-size board simplifies reasoning and
/// serialization across prover/verifier.
pub const BOARD_SIZE: usize = 10;

/// Number of distinct ship types used in the canonical setup.
pub const NUM_SHIPS: usize = 5;

/// Canonical ship sizes (in reading order): Carrier, Battleship,
/// Cruiser, Submarine, Destroyer.
pub const SHIP_SIZES: [u8; NUM_SHIPS] = [5, 4, 3, 3, 2];

/// Sum of all ship sizes; a board is cleared after this many hits.
pub const TOTAL_SHIP_CELLS: u32 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Horizontal,
    Vertical,
}

impl Direction {
    /// Circuit encoding: 0 horizontal, 1 vertical.
    pub fn as_u32(self) -> u32 {
        match self {
            Direction::Horizontal => 0,
            Direction::Vertical => 1,
        }
    }
}

/// A board coordinate. `x` is the column, `y` the row.
#[derive(Copy, Clone, Debug, Deserialize, Eq, PartialEq, Serialize, Hash, PartialOrd, Ord)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn step(self, dir: Direction, dist: u32) -> Self {
        match dir {
            Direction::Vertical => Self { x: self.x, y: self.y.saturating_add(dist) },
            Direction::Horizontal => Self { x: self.x.saturating_add(dist), y: self.y },
        }
    }

    pub fn in_bounds(&self) -> bool {
        self.x < BOARD_SIZE as u32 && self.y < BOARD_SIZE as u32
    }

    /// Bitmap index on the standard board: `row * width + col`.
    pub fn index(&self) -> u32 {
        self.y * BOARD_SIZE as u32 + self.x
    }

    pub fn from_index(index: u32) -> Self {
        Self::new(index % BOARD_SIZE as u32, index / BOARD_SIZE as u32)
    }
}

impl From<(u32, u32)> for Position {
    fn from(value: (u32, u32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<(u8, u8)> for Position {
    fn from(value: (u8, u8)) -> Self {
        Self::new(value.0 as u32, value.1 as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum ShipType {
    Carrier,    // size 5
    Battleship, // size 4
    Cruiser,    // size 3
    Submarine,  // size 3
    Destroyer,  // size 2
}

impl ShipType {
    pub const ALL: [ShipType; NUM_SHIPS] = [
        ShipType::Carrier,
        ShipType::Battleship,
        ShipType::Cruiser,
        ShipType::Submarine,
        ShipType::Destroyer,
    ];

    pub fn size(&self) -> u8 {
        SHIP_SIZES[self.index()]
    }

    /// Return a stable index for this ship type (0..NUM_SHIPS)
    pub fn index(&self) -> usize {
        match self {
            ShipType::Carrier => 0,
            ShipType::Battleship => 1,
            ShipType::Cruiser => 2,
            ShipType::Submarine => 3,
            ShipType::Destroyer => 4,
        }
    }

    /// Wire id used in resolutions and public inputs; 0 is reserved for "none".
    pub fn id(&self) -> u32 {
        self.index() as u32 + 1
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1..=5 => Some(Self::ALL[(id - 1) as usize]),
            _ => None,
        }
    }

    /// Bit in a session's sunk-ship mask.
    pub fn mask_bit(&self) -> u32 {
        1 << self.index()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Ship {
    pub ship_type: ShipType,
    pub position: Position, // (x, y) coordinates of the ship's start position
    pub direction: Direction,
}

impl Ship {
    pub fn new(ship_type: ShipType, position: impl Into<Position>, direction: Direction) -> Self {
        Self { ship_type, position: position.into(), direction }
    }

    /// All coordinates this ship occupies, from the start cell outwards.
    pub fn cells(&self) -> Vec<Position> {
        (0..self.ship_type.size() as u32)
            .map(|offset| self.position.step(self.direction, offset))
            .collect()
    }

    pub fn occupies(&self, pos: Position) -> bool {
        self.cells().contains(&pos)
    }

    /// Circuit encoding of a ship as one field element: `x + 10*y + 100*dir`.
    pub fn packed(&self) -> u64 {
        self.position.x as u64
            + BOARD_SIZE as u64 * self.position.y as u64
            + 100 * self.direction.as_u32() as u64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fleet {
    pub ships: Vec<Ship>,
}

impl Fleet {
    pub fn new() -> Self {
        Self { ships: Vec::new() }
    }

    /// Check whether a ship of `ship_type` can be placed at `pos` facing
    /// `direction`. Checks include:
    ///  - start and end within board bounds
    ///  - that a ship of the same type isn't already placed
    ///  - no coordinate overlap with existing ships
    pub fn can_place_ship(&self, ship_type: ShipType, pos: impl Into<Position>, direction: Direction) -> bool {
        let start: Position = pos.into();
        if !start.in_bounds() {
            return false;
        }

        let end = start.step(direction, (ship_type.size() - 1) as u32);
        if !end.in_bounds() {
            return false;
        }

        if self.ships.iter().any(|ship| ship.ship_type == ship_type) {
            return false;
        }

        let candidate = Ship::new(ship_type, start, direction);
        let new_cells = candidate.cells();
        !self
            .ships
            .iter()
            .any(|existing| existing.cells().iter().any(|c| new_cells.contains(c)))
    }

    /// Attempt to place a ship; returns true on success.
    pub fn place_ship(&mut self, ship_type: ShipType, pos: impl Into<Position>, direction: Direction) -> bool {
        let pos: Position = pos.into();
        if self.can_place_ship(ship_type, pos, direction) {
            self.ships.push(Ship::new(ship_type, pos, direction));
            true
        } else {
            false
        }
    }

    /// Place multiple ships in order. Non-atomic: earlier placements are
    /// kept even if later ones fail. Returns true only if all succeed.
    pub fn place_ships(&mut self, ships: Vec<(ShipType, Position, Direction)>) -> bool {
        let mut all_ok = true;
        for (ship_type, pos, direction) in ships {
            if !self.place_ship(ship_type, pos, direction) {
                all_ok = false;
            }
        }
        all_ok
    }

    #[cfg(feature = "rand")]
    /// Try to place all ships randomly using the provided RNG. On failure
    /// clears `self.ships` and returns false.
    pub fn place_ships_randomly<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let mut positions: Vec<Position> = (0..BOARD_SIZE as u32)
            .flat_map(|x| (0..BOARD_SIZE as u32).map(move |y| Position::new(x, y)))
            .collect();

        self.ships.clear();

        for ship_type in ShipType::ALL {
            positions.shuffle(rng);
            let mut dirs = [Direction::Horizontal, Direction::Vertical];
            dirs.shuffle(rng);
            let placed = positions
                .iter()
                .any(|&pos| dirs.iter().any(|&dir| self.place_ship(ship_type, pos, dir)));
            if !placed {
                self.ships.clear();
                return false;
            }
        }

        true
    }

    /// Full consistency check: every ship type exactly once, all cells on
    /// the board, no overlaps.
    pub fn check(&self) -> Result<(), GameError> {
        if self.ships.len() != NUM_SHIPS {
            return Err(GameError::layout(format!(
                "expected {} ships, found {}",
                NUM_SHIPS,
                self.ships.len()
            )));
        }

        let mut found = [false; NUM_SHIPS];
        for ship in &self.ships {
            if found[ship.ship_type.index()] {
                return Err(GameError::layout(format!("duplicate {:?}", ship.ship_type)));
            }
            found[ship.ship_type.index()] = true;
        }

        for (i, ship) in self.ships.iter().enumerate() {
            if !ship.position.in_bounds() {
                return Err(GameError::layout(format!("{:?} starts off the board", ship.ship_type)));
            }
            let cells = ship.cells();
            if cells.iter().any(|p| !p.in_bounds()) {
                return Err(GameError::layout(format!("{:?} leaves the board", ship.ship_type)));
            }
            for other in self.ships.iter().skip(i + 1) {
                if other.cells().iter().any(|c| cells.contains(c)) {
                    return Err(GameError::layout(format!(
                        "{:?} overlaps {:?}",
                        ship.ship_type, other.ship_type
                    )));
                }
            }
        }

        Ok(())
    }

    /// Ships in canonical order (Carrier first). Commitments and witnesses
    /// always walk the fleet in this order, independent of placement order.
    pub fn canonical(&self) -> Vec<&Ship> {
        let mut ships: Vec<&Ship> = self.ships.iter().collect();
        ships.sort_by_key(|s| s.ship_type);
        ships
    }

    /// Every ship cell, canonical ship order then segment order.
    pub fn cells(&self) -> Vec<Position> {
        self.canonical().into_iter().flat_map(|s| s.cells()).collect()
    }

    pub fn ship_at(&self, pos: Position) -> Option<&Ship> {
        self.ships.iter().find(|s| s.occupies(pos))
    }
}
