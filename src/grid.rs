use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// MAP (5x3, cells addressed as (x, y), genome index = y * width + x)
// (0,2) | (1,2) | (2,2) | (3,2) | (4,2)    <- pursued spawn at (0, height-1)
// (0,1) | (1,1) | (2,1) | (3,1) | (4,1)
// (0,0) | (1,0) | (2,0) | (3,0) | (4,0)    <- pursuer spawn at (width-1, 0)
//
// Text maps are written top row first: '#' is a wall, '.' is open.

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Cell {
    Open,
    Wall,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Position) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, 1),
            Direction::Right => (1, 0),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
        }
    }
}

/// One tick's worth of intent for a player. `Hold` is only ever legal for
/// the pursued role.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Move(Direction),
    Hold,
}

impl Action {
    pub const MOVES: [Action; 4] = [
        Action::Move(Direction::Up),
        Action::Move(Direction::Right),
        Action::Move(Direction::Down),
        Action::Move(Direction::Left),
    ];

    pub fn direction(self) -> Option<Direction> {
        match self {
            Action::Move(d) => Some(d),
            Action::Hold => None,
        }
    }
}

impl From<Direction> for Action {
    fn from(d: Direction) -> Self {
        Action::Move(d)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Move(Direction::Up) => "up",
            Action::Move(Direction::Right) => "right",
            Action::Move(Direction::Down) => "down",
            Action::Move(Direction::Left) => "left",
            Action::Hold => "hold",
        };
        f.write_str(s)
    }
}

/// Rectangular wall/open labeling. Cells are stored row-major, the same
/// layout the genome uses.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn filled(width: usize, height: usize, cell: Cell) -> Result<Self> {
        let len = Self::cell_count(width, height)?;
        Ok(Self {
            width,
            height,
            cells: vec![cell; len],
        })
    }

    fn cell_count(width: usize, height: usize) -> Result<usize> {
        if width == 0 || height == 0 {
            return Err(Error::EmptyMap);
        }
        width
            .checked_mul(height)
            .ok_or(Error::MapTooLarge { width, height })
    }

    pub fn open(width: usize, height: usize) -> Result<Self> {
        Self::filled(width, height, Cell::Open)
    }

    /// Translates a flat genome (0 = open, 1 = wall) into a grid.
    /// Index `i` maps to `(i % width, i / width)`.
    pub fn from_genome(genome: &[u8], width: usize, height: usize) -> Result<Self> {
        let expected = Self::cell_count(width, height)?;
        if genome.len() != expected {
            return Err(Error::GenomeLength {
                expected,
                actual: genome.len(),
                width,
                height,
            });
        }

        let cells = genome
            .iter()
            .enumerate()
            .map(|(index, label)| match label {
                0 => Ok(Cell::Open),
                1 => Ok(Cell::Wall),
                _ => Err(Error::InvalidCell {
                    index,
                    label: *label,
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Parses a text map, top row first.
    pub fn parse(text: &str) -> Result<Self> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        let height = rows.len();
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        let mut grid = Self::open(width, height)?;

        for (line, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(Error::RaggedMap {
                    line,
                    expected: width,
                    actual: row.chars().count(),
                });
            }
            let y = height - 1 - line;
            for (x, ch) in row.chars().enumerate() {
                let cell = match ch {
                    '.' => Cell::Open,
                    '#' => Cell::Wall,
                    _ => return Err(Error::InvalidMapChar { line, ch }),
                };
                grid.set(Position::new(x, y), cell);
            }
        }

        Ok(grid)
    }

    /// Demo layout: the border and both centre lines open, the rest walled.
    pub fn cross(size: usize) -> Result<Self> {
        let mut grid = Self::filled(size, size, Cell::Wall)?;
        let mid = size / 2;
        for pos in grid.positions().collect::<Vec<_>>() {
            let on_line = |v: usize| v == 0 || v == mid || v == size - 1;
            if on_line(pos.x) || on_line(pos.y) {
                grid.set(pos, Cell::Open);
            }
        }
        Ok(grid)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pursued_spawn(&self) -> Position {
        Position::new(0, self.height - 1)
    }

    pub fn pursuer_spawn(&self) -> Position {
        Position::new(self.width - 1, 0)
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: Position) -> usize {
        pos.y * self.width + pos.x
    }

    pub fn cell(&self, pos: Position) -> Option<Cell> {
        if self.contains(pos) {
            Some(self.cells[self.index(pos)])
        } else {
            None
        }
    }

    pub fn is_open(&self, pos: Position) -> bool {
        self.cell(pos) == Some(Cell::Open)
    }

    pub fn is_wall(&self, pos: Position) -> bool {
        self.cell(pos) == Some(Cell::Wall)
    }

    /// Out-of-bounds writes are ignored.
    pub fn set(&mut self, pos: Position, cell: Cell) {
        if self.contains(pos) {
            let i = self.index(pos);
            self.cells[i] = cell;
        }
    }

    /// The in-bounds cell one step from `pos`, regardless of walls.
    pub fn step(&self, pos: Position, dir: Direction) -> Option<Position> {
        let (dx, dy) = dir.delta();
        let x = pos.x.checked_add_signed(dx)?;
        let y = pos.y.checked_add_signed(dy)?;
        let next = Position::new(x, y);
        self.contains(next).then_some(next)
    }

    /// Where `action` takes a player standing on `pos`, if that cell is open.
    pub fn apply(&self, pos: Position, action: Action) -> Option<Position> {
        match action {
            Action::Hold => Some(pos),
            Action::Move(dir) => self.step(pos, dir).filter(|p| self.is_open(*p)),
        }
    }

    pub fn open_neighbors(&self, pos: Position) -> impl Iterator<Item = (Direction, Position)> + '_ {
        Direction::ALL
            .into_iter()
            .filter_map(move |d| self.step(pos, d).map(|p| (d, p)))
            .filter(|(_, p)| self.is_open(*p))
    }

    /// Every cell in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> {
        let width = self.width;
        (0..self.width * self.height).map(move |i| Position::new(i % width, i / width))
    }

    pub fn open_cells(&self) -> impl Iterator<Item = Position> + '_ {
        self.positions().filter(|p| self.is_open(*p))
    }

    pub fn walls(&self) -> impl Iterator<Item = Position> + '_ {
        self.positions().filter(|p| self.is_wall(*p))
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in (0..self.height).rev() {
            for x in 0..self.width {
                let ch = if self.is_wall(Position::new(x, y)) { '#' } else { '.' };
                write!(f, "{}", ch)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
