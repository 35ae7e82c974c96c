//! Vanguard game rules: a two-player race across a barrier-studded grid.
//!
//! Red's pieces start on row 0 and advance toward the bottom edge; Blue's
//! start on the last row and advance toward the top. A piece steps one square
//! per turn, straight ahead or diagonally forward. Diagonal steps may land on
//! an opposing piece and capture it; straight steps never capture. A piece
//! that reaches the far row is finished: it can no longer be chosen as a move
//! origin, but it keeps its square until the end of the game. A side with no
//! legal move on its turn loses, whatever the piece counts.
//!
//! The crate splits into the raw rules ([`Board`]) and the selection state
//! machine ([`Game`]) that sequences origin and destination choices and
//! reports progress as [`GameEvent`]s. Nothing here does I/O; presentation
//! and persistence live with the callers.
//!
//! ```text
//! The standard 6x7 board ('#' marks a barrier square):
//!
//!   R R R R R R R      row 0, Red home
//!   . . . . . . .
//!   . . . . # . .      barrier (2,4)
//!   . . # . . . .      barrier (3,2)
//!   . . . . . . .
//!   B B B B B B B      row 5, Blue home
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Columns of the standard setup.
pub const BOARD_WIDTH: i8 = 7;
/// Rows of the standard setup.
pub const BOARD_HEIGHT: i8 = 6;

// ============================================================================
// ERRORS
// ============================================================================

/// Rejected board setups and direction lookups.
///
/// Everything here is reported synchronously: a [`Board`] cannot exist in a
/// state that violates its invariants. Out-of-range piece indices are a
/// caller bug, not a variant of this enum, and panic instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("board dimensions {width}x{height} must be positive")]
    BadDimensions { width: i8, height: i8 },
    #[error("position {0} is off the board")]
    OffBoard(Pos),
    #[error("two pieces occupy {0}")]
    PieceOverlap(Pos),
    #[error("barrier at {0} coincides with a piece")]
    BarrierUnderPiece(Pos),
    #[error("barrier at {0} lies on a home row")]
    BarrierOnHomeRow(Pos),
    #[error("duplicate barrier at {0}")]
    DuplicateBarrier(Pos),
    #[error("{side} has no direction with delta {delta:?}")]
    UnknownDirection { side: Side, delta: (i8, i8) },
}

// ============================================================================
// SIDES & GEOMETRY
// ============================================================================

/// One of the two players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Red,
    Blue,
}

impl Side {
    /// Get the opposing side.
    #[inline]
    pub fn opponent(self) -> Side {
        match self {
            Side::Red => Side::Blue,
            Side::Blue => Side::Red,
        }
    }

    /// The three forward directions of this side.
    #[inline]
    pub fn dirs(self) -> &'static [Dir; 3] {
        match self {
            Side::Red => &RED_DIRS,
            Side::Blue => &BLUE_DIRS,
        }
    }

    /// Row this side's pieces start on, for a board of the given height.
    #[inline]
    pub fn home_row(self, height: i8) -> i8 {
        match self {
            Side::Red => 0,
            Side::Blue => height - 1,
        }
    }

    /// Row this side's pieces are racing toward (the opponent's home row).
    #[inline]
    pub fn goal_row(self, height: i8) -> i8 {
        self.opponent().home_row(height)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Red => write!(f, "RED"),
            Side::Blue => write!(f, "BLUE"),
        }
    }
}

/// A grid coordinate.
///
/// Plain data with no bounds attached; computing a square past the edge is
/// fine and [`Board::is_on_board`] is the judge of it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Pos {
    pub row: i8,
    pub col: i8,
}

impl Pos {
    #[inline]
    pub const fn new(row: i8, col: i8) -> Pos {
        Pos { row, col }
    }

    /// The square one step away in the given direction.
    #[inline]
    pub fn shift(self, dir: Dir) -> Pos {
        let (dr, dc) = dir.delta();
        Pos::new(self.row + dr, self.col + dc)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// A single forward step. Red owns the Down family, Blue the Up family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Dir {
    UpLeft = 0,
    Up = 1,
    UpRight = 2,
    DownLeft = 3,
    Down = 4,
    DownRight = 5,
}

/// Blue's forward directions (decreasing row).
pub const BLUE_DIRS: [Dir; 3] = [Dir::UpLeft, Dir::Up, Dir::UpRight];
/// Red's forward directions (increasing row).
pub const RED_DIRS: [Dir; 3] = [Dir::DownLeft, Dir::Down, Dir::DownRight];

const ALL_DIRS: [Dir; 6] = [
    Dir::UpLeft,
    Dir::Up,
    Dir::UpRight,
    Dir::DownLeft,
    Dir::Down,
    Dir::DownRight,
];

impl Dir {
    /// Row and column change of one step.
    #[inline]
    pub const fn delta(self) -> (i8, i8) {
        match self {
            Dir::UpLeft => (-1, -1),
            Dir::Up => (-1, 0),
            Dir::UpRight => (-1, 1),
            Dir::DownLeft => (1, -1),
            Dir::Down => (1, 0),
            Dir::DownRight => (1, 1),
        }
    }

    /// Whether this is a side's single straight-ahead direction.
    ///
    /// Straight steps advance but never capture.
    #[inline]
    pub const fn is_straight(self) -> bool {
        matches!(self, Dir::Up | Dir::Down)
    }

    /// The side whose move set contains this direction.
    #[inline]
    pub const fn side(self) -> Side {
        match self {
            Dir::UpLeft | Dir::Up | Dir::UpRight => Side::Blue,
            Dir::DownLeft | Dir::Down | Dir::DownRight => Side::Red,
        }
    }

    /// Find the direction of `side` matching a raw step delta.
    ///
    /// Translates a from/to square pair back into a named direction. Scans
    /// only the side's own triple, so the other side's deltas fail too.
    pub fn from_delta(side: Side, delta: (i8, i8)) -> Result<Dir, RulesError> {
        side.dirs()
            .iter()
            .copied()
            .find(|dir| dir.delta() == delta)
            .ok_or(RulesError::UnknownDirection { side, delta })
    }

    #[inline]
    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// A set of directions packed into one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirSet(u8);

impl DirSet {
    pub const EMPTY: DirSet = DirSet(0);

    /// Build a set from a slice of directions.
    pub fn of(dirs: &[Dir]) -> DirSet {
        let mut set = DirSet::EMPTY;
        for &dir in dirs {
            set.insert(dir);
        }
        set
    }

    #[inline]
    pub fn insert(&mut self, dir: Dir) {
        self.0 |= dir.bit();
    }

    #[inline]
    pub fn contains(self, dir: Dir) -> bool {
        self.0 & dir.bit() != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub fn union(self, other: DirSet) -> DirSet {
        DirSet(self.0 | other.0)
    }

    /// Iterate the members in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Dir> {
        ALL_DIRS.into_iter().filter(move |dir| self.contains(*dir))
    }
}

// ============================================================================
// PIECES
// ============================================================================

/// A single piece: its side and its current square.
///
/// Pieces live in their board's per-side list and are moved in place. They
/// hold no rules knowledge; advancing one is a bare coordinate update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Piece {
    side: Side,
    pos: Pos,
}

impl Piece {
    #[inline]
    pub const fn new(side: Side, pos: Pos) -> Piece {
        Piece { side, pos }
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    #[inline]
    pub fn pos(&self) -> Pos {
        self.pos
    }

    /// Step one square in the given direction. No legality checking.
    #[inline]
    fn advance(&mut self, dir: Dir) {
        self.pos = self.pos.shift(dir);
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.side, self.pos)
    }
}

/// A capture produced by a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capture {
    /// Side that lost the piece.
    pub side: Side,
    /// Index the piece held in its side's list before removal.
    pub index: usize,
    /// Square it was taken on.
    pub pos: Pos,
}

/// What a single applied move did, in the order it happened: the moving
/// piece relocated first, then any capture was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    pub side: Side,
    pub index: usize,
    pub from: Pos,
    pub to: Pos,
    pub capture: Option<Capture>,
}

// ============================================================================
// BOARD
// ============================================================================

/// The full rules state: both piece lists and the barrier squares.
///
/// Construction validates every invariant; afterwards the only mutation is
/// [`Board::apply`]. Piece lists are dense, so indices are stable until a
/// capture removes an earlier piece of the same side. Callers holding an
/// index across an opposing move must re-resolve it with [`Board::piece_at`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Board {
    width: i8,
    height: i8,
    barriers: Vec<Pos>,
    red: Vec<Piece>,
    blue: Vec<Piece>,
}

impl Board {
    /// The original layout: 6x7, barriers at (3,2) and (2,4), and a full
    /// home row of seven pieces per side.
    pub fn standard() -> Board {
        let barriers = vec![Pos::new(3, 2), Pos::new(2, 4)];
        let mut pieces = Vec::with_capacity(2 * BOARD_WIDTH as usize);
        for col in 0..BOARD_WIDTH {
            pieces.push(Piece::new(Side::Red, Pos::new(0, col)));
        }
        for col in 0..BOARD_WIDTH {
            pieces.push(Piece::new(Side::Blue, Pos::new(BOARD_HEIGHT - 1, col)));
        }
        Board::with_setup(BOARD_WIDTH, BOARD_HEIGHT, barriers, pieces)
            .expect("standard setup is valid")
    }

    /// Build a board from an explicit setup.
    ///
    /// Rejects non-positive dimensions, off-board pieces or barriers,
    /// overlapping pieces, barriers under pieces or on a home row, and
    /// duplicate barriers.
    pub fn with_setup(
        width: i8,
        height: i8,
        barriers: Vec<Pos>,
        pieces: Vec<Piece>,
    ) -> Result<Board, RulesError> {
        if width <= 0 || height <= 0 {
            return Err(RulesError::BadDimensions { width, height });
        }
        let on_board =
            |p: Pos| p.row >= 0 && p.row < height && p.col >= 0 && p.col < width;
        let mut occupied = Vec::with_capacity(pieces.len());
        for piece in &pieces {
            if !on_board(piece.pos()) {
                return Err(RulesError::OffBoard(piece.pos()));
            }
            if occupied.contains(&piece.pos()) {
                return Err(RulesError::PieceOverlap(piece.pos()));
            }
            occupied.push(piece.pos());
        }
        let mut placed = Vec::with_capacity(barriers.len());
        for &barrier in &barriers {
            if !on_board(barrier) {
                return Err(RulesError::OffBoard(barrier));
            }
            if barrier.row == 0 || barrier.row == height - 1 {
                return Err(RulesError::BarrierOnHomeRow(barrier));
            }
            if placed.contains(&barrier) {
                return Err(RulesError::DuplicateBarrier(barrier));
            }
            if occupied.contains(&barrier) {
                return Err(RulesError::BarrierUnderPiece(barrier));
            }
            placed.push(barrier);
        }
        let (red, blue): (Vec<Piece>, Vec<Piece>) =
            pieces.into_iter().partition(|p| p.side() == Side::Red);
        Ok(Board {
            width,
            height,
            barriers,
            red,
            blue,
        })
    }

    #[inline]
    pub fn width(&self) -> i8 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i8 {
        self.height
    }

    /// The permanently blocked squares.
    #[inline]
    pub fn barriers(&self) -> &[Pos] {
        &self.barriers
    }

    #[inline]
    fn list(&self, side: Side) -> &[Piece] {
        match side {
            Side::Red => &self.red,
            Side::Blue => &self.blue,
        }
    }

    #[inline]
    fn list_mut(&mut self, side: Side) -> &mut Vec<Piece> {
        match side {
            Side::Red => &mut self.red,
            Side::Blue => &mut self.blue,
        }
    }

    /// Number of pieces a side has left.
    #[inline]
    pub fn piece_count(&self, side: Side) -> usize {
        self.list(side).len()
    }

    /// A side's piece by index. Panics if the index is out of range.
    #[inline]
    pub fn piece(&self, side: Side, index: usize) -> &Piece {
        &self.list(side)[index]
    }

    /// Squares of every piece of a side, in list order.
    pub fn positions(&self, side: Side) -> impl Iterator<Item = Pos> + '_ {
        self.list(side).iter().map(|p| p.pos())
    }

    /// Squares of the side's pieces that may still be chosen as a move
    /// origin. Pieces on the goal row are finished and stay put for the
    /// rest of the game.
    pub fn active_positions(&self, side: Side) -> impl Iterator<Item = Pos> + '_ {
        let goal = side.goal_row(self.height);
        self.list(side)
            .iter()
            .map(|p| p.pos())
            .filter(move |p| p.row != goal)
    }

    /// Find which of a side's pieces sits on a square, if any.
    pub fn piece_at(&self, side: Side, pos: Pos) -> Option<usize> {
        self.list(side).iter().position(|p| p.pos() == pos)
    }

    /// Whether the square is a barrier tile.
    #[inline]
    pub fn is_barrier(&self, pos: Pos) -> bool {
        self.barriers.contains(&pos)
    }

    /// Whether the coordinate lies inside the grid.
    #[inline]
    pub fn is_on_board(&self, pos: Pos) -> bool {
        pos.row >= 0 && pos.row < self.height && pos.col >= 0 && pos.col < self.width
    }

    /// Whether the piece has reached the opponent's home row.
    ///
    /// Panics if the index is out of range.
    #[inline]
    pub fn is_finished(&self, side: Side, index: usize) -> bool {
        self.piece(side, index).pos().row == side.goal_row(self.height)
    }

    /// Check one step of one piece.
    ///
    /// Illegal when the destination is off the board, a barrier, or a square
    /// held by the same side, and when a straight step would land on an
    /// opposing piece. A diagonal step onto an opposing piece is the capture
    /// case and is legal. Panics if the index is out of range.
    pub fn is_legal(&self, side: Side, index: usize, dir: Dir) -> bool {
        debug_assert_eq!(dir.side(), side, "direction belongs to the other side");
        let dest = self.piece(side, index).pos().shift(dir);
        if !self.is_on_board(dest) || self.is_barrier(dest) {
            return false;
        }
        if self.piece_at(side, dest).is_some() {
            return false;
        }
        if dir.is_straight() && self.piece_at(side.opponent(), dest).is_some() {
            return false;
        }
        true
    }

    /// The subset of the side's three directions this piece may take.
    pub fn valid_moves(&self, side: Side, index: usize) -> DirSet {
        let mut set = DirSet::EMPTY;
        for &dir in side.dirs() {
            if self.is_legal(side, index, dir) {
                set.insert(dir);
            }
        }
        set
    }

    /// Union of [`Board::valid_moves`] across all of a side's pieces.
    ///
    /// Answers only whether the side can move at all, not which piece can.
    /// An empty set here is the losing condition.
    pub fn all_valid_moves(&self, side: Side) -> DirSet {
        let mut set = DirSet::EMPTY;
        for index in 0..self.piece_count(side) {
            set = set.union(self.valid_moves(side, index));
        }
        set
    }

    /// Execute a move and resolve its capture.
    ///
    /// The move must be legal; that is the caller's contract, checked only
    /// in debug builds. The moving piece relocates first, then an opposing
    /// piece on the destination square is removed from its list, shifting
    /// the indices of that side's later pieces down by one. The returned
    /// record reports both effects in that order.
    pub fn apply(&mut self, side: Side, index: usize, dir: Dir) -> MoveRecord {
        debug_assert!(self.is_legal(side, index, dir), "applied an illegal move");
        let from = self.piece(side, index).pos();
        self.list_mut(side)[index].advance(dir);
        let to = self.piece(side, index).pos();
        let capture = self.piece_at(side.opponent(), to).map(|victim| {
            let taken = self.list_mut(side.opponent()).remove(victim);
            Capture {
                side: taken.side(),
                index: victim,
                pos: taken.pos(),
            }
        });
        MoveRecord {
            side,
            index,
            from,
            to,
            capture,
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::standard()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, piece) in self.red.iter().chain(self.blue.iter()).enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{piece}")?;
        }
        write!(f, "]")
    }
}

// ============================================================================
// TURN & SELECTION STATE MACHINE
// ============================================================================

/// Where the turn cycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Waiting for `side` to pick one of its movable pieces.
    SelectPiece(Side),
    /// Waiting for `side` to pick a destination for the piece on `origin`.
    SelectTarget { side: Side, origin: Pos },
    /// The game is decided. All further input is ignored.
    Over { winner: Side },
}

/// Change notifications emitted by [`Game::select`], in the order the
/// underlying effects happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameEvent {
    /// A piece relocated from one square to another.
    PieceMoved { side: Side, from: Pos, to: Pos },
    /// A piece was captured and removed from the board.
    PieceCaptured { side: Side, pos: Pos },
    /// A move left one side without a legal reply.
    GameOver { winner: Side },
}

/// The selection state machine driving a [`Board`].
///
/// One discrete input is one selected square. Inputs that do not fit the
/// current phase are ignored without error, since users probe the board by
/// clicking; [`Game::selectable`] lists the squares that would currently do
/// something.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Game {
    board: Board,
    phase: Phase,
}

impl Game {
    /// A fresh game on the standard board, Red to choose first.
    pub fn new() -> Game {
        Game::starting_with(Side::Red)
    }

    /// A fresh game on the standard board with a chosen opener.
    pub fn starting_with(side: Side) -> Game {
        Game::with_board(Board::standard(), side)
    }

    /// Wrap an already validated board.
    pub fn with_board(board: Board, starts: Side) -> Game {
        Game {
            board,
            phase: Phase::SelectPiece(starts),
        }
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The winner, once there is one.
    pub fn winner(&self) -> Option<Side> {
        match self.phase {
            Phase::Over { winner } => Some(winner),
            _ => None,
        }
    }

    /// Squares the current phase will accept.
    pub fn selectable(&self) -> Vec<Pos> {
        match self.phase {
            Phase::SelectPiece(side) => self.board.active_positions(side).collect(),
            Phase::SelectTarget { side, origin } => {
                let index = self
                    .board
                    .piece_at(side, origin)
                    .expect("selected origin tracks a live piece");
                self.board
                    .valid_moves(side, index)
                    .iter()
                    .map(|dir| origin.shift(dir))
                    .collect()
            }
            Phase::Over { .. } => Vec::new(),
        }
    }

    /// Feed one selected square into the machine.
    ///
    /// Returns the change notifications the input produced. An input outside
    /// [`Game::selectable`] is a no-op that returns none, with one exception:
    /// while choosing a destination, re-selecting the origin square backs out
    /// to piece selection.
    pub fn select(&mut self, pos: Pos) -> Vec<GameEvent> {
        match self.phase {
            Phase::SelectPiece(side) => {
                if self.board.active_positions(side).any(|p| p == pos) {
                    self.phase = Phase::SelectTarget { side, origin: pos };
                }
                Vec::new()
            }
            Phase::SelectTarget { side, origin } => {
                if pos == origin {
                    self.phase = Phase::SelectPiece(side);
                    return Vec::new();
                }
                let index = self
                    .board
                    .piece_at(side, origin)
                    .expect("selected origin tracks a live piece");
                let delta = (pos.row - origin.row, pos.col - origin.col);
                let Ok(dir) = Dir::from_delta(side, delta) else {
                    return Vec::new();
                };
                if !self.board.is_legal(side, index, dir) {
                    return Vec::new();
                }
                let record = self.board.apply(side, index, dir);
                let mut events = vec![GameEvent::PieceMoved {
                    side,
                    from: record.from,
                    to: record.to,
                }];
                if let Some(capture) = record.capture {
                    events.push(GameEvent::PieceCaptured {
                        side: capture.side,
                        pos: capture.pos,
                    });
                }
                let next = side.opponent();
                self.phase = Phase::SelectPiece(next);
                // The side to move next is checked first; at most one side
                // can be out of moves on a reachable board.
                for loser in [next, side] {
                    if self.board.all_valid_moves(loser).is_empty() {
                        let winner = loser.opponent();
                        self.phase = Phase::Over { winner };
                        events.push(GameEvent::GameOver { winner });
                        break;
                    }
                }
                events
            }
            Phase::Over { .. } => Vec::new(),
        }
    }
}

impl Default for Game {
    fn default() -> Self {
        Game::new()
    }
}
