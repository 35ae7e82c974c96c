//! Randomized full-game playouts.
//!
//! Drives the selection machine end to end with seeded random clicks and
//! checks the board invariants after every accepted input: no shared
//! squares, nothing on a barrier, everything inside the grid, and every
//! finished game leaves the declared loser with an empty move set.

use rand::prelude::*;
use rand::rngs::StdRng;

use vanguard_core::{Board, Game, GameEvent, Phase, Pos, Side};

const PLAYOUTS: usize = 200;

/// Upper bound on moves in one game: every move advances its piece one row
/// toward the goal, so each piece moves at most `height - 1` times.
fn move_bound(board: &Board) -> usize {
    let pieces = board.piece_count(Side::Red) + board.piece_count(Side::Blue);
    pieces * (board.height() as usize - 1)
}

fn assert_invariants(board: &Board) {
    let mut seen: Vec<Pos> = Vec::new();
    for side in [Side::Red, Side::Blue] {
        for pos in board.positions(side) {
            assert!(board.is_on_board(pos), "piece off the board at {pos}");
            assert!(!board.is_barrier(pos), "piece on a barrier at {pos}");
            assert!(!seen.contains(&pos), "two pieces share {pos}");
            seen.push(pos);
        }
    }
}

#[test]
fn random_playouts_terminate_and_stay_consistent() {
    let mut rng = StdRng::seed_from_u64(0x7a_2026);

    for playout in 0..PLAYOUTS {
        let starts = if playout % 2 == 0 { Side::Red } else { Side::Blue };
        let mut game = Game::starting_with(starts);
        let bound = move_bound(game.board());
        let mut moves = 0usize;

        // Far more inputs than any game needs; most clicks are origin
        // picks and no-ops.
        for _ in 0..10_000 {
            if game.winner().is_some() {
                break;
            }
            let choices = game.selectable();
            if choices.is_empty() {
                // A selected piece with no destination; back out and retry.
                match game.phase() {
                    Phase::SelectTarget { origin, .. } => {
                        game.select(origin);
                        continue;
                    }
                    other => panic!("no selectable squares in phase {other:?}"),
                }
            }
            let &pick = choices.choose(&mut rng).unwrap();
            let events = game.select(pick);
            if events
                .iter()
                .any(|e| matches!(e, GameEvent::PieceMoved { .. }))
            {
                moves += 1;
            }
            assert_invariants(game.board());
            assert!(moves <= bound, "playout {playout} exceeded {bound} moves");
        }

        let winner = game
            .winner()
            .unwrap_or_else(|| panic!("playout {playout} did not finish"));
        let loser = winner.opponent();
        assert!(
            game.board().all_valid_moves(loser).is_empty(),
            "playout {playout}: loser still has moves"
        );
    }
}
