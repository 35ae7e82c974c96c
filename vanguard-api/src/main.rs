//! Vanguard match server.
//!
//! Hosts one match at a time behind a small JSON API: clients report square
//! selections, the server feeds them to the rules engine and returns what
//! changed. The engine itself never does I/O; this binary owns the session,
//! the structured logs, and the durable player win counts in SQLite.

use std::env;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use vanguard_core::{Game, GameEvent, Phase, Pos, Side};

// =============================================================================
// Player store
// =============================================================================

/// SQLite-backed win counts keyed by player display name.
struct PlayerStore {
    conn: Mutex<Connection>,
}

#[derive(Debug, Serialize)]
struct PlayerRecord {
    name: String,
    wins: i64,
}

impl PlayerStore {
    fn open(path: &str) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS players (
                name TEXT PRIMARY KEY,
                wins INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        Ok(PlayerStore {
            conn: Mutex::new(conn),
        })
    }

    /// Credit the winner and make sure both names exist in the table.
    fn record_result(&self, winner: &str, loser: &str) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO players (name, wins) VALUES (?1, 1)
             ON CONFLICT(name) DO UPDATE SET wins = wins + 1",
            params![winner],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO players (name, wins) VALUES (?1, 0)",
            params![loser],
        )?;
        Ok(())
    }

    /// All known players, most wins first.
    fn standings(&self) -> Result<Vec<PlayerRecord>, rusqlite::Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT name, wins FROM players ORDER BY wins DESC, name ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(PlayerRecord {
                name: row.get(0)?,
                wins: row.get(1)?,
            })
        })?;
        rows.collect()
    }
}

// =============================================================================
// Match session
// =============================================================================

/// The one live match and the names attached to it.
struct MatchSession {
    game: Game,
    red_name: String,
    blue_name: String,
    /// Guards against crediting the same match twice.
    recorded: bool,
}

impl MatchSession {
    fn new(red_name: String, blue_name: String, starts: Side) -> Self {
        MatchSession {
            game: Game::starting_with(starts),
            red_name,
            blue_name,
            recorded: false,
        }
    }

    fn player_name(&self, side: Side) -> &str {
        match side {
            Side::Red => &self.red_name,
            Side::Blue => &self.blue_name,
        }
    }
}

/// Shared application state.
struct AppStateInner {
    session: Mutex<MatchSession>,
    store: PlayerStore,
}

type AppState = Arc<AppStateInner>;

// =============================================================================
// JSON models
// =============================================================================

#[derive(Serialize)]
struct PieceModel {
    side: &'static str,
    row: i8,
    col: i8,
    finished: bool,
}

#[derive(Serialize)]
struct PhaseModel {
    phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    side: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<(i8, i8)>,
}

#[derive(Serialize)]
struct MatchStateModel {
    width: i8,
    height: i8,
    barriers: Vec<(i8, i8)>,
    pieces: Vec<PieceModel>,
    phase: PhaseModel,
    red_player: String,
    blue_player: String,
    result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    winner: Option<String>,
}

#[derive(Serialize)]
struct SelectableModel {
    squares: Vec<(i8, i8)>,
}

#[derive(Deserialize)]
struct ClickRequest {
    row: i8,
    col: i8,
}

#[derive(Serialize)]
struct EventModel {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    side: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<(i8, i8)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<(i8, i8)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pos: Option<(i8, i8)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    winner: Option<&'static str>,
}

#[derive(Serialize)]
struct ClickResponse {
    events: Vec<EventModel>,
    state: MatchStateModel,
}

#[derive(Deserialize)]
struct MatchRequest {
    red: String,
    blue: String,
    #[serde(default)]
    starts: Option<String>,
}

#[derive(Serialize)]
struct StandingsModel {
    players: Vec<PlayerRecord>,
}

#[derive(Serialize)]
struct HealthModel {
    status: String,
}

#[derive(Serialize)]
struct ErrorModel {
    detail: String,
}

// =============================================================================
// Conversions
// =============================================================================

fn side_name(side: Side) -> &'static str {
    match side {
        Side::Red => "red",
        Side::Blue => "blue",
    }
}

fn pos_pair(pos: Pos) -> (i8, i8) {
    (pos.row, pos.col)
}

/// Flatten the session into the state model the clients render from.
fn session_to_model(session: &MatchSession) -> MatchStateModel {
    let board = session.game.board();

    let mut pieces = Vec::new();
    for side in [Side::Red, Side::Blue] {
        for index in 0..board.piece_count(side) {
            let piece = board.piece(side, index);
            pieces.push(PieceModel {
                side: side_name(side),
                row: piece.pos().row,
                col: piece.pos().col,
                finished: board.is_finished(side, index),
            });
        }
    }

    let phase = match session.game.phase() {
        Phase::SelectPiece(side) => PhaseModel {
            phase: "select_piece",
            side: Some(side_name(side)),
            origin: None,
        },
        Phase::SelectTarget { side, origin } => PhaseModel {
            phase: "select_target",
            side: Some(side_name(side)),
            origin: Some(pos_pair(origin)),
        },
        Phase::Over { winner } => PhaseModel {
            phase: "over",
            side: Some(side_name(winner)),
            origin: None,
        },
    };

    let (result, winner) = match session.game.winner() {
        Some(side) => (
            format!("{}_wins", side_name(side)),
            Some(session.player_name(side).to_string()),
        ),
        None => ("ongoing".to_string(), None),
    };

    MatchStateModel {
        width: board.width(),
        height: board.height(),
        barriers: board.barriers().iter().map(|&p| pos_pair(p)).collect(),
        pieces,
        phase,
        red_player: session.red_name.clone(),
        blue_player: session.blue_name.clone(),
        result,
        winner,
    }
}

fn event_to_model(event: &GameEvent) -> EventModel {
    match *event {
        GameEvent::PieceMoved { side, from, to } => EventModel {
            kind: "moved",
            side: Some(side_name(side)),
            from: Some(pos_pair(from)),
            to: Some(pos_pair(to)),
            pos: None,
            winner: None,
        },
        GameEvent::PieceCaptured { side, pos } => EventModel {
            kind: "captured",
            side: Some(side_name(side)),
            from: None,
            to: None,
            pos: Some(pos_pair(pos)),
            winner: None,
        },
        GameEvent::GameOver { winner } => EventModel {
            kind: "game_over",
            side: None,
            from: None,
            to: None,
            pos: None,
            winner: Some(side_name(winner)),
        },
    }
}

// =============================================================================
// API endpoints
// =============================================================================

async fn get_game(State(state): State<AppState>) -> Json<MatchStateModel> {
    let session = state.session.lock().unwrap();
    Json(session_to_model(&session))
}

async fn get_selectable(State(state): State<AppState>) -> Json<SelectableModel> {
    let session = state.session.lock().unwrap();
    let squares = session.game.selectable().into_iter().map(pos_pair).collect();
    Json(SelectableModel { squares })
}

async fn click(
    State(state): State<AppState>,
    Json(req): Json<ClickRequest>,
) -> Json<ClickResponse> {
    let mut session = state.session.lock().unwrap();
    let pos = Pos::new(req.row, req.col);
    info!("click on square {}", pos);

    let events = session.game.select(pos);
    if events.is_empty() {
        debug!("ignored selection {}", pos);
    }

    for event in &events {
        match *event {
            GameEvent::PieceMoved { side, from, to } => {
                info!("moving {} piece {} -> {}", side_name(side), from, to);
            }
            GameEvent::PieceCaptured { side, pos } => {
                info!("captured {} piece on {}", side_name(side), pos);
            }
            GameEvent::GameOver { winner } => {
                let winner_name = session.player_name(winner).to_string();
                let loser_name = session.player_name(winner.opponent()).to_string();
                info!("game over, {} wins", winner_name);
                if !session.recorded {
                    if let Err(err) = state.store.record_result(&winner_name, &loser_name) {
                        warn!("failed to record result: {}", err);
                    }
                    session.recorded = true;
                }
            }
        }
    }

    Json(ClickResponse {
        events: events.iter().map(event_to_model).collect(),
        state: session_to_model(&session),
    })
}

async fn new_match(
    State(state): State<AppState>,
    Json(req): Json<MatchRequest>,
) -> Result<Json<MatchStateModel>, (StatusCode, Json<ErrorModel>)> {
    let starts = match req.starts.as_deref() {
        None | Some("red") => Side::Red,
        Some("blue") => Side::Blue,
        Some(other) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorModel {
                    detail: format!("unknown side: {other}"),
                }),
            ));
        }
    };
    info!("new match: {} (red) vs {} (blue)", req.red, req.blue);
    let mut session = state.session.lock().unwrap();
    *session = MatchSession::new(req.red, req.blue, starts);
    Ok(Json(session_to_model(&session)))
}

async fn players(
    State(state): State<AppState>,
) -> Result<Json<StandingsModel>, (StatusCode, Json<ErrorModel>)> {
    match state.store.standings() {
        Ok(players) => Ok(Json(StandingsModel { players })),
        Err(err) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorModel {
                detail: err.to_string(),
            }),
        )),
    }
}

async fn health() -> Json<HealthModel> {
    Json(HealthModel {
        status: "ok".to_string(),
    })
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let db_path = env::var("VANGUARD_DB").unwrap_or_else(|_| "players.db".to_string());
    let store = PlayerStore::open(&db_path).expect("failed to open the player store");
    info!("player store at {}", db_path);

    let state: AppState = Arc::new(AppStateInner {
        session: Mutex::new(MatchSession::new(
            "Player1".to_string(),
            "Player2".to_string(),
            Side::Red,
        )),
        store,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/game", get(get_game))
        .route("/selectable", get(get_selectable))
        .route("/click", post(click))
        .route("/match", post(new_match))
        .route("/players", get(players))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await.unwrap();
    info!("Vanguard API running on http://localhost:8000");
    axum::serve(listener, app).await.unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> PlayerStore {
        PlayerStore::open(":memory:").unwrap()
    }

    #[test]
    fn test_record_result_upserts_both_players() {
        let store = memory_store();
        store.record_result("Alice", "Bob").unwrap();
        store.record_result("Alice", "Bob").unwrap();
        store.record_result("Bob", "Alice").unwrap();

        let standings = store.standings().unwrap();
        assert_eq!(standings.len(), 2);
        assert_eq!(standings[0].name, "Alice");
        assert_eq!(standings[0].wins, 2);
        assert_eq!(standings[1].name, "Bob");
        assert_eq!(standings[1].wins, 1);
    }

    #[test]
    fn test_record_result_starts_loser_at_zero() {
        let store = memory_store();
        store.record_result("Alice", "Bob").unwrap();

        let standings = store.standings().unwrap();
        assert_eq!(standings[1].name, "Bob");
        assert_eq!(standings[1].wins, 0);
    }

    #[test]
    fn test_session_model_reflects_engine_state() {
        let session = MatchSession::new("Ann".to_string(), "Ben".to_string(), Side::Blue);
        let model = session_to_model(&session);
        assert_eq!(model.width, 7);
        assert_eq!(model.height, 6);
        assert_eq!(model.pieces.len(), 14);
        assert_eq!(model.barriers, vec![(3, 2), (2, 4)]);
        assert_eq!(model.phase.phase, "select_piece");
        assert_eq!(model.phase.side, Some("blue"));
        assert_eq!(model.result, "ongoing");
        assert!(model.winner.is_none());
    }

    #[test]
    fn test_event_models() {
        let moved = GameEvent::PieceMoved {
            side: Side::Red,
            from: Pos::new(0, 0),
            to: Pos::new(1, 0),
        };
        let model = event_to_model(&moved);
        assert_eq!(model.kind, "moved");
        assert_eq!(model.side, Some("red"));
        assert_eq!(model.from, Some((0, 0)));
        assert_eq!(model.to, Some((1, 0)));

        let over = GameEvent::GameOver { winner: Side::Blue };
        let model = event_to_model(&over);
        assert_eq!(model.kind, "game_over");
        assert_eq!(model.winner, Some("blue"));
    }

    #[test]
    fn test_event_json_omits_absent_fields() {
        let over = GameEvent::GameOver { winner: Side::Blue };
        let json = serde_json::to_value(event_to_model(&over)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "game_over", "winner": "blue"})
        );
    }

    #[test]
    fn test_click_drives_the_session() {
        let mut session = MatchSession::new("Ann".to_string(), "Ben".to_string(), Side::Red);

        // Ignored square: no events, phase unchanged.
        assert!(session.game.select(Pos::new(3, 3)).is_empty());

        session.game.select(Pos::new(0, 0));
        let events = session.game.select(Pos::new(1, 0));
        assert_eq!(events.len(), 1);
        let model = session_to_model(&session);
        assert_eq!(model.phase.side, Some("blue"));
    }
}
