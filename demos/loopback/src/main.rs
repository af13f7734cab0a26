//! Plays a short tic-tac-toe exchange with itself over localhost.
//!
//! Moves and boards travel over a reliable TCP [`ObjectStream`]; cursor
//! positions travel over an unreliable UDP [`DatagramChannel`]. Run with
//! `RUST_LOG=debug` to watch descriptors being cached and acknowledged.
//!
//! Set `TESSERA_CONFIG` to a JSON document to override stream settings,
//! e.g. `TESSERA_CONFIG='{"initial_capacity": 256}'`.

use std::sync::Arc;

use tessera::prelude::*;
use tokio::net::{TcpListener, UdpSocket};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Game types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Cell {
    #[default]
    Empty,
    X,
    O,
}

impl Streamable for Cell {
    const TYPE_NAME: &'static str = "ttt.Cell";

    fn write_payload(&self, out: &mut ObjectWriter<'_>) -> Result<(), ProtocolError> {
        let tag = match self {
            Cell::Empty => 0,
            Cell::X => 1,
            Cell::O => 2,
        };
        out.sink().write_u8(tag);
        Ok(())
    }

    fn read_payload(input: &mut ObjectReader<'_, '_>) -> Result<Self, ProtocolError> {
        match input.source().read_u8()? {
            0 => Ok(Cell::Empty),
            1 => Ok(Cell::X),
            2 => Ok(Cell::O),
            other => Err(ProtocolError::InvalidMessage(format!("bad cell {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
struct Move {
    player: String,
    row: u8,
    col: u8,
}

streamable! { Move = "ttt.Move" { #[intern] player, row, col } }

#[derive(Debug, Clone, Default)]
struct Board {
    cells: Vec<Cell>,
    turn: u8,
    winner: Option<String>,
    // Local bookkeeping, never sent.
    moves_applied: u32,
}

streamable! { Board = "ttt.Board" { cells, turn, #[intern] winner } skip { moves_applied } }

#[derive(Debug, Clone)]
struct Cursor {
    player: String,
    x: f32,
    y: f32,
}

streamable! { Cursor = "ttt.Cursor" { #[intern] player, x, y } }

fn registry() -> Result<Arc<Registry>, ProtocolError> {
    let mut registry = Registry::with_basic_types();
    registry.register::<Cell>()?;
    registry.register::<Move>()?;
    registry.register::<Board>()?;
    registry.register::<Cursor>()?;
    Ok(Arc::new(registry))
}

// ---------------------------------------------------------------------------
// Game logic
// ---------------------------------------------------------------------------

const PLAYERS: [&str; 2] = ["alice", "bob"];

impl Board {
    fn new() -> Self {
        Self {
            cells: vec![Cell::Empty; 9],
            ..Self::default()
        }
    }

    fn apply(&mut self, mv: &Move) -> Result<(), String> {
        if self.winner.is_some() {
            return Err("game is over".into());
        }
        if mv.player != PLAYERS[usize::from(self.turn)] {
            return Err(format!("not {}'s turn", mv.player));
        }
        let index = usize::from(mv.row) * 3 + usize::from(mv.col);
        match self.cells.get(index) {
            Some(Cell::Empty) => {}
            Some(_) => return Err("cell is occupied".into()),
            None => return Err("row and col must be 0-2".into()),
        }

        let mark = if self.turn == 0 { Cell::X } else { Cell::O };
        self.cells[index] = mark;
        self.moves_applied += 1;
        if self.has_line(mark) {
            self.winner = Some(mv.player.clone());
        } else {
            self.turn = 1 - self.turn;
        }
        Ok(())
    }

    fn has_line(&self, m: Cell) -> bool {
        const LINES: [[usize; 3]; 8] = [
            [0, 1, 2], [3, 4, 5], [6, 7, 8], // rows
            [0, 3, 6], [1, 4, 7], [2, 5, 8], // cols
            [0, 4, 8], [2, 4, 6],            // diagonals
        ];
        LINES.iter().any(|line| line.iter().all(|&i| self.cells[i] == m))
    }
}

// ---------------------------------------------------------------------------
// Reliable channel
// ---------------------------------------------------------------------------

async fn serve(listener: TcpListener, registry: Arc<Registry>, config: StreamConfig) -> Result<(), TesseraError> {
    let (socket, peer) = listener.accept().await?;
    info!(%peer, "player connected");
    let mut stream = ObjectStream::with_config(socket, registry, &config);
    let mut board = Board::new();

    while let Some(object) = stream.recv().await? {
        let Some(mv) = object.downcast_ref::<Move>() else {
            info!(kind = object.type_name(), "ignoring unexpected object");
            continue;
        };
        if let Err(reason) = board.apply(mv) {
            info!(player = %mv.player, %reason, "move rejected");
        }
        stream.send(&board).await?;
    }
    info!(moves = board.moves_applied, "player left");
    Ok(())
}

async fn play(registry: Arc<Registry>, config: &StreamConfig) -> Result<(), TesseraError> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = tokio::spawn(serve(listener, Arc::clone(&registry), config.clone()));

    let socket = tokio::net::TcpStream::connect(addr).await?;
    let mut stream = ObjectStream::with_config(socket, registry, config);

    // X takes the top row while O plays the middle.
    let script = [(0, 0, 0), (1, 1, 0), (0, 0, 1), (1, 1, 1), (0, 0, 2)];
    for (player, row, col) in script {
        let mv = Move {
            player: PLAYERS[player].to_string(),
            row,
            col,
        };
        stream.send(&mv).await?;
        let Some(reply) = stream.recv().await? else {
            break;
        };
        if let Some(board) = reply.downcast_ref::<Board>() {
            info!(row, col, player = %mv.player, board = ?board.cells, "board updated");
            if let Some(winner) = &board.winner {
                info!(%winner, "game over");
            }
        }
    }

    let codes = PLAYERS
        .iter()
        .filter_map(|p| stream.encoder().intern_mapping(p).map(|m| m.code))
        .collect::<Vec<_>>();
    info!(?codes, "player names were sent once each");

    drop(stream);
    match server.await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(error = %err, "server task failed");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Unreliable channel
// ---------------------------------------------------------------------------

async fn wiggle(registry: Arc<Registry>) -> Result<(), TesseraError> {
    let a = UdpSocket::bind("127.0.0.1:0").await?;
    let b = UdpSocket::bind("127.0.0.1:0").await?;
    a.connect(b.local_addr()?).await?;
    b.connect(a.local_addr()?).await?;
    let mut alice = DatagramChannel::new(a, Arc::clone(&registry));
    let mut bob = DatagramChannel::new(b, registry);

    for step in 0..4u8 {
        let cursor = Cursor {
            player: PLAYERS[0].into(),
            x: f32::from(step) * 0.25,
            y: 0.5,
        };
        let seq = alice.send(&cursor).await?;
        if let Some(object) = bob.recv().await? {
            info!(seq, cursor = ?object, "cursor received");
        }

        // Bob's echo carries the acknowledgment back to Alice.
        let echo = Cursor {
            player: PLAYERS[1].into(),
            x: 1.0 - cursor.x,
            y: cursor.y,
        };
        bob.send(&echo).await?;
        alice.recv().await?;

        let confirmed = alice
            .sequencer()
            .encoder()
            .mapping(Cursor::TYPE_NAME)
            .is_some_and(|m| m.confirmed);
        info!(step, confirmed, "cursor type mapping");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::var("TESSERA_CONFIG") {
        Ok(json) => StreamConfig::from_json(&json)?,
        Err(_) => StreamConfig::default(),
    };
    let registry = registry()?;
    info!(types = registry.len(), "registry ready");

    play(Arc::clone(&registry), &config).await?;
    wiggle(registry).await?;
    Ok(())
}
