//! Headless client that wanders around the world collecting balls.
//!
//! Useful for load testing and for watching the server without a renderer.
//! It reconnects on a fixed interval whenever the connection drops.

use clap::Parser;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::view::ClientView;
use shared::{FrameReader, FrameWriter, Position, PositionUpdate, ServerMessage, MAX_X};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval, sleep, timeout};

/// The client keeps players a little further from the bottom edge than the server does.
const CLIENT_MAX_Y: i32 = 540;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5555")]
    server: String,

    /// Seconds to wait between reconnection attempts
    #[arg(short = 'r', long, default_value = "5")]
    reconnect_secs: u64,

    /// Seconds to wait for the connection and the welcome message
    #[arg(short = 'c', long, default_value = "5")]
    connect_timeout_secs: u64,

    /// Pixels moved per step
    #[arg(long, default_value = "5")]
    step: i32,

    /// Milliseconds between steps
    #[arg(short = 'm', long, default_value = "50")]
    move_interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    fn random<R: Rng>(rng: &mut R) -> Self {
        match rng.gen_range(0..4) {
            0 => Direction::Left,
            1 => Direction::Right,
            2 => Direction::Up,
            _ => Direction::Down,
        }
    }
}

/// Moves one step, clamped the same way an interactive client clamps input.
fn step_position(position: Position, direction: Direction, step: i32) -> Position {
    let (dx, dy) = match direction {
        Direction::Left => (-step, 0),
        Direction::Right => (step, 0),
        Direction::Up => (0, -step),
        Direction::Down => (0, step),
    };

    Position::new(
        (position.x + dx).clamp(0, MAX_X),
        (position.y + dy).clamp(0, CLIENT_MAX_Y),
    )
}

/// Runs one connection until the server goes away.
async fn play(args: &Args, view: &mut ClientView) -> Result<(), Box<dyn std::error::Error>> {
    let connect_timeout = Duration::from_secs(args.connect_timeout_secs);

    info!("Attempting to connect to {}", args.server);
    let stream = timeout(connect_timeout, TcpStream::connect(&args.server)).await??;
    stream.set_nodelay(true)?;
    let (read_half, write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half, u16::MAX as usize);
    let mut writer = FrameWriter::new(write_half);

    info!("Waiting for initial game state...");
    let frame = timeout(connect_timeout, reader.read_frame())
        .await??
        .ok_or("No initial data received from server")?;
    match ServerMessage::from_json(&frame)? {
        welcome @ ServerMessage::Welcome(_) => view.apply(welcome),
        other => return Err(format!("Expected initial game state, got {:?}", other).into()),
    }
    info!(
        "Connected as player {:?} at ({}, {})",
        view.player_id, view.position.x, view.position.y
    );

    let mut rng = StdRng::from_entropy();
    let mut direction = Direction::random(&mut rng);
    let mut move_timer = interval(Duration::from_millis(args.move_interval_ms));

    loop {
        tokio::select! {
            frame = reader.read_frame() => {
                let Some(frame) = frame? else {
                    return Ok(());
                };

                match ServerMessage::from_json(&frame) {
                    Ok(message) => {
                        let before = view.own_score();
                        view.apply(message);
                        if view.own_score() > before {
                            info!(
                                "Score {} ({} players, {} balls)",
                                view.own_score(),
                                view.players.len(),
                                view.items.len()
                            );
                        }
                    }
                    Err(e) => warn!("Invalid data received: {}", e),
                }
            },

            _ = move_timer.tick() => {
                if rng.gen_bool(0.1) {
                    direction = Direction::random(&mut rng);
                }
                view.position = step_position(view.position, direction, args.step);

                let update = PositionUpdate {
                    x: view.position.x as i64,
                    y: view.position.y as i64,
                };
                debug!("Moving to ({}, {})", update.x, update.y);
                writer.write_frame(&update.to_json()?).await?;
            },
        }
    }
}

async fn run(args: Args) {
    let mut view = ClientView::new();

    loop {
        match play(&args, &mut view).await {
            Ok(()) => info!("Server closed the connection"),
            Err(e) => warn!("Connection failed: {}", e),
        }
        view.disconnect();

        for remaining in (1..=args.reconnect_secs).rev() {
            info!("Reconnecting in {} seconds...", remaining);
            sleep(Duration::from_secs(1)).await;
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    tokio::select! {
        _ = run(args) => {},
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, exiting"),
    }
}
