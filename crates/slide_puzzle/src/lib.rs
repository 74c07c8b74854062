use bevy::prelude::*;
use puzzle_helpers::WINDOW_WIDTH;

mod board;
mod gameplay;

pub use board::{BoardError, BoardLayout, PuzzleBoard};
use gameplay::GameplayPlugin;

#[derive(States, Default, Debug, Clone, PartialEq, Eq, Hash)]
enum GameState {
    /// Waiting for the puzzle image and spawning the board.
    #[default]
    Init,
    /// Board is laid out solved; the shuffle timer is running.
    Settle,
    Playing,
    Result,
    /// Terminal state after a fatal configuration error.
    Failed,
}

/// Construction-time configuration, inserted before the app runs.
#[derive(Resource, Debug, Clone)]
pub struct PuzzleConfig {
    /// Number of tile columns (along the board width), at least 3.
    pub columns: usize,
    /// Number of tile rows (along the board height), at least 3.
    pub rows: usize,
    /// Seconds to wait before the one-time shuffle.
    pub shuffle_delay: f32,
    /// Gap between neighbouring cells, in world units.
    pub spacing: f32,
    /// Asset path of the picture to slice into tiles.
    pub image: String,
    /// Board bounds in world space. `None` means no bounds were wired up,
    /// which is a fatal configuration error.
    pub area: Option<Rect>,
    /// Fixed RNG seed for a reproducible shuffle.
    pub seed: Option<u64>,
}

impl Default for PuzzleConfig {
    fn default() -> Self {
        let side = WINDOW_WIDTH - 20.0;
        Self {
            columns: 3,
            rows: 3,
            shuffle_delay: 2.0,
            spacing: 0.1,
            image: "puzzle.jpg".to_string(),
            area: Some(Rect::from_center_size(Vec2::ZERO, Vec2::splat(side))),
            seed: None,
        }
    }
}

/// Fired once, right after the initial randomization of the board.
#[derive(Event, Debug, Default, Clone, Copy)]
pub struct ShuffleComplete;

/// Fired when a pointer release leaves the board solved.
#[derive(Event, Debug, Default, Clone, Copy)]
pub struct StageClear;

pub fn run() {
    puzzle_helpers::get_default_app(env!("CARGO_PKG_NAME"))
        .init_state::<GameState>()
        .init_resource::<PuzzleConfig>()
        .add_event::<ShuffleComplete>()
        .add_event::<StageClear>()
        .add_plugins(GameplayPlugin)
        .add_systems(Startup, setup)
        .add_systems(Update, log_signals)
        .run();
}

fn setup(mut commands: Commands) {
    commands.spawn(Camera2d);
}

// Stand-in for the downstream game logic that consumes board signals.
fn log_signals(
    mut shuffle_events: EventReader<ShuffleComplete>,
    mut clear_events: EventReader<StageClear>,
) {
    for _ in shuffle_events.read() {
        info!("shuffle complete");
    }
    for _ in clear_events.read() {
        info!("stage clear");
    }
}
