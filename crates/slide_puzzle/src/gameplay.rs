use bevy::prelude::*;
use puzzle_helpers::input::{just_pressed_world_position, pressed_world_position};

use crate::board::{BoardLayout, PuzzleBoard};
use crate::{GameState, PuzzleConfig, ShuffleComplete, StageClear};

const TILE_Z: f32 = 0.0;
const DRAG_Z: f32 = 1.0;
const FRAME_MARGIN: f32 = 8.0;

/// Marker for a tile sprite. The id doubles as the tile's home slot.
#[derive(Component)]
pub struct Tile {
    pub id: usize,
}

#[derive(Resource)]
struct PuzzleImage(Handle<Image>);

#[derive(Resource)]
struct ShuffleTimer(Timer);

#[derive(Resource)]
struct ShuffleRng(fastrand::Rng);

/// `None` while idle; `Some` from pointer-down to pointer-up.
#[derive(Resource, Default)]
struct DragState(Option<DragGesture>);

struct DragGesture {
    tile: usize,
    entity: Entity,
    /// Tile position when the gesture started; the tile snaps back here
    /// on release no matter what happened in between.
    tile_start: Vec2,
    pointer_start: Vec2,
}

pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DragState>()
            .add_systems(Startup, init_board)
            .add_systems(OnEnter(GameState::Result), spawn_clear_banner)
            .add_systems(
                Update,
                (
                    spawn_tiles.run_if(in_state(GameState::Init)),
                    run_shuffle.run_if(in_state(GameState::Settle)),
                    (begin_drag, drag_tile, end_drag)
                        .chain()
                        .run_if(in_state(GameState::Playing)),
                ),
            );
    }
}

/// Validates the configuration and kicks off the image load. Either
/// fatal error is reported once and leaves the game in `Failed` with
/// nothing spawned.
fn init_board(
    mut commands: Commands,
    config: Res<PuzzleConfig>,
    asset_server: Res<AssetServer>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let layout = match BoardLayout::build(config.area, config.columns, config.rows, config.spacing)
    {
        Ok(layout) => layout,
        Err(err) => {
            error!("puzzle setup failed: {err}");
            next_state.set(GameState::Failed);
            return;
        }
    };

    let rng = config
        .seed
        .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);

    commands.insert_resource(PuzzleImage(asset_server.load(config.image.clone())));
    commands.insert_resource(ShuffleRng(rng));
    commands.insert_resource(layout);
}

/// Waits for the puzzle image, then builds the board in its solved
/// arrangement: one sprite per slot showing the matching image slice,
/// scaled to fill its cell exactly.
fn spawn_tiles(
    mut commands: Commands,
    config: Res<PuzzleConfig>,
    layout: Option<Res<BoardLayout>>,
    image: Option<Res<PuzzleImage>>,
    images: Res<Assets<Image>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let (Some(layout), Some(image)) = (layout, image) else {
        return;
    };
    let Some(image_size) = images.get(&image.0).map(Image::size_f32) else {
        return;
    };

    // Backdrop behind the tiles, slightly larger than the board.
    if let Some(area) = config.area {
        commands.spawn((
            Sprite::from_color(Color::WHITE, area.size() + Vec2::splat(FRAME_MARGIN)),
            Transform::from_translation(area.center().extend(-10.0)),
        ));
    }

    for slot in 0..layout.slot_count() {
        let (Some(center), Some(rect)) = (
            layout.slot_center(slot),
            layout.image_rect(slot, image_size),
        ) else {
            continue;
        };
        commands.spawn((
            Sprite {
                image: image.0.clone(),
                rect: Some(rect),
                custom_size: Some(layout.cell()),
                ..default()
            },
            Tile { id: slot },
            Transform::from_translation(center.extend(TILE_Z)),
        ));
    }

    commands.insert_resource(PuzzleBoard::from_layout(&layout));
    commands.insert_resource(ShuffleTimer(Timer::from_seconds(
        config.shuffle_delay,
        TimerMode::Once,
    )));
    next_state.set(GameState::Settle);
}

/// One-shot scheduler: after the configured delay, randomize the board
/// once, park every sprite on its new slot and announce completion.
fn run_shuffle(
    time: Res<Time>,
    mut timer: ResMut<ShuffleTimer>,
    mut board: ResMut<PuzzleBoard>,
    mut rng: ResMut<ShuffleRng>,
    mut tiles: Query<(&Tile, &mut Transform)>,
    mut shuffle_events: EventWriter<ShuffleComplete>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if !timer.0.tick(time.delta()).just_finished() {
        return;
    }

    board.shuffle(&mut rng.0);
    info!("shuffled board:\n{}", *board);

    for (tile, mut transform) in &mut tiles {
        if let Some(position) = board.tile_position(tile.id) {
            transform.translation = position.extend(TILE_Z);
        }
    }

    shuffle_events.send(ShuffleComplete);
    next_state.set(GameState::Playing);
}

fn begin_drag(
    windows: Query<&Window>,
    mouse_input: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    camera: Query<(&Camera, &GlobalTransform)>,
    board: Res<PuzzleBoard>,
    tiles: Query<(Entity, &Tile, &Transform)>,
    mut drag: ResMut<DragState>,
) {
    if drag.0.is_some() {
        return;
    }
    let Some(world_position) =
        just_pressed_world_position(&mouse_input, &touch_input, &windows, &camera)
    else {
        return;
    };

    for (entity, tile, transform) in &tiles {
        let tile_start = transform.translation.truncate();
        let rect = Rect::from_center_size(tile_start, board.cell());
        if rect.contains(world_position) {
            drag.0 = Some(DragGesture {
                tile: tile.id,
                entity,
                tile_start,
                pointer_start: world_position,
            });
            break;
        }
    }
}

/// Per-frame while held: the dragged sprite follows the pointer, and the
/// first slot whose occupant comes within half a cell width gets swapped
/// with the dragged tile. At most one swap per frame; the swap is the
/// only operation that changes board state.
fn drag_tile(
    windows: Query<&Window>,
    mouse_input: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    camera: Query<(&Camera, &GlobalTransform)>,
    mut board: ResMut<PuzzleBoard>,
    mut tiles: Query<(&Tile, &mut Transform)>,
    drag: Res<DragState>,
) {
    let Some(gesture) = &drag.0 else {
        return;
    };
    let Some(pointer) = pressed_world_position(&mouse_input, &touch_input, &windows, &camera)
    else {
        return;
    };

    let dragged_position = gesture.tile_start + (pointer - gesture.pointer_start);
    if let Ok((_, mut transform)) = tiles.get_mut(gesture.entity) {
        transform.translation = dragged_position.extend(DRAG_Z);
    }

    let Some(dragged_slot) = board.slot_of_tile(gesture.tile) else {
        return;
    };
    let Some(target_slot) = board.find_swap_target(dragged_slot, dragged_position) else {
        return;
    };

    board.swap_slots(dragged_slot, target_slot);

    // Only the displaced tile moves on screen; the dragged sprite keeps
    // following the pointer until release.
    let Some(other) = board.tile_at(dragged_slot) else {
        return;
    };
    for (tile, mut transform) in &mut tiles {
        if tile.id == other {
            if let Some(position) = board.tile_position(other) {
                transform.translation = position.extend(TILE_Z);
            }
            break;
        }
    }
}

/// True when the pointer went away this frame. A cancelled touch (the
/// OS reclaimed the pointer) ends the gesture like a release, so a
/// stale gesture can never pin the drag state.
fn pointer_finished(mouse_input: &ButtonInput<MouseButton>, touch_input: &Touches) -> bool {
    mouse_input.just_released(MouseButton::Left)
        || touch_input.any_just_released()
        || touch_input.any_just_canceled()
}

/// Pointer-up: the dragged sprite snaps back to where the gesture
/// started, even after a successful swap (the swap already moved the
/// authoritative state), then the board is checked for completion.
fn end_drag(
    mouse_input: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    board: Res<PuzzleBoard>,
    mut tiles: Query<(&Tile, &mut Transform)>,
    mut drag: ResMut<DragState>,
    mut clear_events: EventWriter<StageClear>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if !pointer_finished(&mouse_input, &touch_input) {
        return;
    }
    let Some(gesture) = drag.0.take() else {
        return;
    };

    if let Ok((_, mut transform)) = tiles.get_mut(gesture.entity) {
        transform.translation = gesture.tile_start.extend(TILE_Z);
    }

    if board.is_solved() {
        clear_events.send(StageClear);
        next_state.set(GameState::Result);
    }
}

fn spawn_clear_banner(mut commands: Commands) {
    commands.spawn((
        Text2d::new("Stage Clear!"),
        TextFont {
            font_size: 48.0,
            ..default()
        },
        TextColor(Color::WHITE),
        TextLayout::new_with_justify(JustifyText::Center),
        Transform::from_xyz(0.0, 240.0, 10.0),
    ));
}

#[cfg(test)]
mod tests {
    use bevy::input::InputPlugin;
    use bevy::input::touch::{TouchInput, TouchPhase};

    use super::*;

    fn touch_event(phase: TouchPhase) -> TouchInput {
        TouchInput {
            phase,
            position: Vec2::ZERO,
            window: Entity::PLACEHOLDER,
            force: None,
            id: 7,
        }
    }

    fn pointer_finished_now(app: &App) -> bool {
        pointer_finished(
            app.world().resource::<ButtonInput<MouseButton>>(),
            app.world().resource::<Touches>(),
        )
    }

    #[test]
    fn cancelled_touch_ends_the_gesture() {
        let mut app = App::new();
        app.add_plugins(InputPlugin);

        app.world_mut().send_event(touch_event(TouchPhase::Started));
        app.update();
        assert!(!pointer_finished_now(&app), "a held touch keeps the gesture");

        app.world_mut().send_event(touch_event(TouchPhase::Canceled));
        app.update();
        assert!(pointer_finished_now(&app), "a cancelled touch releases it");
    }

    #[test]
    fn released_touch_ends_the_gesture() {
        let mut app = App::new();
        app.add_plugins(InputPlugin);

        app.world_mut().send_event(touch_event(TouchPhase::Started));
        app.update();
        app.world_mut().send_event(touch_event(TouchPhase::Ended));
        app.update();
        assert!(pointer_finished_now(&app), "a lifted touch releases it");
    }
}
