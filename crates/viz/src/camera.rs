//! Camera: a fixed 2D view centred on the map, with scroll-wheel zoom.

use bevy::input::mouse::MouseWheel;
use bevy::prelude::*;

/// Plugin for the main camera.
pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_camera)
            .add_systems(Update, handle_zoom_input);
    }
}

/// Projection scale limits; larger values show more of the map.
const MIN_SCALE: f32 = 0.25;
const MAX_SCALE: f32 = 4.0;

/// Marker component for the main camera.
#[derive(Component)]
pub struct MainCamera;

/// Apply one scroll step to a projection scale.
pub fn zoom_scale(scale: f32, scroll: f32) -> f32 {
    (scale * (1.0 - scroll * 0.1)).clamp(MIN_SCALE, MAX_SCALE)
}

/// System to set up the camera on startup.
fn setup_camera(mut commands: Commands) {
    // The map is centred on the scene origin.
    commands.spawn((Camera2dBundle::default(), MainCamera));
}

/// System to zoom with the scroll wheel.
fn handle_zoom_input(
    mut scroll: EventReader<MouseWheel>,
    mut projections: Query<&mut OrthographicProjection, With<MainCamera>>,
) {
    let delta: f32 = scroll.read().map(|ev| ev.y).sum();
    if delta == 0.0 {
        return;
    }

    for mut projection in projections.iter_mut() {
        projection.scale = zoom_scale(projection.scale, delta);
    }
}
