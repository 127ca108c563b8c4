//! World rendering: map background, POI labels, and occupancy heat circles.

use bevy::prelude::*;
use std::collections::HashMap;

use view_sync::{world_to_display, DisplayPoint, HeatConfig, MotionConfig};
use world_model::PoiLocation;

use crate::sync_bridge::{SyncBridge, ViewUpdatedEvent, ViewerSettings};

/// Side length of the simulated grid, in world units.
pub const GRID_SIZE: f32 = 25.0;

/// Plugin for world/map rendering.
pub struct WorldPlugin;

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MapLayout>()
            .init_resource::<PoiLabels>()
            .add_systems(Startup, spawn_map_background)
            .add_systems(
                Update,
                (
                    update_poi_labels.run_if(on_event::<ViewUpdatedEvent>()),
                    draw_poi_heat,
                ),
            );
    }
}

/// Maps display coordinates onto the scene.
///
/// Display space has its origin at the top-left corner of the map with y
/// growing downward. The scene is centred on the map with y growing upward.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct MapLayout {
    /// Display units per world unit.
    pub world_scale: f32,
}

impl FromWorld for MapLayout {
    fn from_world(world: &mut World) -> Self {
        let world_scale = world
            .get_resource::<ViewerSettings>()
            .map(|settings| settings.config.motion.world_scale)
            .unwrap_or(MotionConfig::default().world_scale);
        Self { world_scale }
    }
}

impl MapLayout {
    pub fn new(world_scale: f32) -> Self {
        Self { world_scale }
    }

    /// Side length of the map in display units.
    pub fn display_size(&self) -> f32 {
        GRID_SIZE * self.world_scale
    }

    pub fn to_scene(&self, point: DisplayPoint) -> Vec2 {
        let half = self.display_size() / 2.0;
        Vec2::new(point.x - half, half - point.y)
    }

    pub fn to_display(&self, scene: Vec2) -> DisplayPoint {
        let half = self.display_size() / 2.0;
        DisplayPoint::new(scene.x + half, half - scene.y)
    }

    /// Scene position of a POI given in world units.
    pub fn poi_position(&self, location: PoiLocation) -> Vec2 {
        self.to_scene(world_to_display(location.x(), location.y(), self.world_scale))
    }
}

/// Resource mapping POI names to their label entities.
#[derive(Resource, Default)]
pub struct PoiLabels {
    pub map: HashMap<String, Entity>,
}

/// Component for POI label text.
#[derive(Component)]
pub struct PoiLabel {
    pub poi: String,
}

/// Marker component for the map background.
#[derive(Component)]
pub struct MapBackground;

/// Heat circle tint; opacity comes from the heat level.
pub fn heat_color(opacity: f32) -> Color {
    Color::srgba(0.95, 0.35, 0.2, opacity)
}

/// System to spawn the map background.
fn spawn_map_background(mut commands: Commands, layout: Res<MapLayout>) {
    let size = layout.display_size();
    commands.spawn((
        SpriteBundle {
            sprite: Sprite {
                color: Color::srgb(0.18, 0.22, 0.2),
                custom_size: Some(Vec2::splat(size)),
                ..default()
            },
            transform: Transform::from_xyz(0.0, 0.0, -10.0),
            ..default()
        },
        MapBackground,
    ));

    tracing::info!("Spawned {}x{} map background", size, size);
}

/// System to keep one label per POI in the latest snapshot.
fn update_poi_labels(
    mut commands: Commands,
    bridge: Option<Res<SyncBridge>>,
    layout: Res<MapLayout>,
    mut labels: ResMut<PoiLabels>,
    mut transforms: Query<&mut Transform, With<PoiLabel>>,
) {
    let Some(world) = bridge.and_then(|b| b.view().world()) else {
        return;
    };

    labels.map.retain(|name, entity| {
        let keep = world.pois.contains_key(name);
        if !keep {
            commands.entity(*entity).despawn_recursive();
        }
        keep
    });

    for (name, location) in &world.pois {
        let position = layout.poi_position(*location) + Vec2::new(0.0, -18.0);

        if let Some(&entity) = labels.map.get(name) {
            if let Ok(mut transform) = transforms.get_mut(entity) {
                transform.translation = position.extend(transform.translation.z);
            }
            continue;
        }

        let entity = commands
            .spawn((
                Text2dBundle {
                    text: Text::from_section(
                        name.clone(),
                        TextStyle {
                            font_size: 14.0,
                            color: Color::srgb(0.9, 0.9, 0.85),
                            ..default()
                        },
                    ),
                    transform: Transform::from_translation(position.extend(3.0)),
                    ..default()
                },
                PoiLabel { poi: name.clone() },
            ))
            .id();
        labels.map.insert(name.clone(), entity);
    }
}

/// Draw a heat circle per POI every frame, sized and tinted by occupancy.
fn draw_poi_heat(
    bridge: Option<Res<SyncBridge>>,
    settings: Res<ViewerSettings>,
    layout: Res<MapLayout>,
    mut gizmos: Gizmos,
) {
    let Some(bridge) = bridge else {
        return;
    };
    let frame = bridge.view().frame();
    let Some(resolver) = frame.occupancy() else {
        return;
    };

    let heat: &HeatConfig = &settings.config.heat;
    for (_, location, level) in resolver.heat_map(heat) {
        let center = layout.poi_position(location);
        gizmos.circle_2d(center, level.radius, heat_color(level.opacity));
        gizmos.circle_2d(center, 3.0, Color::srgb(0.95, 0.95, 0.9));
    }
}
