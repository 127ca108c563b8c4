//! Agent rendering: sprites, movement, and selection.

use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use std::collections::HashMap;

use view_sync::{DisplayPoint, MotionConfig, Reconciler};
use world_model::AgentKind;

use crate::camera::MainCamera;
use crate::sync_bridge::{SyncBridge, ViewUpdatedEvent, ViewerSettings};
use crate::world::MapLayout;

/// Sprite edge length in scene units.
const AGENT_SIZE: f32 = 12.0;
const SELECTED_AGENT_SIZE: f32 = 18.0;

/// Clicks further than this from every agent clear nothing and select nothing.
const PICK_RADIUS: f32 = 15.0;

/// Plugin for agent rendering and interaction.
pub struct AgentPlugin;

impl Plugin for AgentPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AgentEntities>()
            .init_resource::<AgentMotion>()
            .init_resource::<MapLayout>()
            .add_systems(
                Update,
                (
                    sync_agents_with_state.run_if(on_event::<ViewUpdatedEvent>()),
                    animate_agents,
                    select_agent_on_click,
                    highlight_selected_agent,
                )
                    .chain(),
            );
    }
}

/// Component for visual representation of an agent.
#[derive(Component)]
pub struct VisualAgent {
    pub agent_id: String,
    pub kind: AgentKind,
}

/// Resource mapping agent IDs to their entities.
#[derive(Resource, Default)]
pub struct AgentEntities {
    pub map: HashMap<String, Entity>,
}

impl AgentEntities {
    pub fn get(&self, agent_id: &str) -> Option<Entity> {
        self.map.get(agent_id).copied()
    }

    pub fn insert(&mut self, agent_id: impl Into<String>, entity: Entity) {
        self.map.insert(agent_id.into(), entity);
    }

    pub fn remove(&mut self, agent_id: &str) -> Option<Entity> {
        self.map.remove(agent_id)
    }
}

/// Displayed agent positions, eased toward the latest snapshot each frame.
#[derive(Resource, Debug, Deref, DerefMut)]
pub struct AgentMotion(pub Reconciler);

impl FromWorld for AgentMotion {
    fn from_world(world: &mut World) -> Self {
        let motion = world
            .get_resource::<ViewerSettings>()
            .map(|settings| settings.config.motion)
            .unwrap_or_else(MotionConfig::default);
        Self(Reconciler::new(motion))
    }
}

/// Sprite colour for an agent kind.
pub fn kind_color(kind: AgentKind) -> Color {
    match kind {
        AgentKind::Student => Color::srgb(0.3, 0.6, 0.95),
        AgentKind::Professor => Color::srgb(0.7, 0.4, 0.9),
        AgentKind::Vendor => Color::srgb(0.95, 0.65, 0.2),
        AgentKind::Other => Color::srgb(0.7, 0.7, 0.7),
    }
}

/// The agent closest to `point`, if any lies within `radius` display units.
pub fn pick_agent<'a>(
    positions: impl IntoIterator<Item = (&'a str, DisplayPoint)>,
    point: DisplayPoint,
    radius: f32,
) -> Option<&'a str> {
    positions
        .into_iter()
        .map(|(id, p)| (id, (p.x - point.x).hypot(p.y - point.y)))
        .filter(|(_, distance)| *distance <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

/// System to synchronize visual agents with the latest snapshot.
fn sync_agents_with_state(
    mut commands: Commands,
    bridge: Option<Res<SyncBridge>>,
    layout: Res<MapLayout>,
    mut motion: ResMut<AgentMotion>,
    mut agent_entities: ResMut<AgentEntities>,
    mut agents: Query<(&mut VisualAgent, &mut Sprite)>,
) {
    let Some(world) = bridge.and_then(|b| b.view().world()) else {
        return;
    };

    motion.observe(&world);

    // Remove agents that are no longer in the snapshot
    agent_entities.map.retain(|agent_id, entity| {
        let keep = world.contains_agent(agent_id);
        if !keep {
            commands.entity(*entity).despawn_recursive();
        }
        keep
    });

    for agent in &world.agents {
        if let Some(entity) = agent_entities.get(&agent.id) {
            if let Ok((mut visual, mut sprite)) = agents.get_mut(entity) {
                if visual.kind != agent.kind {
                    visual.kind = agent.kind;
                    sprite.color = kind_color(agent.kind);
                }
            }
            continue;
        }

        let position = motion
            .position(&agent.id)
            .map(|p| layout.to_scene(p))
            .unwrap_or_default();
        let entity = spawn_agent(&mut commands, &agent.id, agent.kind, position);
        agent_entities.insert(agent.id.clone(), entity);
    }
}

/// Spawn a new visual agent entity.
fn spawn_agent(commands: &mut Commands, agent_id: &str, kind: AgentKind, position: Vec2) -> Entity {
    commands
        .spawn((
            SpriteBundle {
                sprite: Sprite {
                    color: kind_color(kind),
                    custom_size: Some(Vec2::splat(AGENT_SIZE)),
                    ..default()
                },
                transform: Transform::from_xyz(position.x, position.y, 1.0),
                ..default()
            },
            VisualAgent {
                agent_id: agent_id.to_string(),
                kind,
            },
        ))
        .id()
}

/// System to advance displayed positions one frame and move the sprites.
fn animate_agents(
    bridge: Option<Res<SyncBridge>>,
    layout: Res<MapLayout>,
    mut motion: ResMut<AgentMotion>,
    mut agents: Query<(&mut Transform, &VisualAgent)>,
) {
    let Some(world) = bridge.and_then(|b| b.view().world()) else {
        return;
    };

    if motion.step(&world) == 0 {
        return;
    }

    for (mut transform, agent) in agents.iter_mut() {
        if let Some(point) = motion.position(&agent.agent_id) {
            transform.translation = layout.to_scene(point).extend(transform.translation.z);
        }
    }
}

/// System to select the agent under the cursor, or clear the selection.
fn select_agent_on_click(
    mouse_button: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    bridge: Option<Res<SyncBridge>>,
    layout: Res<MapLayout>,
    motion: Res<AgentMotion>,
    windows: Query<&Window, With<PrimaryWindow>>,
    camera_query: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
) {
    let Some(bridge) = bridge else {
        return;
    };

    if keyboard.just_pressed(KeyCode::Escape) {
        bridge.view().select(None);
        return;
    }

    if !mouse_button.just_pressed(MouseButton::Left) {
        return;
    }

    let Ok(window) = windows.get_single() else {
        return;
    };
    let Some(cursor_pos) = window.cursor_position() else {
        return;
    };
    let Ok((camera, camera_transform)) = camera_query.get_single() else {
        return;
    };
    let Some(scene_pos) = camera.viewport_to_world_2d(camera_transform, cursor_pos) else {
        return;
    };

    let point = layout.to_display(scene_pos);
    if let Some(agent_id) = pick_agent(motion.iter(), point, PICK_RADIUS) {
        tracing::info!("Selected agent {}", agent_id);
        bridge.view().select(Some(agent_id.to_string()));
    }
}

/// System to enlarge the selected agent's sprite.
fn highlight_selected_agent(
    bridge: Option<Res<SyncBridge>>,
    mut agents: Query<(&VisualAgent, &mut Sprite, &mut Transform)>,
) {
    let Some(bridge) = bridge else {
        return;
    };
    let selected = bridge.view().selected_id();

    for (agent, mut sprite, mut transform) in agents.iter_mut() {
        let is_selected = selected.as_deref() == Some(agent.agent_id.as_str());
        let size = if is_selected {
            SELECTED_AGENT_SIZE
        } else {
            AGENT_SIZE
        };
        if sprite.custom_size != Some(Vec2::splat(size)) {
            sprite.custom_size = Some(Vec2::splat(size));
        }
        transform.translation.z = if is_selected { 2.0 } else { 1.0 };
    }
}
