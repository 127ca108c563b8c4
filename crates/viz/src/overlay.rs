//! UI overlays: status bar, notice line, agent detail panel, and the
//! keyboard controls that drive the scheduler.

use bevy::prelude::*;

use view_sync::{SelectedAgent, SyncError};
use world_model::StatsRecord;

use crate::sync_bridge::{Notice, SyncBridge, ViewerSettings};

/// Plugin for UI overlay rendering.
pub struct OverlayPlugin;

impl Plugin for OverlayPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_overlay).add_systems(
            Update,
            (handle_sync_controls, update_status_bar, update_detail_panel).chain(),
        );
    }
}

/// Marker for the status bar text.
#[derive(Component)]
pub struct StatusText;

/// Marker for the notice line text.
#[derive(Component)]
pub struct NoticeText;

/// Marker for the detail panel container.
#[derive(Component)]
pub struct DetailPanel;

/// Marker for the detail panel text.
#[derive(Component)]
pub struct DetailText;

const HELP: &str = "Space pause/resume | N step | T think | B batch | E export | R refresh | Esc deselect";

/// One-line summary of the run state and the latest statistics.
pub fn status_line(running: bool, stat: Option<&StatsRecord>, agents: usize, peak: u32) -> String {
    let state = if running { "RUNNING" } else { "PAUSED" };
    match stat {
        Some(stat) => format!(
            "{} | tick {} | hour {:02}:00 | agents {} | peak {}",
            state, stat.tick, stat.hour, agents, peak
        ),
        None => format!("{} | no ticks yet | agents {} | peak {}", state, agents, peak),
    }
}

/// Multi-line description of the selected agent, memory most recent first.
pub fn detail_lines(selected: &SelectedAgent) -> Vec<String> {
    let agent = &selected.agent;
    let mut lines = vec![
        format!("{} ({})", agent.id, agent.kind.as_str()),
        format!("Position: {}, {}", agent.x, agent.y),
    ];

    if !agent.personality.is_empty() {
        lines.push(format!("Personality: {}", agent.personality));
    }

    if agent.goals.is_empty() {
        lines.push("Goals: none".to_string());
    } else {
        lines.push(format!("Goals: {}", agent.goals.join(", ")));
    }

    lines.push("Memory:".to_string());
    let mut recent = agent.recent_memory().peekable();
    if recent.peek().is_none() {
        lines.push("  (empty)".to_string());
    }
    lines.extend(recent.map(|entry| format!("  {}", entry)));

    match &selected.decision {
        Some(decision) => {
            lines.push(format!("Thought: {}", decision.thought));
            lines.push(format!("Action: {}", decision.action));
            if let Some(memory) = &decision.memory {
                lines.push(format!("Remembers: {}", memory));
            }
        }
        None => lines.push("Press T to ask what they think".to_string()),
    }

    lines
}

/// System to set up the status bar and detail panel.
fn setup_overlay(mut commands: Commands) {
    // Status bar (top)
    commands
        .spawn(NodeBundle {
            style: Style {
                position_type: PositionType::Absolute,
                top: Val::Px(0.0),
                left: Val::Px(0.0),
                right: Val::Px(0.0),
                padding: UiRect::all(Val::Px(8.0)),
                flex_direction: FlexDirection::Column,
                ..default()
            },
            background_color: Color::srgba(0.0, 0.0, 0.0, 0.7).into(),
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((
                TextBundle::from_section(
                    "Connecting...",
                    TextStyle {
                        font_size: 16.0,
                        color: Color::srgb(0.95, 0.95, 0.95),
                        ..default()
                    },
                ),
                StatusText,
            ));
            parent.spawn((
                TextBundle::from_section(
                    HELP,
                    TextStyle {
                        font_size: 12.0,
                        color: Color::srgb(0.9, 0.8, 0.4),
                        ..default()
                    },
                ),
                NoticeText,
            ));
        });

    // Detail panel (right)
    commands
        .spawn((
            NodeBundle {
                style: Style {
                    position_type: PositionType::Absolute,
                    top: Val::Px(60.0),
                    right: Val::Px(10.0),
                    width: Val::Px(300.0),
                    padding: UiRect::all(Val::Px(10.0)),
                    flex_direction: FlexDirection::Column,
                    ..default()
                },
                background_color: Color::srgba(0.0, 0.0, 0.0, 0.8).into(),
                visibility: Visibility::Hidden,
                ..default()
            },
            DetailPanel,
        ))
        .with_children(|parent| {
            parent.spawn((
                TextBundle::from_section(
                    "",
                    TextStyle {
                        font_size: 13.0,
                        color: Color::srgb(0.85, 0.85, 0.85),
                        ..default()
                    },
                ),
                DetailText,
            ));
        });
}

/// System to turn key presses into scheduler commands.
fn handle_sync_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    bridge: Option<Res<SyncBridge>>,
    settings: Res<ViewerSettings>,
    mut notice: ResMut<Notice>,
) {
    let Some(bridge) = bridge else {
        return;
    };
    let handle = bridge.handle();

    let mut sent: Vec<Result<(), SyncError>> = Vec::new();

    if keyboard.just_pressed(KeyCode::Space) {
        sent.push(handle.toggle_running());
    }
    if keyboard.just_pressed(KeyCode::KeyN) {
        sent.push(handle.step());
    }
    if keyboard.just_pressed(KeyCode::KeyR) {
        sent.push(handle.refresh());
    }
    if keyboard.just_pressed(KeyCode::KeyT) {
        match bridge.view().selected_id() {
            Some(agent_id) => {
                notice.set(format!("Asking {}...", agent_id));
                sent.push(handle.query_decision(agent_id));
            }
            None => notice.set("Select an agent first"),
        }
    }
    if keyboard.just_pressed(KeyCode::KeyB) {
        let batch = settings.config.batch;
        notice.set(format!("Running batch of {} ticks...", batch.default_ticks));
        sent.push(handle.run_batch(batch.default_ticks, batch.reset_seed));
    }
    if keyboard.just_pressed(KeyCode::KeyE) {
        sent.push(handle.export_stats());
    }

    if let Some(Err(e)) = sent.into_iter().find(Result::is_err) {
        tracing::error!("Control command dropped: {}", e);
        notice.set(e.to_string());
    }
}

/// System to refresh the status bar and notice line.
fn update_status_bar(
    bridge: Option<Res<SyncBridge>>,
    notice: Res<Notice>,
    mut status_text: Query<&mut Text, (With<StatusText>, Without<NoticeText>)>,
    mut notice_text: Query<&mut Text, (With<NoticeText>, Without<StatusText>)>,
) {
    let Some(bridge) = bridge else {
        return;
    };
    let view = bridge.view();
    let frame = view.frame();
    let agents = frame.world.as_ref().map(|w| w.agents.len()).unwrap_or(0);
    let peak = frame.occupancy().map(|r| r.max()).unwrap_or(1);
    let line = status_line(view.is_running(), frame.stat.as_deref(), agents, peak);

    for mut text in status_text.iter_mut() {
        if text.sections[0].value != line {
            text.sections[0].value.clone_from(&line);
        }
    }

    if notice.is_changed() {
        let message = notice.text.as_deref().unwrap_or(HELP);
        for mut text in notice_text.iter_mut() {
            text.sections[0].value = message.to_string();
        }
    }
}

/// System to show the selected agent, or hide the panel.
fn update_detail_panel(
    bridge: Option<Res<SyncBridge>>,
    mut panel: Query<&mut Visibility, With<DetailPanel>>,
    mut detail_text: Query<&mut Text, With<DetailText>>,
) {
    let Some(bridge) = bridge else {
        return;
    };
    let selected = bridge.view().selected_agent();

    for mut visibility in panel.iter_mut() {
        let wanted = if selected.is_some() {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        if *visibility != wanted {
            *visibility = wanted;
        }
    }

    let Some(selected) = selected else {
        return;
    };
    let body = detail_lines(&selected).join("\n");
    for mut text in detail_text.iter_mut() {
        if text.sections[0].value != body {
            text.sections[0].value = body.clone();
        }
    }
}
