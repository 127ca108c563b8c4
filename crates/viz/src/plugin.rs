//! Main visualization plugin that ties all systems together.

use bevy::prelude::*;

use crate::agents::AgentPlugin;
use crate::camera::CameraPlugin;
use crate::overlay::OverlayPlugin;
use crate::sync_bridge::SyncBridgePlugin;
use crate::world::WorldPlugin;

/// Main plugin for the campus viewer.
///
/// This plugin sets up the window, adds all sub-plugins, and configures
/// the Bevy app for visualization. Insert [`crate::SyncBridge`] and
/// [`crate::ViewerSettings`] before adding it.
pub struct CampusVizPlugin;

impl Plugin for CampusVizPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Campus Simulation".into(),
                resolution: (1280., 720.).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins((
            SyncBridgePlugin,
            CameraPlugin,
            WorldPlugin,
            AgentPlugin,
            OverlayPlugin,
        ));
    }
}
