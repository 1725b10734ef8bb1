#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

/// A point in either screen or world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Camera state of the whiteboard surface, as reported by the room.
///
/// `width` / `height` are the viewport size in CSS pixels. `center_x` /
/// `center_y` is the world point shown at the middle of the viewport.
/// `scale` is the zoom factor (1.0 = no zoom).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraState {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self { width: 0.0, height: 0.0, scale: 1.0, center_x: 0.0, center_y: 0.0 }
    }
}

impl CameraState {
    /// Midpoint of the viewport in screen space.
    #[must_use]
    pub fn viewport_center(&self) -> Point {
        Point { x: self.width / 2.0, y: self.height / 2.0 }
    }

    /// Convert a world-space point to screen coordinates (CSS pixels).
    #[must_use]
    pub fn world_to_screen(&self, world: Point) -> Point {
        let mid = self.viewport_center();
        Point {
            x: (world.x - self.center_x) * self.scale + mid.x,
            y: (world.y - self.center_y) * self.scale + mid.y,
        }
    }

    /// Convert a screen-space point (CSS pixels) to world coordinates.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        let mid = self.viewport_center();
        Point {
            x: (screen.x - mid.x) / self.scale + self.center_x,
            y: (screen.y - mid.y) / self.scale + self.center_y,
        }
    }
}
