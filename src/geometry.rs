//! Geometry engine: camera state + iframe logical size → CSS transform.
//!
//! The iframe is laid out at the container origin with its logical size and
//! then moved with a single `translate(..) scale(..)` around the viewport
//! midpoint, so that its center sits on world origin `(0, 0)` and follows the
//! whiteboard camera as it pans and zooms.
//!
//! Stacking is decided separately by [`stacking_for`]: the iframe stays behind
//! the drawing surfaces unless the active tool is allow-listed and the
//! displayer accepts input.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use crate::camera::{CameraState, Point};

/// Static part of the iframe style. The transparent sub-pixel border works
/// around Android WebViews that mis-size nested iframes with `border-width: 0`.
pub const BASE_CSS: [&str; 4] = [
    "position: absolute;",
    "border: 0.1px solid rgba(0,0,0,0);",
    "top: 0px;",
    "left: 0px;",
];

/// Appended when the iframe is sent behind the drawing surfaces.
pub const BEHIND_CSS: &str = "z-index: -1;";

/// Logical iframe size in CSS pixels, as declared by the bridge attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IframeSize {
    pub width: f64,
    pub height: f64,
}

/// Where the iframe sits relative to the whiteboard drawing surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stacking {
    /// `z-index: -1`: pointer input goes to the whiteboard.
    #[default]
    Behind,
    /// Natural stacking order: the iframe receives pointer input.
    Above,
}

/// Inputs to the stacking decision.
#[derive(Debug, Clone, Copy)]
pub struct StackingInput<'a> {
    /// Name of the currently active pointer tool (e.g. `"clicker"`).
    pub tool: &'a str,
    /// Tools that let the iframe receive pointer input.
    pub allowed: &'a [String],
    /// The displayer cannot write to the room.
    pub readonly: bool,
    /// Device input is globally disabled (always true for replay).
    pub input_disabled: bool,
}

/// Decide whether the iframe should be raised above the drawing surfaces.
#[must_use]
pub fn stacking_for(input: &StackingInput<'_>) -> Stacking {
    if input.readonly || input.input_disabled {
        return Stacking::Behind;
    }
    if input.allowed.iter().any(|t| t == input.tool) {
        Stacking::Above
    } else {
        Stacking::Behind
    }
}

/// The computed placement of the iframe element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IframeTransform {
    /// `transform-origin`, the midpoint of the camera viewport.
    pub origin: Point,
    /// `translate(x, y)` in CSS pixels.
    pub translate: Point,
    /// Uniform `scale(s, s)` factor.
    pub scale: f64,
    pub stacking: Stacking,
}

/// Compute the iframe transform for a camera state.
#[must_use]
pub fn compute_transform(camera: &CameraState, size: IframeSize, stacking: Stacking) -> IframeTransform {
    let scale = camera.scale;
    let diff_x = ((camera.width - size.width) / 2.0) * scale;
    let diff_y = ((camera.height - size.height) / 2.0) * scale;
    IframeTransform {
        origin: camera.viewport_center(),
        translate: Point { x: -(camera.center_x * scale) + diff_x, y: -(camera.center_y * scale) + diff_y },
        scale,
        stacking,
    }
}

impl IframeTransform {
    /// Screen position of a point given in the iframe's own (untransformed)
    /// coordinates, i.e. where the CSS transform puts it.
    #[must_use]
    pub fn apply(&self, local: Point) -> Point {
        Point {
            x: self.origin.x + self.translate.x + self.scale * (local.x - self.origin.x),
            y: self.origin.y + self.translate.y + self.scale * (local.y - self.origin.y),
        }
    }

    /// Render as an inline `style` attribute value.
    #[must_use]
    pub fn to_css(&self) -> String {
        let mut css = format!(
            "{} transform-origin: {}px {}px; transform: translate({}px,{}px) scale({}, {});",
            BASE_CSS.join(" "),
            self.origin.x,
            self.origin.y,
            self.translate.x,
            self.translate.y,
            self.scale,
            self.scale
        );
        if self.stacking == Stacking::Behind {
            css.push(' ');
            css.push_str(BEHIND_CSS);
        }
        css
    }
}
