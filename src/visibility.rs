//! Visibility gate: the iframe is shown only while the current scene lives
//! under the bridge's display scope.

#[cfg(test)]
#[path = "visibility_test.rs"]
mod visibility_test;

/// Visibility sub-state of a bound bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    #[must_use]
    pub fn from_visible(visible: bool) -> Self {
        if visible { Self::Visible } else { Self::Hidden }
    }

    #[must_use]
    pub fn is_visible(self) -> bool {
        self == Self::Visible
    }
}

/// Whether `scene_path` is inside `display_scope_path`.
///
/// Plain string prefix, as the whiteboard SDK compares scene directories.
#[must_use]
pub fn in_display_scope(scene_path: &str, display_scope_path: &str) -> bool {
    scene_path.starts_with(display_scope_path)
}

/// Decide the iframe visibility for a scene path.
#[must_use]
pub fn gate(scene_path: &str, display_scope_path: &str) -> Visibility {
    Visibility::from_visible(in_display_scope(scene_path, display_scope_path))
}
