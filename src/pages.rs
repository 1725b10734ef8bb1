//! Page navigation over the scenes of the display directory.
//!
//! Pages are 1-based (`page = scene index + 1`); the page count is the number
//! of scenes under the bridge's display scope. Every successful move is
//! announced to the room as a magix event named after the command so the
//! other participants' iframes can follow.

#[cfg(test)]
#[path = "pages_test.rs"]
mod pages_test;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::BridgeError;
use crate::events::EventKind;
use crate::magix;
use crate::room::{Room, SceneState, can_operate};

/// Largest integer a JavaScript number represents exactly.
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// 1-based page number of the current scene.
#[must_use]
pub fn current_page(scene: &SceneState) -> usize {
    scene.index + 1
}

/// Number of scenes under `dir`.
#[must_use]
pub fn total_pages<R: Room + ?Sized>(room: &R, dir: &str) -> usize {
    room.scenes_in(dir).map_or(0, |scenes| scenes.len())
}

/// Accept a positive safe integer, as sent by the iframe.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn parse_page_number(value: &Value) -> Option<usize> {
    let Value::Number(number) = value else {
        return None;
    };
    let page = if let Some(n) = number.as_u64() {
        n
    } else {
        let f = number.as_f64()?;
        if f.fract() != 0.0 || f < 1.0 || f > MAX_SAFE_INTEGER as f64 {
            return None;
        }
        f as u64
    };
    if page == 0 || page > MAX_SAFE_INTEGER {
        return None;
    }
    match usize::try_from(page) {
        Ok(page) => Some(page),
        Err(_) => None,
    }
}

/// Scene names `"1"..="count"`.
#[must_use]
pub fn scene_names(count: usize) -> Vec<String> {
    (1..=count).map(|n| n.to_string()).collect()
}

/// Path of the first generated scene under `dir`.
#[must_use]
pub fn first_scene_path(dir: &str) -> String {
    format!("{}/1", dir.trim_end_matches('/'))
}

fn announce<R: Room + ?Sized>(room: &mut R, kind: EventKind, payload: Value) -> Result<(), BridgeError> {
    magix::dispatch(room, kind.as_str(), payload)?;
    Ok(())
}

/// Move to the next page. Returns the new scene index, `None` when nothing moved.
///
/// # Errors
///
/// Propagates [`magix::dispatch`] errors.
pub fn next_page<R: Room + ?Sized>(room: &mut R, dir: &str) -> Result<Option<usize>, BridgeError> {
    if !can_operate(room) {
        debug!("pages: next dropped, displayer cannot operate");
        return Ok(None);
    }
    let next = current_page(&room.state().scene_state) + 1;
    if next > total_pages(room, dir) {
        return Ok(None);
    }
    let index = next - 1;
    room.set_scene_index(index);
    announce(room, EventKind::NextPage, Value::Object(Map::new()))?;
    Ok(Some(index))
}

/// Move to the previous page. Returns the new scene index, `None` when nothing moved.
///
/// # Errors
///
/// Propagates [`magix::dispatch`] errors.
pub fn prev_page<R: Room + ?Sized>(room: &mut R) -> Result<Option<usize>, BridgeError> {
    if !can_operate(room) {
        debug!("pages: prev dropped, displayer cannot operate");
        return Ok(None);
    }
    let current = current_page(&room.state().scene_state);
    if current < 2 {
        return Ok(None);
    }
    let index = current - 2;
    room.set_scene_index(index);
    announce(room, EventKind::PrevPage, Value::Object(Map::new()))?;
    Ok(Some(index))
}

/// Jump to a 1-based page. Anything but a positive integer is rejected.
///
/// # Errors
///
/// Propagates [`magix::dispatch`] errors.
pub fn go_to_page<R: Room + ?Sized>(room: &mut R, page: &Value) -> Result<Option<usize>, BridgeError> {
    if !can_operate(room) {
        debug!("pages: page-to dropped, displayer cannot operate");
        return Ok(None);
    }
    let Some(page) = parse_page_number(page) else {
        debug!(%page, "pages: page-to rejected, not a positive integer");
        return Ok(None);
    };
    let index = page - 1;
    room.set_scene_index(index);
    announce(room, EventKind::PageTo, Value::from(index))?;
    Ok(Some(index))
}

/// Declare the page count. (Re)creates `count` scenes named `1..=count`
/// under `dir` when the directory is missing or has a different length, and
/// opens the first one. Returns whether scenes were created.
pub fn set_page<R: Room + ?Sized>(room: &mut R, dir: &str, count: &Value) -> bool {
    if !can_operate(room) {
        debug!("pages: set-page dropped, displayer cannot operate");
        return false;
    }
    let Some(count) = parse_page_number(count) else {
        debug!(%count, "pages: set-page rejected, not a positive integer");
        return false;
    };
    if room.scenes_in(dir).is_some_and(|scenes| scenes.len() == count) {
        return false;
    }
    room.put_scenes(dir, &scene_names(count));
    room.set_scene_path(&first_scene_path(dir));
    true
}
