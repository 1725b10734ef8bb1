use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand};
use iframe_bridge::camera::CameraState;
use iframe_bridge::frame::FrameElement;
use iframe_bridge::geometry::{IframeSize, Stacking, compute_transform};
use iframe_bridge::memory::{MemoryRoom, RecordingFrame};
use iframe_bridge::pages::scene_names;
use iframe_bridge::room::{ObserverId, PlayerPhase, Room};
use iframe_bridge::{BridgeConfig, BridgeError, BridgeHandle, BridgeRegistry, BusEvent, EventBus, InsertOptions};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("invalid script: {0}")]
    Script(#[from] serde_json::Error),
    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

#[derive(Parser, Debug)]
#[command(name = "bridge-cli", about = "Drive an iframe bridge without a browser")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON script against an in-memory room and print what the iframe receives.
    Simulate { script: PathBuf },
    /// Print the iframe CSS for a camera.
    Transform {
        #[arg(long, default_value_t = 1280.0)]
        width: f64,
        #[arg(long, default_value_t = 720.0)]
        height: f64,
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        center_x: f64,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        center_y: f64,
        #[arg(long)]
        iframe_width: f64,
        #[arg(long)]
        iframe_height: f64,
        /// Raise the iframe above the drawing surfaces.
        #[arg(long)]
        above: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Script {
    #[serde(default = "default_room_id")]
    room_id: String,
    #[serde(default)]
    replay: bool,
    /// Origin inbound messages claim unless a step overrides it.
    origin: String,
    options: ScriptOptions,
    /// Directory to page count.
    #[serde(default)]
    scenes: BTreeMap<String, usize>,
    #[serde(default)]
    scene: Option<String>,
    /// Insert without an element and wait for a `mount` step.
    #[serde(default)]
    mount_later: bool,
    #[serde(default)]
    steps: Vec<Step>,
}

fn default_room_id() -> String {
    "simulated".to_owned()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptOptions {
    url: String,
    width: f64,
    height: f64,
    display_scope_path: String,
    #[serde(default = "enabled")]
    use_clicker: bool,
    #[serde(default)]
    use_selector: bool,
}

fn enabled() -> bool {
    true
}

impl From<ScriptOptions> for InsertOptions {
    fn from(options: ScriptOptions) -> Self {
        Self {
            url: options.url,
            width: options.width,
            height: options.height,
            display_scope_path: options.display_scope_path,
            use_clicker: options.use_clicker,
            use_selector: options.use_selector,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Step {
    /// A `postMessage` from the iframe.
    Message {
        #[serde(default)]
        origin: Option<String>,
        data: Value,
    },
    /// A room state change reported by the host.
    State {
        #[serde(default)]
        camera: Option<CameraState>,
        #[serde(default)]
        tool: Option<String>,
        #[serde(default)]
        scene: Option<String>,
    },
    /// A magix event broadcast by another participant.
    Broadcast {
        event: String,
        #[serde(default)]
        payload: Value,
        author: ObserverId,
    },
    /// A replay player phase change.
    Phase { phase: PlayerPhase },
    /// The hosting UI rendered the iframe element.
    Mount,
    /// The iframe document finished loading.
    Load,
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Simulate { script } => run_simulate(&script),
        Command::Transform { width, height, scale, center_x, center_y, iframe_width, iframe_height, above } => {
            let camera = CameraState { width, height, scale, center_x, center_y };
            let size = IframeSize { width: iframe_width, height: iframe_height };
            let stacking = if above { Stacking::Above } else { Stacking::Behind };
            println!("{}", compute_transform(&camera, size, stacking).to_css());
            Ok(())
        }
    }
}

fn run_simulate(path: &Path) -> Result<(), CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read { path: path.to_path_buf(), source })?;
    let script: Script = serde_json::from_str(&text)?;
    for line in simulate(script)? {
        println!("{line}");
    }
    Ok(())
}

/// Run a script and collect every message posted to the iframe, one JSON line each.
fn simulate(script: Script) -> Result<Vec<String>, CliError> {
    let room = if script.replay { MemoryRoom::replay(&script.room_id) } else { MemoryRoom::live(&script.room_id) };
    for (dir, count) in &script.scenes {
        room.add_scenes(dir, &scene_names(*count));
    }
    if let Some(scene) = &script.scene {
        room.open_scene(scene);
    }

    let config = BridgeConfig::from_env()?;
    let mut registry = BridgeRegistry::new(config, Rc::new(EventBus::new()));
    let frame = RecordingFrame::new();
    let element: Option<FrameElement> = if script.mount_later { None } else { Some(frame.clone()) };
    let options = InsertOptions::from(script.options);
    let bridge = registry.insert(room.clone(), &options, element)?.into_handle();
    info!(room_id = %script.room_id, steps = script.steps.len(), "simulate: bridge inserted");

    let mut lines = drain(&frame)?;
    for (index, step) in script.steps.into_iter().enumerate() {
        debug!(index, ?step, "simulate: step");
        run_step(&registry, &bridge, &room, &frame, &script.origin, step)?;
        lines.extend(drain(&frame)?);
    }
    Ok(lines)
}

fn run_step(
    registry: &BridgeRegistry<MemoryRoom>,
    bridge: &BridgeHandle<MemoryRoom>,
    room: &MemoryRoom,
    frame: &Rc<RecordingFrame>,
    default_origin: &str,
    step: Step,
) -> Result<(), CliError> {
    match step {
        Step::Message { origin, data } => {
            let origin = origin.as_deref().unwrap_or(default_origin);
            let outcome = bridge.borrow_mut().handle_message(origin, &data);
            info!(?outcome, "simulate: message");
        }
        Step::State { camera, tool, scene } => {
            let mut deltas = Vec::new();
            if let Some(camera) = camera {
                deltas.push(room.set_camera(camera));
            }
            if let Some(tool) = tool {
                deltas.push(room.set_tool(&tool));
            }
            if let Some(scene) = scene {
                deltas.push(room.open_scene(&scene));
            }
            for delta in &deltas {
                bridge.borrow_mut().handle_state_changed(delta);
            }
        }
        Step::Broadcast { event, payload, author } => {
            let seen = room.receive_remote(&event, payload, author);
            info!(%event, listeners = seen, "simulate: broadcast");
        }
        Step::Phase { phase } => {
            room.set_player_phase(phase);
            bridge.borrow_mut().handle_phase_changed(phase);
        }
        Step::Mount => {
            let element: FrameElement = frame.clone();
            let mount = BusEvent::WrapperDidMount { room_id: room.room_id().to_owned(), element };
            let delivered = registry.bus().emit(&mount);
            info!(delivered, "simulate: mount announced");
        }
        Step::Load => bridge.borrow_mut().handle_iframe_load()?,
    }
    Ok(())
}

fn drain(frame: &RecordingFrame) -> Result<Vec<String>, CliError> {
    frame
        .take_posted()
        .iter()
        .map(|message| serde_json::to_string(message).map_err(CliError::from))
        .collect()
}
