//! Headless input scripts for automated gameplay checks.
//!
//! A script is a YAML list of steps that press and release actions, move the
//! pointer, advance frames and assert on the resulting state. No window or
//! GPU is involved.

use std::collections::BTreeMap;
use std::path::Path;

use citywalk_core::coordinator::ChatCollaborator;
use citywalk_core::input::Action;
use serde::Deserialize;

use crate::session::GameSession;

const DEFAULT_DT: f32 = 1.0 / 60.0;

#[derive(Debug, Clone, Deserialize)]
pub struct InputScript {
    #[serde(default = "default_script_name")]
    pub name: String,
    /// Frame delta used by `frames` steps unless a step overrides it.
    #[serde(default = "default_dt")]
    pub dt: f32,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_script_name() -> String {
    "script".to_string()
}

fn default_dt() -> f32 {
    DEFAULT_DT
}

/// One script step. Fields apply in declaration order: dt, capture, press,
/// release, pointer, scroll, frames, say, expect.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub dt: Option<f32>,
    pub capture: Option<bool>,
    #[serde(default)]
    pub press: Vec<String>,
    #[serde(default)]
    pub release: Vec<String>,
    pub pointer: Option<[f32; 2]>,
    pub scroll: Option<f32>,
    pub frames: Option<u32>,
    /// Type a chat line and wait for the reply.
    pub say: Option<String>,
    pub expect: Option<Expectation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expectation {
    pub state: Option<String>,
    pub near: Option<bool>,
    pub prompt: Option<bool>,
    pub chat_open: Option<bool>,
    pub airborne: Option<bool>,
    pub min_y: Option<f32>,
    pub max_y: Option<f32>,
    /// Minimum distance travelled from the start position on the ground plane.
    pub min_travel: Option<f32>,
    pub max_travel: Option<f32>,
    /// Exact counts of events still in the event log.
    #[serde(default)]
    pub events: BTreeMap<String, usize>,
}

#[derive(Debug)]
pub enum ScriptError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::Io(e) => write!(f, "IO error reading script: {}", e),
            ScriptError::Parse(e) => write!(f, "Failed to parse script: {}", e),
        }
    }
}

impl std::error::Error for ScriptError {}

pub fn parse_script(contents: &str) -> Result<InputScript, ScriptError> {
    serde_yaml::from_str(contents).map_err(ScriptError::Parse)
}

pub fn load_script(path: &Path) -> Result<InputScript, ScriptError> {
    let contents = std::fs::read_to_string(path).map_err(ScriptError::Io)?;
    parse_script(&contents)
}

/// Outcome of one script run.
#[derive(Debug)]
pub struct ScriptResult {
    pub name: String,
    pub passed: bool,
    pub failures: Vec<String>,
    pub frames: u64,
    pub game_time: f32,
}

/// Run `script` against `session`. Failed expectations are collected rather
/// than stopping the run.
pub fn run_script(session: &mut GameSession, script: &InputScript) -> ScriptResult {
    let start = session.avatar_position();
    let mut dt = sanitize(script.dt);
    let mut failures = Vec::new();

    for (index, step) in script.steps.iter().enumerate() {
        let label = format!("step {}", index + 1);

        if let Some(step_dt) = step.dt {
            dt = sanitize(step_dt);
        }
        match step.capture {
            Some(true) => session.capture_pointer(),
            Some(false) => session.release_pointer(),
            None => {}
        }
        for name in &step.press {
            if !apply_named(session, name, true) {
                failures.push(format!("{}: unknown action or key '{}'", label, name));
            }
        }
        for name in &step.release {
            if !apply_named(session, name, false) {
                failures.push(format!("{}: unknown action or key '{}'", label, name));
            }
        }
        if let Some([dx, dy]) = step.pointer {
            session.input.on_pointer_delta(dx, dy);
        }
        if let Some(scroll) = step.scroll {
            session.input.on_scroll(scroll);
        }
        for _ in 0..step.frames.unwrap_or(0) {
            session.frame(dt);
        }
        if let Some(text) = &step.say {
            if !session.chat.is_open() {
                failures.push(format!("{}: 'say' while chat is closed", label));
            } else {
                session.chat.type_text(text);
                if session.chat.submit() {
                    session.chat.wait_reply();
                }
            }
        }
        if let Some(expect) = &step.expect {
            check(session, expect, start, &label, &mut failures);
        }
    }

    for failure in &failures {
        tracing::warn!("[{}] {}", script.name, failure);
    }

    ScriptResult {
        name: script.name.clone(),
        passed: failures.is_empty(),
        failures,
        frames: session.frame_count,
        game_time: session.total_time,
    }
}

fn sanitize(dt: f32) -> f32 {
    if dt.is_finite() && dt > 0.0 {
        dt
    } else {
        DEFAULT_DT
    }
}

/// Press or release by action name, falling back to a bound key name.
fn apply_named(session: &mut GameSession, name: &str, pressed: bool) -> bool {
    if let Some(action) = Action::from_name(name) {
        session.input.on_key_change(action, pressed);
        return true;
    }
    session
        .translator
        .apply_key_name(name, pressed, &mut session.input)
}

fn check(
    session: &GameSession,
    expect: &Expectation,
    start: glam::Vec3,
    label: &str,
    failures: &mut Vec<String>,
) {
    let mut fail = |msg: String| failures.push(format!("{}: {}", label, msg));
    let locomotion = &session.game.locomotion;
    let position = locomotion.position();

    if let Some(state) = &expect.state {
        if locomotion.state().as_str() != state {
            fail(format!("state is '{}', expected '{}'", locomotion.state(), state));
        }
    }
    if let Some(near) = expect.near {
        if session.game.proximity.is_near() != near {
            fail(format!("near is {}, expected {}", !near, near));
        }
    }
    if let Some(prompt) = expect.prompt {
        if session.game.proximity.prompt_visible() != prompt {
            fail(format!("prompt visible is {}, expected {}", !prompt, prompt));
        }
    }
    if let Some(open) = expect.chat_open {
        if session.chat.is_open() != open {
            fail(format!("chat open is {}, expected {}", !open, open));
        }
    }
    if let Some(airborne) = expect.airborne {
        if locomotion.jump().active != airborne {
            fail(format!("airborne is {}, expected {}", !airborne, airborne));
        }
    }
    if let Some(min_y) = expect.min_y {
        if position.y < min_y {
            fail(format!("y {:.3} below {:.3}", position.y, min_y));
        }
    }
    if let Some(max_y) = expect.max_y {
        if position.y > max_y {
            fail(format!("y {:.3} above {:.3}", position.y, max_y));
        }
    }
    let travel = glam::Vec2::new(position.x - start.x, position.z - start.z).length();
    if let Some(min) = expect.min_travel {
        if travel < min {
            fail(format!("travelled {:.3}, expected at least {:.3}", travel, min));
        }
    }
    if let Some(max) = expect.max_travel {
        if travel > max {
            fail(format!("travelled {:.3}, expected at most {:.3}", travel, max));
        }
    }
    for (event, count) in &expect.events {
        let seen = session.events.count(event);
        if seen != *count {
            fail(format!("event '{}' seen {} times, expected {}", event, seen, count));
        }
    }
}
