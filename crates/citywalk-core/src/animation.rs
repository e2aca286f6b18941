use std::collections::HashMap;

/// Newtype handle into the host's animation clip storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipHandle(pub usize);

/// A clip as reported by the asset provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSource {
    pub name: String,
    pub handle: ClipHandle,
    /// Length in seconds. Zero when unknown.
    pub duration: f32,
}

/// Semantic clip names the locomotion layer asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipName {
    Idle,
    Walk,
    Jog,
    Sprint,
    JumpStart,
    JumpLoop,
    JumpLand,
    Dance,
    CrouchIdle,
    CrouchWalk,
}

/// Exact external clip names recognised in character assets.
const NAME_TABLE: &[(&str, ClipName)] = &[
    ("Idle_Loop", ClipName::Idle),
    ("Walk_Loop", ClipName::Walk),
    ("Jog_Fwd_Loop", ClipName::Jog),
    ("Sprint_Loop", ClipName::Sprint),
    ("Jump_Start", ClipName::JumpStart),
    ("Jump_Loop", ClipName::JumpLoop),
    ("Jump_Land", ClipName::JumpLand),
    ("Dance_Loop", ClipName::Dance),
    ("Crouch_Idle_Loop", ClipName::CrouchIdle),
    ("Crouch_Fwd_Loop", ClipName::CrouchWalk),
];

impl ClipName {
    pub fn from_external(name: &str) -> Option<ClipName> {
        NAME_TABLE
            .iter()
            .find(|(external, _)| *external == name)
            .map(|(_, clip)| *clip)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClipName::Idle => "idle",
            ClipName::Walk => "walk",
            ClipName::Jog => "jog",
            ClipName::Sprint => "sprint",
            ClipName::JumpStart => "jump-start",
            ClipName::JumpLoop => "jump-loop",
            ClipName::JumpLand => "jump-land",
            ClipName::Dance => "dance",
            ClipName::CrouchIdle => "crouch-idle",
            ClipName::CrouchWalk => "crouch-walk",
        }
    }
}

/// Playback of a started clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Playback {
    pub looping: bool,
    pub speed: f32,
    /// Seconds of clip time played since the last start.
    pub elapsed: f32,
}

#[derive(Debug, Clone)]
struct ClipEntry {
    handle: ClipHandle,
    duration: f32,
    playback: Option<Playback>,
}

impl ClipEntry {
    fn finished(&self) -> bool {
        match &self.playback {
            None => true,
            Some(p) if p.looping => false,
            Some(p) => p.elapsed >= self.duration,
        }
    }
}

/// Maps semantic names to the clips an asset actually provides and tracks
/// their playback clock.
///
/// Asking for a clip the asset lacks is a no-op: a character without a jump
/// animation still jumps, it just does not animate it.
#[derive(Debug, Clone, Default)]
pub struct AnimationClipRegistry {
    clips: HashMap<ClipName, ClipEntry>,
}

impl AnimationClipRegistry {
    /// Register every clip whose external name is in the name table, stop
    /// them all, then start idle looping.
    pub fn from_sources(sources: &[ClipSource]) -> Self {
        let mut registry = Self::default();
        for source in sources {
            match ClipName::from_external(&source.name) {
                Some(clip) => {
                    tracing::debug!("Mapped clip \"{}\" -> {}", source.name, clip.as_str());
                    registry.register(clip, source.handle, source.duration);
                }
                None => tracing::trace!("Ignoring unmapped clip \"{}\"", source.name),
            }
        }
        registry.stop_all();
        registry.play(ClipName::Idle, true, 1.0);
        registry
    }

    /// Register a clip under a semantic name, replacing any earlier one.
    pub fn register(&mut self, name: ClipName, handle: ClipHandle, duration: f32) {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        self.clips.insert(
            name,
            ClipEntry {
                handle,
                duration,
                playback: None,
            },
        );
    }

    pub fn handle(&self, name: ClipName) -> Option<ClipHandle> {
        self.clips.get(&name).map(|e| e.handle)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Start (or restart) a clip from the beginning. Returns false when the
    /// clip is absent.
    pub fn play(&mut self, name: ClipName, looping: bool, speed: f32) -> bool {
        match self.clips.get_mut(&name) {
            Some(entry) => {
                entry.playback = Some(Playback {
                    looping,
                    speed: speed.max(0.0),
                    elapsed: 0.0,
                });
                true
            }
            None => false,
        }
    }

    pub fn stop(&mut self, name: ClipName) {
        if let Some(entry) = self.clips.get_mut(&name) {
            entry.playback = None;
        }
    }

    pub fn stop_all(&mut self) {
        for entry in self.clips.values_mut() {
            entry.playback = None;
        }
    }

    /// Advance every playing clip by `dt` seconds of wall time.
    pub fn advance(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        for entry in self.clips.values_mut() {
            if let Some(playback) = &mut entry.playback {
                playback.elapsed += dt * playback.speed;
                if playback.looping && entry.duration > 0.0 {
                    playback.elapsed %= entry.duration;
                }
            }
        }
    }

    /// True once a one-shot clip has played through, or when the clip is
    /// absent or stopped. Looping clips never finish.
    pub fn is_finished(&self, name: ClipName) -> bool {
        self.clips.get(&name).map_or(true, ClipEntry::finished)
    }

    pub fn is_playing(&self, name: ClipName) -> bool {
        self.clips
            .get(&name)
            .map_or(false, |e| e.playback.is_some() && !e.finished())
    }

    pub fn playback(&self, name: ClipName) -> Option<Playback> {
        self.clips.get(&name).and_then(|e| e.playback)
    }
}
