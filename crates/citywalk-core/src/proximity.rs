use glam::Vec3;

/// Prompt visibility edge produced by a proximity update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChange {
    Show,
    Hide,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximitySample {
    pub distance: f32,
    pub near: bool,
    pub change: Option<PromptChange>,
}

/// Tracks whether the avatar is within talking range of the NPC.
///
/// Show/Hide fire only when `is_near` actually flips. A forced hide (the chat
/// panel opening) clears the prompt without touching `is_near`, so the prompt
/// comes back on the next approach after leaving range.
#[derive(Debug, Clone)]
pub struct ProximityGate {
    radius: f32,
    is_near: bool,
    prompt_visible: bool,
}

impl ProximityGate {
    pub fn new(radius: f32) -> Self {
        Self {
            radius: sanitize_radius(radius),
            is_near: false,
            prompt_visible: false,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = sanitize_radius(radius);
    }

    pub fn is_near(&self) -> bool {
        self.is_near
    }

    pub fn prompt_visible(&self) -> bool {
        self.prompt_visible
    }

    /// Re-evaluate distance between the two positions. Inclusive at the
    /// radius.
    pub fn update(&mut self, avatar: Vec3, npc: Vec3) -> ProximitySample {
        let distance = avatar.distance(npc);
        let near = distance.is_finite() && distance <= self.radius;

        let change = match (self.is_near, near) {
            (false, true) => {
                self.prompt_visible = true;
                Some(PromptChange::Show)
            }
            (true, false) => {
                self.prompt_visible = false;
                Some(PromptChange::Hide)
            }
            _ => None,
        };
        if let Some(change) = change {
            tracing::debug!("Interaction prompt {:?} at distance {:.2}", change, distance);
        }
        self.is_near = near;

        ProximitySample {
            distance,
            near,
            change,
        }
    }

    /// Hide the prompt without altering `is_near`.
    pub fn force_hide(&mut self) {
        self.prompt_visible = false;
    }
}

fn sanitize_radius(radius: f32) -> f32 {
    if radius.is_finite() && radius > 0.0 {
        radius
    } else {
        0.0
    }
}
