//! NPC conversation: `npc_config.json`, an OpenAI-compatible completion call
//! and a scripted fallback when no key is configured or the call fails.

use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use citywalk_core::coordinator::ChatCollaborator;
use serde::{Deserialize, Serialize};

const PLACEHOLDER_KEY: &str = "YOUR_API_KEY_HERE";
const API_KEY_ENV: &str = "CITYWALK_API_KEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NpcConfig {
    pub npc_name: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub greeting: String,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    256
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            npc_name: "Wanderer".to_string(),
            system_prompt: "You are a calm, cryptic guide standing in a quiet city square.".to_string(),
            model: String::new(),
            api_endpoint: String::new(),
            api_key: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            greeting: "Ah, a visitor. Come closer, there is much to discuss.".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ChatError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Http(String),
    NoApiKey,
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatError::Io(e) => write!(f, "IO error reading NPC config: {}", e),
            ChatError::Parse(e) => write!(f, "Failed to parse NPC config: {}", e),
            ChatError::Http(e) => write!(f, "LLM request failed: {}", e),
            ChatError::NoApiKey => write!(f, "no API key configured"),
        }
    }
}

impl std::error::Error for ChatError {}

impl NpcConfig {
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let contents = std::fs::read_to_string(path).map_err(ChatError::Io)?;
        serde_json::from_str(&contents).map_err(ChatError::Parse)
    }

    /// Load, or fall back to the built-in character.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                tracing::info!("Loaded NPC '{}' from {:?}", config.npc_name, path);
                config
            }
            Err(e) => {
                tracing::warn!("{} ({:?}); using default NPC", e, path);
                Self::default()
            }
        }
    }

    /// The key to send, if any. The environment wins over a placeholder.
    pub fn effective_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() && self.api_key != PLACEHOLDER_KEY {
            return Some(self.api_key.clone());
        }
        std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// Keyword reply used when the model cannot be reached.
pub fn scripted_reply(npc_name: &str, message: &str) -> String {
    let lower = message.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["hello", "hi", "hey"]) {
        "Well met, traveler. Few find their way to this corner of the city. What is on your mind?"
            .to_string()
    } else if has(&["name"]) {
        format!("They call me {}. It is the only name the streets have given me.", npc_name)
    } else if has(&["quest", "help"]) {
        "Three old markers are hidden along the city walls. Find them and the way onward will open."
            .to_string()
    } else if has(&["bye", "goodbye"]) {
        "Walk safely. The lights stay on for those who keep moving.".to_string()
    } else {
        "A curious thought. This city keeps many secrets, and I suspect you will uncover a few."
            .to_string()
    }
}

/// Blocking OpenAI-compatible chat completion.
pub fn request_completion(config: &NpcConfig, history: &[ChatMessage]) -> Result<String, ChatError> {
    let key = config.effective_api_key().ok_or(ChatError::NoApiKey)?;

    let payload = serde_json::json!({
        "model": config.model,
        "messages": history,
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
    });

    let response = ureq::post(&config.api_endpoint)
        .timeout(REQUEST_TIMEOUT)
        .set("Authorization", &format!("Bearer {}", key))
        .set("Content-Type", "application/json")
        .send_json(&payload)
        .map_err(|e| ChatError::Http(e.to_string()))?;

    let body: serde_json::Value = response
        .into_json()
        .map_err(|e| ChatError::Http(e.to_string()))?;

    Ok(body["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or("...")
        .trim()
        .to_string())
}

/// Completion with the scripted fallback folded in. Never fails.
pub fn reply_or_fallback(config: &NpcConfig, history: &[ChatMessage]) -> String {
    match request_completion(config, history) {
        Ok(reply) => reply,
        Err(ChatError::NoApiKey) => {
            tracing::info!("No API key configured, using scripted replies");
            scripted(config, history)
        }
        Err(e) => {
            tracing::warn!("{}; using scripted reply", e);
            scripted(config, history)
        }
    }
}

fn scripted(config: &NpcConfig, history: &[ChatMessage]) -> String {
    let last_user = history
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .unwrap_or("");
    scripted_reply(&config.npc_name, last_user)
}

/// Conversation history seeded with the system prompt.
pub struct ChatService {
    config: NpcConfig,
    history: Vec<ChatMessage>,
}

impl ChatService {
    pub fn new(config: NpcConfig) -> Self {
        let history = vec![ChatMessage::new("system", &config.system_prompt)];
        Self { config, history }
    }

    pub fn config(&self) -> &NpcConfig {
        &self.config
    }

    pub fn npc_name(&self) -> &str {
        &self.config.npc_name
    }

    pub fn greeting(&self) -> &str {
        &self.config.greeting
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Drop everything but the system prompt.
    pub fn reset(&mut self) {
        self.history.truncate(1);
    }

    fn push_user(&mut self, text: &str) {
        self.history.push(ChatMessage::new("user", text));
    }

    fn push_assistant(&mut self, text: &str) {
        self.history.push(ChatMessage::new("assistant", text));
    }

    /// Send a message and wait for the reply.
    pub fn send_message(&mut self, text: &str) -> String {
        self.push_user(text);
        let reply = reply_or_fallback(&self.config, &self.history);
        self.push_assistant(&reply);
        reply
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Player,
    Npc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub speaker: Speaker,
    pub text: String,
}

/// The chat overlay: open/closed state, transcript and the line being typed.
/// Replies are fetched on a worker thread and picked up by `poll`.
pub struct ChatPanel {
    service: ChatService,
    open: bool,
    transcript: Vec<ChatLine>,
    draft: String,
    inflight: Option<mpsc::Receiver<String>>,
}

impl ChatPanel {
    pub fn new(service: ChatService) -> Self {
        Self {
            service,
            open: false,
            transcript: Vec::new(),
            draft: String::new(),
            inflight: None,
        }
    }

    pub fn npc_name(&self) -> &str {
        self.service.npc_name()
    }

    pub fn transcript(&self) -> &[ChatLine] {
        &self.transcript
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_sending(&self) -> bool {
        self.inflight.is_some()
    }

    pub fn service(&self) -> &ChatService {
        &self.service
    }

    pub fn type_text(&mut self, text: &str) {
        if self.open {
            self.draft.extend(text.chars().filter(|c| !c.is_control()));
        }
    }

    pub fn backspace(&mut self) {
        self.draft.pop();
    }

    /// Send the draft. Returns false when there is nothing to send or a
    /// reply is still pending.
    pub fn submit(&mut self) -> bool {
        let text = self.draft.trim().to_string();
        if !self.open || text.is_empty() || self.inflight.is_some() {
            return false;
        }
        self.draft.clear();
        self.transcript.push(ChatLine {
            speaker: Speaker::Player,
            text: text.clone(),
        });
        self.service.push_user(&text);

        let config = self.service.config.clone();
        let history = self.service.history.clone();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(reply_or_fallback(&config, &history));
        });
        self.inflight = Some(rx);
        true
    }

    /// Collect a finished reply, if one arrived.
    pub fn poll(&mut self) -> Option<String> {
        let reply = match self.inflight.as_ref()?.try_recv() {
            Ok(reply) => reply,
            Err(mpsc::TryRecvError::Empty) => return None,
            Err(mpsc::TryRecvError::Disconnected) => {
                "[Error: Failed to get response]".to_string()
            }
        };
        self.inflight = None;
        self.service.push_assistant(&reply);
        self.transcript.push(ChatLine {
            speaker: Speaker::Npc,
            text: reply.clone(),
        });
        Some(reply)
    }

    /// Block until the pending reply arrives.
    pub fn wait_reply(&mut self) -> Option<String> {
        let rx = self.inflight.as_ref()?;
        let reply = rx
            .recv()
            .unwrap_or_else(|_| "[Error: Failed to get response]".to_string());
        self.inflight = None;
        self.service.push_assistant(&reply);
        self.transcript.push(ChatLine {
            speaker: Speaker::Npc,
            text: reply.clone(),
        });
        Some(reply)
    }
}

impl ChatCollaborator for ChatPanel {
    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self) {
        if self.open {
            return;
        }
        self.open = true;
        self.transcript.clear();
        self.transcript.push(ChatLine {
            speaker: Speaker::Npc,
            text: self.service.greeting().to_string(),
        });
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.draft.clear();
        // A late reply belongs to the conversation being discarded.
        self.inflight = None;
        self.service.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline() -> NpcConfig {
        NpcConfig {
            npc_name: "Sage".into(),
            api_key: PLACEHOLDER_KEY.into(),
            greeting: "Welcome.".into(),
            ..NpcConfig::default()
        }
    }

    #[test]
    fn test_parse_npc_config() {
        let json = r#"{"npc_name": "Sage", "system_prompt": "Be wise.", "model": "m",
            "api_endpoint": "http://localhost/v1/chat/completions", "api_key": "k",
            "temperature": 0.5, "max_tokens": 64, "greeting": "Hello."}"#;
        let config: NpcConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.npc_name, "Sage");
        assert_eq!(config.max_tokens, 64);
        assert_eq!(config.effective_api_key().as_deref(), Some("k"));
    }

    #[test]
    fn test_scripted_replies_by_keyword() {
        assert!(scripted_reply("Sage", "Hello there").starts_with("Well met"));
        assert!(scripted_reply("Sage", "what is your NAME").contains("Sage"));
        assert!(scripted_reply("Sage", "any quest?").contains("markers"));
        assert!(scripted_reply("Sage", "goodbye").starts_with("Walk safely"));
        assert!(scripted_reply("Sage", "42").starts_with("A curious"));
    }

    #[test]
    fn test_service_falls_back_without_key() {
        if std::env::var(API_KEY_ENV).is_ok() {
            return;
        }
        let mut service = ChatService::new(offline());
        let reply = service.send_message("what's your name");
        assert!(reply.contains("Sage"));
        assert_eq!(service.history().len(), 3);
        service.reset();
        assert_eq!(service.history().len(), 1);
        assert_eq!(service.history()[0].role, "system");
    }

    #[test]
    fn test_panel_open_close_cycle() {
        let mut panel = ChatPanel::new(ChatService::new(offline()));
        panel.type_text("ignored while closed");
        assert_eq!(panel.draft(), "");

        panel.open();
        panel.open();
        assert_eq!(panel.transcript().len(), 1);
        assert_eq!(panel.transcript()[0].text, "Welcome.");

        panel.type_text("  ");
        assert!(!panel.submit());

        panel.close();
        assert!(!panel.is_open());
        assert_eq!(panel.service().history().len(), 1);
    }

    #[test]
    fn test_panel_submit_and_reply() {
        if std::env::var(API_KEY_ENV).is_ok() {
            return;
        }
        let mut panel = ChatPanel::new(ChatService::new(offline()));
        panel.open();
        panel.type_text("bye!");
        assert!(panel.submit());
        assert!(panel.is_sending());
        assert!(!panel.submit());

        let reply = panel.wait_reply().unwrap();
        assert!(reply.starts_with("Walk safely"));
        assert!(!panel.is_sending());
        let speakers: Vec<_> = panel.transcript().iter().map(|l| l.speaker).collect();
        assert_eq!(speakers, vec![Speaker::Npc, Speaker::Player, Speaker::Npc]);
        assert_eq!(panel.service().history().len(), 3);
    }
}
