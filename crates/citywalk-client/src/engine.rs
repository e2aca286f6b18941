use std::sync::mpsc;
use std::sync::Arc;

use citywalk_core::coordinator::ChatCollaborator;
use citywalk_core::input::Action;
use notify::RecommendedWatcher;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{CursorGrabMode, Window, WindowId};

use crate::chat::Speaker;
use crate::session::GameSession;
use crate::watcher::{self, WatchEvent};

/// Window host: owns the OS window and feeds the session one frame per
/// redraw. The status line lives in the window title; chat goes to stdout.
pub struct Engine {
    pub session: GameSession,
    window: Option<Arc<Window>>,
    hot_reload: bool,
    _watcher: Option<RecommendedWatcher>,
    watch_rx: Option<mpsc::Receiver<WatchEvent>>,
    last_frame_time: Option<instant::Instant>,
    last_title: String,
    printed_lines: usize,
}

impl Engine {
    pub fn new(session: GameSession, hot_reload: bool) -> Self {
        Self {
            session,
            window: None,
            hot_reload,
            _watcher: None,
            watch_rx: None,
            last_frame_time: None,
            last_title: String::new(),
            printed_lines: 0,
        }
    }

    fn start_watcher(&mut self) {
        if !self.hot_reload {
            return;
        }
        match watcher::start_watching(&self.session.project_root) {
            Ok((watcher, rx)) => {
                self._watcher = Some(watcher);
                self.watch_rx = Some(rx);
            }
            Err(e) => tracing::warn!("Hot reload disabled: {}", e),
        }
    }

    fn process_watch_events(&mut self) {
        let Some(rx) = &self.watch_rx else {
            return;
        };
        let changes: Vec<WatchEvent> = rx.try_iter().collect();
        for change in changes {
            match change {
                WatchEvent::ConfigChanged(path) => {
                    if let Err(e) = self.session.reload_config() {
                        tracing::warn!("Keeping previous tuning, {:?} rejected: {}", path, e);
                    }
                }
                WatchEvent::BindingsChanged(_) => self.session.reload_bindings(),
            }
        }
    }

    fn grab_cursor(&mut self) {
        if self.session.game.camera.is_captured() {
            return;
        }
        tracing::info!("Capturing cursor");
        if let Some(window) = &self.window {
            let _ = window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
            window.set_cursor_visible(false);
        }
        self.session.capture_pointer();
    }

    fn release_cursor(&mut self) {
        if let Some(window) = &self.window {
            let _ = window.set_cursor_grab(CursorGrabMode::None);
            window.set_cursor_visible(true);
        }
        self.session.release_pointer();
    }

    /// Route typing to the chat draft while the panel is open.
    fn handle_chat_key(&mut self, event: &winit::event::KeyEvent) {
        if event.state != ElementState::Pressed || !self.session.chat.is_open() {
            return;
        }
        match &event.logical_key {
            Key::Named(NamedKey::Enter) => {
                self.session.chat.submit();
            }
            Key::Named(NamedKey::Backspace) => self.session.chat.backspace(),
            Key::Named(NamedKey::Escape) => {}
            _ => {
                if let Some(text) = &event.text {
                    self.session.chat.type_text(text);
                }
            }
        }
    }

    fn redraw(&mut self) {
        let now = instant::Instant::now();
        let dt = self
            .last_frame_time
            .map_or(0.0, |last| now.duration_since(last).as_secs_f32());
        self.last_frame_time = Some(now);

        self.process_watch_events();

        let chat_open = self.session.chat.is_open();
        let input = &self.session.input;
        if !chat_open {
            let should_capture = [
                Action::MoveForward,
                Action::MoveBackward,
                Action::StrafeLeft,
                Action::StrafeRight,
                Action::Jump,
            ]
            .into_iter()
            .any(|a| input.just_pressed(a));
            if input.just_pressed(Action::Cancel) {
                self.release_cursor();
            } else if should_capture {
                self.grab_cursor();
            }
        }

        let report = self.session.frame(dt);
        if report.release_capture {
            self.release_cursor();
        }
        if report.chat_opened {
            println!("--- {} (type, Enter to send, Esc to leave) ---", self.session.chat.npc_name());
            self.printed_lines = 0;
        }
        self.print_transcript();
        self.update_title();
    }

    fn print_transcript(&mut self) {
        let lines = self.session.chat.transcript();
        for line in lines.iter().skip(self.printed_lines) {
            match line.speaker {
                Speaker::Npc => println!("{}: {}", self.session.chat.npc_name(), line.text),
                Speaker::Player => println!("you: {}", line.text),
            }
        }
        self.printed_lines = lines.len();
    }

    fn update_title(&mut self) {
        let session = &self.session;
        let eye = session.camera_eye();
        let mut title = format!(
            "citywalk | {} | cam ({:.0}, {:.0}, {:.0})",
            session.game.locomotion.state(),
            eye.x,
            eye.y,
            eye.z
        );
        if session.chat.is_open() {
            title.push_str(&format!(" | chatting: {}_", session.chat.draft()));
            if session.chat.is_sending() {
                title.push_str(" (waiting)");
            }
        } else if session.game.proximity.prompt_visible() {
            title.push_str(&format!(" | press E to talk to {}", session.chat.npc_name()));
        }
        if title != self.last_title {
            if let Some(window) = &self.window {
                window.set_title(&title);
            }
            self.last_title = title;
        }
    }
}

impl ApplicationHandler for Engine {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title("citywalk")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        match event_loop.create_window(window_attrs) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => {
                tracing::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        }
        tracing::info!("Window created");

        self.start_watcher();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        // Feed all events to input system
        self.session
            .translator
            .handle_window_event(&event, &mut self.session.input);

        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("Close requested, exiting");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_chat_key(&event),
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                if !self.session.chat.is_open() {
                    self.grab_cursor();
                }
            }
            WindowEvent::Focused(false) => self.release_cursor(),
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: winit::event::DeviceEvent,
    ) {
        self.session
            .translator
            .handle_device_event(&event, &mut self.session.input);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Open a window and run until it closes.
pub fn run(session: GameSession, hot_reload: bool) -> Result<(), winit::error::EventLoopError> {
    let event_loop = EventLoop::new()?;
    let mut engine = Engine::new(session, hot_reload);
    event_loop.run_app(&mut engine)
}
