//! Top-level screens: the sign-in form and the signed-in dashboard.

use std::cell::RefCell;
use std::rc::Rc;

use ratzilla::ratatui::layout::Rect;
use ratzilla::ratatui::Frame;

use crate::config::Tuning;
use crate::empire::actions::{SIGN_IN_SUBMIT, SIGN_IN_TOGGLE_MODE};
use crate::empire::render::render_sign_in;
use crate::empire::state::EpochMs;
use crate::empire::{EmpireGame, Services, Signal};
use crate::input::{ClickState, InputEvent, KEY_BACKSPACE, KEY_ENTER, KEY_TAB};

const MAX_USERNAME: usize = 20;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SignInForm {
    pub username: String,
    pub register_mode: bool,
    pub message: Option<String>,
}

impl SignInForm {
    fn type_char(&mut self, c: char) {
        if (c.is_ascii_alphanumeric() || c == '_') && self.username.len() < MAX_USERNAME {
            self.username.push(c);
            self.message = None;
        }
    }
}

pub enum AppState {
    SignIn(SignInForm),
    Playing(Box<EmpireGame>),
}

pub struct App {
    pub state: AppState,
    /// Held here while signed out; the game owns them while playing.
    services: Option<Services>,
    tuning: Tuning,
    /// Name last submitted, restored into the form after leaving the game.
    username: String,
    now_ms: EpochMs,
}

impl App {
    pub fn new(services: Services, tuning: Tuning, now_ms: EpochMs) -> Self {
        Self {
            state: AppState::SignIn(SignInForm::default()),
            services: Some(services),
            tuning,
            username: String::new(),
            now_ms,
        }
    }

    fn submit(&mut self) {
        let AppState::SignIn(form) = &mut self.state else {
            return;
        };
        let username = form.username.trim().to_string();
        if username.is_empty() {
            form.message = Some("Enter a username".into());
            return;
        }
        let register = form.register_mode;
        self.username = username.clone();
        let Some(services) = self.services.take() else {
            log::error!("services missing on sign-in");
            return;
        };
        log::info!("{} as {username}", if register { "registering" } else { "signing in" });
        let game = EmpireGame::sign_in(services, self.tuning.clone(), &username, register, self.now_ms);
        self.state = AppState::Playing(Box::new(game));
    }

    fn leave_game(&mut self, message: Option<String>) {
        let state = std::mem::replace(&mut self.state, AppState::SignIn(SignInForm::default()));
        if let AppState::Playing(game) = state {
            self.services = Some(game.shutdown());
            self.state = AppState::SignIn(SignInForm {
                username: self.username.clone(),
                register_mode: false,
                message,
            });
        }
    }

    pub fn handle_input(&mut self, event: &InputEvent) -> bool {
        if let AppState::Playing(game) = &mut self.state {
            return game.handle_input(event);
        }
        if matches!(event, InputEvent::Key(KEY_ENTER) | InputEvent::Click(SIGN_IN_SUBMIT)) {
            self.submit();
            return true;
        }
        let AppState::SignIn(form) = &mut self.state else {
            return false;
        };
        match event {
            InputEvent::Key(KEY_TAB) | InputEvent::Click(SIGN_IN_TOGGLE_MODE) => {
                form.register_mode = !form.register_mode;
                form.message = None;
                true
            }
            InputEvent::Key(KEY_BACKSPACE) => {
                form.username.pop();
                true
            }
            InputEvent::Key(c) => {
                form.type_char(*c);
                true
            }
            _ => false,
        }
    }

    /// Advance the clock. Returns true when the host must reload the page.
    pub fn tick(&mut self, now_ms: EpochMs) -> bool {
        self.now_ms = now_ms;
        let signal = match &mut self.state {
            AppState::Playing(game) => {
                game.tick(now_ms);
                game.take_signal()
            }
            AppState::SignIn(_) => None,
        };
        match signal {
            Some(Signal::Reload) => true,
            Some(Signal::SignedOut(message)) => {
                self.leave_game(message);
                false
            }
            None => false,
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect, click_state: &Rc<RefCell<ClickState>>) {
        match &self.state {
            AppState::Playing(game) => game.render(f, area, click_state),
            AppState::SignIn(form) => render_sign_in(
                &form.username,
                form.register_mode,
                form.message.as_deref(),
                f,
                area,
                click_state,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KEY_ESC;
    use crate::remote::simulated::SimulatedRemote;
    use crate::storage::MemoryStorage;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const NOW: u64 = 1_700_000_000_000;

    fn app() -> App {
        let services = Services {
            remote: Box::new(SimulatedRemote::new(0, 1)),
            storage: Box::new(MemoryStorage::new()),
            rng: StdRng::seed_from_u64(1),
            online: || true,
        };
        App::new(services, Tuning::default(), NOW)
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            app.handle_input(&InputEvent::Key(c));
        }
    }

    fn form(app: &App) -> &SignInForm {
        match &app.state {
            AppState::SignIn(form) => form,
            AppState::Playing(_) => panic!("expected the sign-in screen"),
        }
    }

    #[test]
    fn form_filters_characters() {
        let mut app = app();
        type_str(&mut app, "a b-c_1!");
        assert_eq!(form(&app).username, "abc_1");
        app.handle_input(&InputEvent::Key(KEY_BACKSPACE));
        assert_eq!(form(&app).username, "abc_");
    }

    #[test]
    fn empty_username_is_refused() {
        let mut app = app();
        app.handle_input(&InputEvent::Click(SIGN_IN_SUBMIT));
        assert_eq!(form(&app).message.as_deref(), Some("Enter a username"));
    }

    #[test]
    fn unknown_user_returns_to_form_with_message() {
        let mut app = app();
        type_str(&mut app, "ghost");
        app.handle_input(&InputEvent::Key(KEY_ENTER));
        assert!(matches!(app.state, AppState::Playing(_)));
        app.tick(NOW);
        assert_eq!(form(&app).username, "ghost");
        assert_eq!(
            form(&app).message.as_deref(),
            Some("Unknown username. Create an account first.")
        );
    }

    #[test]
    fn register_play_and_sign_out() {
        let mut app = app();
        type_str(&mut app, "pilot");
        app.handle_input(&InputEvent::Click(SIGN_IN_TOGGLE_MODE));
        assert!(form(&app).register_mode);
        app.handle_input(&InputEvent::Key(KEY_ENTER));
        for _ in 0..3 {
            assert!(!app.tick(NOW));
        }
        let AppState::Playing(game) = &app.state else {
            panic!("expected to be playing");
        };
        assert_eq!(game.store.username.as_deref(), Some("pilot"));

        app.handle_input(&InputEvent::Key(KEY_ESC));
        app.tick(NOW + 16);
        assert_eq!(form(&app).username, "pilot");
        assert!(!form(&app).register_mode);

        // Same services, so the account still exists.
        app.handle_input(&InputEvent::Key(KEY_ENTER));
        app.tick(NOW + 32);
        assert!(matches!(app.state, AppState::Playing(_)));
    }
}
