mod app;
mod config;
mod empire;
mod input;
mod logging;
mod remote;
mod storage;
mod time;
mod widgets;

use std::{cell::RefCell, io, rc::Rc};

use app::App;
use config::Config;
use empire::Services;
use input::{
    pixel_x_to_col, pixel_y_to_row, ClickState, InputEvent, KEY_BACKSPACE, KEY_ENTER, KEY_ESC,
    KEY_LEFT, KEY_RIGHT, KEY_TAB,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratzilla::event::{KeyCode, MouseButton, MouseEventKind};
use ratzilla::ratatui::Terminal;
use ratzilla::{DomBackend, WebRenderer};
use remote::simulated::SimulatedRemote;
use remote::RemoteStore;
use storage::KeyValueStore;

fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

fn browser_online() -> bool {
    web_sys::window().map_or(true, |w| w.navigator().on_line())
}

/// Query the grid container's bounding rect and convert pixel coordinates
/// to a terminal cell.
fn dom_pixel_to_cell(mouse_x: u32, mouse_y: u32, cs: &ClickState) -> Option<(u16, u16)> {
    let window = web_sys::window()?;
    let document = window.document()?;

    // DomBackend creates a <div> as the grid container inside <body>.
    let grid = document.query_selector("body > div").ok()??;
    let rect = grid.get_bounding_client_rect();

    let click_x = mouse_x as f64 - rect.left();
    let click_y = mouse_y as f64 - rect.top();

    let col = pixel_x_to_col(click_x, rect.width(), cs.terminal_cols)?;
    let row = pixel_y_to_row(click_y, rect.height(), cs.terminal_rows)?;
    Some((col, row))
}

#[cfg(target_arch = "wasm32")]
fn browser_storage() -> Box<dyn KeyValueStore> {
    Box::new(storage::BrowserStorage)
}

#[cfg(not(target_arch = "wasm32"))]
fn browser_storage() -> Box<dyn KeyValueStore> {
    Box::new(storage::MemoryStorage::new())
}

fn build_remote(config: &Config) -> Box<dyn RemoteStore> {
    #[cfg(target_arch = "wasm32")]
    {
        if let Some(remote) = &config.remote {
            log::info!("using hosted backend at {}", remote.url);
            return Box::new(remote::http::HttpRemote::new(remote));
        }
    }
    log::info!("using the in-browser simulated backend");
    Box::new(SimulatedRemote::persisted(
        config.tuning.sim_latency_ms,
        now_ms(),
        browser_storage(),
    ))
}

fn reload_page() {
    let reloaded = web_sys::window().map(|w| w.location().reload());
    if !matches!(reloaded, Some(Ok(()))) {
        log::error!("page reload failed");
    }
}

fn main() -> io::Result<()> {
    console_error_panic_hook::set_once();

    let storage = browser_storage();
    let config = Config::load(storage.as_ref());
    logging::init(logging::parse_level(&config.log_level));

    let services = Services {
        remote: build_remote(&config),
        storage,
        rng: StdRng::from_os_rng(),
        online: browser_online,
    };
    let app = Rc::new(RefCell::new(App::new(services, config.tuning.clone(), now_ms())));
    let click_state = Rc::new(RefCell::new(ClickState::new()));
    let backend = DomBackend::new()?;
    let terminal = Terminal::new(backend)?;

    // Mouse/touch: press hits a target, moves drag the slider, release lets go.
    terminal.on_mouse_event({
        let app = app.clone();
        let click_state = click_state.clone();
        move |mouse_event| {
            let cs = click_state.borrow();
            if cs.terminal_rows == 0 || cs.terminal_cols == 0 {
                return;
            }
            let event = match mouse_event.event {
                MouseEventKind::Pressed if mouse_event.button == MouseButton::Left => {
                    let Some((col, row)) = dom_pixel_to_cell(mouse_event.x, mouse_event.y, &cs) else {
                        return;
                    };
                    let Some(action_id) = cs.hit_test(col, row) else {
                        return;
                    };
                    log::debug!("click at ({col}, {row}) -> action {action_id}");
                    InputEvent::Click(action_id)
                }
                MouseEventKind::Moved if cs.drag_track.is_some() => {
                    let Some((col, _)) = dom_pixel_to_cell(mouse_event.x, mouse_event.y, &cs) else {
                        return;
                    };
                    let Some(fraction) = cs.track_fraction(col) else {
                        return;
                    };
                    InputEvent::Drag { fraction }
                }
                MouseEventKind::Released => InputEvent::Release,
                _ => return,
            };
            drop(cs);
            app.borrow_mut().handle_input(&event);
        }
    });

    // Keyboard handler
    terminal.on_key_event({
        let app = app.clone();
        move |key_event| {
            let key = match key_event.code {
                KeyCode::Char(c) => c,
                KeyCode::Enter => KEY_ENTER,
                KeyCode::Esc => KEY_ESC,
                KeyCode::Backspace => KEY_BACKSPACE,
                KeyCode::Tab => KEY_TAB,
                KeyCode::Left => KEY_LEFT,
                KeyCode::Right => KEY_RIGHT,
                _ => return,
            };
            app.borrow_mut().handle_input(&InputEvent::Key(key));
        }
    });

    terminal.draw_web({
        let click_state = click_state.clone();
        move |f| {
            let size = f.area();
            {
                let mut cs = click_state.borrow_mut();
                cs.terminal_cols = size.width;
                cs.terminal_rows = size.height;
                cs.clear_targets();
            }

            if app.borrow_mut().tick(now_ms()) {
                reload_page();
            }
            app.borrow().render(f, size, &click_state);
        }
    });

    Ok(())
}
