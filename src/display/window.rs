use super::{DisplayImage, DisplaySink, Key};
use anyhow::{anyhow, Result};
use minifb::{KeyRepeat, Window, WindowOptions};
use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of the key poll loop
const POLL_SLICE: Duration = Duration::from_millis(1);

/// Native windows through minifb, one per window name
pub struct WindowDisplay {
    windows: HashMap<String, Window>,
    /// Closing this window reports `Key::WindowClosed`; others just go away
    primary: String,
}

impl WindowDisplay {
    pub fn new(primary: &str) -> Self {
        Self {
            windows: HashMap::new(),
            primary: primary.to_string(),
        }
    }

    fn window_for(&mut self, name: &str, width: usize, height: usize) -> Result<&mut Window> {
        if !self.windows.contains_key(name) {
            tracing::debug!("Opening window {:?} at {}x{}", name, width, height);
            let mut window = Window::new(name, width, height, WindowOptions::default())
                .map_err(|e| anyhow!("Failed to open window {:?}: {}", name, e))?;
            // The scanner paces itself through poll_key.
            window.set_target_fps(0);
            self.windows.insert(name.to_string(), window);
        }

        self.windows
            .get_mut(name)
            .ok_or_else(|| anyhow!("window {:?} vanished", name))
    }
}

impl DisplaySink for WindowDisplay {
    fn show(&mut self, name: &str, image: DisplayImage<'_>) -> Result<()> {
        let (width, height) = image.dimensions();
        let buffer = image.to_argb();

        self.window_for(name, width, height)?
            .update_with_buffer(&buffer, width, height)
            .map_err(|e| anyhow!("Failed to draw window {:?}: {}", name, e))
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<Key>> {
        let deadline = Instant::now() + timeout;

        loop {
            let mut closed = Vec::new();
            for (name, window) in self.windows.iter_mut() {
                window.update();
                if !window.is_open() {
                    closed.push(name.clone());
                    continue;
                }
                if let Some(key) = window
                    .get_keys_pressed(KeyRepeat::No)
                    .into_iter()
                    .find_map(map_key)
                {
                    return Ok(Some(key));
                }
            }

            if !closed.is_empty() {
                for name in &closed {
                    tracing::debug!("Window {:?} closed", name);
                    self.windows.remove(name);
                }
                if let Some(key) = close_event(&self.primary, &closed) {
                    return Ok(Some(key));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(POLL_SLICE.min(deadline - now));
        }
    }

    fn destroy_all(&mut self) {
        tracing::debug!("Closing {} window(s)", self.windows.len());
        // minifb closes a window when it is dropped.
        self.windows.clear();
    }
}

/// Only the primary window ends the session; secondary windows reopen on
/// their next `show`
fn close_event(primary: &str, closed: &[String]) -> Option<Key> {
    closed
        .iter()
        .any(|name| name == primary)
        .then_some(Key::WindowClosed)
}

fn map_key(key: minifb::Key) -> Option<Key> {
    use minifb::Key as K;

    let c = match key {
        K::Escape => return Some(Key::Escape),
        K::A => 'a',
        K::B => 'b',
        K::C => 'c',
        K::D => 'd',
        K::E => 'e',
        K::F => 'f',
        K::G => 'g',
        K::H => 'h',
        K::I => 'i',
        K::J => 'j',
        K::K => 'k',
        K::L => 'l',
        K::M => 'm',
        K::N => 'n',
        K::O => 'o',
        K::P => 'p',
        K::Q => 'q',
        K::R => 'r',
        K::S => 's',
        K::T => 't',
        K::U => 'u',
        K::V => 'v',
        K::W => 'w',
        K::X => 'x',
        K::Y => 'y',
        K::Z => 'z',
        K::Key0 => '0',
        K::Key1 => '1',
        K::Key2 => '2',
        K::Key3 => '3',
        K::Key4 => '4',
        K::Key5 => '5',
        K::Key6 => '6',
        K::Key7 => '7',
        K::Key8 => '8',
        K::Key9 => '9',
        _ => return None,
    };
    Some(Key::Char(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_letters_digits_and_escape() {
        assert_eq!(map_key(minifb::Key::C), Some(Key::Char('c')));
        assert_eq!(map_key(minifb::Key::Key7), Some(Key::Char('7')));
        assert_eq!(map_key(minifb::Key::Escape), Some(Key::Escape));
        assert_eq!(map_key(minifb::Key::LeftShift), None);
    }

    #[test]
    fn closing_primary_window_is_reported() {
        let closed = vec!["Depth Scan".to_string(), "Standard Camera".to_string()];
        assert_eq!(close_event("Standard Camera", &closed), Some(Key::WindowClosed));
    }

    #[test]
    fn closing_secondary_window_is_not_reported() {
        let closed = vec!["Depth Scan".to_string()];
        assert_eq!(close_event("Standard Camera", &closed), None);
        assert_eq!(close_event("Standard Camera", &[]), None);
    }
}
