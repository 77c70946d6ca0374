//! Browser and OS detection.

use std::sync::OnceLock;

/// What the page is running on, as far as key bindings care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub mac: bool,
    pub touch: bool,
}

static PLATFORM: OnceLock<Platform> = OnceLock::new();

/// Detect once per page and cache.
pub fn platform() -> Platform {
    *PLATFORM.get_or_init(detect)
}

fn detect() -> Platform {
    let Some(navigator) = web_sys::window().map(|w| w.navigator()) else {
        return Platform {
            mac: false,
            touch: false,
        };
    };
    let agent = navigator.user_agent().unwrap_or_default();
    Platform {
        mac: is_mac_agent(&agent),
        touch: navigator.max_touch_points() > 0,
    }
}

fn is_mac_agent(agent: &str) -> bool {
    agent.contains("Macintosh") || agent.contains("iPhone") || agent.contains("iPad")
}
