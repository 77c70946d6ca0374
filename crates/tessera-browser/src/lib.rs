//! Browser DOM layer for the tessera page builder.
//!
//! This crate binds a [`PageEditor`] to a live canvas element. It assumes a
//! `wasm32-unknown-unknown` target environment.
//!
//! # Architecture
//!
//! - `probe`: `LayoutProbe` backed by `getBoundingClientRect`/`elementFromPoint`
//! - `feedback`: insertion line and drop overlay elements
//! - `events`: DOM event extraction (points, keys, controls, files)
//! - `mount`: canvas rendering and event wiring
//! - `platform`: Browser/OS detection for platform-specific behavior
//!
//! # Re-exports
//!
//! This crate re-exports `tessera-core` for convenience, so consumers
//! only need to depend on `tessera-browser`.

// Re-export core crate
pub use tessera_core;
pub use tessera_core::*;

pub mod events;
pub mod feedback;
pub mod mount;
pub mod platform;
pub mod probe;

pub use feedback::FeedbackLayer;
pub use mount::{BrowserConfirm, PageCanvas};
pub use platform::{Platform, platform};
pub use probe::DomLayoutProbe;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use wasm_bindgen::prelude::*;

/// Install the panic hook and route `tracing` to the browser console.
///
/// Safe to call more than once; later calls keep the first subscriber.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();

    let level = if cfg!(debug_assertions) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(level)
            .build(),
    );
    let subscriber = tracing_subscriber::Registry::default()
        .with(EnvFilter::new("tessera_core=debug,tessera_browser=debug"))
        .with(wasm_layer);

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
