//! UI layer for desktop GUI: the single-window app shell and its panels.

pub mod app;

pub use app::SkyBridgeApp;
