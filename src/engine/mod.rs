// Playback orchestration: engine seam, module registry, sessions and the controller.

pub mod binding;
pub mod controller;
pub mod session;
pub mod stats;
pub mod traits;
