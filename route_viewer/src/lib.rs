pub mod directions;
pub mod engine;
pub mod indicator;
pub mod playback;
pub mod scene;
