pub mod progress;
pub mod text;
