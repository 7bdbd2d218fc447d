pub mod core;
pub mod services;
pub mod ui;
pub mod utils;
