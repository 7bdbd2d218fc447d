pub mod config;
pub mod error;
pub mod io;
pub mod session;
pub mod state;
