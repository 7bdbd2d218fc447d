pub mod bible;
pub mod export;
pub mod generation;
pub mod wizard;
