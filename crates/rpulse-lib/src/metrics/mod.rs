pub mod focus;
pub mod hrv;
pub mod spectrum;
