pub mod download;
pub mod settings;
