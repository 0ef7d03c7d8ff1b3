// Configuration module for cfgedit
// Settings are passed explicitly into the components that need them

pub mod settings;

pub use settings::{PublishSettings, ServerSettings, Settings};
