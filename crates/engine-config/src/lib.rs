pub mod hooks;
pub mod options;
pub mod report;
pub mod settings;
