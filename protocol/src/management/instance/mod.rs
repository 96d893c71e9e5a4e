mod console;
mod report;
mod settings;
mod status;

pub use console::*;
pub use report::*;
pub use settings::*;
pub use status::*;
