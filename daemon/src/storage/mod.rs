pub mod file;
pub mod paths;

pub use paths::ServerPaths;
