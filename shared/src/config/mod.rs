pub mod loader;

pub use self::loader::{load_config, parse_config};
