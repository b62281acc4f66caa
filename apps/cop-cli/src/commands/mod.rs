pub mod catalog;
pub mod classify;
pub mod config;
pub mod evaluate;
mod util;

pub use catalog::CatalogArgs;
pub use classify::ClassifyArgs;
pub use config::ConfigCmd;
pub use evaluate::{BannerArgs, EvaluateArgs};
