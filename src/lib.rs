pub mod error;
pub mod storage_engine;

pub use error::{Error, Result};
pub use storage_engine::{Tree, TreeConfig, ROOT_ADDRESS};
