mod block_file;
mod cache;
pub mod codec;
mod config;
mod node;
mod similarity;
mod tree;

pub use block_file::*;
pub use cache::*;
pub use config::*;
pub use node::*;
pub use tree::*;
