pub mod avl_tree;
pub mod config;
pub mod error;
pub mod iter;
pub mod trace;

pub use avl_tree::{AvlTree, DefaultDebug};
pub use config::{CheckedConfig, ConfigT, PlainConfig, PlainConfigDebug};
pub use error::AvlError;
pub use trace::{Rebalance, SharedTrace};
