//! stash-domain
//!
//! Pure document models (User, Category, Transaction, summaries, paths, windows).
//! No I/O, no storage, no async. Only data types and the folds over them.

pub mod category;
pub mod common;
pub mod path;
pub mod summary;
pub mod transaction;
pub mod user;
pub mod window;

pub use category::*;
pub use common::*;
pub use path::*;
pub use summary::*;
pub use transaction::*;
pub use user::*;
pub use window::*;
