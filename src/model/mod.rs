//! Records handled by the directory.

mod membership;
mod options;
mod roles;
mod user;

pub use membership::*;
pub use options::*;
pub use roles::*;
pub use user::*;
