pub mod extract;
pub mod list;

pub use extract::run as extract;
pub use list::run as list;
