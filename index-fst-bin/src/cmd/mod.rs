pub mod csv;
pub mod get;
pub mod map;
pub mod node;
pub mod range;
pub mod verify;
