pub mod composite;
pub mod delta;
