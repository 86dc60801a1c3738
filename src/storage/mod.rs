//! 持久化层

pub mod backend;

pub use backend::SeaOrmStorage;
