//! Domain logic

pub mod backup;
