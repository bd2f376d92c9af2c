//! Shared utility modules used across blockdex components.

pub mod varint;
