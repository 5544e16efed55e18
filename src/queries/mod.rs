//! Query and mutation operations resolved against the store through the
//! response cache. Transport wiring lives outside this crate; these are the
//! operations it calls.

pub mod articles;
pub mod feeds;
pub mod publishers;
