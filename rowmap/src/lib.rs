//! An object-relational mapping micro-library.
//!
//! `rowmap` materializes tabular query results into plain Rust values with
//! no reflection and no per-row name resolution: for each (query, shape,
//! target) combination it compiles a transform once, caches it keyed by a
//! composite identity, and invalidates it when the live column schema's
//! fingerprint stops matching the one the transform was compiled against.
//!
//! The entry point is [`Mapper`]; row sources plug in behind the
//! [`cursor::Cursor`] and [`cursor::Connection`] traits.

pub mod error;

pub mod command;
pub mod config;

pub mod schema {
    pub mod column;
    pub mod fingerprint;
    pub mod ty;
}

pub mod value;

pub mod cursor;
pub mod handlers;
pub mod mem;
pub mod params;

pub mod exec;

pub mod cache {
    pub mod identity;
    pub mod plan;
}

pub mod db;

pub use command::{Command, CommandKind};
pub use config::MapConfig;
pub use db::{Fetch, Grid, Mapper};
pub use error::{Error, MapResult};
pub use exec::multi::{Skip, SplitOn};
pub use value::Value;
