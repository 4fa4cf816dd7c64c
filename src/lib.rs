#[macro_use] extern crate lazy_static;
#[macro_use] extern crate serde_derive;
#[macro_use] extern crate log;

mod id_arena;

pub mod config;
pub mod error;
pub mod planet;
pub mod timeline;
pub mod transform;

pub use crate::error::{Error, Result};
