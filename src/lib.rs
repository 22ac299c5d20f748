pub mod config;
pub mod error;
pub mod events;
pub mod gallery;
pub mod image;
pub mod source;
pub mod tasks {
    pub mod breed;
    pub mod catalog;
}

pub use error::Error;
