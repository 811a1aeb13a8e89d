//! # Path Tokenization
//!
//! This crate turns slash-delimited path strings into ordered component
//! sequences for the file system to resolve.
//!
//! ## Philosophy
//!
//! - **Parsing is pure**: no directory state is consulted here
//! - **Names are bounded**: every component is length-checked before any
//!   storage is touched
//! - **Ownership does the cleanup**: a parsed path is an owned sequence;
//!   dropping it releases every component on any exit path
//!
//! ## Design
//!
//! - `PathComponent` is a single bounded name
//! - `ParsedPath` is the root-to-leaf component sequence with a
//!   `pop_leaf` operation that hands the final component to the caller
//! - "." and ".." receive no special treatment; they are ordinary names

pub mod path;

pub use path::{ParsedPath, PathComponent, PathError, NAME_MAX};
