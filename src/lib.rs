//! tatami: a tiling window manager core.
//!
//! The crate houses the window-management state machine, the virtual
//! workspace model and the pure layout engine. Platform plumbing (the
//! compositor connection, the accessibility observer, the event tap)
//! lives behind the seams in [`sys`].

pub mod actor;
pub mod common;
pub mod layout_engine;
pub mod model;
pub mod sys;
pub mod ui;
