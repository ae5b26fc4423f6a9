//! Strength-training session tracking and analytics core.
//!
//! The crate is a library-level contract for an embedding application: a
//! SQLite-backed store of routines, days, exercise templates, workout
//! sessions and set logs; a session lifecycle manager that guarantees at most
//! one session is active at a time; and a read-only analytics engine for
//! streaks, weekly volume and rolling dashboard statistics. All of it is
//! reachable through [`WorkoutService`].

pub mod analytics;
pub mod db;
pub mod logging;
pub mod service;
pub mod session;

pub use service::WorkoutService;
