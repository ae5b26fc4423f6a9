//! Session lifecycle management: starting, ending and cancelling workouts and
//! recording completed sets, under the single-active-session invariant.

mod manager;

pub use manager::SessionManager;
