//! School-facing collaborators: CRUD-over-network display logic with no
//! state machine beyond loading/loaded/error. Everything here consumes the
//! provider's generic record store and the read-only identity snapshot.

pub mod dashboard;
pub mod doubts;
pub mod homework;
