//! Front ends for drivekeep: the scheduled backup runner and the
//! interactive file-management session.

pub mod backup;
pub mod display;
pub mod session;
pub mod setup;
