//! SeaORM entities backing the relational store.

pub mod incident;
pub mod monitor;
pub mod monitor_check;
pub mod setting;

pub mod prelude {
    pub use super::incident::Entity as Incident;
    pub use super::monitor::Entity as Monitor;
    pub use super::monitor_check::Entity as MonitorCheck;
    pub use super::setting::Entity as Setting;
}
