pub mod history_routes;
pub mod monitor_routes;
pub mod notification_routes;
pub mod passive_routes;
pub mod telegram_routes;
