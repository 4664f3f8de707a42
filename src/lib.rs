pub mod alerting;
pub mod db;
pub mod engine;
pub mod ingestion;
pub mod models;
pub mod notifications;
pub mod probes;
pub mod scheduler;
pub mod server;
pub mod web;
