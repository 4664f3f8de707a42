pub mod incident_tracker;
