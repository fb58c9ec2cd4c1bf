//! BDD step definitions for the Jenkins monitor

pub mod aggregation_steps;
