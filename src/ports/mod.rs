//! Port traits for the pipeline's external collaborators.

pub mod config_port;
pub mod data_port;
pub mod render_port;
