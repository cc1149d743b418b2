pub mod context;
pub mod descriptor;
pub mod error;
pub mod hub_config;
pub mod registry;
pub mod supervisor;
