pub mod config_tests;
pub mod configuration_tests;
pub mod container_tests;
