#[path = "integration/scenarios.rs"]
mod scenarios;
#[path = "integration/configuration.rs"]
mod configuration;
#[path = "integration/diagnostics.rs"]
mod diagnostics;
