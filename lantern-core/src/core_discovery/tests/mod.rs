//! Engine-level scenarios over in-memory collaborators

mod hub_scenarios;
