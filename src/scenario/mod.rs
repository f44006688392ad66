//! Scenario generation: campaigns, moods, customer profiles, and the prompts
//! that drive the simulated customer.

pub mod campaign;
pub mod generator;
pub mod profile;
pub mod prompts;

pub use campaign::{Campaign, Mood};
pub use generator::{Avatar, GeneratedCustomer, GeneratorConfig, ScenarioGenerator};
pub use profile::{CustomerProfile, parse_profile};
pub use prompts::{CustomerReply, parse_customer_reply};
