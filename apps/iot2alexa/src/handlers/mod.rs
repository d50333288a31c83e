//! HTTP handlers

mod health;
mod metrics;
mod skill;

pub use health::health;
pub use metrics::get_metrics;
pub use skill::handle_skill;
