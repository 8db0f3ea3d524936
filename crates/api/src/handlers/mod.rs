pub mod experiments;
pub mod health;
pub mod microscopes;
pub mod review;
pub mod samples;
pub mod stats;
