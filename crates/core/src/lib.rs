pub mod config;
pub mod domain;
pub mod generator;
pub mod llm;

pub use domain::generated::Generated;
pub use generator::RecommendationGenerator;
