pub mod contract;
pub mod generated;
pub mod observation;
pub mod prediction;
pub mod recommendation;
