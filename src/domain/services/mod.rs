mod block_decision;

pub use block_decision::BlockDecision;
