pub(crate) mod orchestrator;
pub(crate) mod queue;
pub(crate) mod scoring;
pub(crate) mod session;
