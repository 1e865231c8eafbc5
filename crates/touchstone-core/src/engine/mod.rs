pub mod interaction;
pub mod orchestrator;
pub mod validator;
