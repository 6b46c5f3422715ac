pub mod dispatcher;
pub mod intent;
pub mod prompts;
pub mod session;
