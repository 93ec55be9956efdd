mod core;
pub use core::{CompletionOptions, FragmentStream, Message, Role, completion_stream};
