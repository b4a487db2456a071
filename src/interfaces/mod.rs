pub mod hook;

pub use hook::{AfterHook, BeforeHook};
