#![allow(dead_code, unused_imports)]

pub use arisa_test_utils::builders;
pub use arisa_test_utils::timeline::{Span, Timeline};
pub use arisa_test_utils::{init_tracing, settle, with_timeout};
