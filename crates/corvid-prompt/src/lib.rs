pub mod compose;

pub use compose::{compose, image_prompt_enhancement, RetrievedContext};
