pub mod engine;
pub mod template;

pub use engine::{render_str, translate_mustache, unresolved_names, Engine};
pub use template::{render, LoadedTemplate, RenderedPair};
