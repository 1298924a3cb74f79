//! Placeholder templating for PresentationML slide decks.
//!
//! Layout placeholder text is the template source; per slide, fragments are
//! evaluated in an order inferred from shape geometry and handed to a
//! pluggable rendering engine, which may substitute text, embed pictures, or
//! drive slide repetition through control directives.

pub mod engines;
pub mod placeholders;
pub mod shapes;
pub mod slides;
pub mod template;

pub use engines::{Context, DirectiveEngine, FormatEngine, RenderEngine, SlideScope, Value};
pub use placeholders::PlaceholderFragment;
pub use shapes::Rect;
pub use slides::SlideContext;
pub use template::PptxTemplate;
