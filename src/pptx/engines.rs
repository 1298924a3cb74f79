//! Rendering engines and the render context.
//!
//! An engine turns one template fragment into a rendered string, or `None`
//! for directives that only have side effects. Engines are composable: the
//! directive engine recognizes `{% ... %}` control fragments and delegates
//! everything else to an inner engine, with the plain `{name}` substitution
//! engine as the usual fallback.

use crate::error::Result;
use crate::pptx::placeholders::PlaceholderFragment;
use std::collections::{BTreeMap, VecDeque};

/// A context value: scalar text or a consumable list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    List(VecDeque<String>),
}

/// The mutable data a render pass draws from.
///
/// Directives mutate the context as rendering proceeds (popping list heads,
/// rebinding aliases), which is why evaluation order matters.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), Value::Text(value.into()));
    }

    pub fn set_list<I, S>(&mut self, key: impl Into<String>, items: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values.insert(
            key.into(),
            Value::List(items.into_iter().map(Into::into).collect()),
        );
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(Value::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Whether a list value exists under the key and still has elements.
    pub fn list_non_empty(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(Value::List(items)) if !items.is_empty())
    }

    /// Pop the head of the list under `key`, if any remains.
    pub fn pop_front(&mut self, key: &str) -> Option<String> {
        match self.values.get_mut(key) {
            Some(Value::List(items)) => items.pop_front(),
            _ => None,
        }
    }
}

/// Per-slide control effects requested by directives during rendering.
///
/// The scope object is created fresh for every slide pass, so engines stay
/// stateless across renders.
#[derive(Debug, Default)]
pub struct SlideScope {
    repeat_requested: bool,
}

impl SlideScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the driver to duplicate the current slide after this pass.
    pub fn request_repeat(&mut self) {
        self.repeat_requested = true;
    }

    pub(crate) fn repeat_requested(&self) -> bool {
        self.repeat_requested
    }
}

/// The single capability a rendering engine exposes.
///
/// `None` means no-op: the placeholder is left untouched. The placeholder
/// and scope handles are passed explicitly so directives can act on the
/// current slide without the engine holding per-render state.
pub trait RenderEngine {
    fn render(
        &mut self,
        fragment: &str,
        ctx: &mut Context,
        placeholder: &PlaceholderFragment,
        scope: &mut SlideScope,
    ) -> Result<Option<String>>;
}

/// Plain `{name}` substitution from context text values.
///
/// Unknown names are left in place verbatim; `{{` and `}}` escape literal
/// braces.
#[derive(Debug, Default)]
pub struct FormatEngine;

impl FormatEngine {
    pub fn new() -> Self {
        Self
    }

    fn substitute(fragment: &str, ctx: &Context) -> String {
        let mut out = String::with_capacity(fragment.len());
        let mut chars = fragment.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                },
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                },
                '{' => {
                    let mut key = String::new();
                    let mut closed = false;
                    for k in chars.by_ref() {
                        if k == '}' {
                            closed = true;
                            break;
                        }
                        key.push(k);
                    }
                    match (closed, ctx.get_text(&key)) {
                        (true, Some(value)) => out.push_str(value),
                        (true, None) => {
                            out.push('{');
                            out.push_str(&key);
                            out.push('}');
                        },
                        (false, _) => {
                            out.push('{');
                            out.push_str(&key);
                        },
                    }
                },
                c => out.push(c),
            }
        }
        out
    }
}

impl RenderEngine for FormatEngine {
    fn render(
        &mut self,
        fragment: &str,
        ctx: &mut Context,
        _placeholder: &PlaceholderFragment,
        _scope: &mut SlideScope,
    ) -> Result<Option<String>> {
        Ok(Some(Self::substitute(fragment, ctx)))
    }
}

/// A parsed `{% ... %}` control fragment.
enum Directive {
    RepeatWhile { var: String },
    Pop { var: String, alias: String },
}

impl Directive {
    fn parse(fragment: &str) -> Option<Directive> {
        let body = fragment
            .trim()
            .strip_prefix("{%")?
            .strip_suffix("%}")?
            .trim();
        let tokens: Vec<&str> = body.split_whitespace().collect();
        match tokens.as_slice() {
            ["repeatwhile", var] => Some(Directive::RepeatWhile {
                var: var.to_string(),
            }),
            ["pop", var, "as", alias] => Some(Directive::Pop {
                var: var.to_string(),
                alias: alias.to_string(),
            }),
            _ => None,
        }
    }
}

/// Recognizes control directives; everything else goes to the inner engine.
#[derive(Debug, Default)]
pub struct DirectiveEngine<E> {
    inner: E,
}

impl<E: RenderEngine> DirectiveEngine<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

impl<E: RenderEngine> RenderEngine for DirectiveEngine<E> {
    fn render(
        &mut self,
        fragment: &str,
        ctx: &mut Context,
        placeholder: &PlaceholderFragment,
        scope: &mut SlideScope,
    ) -> Result<Option<String>> {
        match Directive::parse(fragment) {
            Some(Directive::RepeatWhile { var }) => {
                if ctx.list_non_empty(&var) {
                    scope.request_repeat();
                }
                Ok(None)
            },
            Some(Directive::Pop { var, alias }) => {
                if let Some(head) = ctx.pop_front(&var) {
                    ctx.set_text(alias, head);
                }
                Ok(None)
            },
            None => self.inner.render(fragment, ctx, placeholder, scope),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pptx::shapes::Rect;

    fn dummy_placeholder() -> PlaceholderFragment {
        PlaceholderFragment {
            idx: 0,
            ph_type: None,
            text: String::new(),
            rect: Rect::default(),
        }
    }

    #[test]
    fn format_engine_substitutes_known_keys() {
        let mut ctx = Context::new();
        ctx.set_text("name", "Ada");
        let out = FormatEngine::substitute("Dear {name}, re {unknown}: {{literal}}", &ctx);
        assert_eq!(out, "Dear Ada, re {unknown}: {literal}");
    }

    #[test]
    fn pop_rebinds_list_head_under_alias() {
        let mut ctx = Context::new();
        ctx.set_list("guests", ["first", "second"]);

        let mut engine = DirectiveEngine::new(FormatEngine::new());
        let mut scope = SlideScope::new();
        let result = engine
            .render(
                "{% pop guests as guest %}",
                &mut ctx,
                &dummy_placeholder(),
                &mut scope,
            )
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(ctx.get_text("guest"), Some("first"));
        assert!(ctx.list_non_empty("guests"));

        // the popped value now feeds plain substitution
        let rendered = engine
            .render("Hello {guest}", &mut ctx, &dummy_placeholder(), &mut scope)
            .unwrap();
        assert_eq!(rendered.as_deref(), Some("Hello first"));
    }

    #[test]
    fn repeatwhile_requests_repeat_only_while_non_empty() {
        let mut ctx = Context::new();
        ctx.set_list("items", ["only"]);
        let mut engine = DirectiveEngine::new(FormatEngine::new());

        let mut scope = SlideScope::new();
        engine
            .render("{% repeatwhile items %}", &mut ctx, &dummy_placeholder(), &mut scope)
            .unwrap();
        assert!(scope.repeat_requested());

        ctx.pop_front("items");
        let mut scope = SlideScope::new();
        engine
            .render("{% repeatwhile items %}", &mut ctx, &dummy_placeholder(), &mut scope)
            .unwrap();
        assert!(!scope.repeat_requested());
    }

    #[test]
    fn unknown_directive_falls_through_to_inner_engine() {
        let mut ctx = Context::new();
        let mut engine = DirectiveEngine::new(FormatEngine::new());
        let mut scope = SlideScope::new();
        let rendered = engine
            .render("{% frobnicate x %}", &mut ctx, &dummy_placeholder(), &mut scope)
            .unwrap();
        // not a recognized directive; treated as plain text
        assert_eq!(rendered.as_deref(), Some("{% frobnicate x %}"));
    }
}
