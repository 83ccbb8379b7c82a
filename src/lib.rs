//! tmplite: a minimal Jinja-like template renderer.
//!
//! Templates mix literal text with three kinds of tags:
//!
//! - `{{ name }}` interpolates a variable. Unbound names render as nothing.
//! - `{% for item in items %} ... {% endfor %}` repeats its body once per
//!   element of an array, binding `item` for that iteration only.
//! - `{% if condition %} ... {% endif %}` includes its body when the
//!   condition holds. There is no `else`.
//!
//! Conditions are a small closed language: literals (`'text'`, `42`,
//! `1.5`, `true`, `false`, `none`), variable names, `==`, `!=`, `<`, `<=`,
//! `>`, `>=`, `and`, `or`, `not` and parentheses. Nothing else can be
//! evaluated.
//!
//! Tags outside this grammar are left in the output as written. Broken
//! structure (an `endfor` with no `for`, crossing blocks, an unclosed
//! block), a loop over something that is not an array, and a condition
//! that does not evaluate are errors, and no output is returned.
//!
//! Text outside tags is copied exactly, whitespace included, unless
//! [`RenderOptions::trim_blocks`] is set.
//!
//! ```
//! use tmplite::{render, Context, Value};
//!
//! let mut ctx = Context::new();
//! ctx.insert("xs".into(), Value::from(vec!["a", "b", "c"]));
//! let out = render("{% for x in xs %}{{ x }}{% endfor %}", &ctx).unwrap();
//! assert_eq!(out, "abc");
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod site;
pub mod tag;
pub mod value;

use log::debug;

pub use error::RenderError;
pub use scope::{context_from_json, Context, Scope};
pub use tag::{tokenize, Token, TokenKind};
pub use value::Value;

use eval::Evaluator;
use lexer::Tokenizer;

/// Knobs for a [`Renderer`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Drop one newline directly after every `{% ... %}` tag.
    pub trim_blocks: bool,
    /// Reject templates whose blocks nest deeper than this.
    pub max_depth: Option<usize>,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trim_blocks(mut self, trim: bool) -> Self {
        self.trim_blocks = trim;
        self
    }

    pub fn max_depth(mut self, limit: usize) -> Self {
        self.max_depth = Some(limit);
        self
    }
}

/// Renders templates with a fixed set of options. Holds no per-render
/// state, so one renderer can be shared between threads.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    options: RenderOptions,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Render `template` against `context`.
    pub fn render(&self, template: &str, context: &Context) -> Result<String, RenderError> {
        let tokens =
            tag::tokenize_with(Tokenizer::new(template).trim_blocks(self.options.trim_blocks));
        debug!(
            "rendering template of {} bytes, {} tokens",
            template.len(),
            tokens.len()
        );
        tag::check_nesting(&tokens, self.options.max_depth)?;
        Evaluator::new(&tokens).render(&tokens, &Scope::root(context))
    }
}

/// Render `template` against `context` with default options.
pub fn render(template: &str, context: &Context) -> Result<String, RenderError> {
    Renderer::default().render(template, context)
}
