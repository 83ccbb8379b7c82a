//! Name resolution for templates.
//!
//! A [`Scope`] is a chain of immutable frames over the caller's
//! [`Context`]. Entering a loop iteration pushes a frame binding the loop
//! variable; the frame lives on the evaluator's stack and is gone as soon
//! as that iteration's body has been rendered. The root context is only
//! ever borrowed shared, so rendering cannot change it.

use std::collections::HashMap;

use crate::value::Value;

/// Top-level variables supplied by the caller.
pub type Context = HashMap<String, Value>;

#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    Root(&'a Context),
    Frame {
        parent: &'a Scope<'a>,
        name: &'a str,
        value: &'a Value,
    },
}

impl<'a> Scope<'a> {
    pub fn root(context: &'a Context) -> Self {
        Scope::Root(context)
    }

    /// A child scope where `name` resolves to `value`, shadowing any outer
    /// binding of the same name.
    pub fn bind<'b>(&'b self, name: &'b str, value: &'b Value) -> Scope<'b> {
        Scope::Frame {
            parent: self,
            name,
            value,
        }
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        let mut scope: &Scope<'a> = self;
        loop {
            match *scope {
                Scope::Root(context) => return context.get(name),
                Scope::Frame {
                    parent,
                    name: bound,
                    value,
                } => {
                    if bound == name {
                        return Some(value);
                    }
                    scope = parent;
                }
            }
        }
    }

    /// Number of frames above the root.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut scope: &Scope<'a> = self;
        while let Scope::Frame { parent, .. } = *scope {
            depth += 1;
            scope = parent;
        }
        depth
    }
}

/// Builds a context from a JSON object, as read from a context file or a
/// site route.
pub fn context_from_json(object: serde_json::Map<String, serde_json::Value>) -> Context {
    object
        .into_iter()
        .map(|(name, value)| (name, Value::from(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_shadows_root_and_falls_through() {
        let mut context = Context::new();
        context.insert("x".into(), Value::from("outer"));
        context.insert("y".into(), Value::from("kept"));

        let root = Scope::root(&context);
        let item = Value::from("inner");
        let child = root.bind("x", &item);

        assert_eq!(child.get("x"), Some(&Value::from("inner")));
        assert_eq!(child.get("y"), Some(&Value::from("kept")));
        assert_eq!(root.get("x"), Some(&Value::from("outer")));
        assert_eq!(child.depth(), 1);
        assert_eq!(root.depth(), 0);
    }

    #[test]
    fn unbound_name_is_none() {
        let context = Context::new();
        let root = Scope::root(&context);
        let item = Value::Int(1);
        let child = root.bind("i", &item);
        assert_eq!(child.get("j"), None);
    }
}
