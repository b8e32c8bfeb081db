//! Small structural edits applied to a loaded document before it is
//! combined. A rule only ever fills in a key under structure that already
//! exists; it never invents parent objects.

use std::fmt;

use crate::document::Value;

/// Set `value` at `path`, provided the parent of the last segment exists
/// and is a mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchRule {
    path: Vec<String>,
    value: Value,
}

impl PatchRule {
    pub fn new(path: Vec<String>, value: impl Into<Value>) -> Self {
        Self {
            path,
            value: value.into(),
        }
    }

    /// Build a rule from a dotted path such as `info.x-logo`.
    pub fn from_dotted(path: &str, value: impl Into<Value>) -> Self {
        let segments = path
            .split('.')
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect();
        Self::new(segments, value)
    }

    /// Inject a logo reference at `info.x-logo`, the field Redoc reads for
    /// branding.
    pub fn logo(url: impl Into<String>) -> Self {
        Self::from_dotted("info.x-logo", Value::String(url.into()))
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Apply this rule in place. Returns whether the tree was touched.
    pub fn apply_to(&self, tree: &mut Value) -> bool {
        let Some((last, parents)) = self.path.split_last() else {
            return false;
        };

        let mut node = tree;
        for segment in parents {
            match node.get_mut(segment.as_str()) {
                Some(child) => node = child,
                None => return false,
            }
        }

        match node.as_mapping_mut() {
            Some(mapping) => {
                mapping.insert(Value::String(last.clone()), self.value.clone());
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for PatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.join("."))
    }
}

/// Apply every rule in order and return the patched tree.
pub fn apply(mut tree: Value, rules: &[PatchRule]) -> Value {
    for rule in rules {
        if rule.apply_to(&mut tree) {
            tracing::debug!(rule = %rule, "applied patch");
        }
    }
    tree
}

#[cfg(test)]
mod tests {
    use crate::document::Format;

    use super::*;

    fn yaml(text: &str) -> Value {
        Format::Yaml.parse(text.as_bytes()).unwrap()
    }

    #[test]
    fn inserts_when_parent_exists() {
        let tree = yaml("info:\n  title: Pet Store\n");
        let patched = apply(tree, &[PatchRule::logo("../logo.png")]);
        assert_eq!(patched["info"]["x-logo"].as_str(), Some("../logo.png"));
        assert_eq!(patched["info"]["title"].as_str(), Some("Pet Store"));
    }

    #[test]
    fn overwrites_existing_value() {
        let tree = yaml("info:\n  x-logo: old.png\n");
        let patched = apply(tree, &[PatchRule::logo("new.png")]);
        assert_eq!(patched["info"]["x-logo"].as_str(), Some("new.png"));
    }

    #[test]
    fn absent_parent_leaves_tree_untouched() {
        let tree = yaml("title: Pet Store\n");
        let patched = apply(tree.clone(), &[PatchRule::logo("logo.png")]);
        assert_eq!(patched, tree);
    }

    #[test]
    fn non_mapping_parent_leaves_tree_untouched() {
        let tree = yaml("info: just a string\n");
        let patched = apply(tree.clone(), &[PatchRule::logo("logo.png")]);
        assert_eq!(patched, tree);
    }

    #[test]
    fn top_level_rule_targets_root_mapping() {
        let tree = yaml("openapi: 3.0.0\n");
        let patched = apply(tree, &[PatchRule::from_dotted("x-generated", true)]);
        assert_eq!(patched["x-generated"].as_bool(), Some(true));
    }

    #[test]
    fn non_mapping_root_is_never_patched() {
        let tree = yaml("- a\n- b\n");
        let patched = apply(tree.clone(), &[PatchRule::from_dotted("x", 1)]);
        assert_eq!(patched, tree);
    }

    #[test]
    fn empty_path_is_a_no_op() {
        let tree = yaml("a: 1\n");
        let rule = PatchRule::from_dotted("", 2);
        assert!(rule.path().is_empty());
        assert_eq!(apply(tree.clone(), &[rule]), tree);
    }

    #[test]
    fn nested_path_walks_every_segment() {
        let tree = yaml("components:\n  schemas:\n    Pet: {}\n");
        let rule = PatchRule::from_dotted("components.schemas.Pet.x-internal", false);
        let patched = apply(tree, &[rule]);
        assert_eq!(
            patched["components"]["schemas"]["Pet"]["x-internal"].as_bool(),
            Some(false)
        );
    }
}
