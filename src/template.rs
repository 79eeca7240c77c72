//! Templates
//!
//! A template is `N` literal segments around `N - 1` interpolation slots. It
//! is consumed by rendering; every rendered stream owns its own queue.

use crate::entry::{EntryKind, Interpolation};
use crate::error::TemplateError;
use crate::queue::WorkQueue;

#[derive(Debug)]
pub struct Template {
    literals: Vec<String>,
    interpolations: Vec<Interpolation>,
}

impl Template {
    /// Build from already-split parts.
    ///
    /// # Errors
    ///
    /// `TemplateError::ArityMismatch` unless there is exactly one more
    /// literal than interpolation.
    pub fn new<L>(literals: L, interpolations: Vec<Interpolation>) -> Result<Self, TemplateError>
    where
        L: IntoIterator,
        L::Item: Into<String>,
    {
        let literals: Vec<String> = literals.into_iter().map(Into::into).collect();
        if literals.len() != interpolations.len() + 1 {
            return Err(TemplateError::ArityMismatch {
                literals: literals.len(),
                interpolations: interpolations.len(),
            });
        }
        Ok(Self {
            literals,
            interpolations,
        })
    }

    /// A template with no interpolation slots.
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            literals: vec![text.into()],
            interpolations: Vec::new(),
        }
    }

    pub fn builder() -> TemplateBuilder {
        TemplateBuilder::default()
    }

    pub fn literals(&self) -> &[String] {
        &self.literals
    }

    pub fn interpolations(&self) -> &[Interpolation] {
        &self.interpolations
    }

    /// Classification of each interpolation slot, in order.
    pub fn slot_kinds(&self) -> Vec<EntryKind> {
        self.interpolations.iter().map(Interpolation::kind).collect()
    }

    pub(crate) fn into_queue(self) -> WorkQueue {
        WorkQueue::from_template(self.literals, self.interpolations)
    }
}

/// Incremental template construction.
///
/// Adjacent literals are joined; adjacent interpolations get an empty literal
/// between them.
#[derive(Debug)]
pub struct TemplateBuilder {
    literals: Vec<String>,
    interpolations: Vec<Interpolation>,
}

impl Default for TemplateBuilder {
    fn default() -> Self {
        Self {
            literals: vec![String::new()],
            interpolations: Vec::new(),
        }
    }
}

impl TemplateBuilder {
    pub fn literal(mut self, text: impl AsRef<str>) -> Self {
        if let Some(last) = self.literals.last_mut() {
            last.push_str(text.as_ref());
        }
        self
    }

    pub fn interpolate(mut self, value: impl Into<Interpolation>) -> Self {
        self.interpolations.push(value.into());
        self.literals.push(String::new());
        self
    }

    pub fn build(self) -> Template {
        Template {
            literals: self.literals,
            interpolations: self.interpolations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn arity_is_checked() {
        let err = Template::new(["a", "b"], vec![]).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::ArityMismatch {
                literals: 2,
                interpolations: 0
            }
        ));
        assert!(Template::new(["a", "b"], vec!["x".into()]).is_ok());
    }

    #[test]
    fn builder_keeps_arity() {
        let template = Template::builder()
            .literal("Hello ")
            .interpolate("tom")
            .interpolate(None::<String>)
            .literal(", welcome")
            .literal("!")
            .build();
        assert_eq!(template.literals(), &["Hello ", "", ", welcome!"]);
        assert_eq!(
            template.slot_kinds(),
            vec![EntryKind::Literal, EntryKind::Empty]
        );
    }

    #[test]
    fn literal_only() {
        let template = Template::literal("Hello world");
        assert_eq!(template.literals(), &["Hello world"]);
        assert!(template.interpolations().is_empty());
    }
}
