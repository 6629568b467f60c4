//! Minimal placeholder templates.
//!
//! Source text containing `{{ name }}` placeholders is compiled once into a
//! list of segments. Compilation checks every placeholder against the set of
//! variables the template declares, so a typo in a static template is caught
//! at startup instead of producing a broken nginx config at runtime.

use thiserror::Error;

/// Template compilation or expansion failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template {template}: unterminated placeholder at byte {offset}")]
    Unterminated { template: &'static str, offset: usize },

    #[error("template {template}: empty placeholder at byte {offset}")]
    EmptyPlaceholder { template: &'static str, offset: usize },

    #[error("template {template}: undeclared variable {name:?}")]
    UnknownVariable { template: &'static str, name: String },

    #[error("template {template}: no value supplied for {name:?}")]
    MissingVariable { template: &'static str, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Var(String),
}

/// A compiled template.
#[derive(Debug, Clone)]
pub struct Template {
    name: &'static str,
    segments: Vec<Segment>,
}

impl Template {
    /// Compile `source`, accepting only placeholders listed in `vars`.
    pub fn compile(
        name: &'static str,
        source: &str,
        vars: &[&str],
    ) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after_open = &rest[start + 2..];
            let end = after_open.find("}}").ok_or(TemplateError::Unterminated {
                template: name,
                offset: offset + start,
            })?;

            let var = after_open[..end].trim();
            if var.is_empty() {
                return Err(TemplateError::EmptyPlaceholder {
                    template: name,
                    offset: offset + start,
                });
            }
            if !vars.contains(&var) {
                return Err(TemplateError::UnknownVariable {
                    template: name,
                    name: var.to_string(),
                });
            }
            segments.push(Segment::Var(var.to_string()));

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { name, segments })
    }

    /// Expand into `out`. Values are inserted verbatim.
    pub fn render_into(
        &self,
        out: &mut String,
        values: &[(&str, &str)],
    ) -> Result<(), TemplateError> {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(var) => {
                    let value = values
                        .iter()
                        .find(|(k, _)| *k == var.as_str())
                        .map(|(_, v)| *v)
                        .ok_or_else(|| TemplateError::MissingVariable {
                            template: self.name,
                            name: var.clone(),
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(())
    }

    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, TemplateError> {
        let mut out = String::new();
        self.render_into(&mut out, values)?;
        Ok(out)
    }
}
