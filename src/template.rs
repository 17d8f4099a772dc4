//! Path template expansion.
//!
//! Supports the RFC 6570 simple (`{var}`, `{x,y}`) and reserved (`{+var}`)
//! expression forms. Unlike RFC 6570, an undefined variable is an error
//! rather than an empty expansion.

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const RESERVED: &AsciiSet = &UNRESERVED
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=');

/// Template could not be expanded.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("unclosed expression starting at byte {0}")]
    Unclosed(usize),
    #[error("unmatched '}}' at byte {0}")]
    Unmatched(usize),
    #[error("empty variable name in expression '{{{0}}}'")]
    EmptyVariable(String),
    #[error("invalid variable name '{0}'")]
    InvalidVariable(String),
    #[error("unsupported operator '{0}'")]
    UnsupportedOperator(char),
    #[error("missing value for variable '{0}'")]
    Missing(String),
}

/// Expands `template` against `params`.
///
/// Every placeholder must resolve; a template that still references an
/// unknown variable fails with [`TemplateError::Missing`].
pub fn expand(template: &str, params: &BTreeMap<String, String>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(open) = rest.find(['{', '}']) {
        if rest.as_bytes()[open] == b'}' {
            return Err(TemplateError::Unmatched(offset + open));
        }
        out.push_str(&rest[..open]);
        let close = rest[open..]
            .find('}')
            .map(|idx| open + idx)
            .ok_or(TemplateError::Unclosed(offset + open))?;
        expand_expression(&rest[open + 1..close], params, &mut out)?;
        offset += close + 1;
        rest = &rest[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

fn expand_expression(
    expression: &str,
    params: &BTreeMap<String, String>,
    out: &mut String,
) -> Result<(), TemplateError> {
    let (allowed, names) = match expression.chars().next() {
        Some('+') => (RESERVED, &expression[1..]),
        Some(op @ ('#' | '.' | '/' | ';' | '?' | '&' | '=' | ',' | '!' | '@' | '|')) => {
            return Err(TemplateError::UnsupportedOperator(op));
        }
        _ => (UNRESERVED, expression),
    };

    for (index, name) in names.split(',').enumerate() {
        if name.is_empty() {
            return Err(TemplateError::EmptyVariable(expression.to_owned()));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(TemplateError::InvalidVariable(name.to_owned()));
        }
        let value = params
            .get(name)
            .ok_or_else(|| TemplateError::Missing(name.to_owned()))?;
        if index > 0 {
            out.push(',');
        }
        out.extend(utf8_percent_encode(value, allowed));
    }
    Ok(())
}
