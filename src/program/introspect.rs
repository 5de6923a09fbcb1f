//! Source Introspection
//!
//! Finds the `uniform` and `attribute` declarations of a linked program by
//! scanning its source text. Names are collected once each, in order of
//! appearance; the driver is then asked for a location per name and inactive
//! ones are dropped by the caller.

use crate::errors::{Result, ShaderGraphError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Qualifier {
    Uniform,
    Attribute,
}

impl Qualifier {
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Attribute => "attribute",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub qualifier: Qualifier,
    pub ty: String,
    pub name: String,
}

/// Uniforms of both stages and attributes of the vertex stage, deduplicated.
pub fn scan_program(vertex: &str, fragment: &str) -> Result<Vec<Declaration>> {
    let mut found = Vec::new();
    scan_into(vertex, &[Qualifier::Attribute, Qualifier::Uniform], &mut found)?;
    scan_into(fragment, &[Qualifier::Uniform], &mut found)?;
    Ok(found)
}

fn scan_into(source: &str, qualifiers: &[Qualifier], found: &mut Vec<Declaration>) -> Result<()> {
    let code = strip_comments(source)
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    for statement in code.split(';') {
        // Only the tail after the last brace can be a global declaration.
        let statement = statement
            .rsplit(['{', '}'])
            .next()
            .unwrap_or(statement);
        let mut tokens = statement.split_whitespace();

        let Some(first) = tokens.next() else {
            continue;
        };
        let Some(qualifier) = qualifiers.iter().copied().find(|q| q.keyword() == first) else {
            continue;
        };

        let mut ty = None;
        let mut rest = String::new();
        for token in tokens {
            if ty.is_none() {
                if matches!(token, "lowp" | "mediump" | "highp") {
                    continue;
                }
                ty = Some(token.to_string());
            } else {
                rest.push_str(token);
            }
        }
        let Some(ty) = ty else {
            continue;
        };

        for name in rest.split(',') {
            let name = name.split('[').next().unwrap_or(name).trim();
            if name.is_empty() {
                continue;
            }
            record(found, Declaration {
                qualifier,
                ty: ty.clone(),
                name: name.to_string(),
            })?;
        }
    }
    Ok(())
}

fn record(found: &mut Vec<Declaration>, decl: Declaration) -> Result<()> {
    if let Some(existing) = found.iter().find(|d| d.name == decl.name) {
        if existing.ty == decl.ty && existing.qualifier == decl.qualifier {
            return Ok(());
        }
        return Err(ShaderGraphError::DeclarationConflict {
            name: decl.name,
            first: format!("{} {}", existing.qualifier.keyword(), existing.ty),
            second: format!("{} {}", decl.qualifier.keyword(), decl.ty),
        });
    }
    found.push(decl);
    Ok(())
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    loop {
        let line = rest.find("//");
        let block = rest.find("/*");
        let next = match (line, block) {
            (Some(l), Some(b)) if b < l => Some((b, true)),
            (Some(l), _) => Some((l, false)),
            (None, Some(b)) => Some((b, true)),
            (None, None) => None,
        };

        match next {
            Some((start, true)) => {
                out.push_str(&rest[..start]);
                out.push(' ');
                let body = &rest[start + 2..];
                rest = body.find("*/").map_or("", |end| &body[end + 2..]);
            }
            Some((start, false)) => {
                out.push_str(&rest[..start]);
                let body = &rest[start..];
                rest = body.find('\n').map_or("", |end| &body[end..]);
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}
