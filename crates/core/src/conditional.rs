//! Conditional compilation over a built tree.
//!
//! The parser keeps both branches of every `#IFDEF`/`#IFNDEF`. This pass
//! picks one branch per conditional from a set of defined names and splices
//! its statements in place of the conditional. `#DEFINE` statements met
//! along the way (in source order, in taken branches only) extend the set
//! for the conditionals that follow them.

use crate::ast::{Program, PropertyBlock, Stmt};
use std::collections::BTreeMap;

/// Defined preprocessor names and their optional values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Defines {
    names: BTreeMap<String, Option<String>>,
}

impl Defines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: Option<String>) {
        self.names.insert(name.into(), value);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.names.get(name).and_then(|v| v.as_deref())
    }

    /// Parse a command-line style `NAME` or `NAME=VALUE`.
    pub fn define_spec(&mut self, spec: &str) {
        match spec.split_once('=') {
            Some((name, value)) => self.define(name.trim(), Some(value.trim().to_owned())),
            None => self.define(spec.trim(), None),
        }
    }

    /// Is the `#IFDEF name [value]` condition true? With a value, the name
    /// must be defined to that value (surrounding quotes ignored).
    fn holds(&self, name: &str, value: Option<&str>) -> bool {
        match value {
            None => self.is_defined(name),
            Some(expected) => self
                .value(name)
                .is_some_and(|actual| unquote(actual) == unquote(expected)),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for Defines {
    fn from_iter<I: IntoIterator<Item = (K, Option<String>)>>(iter: I) -> Self {
        let mut defines = Defines::new();
        for (name, value) in iter {
            defines.define(name, value);
        }
        defines
    }
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(s)
}

/// Select one branch of every conditional, recursively, including those
/// nested in rule blocks, macros, property blocks and `IF` bodies.
pub fn resolve_conditionals(program: Program, defines: &Defines) -> Program {
    let mut defines = defines.clone();
    let statements = resolve_body(program.statements, &mut defines);
    Program {
        file: program.file,
        statements,
    }
}

fn resolve_body(body: Vec<Stmt>, defines: &mut Defines) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(body.len());
    for stmt in body {
        match stmt {
            Stmt::IfDef {
                name,
                value,
                negated,
                then_body,
                else_body,
                ..
            } => {
                let taken = defines.holds(&name, value.as_deref()) != negated;
                let branch = if taken { then_body } else { else_body };
                out.extend(resolve_body(branch, defines));
            }
            Stmt::Define { name, value, pos } => {
                defines.define(name.clone(), value.clone());
                out.push(Stmt::Define { name, value, pos });
            }
            other => out.push(resolve_nested(other, defines)),
        }
    }
    out
}

fn resolve_nested(stmt: Stmt, defines: &mut Defines) -> Stmt {
    match stmt {
        Stmt::RuleCheckBlock {
            name,
            description,
            body,
            pos,
        } => Stmt::RuleCheckBlock {
            name,
            description,
            body: resolve_body(body, defines),
            pos,
        },
        Stmt::DMacro {
            name,
            params,
            body,
            pos,
        } => Stmt::DMacro {
            name,
            params,
            body: resolve_body(body, defines),
            pos,
        },
        Stmt::IfExpr {
            condition,
            then_body,
            else_ifs,
            else_body,
            pos,
        } => Stmt::IfExpr {
            condition,
            then_body: resolve_body(then_body, defines),
            else_ifs: else_ifs
                .into_iter()
                .map(|mut clause| {
                    clause.body = resolve_body(clause.body, defines);
                    clause
                })
                .collect(),
            else_body: else_body.map(|b| resolve_body(b, defines)),
            pos,
        },
        Stmt::Directive {
            keywords,
            arguments,
            property_block,
            pos,
        } => Stmt::Directive {
            keywords,
            arguments,
            property_block: property_block.map(|b| resolve_block(b, defines)),
            pos,
        },
        Stmt::Device {
            element,
            model,
            seed,
            pins,
            aux_layers,
            cmacro,
            cmacro_args,
            property_block,
            pos,
        } => Stmt::Device {
            element,
            model,
            seed,
            pins,
            aux_layers,
            cmacro,
            cmacro_args,
            property_block: property_block.map(|b| resolve_block(b, defines)),
            pos,
        },
        Stmt::PropertyBlock(block) => Stmt::PropertyBlock(resolve_block(block, defines)),
        other => other,
    }
}

fn resolve_block(block: PropertyBlock, defines: &mut Defines) -> PropertyBlock {
    PropertyBlock {
        body: resolve_body(block.body, defines),
        ..block
    }
}
