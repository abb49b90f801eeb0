//! AST-to-text printer.
//!
//! The output is canonical rather than faithful: one statement per line,
//! blocks indented, keywords in the case they were parsed with, and
//! parentheses around every non-leaf operand. Re-parsing the printed text
//! of a diagnostic-free parse yields a structurally equal tree.

use crate::ast::{Arg, Constraint, Expr, Modifier, Program, PropertyBlock, Stmt};
use crate::lexer::tokenize;
use crate::token::TokenKind;

const INDENT: &str = "    ";

/// Which expression grammar the surrounding statement is parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Layer,
    Arith,
}

pub fn print(program: &Program) -> String {
    let mut out = String::new();
    for stmt in &program.statements {
        print_stmt(&mut out, stmt, 0, Mode::Layer);
    }
    out
}

/// Print a single expression in layer-expression form.
pub fn print_expr(expr: &Expr) -> String {
    expr_text(expr, Mode::Layer)
}

fn line(out: &mut String, depth: usize, text: &str) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(text);
    out.push('\n');
}

fn print_body(out: &mut String, body: &[Stmt], depth: usize, mode: Mode) {
    for stmt in body {
        print_stmt(out, stmt, depth, mode);
    }
}

fn print_stmt(out: &mut String, stmt: &Stmt, depth: usize, mode: Mode) {
    match stmt {
        Stmt::Define { name, value, .. } => match value {
            Some(v) => line(out, depth, &format!("#DEFINE {} {}", name, v)),
            None => line(out, depth, &format!("#DEFINE {}", name)),
        },
        Stmt::IfDef {
            name,
            value,
            negated,
            then_body,
            else_body,
            ..
        } => {
            let head = if *negated { "#IFNDEF" } else { "#IFDEF" };
            match value {
                Some(v) => line(out, depth, &format!("{} {} {}", head, name, v)),
                None => line(out, depth, &format!("{} {}", head, name)),
            }
            print_body(out, then_body, depth + 1, mode);
            if !else_body.is_empty() {
                line(out, depth, "#ELSE");
                print_body(out, else_body, depth + 1, mode);
            }
            line(out, depth, "#ENDIF");
        }
        Stmt::Include { path, .. } => line(out, depth, &format!("#INCLUDE {}", quote(path))),
        Stmt::EncryptedBlock { content, .. } => {
            // The payload is copied verbatim, without indentation.
            line(out, depth, "#ENCRYPT");
            if !content.is_empty() {
                out.push_str(content);
                out.push('\n');
            }
            line(out, depth, "#ENDCRYPT");
        }
        Stmt::LayerDef { name, numbers, .. } => {
            line(out, depth, &format!("LAYER {} {}", name, args_text(numbers)))
        }
        Stmt::LayerMap {
            gds_num,
            map_type,
            type_num,
            internal_num,
            ..
        } => line(
            out,
            depth,
            &format!("LAYER MAP {} {} {} {}", gds_num, map_type, type_num, internal_num),
        ),
        Stmt::VariableDef { name, values, .. } => {
            let mut text = format!("VARIABLE {}", name);
            for (i, v) in values.iter().enumerate() {
                let v = expr_text(v, Mode::Arith);
                text.push(' ');
                if i > 0 && v.starts_with('-') {
                    text.push_str(&format!("({})", v));
                } else {
                    text.push_str(&v);
                }
            }
            line(out, depth, &text);
        }
        Stmt::Directive {
            keywords,
            arguments,
            property_block,
            ..
        } => {
            if keywords.len() == 1 && keywords[0] == "@" {
                let text = args_text(arguments);
                line(out, depth, &format!("@ {}", text));
                return;
            }
            let mut head = keywords.join(" ");
            if !arguments.is_empty() {
                head.push(' ');
                head.push_str(&args_text(arguments));
            }
            match property_block {
                Some(block) => print_property_block(out, &head, block, depth),
                None => line(out, depth, &head),
            }
        }
        Stmt::LayerAssignment {
            name,
            op,
            expression,
            ..
        } => {
            let rhs = expr_text(expression, mode);
            if name.is_empty() {
                line(out, depth, &format!("{} {}", op, rhs));
            } else {
                let name = if mode == Mode::Arith { word(name) } else { name.clone() };
                line(out, depth, &format!("{} {} {}", name, op, rhs));
            }
        }
        Stmt::RuleCheckBlock {
            name,
            description,
            body,
            ..
        } => {
            line(out, depth, &format!("{} {{", name));
            for d in description {
                line(out, depth + 1, &format!("@ {}", d));
            }
            print_body(out, body, depth + 1, Mode::Layer);
            line(out, depth, "}");
        }
        Stmt::Connect {
            soft, layers, via, ..
        } => {
            let mut text = format!(
                "{} {}",
                if *soft { "SCONNECT" } else { "CONNECT" },
                layers.join(" ")
            );
            if let Some(via) = via {
                text.push_str(" BY ");
                text.push_str(via);
            }
            line(out, depth, &text);
        }
        Stmt::Device {
            element,
            model,
            seed,
            pins,
            aux_layers,
            cmacro,
            cmacro_args,
            property_block,
            ..
        } => {
            let mut text = format!("DEVICE {}", element);
            if let Some(m) = model {
                text.push_str(&format!("({})", word(m)));
            }
            text.push(' ');
            text.push_str(seed);
            for pin in pins {
                text.push(' ');
                text.push_str(&pin.layer);
                if let Some(role) = &pin.role {
                    text.push_str(&format!("({})", word(role)));
                }
            }
            for aux in aux_layers {
                text.push_str(&format!(" <{}>", aux));
            }
            if let Some(name) = cmacro {
                text.push_str(" CMACRO ");
                text.push_str(name);
                if !cmacro_args.is_empty() {
                    text.push(' ');
                    text.push_str(&args_text(cmacro_args));
                }
            }
            match property_block {
                Some(block) => print_property_block(out, &text, block, depth),
                None => line(out, depth, &text),
            }
        }
        Stmt::DMacro {
            name, params, body, ..
        } => {
            let mut head = format!("DMACRO {}", name);
            for p in params {
                head.push(' ');
                head.push_str(p);
            }
            head.push_str(" {");
            line(out, depth, &head);
            print_body(out, body, depth + 1, Mode::Layer);
            line(out, depth, "}");
        }
        Stmt::Group { name, patterns, .. } => {
            let patterns: Vec<String> = patterns.iter().map(|p| pattern(p)).collect();
            line(out, depth, &format!("GROUP {} {}", name, patterns.join(" ")));
        }
        Stmt::Attach { layer, net, .. } => {
            line(out, depth, &format!("ATTACH {} {}", layer, word(net)))
        }
        Stmt::TraceProperty { device, args, .. } => {
            let mut text = format!("TRACE PROPERTY {}", device);
            if !args.is_empty() {
                text.push(' ');
                text.push_str(&args_text(args));
            }
            line(out, depth, &text);
        }
        Stmt::IfExpr {
            condition,
            then_body,
            else_ifs,
            else_body,
            ..
        } => {
            line(out, depth, &format!("IF {} {{", expr_text(condition, Mode::Arith)));
            print_body(out, then_body, depth + 1, Mode::Arith);
            for clause in else_ifs {
                line(
                    out,
                    depth,
                    &format!("}} ELSE IF {} {{", expr_text(&clause.condition, Mode::Arith)),
                );
                print_body(out, &clause.body, depth + 1, Mode::Arith);
            }
            if let Some(body) = else_body {
                line(out, depth, "} ELSE {");
                print_body(out, body, depth + 1, Mode::Arith);
            }
            line(out, depth, "}");
        }
        Stmt::PropertyBlock(block) => print_property_block(out, "", block, depth),
        Stmt::Expression { expr } => line(out, depth, &expr_text(expr, mode)),
        Stmt::Error { skipped, .. } => {
            for l in skipped.lines() {
                line(out, depth, l);
            }
        }
    }
}

/// `head [ PROPERTY a, b` / body / `] trailing`.
fn print_property_block(out: &mut String, head: &str, block: &PropertyBlock, depth: usize) {
    let mut open = if head.is_empty() {
        "[".to_owned()
    } else {
        format!("{} [", head)
    };
    if !block.properties.is_empty() {
        open.push_str(" PROPERTY ");
        open.push_str(&block.properties.join(", "));
    }
    let mut close = "]".to_owned();
    if !block.trailing.is_empty() {
        close.push(' ');
        close.push_str(&args_text(&block.trailing));
    }
    if block.body.is_empty() {
        line(out, depth, &format!("{} {}", open, close));
        return;
    }
    line(out, depth, &open);
    print_body(out, &block.body, depth + 1, Mode::Arith);
    line(out, depth, &close);
}

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

fn expr_text(expr: &Expr, mode: Mode) -> String {
    match expr {
        Expr::LayerRef { name, .. } => name.clone(),
        Expr::NumberLiteral { value, .. } => number(*value),
        Expr::StringLiteral { value, .. } => quote(value),
        Expr::FuncCall { name, args, .. } => {
            let args: Vec<String> = args.iter().map(|a| expr_text(a, mode)).collect();
            format!("{}({})", name, args.join(", "))
        }
        Expr::BinaryOp {
            op, left, right, ..
        } => {
            if op == "?" {
                if let Expr::BinaryOp {
                    op: colon,
                    left: then,
                    right: otherwise,
                    ..
                } = right.as_ref()
                {
                    if colon == ":" {
                        return format!(
                            "{} ? {} : {}",
                            operand(left, mode),
                            operand(then, mode),
                            operand(otherwise, mode)
                        );
                    }
                }
            }
            format!("{} {} {}", operand(left, mode), op, operand(right, mode))
        }
        Expr::UnaryOp { op, operand: inner, .. } => {
            if op == "-" || op == "!" {
                format!("{}{}", op, operand(inner, mode))
            } else if op.starts_with("WITH ") {
                format!("{} {}", operand(inner, mode), op)
            } else {
                format!("{} {}", op, operand(inner, mode))
            }
        }
        Expr::ConstrainedExpr {
            expr: inner,
            constraints,
            modifiers,
            ..
        } => {
            let mut text = match inner.as_ref() {
                Expr::DrcOp { .. } | Expr::ConstrainedExpr { .. } => {
                    format!("({})", expr_text(inner, mode))
                }
                _ => expr_text(inner, mode),
            };
            push_tail(&mut text, constraints, modifiers, mode);
            text
        }
        Expr::DrcOp {
            op,
            operands,
            constraints,
            modifiers,
            ..
        } => {
            let mut text = op.clone();
            for o in operands {
                text.push(' ');
                text.push_str(&operand(o, mode));
            }
            push_tail(&mut text, constraints, modifiers, mode);
            text
        }
    }
}

/// An operand position: leaves print bare, everything else in parentheses.
fn operand(expr: &Expr, mode: Mode) -> String {
    if expr.is_atomic() {
        expr_text(expr, mode)
    } else {
        format!("({})", expr_text(expr, mode))
    }
}

fn push_constraints(text: &mut String, constraints: &[Constraint], mode: Mode) {
    for c in constraints {
        text.push(' ');
        text.push_str(&c.op);
        if let Some(v) = &c.value {
            text.push(' ');
            text.push_str(&operand(v, mode));
        }
    }
}

fn push_tail(text: &mut String, constraints: &[Constraint], modifiers: &[Modifier], mode: Mode) {
    push_constraints(text, constraints, mode);
    for m in modifiers {
        text.push(' ');
        text.push_str(m.name());
        if let Some(chain) = m.measured() {
            push_constraints(text, chain, mode);
        } else if let Modifier::Param { value, .. } = m {
            text.push(' ');
            text.push_str(&operand(value, mode));
        }
    }
}

// ──────────────────────────────────────────────
// Leaves
// ──────────────────────────────────────────────

fn number(v: f64) -> String {
    format!("{}", v)
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn args_text(args: &[Arg]) -> String {
    let parts: Vec<String> = args
        .iter()
        .map(|a| match a {
            Arg::Ident(s) | Arg::Punct(s) => s.clone(),
            Arg::Str(s) => quote(s),
            Arg::Number(n) => number(*n),
        })
        .collect();
    parts.join(" ")
}

/// Text that lexes back as exactly one token of one of `kinds`.
fn lexes_as(text: &str, kinds: &[TokenKind]) -> bool {
    let tokens = tokenize(text);
    tokens.len() == 2 && kinds.contains(&tokens[0].kind) && tokens[0].text == text
}

/// A single-word value: bare when it reads back as one word, else quoted.
fn word(text: &str) -> String {
    if lexes_as(text, &[TokenKind::Ident, TokenKind::Integer, TokenKind::Float]) {
        text.to_owned()
    } else {
        quote(text)
    }
}

fn pattern(text: &str) -> String {
    if lexes_as(text, &[TokenKind::Ident]) {
        text.to_owned()
    } else {
        quote(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn round_trip(src: &str) -> String {
        let first = parse(src, "a.svrf").expect("parse");
        assert!(!first.has_errors(), "{:?}", first.diagnostics);
        let printed = print(&first.program);
        let second = parse(&printed, "a.svrf").expect("reparse");
        assert!(!second.has_errors(), "{}\n{:?}", printed, second.diagnostics);
        assert!(
            first.program.structurally_eq(&second.program),
            "printed:\n{}\nfirst: {:#}\nsecond: {:#}",
            printed,
            first.program.shape(),
            second.program.shape()
        );
        printed
    }

    #[test]
    fn layers_and_assignments() {
        let printed = round_trip("LAYER M1 10\nLAYER MAP 5 DATATYPE 2 100\nX = M1 AND (M1 OR M1)\n");
        assert_eq!(
            printed,
            "LAYER M1 10\nLAYER MAP 5 DATATYPE 2 100\nX = M1 AND (M1 OR M1)\n"
        );
    }

    #[test]
    fn drc_operations_with_modifiers() {
        let printed = round_trip(
            "LAYER M1 1\nLAYER V1 2\nR {\n  @ spacing\n  EXT M1 < 0.1 ABUT<90 SINGULAR REGION\n  ENC V1 M1 < 0.05 WINDOW 10\n}\n",
        );
        assert!(printed.contains("    @ spacing\n"));
        assert!(printed.contains("EXT M1 < 0.1 ABUT<90 SINGULAR REGION"));
    }

    #[test]
    fn postfix_forms_print_as_prefix() {
        let printed = round_trip("LAYER M1 1\nX = M1 SIZE BY 0.5\nY = M1 AREA > 2\n");
        assert!(printed.contains("X = SIZE M1 BY 0.5"));
        assert!(printed.contains("Y = AREA M1 > 2"));
    }

    #[test]
    fn rectangle_marker_and_constraints() {
        round_trip("LAYER M1 1\nX = RECTANGLE M1 == 0.1 BY == 0.2 ORTHOGONAL\n");
    }

    #[test]
    fn measured_quantities_keep_their_comparisons() {
        let printed = round_trip(
            "X = CONVEX EDGE M1 ANGLE1 == 90 ANGLE2 == 90 WITH LENGTH <= 0.1\nY = RECTANGLE M1 ASPECT > 1\n",
        );
        assert_eq!(
            printed,
            "X = CONVEX EDGE M1 ANGLE1 == 90 ANGLE2 == 90 WITH LENGTH <= 0.1\nY = RECTANGLE M1 ASPECT > 1\n"
        );
    }

    #[test]
    fn undeclared_layers_stay_operands() {
        let printed = round_trip(
            "A = INT M1 < 0.1\nB = INT M1 M2 < 0.1\nC = EXT M1 M2 < 0.2 OPPOSITE\nD = ENC V1 M1 < 0.05\nE = ENC RECTANGLE V1 M1 0.01 0.02\nF = NET AREA RATIO M1 M2 > 400\nG = RECTANGLE M1 == 5 BY == 10 ORTHOGONAL ONLY\n",
        );
        assert_eq!(
            printed,
            "A = INT M1 < 0.1\nB = INT M1 M2 < 0.1\nC = EXT M1 M2 < 0.2 OPPOSITE\nD = ENC V1 M1 < 0.05\nE = ENC RECTANGLE V1 M1 0.01 0.02\nF = NET AREA RATIO M1 M2 > 400\nG = RECTANGLE M1 == 5 BY == 10 ORTHOGONAL ONLY\n"
        );
    }

    #[test]
    fn negated_rectangle_enclosure() {
        let printed = round_trip(
            "LAYER A 1\nLAYER B 2\nX = (A INTERACT B) NOT ENCLOSE RECTANGLE 0.001 30\n",
        );
        assert!(printed.contains("X = NOT ENCLOSE RECTANGLE (A INTERACT B) 0.001 30\n"));
    }

    #[test]
    fn negated_compounds_and_edges() {
        round_trip("LAYER A 1\nLAYER B 2\nX = A NOT INSIDE EDGE B\nY = A COIN EDGE B\nZ = (A INTERACT B >= 2) NOT B\n");
    }

    #[test]
    fn property_blocks_and_if_chains() {
        round_trip(
            "LAYER M1 1\nDFM PROPERTY M1 [ PROPERTY a, b\n  a = AREA(M1) * 2\n  b = a > 1 ? -1 : 1\n  IF a > 2 {\n    b += 1\n  } ELSE {\n    \"c d\" = 3\n  }\n] > 0.5\n",
        );
    }

    #[test]
    fn preprocessor_statements() {
        round_trip(
            "#DEFINE GRID 0.005\n#IFNDEF FAST\nLAYER M1 1\n#ELSE\nLAYER M1 2\n#ENDIF\n#INCLUDE \"rules/metal.svrf\"\n#ENCRYPT\nxq1 zz\n#ENDCRYPT\n",
        );
    }

    #[test]
    fn connectivity_and_devices() {
        round_trip(
            "LAYER poly 1\nLAYER nsd 2\nCONNECT poly nsd BY via1\nDEVICE MN(nmos) ngate poly(G) nsd(S) nsd(D) <pwell> CMACRO mos_prop 2\nGROUP metal M?\nATTACH poly VDD\nTRACE PROPERTY MN(nmos) W W 5\nVARIABLE W 0.1 -0.2\n",
        );
    }

    #[test]
    fn strings_are_requoted() {
        let printed = round_trip("LAYOUT PATH \"a \\\"b\\\".gds\"\n");
        assert_eq!(printed, "LAYOUT PATH \"a \\\"b\\\".gds\"\n");
    }

    #[test]
    fn printing_is_idempotent() {
        let src = "LAYER A 1\nLAYER B 2\nR {\n  OR A B\n     A\n  X = A WITH EDGE > 1\n}\n";
        let once = round_trip(src);
        let twice = round_trip(&once);
        assert_eq!(once, twice);
    }
}
