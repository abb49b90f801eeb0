//! End-to-end properties of the parser, exercised through the public API.

use svrf_core::conditional::{resolve_conditionals, Defines};
use svrf_core::{parse, print, DiagnosticKind, Expr, Modifier, Stmt};

fn assignment(src: &str, target: &str) -> Expr {
    let out = parse(src, "p.svrf").unwrap();
    assert!(!out.has_errors(), "{:?}", out.diagnostics);
    out.program
        .statements
        .into_iter()
        .find_map(|s| match s {
            Stmt::LayerAssignment {
                name, expression, ..
            } if name == target => Some(expression),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no assignment to {}", target))
}

fn op_name(e: &Expr) -> &str {
    match e {
        Expr::BinaryOp { op, .. } | Expr::UnaryOp { op, .. } | Expr::DrcOp { op, .. } => op.as_str(),
        other => panic!("no operator on {:?}", other),
    }
}

#[test]
fn independent_inputs_parse_identically_across_threads() {
    let decks = [
        "LAYER M1 1\nX = M1 NOT INTERACT M1\n",
        "LAYER A 1\nR {\n  EXT A < 0.1 ABUT<90>\n}\n",
        "LAYER M1 1\nDFM PROPERTY M1 [ PROPERTY a\n  a = AREA(M1)\n]\n",
    ];
    let expected: Vec<_> = decks
        .iter()
        .map(|d| parse(d, "t.svrf").unwrap())
        .collect();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let deck = decks[i % decks.len()];
            std::thread::spawn(move || (i % 3, parse(deck, "t.svrf").unwrap()))
        })
        .collect();
    for handle in handles {
        let (idx, output) = handle.join().unwrap();
        assert_eq!(output, expected[idx]);
    }
}

#[test]
fn declared_names_win_over_keywords_even_when_declared_later() {
    let e = assignment("X = AREA AND SIZE\nLAYER AREA 1\nLAYER SIZE 2\n", "X");
    assert_eq!(op_name(&e), "AND");
    assert!(matches!(
        e,
        Expr::BinaryOp { ref left, ref right, .. }
            if matches!(left.as_ref(), Expr::LayerRef { name, .. } if name == "AREA")
            && matches!(right.as_ref(), Expr::LayerRef { name, .. } if name == "SIZE")
    ));
}

#[test]
fn compound_operators_fuse_with_edge() {
    let src = "LAYER A 1\nLAYER B 2\nX = A NOT INSIDE EDGE B\nY = A OUTSIDE EDGE B\nZ = A TOUCH OUTSIDE EDGE B\n";
    assert_eq!(op_name(&assignment(src, "X")), "NOT INSIDE EDGE");
    assert_eq!(op_name(&assignment(src, "Y")), "OUTSIDE EDGE");
    assert_eq!(op_name(&assignment(src, "Z")), "TOUCH OUTSIDE EDGE");
}

#[test]
fn abut_angle_stays_a_single_flag() {
    let e = assignment("LAYER A 1\nX = EXT A < 0.2 ABUT>10<80 SINGULAR\n", "X");
    match e {
        Expr::DrcOp {
            constraints,
            modifiers,
            ..
        } => {
            assert_eq!(constraints.len(), 1);
            assert_eq!(
                modifiers,
                vec![
                    Modifier::Flag("ABUT>10<80".into()),
                    Modifier::Flag("SINGULAR".into())
                ]
            );
        }
        other => panic!("expected DRCOp, got {:?}", other),
    }
}

#[test]
fn lex_errors_point_at_the_opening_delimiter_and_lexing_continues() {
    let out = parse("LAYER M1 1\nTITLE  \"never closed\nLAYER M2 2\n", "l.svrf").unwrap();
    let first = out.errors().next().unwrap();
    assert_eq!(first.kind, DiagnosticKind::UnterminatedString);
    assert_eq!((first.line, first.col), (2, 8));
    assert!(out
        .program
        .statements
        .iter()
        .any(|s| matches!(s, Stmt::LayerDef { name, .. } if name == "M2")));
}

#[test]
fn one_bad_statement_does_not_hide_the_rest() {
    let src = "LAYER M1 1\nX = M1 AND\nY = M1 OR M1\nZ = (M1\nW = M1\n";
    let out = parse(src, "r.svrf").unwrap();
    let kinds: Vec<_> = out.errors().map(|d| (d.kind, d.line)).collect();
    assert_eq!(
        kinds,
        vec![
            (DiagnosticKind::MissingOperand, 2),
            (DiagnosticKind::UnclosedBlock, 4)
        ]
    );
    let names: Vec<_> = out
        .program
        .statements
        .iter()
        .filter_map(|s| match s {
            Stmt::LayerAssignment { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["Y", "W"]);
}

#[test]
fn resolved_program_prints_and_reparses() {
    let src = "#IFDEF WIDE\nLAYER M1 1\nX = M1 SIZE BY 2\n#ELSE\nLAYER M1 1\nX = M1 SIZE BY 1\n#ENDIF\n";
    let out = parse(src, "c.svrf").unwrap();
    let defines: Defines = [("WIDE", None)].into_iter().collect();
    let resolved = resolve_conditionals(out.program, &defines);
    let printed = print(&resolved);
    assert_eq!(printed, "LAYER M1 1\nX = SIZE M1 BY 2\n");
    let again = parse(&printed, "c.svrf").unwrap();
    assert!(again.program.structurally_eq(&resolved));
}
