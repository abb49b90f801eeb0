//! Syntax tree produced by the parser.
//!
//! Statements and expressions are closed tagged unions. Every node records
//! the position of its leading token. Nodes are plain owned data: once the
//! parser returns a [`Program`] nothing mutates it.

use serde::Serialize;

// ──────────────────────────────────────────────
// Positions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Pos { line, col }
    }
}

// ──────────────────────────────────────────────
// Program
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub file: String,
    pub statements: Vec<Stmt>,
}

impl Program {
    /// Position-free JSON form of the tree. Two programs are structurally
    /// equal when their shapes are equal.
    pub fn shape(&self) -> serde_json::Value {
        let mut v = serde_json::to_value(&self.statements).unwrap_or(serde_json::Value::Null);
        strip_positions(&mut v);
        v
    }

    pub fn structurally_eq(&self, other: &Program) -> bool {
        self.shape() == other.shape()
    }
}

fn strip_positions(v: &mut serde_json::Value) {
    match v {
        serde_json::Value::Object(map) => {
            map.remove("pos");
            for child in map.values_mut() {
                strip_positions(child);
            }
        }
        serde_json::Value::Array(items) => {
            for child in items {
                strip_positions(child);
            }
        }
        _ => {}
    }
}

// ──────────────────────────────────────────────
// Statements
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node")]
pub enum Stmt {
    Define {
        name: String,
        value: Option<String>,
        pos: Pos,
    },
    /// `#IFDEF`/`#IFNDEF`. Both branches are always captured.
    IfDef {
        name: String,
        value: Option<String>,
        negated: bool,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        pos: Pos,
    },
    Include {
        path: String,
        pos: Pos,
    },
    EncryptedBlock {
        content: String,
        pos: Pos,
    },
    LayerDef {
        name: String,
        numbers: Vec<Arg>,
        pos: Pos,
    },
    LayerMap {
        gds_num: i64,
        map_type: String,
        type_num: i64,
        internal_num: i64,
        pos: Pos,
    },
    VariableDef {
        name: String,
        values: Vec<Expr>,
        pos: Pos,
    },
    Directive {
        keywords: Vec<String>,
        arguments: Vec<Arg>,
        property_block: Option<PropertyBlock>,
        pos: Pos,
    },
    /// `name = expr`, or `name += expr` / `name -= expr` inside property blocks.
    LayerAssignment {
        name: String,
        op: String,
        expression: Expr,
        pos: Pos,
    },
    RuleCheckBlock {
        name: String,
        description: Vec<String>,
        body: Vec<Stmt>,
        pos: Pos,
    },
    Connect {
        soft: bool,
        layers: Vec<String>,
        via: Option<String>,
        pos: Pos,
    },
    Device {
        element: String,
        model: Option<String>,
        seed: String,
        pins: Vec<DevicePin>,
        aux_layers: Vec<String>,
        cmacro: Option<String>,
        cmacro_args: Vec<Arg>,
        property_block: Option<PropertyBlock>,
        pos: Pos,
    },
    DMacro {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
        pos: Pos,
    },
    Group {
        name: String,
        patterns: Vec<String>,
        pos: Pos,
    },
    Attach {
        layer: String,
        net: String,
        pos: Pos,
    },
    TraceProperty {
        device: String,
        args: Vec<Arg>,
        pos: Pos,
    },
    IfExpr {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_ifs: Vec<ElseIf>,
        else_body: Option<Vec<Stmt>>,
        pos: Pos,
    },
    PropertyBlock(PropertyBlock),
    /// A bare expression used as a statement, typically a rule check.
    Expression {
        expr: Expr,
    },
    /// Placeholder for a statement that failed to parse.
    Error {
        message: String,
        skipped: String,
        pos: Pos,
    },
}

impl Stmt {
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::Define { pos, .. }
            | Stmt::IfDef { pos, .. }
            | Stmt::Include { pos, .. }
            | Stmt::EncryptedBlock { pos, .. }
            | Stmt::LayerDef { pos, .. }
            | Stmt::LayerMap { pos, .. }
            | Stmt::VariableDef { pos, .. }
            | Stmt::Directive { pos, .. }
            | Stmt::LayerAssignment { pos, .. }
            | Stmt::RuleCheckBlock { pos, .. }
            | Stmt::Connect { pos, .. }
            | Stmt::Device { pos, .. }
            | Stmt::DMacro { pos, .. }
            | Stmt::Group { pos, .. }
            | Stmt::Attach { pos, .. }
            | Stmt::TraceProperty { pos, .. }
            | Stmt::IfExpr { pos, .. }
            | Stmt::Error { pos, .. } => *pos,
            Stmt::PropertyBlock(block) => block.pos,
            Stmt::Expression { expr } => expr.pos(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Define { .. } => "Define",
            Stmt::IfDef { .. } => "IfDef",
            Stmt::Include { .. } => "Include",
            Stmt::EncryptedBlock { .. } => "EncryptedBlock",
            Stmt::LayerDef { .. } => "LayerDef",
            Stmt::LayerMap { .. } => "LayerMap",
            Stmt::VariableDef { .. } => "VariableDef",
            Stmt::Directive { .. } => "Directive",
            Stmt::LayerAssignment { .. } => "LayerAssignment",
            Stmt::RuleCheckBlock { .. } => "RuleCheckBlock",
            Stmt::Connect { .. } => "Connect",
            Stmt::Device { .. } => "Device",
            Stmt::DMacro { .. } => "DMacro",
            Stmt::Group { .. } => "Group",
            Stmt::Attach { .. } => "Attach",
            Stmt::TraceProperty { .. } => "TraceProperty",
            Stmt::IfExpr { .. } => "IfExpr",
            Stmt::PropertyBlock(_) => "PropertyBlock",
            Stmt::Expression { .. } => "Expression",
            Stmt::Error { .. } => "Error",
        }
    }
}

/// `[ PROPERTY a, b ... ]` attached to a directive or device, or standalone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyBlock {
    pub properties: Vec<String>,
    pub body: Vec<Stmt>,
    /// Tokens following the closing `]` on the same line.
    pub trailing: Vec<Arg>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElseIf {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DevicePin {
    pub layer: String,
    pub role: Option<String>,
}

/// Raw argument of a directive-like statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Arg {
    Ident(String),
    Str(String),
    Number(f64),
    Punct(String),
}

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node")]
pub enum Expr {
    BinaryOp {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Pos,
    },
    UnaryOp {
        op: String,
        operand: Box<Expr>,
        pos: Pos,
    },
    LayerRef {
        name: String,
        pos: Pos,
    },
    NumberLiteral {
        value: f64,
        pos: Pos,
    },
    StringLiteral {
        value: String,
        pos: Pos,
    },
    FuncCall {
        name: String,
        args: Vec<Expr>,
        pos: Pos,
    },
    /// An expression qualified by comparison constraints and/or trailing
    /// modifiers.
    ConstrainedExpr {
        expr: Box<Expr>,
        constraints: Vec<Constraint>,
        modifiers: Vec<Modifier>,
        pos: Pos,
    },
    #[serde(rename = "DRCOp")]
    DrcOp {
        op: String,
        operands: Vec<Expr>,
        constraints: Vec<Constraint>,
        modifiers: Vec<Modifier>,
        pos: Pos,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::BinaryOp { pos, .. }
            | Expr::UnaryOp { pos, .. }
            | Expr::LayerRef { pos, .. }
            | Expr::NumberLiteral { pos, .. }
            | Expr::StringLiteral { pos, .. }
            | Expr::FuncCall { pos, .. }
            | Expr::ConstrainedExpr { pos, .. }
            | Expr::DrcOp { pos, .. } => *pos,
        }
    }

    pub fn layer(name: impl Into<String>, pos: Pos) -> Expr {
        Expr::LayerRef {
            name: name.into(),
            pos,
        }
    }

    pub fn number(value: f64, pos: Pos) -> Expr {
        Expr::NumberLiteral { value, pos }
    }

    /// Infix application, positioned at its left operand.
    pub fn binary(op: impl Into<String>, left: Expr, right: Expr) -> Expr {
        let pos = left.pos();
        Expr::binary_at(op, left, right, pos)
    }

    /// Binary node for a prefix spelling (`STAMP a BY b`, `OR a b`),
    /// positioned at the operator keyword.
    pub fn binary_at(op: impl Into<String>, left: Expr, right: Expr, pos: Pos) -> Expr {
        Expr::BinaryOp {
            op: op.into(),
            left: Box::new(left),
            right: Box::new(right),
            pos,
        }
    }

    pub fn unary(op: impl Into<String>, operand: Expr, pos: Pos) -> Expr {
        Expr::UnaryOp {
            op: op.into(),
            operand: Box::new(operand),
            pos,
        }
    }

    /// Wrap in a ConstrainedExpr, or return unchanged when there is nothing
    /// to attach.
    pub fn constrained(self, constraints: Vec<Constraint>, modifiers: Vec<Modifier>) -> Expr {
        if constraints.is_empty() && modifiers.is_empty() {
            return self;
        }
        let pos = self.pos();
        Expr::ConstrainedExpr {
            expr: Box::new(self),
            constraints,
            modifiers,
            pos,
        }
    }

    /// Leaf nodes print without parentheses in any position.
    pub fn is_atomic(&self) -> bool {
        matches!(
            self,
            Expr::LayerRef { .. }
                | Expr::NumberLiteral { .. }
                | Expr::StringLiteral { .. }
                | Expr::FuncCall { .. }
        )
    }
}

/// One comparison of a constraint chain. `value` is absent only for the
/// `BY` dimension marker of RECTANGLE.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constraint {
    pub op: String,
    pub value: Option<Expr>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Modifier {
    Flag(String),
    Param { name: String, value: Expr },
}

impl Modifier {
    pub fn name(&self) -> &str {
        match self {
            Modifier::Flag(name) => name,
            Modifier::Param { name, .. } => name,
        }
    }

    /// A measured quantity with its comparison chain (`ANGLE1 == 90`): a
    /// Param whose value is the quantity, as a LayerRef of the same name,
    /// wrapped in a ConstrainedExpr.
    pub fn measurement(name: impl Into<String>, constraints: Vec<Constraint>, pos: Pos) -> Modifier {
        let name = name.into();
        Modifier::Param {
            value: Expr::ConstrainedExpr {
                expr: Box::new(Expr::layer(name.clone(), pos)),
                constraints,
                modifiers: Vec::new(),
                pos,
            },
            name,
        }
    }

    /// The comparison chain of a [`Modifier::measurement`].
    pub fn measured(&self) -> Option<&[Constraint]> {
        match self {
            Modifier::Param {
                name,
                value:
                    Expr::ConstrainedExpr {
                        expr,
                        constraints,
                        modifiers,
                        ..
                    },
            } if modifiers.is_empty() => match expr.as_ref() {
                Expr::LayerRef { name: inner, .. } if inner == name => Some(constraints),
                _ => None,
            },
            _ => None,
        }
    }
}
