//! Keyword-role table and binding powers.
//!
//! Every SVRF keyword is declared once with the set of grammatical roles
//! it can play. Matching is ASCII case-insensitive. The table is built on
//! first use and shared read-only for the life of the process.

use std::collections::HashMap;
use std::ops::{BitOr, BitOrAssign};
use std::sync::OnceLock;

/// Bit set of keyword roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Roles(u16);

impl Roles {
    pub const NONE: Roles = Roles(0);
    /// Starts a multi-word directive (`LAYOUT PATH`, `DRC RESULTS DATABASE`).
    pub const DIRECTIVE_HEAD: Roles = Roles(1 << 0);
    /// Infix boolean/spatial layer operator.
    pub const BINARY_OP: Roles = Roles(1 << 1);
    /// Prefix layer operator.
    pub const UNARY_OP: Roles = Roles(1 << 2);
    /// DRC measurement operation.
    pub const DRC_OP: Roles = Roles(1 << 3);
    /// Trailing qualifier of a DRC operation.
    pub const MODIFIER: Roles = Roles(1 << 4);
    /// Has a prefix handler in layer expressions.
    pub const EXPR_STARTER: Roles = Roles(1 << 5);
    /// Structural keyword that is never a layer name in expressions.
    pub const RESERVED: Roles = Roles(1 << 6);
    /// Known word inside directive keyword runs.
    pub const VOCAB: Roles = Roles(1 << 7);

    pub fn contains(self, other: Roles) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Roles) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Roles {
    type Output = Roles;
    fn bitor(self, rhs: Roles) -> Roles {
        Roles(self.0 | rhs.0)
    }
}

impl BitOrAssign for Roles {
    fn bitor_assign(&mut self, rhs: Roles) {
        self.0 |= rhs.0;
    }
}

const DIRECTIVE_HEADS: &[&str] = &[
    "LAYOUT", "SOURCE", "DRC", "LVS", "ERC", "PEX", "MASK", "FLAG", "UNIT", "TEXT", "PORT",
    "VIRTUAL", "SVRF", "PRECISION", "RESOLUTION", "LABEL", "TITLE", "NET", "PATHCHK", "SONR",
    "TDDRC", "PERC", "LITHO", "MDP", "MDPMERGE", "FRACTURE", "HCELL", "FILTER", "EXCLUDE",
    "FLATTEN", "VARIABLE", "ENVIRONMENT", "DRAWN", "STAMP", "DFM", "RET", "DISCONNECT",
    "DVPARAMS",
];

const BINARY_OPS: &[&str] = &[
    "AND", "OR", "XOR", "BY", "NOT", "INSIDE", "OUTSIDE", "OUT", "INTERACT", "TOUCH", "ENCLOSE",
    "CUT", "STAMP",
];

const UNARY_OPS: &[&str] = &["NOT", "COPY", "HOLES", "DONUT", "EXTENT", "MERGE", "PUSH"];

const DRC_OPS: &[&str] = &["INT", "EXT", "ENC", "DENSITY", "ENCLOSE"];

const MODIFIERS: &[&str] = &[
    "ABUT", "SINGULAR", "REGION", "OPPOSITE", "NOTCH", "ORIGINAL", "CONNECTED", "WINDOW",
    "BACKUP", "RDB", "PRINT", "POLYGON", "EMPTY", "INNER", "CORNER", "ACUTE", "OBTUSE", "BEVEL",
    "SQUARE", "ORTHOGONAL", "CENTERS", "ALSO", "ONLY", "COUNT", "PERIMETER", "HIER", "CELL",
    "PROJECTING", "PARALLEL", "PERPENDICULAR", "LVSCAREFUL", "DRAWN", "RECTANGLE", "CONVEX",
    "LENGTH", "WITH", "EDGE", "STEP", "INSIDE", "OUTSIDE", "EVEN", "ODD", "PRIMARY", "MULTI",
    "MEASURE", "ALL", "ANNOTATE", "NODAL", "GOOD", "ENDPOINT", "ACCUMULATE", "ASPECT", "TOP",
    "BOTTOM", "LEFT", "RIGHT", "SEQUENTIAL", "CLIP", "SPACE", "FACE", "NOFACE", "DIRECTIONAL",
    "ABSOLUTE", "HINT", "OF", "TRUNCATE", "OVERUNDER", "UNDEROVER", "BY", "EXCLUDE", "RATIO",
    "INCLUDE", "MAGNITUDE", "OVERLAP", "SHIELDED", "MEASUREMENTS", "ANGLE1", "ANGLE2",
    "LENGTH1", "LENGTH2",
];

/// Modifier words naming a measured quantity; a comparison chain after one
/// constrains that quantity (`ANGLE1 == 90`, `ASPECT > 1`).
const NAMED_MEASUREMENTS: &[&str] = &["ANGLE1", "ANGLE2", "LENGTH1", "LENGTH2", "ASPECT"];

const EXPR_STARTERS: &[&str] = &[
    "OR", "NOT", "INTERACT", "ENCLOSE", "CUT", "COPY", "HOLES", "DONUT", "EXTENT", "INT", "EXT",
    "ENC", "DENSITY", "PERIMETER", "DRAWN", "STAMP", "DFM", "RET", "RECTANGLE", "CONVEX",
    "LENGTH", "WITH", "PUSH", "MERGE", "SIZE", "SHIFT", "GROW", "SHRINK", "RECTANGLES",
    "EXTENTS", "AREA", "VERTEX", "ANGLE", "EXPAND", "PATH", "GOOD", "OFFGRID", "ROTATE",
    "PATHCHK",
];

const RESERVED: &[&str] = &[
    "OF", "TRUNCATE", "LAYER", "CONNECT", "SCONNECT", "DEVICE", "DMACRO", "ATTACH", "GROUP",
    "TRACE", "PROPERTY", "IF", "ELSE", "ENDIF", "CMACRO", "UNDEROVER", "OVERUNDER", "BY",
    "STEP",
];

const VOCAB: &[&str] = &[
    "SYSTEM", "GDSII", "GDS", "OASIS", "SPICE", "PRIMARY", "PATH", "RESULTS", "DATABASE",
    "SUMMARY", "REPORT", "KEEP", "CHECK", "CHECKMAP", "MAP", "MAXIMUM", "INCREMENTAL", "MAGNIFY",
    "PROCESS", "BOX", "RECORD", "CLONE", "ROTATED", "PLACEMENTS", "INPUT", "OUTPUT",
    "EXCEPTION", "SEVERITY", "ALLOW", "DUPLICATE", "ERROR", "WARNING", "DEPTH", "BASE",
    "ORDER", "CASE", "COMPARE", "OPTION", "OPTIONS", "NAME", "NAMES", "STRICT", "PREFER",
    "PINS", "RECOGNIZE", "GATES", "ABORT", "SUPPLY", "IGNORE", "PORTS", "REDUCE", "SERIES",
    "SPLIT", "UNUSED", "GROUND", "POWER", "MULTIPLIER", "REPLICATE", "DEVICES", "SWAPPABLE",
    "CAPACITOR", "BIPOLAR", "MOS", "DIODES", "CAPACITORS", "RESISTORS", "SOFTCHK", "CONTACT",
    "COLON", "FALSE", "TRUE", "NONSIMPLE", "SKEW", "OFFGRID", "NAR", "YES", "NO", "NONE",
    "ON", "OFF", "ASCII", "BINARY", "HSPICE", "LUMPED", "DISTRIBUTED", "DIRECTORY", "QUERY",
    "XRC", "CCI", "NETLIST", "CAPACITANCE", "RESISTANCE", "FF", "OHM", "AUTO", "MANUAL",
    "SELECT", "UNSELECT", "SPECIFIED", "HIERARCHY", "CELLS", "LAYERS", "TEXTTYPE", "DATATYPE",
    "SVDB", "STATISTICS", "SEPARATOR", "ISOLATE", "NETS", "SHORTS", "LIMIT", "TOLERANCE",
    "DEFAULT", "GLOBAL", "LOCAL", "USER", "VALUE", "FILE", "GRID", "LOWER", "UPPER",
    "DEPTH", "SEED", "LABELS", "STRING", "ORIENTATION", "MEMORY", "LIST", "APPEND",
    "OVERWRITE", "CONTINUE", "PRESERVE", "PARAMETERS", "PROPERTIES", "POLYGONS", "COMMENT",
    "IDENTICAL", "WARNINGS", "SHORTED", "RESOLUTION", "DETAILED", "ANALYZE", "SOFT",
    "CONNECTIONS", "INSTANCE", "INSTANCES", "EXTRACT", "TRANSITION", "BOTH", "TILE",
    "SIZE", "DFM", "DENSITY", "LENGTH", "DISTANCE",
];

static TABLE: OnceLock<HashMap<&'static str, Roles>> = OnceLock::new();

fn table() -> &'static HashMap<&'static str, Roles> {
    TABLE.get_or_init(|| {
        let mut m: HashMap<&'static str, Roles> = HashMap::new();
        let groups = [
            (DIRECTIVE_HEADS, Roles::DIRECTIVE_HEAD),
            (BINARY_OPS, Roles::BINARY_OP),
            (UNARY_OPS, Roles::UNARY_OP),
            (DRC_OPS, Roles::DRC_OP),
            (MODIFIERS, Roles::MODIFIER),
            (EXPR_STARTERS, Roles::EXPR_STARTER),
            (RESERVED, Roles::RESERVED),
            (VOCAB, Roles::VOCAB),
        ];
        for (words, role) in groups {
            for w in words {
                *m.entry(*w).or_default() |= role;
            }
        }
        m
    })
}

/// All roles a word can play (empty for plain identifiers).
pub fn roles(word: &str) -> Roles {
    let upper = word.to_ascii_uppercase();
    table().get(upper.as_str()).copied().unwrap_or(Roles::NONE)
}

pub fn has_role(word: &str, role: Roles) -> bool {
    roles(word).intersects(role)
}

/// True for any word in the table, directive vocabulary included.
pub fn is_known(word: &str) -> bool {
    !roles(word).is_empty()
}

pub fn is_modifier(word: &str) -> bool {
    has_role(word, Roles::MODIFIER)
}

pub fn is_named_measurement(word: &str) -> bool {
    NAMED_MEASUREMENTS
        .iter()
        .any(|w| w.eq_ignore_ascii_case(word))
}

/// True for words the expression parser treats as keywords rather than
/// layer names when deciding whether an operand can start.
pub fn is_svrf_keyword(word: &str) -> bool {
    roles(word).intersects(
        Roles::DIRECTIVE_HEAD
            | Roles::BINARY_OP
            | Roles::UNARY_OP
            | Roles::DRC_OP
            | Roles::MODIFIER
            | Roles::EXPR_STARTER
            | Roles::RESERVED,
    )
}

// ── Binding powers ───────────────────────────────────────────────────

pub const BP_COMPARE: u8 = 5;
pub const BP_OR: u8 = 10;
pub const BP_AND: u8 = 20;
pub const BP_SPATIAL: u8 = 30;
pub const BP_BY: u8 = 35;
pub const BP_ADD: u8 = 36;
pub const BP_SUB: u8 = 38;
pub const BP_MUL: u8 = 40;
pub const BP_POW: u8 = 45;
pub const BP_PREFIX: u8 = 50;

/// Unconditional infix binding power of a keyword operator. Keywords whose
/// infix use depends on look-ahead (`COIN EDGE`, postfix `SIZE`, ...) are
/// decided by the expression parser.
pub fn infix_bp(word: &str) -> Option<u8> {
    match word.to_ascii_uppercase().as_str() {
        "OR" | "XOR" => Some(BP_OR),
        "AND" | "NOT" => Some(BP_AND),
        "INSIDE" | "OUTSIDE" | "OUT" | "INTERACT" | "TOUCH" | "ENCLOSE" | "CUT" | "STAMP"
        | "IN" => Some(BP_SPATIAL),
        "BY" | "WITH" => Some(BP_BY),
        _ => None,
    }
}
