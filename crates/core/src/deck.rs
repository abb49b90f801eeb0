//! `#INCLUDE` graph loading.
//!
//! Parses a root deck and, depth-first, every file it includes. Include
//! paths resolve against the directory of the including file. Each file is
//! parsed once even when included from several places; an include chain
//! that leads back to a file still being loaded is an error.

use crate::ast::{Pos, Stmt};
use crate::error::ParseFailure;
use crate::source::{decode_source, FileSystemProvider, SourceProvider};
use crate::{parse, ParseOutput};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One parsed file of a deck.
#[derive(Debug, Clone)]
pub struct DeckUnit {
    pub path: PathBuf,
    pub output: ParseOutput,
}

/// A root file and everything reachable from it through `#INCLUDE`, in
/// load order (each file before the files it includes).
#[derive(Debug, Clone)]
pub struct Deck {
    pub units: Vec<DeckUnit>,
}

impl Deck {
    pub fn root(&self) -> Option<&DeckUnit> {
        self.units.first()
    }

    pub fn has_errors(&self) -> bool {
        self.units.iter().any(|u| u.output.has_errors())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read '{path}': {message}")]
    Io { path: String, message: String },

    #[error("{file}:{line}: cannot include '{include}': {message}")]
    MissingInclude {
        file: String,
        line: u32,
        include: String,
        message: String,
    },

    #[error("{file}:{line}: include cycle detected: {chain}")]
    Cycle { file: String, line: u32, chain: String },

    #[error(transparent)]
    Parse(#[from] ParseFailure),
}

/// Load `root` and its includes from the filesystem.
pub fn load_deck(root: &Path) -> Result<Deck, LoadError> {
    load_deck_with_provider(root, &FileSystemProvider)
}

pub fn load_deck_with_provider(
    root: &Path,
    provider: &dyn SourceProvider,
) -> Result<Deck, LoadError> {
    let canon = provider.canonicalize(root).map_err(|e| LoadError::Io {
        path: root.display().to_string(),
        message: e.to_string(),
    })?;
    let mut loader = Loader {
        provider,
        visited: HashSet::new(),
        stack: Vec::new(),
        units: Vec::new(),
    };
    loader.load(root, canon)?;
    Ok(Deck {
        units: loader.units,
    })
}

struct Loader<'p> {
    provider: &'p dyn SourceProvider,
    visited: HashSet<PathBuf>,
    /// Files currently being loaded, outermost first.
    stack: Vec<PathBuf>,
    units: Vec<DeckUnit>,
}

impl Loader<'_> {
    fn load(&mut self, path: &Path, canon: PathBuf) -> Result<(), LoadError> {
        if !self.visited.insert(canon.clone()) {
            return Ok(());
        }
        let filename = path.display().to_string();
        let bytes = self.provider.read_bytes(path).map_err(|e| LoadError::Io {
            path: filename.clone(),
            message: e.to_string(),
        })?;
        let text = decode_source(&bytes, &filename)?;
        let output = parse(&text, &filename)?;

        let mut includes = Vec::new();
        collect_includes(&output.program.statements, &mut includes);
        self.units.push(DeckUnit {
            path: path.to_owned(),
            output,
        });

        let base = canon.parent().unwrap_or(Path::new(".")).to_owned();
        self.stack.push(canon.clone());
        for (include, pos) in includes {
            let missing = |e: std::io::Error| LoadError::MissingInclude {
                file: filename.clone(),
                line: pos.line,
                include: include.clone(),
                message: e.to_string(),
            };
            let resolved = self
                .provider
                .resolve_include(&base, &include)
                .map_err(missing)?;
            let target = self.provider.canonicalize(&resolved).map_err(missing)?;

            if self.stack.contains(&target) {
                let mut chain: Vec<String> = self.stack.iter().map(|p| file_name(p)).collect();
                chain.push(file_name(&target));
                return Err(LoadError::Cycle {
                    file: filename,
                    line: pos.line,
                    chain: chain.join(" \u{2192} "),
                });
            }
            self.load(&resolved, target)?;
        }
        self.stack.pop();
        Ok(())
    }
}

fn file_name(p: &Path) -> String {
    p.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// Include paths in source order, from both branches of every conditional.
fn collect_includes(body: &[Stmt], out: &mut Vec<(String, Pos)>) {
    for stmt in body {
        match stmt {
            Stmt::Include { path, pos } => out.push((path.clone(), *pos)),
            Stmt::IfDef {
                then_body,
                else_body,
                ..
            } => {
                collect_includes(then_body, out);
                collect_includes(else_body, out);
            }
            Stmt::RuleCheckBlock { body, .. } | Stmt::DMacro { body, .. } => {
                collect_includes(body, out)
            }
            _ => {}
        }
    }
}
