use crate::error::Error;
use crate::expr::{EvalContext, Evaluated, Expr, Strictness};
use crate::parser::Location;
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SymbolKind {
    Label,
    Constant,
}

#[derive(Debug, Clone, Serialize)]
pub struct Symbol {
    pub name: String,
    /// `#local` block the symbol belongs to, `None` for globals
    pub scope: Option<usize>,
    pub kind: SymbolKind,
    pub value: Option<i32>,
    pub defined_at: Location,
    #[serde(skip)]
    pending: Option<Pending>,
}

/// An `equ` whose expression referenced symbols not yet defined.
#[derive(Debug, Clone)]
struct Pending {
    expr: Expr,
    address: u16,
    scope: Option<usize>,
}

impl Symbol {
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[derive(Debug, Default)]
pub struct Symbols {
    table: IndexMap<(Option<usize>, String), Symbol>,
}

impl Symbols {
    pub fn new() -> Self {
        Symbols {
            table: IndexMap::new(),
        }
    }

    /// Defines a symbol with a known value. Redefining a name with the
    /// same kind and value is tolerated with a warning.
    pub fn define(
        &mut self,
        name: &str,
        scope: Option<usize>,
        kind: SymbolKind,
        value: i32,
        loc: Location,
    ) -> Result<(), Error> {
        let key = (scope, name.to_string());
        match self.table.get(&key) {
            None => {
                self.table.insert(
                    key,
                    Symbol {
                        name: name.to_string(),
                        scope,
                        kind,
                        value: Some(value),
                        defined_at: loc,
                        pending: None,
                    },
                );
                Ok(())
            }
            Some(prev) if !prev.is_pending() && prev.kind == kind && prev.value == Some(value) => {
                tracing::warn!(
                    "`{}` redefined at line {} with the same value",
                    name,
                    loc.line
                );
                Ok(())
            }
            Some(prev) => Err(Error::DuplicateSymbol(
                name.to_string(),
                prev.defined_at.line,
            )),
        }
    }

    /// Defines a constant whose value is computed once its dependencies
    /// are known. See [`Symbols::resolve_pending`].
    pub fn define_pending(
        &mut self,
        name: &str,
        scope: Option<usize>,
        expr: Expr,
        address: u16,
        loc: Location,
    ) -> Result<(), Error> {
        let key = (scope, name.to_string());
        if let Some(prev) = self.table.get(&key) {
            return Err(Error::DuplicateSymbol(
                name.to_string(),
                prev.defined_at.line,
            ));
        }
        self.table.insert(
            key,
            Symbol {
                name: name.to_string(),
                scope,
                kind: SymbolKind::Constant,
                value: None,
                defined_at: loc,
                pending: Some(Pending {
                    expr,
                    address,
                    scope,
                }),
            },
        );
        Ok(())
    }

    /// Evaluates pending constants until no more progress is made.
    /// Whatever is left refers to an undefined symbol or to itself.
    pub fn resolve_pending(&mut self) -> Vec<(Location, Error)> {
        let mut errors = vec![];
        loop {
            let ready = self.ready();
            if ready.is_empty() {
                break;
            }
            for (idx, result) in ready {
                let sym = &mut self.table[idx];
                sym.pending = None;
                match result {
                    Ok(v) => sym.value = Some(v),
                    Err(e) => errors.push((sym.defined_at, e)),
                }
            }
        }

        for (idx, missing) in self.stuck() {
            let sym = &mut self.table[idx];
            sym.pending = None;
            errors.push((sym.defined_at, Error::UndefinedSymbol(missing)));
        }
        errors
    }

    fn ready(&self) -> Vec<(usize, Result<i32, Error>)> {
        self.table
            .values()
            .enumerate()
            .filter_map(|(idx, sym)| {
                let pending = sym.pending.as_ref()?;
                let ctx = Scoped {
                    symbols: self,
                    scope: pending.scope,
                    address: pending.address,
                };
                match pending.expr.eval(&ctx, Strictness::Tolerant) {
                    Ok(Evaluated::Value(v)) => Some((idx, Ok(v))),
                    Ok(Evaluated::Unresolved(_)) => None,
                    Err(e) => Some((idx, Err(e))),
                }
            })
            .collect()
    }

    // First unresolved name of each pending expression
    fn stuck(&self) -> Vec<(usize, String)> {
        self.table
            .values()
            .enumerate()
            .filter_map(|(idx, sym)| {
                let pending = sym.pending.as_ref()?;
                let missing = pending
                    .expr
                    .symbols()
                    .into_iter()
                    .find(|name| {
                        self.lookup(name, pending.scope)
                            .map_or(true, |s| s.value.is_none())
                    })
                    .unwrap_or(&sym.name)
                    .to_string();
                Some((idx, missing))
            })
            .collect()
    }

    /// Finds `name` in the local scope first, then among the globals.
    pub fn lookup(&self, name: &str, scope: Option<usize>) -> Option<&Symbol> {
        let local = scope.and_then(|scope| self.table.get(&(Some(scope), name.to_string())));
        local.or_else(|| self.table.get(&(None, name.to_string())))
    }

    /// Global symbol by name.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.lookup(name, None)
    }

    pub fn get_val(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(|sym| sym.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.table.values()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Symbol view for expression evaluation at one point of the program.
pub struct Scoped<'a> {
    pub symbols: &'a Symbols,
    pub scope: Option<usize>,
    pub address: u16,
}

impl EvalContext for Scoped<'_> {
    fn lookup(&self, name: &str) -> Option<i32> {
        self.symbols
            .lookup(name, self.scope)
            .and_then(|sym| sym.value)
    }

    fn current_address(&self) -> u16 {
        self.address
    }
}
