//! Eliminación de procedimientos muertos.
//!
//! Durante la generación, cada plegado marca como alcanzable al
//! procedimiento plegado. Antes de barrer, el enlazador siembra
//! explícitamente el punto de entrada. El barrido elimina del mapa
//! todo procedimiento cuyo nombre no quedó marcado.

use crate::{codegen::ProcedureMap, lex::Identifier};
use std::collections::HashSet;

/// Conjunto de procedimientos alcanzables.
#[derive(Default, Debug)]
pub struct Peephole {
    used: HashSet<Identifier>,
}

impl Peephole {
    pub fn new() -> Self {
        Peephole {
            used: HashSet::new(),
        }
    }

    /// Marca un procedimiento como alcanzable.
    pub fn mark(&mut self, name: Identifier) {
        self.used.insert(name);
    }

    /// Siembra el punto de entrada.
    pub fn seed(&mut self, entry: &str) {
        self.used.insert(Identifier::from(entry));
    }

    /// Determina si un procedimiento quedó marcado.
    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Elimina del mapa todo procedimiento no alcanzable.
    pub fn sweep<W>(&self, procedures: &mut ProcedureMap<W>) {
        procedures.retain(|name| self.used.contains(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_keeps_only_marked_procedures() {
        let mut procedures = ProcedureMap::new();
        procedures.insert(Identifier::from("a"), vec![1u8]);
        procedures.insert(Identifier::from("b"), vec![2]);
        procedures.insert(Identifier::from("_start"), vec![3]);

        let mut peephole = Peephole::new();
        peephole.mark(Identifier::from("a"));
        peephole.seed("_start");
        peephole.sweep(&mut procedures);

        assert!(procedures.contains("a"));
        assert!(!procedures.contains("b"));
        assert!(procedures.contains("_start"));
    }

    #[test]
    fn every_survivor_is_entry_or_marked() {
        let mut procedures = ProcedureMap::new();
        for name in ["x", "y", "z"] {
            procedures.insert(Identifier::from(name), vec![0u8]);
        }

        let mut peephole = Peephole::new();
        peephole.mark(Identifier::from("y"));
        peephole.seed("_start");
        peephole.sweep(&mut procedures);

        for name in procedures.names() {
            assert!(name == "_start" || peephole.is_used(name));
        }

        assert_eq!(procedures.len(), 1);
    }
}
