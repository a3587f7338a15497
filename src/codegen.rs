//! Generación de código.
//!
//! El generador recorre el árbol sintáctico y produce, por cada
//! procedimiento, una secuencia de elementos del ancho del formato.
//! Las llamadas a procedimientos definidos antes en el archivo se
//! resuelven por plegado: los bytes del procedimiento llamado se
//! anexan en línea al buffer del llamador, y el llamado queda marcado
//! como alcanzable para el optimizador. Todo lo demás se despacha a la
//! tabla de instrucciones del vendor.

use crate::{
    lex::Identifier,
    parse::{Ast, Item, Procedure, Value},
    peephole::Peephole,
    source::Located,
    vendor::{register_bounds, Vendor, Width},
};

use thiserror::Error;

/// Error de generación de código.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CodegenError {
    /// La instrucción no existe en el formato objetivo.
    #[error("Instruction `{0}` doesn't exist for this target")]
    InstructionDoesntExist(Identifier),

    /// Un número de registro no cabe en el ancho del formato.
    #[error("Register number {0} is out of range, registers go from R1 to R{1}")]
    RegisterNumberTooLarge(usize, i64),

    /// Falta un parámetro, nombrado por el manejador.
    #[error("Expected parameter `{0}`")]
    ExpectedParameter(&'static str),

    /// Un parámetro no tiene la clase esperada.
    #[error("Type mismatch: expected a {expected}, found a {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Cantidad insuficiente de parámetros para una firma variádica.
    #[error("Too little parameters for `{name}`, its signature is `{signature}`")]
    TooLittleParams {
        name: &'static str,
        signature: &'static str,
    },

    /// Un operando no cabe en el ancho de palabra del formato.
    #[error("Number {0} does not fit in this target's word")]
    NumberOutOfRange(i64),

    /// Cualquier otra condición, descrita por el manejador.
    #[error("{0}")]
    Other(String),
}

/// Mapa de procedimiento a su secuencia generada.
///
/// El orden de iteración es el orden de inserción, de manera que el
/// enlazado de varios procedimientos sea determinista.
#[derive(Debug)]
pub struct ProcedureMap<W> {
    entries: Vec<(Identifier, Vec<W>)>,
}

impl<W> ProcedureMap<W> {
    pub fn new() -> Self {
        ProcedureMap {
            entries: Vec::new(),
        }
    }

    /// Busca la secuencia de un procedimiento.
    pub fn get(&self, name: &str) -> Option<&[W]> {
        self.entries
            .iter()
            .find(|(key, _)| key.as_ref() == name)
            .map(|(_, body)| body.as_slice())
    }

    /// Determina si el mapa contiene un procedimiento.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Inserta o reemplaza un procedimiento.
    pub fn insert(&mut self, name: Identifier, body: Vec<W>) {
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = body,
            None => self.entries.push((name, body)),
        }
    }

    /// Conserva únicamente los procedimientos que satisfacen el filtro.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.entries.retain(|(name, _)| keep(name.as_ref()));
    }

    /// Itera en orden de inserción.
    pub fn iter(&self) -> impl Iterator<Item = (&Identifier, &[W])> {
        self.entries
            .iter()
            .map(|(name, body)| (name, body.as_slice()))
    }

    /// Nombres presentes, en orden de inserción.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<W> Default for ProcedureMap<W> {
    fn default() -> Self {
        ProcedureMap::new()
    }
}

/// Genera el mapa de procedimientos de un programa completo.
///
/// El rastreador de alcanzabilidad devuelto registra los plegados que
/// ocurrieron durante la generación; el optimizador lo consume.
pub fn generate<W: Width>(
    vendor: &Vendor<W>,
    ast: &Ast,
) -> Result<(ProcedureMap<W>, Peephole), Located<CodegenError>> {
    let mut generator = Generator {
        vendor,
        procedures: ProcedureMap::new(),
        peephole: Peephole::new(),
    };

    for item in ast.items() {
        if let Item::Procedure(procedure) = item {
            let body = generator.routine(procedure)?;
            generator
                .procedures
                .insert(procedure.name().as_ref().clone(), body);
        }
    }

    Ok((generator.procedures, generator.peephole))
}

struct Generator<'a, W: Width> {
    vendor: &'a Vendor<W>,
    procedures: ProcedureMap<W>,
    peephole: Peephole,
}

impl<W: Width> Generator<'_, W> {
    /// Genera la secuencia de un procedimiento.
    fn routine(&mut self, procedure: &Procedure) -> Result<Vec<W>, Located<CodegenError>> {
        let mut buffer = Vec::new();

        for call in procedure.body() {
            let name = call.name();

            // Plegado: un procedimiento ya generado se anexa en línea
            if let Some(folded) = self.procedures.get(name.as_ref().as_ref()) {
                buffer.extend_from_slice(folded);
                self.peephole.mark(name.as_ref().clone());
                continue;
            }

            let handler = match self.vendor.lookup(name.as_ref().as_ref()) {
                Some(handler) => handler,
                None => {
                    let error = CodegenError::InstructionDoesntExist(name.as_ref().clone());
                    return Err(Located::at(error, name.location().clone()));
                }
            };

            // Los números de registro se verifican antes de invocar al
            // manejador, señalando el span del registro ofensor
            for parameter in call.parameters() {
                if let Value::Register(number) = parameter.val() {
                    if let Err(error) = register_bounds::<W>(*number) {
                        return Err(Located::at(error, parameter.location().clone()));
                    }
                }
            }

            handler(&mut buffer, call.parameters())
                .map_err(|error| Located::at(error, name.location().clone()))?;

            if self.vendor.nul_after_sequence() {
                buffer.push(self.vendor.nul_byte());
            }
        }

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, parse, source::Source, vendor};

    fn ast(text: &str) -> Ast {
        let source = Source::new("test.lr", text);
        let tokens = Lexer::new(&source, None)
            .try_exhaustive()
            .expect("lexing failed");

        parse::parse(&source, tokens).expect("parsing failed")
    }

    #[test]
    fn single_instruction_with_nul() {
        let (procedures, _) = generate(&vendor::nexfuse(), &ast("_start: echo 'A'\n")).unwrap();

        assert_eq!(procedures.get("_start").unwrap(), [40, 65, 0]);
    }

    #[test]
    fn every_instruction_gets_its_own_nul() {
        let (procedures, _) =
            generate(&vendor::nexfuse(), &ast("_start:\n echo '\\n'\n echo 'B'\n")).unwrap();

        assert_eq!(procedures.get("_start").unwrap(), [40, 10, 0, 40, 66, 0]);
    }

    #[test]
    fn calls_to_earlier_procedures_fold_inline() {
        let (procedures, peephole) =
            generate(&vendor::nexfuse(), &ast("a: echo 'A'\n_start: a\n")).unwrap();

        // Los bytes de `a` aparecen contiguos dentro de `_start`
        let a = procedures.get("a").unwrap().to_vec();
        let start = procedures.get("_start").unwrap();

        assert_eq!(start, a);
        assert!(peephole.is_used("a"));
        assert!(!peephole.is_used("_start"));
    }

    #[test]
    fn map_iterates_in_definition_order() {
        let (procedures, _) = generate(
            &vendor::nexfuse(),
            &ast("b: nop\na: nop\n_start: nop\n"),
        )
        .unwrap();

        let names: Vec<_> = procedures.names().collect();
        assert_eq!(names, vec!["b", "a", "_start"]);
    }

    #[test]
    fn unknown_instructions_are_rejected() {
        let error = generate(&vendor::openlud(), &ast("_start: jmp a\n")).unwrap_err();

        assert!(matches!(
            error.val(),
            CodegenError::InstructionDoesntExist(name) if name.as_ref() == "jmp"
        ));
    }

    #[test]
    fn register_check_points_at_the_register() {
        let error =
            generate(&vendor::openlud(), &ast("_start: each R15353135\n")).unwrap_err();

        assert!(matches!(
            error.val(),
            CodegenError::RegisterNumberTooLarge(15_353_135, 127)
        ));

        // El span señala al registro, no a la instrucción
        assert_eq!(error.location().start().column(), 14);
    }

    #[test]
    fn wide_targets_accept_large_registers() {
        let (procedures, _) =
            generate(&vendor::siax(), &ast("_start: each R15353135\n")).unwrap();

        assert_eq!(procedures.get("_start").unwrap(), [42, 15_353_135, 0]);
    }
}
