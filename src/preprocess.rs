//! Preprocesador de directivas.
//!
//! Tras el análisis sintáctico, cada macro de corchete cuyo nombre
//! coincide con una directiva registrada se ejecuta contra las
//! opciones compartidas de la compilación. Los procedimientos y los
//! asides pasan intactos. Las opciones dadas por línea de comandos
//! tienen precedencia: una directiva solo escribe un valor que la CLI
//! no fijó.

use crate::{
    driver::Options,
    lex::Identifier,
    link::{Endian, Format},
    parse::{Ast, Item, MacroCall, Value},
    source::{Located, Location},
};

use thiserror::Error;

/// Error de preprocesamiento.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PreprocessorError {
    /// La directiva no está registrada.
    #[error("Directive `{0}` doesn't exist")]
    NonexistentDirective(Identifier),

    /// Cantidad de argumentos incorrecta.
    #[error("Directive `{directive}` expects {expected} argument(s), found {found}")]
    InvalidArgumentCount {
        directive: &'static str,
        expected: usize,
        found: usize,
    },

    /// Clase de argumento incorrecta.
    #[error("Directive `{directive}` expects {expected}")]
    InvalidArgumentType {
        directive: &'static str,
        expected: &'static str,
    },

    /// Un argumento no nombra un formato conocido.
    #[error("Unknown format `{0}`")]
    UnknownFormat(Identifier),

    /// Un argumento no nombra un orden de bytes.
    #[error("Unknown endianness `{0}`, expected `little` or `big`")]
    UnknownEndian(Identifier),

    /// `compile-if` contra un formato distinto al seleccionado.
    #[error("This file only compiles for `{required}`, but the selected format is `{selected}`")]
    IncompatibleTarget {
        required: Identifier,
        selected: Format,
    },
}

/// Ejecuta todas las directivas de un programa, en orden.
pub fn apply(ast: &Ast, options: &mut Options) -> Result<(), Located<PreprocessorError>> {
    for item in ast.items() {
        match item {
            Item::Macro(directive) => dispatch(directive, options)?,

            // Procedimientos y asides pasan intactos
            Item::Procedure(_) | Item::Aside(_) => (),
        }
    }

    Ok(())
}

fn dispatch(directive: &MacroCall, options: &mut Options) -> Result<(), Located<PreprocessorError>> {
    let name = directive.name();

    let result = if name.as_ref().is("compat") {
        compat(directive, options)
    } else if name.as_ref().is("endian") {
        endian(directive, options)
    } else if name.as_ref().is("compile-if") {
        compile_if(directive, options)
    } else {
        Err(PreprocessorError::NonexistentDirective(
            name.as_ref().clone(),
        ))
    };

    result.map_err(|error| {
        let location = error_location(&error, directive);
        Located::at(error, location)
    })
}

/// `[compat <formato>]` fija el formato, salvo precedencia de la CLI.
fn compat(directive: &MacroCall, options: &mut Options) -> Result<(), PreprocessorError> {
    let name = identifier("compat", single("compat", directive)?)?;
    let format = name
        .as_ref()
        .parse()
        .map_err(|_| PreprocessorError::UnknownFormat(name.clone()))?;

    if options.format.is_none() {
        options.format = Some(format);
    }

    Ok(())
}

/// `[endian <little|big>]` fija el orden de bytes, salvo la CLI.
fn endian(directive: &MacroCall, options: &mut Options) -> Result<(), PreprocessorError> {
    let name = identifier("endian", single("endian", directive)?)?;

    let endian = if name.is("little") {
        Endian::Little
    } else if name.is("big") {
        Endian::Big
    } else {
        return Err(PreprocessorError::UnknownEndian(name.clone()));
    };

    if options.endian.is_none() {
        options.endian = Some(endian);
    }

    Ok(())
}

/// `[compile-if <formato>]` aborta si el formato ya elegido difiere.
fn compile_if(directive: &MacroCall, options: &mut Options) -> Result<(), PreprocessorError> {
    let name = identifier("compile-if", single("compile-if", directive)?)?;

    if let Some(selected) = options.format {
        let required: Result<Format, _> = name.as_ref().parse();
        if required != Ok(selected) {
            return Err(PreprocessorError::IncompatibleTarget {
                required: name.clone(),
                selected,
            });
        }
    }

    Ok(())
}

/// Exige exactamente un argumento.
fn single<'a>(
    directive: &'static str,
    call: &'a MacroCall,
) -> Result<&'a Located<Value>, PreprocessorError> {
    match call.parameters() {
        [one] => Ok(one),
        params => Err(PreprocessorError::InvalidArgumentCount {
            directive,
            expected: 1,
            found: params.len(),
        }),
    }
}

/// Exige que un argumento sea un identificador.
fn identifier<'a>(
    directive: &'static str,
    value: &'a Located<Value>,
) -> Result<&'a Identifier, PreprocessorError> {
    match value.val() {
        Value::Identifier(name) => Ok(name),
        _ => Err(PreprocessorError::InvalidArgumentType {
            directive,
            expected: "an identifier",
        }),
    }
}

/// Los errores de argumento señalan al argumento; el resto, al nombre.
fn error_location(error: &PreprocessorError, directive: &MacroCall) -> Location {
    match error {
        PreprocessorError::UnknownFormat(_)
        | PreprocessorError::UnknownEndian(_)
        | PreprocessorError::InvalidArgumentType { .. } => directive
            .parameters()
            .first()
            .map(|value| value.location().clone())
            .unwrap_or_else(|| directive.name().location().clone()),

        _ => directive.name().location().clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, parse, source::Source};

    fn preprocess(text: &str, options: &mut Options) -> Result<(), PreprocessorError> {
        let source = Source::new("test.lr", text);
        let tokens = Lexer::new(&source, None)
            .try_exhaustive()
            .expect("lexing failed");

        let ast = parse::parse(&source, tokens).expect("parsing failed");
        apply(&ast, options).map_err(Located::into_inner)
    }

    #[test]
    fn compat_selects_the_format() {
        let mut options = Options::default();
        preprocess("[compat nexfuse]\nmain: nop\n", &mut options).unwrap();

        assert_eq!(options.format, Some(Format::NexFuse));
    }

    #[test]
    fn the_command_line_wins_over_compat() {
        let mut options = Options {
            format: Some(Format::OpenLud),
            ..Options::default()
        };

        preprocess("[compat nexfuse]\nmain: nop\n", &mut options).unwrap();
        assert_eq!(options.format, Some(Format::OpenLud));
    }

    #[test]
    fn endian_directive() {
        let mut options = Options::default();
        preprocess("[endian big]\nmain: nop\n", &mut options).unwrap();

        assert_eq!(options.endian, Some(Endian::Big));
    }

    #[test]
    fn compile_if_accepts_the_selected_format() {
        let mut options = Options {
            format: Some(Format::NexFuse),
            ..Options::default()
        };

        preprocess("[compile-if nexfuse]\nmain: nop\n", &mut options).unwrap();
    }

    #[test]
    fn compile_if_aborts_on_mismatch() {
        let mut options = Options {
            format: Some(Format::OpenLud),
            ..Options::default()
        };

        let error = preprocess("[compile-if nexfuse]\nmain: nop\n", &mut options).unwrap_err();
        assert!(matches!(
            error,
            PreprocessorError::IncompatibleTarget {
                selected: Format::OpenLud,
                ..
            }
        ));
    }

    #[test]
    fn compile_if_without_a_format_passes() {
        let mut options = Options::default();
        preprocess("[compile-if nexfuse]\nmain: nop\n", &mut options).unwrap();
    }

    #[test]
    fn unknown_directives_are_rejected() {
        let mut options = Options::default();
        let error = preprocess("[inline everything]\nmain: nop\n", &mut options).unwrap_err();

        assert!(matches!(
            error,
            PreprocessorError::NonexistentDirective(name) if name.as_ref() == "inline"
        ));
    }

    #[test]
    fn argument_arity_is_checked() {
        let mut options = Options::default();
        let error = preprocess("[compat]\nmain: nop\n", &mut options).unwrap_err();

        assert!(matches!(
            error,
            PreprocessorError::InvalidArgumentCount {
                directive: "compat",
                expected: 1,
                found: 0,
            }
        ));
    }

    #[test]
    fn argument_types_are_checked() {
        let mut options = Options::default();
        let error = preprocess("[compat 5]\nmain: nop\n", &mut options).unwrap_err();

        assert!(matches!(
            error,
            PreprocessorError::InvalidArgumentType {
                directive: "compat",
                ..
            }
        ));
    }

    #[test]
    fn unknown_formats_are_rejected() {
        let mut options = Options::default();
        let error = preprocess("[compat z80]\nmain: nop\n", &mut options).unwrap_err();

        assert!(matches!(
            error,
            PreprocessorError::UnknownFormat(name) if name.as_ref() == "z80"
        ));
    }
}
