//! Orquestación de la compilación.
//!
//! El driver encadena las fases en orden de flujo de datos: estilista,
//! lexer, parser, preprocesador, generación, enlazado y persistencia.
//! Ningún error se recupera internamente; el primero que ocurre en una
//! fase detiene la compilación y sube como [`Diagnostics`].

use std::{io::Write, path::PathBuf};

use crate::{
    codegen,
    error::Diagnostics,
    lex::Lexer,
    link::{self, Endian, Format, LinkError},
    parse, preprocess,
    source::Source,
    style,
};

/// Opciones compartidas de una compilación.
///
/// La CLI las construye; las directivas del preprocesador escriben los
/// campos que la CLI dejó sin fijar.
#[derive(Debug, Clone)]
pub struct Options {
    /// Archivo de entrada.
    pub file: PathBuf,

    /// Ruta del binario de salida.
    pub output: PathBuf,

    /// Formato objetivo, si ya fue decidido.
    pub format: Option<Format>,

    /// Ejecutar el estilista.
    pub stylist: bool,

    /// Cualquier hallazgo de estilo detiene la compilación.
    pub strict_stylist: bool,

    /// Desactivar el límite léxico de magnitud numérica.
    pub allow_big_numbers: bool,

    /// Orden de bytes al persistir, si ya fue decidido.
    pub endian: Option<Endian>,

    /// Nivel de optimización; cero desactiva el barrido de muertos.
    pub optimization_level: u8,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            file: PathBuf::new(),
            output: PathBuf::from("a.out"),
            format: None,
            stylist: true,
            strict_stylist: false,
            allow_big_numbers: false,
            endian: None,
            optimization_level: 1,
        }
    }
}

/// Formato por defecto cuando ni la CLI ni `[compat]` eligen uno.
pub const DEFAULT_FORMAT: Format = Format::OpenLud;

/// Compila una unidad de traducción completa y persiste el binario.
///
/// `name` es el nombre del origen para diagnósticos. Los hallazgos de
/// estilo no estrictos se reportan por `stderr` sin detener nada.
pub fn build<O: Write>(
    text: &str,
    name: &str,
    options: &mut Options,
    output: &mut O,
) -> Result<(), Diagnostics> {
    let source = Source::new(name, text);

    // El estilista opera sobre el texto crudo, antes del lexer
    if options.stylist {
        let findings = style::review(&source);
        if !findings.is_empty() {
            let report = Diagnostics::suggestions(findings);
            if options.strict_stylist {
                return Err(report);
            }

            eprint!("{}", report);
        }
    }

    // El límite numérico depende del formato; si el formato aún puede
    // llegar por `[compat]`, la verificación queda desactivada y los
    // operandos fuera de rango se atajan en la generación
    let limit = match options.format {
        Some(format) if !options.allow_big_numbers => Some(format.max_number()),
        _ => None,
    };

    let tokens = Lexer::new(&source, limit)
        .try_exhaustive()
        .map_err(Diagnostics::from)?;

    let ast = parse::parse(&source, tokens).map_err(Diagnostics::from)?;

    preprocess::apply(&ast, options).map_err(Diagnostics::from)?;

    let format = options.format.unwrap_or(DEFAULT_FORMAT);
    let endian = options.endian.unwrap_or(Endian::Little);

    dispatch_format!(vendor, context: format => {
        let (mut procedures, mut peephole) =
            codegen::generate(&vendor, &ast).map_err(Diagnostics::from)?;

        // Los contextos de biblioteca conservan todo procedimiento;
        // solo los formatos con punto de entrada obligatorio se podan
        let image = if options.optimization_level > 0 && !context.compile {
            link::link_optimized(&mut procedures, &mut peephole, link::ENTRY_POINT, &context)
        } else {
            link::link(&procedures, link::ENTRY_POINT, &context)
        }
        .map_err(Diagnostics::plain)?;

        link::persist(&image, endian, &context, output)
            .map_err(|error| Diagnostics::plain(LinkError::Io(error)))?;
    });

    Ok(())
}
