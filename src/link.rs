//! Enlazado y persistencia.
//!
//! El enlazador recibe el mapa de procedimientos y produce la imagen
//! final del binario. Cada formato define su propio contexto de
//! enlazado: los formatos con plegado emiten únicamente el cuerpo del
//! punto de entrada, mientras que los formatos por secciones enmarcan
//! cada procedimiento con un byte de encabezado, un byte de nombre y
//! un byte de cierre. La imagen se persiste elemento por elemento en
//! el orden de bytes configurado.

use std::{
    fmt::{self, Display},
    io::{self, Write},
    str::FromStr,
};

use crate::{codegen::ProcedureMap, peephole::Peephole, vendor::Width};
use thiserror::Error;

/// Nombre del procedimiento de entrada.
pub const ENTRY_POINT: &str = "_start";

/// Encabezado opcional de los binarios persistidos.
pub const VASM_HEADER: &[u8] = b"compiled using volt assembler(VASM)";

/// Error de enlazado.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LinkError {
    /// El programa no define el procedimiento de entrada.
    #[error("Entry procedure `{0}` is missing")]
    MissingStart(String),

    /// Error de E/S al persistir la imagen.
    #[error("I/O error")]
    Io(#[from] io::Error),
}

/// Orden de bytes al persistir elementos de más de un byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Formato de bytecode objetivo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    OpenLud,
    NexFuse,
    Mercury,
    SolarisVm,
    Jade,
    Siax,
}

impl Format {
    /// Todos los formatos conocidos, para mensajes de ayuda.
    pub const ALL: &'static [Format] = &[
        Format::OpenLud,
        Format::NexFuse,
        Format::Mercury,
        Format::SolarisVm,
        Format::Jade,
        Format::Siax,
    ];

    /// Nombre canónico del formato.
    pub fn name(self) -> &'static str {
        match self {
            Format::OpenLud => "openlud",
            Format::NexFuse => "nexfuse",
            Format::Mercury => "mercury",
            Format::SolarisVm => "solarisvm",
            Format::Jade => "jade",
            Format::Siax => "siax",
        }
    }

    /// Magnitud máxima de una constante entera en este formato.
    pub fn max_number(self) -> i64 {
        match self {
            Format::OpenLud => <i8 as Width>::MAX,
            Format::NexFuse | Format::Mercury => <u8 as Width>::MAX,
            Format::Jade | Format::Siax => <i32 as Width>::MAX,
            Format::SolarisVm => <u32 as Width>::MAX,
        }
    }
}

impl FromStr for Format {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .iter()
            .find(|format| unicase::eq_ascii(format.name(), string))
            .copied()
            .ok_or(())
    }
}

impl Display for Format {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.name())
    }
}

/// Parámetros de enlazado de un formato.
pub struct LinkContext<W: Width> {
    /// Emitir solo el punto de entrada, ya plegado, en vez de enmarcar
    /// cada procedimiento como una sección.
    pub fold_procedures: bool,

    /// Byte que abre el marco de una sección.
    pub procedure_heading_byte: W,

    /// Byte que cierra el marco de una sección.
    pub procedure_closing_byte: W,

    /// Emitir `end_byte` al final de cada sección, antes del cierre.
    pub proc_end_byte: bool,

    /// Byte terminal del formato.
    pub end_byte: W,

    /// Emitir `end_byte` al final de la imagen completa.
    pub use_end_byte: bool,

    /// Permitir imágenes sin punto de entrada (salida de biblioteca).
    pub compile: bool,

    /// Anteponer el encabezado ASCII de VASM al persistir.
    pub vasm_header: bool,

    /// Codificación del nombre de una sección.
    pub name_byte: fn(&str) -> W,
}

/// Codificación por defecto: la primera letra del nombre.
fn first_letter<W: Width>(name: &str) -> W {
    W::from_char(name.chars().next().unwrap_or('\0'))
}

impl LinkContext<i8> {
    /// OpenLUD: plegado, requiere entrada, termina en 12.
    pub fn openlud() -> Self {
        LinkContext {
            fold_procedures: true,
            procedure_heading_byte: 0,
            procedure_closing_byte: 0,
            proc_end_byte: false,
            end_byte: 12,
            use_end_byte: true,
            compile: false,
            vasm_header: false,
            name_byte: first_letter,
        }
    }
}

impl LinkContext<u8> {
    /// NexFUSE: una sección por procedimiento, termina en 22.
    pub fn nexfuse() -> Self {
        LinkContext {
            fold_procedures: false,
            procedure_heading_byte: 10,
            procedure_closing_byte: 128,
            proc_end_byte: false,
            end_byte: 22,
            use_end_byte: true,
            compile: true,
            vasm_header: false,
            name_byte: first_letter,
        }
    }

    /// MercuryPIC enlaza igual que NexFUSE.
    pub fn mercury() -> Self {
        LinkContext::nexfuse()
    }
}

impl LinkContext<u32> {
    /// SolarisVM: secciones como NexFUSE, con encabezado VASM.
    pub fn solarisvm() -> Self {
        LinkContext {
            fold_procedures: false,
            procedure_heading_byte: 10,
            procedure_closing_byte: 128,
            proc_end_byte: false,
            end_byte: 22,
            use_end_byte: true,
            compile: true,
            vasm_header: true,
            name_byte: first_letter,
        }
    }
}

impl LinkContext<i32> {
    /// JADE enlaza como OpenLUD, en palabras de 32 bits.
    pub fn jade() -> Self {
        LinkContext {
            fold_procedures: true,
            procedure_heading_byte: 0,
            procedure_closing_byte: 0,
            proc_end_byte: false,
            end_byte: 12,
            use_end_byte: true,
            compile: false,
            vasm_header: false,
            name_byte: first_letter,
        }
    }

    /// SiAX: plegado, termina en el marcador de alto de StaxVM.
    pub fn siax() -> Self {
        LinkContext {
            end_byte: 0xEFB,
            ..LinkContext::jade()
        }
    }
}

/// Ensambla la imagen final a partir del mapa de procedimientos.
///
/// Los bytes de cada procedimiento quedan contiguos en la imagen; las
/// secciones se emiten en el orden de definición y el punto de entrada
/// siempre va de último, antes del byte terminal.
pub fn link<W: Width>(
    procedures: &ProcedureMap<W>,
    entry: &str,
    context: &LinkContext<W>,
) -> Result<Vec<W>, LinkError> {
    let mut image = Vec::new();

    if !context.fold_procedures {
        for (name, body) in procedures.iter() {
            if name.as_ref() == entry {
                continue;
            }

            image.push(context.procedure_heading_byte);
            image.push((context.name_byte)(name.as_ref()));
            image.extend_from_slice(body);

            if context.proc_end_byte {
                image.push(context.end_byte);
            }

            image.push(context.procedure_closing_byte);
        }
    }

    match procedures.get(entry) {
        Some(body) => image.extend_from_slice(body),
        None if !context.compile => return Err(LinkError::MissingStart(entry.to_owned())),
        None => (),
    }

    if context.use_end_byte {
        image.push(context.end_byte);
    }

    Ok(image)
}

/// Enlazado con optimización: siembra el punto de entrada, barre los
/// procedimientos inalcanzables y enlaza con el mismo contexto.
pub fn link_optimized<W: Width>(
    procedures: &mut ProcedureMap<W>,
    peephole: &mut Peephole,
    entry: &str,
    context: &LinkContext<W>,
) -> Result<Vec<W>, LinkError> {
    peephole.seed(entry);
    peephole.sweep(procedures);

    link(procedures, entry, context)
}

/// Persiste la imagen, elemento por elemento, en el orden de bytes
/// indicado. El encabezado ASCII se antepone si el contexto lo pide.
pub fn persist<W: Width, O: Write>(
    image: &[W],
    endian: Endian,
    context: &LinkContext<W>,
    output: &mut O,
) -> io::Result<()> {
    let mut bytes = Vec::with_capacity(image.len() * W::BYTES + VASM_HEADER.len());

    if context.vasm_header {
        bytes.extend_from_slice(VASM_HEADER);
    }

    for element in image {
        element.encode(endian, &mut bytes);
    }

    output.write_all(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::Identifier;

    fn map<W: Width>(entries: &[(&str, &[W])]) -> ProcedureMap<W> {
        let mut map = ProcedureMap::new();
        for (name, body) in entries {
            map.insert(Identifier::from(*name), body.to_vec());
        }

        map
    }

    #[test]
    fn folding_context_emits_only_the_entry() {
        let procedures = map::<i8>(&[("_start", &[40, 65, 0])]);
        let image = link(&procedures, ENTRY_POINT, &LinkContext::openlud()).unwrap();

        assert_eq!(image, [40, 65, 0, 12]);
    }

    #[test]
    fn sections_are_framed_with_heading_name_and_closing() {
        let procedures = map::<u8>(&[("a", &[40, 65, 0])]);
        let image = link(&procedures, ENTRY_POINT, &LinkContext::nexfuse()).unwrap();

        assert_eq!(image, [10, b'a', 40, 65, 0, 128, 22]);
    }

    #[test]
    fn entry_goes_last_among_sections() {
        let procedures = map::<u8>(&[("a", &[1, 0]), ("_start", &[2, 0])]);
        let image = link(&procedures, ENTRY_POINT, &LinkContext::nexfuse()).unwrap();

        assert_eq!(image, [10, b'a', 1, 0, 128, 2, 0, 22]);
    }

    #[test]
    fn missing_entry_fails_outside_library_contexts() {
        let procedures = map::<i8>(&[("a", &[1, 0])]);
        let error = link(&procedures, ENTRY_POINT, &LinkContext::openlud()).unwrap_err();

        assert!(matches!(error, LinkError::MissingStart(name) if name == "_start"));
    }

    #[test]
    fn optimized_link_prunes_unreachable_procedures() {
        // `_start` plegó a `a`; `b` nunca fue alcanzado
        let mut procedures = map::<i8>(&[
            ("a", &[41, 1, 10, 0]),
            ("b", &[41, 2, 10, 0]),
            ("_start", &[41, 1, 10, 0]),
        ]);

        let mut peephole = Peephole::new();
        peephole.mark(Identifier::from("a"));

        link_optimized(
            &mut procedures,
            &mut peephole,
            ENTRY_POINT,
            &LinkContext::openlud(),
        )
        .unwrap();

        assert!(procedures.contains("a"));
        assert!(!procedures.contains("b"));
        assert!(procedures.contains("_start"));
    }

    #[test]
    fn format_names_are_case_insensitive() {
        assert_eq!("OpenLUD".parse(), Ok(Format::OpenLud));
        assert_eq!("nexfuse".parse(), Ok(Format::NexFuse));
        assert_eq!("SOLARISVM".parse(), Ok(Format::SolarisVm));
        assert!("z80".parse::<Format>().is_err());
    }

    #[test]
    fn persist_writes_narrow_elements_verbatim() {
        let mut out = Vec::new();
        persist(
            &[40i8, 65, 0, 12],
            Endian::Little,
            &LinkContext::openlud(),
            &mut out,
        )
        .unwrap();

        assert_eq!(out, [40, 65, 0, 12]);
    }

    #[test]
    fn persist_honors_endianness_for_wide_elements() {
        let image = [1i32, 2];

        let mut little = Vec::new();
        persist(&image, Endian::Little, &LinkContext::jade(), &mut little).unwrap();
        assert_eq!(little, [1, 0, 0, 0, 2, 0, 0, 0]);

        let mut big = Vec::new();
        persist(&image, Endian::Big, &LinkContext::jade(), &mut big).unwrap();
        assert_eq!(big, [0, 0, 0, 1, 0, 0, 0, 2]);
    }

    #[test]
    fn solarisvm_images_carry_the_vasm_header() {
        let mut out = Vec::new();
        persist(&[22u32], Endian::Little, &LinkContext::solarisvm(), &mut out).unwrap();

        assert!(out.starts_with(VASM_HEADER));
        assert_eq!(&out[VASM_HEADER.len()..], [22, 0, 0, 0]);
    }

    #[test]
    fn siax_ends_with_the_stax_stop_marker() {
        let procedures = map::<i32>(&[("_start", &[42, 1, 0])]);
        let image = link(&procedures, ENTRY_POINT, &LinkContext::siax()).unwrap();

        assert_eq!(image, [42, 1, 0, 0xEFB]);
    }
}
