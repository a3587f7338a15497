//! Revisión de estilo.
//!
//! El estilista opera directamente sobre el texto fuente, línea por
//! línea, sin compartir estado con el lexer ni con el parser. Sus
//! hallazgos son consultivos: el programa compila igual, salvo que el
//! modo estricto esté activo, en cuyo caso cualquier hallazgo detiene
//! la compilación. Por ser una función pura del texto, dos pasadas
//! sobre el mismo origen producen exactamente los mismos hallazgos.

use crate::source::{Located, Position, Source};
use std::rc::Rc;

use thiserror::Error;

/// Severidad de un hallazgo de estilo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StyleKind {
    /// Observación sin severidad particular.
    Regular,

    /// Práctica recomendada.
    GoodPractice,

    /// Formato fuera de la convención del lenguaje.
    NonCompliant,

    /// Construcción con comportamiento no definido entre formatos.
    UndefinedBehavior,
}

/// Un hallazgo del estilista.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StyleIssue {
    /// Coma inmediatamente antes del fin de línea.
    #[error("Trailing comma before end of line")]
    TrailingComma,

    /// Coma sin espacio a continuación.
    #[error("Missing space after comma")]
    MissingSpace,

    /// `jmp` hacia un procedimiento de varias letras. Los enlazadores
    /// sin plegado codifican solo la primera letra del nombre.
    #[error("`jmp` to a multi-letter procedure; non-folding targets only encode its first letter")]
    LongJumpTarget,

    /// El archivo no termina en salto de línea.
    #[error("File does not end in a newline")]
    NoTrailingNewline,
}

impl StyleIssue {
    /// Severidad del hallazgo.
    pub fn kind(&self) -> StyleKind {
        match self {
            StyleIssue::TrailingComma => StyleKind::GoodPractice,
            StyleIssue::MissingSpace => StyleKind::NonCompliant,
            StyleIssue::LongJumpTarget => StyleKind::GoodPractice,
            StyleIssue::NoTrailingNewline => StyleKind::GoodPractice,
        }
    }
}

/// Revisa el estilo de un origen completo.
///
/// Las líneas que comienzan con `;` se omiten por completo; en las
/// demás, el texto a partir de un `;;` tampoco se examina.
pub fn review(source: &Rc<Source>) -> Vec<Located<StyleIssue>> {
    let mut found = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let number = index as u32 + 1;
        if line.trim_start().starts_with(';') {
            continue;
        }

        let chars: Vec<char> = line.chars().collect();
        let visible = match find_comment(&chars) {
            Some(stop) => &chars[..stop],
            None => &chars[..],
        };

        review_commas(source, number, visible, visible.len() == chars.len(), &mut found);
        review_jumps(source, number, visible, &mut found);
    }

    if source.line_count() > 0 && !source.trailing_newline() {
        found.push(Located::at(StyleIssue::NoTrailingNewline, source.end()));
    }

    found
}

/// Índice del `;;` que comienza un comentario, si lo hay.
fn find_comment(chars: &[char]) -> Option<usize> {
    chars
        .windows(2)
        .position(|pair| pair == [';', ';'])
}

/// Reglas sobre comas: coma colgante y coma sin espacio.
fn review_commas(
    source: &Rc<Source>,
    line: u32,
    visible: &[char],
    reaches_end: bool,
    found: &mut Vec<Located<StyleIssue>>,
) {
    for (index, c) in visible.iter().enumerate() {
        if *c != ',' {
            continue;
        }

        let at = source.locate(Position::new(line, index as u32 + 1));
        match visible.get(index + 1) {
            // La coma es lo último de la línea; `\r` ya fue descartado
            // al dividir el archivo en líneas
            None if reaches_end => found.push(Located::at(StyleIssue::TrailingComma, at)),
            None => (),

            Some(next) if !next.is_ascii_whitespace() => {
                found.push(Located::at(StyleIssue::MissingSpace, at))
            }

            Some(_) => (),
        }
    }
}

/// Regla sobre `jmp`: los destinos de varias letras no sobreviven a la
/// codificación por primera letra de los formatos sin plegado.
fn review_jumps(
    source: &Rc<Source>,
    line: u32,
    visible: &[char],
    found: &mut Vec<Located<StyleIssue>>,
) {
    let words = split_words(visible);

    for pair in words.windows(2) {
        let (_, keyword) = &pair[0];
        let (start, target) = &pair[1];

        if keyword.as_str() != "jmp" {
            continue;
        }

        let letters = target.chars().filter(|c| c.is_ascii_alphanumeric()).count();
        if letters > 1 {
            let at = source.locate(Position::new(line, *start as u32 + 1));
            found.push(Located::at(StyleIssue::LongJumpTarget, at));
        }
    }
}

/// Divide una línea en palabras con su columna de inicio, 0-indexada.
fn split_words(chars: &[char]) -> Vec<(usize, String)> {
    let mut words = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (index, c) in chars.iter().enumerate() {
        if c.is_ascii_whitespace() {
            words.extend(current.take());
        } else {
            current
                .get_or_insert_with(|| (index, String::new()))
                .1
                .push(*c);
        }
    }

    words.extend(current);
    words
}
