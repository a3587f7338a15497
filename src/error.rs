//! Reporte de diagnósticos.
//!
//! Todos los errores del ensamblador terminan aquí, acumulados en una
//! colección [`Diagnostics`] que sabe renderizarse con el extracto de
//! la línea ofensora y un señalador bajo el span. Los errores fatales
//! se pintan de rojo; los hallazgos del estilista, de magenta.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
};

const RED: &str = "\x1b[1;31m";
const MAGENTA: &str = "\x1b[1;35m";
const RESET: &str = "\x1b[0m";

/// Gravedad de un diagnóstico.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Severity {
    /// Detiene la compilación.
    Fatal,

    /// Consultivo; solo detiene en modo estricto.
    Suggestion,
}

#[derive(Debug)]
struct Entry {
    severity: Severity,
    error: Box<dyn Error + 'static>,
    location: Option<Location>,
}

/// Colección de diagnósticos lista para mostrarse.
#[derive(Default, Debug)]
pub struct Diagnostics(Vec<Entry>);

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics(Vec::new())
    }

    /// Un único error fatal sin ubicación en el código fuente.
    pub fn plain<E: Error + 'static>(error: E) -> Self {
        Diagnostics(vec![Entry {
            severity: Severity::Fatal,
            error: Box::new(error),
            location: None,
        }])
    }

    /// Hallazgos consultivos del estilista.
    pub fn suggestions<E: Error + 'static>(findings: Vec<Located<E>>) -> Self {
        Diagnostics(
            findings
                .into_iter()
                .map(|finding| {
                    let (location, error) = finding.split();
                    Entry {
                        severity: Severity::Suggestion,
                        error: Box::new(error),
                        location: Some(location),
                    }
                })
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Cantidad de diagnósticos fatales.
    pub fn fatal_count(&self) -> usize {
        self.0
            .iter()
            .filter(|entry| entry.severity == Severity::Fatal)
            .count()
    }
}

impl<E: Error + 'static> From<Located<E>> for Diagnostics {
    fn from(error: Located<E>) -> Self {
        Diagnostics::from(vec![error])
    }
}

impl<E: Error + 'static> From<Vec<Located<E>>> for Diagnostics {
    fn from(errors: Vec<Located<E>>) -> Self {
        Diagnostics(
            errors
                .into_iter()
                .map(|error| {
                    let (location, error) = error.split();
                    Entry {
                        severity: Severity::Fatal,
                        error: Box::new(error),
                        location: Some(location),
                    }
                })
                .collect(),
        )
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics(entries) = self;
        if entries.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for Entry {
            severity,
            error,
            location,
        } in entries
        {
            match severity {
                Severity::Fatal => writeln!(fmt, "{}error:{} {}", RED, RESET, error)?,
                Severity::Suggestion => {
                    writeln!(fmt, "{}suggestion:{} {}", MAGENTA, RESET, error)?
                }
            }

            if let Some(location) = location {
                write_excerpt(fmt, location)?;
            }

            writeln!(fmt)?;
        }

        let fatal = self.fatal_count();
        if fatal > 0 {
            let error_or_errors = if fatal == 1 { "error" } else { "errors" };
            writeln!(fmt, "Build failed with {} {}", fatal, error_or_errors)?;
        }

        Ok(())
    }
}

/// Extracto de la línea ofensora con un señalador bajo el span.
fn write_excerpt(fmt: &mut fmt::Formatter<'_>, location: &Location) -> fmt::Result {
    writeln!(fmt, " --> {}", location)?;

    let digits = location.end().line().to_string().chars().count();
    writeln!(fmt, "{:digits$} |", "", digits = digits)?;

    for line_number in location.start().line()..=location.end().line() {
        location.source().with_line(line_number, |line| {
            writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)
        })?
    }

    let from = location.start().column();
    let to = location.end().column().saturating_sub(1);

    let min = from.min(to).max(1);
    let max = from.max(to);

    let skip = (min - 1) as usize;
    let highlight = (max - min + 1) as usize;

    writeln!(
        fmt,
        "{:digits$} | {:skip$}{:^<highlight$}",
        "",
        "",
        "",
        digits = digits,
        skip = skip,
        highlight = highlight
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::LexerError, source::Source, style::StyleIssue};

    #[test]
    fn renders_location_excerpt_and_caret() {
        let source = Source::new("demo.lr", "main: mov # R1\n");
        let location = Location::span(
            source.locate(crate::source::Position::new(1, 11)),
            &source.locate(crate::source::Position::new(1, 11)),
        );

        let report = Diagnostics::from(Located::at(
            LexerError::UnexpectedCharacter('#'),
            location,
        ));

        let rendered = report.to_string();
        assert!(rendered.contains("demo.lr:1:11"));
        assert!(rendered.contains("main: mov # R1"));
        assert!(rendered.contains('^'));
        assert!(rendered.contains("Build failed with 1 error"));
    }

    #[test]
    fn suggestions_do_not_fail_the_build() {
        let source = Source::new("demo.lr", "main: nop");
        let report = Diagnostics::suggestions(vec![Located::at(
            StyleIssue::NoTrailingNewline,
            source.end(),
        )]);

        assert_eq!(report.fatal_count(), 0);
        assert!(!report.to_string().contains("Build failed"));
        assert!(report.to_string().contains("suggestion:"));
    }

    #[test]
    fn empty_reports_say_so() {
        assert_eq!(Diagnostics::new().to_string(), "No errors were reported\n");
    }
}
