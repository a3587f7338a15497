//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los distintos objetos internos que el ensamblador construye
//! deben llevar cuenta de posiciones o rangos de ubicaciones en
//! el código fuente original, lo cual permite determinar un punto
//! exacto o aproximado en donde ocurre un error de abstracción
//! arbitraria.
//!
//! A diferencia de un flujo de entrada incremental, aquí el archivo
//! completo se conserva en memoria línea por línea. Esto permite que
//! el reporte de errores recupere el texto de cualquier línea mucho
//! después de que el análisis léxico haya terminado.

use std::{
    fmt::{self, Debug, Display, Formatter},
    iter,
    ops::Range,
    rc::Rc,
};

/// Ancho de los divisores de tabulador.
const TAB_STOP: u32 = 4;

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Transforma el valor con la misma ubicación.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            location: self.location,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Una ubicación está conformada por un origen y un rango de posiciones.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    position: Range<Position>,
}

impl Location {
    /// Unifica un rango de ubicaciones. Se asume el mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            from: from.from,
            position: from.position.start..to.position.end,
        }
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.position.start
    }

    /// Obtiene la posición de fin.
    pub fn end(&self) -> Position {
        self.position.end
    }

    /// Obtiene el origen de esta ubicación.
    pub fn source(&self) -> &Source {
        &self.from
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.from.name)?;

        let Range { start, end } = self.position;
        if end == start.advance() {
            // Solo se señala una columna en específico
            write!(formatter, "{}", start)
        } else {
            write!(formatter, "[{}-{}]", start, end.back())
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en un archivo.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Construye una posición puntual.
    pub fn new(line: u32, column: u32) -> Position {
        Position { line, column }
    }

    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Incrementa el número de columna.
    pub fn advance(self) -> Position {
        Position {
            line: self.line,
            column: self.column + 1,
        }
    }

    /// Decrementa el número de columna.
    pub fn back(self) -> Position {
        Position {
            line: self.line,
            column: self.column - 1,
        }
    }

    /// Incrementa el número de línea y retorna a la columna 1.
    pub fn newline(self) -> Position {
        Position {
            line: self.line + 1,
            column: 1,
        }
    }

    /// Ajusta la posición a la siguiente columna de tabulador.
    pub fn tab(self) -> Position {
        let column = 1 + ((self.column - 1) / TAB_STOP + 1) * TAB_STOP;
        Position {
            line: self.line,
            column,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

/// Nombre de origen y contenido del archivo, línea por línea.
pub struct Source {
    name: String,
    lines: Vec<String>,
    trailing_newline: bool,
}

impl Source {
    /// Construye un origen a partir del texto completo de un archivo.
    pub fn new<S: Into<String>>(name: S, text: &str) -> Rc<Source> {
        Rc::new(Source {
            name: name.into(),
            lines: text.lines().map(String::from).collect(),
            trailing_newline: text.ends_with('\n'),
        })
    }

    /// Obtiene el nombre del origen.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Indica si el archivo original termina en un salto de línea.
    pub fn trailing_newline(&self) -> bool {
        self.trailing_newline
    }

    /// Cantidad de líneas en el archivo.
    pub fn line_count(&self) -> u32 {
        self.lines.len() as u32
    }

    /// Itera sobre las líneas del archivo, sin sus saltos finales.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Ejecuta una operación sobre el texto de una línea, 1-indexada.
    ///
    /// Las posiciones más allá del final del archivo se resuelven a una
    /// línea vacía, lo cual ocurre con ubicaciones de fin de entrada.
    pub fn with_line<F, R>(&self, line: u32, callback: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let line = self
            .lines
            .get(line.saturating_sub(1) as usize)
            .map(String::as_str)
            .unwrap_or("");

        callback(line)
    }

    /// Itera carácter por carácter, asociando a cada uno su ubicación.
    ///
    /// Cada línea emite un `'\n'` final, incluso la última si el archivo
    /// no termina en salto de línea. Los retornos de carro de secuencias
    /// `\r\n` no se emiten.
    pub fn chars(self: &Rc<Self>) -> Chars {
        Chars {
            from: Rc::clone(self),
            line: 0,
            buffer: Vec::new(),
            next: 0,
            position: Position::default(),
        }
    }

    /// Ubicación de fin de entrada, útil para errores de final abrupto.
    pub fn end(self: &Rc<Self>) -> Location {
        let line = self.lines.len().max(1) as u32;
        let column = self
            .lines
            .last()
            .map(|line| line.chars().count() as u32 + 1)
            .unwrap_or(1);

        self.locate(Position { line, column })
    }

    /// Ubicación de una posición puntual en este origen.
    pub fn locate(self: &Rc<Self>, position: Position) -> Location {
        Location {
            from: Rc::clone(self),
            position: position..position.advance(),
        }
    }
}

impl Debug for Source {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "Source({:?})", self.name)
    }
}

/// Iterador de caracteres con ubicación. Ver [`Source::chars()`].
pub struct Chars {
    from: Rc<Source>,
    line: usize,
    buffer: Vec<char>,
    next: usize,
    position: Position,
}

impl Iterator for Chars {
    type Item = (char, Location);

    fn next(&mut self) -> Option<Self::Item> {
        while self.next >= self.buffer.len() {
            let line = self.from.lines.get(self.line)?;
            self.buffer = line.chars().chain(iter::once('\n')).collect();
            self.line += 1;
            self.next = 0;
        }

        let c = self.buffer[self.next];
        self.next += 1;

        let here = self.position;
        self.position = match c {
            '\n' => here.newline(),
            '\t' => here.tab(),
            _ => here.advance(),
        };

        let location = Location {
            from: Rc::clone(&self.from),
            position: here..here.advance(),
        };

        Some((c, location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chars_track_lines_and_columns() {
        let source = Source::new("test.lr", "ab\ncd");
        let positions: Vec<_> = source
            .chars()
            .map(|(c, location)| (c, location.start().line(), location.start().column()))
            .collect();

        assert_eq!(
            positions,
            vec![
                ('a', 1, 1),
                ('b', 1, 2),
                ('\n', 1, 3),
                ('c', 2, 1),
                ('d', 2, 2),
                ('\n', 2, 3),
            ]
        );
    }

    #[test]
    fn tabs_move_to_next_stop() {
        let source = Source::new("test.lr", "\ta");
        let positions: Vec<_> = source
            .chars()
            .map(|(c, location)| (c, location.start().column()))
            .collect();

        assert_eq!(positions, vec![('\t', 1), ('a', 5), ('\n', 6)]);
    }

    #[test]
    fn trailing_newline_is_remembered() {
        assert!(Source::new("a.lr", "x:\n").trailing_newline());
        assert!(!Source::new("a.lr", "x:").trailing_newline());
    }

    #[test]
    fn with_line_past_the_end_is_empty() {
        let source = Source::new("test.lr", "one");
        assert_eq!(source.with_line(1, str::len), 3);
        assert_eq!(source.with_line(7, str::len), 0);
    }
}
