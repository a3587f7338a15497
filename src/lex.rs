//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del ensamblador. Descompone un [`Source`]
//! en unidades léxicas denominadas tokens. Los espacios en blanco y los
//! comentarios se descartan durante esta operación, con la excepción de
//! los saltos de línea: LR Assembly es un lenguaje orientado a líneas,
//! por lo cual `'\n'` emite su propio token. Cada token emitido esta
//! asociado a una ubicación en el código fuente original, lo cual
//! permite rastrear errores en tanto los mismos como constructos más
//! elevados de fases posteriores.
//!
//! # Reglas importantes del lenguaje
//! - Los identificadores comienzan con una letra o `'_'` y continúan
//!   con letras, dígitos, `'_'` o `'-'`.
//! - Los números son decimales o hexadecimales con prefijo `0x`. El
//!   formato objetivo impone un límite de magnitud opcional.
//! - Los literales de carácter se delimitan con `'…'`. Un backslash
//!   inicia un dígrafo de escape cuyo cuerpo se conserva textualmente;
//!   su interpretación ocurre durante la generación de código.
//! - `;;` comienza un comentario hasta el final de la línea. Un `;`
//!   solitario es un token separador de instrucciones.
//!
//! # Errores
//! El lexer es capaz de recuperarse parcialmente de condiciones de
//! error. Esto ocurre en suficiente grado como para reportar más de un
//! error por ejecución, pero no lo suficiente como para permitir el
//! avance a las demás fases de la compilación.

use crate::source::{Chars, Located, Location, Source};
use std::{
    borrow::Borrow,
    fmt::{self, Display},
    iter::Peekable,
    mem,
    rc::Rc,
};

use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    UnexpectedCharacter(char),

    /// Una secuencia que comienza con un dígito no forma un número.
    #[error("Malformed number `{0}`")]
    MalformedNumber(String),

    /// Una constante entera excede el tamaño de palabra del formato.
    #[error("Number {0} is too big for this target, the limit is {1}")]
    NumberTooBig(i64, i64),

    /// El flujo terminó dentro de un literal de carácter.
    #[error("Character literal is never closed")]
    LiteralNeverClosed,

    /// Un literal de carácter contiene más de un carácter.
    #[error("Character literal holds more than one character")]
    LiteralTooLong,
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Rc<str>);

impl Identifier {
    /// Compara contra una palabra clave, sin distinguir mayúsculas.
    pub fn is(&self, keyword: &str) -> bool {
        unicase::eq_ascii(self.as_ref(), keyword)
    }
}

impl From<&str> for Identifier {
    fn from(text: &str) -> Self {
        Identifier(Rc::from(text))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(fmt)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Literal de entero.
    Number(i64),

    /// Literal de carácter, cuerpo textual entre las comillas.
    Literal(Rc<str>),

    /// `:`
    Colon,

    /// `.`
    Period,

    /// `@`
    At,

    /// `,`
    Comma,

    /// `[`
    BracketOpen,

    /// `]`
    BracketClose,

    /// `{`
    CurlyOpen,

    /// `}`
    CurlyClose,

    /// Fin de línea.
    Newline,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Division,

    /// `$`
    Dollar,

    /// `;` solitario.
    Semicolon,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Number(integer) => write!(fmt, "number `{}`", integer),
            Literal(body) => write!(fmt, "literal `'{}'`", body),
            Colon => fmt.write_str("`:`"),
            Period => fmt.write_str("`.`"),
            At => fmt.write_str("`@`"),
            Comma => fmt.write_str("`,`"),
            BracketOpen => fmt.write_str("`[`"),
            BracketClose => fmt.write_str("`]`"),
            CurlyOpen => fmt.write_str("`{`"),
            CurlyClose => fmt.write_str("`}`"),
            Newline => fmt.write_str("end of line"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Division => fmt.write_str("`/`"),
            Dollar => fmt.write_str("`$`"),
            Semicolon => fmt.write_str("`;`"),
        }
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer {
    source: Peekable<Chars>,
    from: Rc<Source>,
    state: State,
    start: Location,
    last: Location,
    limit: Option<i64>,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de error.
    Error,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Se encontró `;`.
    ///
    /// Otro `;` comienza un comentario; cualquier otra cosa emite
    /// un token separador.
    Semi,

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`,
    /// sin consumirlo, para que la línea aún emita su token de fin.
    Comment,

    /// Constante numérica, acumulada textualmente.
    ///
    /// La base y el valor se resuelven al terminar la secuencia
    /// alfanumérica.
    Integer(String),

    /// Término que será un identificador.
    Word(String),

    /// Literal de carácter en progreso.
    Quote { body: String, escape: bool },
}

impl Lexer {
    /// Crea un lexer en estado inicial sobre un origen.
    ///
    /// `limit` es la magnitud máxima que acepta una constante entera;
    /// `None` desactiva la verificación.
    pub fn new(source: &Rc<Source>, limit: Option<i64>) -> Self {
        let start = source.locate(Default::default());
        Lexer {
            source: source.chars().peekable(),
            from: Rc::clone(source),
            state: State::Start,
            last: start.clone(),
            start,
            limit,
        }
    }

    /// Reduce la entrada a sea una secuencia conocida de tokens
    /// infalibles o una secuencia de errores.
    ///
    /// En caso de que ocurra al menos un error, el lexer dejará
    /// de buscar tokens exitosos y comenzará a acumular solamente
    /// errores. El propósito de esta función es permitir la
    /// recolección de múltiples errores léxicos en una misma ejecución
    /// del ensamblador.
    pub fn try_exhaustive(mut self) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();

        while let Some(result) = self.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    drop(tokens);

                    let mut errors = vec![error];
                    errors.extend(self.filter_map(Result::err));

                    return Err(errors);
                }
            }
        }

        Ok(tokens)
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<Token>, Located<LexerError>> {
        use {State::*, Token::*};

        let token = loop {
            let next_char = self.source.peek().map(|(c, _)| *c);

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                if let Some((_, location)) = self.source.peek() {
                    self.start = location.clone();
                }
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                // Condiciones de error: se descarta la línea donde
                // ocurrió el error. Al llegar al final de la línea
                // el lexer se recupera y reinicia.
                (Error, None) => return Ok(None),
                (Error, Some('\n')) => self.state = Start,
                (Error, Some(_)) => (),

                // Tokens triviales
                (Start, None) => return Ok(None),
                (Start, Some('\n')) => self.state = Complete(Newline),
                (Start, Some(':')) => self.state = Complete(Colon),
                (Start, Some('.')) => self.state = Complete(Period),
                (Start, Some('@')) => self.state = Complete(At),
                (Start, Some(',')) => self.state = Complete(Comma),
                (Start, Some('[')) => self.state = Complete(BracketOpen),
                (Start, Some(']')) => self.state = Complete(BracketClose),
                (Start, Some('{')) => self.state = Complete(CurlyOpen),
                (Start, Some('}')) => self.state = Complete(CurlyClose),
                (Start, Some('+')) => self.state = Complete(Plus),
                (Start, Some('-')) => self.state = Complete(Minus),
                (Start, Some('*')) => self.state = Complete(Times),
                (Start, Some('/')) => self.state = Complete(Division),
                (Start, Some('$')) => self.state = Complete(Dollar),
                (Start, Some(';')) => self.state = Semi,
                (Start, Some('\'')) => {
                    self.state = Quote {
                        body: String::new(),
                        escape: false,
                    }
                }

                // Identificadores
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    self.state = Word(c.to_string())
                }

                // Inicio de una constante numérica. No se consume el
                // dígito, ya que esta lógica ya está implementada en el
                // respectivo caso para un estado de constante numérica.
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(String::new());
                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_ascii_whitespace() => (),
                (Start, Some(c)) => break Err(LexerError::UnexpectedCharacter(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(value), _) => break Ok(mem::replace(value, Newline)),

                // `;;` inicia un comentario; un `;` solitario separa
                // instrucciones dentro de una línea
                (Semi, Some(';')) => self.state = Comment,
                (Semi, _) => break Ok(Semicolon),

                // Los comentarios se descartan. El salto de línea no se
                // consume aquí para que emita su propio token.
                (Comment, Some('\n')) => {
                    self.state = Start;
                    continue;
                }
                (Comment, Some(_)) => (),
                (Comment, None) => return Ok(None),

                // Acumulación textual de constantes numéricas
                (Integer(text), Some(c)) if c.is_ascii_alphanumeric() => text.push(c),

                // Si sigue algo que no es alfanumérico, la constante ha
                // terminado y se resuelve su valor
                (Integer(text), _) => {
                    let text = mem::take(text);
                    break resolve_number(text, self.limit);
                }

                // Extensión de términos
                (Word(word), Some(c)) if is_word_char(c) => word.push(c),

                // Si sigue algo que no puede formar parte del término,
                // ha terminado
                (Word(word), _) => {
                    let word = mem::take(word);
                    break Ok(Id(Identifier(Rc::from(word))));
                }

                // Dígrafos de escape: el carácter tras el backslash se
                // conserva textualmente, sea cual sea
                (
                    Quote {
                        body,
                        escape: escape @ true,
                    },
                    Some(c),
                ) => {
                    body.push(c);
                    *escape = false;
                }

                (Quote { body, escape }, Some('\\')) => {
                    body.push('\\');
                    *escape = true;
                }

                (Quote { body, .. }, Some('\'')) => {
                    let body = mem::take(body);
                    let length = body.chars().count();
                    if length > 2 || (length == 2 && !body.starts_with('\\')) {
                        break Err(LexerError::LiteralTooLong);
                    }

                    self.state = Complete(Token::Literal(Rc::from(body)));
                }

                (Quote { body, .. }, Some(c)) => body.push(c),
                (Quote { .. }, None) => break Err(LexerError::LiteralNeverClosed),
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            if let Some((_, location)) = self.source.next() {
                self.last = location;
            }
        };

        token
            .map(Some)
            .map_err(|error| Located::at(error, self.error_location()))
    }

    /// Ubicación para señalar un error en la entrada actual.
    fn error_location(&mut self) -> Location {
        match self.source.peek() {
            Some((_, location)) => location.clone(),
            None => self.from.end(),
        }
    }
}

impl Iterator for Lexer {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => None,
            Ok(Some(token)) => {
                self.state = State::Start;

                let location = Location::span(self.start.clone(), &self.last);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Error;
                Some(Err(error))
            }
        }
    }
}

/// Determina si un carácter puede pertenecer a un identificador.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-')
}

/// Resuelve el valor de una constante numérica acumulada.
fn resolve_number(text: String, limit: Option<i64>) -> Result<Token, LexerError> {
    let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else {
        text.parse()
    };

    let value = match value {
        Ok(value) => value,
        Err(_) => return Err(LexerError::MalformedNumber(text)),
    };

    match limit {
        Some(limit) if value > limit => Err(LexerError::NumberTooBig(value, limit)),
        _ => Ok(Token::Number(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<Token> {
        let source = Source::new("test.lr", text);
        Lexer::new(&source, None)
            .try_exhaustive()
            .expect("lexing failed")
            .into_iter()
            .map(Located::into_inner)
            .collect()
    }

    fn first_error(text: &str, limit: Option<i64>) -> LexerError {
        let source = Source::new("test.lr", text);
        Lexer::new(&source, limit)
            .try_exhaustive()
            .expect_err("lexing succeeded")
            .remove(0)
            .into_inner()
    }

    #[test]
    fn simple_procedure() {
        use Token::*;

        assert_eq!(
            tokens("_start: mov R1, 10"),
            vec![
                Id(Identifier::from("_start")),
                Colon,
                Id(Identifier::from("mov")),
                Id(Identifier::from("R1")),
                Comma,
                Number(10),
                Newline,
            ]
        );
    }

    #[test]
    fn hex_numbers() {
        use Token::*;

        assert_eq!(
            tokens("mov R1, 0x0a"),
            vec![
                Id(Identifier::from("mov")),
                Id(Identifier::from("R1")),
                Comma,
                Number(10),
                Newline,
            ]
        );
    }

    #[test]
    fn comments_are_discarded_but_newlines_remain() {
        use Token::*;

        assert_eq!(
            tokens(";; a comment\nend"),
            vec![Newline, Id(Identifier::from("end")), Newline]
        );
    }

    #[test]
    fn lone_semicolon_separates() {
        use Token::*;

        assert_eq!(
            tokens("a: nop; b: nop"),
            vec![
                Id(Identifier::from("a")),
                Colon,
                Id(Identifier::from("nop")),
                Semicolon,
                Id(Identifier::from("b")),
                Colon,
                Id(Identifier::from("nop")),
                Newline,
            ]
        );
    }

    #[test]
    fn literal_preserves_escape_digraph() {
        assert_eq!(
            tokens("echo '\\n'"),
            vec![
                Token::Id(Identifier::from("echo")),
                Token::Literal(Rc::from("\\n")),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn semicolon_inside_literal_is_not_a_comment() {
        assert_eq!(
            tokens("echo ';'"),
            vec![
                Token::Id(Identifier::from("echo")),
                Token::Literal(Rc::from(";")),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn unclosed_literal() {
        assert!(matches!(
            first_error("echo 'a", None),
            LexerError::LiteralNeverClosed
        ));
    }

    #[test]
    fn overlong_literal() {
        assert!(matches!(
            first_error("echo 'ab'", None),
            LexerError::LiteralTooLong
        ));
    }

    #[test]
    fn malformed_number() {
        assert!(matches!(
            first_error("mov R1, 12abz", None),
            LexerError::MalformedNumber(text) if text == "12abz"
        ));
    }

    #[test]
    fn number_limit_is_enforced() {
        assert!(matches!(
            first_error("mov R1, 300", Some(127)),
            LexerError::NumberTooBig(300, 127)
        ));

        assert_eq!(
            tokens("mov R1, 300").last(),
            Some(&Token::Newline),
        );
    }

    #[test]
    fn unexpected_character() {
        assert!(matches!(
            first_error("mov #", None),
            LexerError::UnexpectedCharacter('#')
        ));
    }

    #[test]
    fn several_errors_in_one_pass() {
        let source = Source::new("test.lr", "bad # here\nworse ~ there\n");
        let errors = Lexer::new(&source, None)
            .try_exhaustive()
            .expect_err("lexing succeeded");

        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn spans_advance_monotonically() {
        let source = Source::new("test.lr", "main: mov R1, 0x2\n echo 'x'\n");
        let tokens = Lexer::new(&source, None)
            .try_exhaustive()
            .expect("lexing failed");

        let mut last = (0, 0);
        for token in &tokens {
            let start = token.location().start();
            let here = (start.line(), start.column());

            assert!(here > last, "span went backwards at {}", token.val());
            last = here;
        }
    }

    #[test]
    fn spans_point_at_the_token() {
        let source = Source::new("test.lr", "mov R1");
        let tokens = Lexer::new(&source, None)
            .try_exhaustive()
            .expect("lexing failed");

        let register = tokens[1].location();
        assert_eq!(register.start().line(), 1);
        assert_eq!(register.start().column(), 5);
        assert_eq!(register.end().column(), 7);
    }
}
