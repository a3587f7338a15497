//! Análisis sintáctico.
//!
//! El parser es de descenso recursivo sobre la lista plana de tokens,
//! con un cursor explícito que siempre se verifica contra el final de
//! la entrada. El árbol resultante distingue entre procedimientos,
//! macros de corchete y asides; los procedimientos no anidan, por lo
//! cual un procedimiento termina exactamente cuando aparece otro par
//! `identificador :` o cuando se agotan los tokens.

use crate::{
    lex::{Identifier, Token},
    source::{Located, Location, Source},
};
use std::rc::Rc;

use thiserror::Error;

/// Error de análisis sintáctico.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    /// Una expresión de nivel superior no forma un procedimiento.
    #[error("Expected `name:` to begin a procedure, found {0}")]
    ExpressionIsNotSubroutine(Token),

    /// Un procedimiento no contiene instrucciones.
    #[error("Procedure `{0}` is empty")]
    EmptySubroutine(Identifier),

    /// Token fuera de lugar.
    #[error("Unexpected {0}")]
    UnexpectedToken(Token),

    /// `R` sin número de registro.
    #[error("Register is missing its number")]
    RegisterMissingNumber,

    /// `{` sin número inicial.
    #[error("Range expects a start")]
    RangeExpectsStart,

    /// Rango sin número final o sin `}`.
    #[error("Range expects an end")]
    RangeExpectsEnd,

    /// Rango sin `:` entre sus extremos.
    #[error("Range expects `:` between its bounds")]
    RangeExpectsSeparator,

    /// Un extremo de rango no es un número.
    #[error("Range bounds must be numbers, found {0}")]
    RangeExpectsNumber(Token),

    /// Rango con extremos invertidos.
    #[error("Range starts at {0} but ends earlier, at {1}")]
    RangeStartsAfterEnd(i64, i64),

    /// `[` sin su `]` correspondiente.
    #[error("Macro is never closed")]
    MacroNeverClosed,

    /// `:` de nivel superior sin nombre.
    #[error("Aside expects a name")]
    AsideExpectsName,

    /// El nombre de un aside no es un identificador.
    #[error("Aside names must be identifiers, found {0}")]
    AsideNameMustBeIdentifier(Token),

    /// Un token no puede comenzar un valor.
    #[error("{0} does not form a value")]
    InvalidTokenValue(Token),

    /// Sintaxis `@` de procedimientos, retirada del lenguaje.
    #[error("Old `@` procedure syntax is no longer supported")]
    OldProcedureSyntax,
}

/// Un valor, derivado de tokens durante el análisis sintáctico.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Identificador arbitrario, típicamente una etiqueta.
    Identifier(Identifier),

    /// Constante entera.
    Number(i64),

    /// Literal de carácter, con dígrafos de escape sin interpretar.
    Literal(Rc<str>),

    /// Registro `R<n>`.
    Register(usize),

    /// Rango `{inicio:fin}`, con `inicio <= fin`.
    Range { start: i64, end: i64 },

    /// La nada, que no es cero ni comparable con números.
    Nil,
}

impl Value {
    /// Nombre de la clase de valor, para mensajes de error.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Identifier(_) => "identifier",
            Value::Number(_) => "number",
            Value::Literal(_) => "literal",
            Value::Register(_) => "register",
            Value::Range { .. } => "range",
            Value::Nil => "nil",
        }
    }
}

/// Raíz del árbol sintáctico.
pub struct Ast {
    items: Vec<Item>,
    eof: Location,
}

impl Ast {
    /// Itera sobre los elementos de nivel superior.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    /// Ubicación del final de la entrada.
    pub fn eof(&self) -> &Location {
        &self.eof
    }
}

/// Un elemento de nivel superior.
///
/// El nivel superior de un programa solo admite procedimientos,
/// macros y asides; cualquier otra cosa es un error sintáctico.
pub enum Item {
    Procedure(Procedure),
    Macro(MacroCall),
    Aside(Aside),
}

/// Un procedimiento: `nombre:` seguido de llamadas a instrucciones.
pub struct Procedure {
    name: Located<Identifier>,
    body: Vec<InstructionCall>,
}

impl Procedure {
    pub fn name(&self) -> &Located<Identifier> {
        &self.name
    }

    pub fn body(&self) -> &[InstructionCall] {
        &self.body
    }
}

/// Una llamada a instrucción dentro de un procedimiento.
pub struct InstructionCall {
    name: Located<Identifier>,
    parameters: Vec<Located<Value>>,
}

impl InstructionCall {
    pub fn name(&self) -> &Located<Identifier> {
        &self.name
    }

    pub fn parameters(&self) -> &[Located<Value>] {
        &self.parameters
    }
}

/// Una macro de corchete: `[nombre args…]`.
pub struct MacroCall {
    name: Located<Identifier>,
    parameters: Vec<Located<Value>>,
}

impl MacroCall {
    pub fn name(&self) -> &Located<Identifier> {
        &self.name
    }

    pub fn parameters(&self) -> &[Located<Value>] {
        &self.parameters
    }
}

/// Un aside: `:nombre args…`, liga un símbolo de tiempo de compilación.
pub struct Aside {
    name: Located<Identifier>,
    parameters: Vec<Located<Value>>,
}

impl Aside {
    pub fn name(&self) -> &Located<Identifier> {
        &self.name
    }

    pub fn parameters(&self) -> &[Located<Value>] {
        &self.parameters
    }
}

/// Construye el árbol sintáctico de una lista de tokens.
pub fn parse(
    source: &Rc<Source>,
    tokens: Vec<Located<Token>>,
) -> Result<Ast, Located<ParserError>> {
    Parser {
        tokens,
        cursor: 0,
        eof: source.end(),
    }
    .program()
}

struct Parser {
    tokens: Vec<Located<Token>>,
    cursor: usize,
    eof: Location,
}

impl Parser {
    fn program(mut self) -> Result<Ast, Located<ParserError>> {
        let mut items = Vec::new();

        while let Some(token) = self.peek() {
            match token.as_ref() {
                Token::Newline => {
                    self.advance();
                }

                Token::Id(_) => items.push(Item::Procedure(self.procedure()?)),
                Token::Colon => items.push(Item::Aside(self.aside()?)),
                Token::BracketOpen => items.push(Item::Macro(self.bracket_macro()?)),

                Token::At => return Err(self.reject(ParserError::OldProcedureSyntax)),

                other => {
                    let error = ParserError::UnexpectedToken(other.clone());
                    return Err(self.reject(error));
                }
            }
        }

        Ok(Ast {
            items,
            eof: self.eof,
        })
    }

    /// Un procedimiento comienza en `nombre :` y termina justo antes
    /// del siguiente par `nombre :` o al agotarse los tokens.
    fn procedure(&mut self) -> Result<Procedure, Located<ParserError>> {
        let name = self.identifier().expect("procedure() called off an identifier");

        match self.peek().map(Located::as_ref) {
            Some(Token::Colon) => self.advance(),
            other => {
                let found = other.cloned().unwrap_or(Token::Newline);
                let error = ParserError::ExpressionIsNotSubroutine(found);
                return Err(self.reject(error));
            }
        };

        let mut body = Vec::new();
        while let Some(token) = self.peek() {
            match token.as_ref() {
                Token::Newline | Token::Semicolon => {
                    self.advance();
                }

                Token::Id(_) => {
                    // `identificador :` pertenece al siguiente procedimiento
                    if let Some(Token::Colon) = self.lookahead(1).map(Located::as_ref) {
                        break;
                    }

                    body.push(self.instruction_call()?);
                }

                other => {
                    let error = ParserError::UnexpectedToken(other.clone());
                    return Err(self.reject(error));
                }
            }
        }

        if body.is_empty() {
            let (location, name) = name.split();
            return Err(Located::at(ParserError::EmptySubroutine(name), location));
        }

        Ok(Procedure { name, body })
    }

    /// Una llamada: `nombre arg, arg, …` hasta el fin de línea o `;`.
    fn instruction_call(&mut self) -> Result<InstructionCall, Located<ParserError>> {
        let name = self.identifier().expect("instruction off an identifier");
        let mut parameters = Vec::new();

        loop {
            match self.peek().map(Located::as_ref) {
                None | Some(Token::Newline) | Some(Token::Semicolon) => break,
                _ => parameters.push(self.value()?),
            }

            // Tras un valor solo puede venir una coma u el final de la
            // instrucción. Una coma colgante antes del fin de línea se
            // tolera aquí; el estilista la señala.
            match self.peek().map(Located::as_ref) {
                None | Some(Token::Newline) | Some(Token::Semicolon) => break,
                Some(Token::Comma) => self.advance(),
                Some(other) => {
                    let error = ParserError::UnexpectedToken(other.clone());
                    return Err(self.reject(error));
                }
            }
        }

        Ok(InstructionCall { name, parameters })
    }

    /// `[nombre args…]`, en el nivel superior.
    fn bracket_macro(&mut self) -> Result<MacroCall, Located<ParserError>> {
        self.advance(); // `[`

        let name = match self.next() {
            Some(token) => match token.as_ref() {
                Token::Id(_) => {
                    self.back();
                    self.identifier().unwrap()
                }
                other => {
                    let error = ParserError::UnexpectedToken(other.clone());
                    return Err(self.reject_back(error));
                }
            },
            None => return Err(self.reject(ParserError::MacroNeverClosed)),
        };

        let mut parameters = Vec::new();
        loop {
            match self.peek().map(Located::as_ref) {
                None => return Err(self.reject(ParserError::MacroNeverClosed)),
                Some(Token::BracketClose) => {
                    self.advance();
                    break;
                }

                Some(Token::Newline) => self.advance(),
                _ => parameters.push(self.value()?),
            }
        }

        Ok(MacroCall { name, parameters })
    }

    /// `:nombre args…` hasta el fin de línea.
    fn aside(&mut self) -> Result<Aside, Located<ParserError>> {
        self.advance(); // `:`

        let name = match self.peek().map(Located::as_ref) {
            None | Some(Token::Newline) => {
                return Err(self.reject(ParserError::AsideExpectsName))
            }

            Some(Token::Id(_)) => self.identifier().unwrap(),
            Some(other) => {
                let error = ParserError::AsideNameMustBeIdentifier(other.clone());
                return Err(self.reject(error));
            }
        };

        let mut parameters = Vec::new();
        loop {
            match self.peek().map(Located::as_ref) {
                None | Some(Token::Newline) => break,
                _ => parameters.push(self.value()?),
            }
        }

        Ok(Aside { name, parameters })
    }

    /// Deriva un valor del siguiente token.
    fn value(&mut self) -> Result<Located<Value>, Located<ParserError>> {
        let token = match self.next() {
            Some(token) => token.clone(),
            None => return Err(self.reject(ParserError::InvalidTokenValue(Token::Newline))),
        };

        let (location, token) = token.split();
        let value = match token {
            Token::Number(number) => Value::Number(number),
            Token::Literal(body) => Value::Literal(body),
            Token::Id(id) => classify(id).map_err(|error| Located::at(error, location.clone()))?,
            Token::CurlyOpen => return self.range(location),

            other => {
                let error = ParserError::InvalidTokenValue(other);
                return Err(Located::at(error, location));
            }
        };

        Ok(Located::at(value, location))
    }

    /// `{N:M}` con `N <= M`.
    ///
    /// El fin de línea cuenta como extremo faltante, ya que un rango
    /// nunca continúa en la línea siguiente.
    fn range(&mut self, open: Location) -> Result<Located<Value>, Located<ParserError>> {
        let start = match self.next().map(Located::as_ref) {
            None | Some(Token::Newline) => {
                return Err(self.reject_back(ParserError::RangeExpectsStart))
            }

            Some(Token::Number(number)) => *number,
            Some(other) => {
                let error = ParserError::RangeExpectsNumber(other.clone());
                return Err(self.reject_back(error));
            }
        };

        match self.next().map(Located::as_ref) {
            Some(Token::Colon) => (),
            _ => return Err(self.reject_back(ParserError::RangeExpectsSeparator)),
        }

        let end = match self.next().map(Located::as_ref) {
            None | Some(Token::Newline) => {
                return Err(self.reject_back(ParserError::RangeExpectsEnd))
            }

            Some(Token::Number(number)) => *number,
            Some(other) => {
                let error = ParserError::RangeExpectsNumber(other.clone());
                return Err(self.reject_back(error));
            }
        };

        let close = match self.next() {
            Some(token) if *token.as_ref() == Token::CurlyClose => token.location().clone(),
            _ => return Err(self.reject_back(ParserError::RangeExpectsEnd)),
        };

        let location = Location::span(open, &close);
        if start > end {
            let error = ParserError::RangeStartsAfterEnd(start, end);
            return Err(Located::at(error, location));
        }

        Ok(Located::at(Value::Range { start, end }, location))
    }

    /// Consume un token identificador, con su ubicación.
    fn identifier(&mut self) -> Option<Located<Identifier>> {
        match self.peek().map(Located::as_ref) {
            Some(Token::Id(id)) => {
                let id = id.clone();
                let location = self.here();
                self.advance();
                Some(Located::at(id, location))
            }

            _ => None,
        }
    }

    fn peek(&self) -> Option<&Located<Token>> {
        self.tokens.get(self.cursor)
    }

    fn lookahead(&self, offset: usize) -> Option<&Located<Token>> {
        self.tokens.get(self.cursor + offset)
    }

    fn next(&mut self) -> Option<&Located<Token>> {
        let token = self.tokens.get(self.cursor);
        if token.is_some() {
            self.cursor += 1;
        }

        token
    }

    fn advance(&mut self) {
        self.cursor += 1;
    }

    fn back(&mut self) {
        self.cursor -= 1;
    }

    /// Ubicación del token actual, o del fin de entrada.
    fn here(&self) -> Location {
        self.tokens
            .get(self.cursor)
            .map(|token| token.location().clone())
            .unwrap_or_else(|| self.eof.clone())
    }

    /// Asocia un error a la posición actual del cursor.
    fn reject(&self, error: ParserError) -> Located<ParserError> {
        Located::at(error, self.here())
    }

    /// Asocia un error al token recién consumido.
    fn reject_back(&mut self, error: ParserError) -> Located<ParserError> {
        self.back();
        self.reject(error)
    }
}

/// Clasifica un identificador como registro, `nil` o identificador.
fn classify(id: Identifier) -> Result<Value, ParserError> {
    if id.is("nil") {
        return Ok(Value::Nil);
    }

    if let Some(digits) = id.as_ref().strip_prefix('R') {
        if digits.is_empty() {
            return Err(ParserError::RegisterMissingNumber);
        }

        if digits.chars().all(|c| c.is_ascii_digit()) {
            // Números absurdamente largos se saturan; la generación de
            // código los rechaza contra el ancho del formato
            let number = digits.parse().unwrap_or(usize::MAX);
            return Ok(Value::Register(number));
        }
    }

    Ok(Value::Identifier(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::Lexer;

    fn parse_text(text: &str) -> Result<Ast, Located<ParserError>> {
        let source = Source::new("test.lr", text);
        let tokens = Lexer::new(&source, None)
            .try_exhaustive()
            .expect("lexing failed");

        parse(&source, tokens)
    }

    fn parse_error(text: &str) -> ParserError {
        parse_text(text).err().expect("parsing succeeded").into_inner()
    }

    fn values(text: &str) -> Vec<Value> {
        let ast = parse_text(text).expect("parsing failed");
        let first = ast.items().next().expect("no items");

        match first {
            Item::Procedure(procedure) => procedure.body()[0]
                .parameters()
                .iter()
                .map(|value| value.val().clone())
                .collect(),

            _ => panic!("expected a procedure"),
        }
    }

    #[test]
    fn top_level_is_procedures_macros_and_asides() {
        let ast = parse_text("[compat nexfuse]\n:alias x\nmain: nop\n").unwrap();
        let kinds: Vec<_> = ast
            .items()
            .map(|item| match item {
                Item::Procedure(_) => "procedure",
                Item::Macro(_) => "macro",
                Item::Aside(_) => "aside",
            })
            .collect();

        assert_eq!(kinds, vec!["macro", "aside", "procedure"]);
    }

    #[test]
    fn procedures_do_not_nest() {
        let ast = parse_text("a: nop\nb: nop\n").unwrap();
        let names: Vec<_> = ast
            .items()
            .map(|item| match item {
                Item::Procedure(procedure) => procedure.name().as_ref().as_ref().to_owned(),
                _ => panic!("expected procedures only"),
            })
            .collect();

        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn instruction_arguments() {
        assert_eq!(
            values("main: put R1, 7, 'x'\n"),
            vec![
                Value::Register(1),
                Value::Number(7),
                Value::Literal("x".into()),
            ]
        );
    }

    #[test]
    fn trailing_comma_is_tolerated() {
        assert_eq!(
            values("main: mov R1, 5,\n"),
            vec![Value::Register(1), Value::Number(5)]
        );
    }

    #[test]
    fn nil_is_case_insensitive() {
        assert_eq!(values("main: each NIL\n"), vec![Value::Nil]);
        assert_eq!(values("main: each nil\n"), vec![Value::Nil]);
    }

    #[test]
    fn registers_need_an_all_digit_tail() {
        assert_eq!(
            values("main: mov R15, Rx\n"),
            vec![
                Value::Register(15),
                Value::Identifier(Identifier::from("Rx")),
            ]
        );
    }

    #[test]
    fn bare_register_is_rejected() {
        assert!(matches!(
            parse_error("main: mov R, 1\n"),
            ParserError::RegisterMissingNumber
        ));
    }

    #[test]
    fn ranges() {
        assert_eq!(
            values("main: lsl R1, {2:5}\n"),
            vec![Value::Register(1), Value::Range { start: 2, end: 5 }]
        );
    }

    #[test]
    fn range_edge_cases() {
        assert!(matches!(
            parse_error("main: lsl {"),
            ParserError::RangeExpectsStart
        ));
        assert!(matches!(
            parse_error("main: lsl {x:2}\n"),
            ParserError::RangeExpectsNumber(_)
        ));
        assert!(matches!(
            parse_error("main: lsl {1 2}\n"),
            ParserError::RangeExpectsSeparator
        ));
        assert!(matches!(
            parse_error("main: lsl {1:"),
            ParserError::RangeExpectsEnd
        ));
        assert!(matches!(
            parse_error("main: lsl {5:2}\n"),
            ParserError::RangeStartsAfterEnd(5, 2)
        ));
    }

    #[test]
    fn empty_procedure_is_rejected() {
        assert!(matches!(
            parse_error("main:\n"),
            ParserError::EmptySubroutine(name) if name.as_ref() == "main"
        ));
    }

    #[test]
    fn stray_expression_is_rejected() {
        assert!(matches!(
            parse_error("main nop\n"),
            ParserError::ExpressionIsNotSubroutine(_)
        ));
    }

    #[test]
    fn old_procedure_syntax_is_rejected() {
        assert!(matches!(
            parse_error("@main\n"),
            ParserError::OldProcedureSyntax
        ));
    }

    #[test]
    fn unclosed_macro() {
        assert!(matches!(
            parse_error("[compat nexfuse\n"),
            ParserError::MacroNeverClosed
        ));
    }

    #[test]
    fn aside_name_rules() {
        assert!(matches!(parse_error(":\n"), ParserError::AsideExpectsName));
        assert!(matches!(
            parse_error(": 5\n"),
            ParserError::AsideNameMustBeIdentifier(_)
        ));
    }

    #[test]
    fn operators_do_not_form_values() {
        assert!(matches!(
            parse_error("main: mov R1, +\n"),
            ParserError::InvalidTokenValue(Token::Plus)
        ));
    }
}
