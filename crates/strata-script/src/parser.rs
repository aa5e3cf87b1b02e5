use chumsky::{input::ValueInput, pratt::*, prelude::*};
use std::fmt;

mod lexer;
pub use lexer::{Token, lexer};

use crate::error::EvalError;

pub type Span = SimpleSpan;
pub type ParseError<'code, T> = Rich<'code, T, Span>;

#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

#[derive(Debug, Clone)]
pub enum Statement<'code> {
    Expression(Spanned<Expression<'code>>),
    Assign {
        target: Spanned<&'code str>,
        value: Spanned<Expression<'code>>,
    },
    Raise {
        exception: Spanned<Expression<'code>>,
    },
    Pass,
}

#[derive(Debug, Clone)]
pub enum Expression<'code> {
    Literal(Literal<'code>),
    Name(&'code str),
    Attribute {
        object: Box<Spanned<Self>>,
        name: &'code str,
    },
    Call {
        function: Box<Spanned<Self>>,
        arguments: Vec<Spanned<Self>>,
    },
    Negate {
        operand: Box<Spanned<Self>>,
    },
    BinaryOperator {
        operator: BinaryOperator,
        operand_a: Box<Spanned<Self>>,
        operand_b: Box<Spanned<Self>>,
    },
}

impl<'code> Expression<'code> {
    /// Calls `f` with every direct sub-expression.
    pub fn for_each_child(&self, mut f: impl FnMut(&Spanned<Expression<'code>>)) {
        match self {
            Self::Literal(_) | Self::Name(_) => {}
            Self::Attribute { object, .. } => f(object),
            Self::Call {
                function,
                arguments,
            } => {
                f(function);
                arguments.iter().for_each(f);
            }
            Self::Negate { operand } => f(operand),
            Self::BinaryOperator {
                operand_a,
                operand_b,
                ..
            } => {
                f(operand_a);
                f(operand_b);
            }
        }
    }

    /// Name of the called function when this is a call of a plain name.
    pub fn called_name(&self) -> Option<&'code str> {
        match self {
            Self::Call { function, .. } => match function.node {
                Self::Name(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Power => "**",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal<'code> {
    Int(i64),
    Float(f64),
    Text(&'code str),
    Bool(bool),
    None,
}

fn binary_operation<'code>(
    operator: BinaryOperator,
    operand_a: Spanned<Expression<'code>>,
    operand_b: Spanned<Expression<'code>>,
    span: Span,
) -> Spanned<Expression<'code>> {
    Spanned {
        span,
        node: Expression::BinaryOperator {
            operator,
            operand_a: Box::new(operand_a),
            operand_b: Box::new(operand_b),
        },
    }
}

pub fn expression<'tokens, 'code: 'tokens, I>()
-> impl Parser<'tokens, I, Spanned<Expression<'code>>, extra::Err<ParseError<'tokens, Token<'code>>>> + Clone
where
    I: ValueInput<'tokens, Token = Token<'code>, Span = Span>,
{
    recursive(|expression| {
        let bracket_round_open = just(Token::BracketRoundOpen);
        let bracket_round_close = just(Token::BracketRoundClose);

        let identifier = select! { Token::Identifier(identifier) => identifier };

        let literal = select! {
            Token::Int(number) => Literal::Int(number),
            Token::Float(number) => Literal::Float(number),
            Token::Text(text) => Literal::Text(text),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::None => Literal::None,
        };

        let atom = choice((
            literal.map(Expression::Literal),
            identifier.map(Expression::Name),
        ))
        .map_with(|expression, extra| Spanned {
            node: expression,
            span: extra.span(),
        });

        let nested = expression
            .clone()
            .delimited_by(bracket_round_open.clone(), bracket_round_close.clone());

        let arguments = expression
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(bracket_round_open, bracket_round_close);

        let attribute = just(Token::Dot).ignore_then(identifier);

        atom.or(nested).pratt((
            // Calls and attribute access bind tightest
            postfix(10, arguments, |function, arguments, extra| Spanned {
                span: extra.span(),
                node: Expression::Call {
                    function: Box::new(function),
                    arguments,
                },
            }),
            postfix(10, attribute, |object, name, extra| Spanned {
                span: extra.span(),
                node: Expression::Attribute {
                    object: Box::new(object),
                    name,
                },
            }),
            infix(right(9), just(Token::DoubleAsterisk), |l, _, r, extra| {
                binary_operation(BinaryOperator::Power, l, r, extra.span())
            }),
            prefix(8, just(Token::Minus), |_, operand, extra| Spanned {
                span: extra.span(),
                node: Expression::Negate {
                    operand: Box::new(operand),
                },
            }),
            infix(left(7), just(Token::Asterisk), |l, _, r, extra| {
                binary_operation(BinaryOperator::Multiply, l, r, extra.span())
            }),
            infix(left(7), just(Token::Slash), |l, _, r, extra| {
                binary_operation(BinaryOperator::Divide, l, r, extra.span())
            }),
            infix(left(7), just(Token::Percent), |l, _, r, extra| {
                binary_operation(BinaryOperator::Modulo, l, r, extra.span())
            }),
            infix(left(6), just(Token::Plus), |l, _, r, extra| {
                binary_operation(BinaryOperator::Add, l, r, extra.span())
            }),
            infix(left(6), just(Token::Minus), |l, _, r, extra| {
                binary_operation(BinaryOperator::Subtract, l, r, extra.span())
            }),
            infix(left(5), just(Token::Equal), |l, _, r, extra| {
                binary_operation(BinaryOperator::Equal, l, r, extra.span())
            }),
            infix(left(5), just(Token::NotEqual), |l, _, r, extra| {
                binary_operation(BinaryOperator::NotEqual, l, r, extra.span())
            }),
            infix(left(5), just(Token::Greater), |l, _, r, extra| {
                binary_operation(BinaryOperator::Greater, l, r, extra.span())
            }),
            infix(left(5), just(Token::GreaterOrEqual), |l, _, r, extra| {
                binary_operation(BinaryOperator::GreaterOrEqual, l, r, extra.span())
            }),
            infix(left(5), just(Token::Less), |l, _, r, extra| {
                binary_operation(BinaryOperator::Less, l, r, extra.span())
            }),
            infix(left(5), just(Token::LessOrEqual), |l, _, r, extra| {
                binary_operation(BinaryOperator::LessOrEqual, l, r, extra.span())
            }),
        ))
    })
}

pub fn parser<'tokens, 'code: 'tokens, I>()
-> impl Parser<'tokens, I, Vec<Spanned<Statement<'code>>>, extra::Err<ParseError<'tokens, Token<'code>>>>
where
    I: ValueInput<'tokens, Token = Token<'code>, Span = Span>,
{
    let newline = just(Token::Newline);
    let expression = expression();

    let target = select! { Token::Identifier(identifier) => identifier }.map_with(
        |identifier, extra| Spanned {
            node: identifier,
            span: extra.span(),
        },
    );

    let assignment = target
        .then_ignore(just(Token::Assign))
        .then(expression.clone())
        .map(|(target, value)| Statement::Assign { target, value });

    let raise = just(Token::Raise)
        .ignore_then(expression.clone())
        .map(|exception| Statement::Raise { exception });

    let pass = just(Token::Pass).to(Statement::Pass);

    let expression_statement = expression.map(Statement::Expression);

    let statement = choice((assignment, raise, pass, expression_statement)).map_with(
        |statement, extra| Spanned {
            node: statement,
            span: extra.span(),
        },
    );

    // One statement per line
    let terminator = newline.clone().repeated().at_least(1).ignored().or(end());

    newline
        .repeated()
        .ignore_then(statement.then_ignore(terminator).repeated().collect())
        .then_ignore(end())
}

fn tokens(source: &str) -> Result<Vec<Spanned<Token<'_>>>, EvalError> {
    let mut tokens = lexer().parse(source).into_result().map_err(|errors| {
        syntax_error(source, errors.into_iter().next())
    })?;
    tokens.retain(|spanned_token| !matches!(spanned_token.node, Token::Comment(_)));
    Ok(tokens)
}

fn syntax_error<T: fmt::Display>(source: &str, error: Option<ParseError<'_, T>>) -> EvalError {
    match error {
        Some(error) => EvalError::at(
            source,
            error.span().start,
            format!("SyntaxError: {error}"),
        ),
        None => EvalError::new("SyntaxError: invalid syntax", 1),
    }
}

/// Parses a whole script into its statements.
pub fn parse_script(source: &str) -> Result<Vec<Spanned<Statement<'_>>>, EvalError> {
    let tokens = tokens(source)?;
    parser()
        .parse(tokens.as_slice().map(
            Span::from(source.len()..source.len()),
            |Spanned { node, span }| (node, span),
        ))
        .into_result()
        .map_err(|errors| syntax_error(source, errors.into_iter().next()))
}

/// Parses a single expression, as stored in a datum's text.
pub fn parse_expression(source: &str) -> Result<Spanned<Expression<'_>>, EvalError> {
    let tokens = tokens(source)?;
    let newlines = just(Token::Newline).repeated();
    newlines
        .clone()
        .ignore_then(expression())
        .then_ignore(newlines)
        .then_ignore(end())
        .parse(tokens.as_slice().map(
            Span::from(source.len()..source.len()),
            |Spanned { node, span }| (node, span),
        ))
        .into_result()
        .map_err(|errors| syntax_error(source, errors.into_iter().next()))
}
