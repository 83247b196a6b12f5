use crate::error::{ExpressionError, Result};
use bigdecimal::BigDecimal;
use model::{
    core::value::Value,
    execution::expr::{BinaryOp, CompiledExpression, UnaryOp, WhenBranch},
};
use pest::{error::Error as PestError, iterators::Pair, Parser};
use pest_derive::Parser;
use std::str::FromStr;

#[derive(Parser)]
#[grammar = "grammar/expr.pest"]
struct ExprParser;

impl ExpressionError {
    fn from_pest_error(err: PestError<Rule>) -> Self {
        use pest::error::LineColLocation;

        let (line, column) = match err.line_col {
            LineColLocation::Pos((l, c)) => (l, c),
            LineColLocation::Span((l, c), _) => (l, c),
        };

        ExpressionError::Syntax {
            message: format!("{}", err.variant),
            line,
            column,
        }
    }
}

/// Parses expression text into a [`CompiledExpression`].
pub fn parse_expression(input: &str) -> Result<CompiledExpression> {
    let mut pairs =
        ExprParser::parse(Rule::expression, input).map_err(ExpressionError::from_pest_error)?;

    let expression = pairs.next().ok_or_else(|| syntax("empty expression"))?;
    let expr = expression
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(|| syntax("empty expression"))?;

    build_expr(expr)
}

fn syntax(message: &str) -> ExpressionError {
    ExpressionError::Syntax {
        message: message.to_string(),
        line: 1,
        column: 1,
    }
}

fn first_inner(pair: Pair<Rule>) -> Result<Pair<Rule>> {
    let rule = pair.as_rule();
    pair.into_inner()
        .next()
        .ok_or_else(|| syntax(&format!("incomplete {rule:?}")))
}

fn build_expr(pair: Pair<Rule>) -> Result<CompiledExpression> {
    match pair.as_rule() {
        Rule::expr => build_expr(first_inner(pair)?),
        Rule::or_expr
        | Rule::and_expr
        | Rule::concat_expr
        | Rule::additive
        | Rule::multiplicative => build_left_assoc(pair),
        Rule::not_expr => build_not(pair),
        Rule::comparison => build_comparison(pair),
        Rule::unary => build_unary(pair),
        Rule::primary => build_primary(pair),
        rule => Err(syntax(&format!("unexpected {rule:?}"))),
    }
}

fn build_left_assoc(pair: Pair<Rule>) -> Result<CompiledExpression> {
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or_else(|| syntax("missing operand"))?;
    let mut left = build_expr(first)?;

    while let Some(op_pair) = inner.next() {
        let op = binary_op(&op_pair)?;
        let right_pair = inner.next().ok_or_else(|| syntax("missing right operand"))?;
        let right = build_expr(right_pair)?;
        left = CompiledExpression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        };
    }

    Ok(left)
}

fn build_not(pair: Pair<Rule>) -> Result<CompiledExpression> {
    let mut inner = pair.into_inner();
    let first = inner.next().ok_or_else(|| syntax("missing operand"))?;
    if first.as_rule() == Rule::not_op {
        let operand = inner.next().ok_or_else(|| syntax("NOT without operand"))?;
        return Ok(CompiledExpression::Unary {
            op: UnaryOp::Not,
            operand: Box::new(build_expr(operand)?),
        });
    }
    build_expr(first)
}

fn build_comparison(pair: Pair<Rule>) -> Result<CompiledExpression> {
    let mut inner = pair.into_inner();
    let left = build_expr(inner.next().ok_or_else(|| syntax("missing operand"))?)?;

    let Some(next) = inner.next() else {
        return Ok(left);
    };

    if next.as_rule() == Rule::is_null_test {
        let negated = next.into_inner().any(|p| p.as_rule() == Rule::not_op);
        return Ok(if negated {
            CompiledExpression::IsNotNull(Box::new(left))
        } else {
            CompiledExpression::IsNull(Box::new(left))
        });
    }

    let op = binary_op(&next)?;
    let right = build_expr(inner.next().ok_or_else(|| syntax("missing right operand"))?)?;
    Ok(CompiledExpression::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    })
}

fn build_unary(pair: Pair<Rule>) -> Result<CompiledExpression> {
    let mut negations = 0;
    let mut operand = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::neg_op => negations += 1,
            _ => operand = Some(build_expr(p)?),
        }
    }
    let mut expr = operand.ok_or_else(|| syntax("missing operand"))?;
    for _ in 0..negations {
        expr = match expr {
            CompiledExpression::Literal(Value::Int(n)) => {
                CompiledExpression::Literal(Value::Int(-n))
            }
            other => CompiledExpression::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(other),
            },
        };
    }
    Ok(expr)
}

fn build_primary(pair: Pair<Rule>) -> Result<CompiledExpression> {
    let inner = first_inner(pair)?;
    match inner.as_rule() {
        Rule::expr => Ok(CompiledExpression::Grouped(Box::new(build_expr(inner)?))),
        Rule::literal => build_literal(first_inner(inner)?),
        Rule::param => {
            let index = inner.as_str()[1..]
                .parse::<usize>()
                .map_err(|_| syntax("invalid parameter reference"))?;
            if index == 0 {
                return Err(syntax("parameter numbers start at $1"));
            }
            Ok(CompiledExpression::Param(index))
        }
        Rule::identifier => Ok(CompiledExpression::Column(identifier_name(inner.as_str()))),
        Rule::function_call => build_function_call(inner),
        Rule::case_expr => build_case(inner),
        rule => Err(syntax(&format!("unexpected {rule:?}"))),
    }
}

fn build_literal(pair: Pair<Rule>) -> Result<CompiledExpression> {
    let value = match pair.as_rule() {
        Rule::null_kw => Value::Null,
        Rule::bool_lit => Value::Boolean(pair.as_str().eq_ignore_ascii_case("true")),
        Rule::number => {
            let text = pair.as_str();
            match text.parse::<i64>() {
                Ok(n) => Value::Int(n),
                Err(_) => Value::Decimal(
                    BigDecimal::from_str(text).map_err(|_| syntax("invalid number"))?,
                ),
            }
        }
        Rule::string => {
            let raw = pair
                .into_inner()
                .next()
                .map(|p| p.as_str())
                .unwrap_or_default();
            Value::String(raw.replace("''", "'"))
        }
        rule => return Err(syntax(&format!("unexpected literal {rule:?}"))),
    };
    Ok(CompiledExpression::Literal(value))
}

fn build_function_call(pair: Pair<Rule>) -> Result<CompiledExpression> {
    let mut inner = pair.into_inner();
    let name = inner
        .next()
        .map(|p| identifier_name(p.as_str()))
        .ok_or_else(|| syntax("missing function name"))?;
    let args = inner.map(build_expr).collect::<Result<Vec<_>>>()?;
    Ok(CompiledExpression::FunctionCall { name, args })
}

fn build_case(pair: Pair<Rule>) -> Result<CompiledExpression> {
    let mut branches = Vec::new();
    let mut else_expr = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::when_clause => {
                let mut parts = p.into_inner().filter(|x| x.as_rule() == Rule::expr);
                let condition = parts.next().ok_or_else(|| syntax("WHEN without condition"))?;
                let value = parts.next().ok_or_else(|| syntax("WHEN without THEN"))?;
                branches.push(WhenBranch {
                    condition: build_expr(condition)?,
                    value: build_expr(value)?,
                });
            }
            Rule::else_clause => {
                let value = p
                    .into_inner()
                    .find(|x| x.as_rule() == Rule::expr)
                    .ok_or_else(|| syntax("ELSE without value"))?;
                else_expr = Some(Box::new(build_expr(value)?));
            }
            _ => {}
        }
    }

    Ok(CompiledExpression::When {
        branches,
        else_expr,
    })
}

/// Unquoted identifiers fold to lower case, quoted ones are taken verbatim.
fn identifier_name(text: &str) -> String {
    match text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        Some(quoted) => quoted.to_string(),
        None => text.to_ascii_lowercase(),
    }
}

fn binary_op(pair: &Pair<Rule>) -> Result<BinaryOp> {
    let text = pair.as_str();
    let op = match pair.as_rule() {
        Rule::or_op => BinaryOp::Or,
        Rule::and_op => BinaryOp::And,
        Rule::concat_op => BinaryOp::Concat,
        Rule::add_op if text == "+" => BinaryOp::Add,
        Rule::add_op => BinaryOp::Subtract,
        Rule::mul_op => match text {
            "*" => BinaryOp::Multiply,
            "/" => BinaryOp::Divide,
            _ => BinaryOp::Modulo,
        },
        Rule::cmp_op => match text {
            "=" => BinaryOp::Equal,
            "<>" | "!=" => BinaryOp::NotEqual,
            "<" => BinaryOp::LessThan,
            ">" => BinaryOp::GreaterThan,
            "<=" => BinaryOp::LessOrEqual,
            _ => BinaryOp::GreaterOrEqual,
        },
        rule => return Err(syntax(&format!("unexpected operator {rule:?}"))),
    };
    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let expr = parse_expression("a + 2 * 3 > 10 AND b IS NOT NULL").unwrap();
        let CompiledExpression::Binary { op, left, right } = expr else {
            panic!("expected AND");
        };
        assert_eq!(op, BinaryOp::And);
        assert!(matches!(*right, CompiledExpression::IsNotNull(_)));
        let CompiledExpression::Binary { op, left, .. } = *left else {
            panic!("expected comparison");
        };
        assert_eq!(op, BinaryOp::GreaterThan);
        assert!(matches!(
            *left,
            CompiledExpression::Binary {
                op: BinaryOp::Add,
                ..
            }
        ));
    }

    #[test]
    fn test_literals_and_params() {
        assert_eq!(
            parse_expression("'it''s'").unwrap(),
            CompiledExpression::Literal(Value::String("it's".into()))
        );
        assert_eq!(
            parse_expression("-5").unwrap(),
            CompiledExpression::Literal(Value::Int(-5))
        );
        assert_eq!(parse_expression("$2").unwrap(), CompiledExpression::Param(2));
        assert_eq!(
            parse_expression("NULL").unwrap(),
            CompiledExpression::Literal(Value::Null)
        );
        assert!(matches!(
            parse_expression("1.25").unwrap(),
            CompiledExpression::Literal(Value::Decimal(_))
        ));
    }

    #[test]
    fn test_function_call_and_case() {
        let expr = parse_expression("CASE WHEN $1 > 0 THEN upper($2) ELSE nullif($2, '') END")
            .unwrap();
        let CompiledExpression::When {
            branches,
            else_expr,
        } = expr
        else {
            panic!("expected CASE");
        };
        assert_eq!(branches.len(), 1);
        assert!(matches!(
            branches[0].value,
            CompiledExpression::FunctionCall { ref name, .. } if name == "upper"
        ));
        assert!(else_expr.is_some());
    }

    #[test]
    fn test_identifiers_fold_case() {
        assert_eq!(
            parse_expression("Amount").unwrap(),
            CompiledExpression::Column("amount".into())
        );
        assert_eq!(
            parse_expression("\"Amount\"").unwrap(),
            CompiledExpression::Column("Amount".into())
        );
    }

    #[test]
    fn test_syntax_error_position() {
        let err = parse_expression("a >").unwrap_err();
        assert!(matches!(err, ExpressionError::Syntax { line: 1, .. }));
        assert!(parse_expression("$0").is_err());
    }
}
