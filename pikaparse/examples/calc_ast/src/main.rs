use std::io::{self, BufRead, Write};

extern crate peggrammar;
extern crate pikaparse;

use peggrammar::peg::ast::{ch, char_range, first, label, one_or_more, rule_ref, seq};
use peggrammar::peg::{AssocKind, PegGrammar, Precedence, Rule};

// An arithmetic grammar written with the programmatic factories: three precedence levels for
// one rule name, with '+' and '*' both left-associative.
fn grammar() -> PegGrammar<u32> {
    let rules = vec![
        Rule::new_prec(
            "Expr",
            Precedence {
                level: 0,
                kind: AssocKind::Left
            },
            label(
                "add",
                seq(vec![rule_ref("Expr"), label("op", ch('+')), rule_ref("Expr")])
            )
        ),
        Rule::new_prec(
            "Expr",
            Precedence {
                level: 1,
                kind: AssocKind::Left
            },
            label(
                "mul",
                seq(vec![rule_ref("Expr"), label("op", ch('*')), rule_ref("Expr")])
            )
        ),
        Rule::new_prec(
            "Expr",
            Precedence {
                level: 2,
                kind: AssocKind::Nonassoc
            },
            first(vec![
                label("num", one_or_more(char_range('0', '9'))),
                seq(vec![ch('('), rule_ref("Expr"), ch(')')]),
            ])
        ),
    ];
    PegGrammar::new(&rules).unwrap()
}

fn main() {
    let grm = grammar();
    let stdin = io::stdin();
    loop {
        print!(">>> ");
        io::stdout().flush().ok();
        match stdin.lock().lines().next() {
            Some(Ok(ref l)) => {
                if l.trim().is_empty() {
                    continue;
                }
                // Parse the line and project the memo table's top match into an AST.
                let memo = pikaparse::parse(&grm, l);
                match memo.to_ast("Expr") {
                    Some(ref ast) if ast.len() == memo.input_len() => print!("{}", ast.pp()),
                    _ => {
                        for (start, end, text) in memo.syntax_errors(&["Expr"]) {
                            println!("Syntax error at column {}..{}: '{}'", start, end, text);
                        }
                    }
                }
            }
            _ => break
        }
    }
}
