// Copyright (c) 2018 King's College London
// created by the Software Development Team <http://soft-dev.org/>
//
// The Universal Permissive License (UPL), Version 1.0
//
// Subject to the condition set forth below, permission is hereby granted to any person obtaining a
// copy of this software, associated documentation and/or data (collectively the "Software"), free
// of charge and under any and all copyright rights in the Software, and any and all patent rights
// owned or freely licensable by each licensor hereunder covering either (i) the unmodified
// Software as contributed to or provided by such licensor, or (ii) the Larger Works (as defined
// below), to deal in both
//
// (a) the Software, and
// (b) any piece of software and/or hardware listed in the lrgrwrks.txt file
// if one is included with the Software (each a "Larger Work" to which the Software is contributed
// by such licensors),
//
// without restriction, including without limitation the rights to copy, create derivative works
// of, display, perform, and distribute the Software and make, use, sell, offer for sale, import,
// export, have made, and have sold the Software and the Larger Work(s), and to sublicense the
// foregoing rights on either these or other terms.
//
// This license is subject to the following condition: The above copyright notice and either this
// complete permission notice or at a minimum a reference to the UPL must be included in all copies
// or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! The textual grammar surface syntax, parsed with the pika engine itself: a static grammar
//! describing `Rule <- Clause ;` definitions is built once with the `peggrammar` factories, and
//! [`grammar_from_str`](fn.grammar_from_str.html) runs it, lowers the resulting AST back into
//! rules and prepares those into a fresh `PegGrammar`.
//!
//! The surface syntax: a rule is `Name <- Clause ;`, with an optional `[prec]`, `[prec,L]` or
//! `[prec,R]` precedence annotation after the name. Clauses are built from `/` (ordered choice,
//! loosest), juxtaposition (sequence), `&`/`!` (lookaheads), `label:` prefixes, the `+`/`*`/`?`
//! suffixes, and the atoms: `"..."` strings (with C-style escapes; a trailing `i` makes matching
//! case-insensitive), `'c'` single characters, `[...]`/`[^...]` character sets with `-` ranges,
//! `(...)` grouping, `()` (the empty clause) and bare rule names. `#` starts a comment running
//! to the end of the line.

use std::fmt;

use peggrammar::peg::ast::{any_char, ch, char_ranges, char_set, char_set_negated, first,
                           followed_by, label, not_followed_by, nothing, one_or_more, optional,
                           rule_ref, seq, str_lit, str_lit_ci, zero_or_more, Expr};
use peggrammar::peg::{escape, AssocKind, CharSet, PegGrammar, PegGrammarError, Precedence, Rule};

use astnode::ASTNode;
use parser::parse;

const RULE_AST: &'static str = "RuleAST";
const RULE_NAME_AST: &'static str = "RuleNameAST";
const PREC_AST: &'static str = "PrecAST";
const L_ASSOC_AST: &'static str = "LAssocAST";
const R_ASSOC_AST: &'static str = "RAssocAST";
const FIRST_AST: &'static str = "FirstAST";
const SEQ_AST: &'static str = "SeqAST";
const FOLLOWED_BY_AST: &'static str = "FollowedByAST";
const NOT_FOLLOWED_BY_AST: &'static str = "NotFollowedByAST";
const LABEL_AST: &'static str = "LabelAST";
const LABEL_NAME_AST: &'static str = "LabelNameAST";
const ONE_OR_MORE_AST: &'static str = "OneOrMoreAST";
const ZERO_OR_MORE_AST: &'static str = "ZeroOrMoreAST";
const OPTIONAL_AST: &'static str = "OptionalAST";
const NOTHING_AST: &'static str = "NothingAST";
const STR_AST: &'static str = "QuotedStrAST";
const CHAR_AST: &'static str = "SingleQuotedCharAST";
const CHARSET_AST: &'static str = "CharSetAST";
const IDENT_AST: &'static str = "IdentAST";

/// Errors from [`grammar_from_str`](fn.grammar_from_str.html): either the grammar text itself
/// did not parse (with the spans no rule accounted for), or it parsed but could not be prepared.
#[derive(Debug)]
pub enum GrammarFromStrError {
    Syntax(Vec<(usize, usize, String)>),
    Grammar(PegGrammarError)
}

impl From<PegGrammarError> for GrammarFromStrError {
    fn from(err: PegGrammarError) -> GrammarFromStrError {
        GrammarFromStrError::Grammar(err)
    }
}

impl fmt::Display for GrammarFromStrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            GrammarFromStrError::Syntax(ref spans) => {
                if spans.is_empty() {
                    return write!(f, "Syntax error in grammar");
                }
                write!(f, "Syntax error in grammar at")?;
                for &(start, end, ref text) in spans {
                    write!(f, " {}..{} '{}'", start, end, text)?;
                }
                Ok(())
            }
            GrammarFromStrError::Grammar(ref e) => e.fmt(f)
        }
    }
}

lazy_static! {
    static ref META_GRAMMAR: PegGrammar<u32> = PegGrammar::new(&meta_rules()).unwrap();
}

/// The grammar of grammars. The clause syntax is a precedence group of its own, so parenthesised
/// grouping and operator binding fall out of the same precedence rewrite every other grammar
/// gets.
fn meta_rules() -> Vec<Rule> {
    let wsc = || rule_ref("WSC");
    let prec = |level| Precedence {
        level,
        kind: AssocKind::Nonassoc
    };
    vec![
        Rule::new("GRAMMAR", seq(vec![wsc(), one_or_more(rule_ref("RULE"))])),
        Rule::new(
            "RULE",
            label(
                RULE_AST,
                seq(vec![
                    label(RULE_NAME_AST, rule_ref("IDENT")),
                    wsc(),
                    optional(rule_ref("RULEPREC")),
                    str_lit("<-"),
                    wsc(),
                    rule_ref("CLAUSE"),
                    wsc(),
                    ch(';'),
                    wsc(),
                ])
            )
        ),
        Rule::new(
            "RULEPREC",
            seq(vec![
                ch('['),
                wsc(),
                label(PREC_AST, one_or_more(char_ranges(&[('0', '9')]))),
                wsc(),
                optional(seq(vec![
                    ch(','),
                    wsc(),
                    first(vec![
                        label(L_ASSOC_AST, char_set("lL")),
                        label(R_ASSOC_AST, char_set("rR")),
                    ]),
                    wsc(),
                ])),
                ch(']'),
                wsc(),
            ])
        ),
        Rule::new_prec(
            "CLAUSE",
            prec(0),
            label(
                FIRST_AST,
                seq(vec![
                    rule_ref("CLAUSE"),
                    one_or_more(seq(vec![wsc(), ch('/'), wsc(), rule_ref("CLAUSE")])),
                ])
            )
        ),
        Rule::new_prec(
            "CLAUSE",
            prec(1),
            label(
                SEQ_AST,
                seq(vec![
                    rule_ref("CLAUSE"),
                    one_or_more(seq(vec![wsc(), rule_ref("CLAUSE")])),
                ])
            )
        ),
        Rule::new_prec(
            "CLAUSE",
            prec(2),
            first(vec![
                label(
                    FOLLOWED_BY_AST,
                    seq(vec![ch('&'), wsc(), rule_ref("CLAUSE")])
                ),
                label(
                    NOT_FOLLOWED_BY_AST,
                    seq(vec![ch('!'), wsc(), rule_ref("CLAUSE")])
                ),
            ])
        ),
        Rule::new_prec(
            "CLAUSE",
            prec(3),
            label(
                LABEL_AST,
                seq(vec![
                    label(LABEL_NAME_AST, rule_ref("IDENT")),
                    wsc(),
                    ch(':'),
                    wsc(),
                    rule_ref("CLAUSE"),
                ])
            )
        ),
        Rule::new_prec(
            "CLAUSE",
            prec(4),
            first(vec![
                label(
                    ONE_OR_MORE_AST,
                    seq(vec![rule_ref("CLAUSE"), wsc(), ch('+')])
                ),
                label(
                    ZERO_OR_MORE_AST,
                    seq(vec![rule_ref("CLAUSE"), wsc(), ch('*')])
                ),
                label(OPTIONAL_AST, seq(vec![rule_ref("CLAUSE"), wsc(), ch('?')])),
            ])
        ),
        Rule::new_prec(
            "CLAUSE",
            prec(5),
            first(vec![
                seq(vec![ch('('), wsc(), rule_ref("CLAUSE"), wsc(), ch(')')]),
                label(NOTHING_AST, seq(vec![ch('('), wsc(), ch(')')])),
                label(STR_AST, rule_ref("STRLIT")),
                label(CHAR_AST, rule_ref("CHARLIT")),
                label(CHARSET_AST, rule_ref("CHARSETLIT")),
                label(IDENT_AST, rule_ref("IDENT")),
            ])
        ),
        Rule::new(
            "STRLIT",
            seq(vec![
                ch('"'),
                zero_or_more(first(vec![
                    seq(vec![ch('\\'), any_char()]),
                    char_set_negated("\"\\"),
                ])),
                ch('"'),
                optional(ch('i')),
            ])
        ),
        Rule::new(
            "CHARLIT",
            seq(vec![
                ch('\''),
                first(vec![
                    seq(vec![ch('\\'), any_char()]),
                    char_set_negated("'\\"),
                ]),
                ch('\''),
            ])
        ),
        Rule::new(
            "CHARSETLIT",
            seq(vec![
                ch('['),
                optional(ch('^')),
                one_or_more(first(vec![
                    seq(vec![rule_ref("CSCHAR"), ch('-'), rule_ref("CSCHAR")]),
                    rule_ref("CSCHAR"),
                ])),
                ch(']'),
            ])
        ),
        Rule::new(
            "CSCHAR",
            first(vec![
                seq(vec![ch('\\'), any_char()]),
                char_set_negated("]\\"),
            ])
        ),
        Rule::new(
            "IDENT",
            seq(vec![
                char_ranges(&[('A', 'Z'), ('_', '_'), ('a', 'z')]),
                zero_or_more(char_ranges(&[('0', '9'), ('A', 'Z'), ('_', '_'), ('a', 'z')])),
            ])
        ),
        Rule::new(
            "WSC",
            zero_or_more(first(vec![char_set(" \t\r\n"), rule_ref("COMMENT")]))
        ),
        Rule::new(
            "COMMENT",
            seq(vec![ch('#'), zero_or_more(char_set_negated("\n"))])
        ),
    ]
}

/// Parse `src` as grammar surface syntax and prepare the result.
pub fn grammar_from_str(src: &str) -> Result<PegGrammar<u32>, GrammarFromStrError> {
    let rules = rules_from_str(src)?;
    PegGrammar::new(&rules).map_err(GrammarFromStrError::Grammar)
}

/// Parse `src` as grammar surface syntax, returning the lowered rules without preparing them.
pub fn rules_from_str(src: &str) -> Result<Vec<Rule>, GrammarFromStrError> {
    let memo = parse(&META_GRAMMAR, src);
    let ast = match memo.to_ast("GRAMMAR") {
        Some(ast) => {
            if ast.len() == memo.input_len() {
                ast
            } else {
                return Err(GrammarFromStrError::Syntax(memo.syntax_errors(&["RULE"])));
            }
        }
        None => return Err(GrammarFromStrError::Syntax(memo.syntax_errors(&["RULE"])))
    };
    let mut rules = Vec::with_capacity(ast.children().len());
    for rule_node in ast.children() {
        rules.push(lower_rule(rule_node)?);
    }
    Ok(rules)
}

fn lower_rule(node: &ASTNode<u32>) -> Result<Rule, GrammarFromStrError> {
    let mut name = None;
    let mut level = None;
    let mut kind = AssocKind::Nonassoc;
    let mut clause = None;
    for c in node.children() {
        match c.label() {
            RULE_NAME_AST => name = Some(c.text()),
            PREC_AST => match c.text().parse() {
                Ok(v) => level = Some(v),
                Err(_) => {
                    return Err(GrammarFromStrError::Grammar(
                        PegGrammarError::InvalidClauseComposition(format!(
                            "precedence level '{}' is out of range",
                            c.text()
                        ))
                    ));
                }
            },
            L_ASSOC_AST => kind = AssocKind::Left,
            R_ASSOC_AST => kind = AssocKind::Right,
            _ => clause = Some(lower_clause(c)?)
        }
    }
    let name = name.unwrap();
    let clause = clause.unwrap();
    match level {
        Some(level) => Ok(Rule {
            name,
            prec: Some(Precedence { level, kind }),
            clause
        }),
        None => Ok(Rule {
            name,
            prec: None,
            clause
        })
    }
}

fn lower_clause(node: &ASTNode<u32>) -> Result<Expr, GrammarFromStrError> {
    match node.label() {
        FIRST_AST | SEQ_AST => {
            let mut subs = Vec::with_capacity(node.children().len());
            for c in node.children() {
                subs.push(lower_clause(c)?);
            }
            if node.label() == FIRST_AST {
                Ok(first(subs))
            } else {
                Ok(seq(subs))
            }
        }
        FOLLOWED_BY_AST => Ok(followed_by(lower_clause(node.child(0))?)),
        NOT_FOLLOWED_BY_AST => Ok(not_followed_by(lower_clause(node.child(0))?)),
        LABEL_AST => {
            debug_assert_eq!(node.child(0).label(), LABEL_NAME_AST);
            let name = node.child(0).text();
            Ok(label(&name, lower_clause(node.child(1))?))
        }
        ONE_OR_MORE_AST => Ok(one_or_more(lower_clause(node.child(0))?)),
        ZERO_OR_MORE_AST => Ok(zero_or_more(lower_clause(node.child(0))?)),
        OPTIONAL_AST => Ok(optional(lower_clause(node.child(0))?)),
        NOTHING_AST => Ok(nothing()),
        STR_AST => Ok(lower_str(&node.text())),
        CHAR_AST => Ok(lower_char(&node.text())),
        CHARSET_AST => Ok(lower_charset(&node.text())),
        IDENT_AST => Ok(rule_ref(&node.text())),
        l => panic!("unexpected AST label '{}' while lowering a grammar", l)
    }
}

fn lower_str(text: &str) -> Expr {
    let ci = text.ends_with('i');
    let body = if ci {
        &text[1..text.len() - 2]
    } else {
        &text[1..text.len() - 1]
    };
    let s = escape::unescape(body);
    if ci {
        str_lit_ci(&s)
    } else {
        str_lit(&s)
    }
}

fn lower_char(text: &str) -> Expr {
    let s = escape::unescape(&text[1..text.len() - 1]);
    ch(s.chars().next().unwrap())
}

fn lower_charset(text: &str) -> Expr {
    let mut inner = &text[1..text.len() - 1];
    let negated = inner.starts_with('^');
    if negated {
        inner = &inner[1..];
    }
    let chars = inner.chars().collect::<Vec<_>>();
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let lo = read_cs_char(&chars, &mut i);
        // An unescaped '-' with something after it denotes a range.
        if i + 1 < chars.len() && chars[i] == '-' {
            i += 1;
            let hi = read_cs_char(&chars, &mut i);
            ranges.push((lo, hi));
        } else {
            ranges.push((lo, lo));
        }
    }
    let cs = CharSet::from_ranges(&ranges);
    Expr::CharSet(if negated { cs.negate() } else { cs })
}

fn read_cs_char(chars: &[char], i: &mut usize) -> char {
    let c = chars[*i];
    *i += 1;
    if c != '\\' || *i >= chars.len() {
        return c;
    }
    let n = chars[*i];
    *i += 1;
    match n {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        '0' => '\0',
        'u' => {
            let mut v = 0u32;
            for _ in 0..4 {
                if *i < chars.len() {
                    if let Some(d) = chars[*i].to_digit(16) {
                        v = v * 16 + d;
                        *i += 1;
                        continue;
                    }
                }
                break;
            }
            ::std::char::from_u32(v).unwrap_or('\u{fffd}')
        }
        o => o
    }
}

#[cfg(test)]
mod test {
    use peggrammar::peg::PegGrammarError;

    use memotable::MemoKey;
    use parser::parse;
    use super::{grammar_from_str, GrammarFromStrError};

    #[test]
    fn test_statement_grammar() {
        let src = "Program <- Statement+;\n\
                   Statement <- stmt:(var:[a-z]+ '=' E ';');\n\
                   E <- sum:(E op:'+' N) / N;\n\
                   N <- num:[0-9]+;\n";
        let grm = grammar_from_str(src).unwrap();

        let memo = parse(&grm, "x=1+2+3;");
        let ast = memo.to_ast("Program").unwrap();
        assert_eq!(ast.len(), memo.input_len());
        let stmt = ast.child(0);
        assert_eq!(stmt.label(), "stmt");
        assert_eq!(stmt.child(0).label(), "var");
        assert_eq!(stmt.child(0).text(), "x");
        let sum = stmt.child(1);
        assert_eq!(sum.label(), "sum");
        assert_eq!(sum.child(0).label(), "sum");
        assert_eq!(sum.child(0).text(), "1+2");
        assert_eq!(sum.child(2).text(), "3");

        // '-' appears nowhere in the grammar, so nothing parses and recovery blames the whole
        // statement.
        let memo = parse(&grm, "x=a-b+c;");
        assert!(memo.to_ast("Program").is_none());
        assert_eq!(
            memo.syntax_errors(&["Statement"]),
            vec![(0, 8, "x=a-b+c;".to_string())]
        );
    }

    #[test]
    fn test_recovery_spans() {
        let grm = grammar_from_str("S <- ('x' / 'y')+;").unwrap();
        let memo = parse(&grm, "xxzzyy");
        assert_eq!(memo.syntax_errors(&["S"]), vec![(2, 4, "zz".to_string())]);
    }

    #[test]
    fn test_comments_and_escapes() {
        let src = "# a grammar of little substance\n\
                   S <- \"a\\n\" / '\\t' / [\\]x]; # or else\n";
        let grm = grammar_from_str(src).unwrap();
        for (input, len) in &[("a\n", 2), ("\t", 1), ("]", 1), ("x", 1)] {
            let memo = parse(&grm, input);
            assert_eq!(
                memo.to_ast("S").map(|a| a.len()),
                Some(*len),
                "on {:?}",
                input
            );
        }
    }

    #[test]
    fn test_ignore_case_suffix() {
        let grm = grammar_from_str("S <- \"select\"i;").unwrap();
        let memo = parse(&grm, "SELECT");
        assert_eq!(memo.to_ast("S").unwrap().len(), 6);
    }

    #[test]
    fn test_precedence_surface() {
        let src = "E[0,L] <- E '+' E;\nE[1] <- [0-9]+ / '(' E ')';\n";
        let grm = grammar_from_str(src).unwrap();

        let memo = parse(&grm, "1+2+3");
        let key = MemoKey {
            cidx: grm.rule_clause(grm.rule_idx("E").unwrap()),
            start: 0
        };
        let top = memo.best_match(key).unwrap();
        assert_eq!(top.len(), 5);
        // Left associativity: (1+2)+3.
        assert_eq!(top.sub_matches()[0].sub_matches()[0].len(), 3);

        let memo = parse(&grm, "(1+2)");
        assert_eq!(memo.best_match(key).unwrap().len(), 5);
    }

    #[test]
    fn test_errors() {
        match grammar_from_str("R <- R;") {
            Err(GrammarFromStrError::Grammar(PegGrammarError::InvalidClauseComposition(_))) => (),
            r => panic!("{:?}", r)
        }
        match grammar_from_str("R <- Q;") {
            Err(GrammarFromStrError::Grammar(PegGrammarError::UnresolvedRule(ref n)))
                if n == "Q" => (),
            r => panic!("{:?}", r)
        }
        match grammar_from_str("R <- ;") {
            Err(GrammarFromStrError::Syntax(ref spans)) if !spans.is_empty() => (),
            r => panic!("{:?}", r)
        }
        match grammar_from_str("") {
            Err(GrammarFromStrError::Syntax(_)) => (),
            r => panic!("{:?}", r)
        }
    }

    #[test]
    fn test_round_trip() {
        // Re-parsing a prepared grammar's rendering yields a structurally identical grammar,
        // for which an equal rendering is a faithful proxy.
        let srcs = &[
            "A <- \"a\" S;\nS <- ('x' / 'y')+;\n",
            "Top <- v:[a-z]+ '=' E &';' / ();\nE <- sum:(E op:'+' [0-9]+) / [0-9]+;\n",
            "S <- !\"end\"i [A-Za-z_]+ / '\\n'+ / [\\-x0-9];\n",
        ];
        for src in srcs {
            let pp1 = grammar_from_str(src).unwrap().pp();
            let pp2 = grammar_from_str(&pp1).unwrap().pp();
            assert_eq!(pp1, pp2, "via {}", src);
        }
    }
}
