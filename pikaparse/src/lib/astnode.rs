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

//! Project a match tree down to an abstract syntax tree. Only labels give rise to AST nodes:
//! a labelled submatch becomes a child, while an unlabelled one is transparent, contributing its
//! own labelled descendants to the nearest labelled ancestor. Wrapping a clause in an unlabelled
//! rule therefore leaves the AST unchanged.

use std::fmt::Debug;
use std::hash::Hash;

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use peggrammar::peg::{ClauseKind, PegGrammar, SubClause};
use peggrammar::CIdx;

use memotable::{Match, MemoKey, MemoTable};

/// One node of an abstract syntax tree. A node borrows its label from the grammar and its text
/// from the input; both must outlive it.
#[derive(Debug)]
pub struct ASTNode<'a, 'b, StorageT> {
    label: &'a str,
    cidx: CIdx<StorageT>,
    start: usize,
    len: usize,
    input: &'b str,
    children: Vec<ASTNode<'a, 'b, StorageT>>
}

impl<'a, 'b, StorageT: Copy> ASTNode<'a, 'b, StorageT> {
    pub fn label(&self) -> &'a str {
        self.label
    }

    /// The clause this node's match was made by.
    pub fn cidx(&self) -> CIdx<StorageT> {
        self.cidx
    }

    /// The start of this node's span, in code points.
    pub fn start(&self) -> usize {
        self.start
    }

    /// The length of this node's span, in code points.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn children(&self) -> &[ASTNode<'a, 'b, StorageT>] {
        &self.children
    }

    /// The `i`th child. Panics if there is no such child: asking for a child a grammar cannot
    /// produce is a programmer error.
    pub fn child(&self, i: usize) -> &ASTNode<'a, 'b, StorageT> {
        &self.children[i]
    }

    /// The input text this node spans.
    pub fn text(&self) -> String {
        self.input
            .chars()
            .skip(self.start)
            .take(self.len)
            .collect()
    }

    /// Render the tree, one node per line, children indented below their parent; leaves also
    /// show their text.
    pub fn pp(&self) -> String {
        let mut out = String::new();
        self.pp_rec(0, &mut out);
        out
    }

    fn pp_rec(&self, indent: usize, out: &mut String) {
        for _ in 0..indent {
            out.push(' ');
        }
        out.push_str(self.label);
        if self.children.is_empty() {
            out.push(' ');
            out.push_str(&self.text());
        }
        out.push('\n');
        for c in &self.children {
            c.pp_rec(indent + 1, out);
        }
    }
}

impl<'a, 'b, StorageT: 'static + Debug + Hash + PrimInt + Unsigned> MemoTable<'a, 'b, StorageT>
where
    usize: AsPrimitive<StorageT>
{
    /// Project the match of `rule` at position 0 into an AST, if there is one. The root node
    /// takes the rule's label if it has one, and the rule's name otherwise. Whether the match
    /// spans the whole input is for the caller to decide (compare
    /// [`input_len`](#method.input_len) with the root's `len`).
    pub fn to_ast(&self, rule: &str) -> Option<ASTNode<'a, 'b, StorageT>> {
        let grm = self.grammar();
        let ridx = grm.rule_idx(rule)?;
        let cidx = grm.rule_clause(ridx);
        let m = self.lookup_best_match(MemoKey { cidx, start: 0 })?;
        let label = match grm.rule_label(ridx) {
            Some(l) => l,
            None => grm.rule_name(ridx)
        };
        Some(make_node(grm, self.input(), label, &m))
    }
}

fn make_node<'a, 'b, StorageT: 'static + Debug + Hash + PrimInt + Unsigned>(
    grm: &'a PegGrammar<StorageT>,
    input: &'b str,
    label: &'a str,
    m: &Match<StorageT>
) -> ASTNode<'a, 'b, StorageT>
where
    usize: AsPrimitive<StorageT>
{
    let mut node = ASTNode {
        label,
        cidx: m.key().cidx,
        start: m.key().start,
        len: m.len(),
        input,
        children: Vec::new()
    };
    add_children(grm, input, &mut node.children, m);
    node
}

fn add_children<'a, 'b, StorageT: 'static + Debug + Hash + PrimInt + Unsigned>(
    grm: &'a PegGrammar<StorageT>,
    input: &'b str,
    out: &mut Vec<ASTNode<'a, 'b, StorageT>>,
    m: &Match<StorageT>
) where
    usize: AsPrimitive<StorageT>
{
    let clause = grm.clause(m.key().cidx);
    match *clause.kind() {
        ClauseKind::OneOrMore => {
            // Repetitions are stored right-recursively; flatten the chain so that each element
            // hangs off this node directly.
            let mut cur = m;
            loop {
                if cur.sub_matches().is_empty() {
                    break;
                }
                attach(grm, input, out, &clause.sub_clauses()[0], &cur.sub_matches()[0]);
                if cur.sub_matches().len() == 2 {
                    cur = &*cur.sub_matches()[1];
                } else {
                    break;
                }
            }
        }
        ClauseKind::First => {
            if !m.sub_matches().is_empty() {
                attach(
                    grm,
                    input,
                    out,
                    &clause.sub_clauses()[m.first_matching_sub_idx()],
                    &m.sub_matches()[0]
                );
            }
        }
        ClauseKind::Seq | ClauseKind::FollowedBy => {
            for (s, sm) in clause.sub_clauses().iter().zip(m.sub_matches()) {
                attach(grm, input, out, s, sm);
            }
        }
        _ => ()
    }
}

fn attach<'a, 'b, StorageT: 'static + Debug + Hash + PrimInt + Unsigned>(
    grm: &'a PegGrammar<StorageT>,
    input: &'b str,
    out: &mut Vec<ASTNode<'a, 'b, StorageT>>,
    slot: &'a SubClause<StorageT>,
    m: &Match<StorageT>
) where
    usize: AsPrimitive<StorageT>
{
    match slot.label {
        Some(ref l) => out.push(make_node(grm, input, l, m)),
        None => add_children(grm, input, out, m)
    }
}

#[cfg(test)]
mod test {
    use peggrammar::peg::ast::*;
    use peggrammar::peg::{PegGrammar, Rule};

    use parser::parse;

    fn statement_rules(wrap_e: bool) -> Vec<Rule> {
        // Program <- Statement+; Statement <- stmt:(var:[a-z]+ '=' E ';');
        // E <- sum:(E op:'+' N) / N; N <- num:[0-9]+;
        let e_ref = if wrap_e { "W" } else { "E" };
        let mut rules = vec![
            Rule::new("Program", one_or_more(rule_ref("Statement"))),
            Rule::new(
                "Statement",
                label(
                    "stmt",
                    seq(vec![
                        label("var", one_or_more(char_range('a', 'z'))),
                        ch('='),
                        rule_ref(e_ref),
                        ch(';'),
                    ])
                )
            ),
            Rule::new(
                "E",
                first(vec![
                    label(
                        "sum",
                        seq(vec![rule_ref("E"), label("op", ch('+')), rule_ref("N")])
                    ),
                    rule_ref("N"),
                ])
            ),
            Rule::new("N", label("num", one_or_more(char_range('0', '9')))),
        ];
        if wrap_e {
            // An unlabelled wrapper rule (a real clause, not just an alias) around E;
            // projection must not notice it.
            rules.push(Rule::new("W", seq(vec![rule_ref("E"), nothing()])));
        }
        rules
    }

    #[test]
    fn test_projection() {
        let grm = PegGrammar::new(&statement_rules(false)).unwrap();
        let memo = parse(&grm, "x=1+2+3;");
        let ast = memo.to_ast("Program").unwrap();
        assert_eq!(ast.len(), memo.input_len());
        assert_eq!(ast.label(), "Program");
        assert_eq!(ast.children().len(), 1);
        // The repetition's subclause position has no label of its own, so it inherits the
        // referent rule's.
        let stmt = ast.child(0);
        assert_eq!(stmt.label(), "stmt");
        assert_eq!(stmt.children().len(), 2);
        assert_eq!(stmt.child(0).label(), "var");
        assert_eq!(stmt.child(0).text(), "x");
        // The expression is left-nested: ((1+2)+3).
        let sum = stmt.child(1);
        assert_eq!(sum.label(), "sum");
        assert_eq!(sum.text(), "1+2+3");
        assert_eq!(
            sum.children()
                .iter()
                .map(|c| c.label())
                .collect::<Vec<_>>(),
            vec!["sum", "op", "num"]
        );
        let inner = sum.child(0);
        assert_eq!(inner.text(), "1+2");
        assert_eq!(
            inner
                .children()
                .iter()
                .map(|c| c.label())
                .collect::<Vec<_>>(),
            vec!["num", "op", "num"]
        );
        assert_eq!(inner.child(0).text(), "1");
        assert_eq!(sum.child(2).text(), "3");
    }

    #[test]
    fn test_unlabelled_wrapper_is_transparent() {
        let with = PegGrammar::new(&statement_rules(true)).unwrap();
        let without = PegGrammar::new(&statement_rules(false)).unwrap();
        let m1 = parse(&with, "x=1+2+3;");
        let m2 = parse(&without, "x=1+2+3;");
        assert_eq!(m1.to_ast("Program").unwrap().pp(), m2.to_ast("Program").unwrap().pp());
    }

    #[test]
    fn test_repetition_flattening() {
        let grm = PegGrammar::new(&[Rule::new(
            "S",
            one_or_more(label("c", first(vec![ch('x'), ch('y')])))
        )])
        .unwrap();
        let memo = parse(&grm, "xyx");
        let ast = memo.to_ast("S").unwrap();
        assert_eq!(ast.children().len(), 3);
        assert_eq!(
            ast.children().iter().map(|c| c.text()).collect::<Vec<_>>(),
            vec!["x", "y", "x"]
        );
    }

    #[test]
    fn test_rule_label_as_root() {
        let grm = PegGrammar::new(&[Rule::new("S", label("top", ch('a')))]).unwrap();
        let memo = parse(&grm, "a");
        let ast = memo.to_ast("S").unwrap();
        assert_eq!(ast.label(), "top");
        assert!(ast.children().is_empty());
        assert_eq!(ast.text(), "a");
    }
}
