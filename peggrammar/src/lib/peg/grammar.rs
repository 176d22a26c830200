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

use std::fmt::Debug;
use std::hash::Hash;

use indexmap::IndexMap;
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use idxnewtype::{CIdx, RIdx};
use peg::prepare::prepare;
use peg::{CharSet, PegGrammarError, Precedence, Rule};

/// One subclause position of a prepared clause: the index of the subclause, plus the AST label
/// attached to this position, if any.
#[derive(Clone, Debug)]
pub struct SubClause<StorageT> {
    pub cidx: CIdx<StorageT>,
    pub label: Option<String>
}

/// The operator a prepared clause matches with. Rule references and labels have no kind: both
/// are resolved away during preparation.
#[derive(Clone, Debug)]
pub enum ClauseKind {
    /// Match one character against a set.
    CharSet(CharSet),
    /// Match a literal string.
    CharSeq { s: String, ignore_case: bool },
    /// Match zero characters at the start of the input.
    Start,
    /// Always match, consuming nothing.
    Nothing,
    /// Match every subclause contiguously.
    Seq,
    /// Ordered choice.
    First,
    /// One or more repetitions of the single subclause.
    OneOrMore,
    /// Zero-width positive lookahead.
    FollowedBy,
    /// Zero-width negative lookahead.
    NotFollowedBy
}

impl ClauseKind {
    pub fn is_terminal(&self) -> bool {
        match *self {
            ClauseKind::CharSet(_)
            | ClauseKind::CharSeq { .. }
            | ClauseKind::Start
            | ClauseKind::Nothing => true,
            _ => false
        }
    }
}

/// One node of a prepared grammar's clause graph.
#[derive(Clone, Debug)]
pub struct Clause<StorageT> {
    pub(crate) kind: ClauseKind,
    pub(crate) sub: Vec<SubClause<StorageT>>,
    pub(crate) expr: String,
    pub(crate) can_match_zero: bool,
    pub(crate) seed_parents: Vec<CIdx<StorageT>>,
    pub(crate) rules: Vec<RIdx<StorageT>>
}

impl<StorageT> Clause<StorageT> {
    pub fn kind(&self) -> &ClauseKind {
        &self.kind
    }

    pub fn sub_clauses(&self) -> &[SubClause<StorageT>] {
        &self.sub
    }

    /// The canonical textual rendering of this clause. Two clauses of one grammar render equally
    /// iff they are the same clause.
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// Can this clause match without consuming any input?
    pub fn can_match_zero(&self) -> bool {
        self.can_match_zero
    }

    /// The clauses which must be re-tried at position `i` whenever this clause newly matches at
    /// `i`.
    pub fn seed_parents(&self) -> &[CIdx<StorageT>] {
        &self.seed_parents
    }

    /// The rules whose top-level clause this is (more than one after deduplication).
    pub fn rules(&self) -> &[RIdx<StorageT>] {
        &self.rules
    }
}

#[derive(Clone, Debug)]
pub(crate) struct RuleInfo<StorageT> {
    pub(crate) name: String,
    pub(crate) cidx: CIdx<StorageT>,
    pub(crate) label: Option<String>,
    pub(crate) prec: Option<Precedence>
}

/// A prepared grammar: the interned clause graph in reverse topological order, the rules which
/// name into it, and the set of clauses which seed bottom-up matching. Immutable once
/// constructed, and safe to share between threads.
#[derive(Clone, Debug)]
pub struct PegGrammar<StorageT> {
    pub(crate) clauses: Vec<Clause<StorageT>>,
    /// Rules, sorted by name (stable for printing).
    pub(crate) rules: Vec<RuleInfo<StorageT>>,
    /// Rule name -> rule. Also maps the bare name of a precedence group to its lowest level.
    pub(crate) rule_map: IndexMap<String, RIdx<StorageT>>,
    /// Terminals plus clauses which can match zero characters, in ascending index order.
    pub(crate) start_seeds: Vec<CIdx<StorageT>>
}

impl PegGrammar<u32> {
    /// Prepare `rules` into a grammar, using `u32` for clause and rule indices.
    pub fn new(rules: &[Rule]) -> Result<PegGrammar<u32>, PegGrammarError> {
        PegGrammar::new_with_storaget(rules)
    }
}

impl<StorageT: 'static + Debug + Hash + PrimInt + Unsigned> PegGrammar<StorageT>
where
    usize: AsPrimitive<StorageT>
{
    /// Prepare `rules` into a grammar, resolving references and labels, rewriting precedence
    /// groups, interning and topologically ordering clauses, and computing the attributes which
    /// bottom-up matching needs.
    pub fn new_with_storaget(rules: &[Rule]) -> Result<PegGrammar<StorageT>, PegGrammarError> {
        prepare(rules)
    }

    /// How many clauses does this grammar have?
    pub fn clauses_len(&self) -> CIdx<StorageT> {
        CIdx::from_usize(self.clauses.len())
    }

    /// Return an iterator which produces (in ascending, i.e. reverse topological, order) all
    /// this grammar's valid `CIdx`s.
    pub fn iter_cidxs(&self) -> impl Iterator<Item = CIdx<StorageT>> {
        (0..self.clauses.len()).map(|i| CIdx::from_usize(i))
    }

    /// Return the clause with index `cidx`. Panics if `cidx` does not belong to this grammar.
    pub fn clause(&self, cidx: CIdx<StorageT>) -> &Clause<StorageT> {
        &self.clauses[usize::from(cidx)]
    }

    /// The canonical rendering of clause `cidx`.
    pub fn clause_expr(&self, cidx: CIdx<StorageT>) -> &str {
        &self.clauses[usize::from(cidx)].expr
    }

    /// How many rules does this grammar have?
    pub fn rules_len(&self) -> RIdx<StorageT> {
        RIdx::from_usize(self.rules.len())
    }

    /// Map a rule name to its index, if the name is defined. The bare name of a precedence group
    /// maps to the group's lowest level.
    pub fn rule_idx(&self, name: &str) -> Option<RIdx<StorageT>> {
        self.rule_map.get(name).cloned()
    }

    pub fn rule_name(&self, ridx: RIdx<StorageT>) -> &str {
        &self.rules[usize::from(ridx)].name
    }

    /// The clause a rule resolves to.
    pub fn rule_clause(&self, ridx: RIdx<StorageT>) -> CIdx<StorageT> {
        self.rules[usize::from(ridx)].cidx
    }

    /// The AST label attached to the top level of a rule, if any.
    pub fn rule_label(&self, ridx: RIdx<StorageT>) -> Option<&str> {
        match self.rules[usize::from(ridx)].label {
            Some(ref l) => Some(l),
            None => None
        }
    }

    pub fn rule_prec(&self, ridx: RIdx<StorageT>) -> Option<Precedence> {
        self.rules[usize::from(ridx)].prec
    }

    /// The clauses tried at every input position when a parse starts: the terminals, plus every
    /// clause which can match zero characters.
    pub fn start_seeds(&self) -> &[CIdx<StorageT>] {
        &self.start_seeds
    }

    /// Render the whole grammar, one rule per line, rules sorted by name. For grammars which
    /// stay within the surface syntax this rendering can be parsed back into an equivalent
    /// grammar.
    pub fn pp(&self) -> String {
        let mut out = String::new();
        for ri in &self.rules {
            out.push_str(&format!(
                "{} <- {};\n",
                ri.name,
                self.clauses[usize::from(ri.cidx)].expr
            ));
        }
        out
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use idxnewtype::CIdx;
    use peg::ast::*;
    use peg::{AssocKind, PegGrammarError, Precedence, Rule};
    use super::{ClauseKind, PegGrammar};

    fn find_clause(grm: &PegGrammar<u32>, expr: &str) -> CIdx<u32> {
        for cidx in grm.iter_cidxs() {
            if grm.clause_expr(cidx) == expr {
                return cidx;
            }
        }
        panic!("no clause '{}' in:\n{}", expr, grm.pp());
    }

    #[test]
    fn test_interning_dedups() {
        let grm = PegGrammar::new(&[Rule::new(
            "A",
            first(vec![
                seq(vec![str_lit("x"), str_lit("y")]),
                seq(vec![str_lit("x"), str_lit("y")]),
            ])
        )])
        .unwrap();
        let top = grm.clause(grm.rule_clause(grm.rule_idx("A").unwrap()));
        assert_eq!(top.sub_clauses().len(), 2);
        assert_eq!(top.sub_clauses()[0].cidx, top.sub_clauses()[1].cidx);
        // No two clauses render equally (identity == structural equality).
        let mut exprs = HashSet::new();
        for cidx in grm.iter_cidxs() {
            assert!(exprs.insert(grm.clause_expr(cidx).to_string()));
        }
        assert_eq!(exprs.len(), usize::from(grm.clauses_len()));
    }

    #[test]
    fn test_reverse_topological_order() {
        let grm = PegGrammar::new(&[
            Rule::new("S", seq(vec![rule_ref("A"), rule_ref("B")])),
            Rule::new("A", one_or_more(char_range('a', 'z'))),
            Rule::new("B", first(vec![rule_ref("A"), str_lit("0")])),
        ])
        .unwrap();
        for cidx in grm.iter_cidxs() {
            for sub in grm.clause(cidx).sub_clauses() {
                assert!(
                    usize::from(sub.cidx) < usize::from(cidx),
                    "{} !< {}",
                    grm.clause_expr(sub.cidx),
                    grm.clause_expr(cidx)
                );
            }
        }
        // Terminals come first.
        let mut seen_nonterminal = false;
        for cidx in grm.iter_cidxs() {
            if grm.clause(cidx).kind().is_terminal() {
                assert!(!seen_nonterminal);
            } else {
                seen_nonterminal = true;
            }
        }
    }

    #[test]
    fn test_can_match_zero() {
        let grm = PegGrammar::new(&[Rule::new(
            "S",
            seq(vec![optional(ch('a')), not_followed_by(ch('b'))])
        )])
        .unwrap();
        assert!(grm.clause(find_clause(&grm, "'a' / ()")).can_match_zero());
        assert!(grm.clause(find_clause(&grm, "!'b'")).can_match_zero());
        assert!(grm.clause(find_clause(&grm, "()")).can_match_zero());
        assert!(!grm.clause(find_clause(&grm, "'a'")).can_match_zero());
        // The whole sequence is nullable because each of its parts is.
        assert!(grm
            .clause(grm.rule_clause(grm.rule_idx("S").unwrap()))
            .can_match_zero());
    }

    #[test]
    fn test_seed_parents() {
        let grm = PegGrammar::new(&[Rule::new(
            "S",
            seq(vec![optional(ch('a')), ch('b'), ch('c')])
        )])
        .unwrap();
        let top = grm.rule_clause(grm.rule_idx("S").unwrap());
        // A nullable first subclause means the second also seeds the sequence, but the third
        // (shadowed by the non-nullable 'b') does not.
        assert!(grm
            .clause(find_clause(&grm, "'a' / ()"))
            .seed_parents()
            .contains(&top));
        assert!(grm
            .clause(find_clause(&grm, "'b'"))
            .seed_parents()
            .contains(&top));
        assert!(!grm
            .clause(find_clause(&grm, "'c'"))
            .seed_parents()
            .contains(&top));
        // Both alternatives seed an ordered choice.
        let fst = find_clause(&grm, "'a' / ()");
        assert!(grm.clause(find_clause(&grm, "'a'")).seed_parents().contains(&fst));
        assert!(grm.clause(find_clause(&grm, "()")).seed_parents().contains(&fst));
    }

    #[test]
    fn test_start_seeds() {
        let grm = PegGrammar::new(&[Rule::new(
            "S",
            seq(vec![optional(ch('a')), ch('b')])
        )])
        .unwrap();
        let seeds = grm.start_seeds();
        assert!(seeds.contains(&find_clause(&grm, "'a'")));
        assert!(seeds.contains(&find_clause(&grm, "'b'")));
        assert!(seeds.contains(&find_clause(&grm, "()")));
        // Nullable non-terminals seed too.
        assert!(seeds.contains(&find_clause(&grm, "'a' / ()")));
        // The sequence itself is not nullable and not a terminal.
        let top = grm.rule_clause(grm.rule_idx("S").unwrap());
        assert!(!seeds.contains(&top));
        // Seeds are in ascending clause order.
        for w in seeds.windows(2) {
            assert!(usize::from(w[0]) < usize::from(w[1]));
        }
    }

    #[test]
    fn test_unresolved_rule() {
        match PegGrammar::new(&[Rule::new("R", rule_ref("Q"))]) {
            Err(PegGrammarError::UnresolvedRule(ref n)) if n == "Q" => (),
            r => panic!("{:?}", r)
        }
    }

    #[test]
    fn test_duplicate_rule() {
        let rules = [
            Rule::new("R", ch('a')),
            Rule::new("R", ch('b')),
        ];
        match PegGrammar::new(&rules) {
            Err(PegGrammarError::DuplicateRule(ref n)) if n == "R" => (),
            r => panic!("{:?}", r)
        }
    }

    #[test]
    fn test_self_reference_cycle() {
        match PegGrammar::new(&[Rule::new("R", rule_ref("R"))]) {
            Err(PegGrammarError::InvalidClauseComposition(_)) => (),
            r => panic!("{:?}", r)
        }
        let rules = [
            Rule::new("R", rule_ref("S")),
            Rule::new("S", rule_ref("R")),
        ];
        match PegGrammar::new(&rules) {
            Err(PegGrammarError::InvalidClauseComposition(_)) => (),
            r => panic!("{:?}", r)
        }
    }

    #[test]
    fn test_inconsistent_precedence_group() {
        let rules = [
            Rule::new_prec(
                "R",
                Precedence {
                    level: 0,
                    kind: AssocKind::Left
                },
                ch('a')
            ),
            Rule::new("R", ch('b')),
        ];
        match PegGrammar::new(&rules) {
            Err(PegGrammarError::PrecedenceGroupInconsistent(ref n)) if n == "R" => (),
            r => panic!("{:?}", r)
        }
    }

    #[test]
    fn test_precedence_rewrite_left_assoc() {
        let rules = [
            Rule::new_prec(
                "E",
                Precedence {
                    level: 0,
                    kind: AssocKind::Left
                },
                seq(vec![rule_ref("E"), ch('+'), rule_ref("E")])
            ),
            Rule::new_prec(
                "E",
                Precedence {
                    level: 1,
                    kind: AssocKind::Left
                },
                seq(vec![rule_ref("E"), ch('*'), rule_ref("E")])
            ),
            Rule::new_prec(
                "E",
                Precedence {
                    level: 2,
                    kind: AssocKind::Nonassoc
                },
                first(vec![
                    one_or_more(char_range('0', '9')),
                    seq(vec![ch('('), rule_ref("E"), ch(')')]),
                ])
            ),
        ];
        let grm = PegGrammar::new(&rules).unwrap();
        // The leftmost self-reference of a left-associative level keeps its level; the rest move
        // one level up. Every level but the highest falls through to the next level up; the
        // highest falls back to the lowest, and its internal self-references wrap around to it.
        assert_eq!(
            grm.clause_expr(grm.rule_clause(grm.rule_idx("E[0]").unwrap())),
            "E[0] '+' E[1] / E[1]"
        );
        assert_eq!(
            grm.clause_expr(grm.rule_clause(grm.rule_idx("E[1]").unwrap())),
            "E[1] '*' E[2] / E[2]"
        );
        assert_eq!(
            grm.clause_expr(grm.rule_clause(grm.rule_idx("E[2]").unwrap())),
            "([0-9]+ / '(' E[0] ')') / E[0]"
        );
        // The bare name aliases to the lowest level.
        assert_eq!(grm.rule_idx("E"), grm.rule_idx("E[0]"));
    }

    #[test]
    fn test_precedence_rewrite_right_assoc() {
        let rules = [
            Rule::new_prec(
                "X",
                Precedence {
                    level: 0,
                    kind: AssocKind::Right
                },
                seq(vec![rule_ref("X"), ch('~'), rule_ref("X")])
            ),
            Rule::new_prec(
                "X",
                Precedence {
                    level: 1,
                    kind: AssocKind::Nonassoc
                },
                char_range('a', 'z')
            ),
        ];
        let grm = PegGrammar::new(&rules).unwrap();
        assert_eq!(
            grm.clause_expr(grm.rule_clause(grm.rule_idx("X[0]").unwrap())),
            "X[1] '~' X[0] / X[1]"
        );
        assert_eq!(
            grm.clause_expr(grm.rule_clause(grm.rule_idx("X[1]").unwrap())),
            "[a-z] / X[0]"
        );
    }

    #[test]
    fn test_rule_label_lift() {
        let rules = [
            Rule::new("R", label("lbl", ch('a'))),
            Rule::new("S", rule_ref("R")),
        ];
        let grm = PegGrammar::new(&rules).unwrap();
        let r = grm.rule_idx("R").unwrap();
        assert_eq!(grm.rule_label(r), Some("lbl"));
        assert_eq!(grm.clause_expr(grm.rule_clause(r)), "'a'");
        // A rule defined purely as a reference inherits the referent's label and clause.
        let s = grm.rule_idx("S").unwrap();
        assert_eq!(grm.rule_label(s), Some("lbl"));
        assert_eq!(grm.rule_clause(s), grm.rule_clause(r));
    }

    #[test]
    fn test_rules_backlink() {
        let rules = [
            Rule::new("A", str_lit("x")),
            Rule::new("B", str_lit("x")),
        ];
        let grm = PegGrammar::new(&rules).unwrap();
        let a = grm.rule_idx("A").unwrap();
        let b = grm.rule_idx("B").unwrap();
        assert_eq!(grm.rule_clause(a), grm.rule_clause(b));
        let owners = grm.clause(grm.rule_clause(a)).rules();
        assert!(owners.contains(&a) && owners.contains(&b));
    }

    #[test]
    fn test_pp() {
        let grm = PegGrammar::new(&[
            Rule::new("S", one_or_more(first(vec![ch('x'), ch('y')]))),
            Rule::new("A", seq(vec![str_lit("a"), rule_ref("S")])),
        ])
        .unwrap();
        // Rule references keep their symbolic rendering, so the output stays re-parseable.
        assert_eq!(grm.pp(), "A <- \"a\" S;\nS <- ('x' / 'y')+;\n");
    }

    #[test]
    fn test_small_storaget() {
        let grm = PegGrammar::<u8>::new_with_storaget(&[Rule::new(
            "S",
            seq(vec![ch('a'), ch('b')])
        )])
        .unwrap();
        assert!(usize::from(grm.clauses_len()) < 256);
        match grm.clause(grm.rule_clause(grm.rule_idx("S").unwrap())).kind() {
            &ClauseKind::Seq => (),
            k => panic!("{:?}", k)
        }
    }
}
