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

//! The matching engine. A parse seeds a priority queue with every terminal (and every clause
//! which can match zero characters) at every input position, then drains the queue in priority
//! order: rightmost positions first and, within a position, subclauses before the clauses built
//! over them. Whenever a key's match improves, the clause's seed parents are re-queued at the
//! same position. Since every match a clause needs lies at its own position or to the right of
//! it, everything it looks up is already final -- which is why left-recursive grammars need no
//! special handling here.

use std::collections::BinaryHeap;
use std::fmt::Debug;
use std::hash::Hash;

use num_traits::{AsPrimitive, PrimInt, Unsigned};
use peggrammar::peg::{ClauseKind, PegGrammar};

use memotable::{Match, MemoKey, MemoTable};

/// Per-parse options ([`parse`](fn.parse.html) uses the defaults).
pub struct ParseOpts {
    /// Report every queue step on stderr.
    pub trace: bool
}

impl Default for ParseOpts {
    fn default() -> ParseOpts {
        ParseOpts { trace: false }
    }
}

/// Parse `input` with `grm`, returning the filled memo table. The parse accepted the whole
/// input iff the match for `(grm.rule_clause(r), 0)` of some intended start rule `r` has the
/// input's length.
pub fn parse<'a, 'b, StorageT: 'static + Debug + Hash + PrimInt + Unsigned>(
    grm: &'a PegGrammar<StorageT>,
    input: &'b str
) -> MemoTable<'a, 'b, StorageT>
where
    usize: AsPrimitive<StorageT>
{
    parse_opts(grm, input, ParseOpts::default())
}

pub fn parse_opts<'a, 'b, StorageT: 'static + Debug + Hash + PrimInt + Unsigned>(
    grm: &'a PegGrammar<StorageT>,
    input: &'b str,
    opts: ParseOpts
) -> MemoTable<'a, 'b, StorageT>
where
    usize: AsPrimitive<StorageT>
{
    let mut memo = MemoTable::new(grm, input);
    let mut queue = BinaryHeap::with_capacity(memo.input_len() * grm.start_seeds().len());
    for start in (0..memo.input_len()).rev() {
        for &cidx in grm.start_seeds() {
            queue.push(MemoKey { cidx, start });
        }
    }
    while let Some(key) = queue.pop() {
        let new = try_match(key, &memo);
        if opts.trace {
            trace_step(grm, key, &new);
        }
        if let Some(m) = new {
            if memo.set_best_match(m) {
                for &parent in grm.clause(key.cidx).seed_parents() {
                    queue.push(MemoKey {
                        cidx: parent,
                        start: key.start
                    });
                }
            }
        }
    }
    memo
}

fn trace_step<StorageT: 'static + Debug + Hash + PrimInt + Unsigned>(
    grm: &PegGrammar<StorageT>,
    key: MemoKey<StorageT>,
    new: &Option<Match<StorageT>>
) where
    usize: AsPrimitive<StorageT>
{
    let names = grm
        .clause(key.cidx)
        .rules()
        .iter()
        .map(|&ridx| grm.rule_name(ridx))
        .collect::<Vec<_>>()
        .join(",");
    let what = if names.is_empty() {
        grm.clause_expr(key.cidx).to_string()
    } else {
        format!("{} <- {}", names, grm.clause_expr(key.cidx))
    };
    match *new {
        Some(ref m) => eprintln!("pika: {:>4} len {:>3}  {}", key.start, m.len(), what),
        None => eprintln!("pika: {:>4} fail     {}", key.start, what)
    }
}

/// Compute the match for `key` from the table's current contents. Returns `None` on mismatch;
/// nothing is ever stored for a mismatch.
pub(crate) fn try_match<StorageT: 'static + Debug + Hash + PrimInt + Unsigned>(
    key: MemoKey<StorageT>,
    memo: &MemoTable<StorageT>
) -> Option<Match<StorageT>>
where
    usize: AsPrimitive<StorageT>
{
    let grm = memo.grammar();
    let clause = grm.clause(key.cidx);
    match *clause.kind() {
        ClauseKind::CharSet(ref cs) => match memo.chars().get(key.start) {
            Some(&c) if cs.matches(c) => Some(Match::terminal(key, 1)),
            _ => None
        },
        ClauseKind::CharSeq { ref s, ignore_case } => {
            let chars = memo.chars();
            let mut pos = key.start;
            for sc in s.chars() {
                let c = match chars.get(pos) {
                    Some(&c) => c,
                    None => return None
                };
                let eq = if ignore_case {
                    c.to_lowercase().eq(sc.to_lowercase())
                } else {
                    c == sc
                };
                if !eq {
                    return None;
                }
                pos += 1;
            }
            Some(Match::terminal(key, pos - key.start))
        }
        ClauseKind::Start => {
            if key.start == 0 {
                Some(Match::empty(key))
            } else {
                None
            }
        }
        ClauseKind::Nothing => Some(Match::empty(key)),
        ClauseKind::Seq => {
            let mut pos = key.start;
            let mut sub = Vec::with_capacity(clause.sub_clauses().len());
            for s in clause.sub_clauses() {
                match memo.lookup_best_match(MemoKey {
                    cidx: s.cidx,
                    start: pos
                }) {
                    Some(m) => {
                        pos += m.len();
                        sub.push(m);
                    }
                    None => return None
                }
            }
            Some(Match::new(key, pos - key.start, sub))
        }
        ClauseKind::First => {
            for (i, s) in clause.sub_clauses().iter().enumerate() {
                if let Some(m) = memo.lookup_best_match(MemoKey {
                    cidx: s.cidx,
                    start: key.start
                }) {
                    return Some(Match::first_alt(key, i, m));
                }
            }
            None
        }
        ClauseKind::OneOrMore => {
            let sub = &clause.sub_clauses()[0];
            let head = memo.lookup_best_match(MemoKey {
                cidx: sub.cidx,
                start: key.start
            })?;
            // Repetition is encoded right-recursively: the tail, if there is one, is this very
            // clause at the position after the head. That keeps the table linear in the input
            // for repetitions instead of quadratic.
            match memo.lookup_best_match(MemoKey {
                cidx: key.cidx,
                start: key.start + head.len()
            }) {
                Some(tail) => {
                    let len = head.len() + tail.len();
                    Some(Match::new(key, len, vec![head, tail]))
                }
                None => {
                    let len = head.len();
                    Some(Match::new(key, len, vec![head]))
                }
            }
        }
        ClauseKind::FollowedBy => memo
            .lookup_best_match(MemoKey {
                cidx: clause.sub_clauses()[0].cidx,
                start: key.start
            })
            .map(|m| Match::new(key, 0, vec![m])),
        ClauseKind::NotFollowedBy => {
            match memo.lookup_best_match(MemoKey {
                cidx: clause.sub_clauses()[0].cidx,
                start: key.start
            }) {
                Some(_) => None,
                None => Some(Match::empty(key))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use peggrammar::peg::ast::*;
    use peggrammar::peg::{PegGrammar, Rule};

    use memotable::MemoKey;
    use super::parse;

    fn top_key(grm: &PegGrammar<u32>, rule: &str, start: usize) -> MemoKey<u32> {
        MemoKey {
            cidx: grm.rule_clause(grm.rule_idx(rule).unwrap()),
            start
        }
    }

    #[test]
    fn test_terminals() {
        let grm = PegGrammar::new(&[Rule::new(
            "S",
            seq(vec![str_lit("ab"), char_range('0', '9')])
        )])
        .unwrap();
        let memo = parse(&grm, "ab7");
        assert_eq!(memo.best_match(top_key(&grm, "S", 0)).unwrap().len(), 3);
        assert!(memo.best_match(top_key(&grm, "S", 1)).is_none());
        let memo = parse(&grm, "ab");
        assert!(memo.best_match(top_key(&grm, "S", 0)).is_none());
    }

    #[test]
    fn test_ignore_case() {
        let grm = PegGrammar::new(&[Rule::new("S", str_lit_ci("select"))]).unwrap();
        let memo = parse(&grm, "SeLeCt");
        assert_eq!(memo.best_match(top_key(&grm, "S", 0)).unwrap().len(), 6);
    }

    #[test]
    fn test_start_anchor() {
        let grm = PegGrammar::new(&[Rule::new(
            "S",
            seq(vec![start(), ch('a')])
        )])
        .unwrap();
        let memo = parse(&grm, "aa");
        assert_eq!(memo.best_match(top_key(&grm, "S", 0)).unwrap().len(), 1);
        // Away from position 0 the anchor must fail, even though it "can match zero chars".
        assert!(memo.best_match(top_key(&grm, "S", 1)).is_none());
        assert!(memo.lookup_best_match(top_key(&grm, "S", 1)).is_none());
    }

    #[test]
    fn test_lookaheads() {
        let grm = PegGrammar::new(&[Rule::new(
            "S",
            seq(vec![not_followed_by(ch('b')), char_range('a', 'z')])
        )])
        .unwrap();
        let memo = parse(&grm, "a");
        assert_eq!(memo.best_match(top_key(&grm, "S", 0)).unwrap().len(), 1);
        let memo = parse(&grm, "b");
        assert!(memo.best_match(top_key(&grm, "S", 0)).is_none());

        let grm = PegGrammar::new(&[Rule::new(
            "S",
            seq(vec![followed_by(str_lit("ab")), ch('a')])
        )])
        .unwrap();
        let memo = parse(&grm, "ab");
        let m = memo.best_match(top_key(&grm, "S", 0)).unwrap();
        assert_eq!(m.len(), 1);
        // The lookahead consumed nothing but retained its submatch.
        assert_eq!(m.sub_matches()[0].len(), 0);
        assert_eq!(m.sub_matches()[0].sub_matches()[0].len(), 2);
        let memo = parse(&grm, "ac");
        assert!(memo.best_match(top_key(&grm, "S", 0)).is_none());
    }

    #[test]
    fn test_empty_input_optional() {
        let grm = PegGrammar::new(&[Rule::new("S", optional(ch('a')))]).unwrap();
        let memo = parse(&grm, "");
        let m = memo.lookup_best_match(top_key(&grm, "S", 0)).unwrap();
        assert_eq!(m.len(), 0);
    }

    #[test]
    fn test_left_recursion() {
        // E <- E '+' N / N; N <- [0-9]+; -- direct left recursion, matched bottom-up.
        let grm = PegGrammar::new(&[
            Rule::new(
                "E",
                first(vec![
                    seq(vec![rule_ref("E"), ch('+'), rule_ref("N")]),
                    rule_ref("N"),
                ])
            ),
            Rule::new("N", one_or_more(char_range('0', '9'))),
        ])
        .unwrap();
        let memo = parse(&grm, "0+1+2+3");
        let top = memo.best_match(top_key(&grm, "E", 0)).unwrap();
        assert_eq!(top.len(), 7);
        assert_eq!(top.first_matching_sub_idx(), 0);
        // The match structure is left-nested: ((0+1)+2)+3.
        let s = &top.sub_matches()[0];
        assert_eq!(s.sub_matches()[0].len(), 5);
        assert_eq!(s.sub_matches()[1].len(), 1);
        assert_eq!(s.sub_matches()[2].len(), 1);
        let inner = &s.sub_matches()[0];
        assert_eq!(inner.first_matching_sub_idx(), 0);
        assert_eq!(inner.sub_matches()[0].sub_matches()[0].len(), 3);
    }

    #[test]
    fn test_indirect_left_recursion() {
        // A <- B 'a' / 'a'; B <- A 'b';
        let grm = PegGrammar::new(&[
            Rule::new(
                "A",
                first(vec![seq(vec![rule_ref("B"), ch('a')]), ch('a')])
            ),
            Rule::new("B", seq(vec![rule_ref("A"), ch('b')])),
        ])
        .unwrap();
        let memo = parse(&grm, "ababa");
        assert_eq!(memo.best_match(top_key(&grm, "A", 0)).unwrap().len(), 5);
    }

    #[test]
    fn test_self_referential_expression() {
        // E <- sum:(E op:'+' E) / N: with E on both sides, the engine settles on a single best
        // match per position; the overall result here is right-nested.
        let grm = PegGrammar::new(&[
            Rule::new(
                "E",
                first(vec![
                    label(
                        "sum",
                        seq(vec![rule_ref("E"), label("op", ch('+')), rule_ref("E")])
                    ),
                    rule_ref("N"),
                ])
            ),
            Rule::new("N", label("num", one_or_more(char_range('0', '9')))),
        ])
        .unwrap();
        let memo = parse(&grm, "0+1+2+3");
        let top = memo.best_match(top_key(&grm, "E", 0)).unwrap();
        assert_eq!(top.len(), 7);
        let s = &top.sub_matches()[0];
        assert_eq!(s.sub_matches()[0].len(), 1);
        assert_eq!(s.sub_matches()[2].len(), 5);
    }

    #[test]
    fn test_global_choice_consistency() {
        // A PEG parser matching top-down greedily commits B to its first alternative; matching
        // bottom-up stores the single best match for B, and the parse of A composes with it.
        let grm = PegGrammar::new(&[
            Rule::new(
                "A",
                seq(vec![str_lit("a "), rule_ref("B"), str_lit(" monkeyapples")])
            ),
            Rule::new(
                "B",
                first(vec![str_lit("million"), str_lit("million monkey")])
            ),
        ])
        .unwrap();
        let memo = parse(&grm, "a million monkeyapples");
        assert_eq!(memo.best_match(top_key(&grm, "A", 0)).unwrap().len(), 22);
        let b = memo.best_match(top_key(&grm, "B", 2)).unwrap();
        assert_eq!(b.len(), 7);
        assert_eq!(b.first_matching_sub_idx(), 0);
    }

    #[test]
    fn test_one_or_more_is_linear() {
        let grm = PegGrammar::new(&[Rule::new("S", one_or_more(ch('a')))]).unwrap();
        let input = "a".repeat(50);
        let memo = parse(&grm, &input);
        let cidx = grm.rule_clause(grm.rule_idx("S").unwrap());
        // One match per start position, not one per (start, end) pair.
        assert_eq!(memo.all_matches(cidx).len(), 50);
        assert_eq!(memo.iter().count(), 100);
    }

    #[test]
    fn test_determinism() {
        let grm = PegGrammar::new(&[
            Rule::new(
                "E",
                first(vec![
                    seq(vec![rule_ref("E"), ch('+'), rule_ref("N")]),
                    rule_ref("N"),
                ])
            ),
            Rule::new("N", one_or_more(char_range('0', '9'))),
        ])
        .unwrap();
        let fingerprint = |input: &str| {
            let memo = parse(&grm, input);
            let mut v = memo
                .iter()
                .map(|(k, m)| {
                    (
                        usize::from(k.cidx),
                        k.start,
                        m.len(),
                        m.first_matching_sub_idx(),
                        m.sub_matches()
                            .iter()
                            .map(|s| (usize::from(s.key().cidx), s.key().start, s.len()))
                            .collect::<Vec<_>>()
                    )
                })
                .collect::<Vec<_>>();
            v.sort();
            v
        };
        assert_eq!(fingerprint("10+2+333"), fingerprint("10+2+333"));
    }
}
