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

use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use fnv::FnvHashMap;
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use peggrammar::peg::{ClauseKind, PegGrammar};
use peggrammar::CIdx;

use parser;

/// The address of one memoisation cell: a clause at an input position (in code points).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MemoKey<StorageT> {
    pub cidx: CIdx<StorageT>,
    pub start: usize
}

impl<StorageT: Ord> Ord for MemoKey<StorageT> {
    /// Keys are ordered by matching priority, so that the greatest key is the next the engine
    /// should process: rightmost start position first and, within a position, subclauses before
    /// the clauses built from them.
    fn cmp(&self, other: &MemoKey<StorageT>) -> Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| other.cidx.cmp(&self.cidx))
    }
}

impl<StorageT: Ord> PartialOrd for MemoKey<StorageT> {
    fn partial_cmp(&self, other: &MemoKey<StorageT>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A successful match of one clause at one position. Submatches are shared: an improved match
/// for a key does not disturb matches which incorporated an earlier, shorter one.
#[derive(Debug)]
pub struct Match<StorageT> {
    key: MemoKey<StorageT>,
    len: usize,
    /// For ordered-choice clauses, which alternative matched; 0 otherwise.
    sub_idx: usize,
    sub: Vec<Rc<Match<StorageT>>>
}

impl<StorageT: Copy> Match<StorageT> {
    pub(crate) fn empty(key: MemoKey<StorageT>) -> Match<StorageT> {
        Match {
            key,
            len: 0,
            sub_idx: 0,
            sub: Vec::new()
        }
    }

    pub(crate) fn terminal(key: MemoKey<StorageT>, len: usize) -> Match<StorageT> {
        Match {
            key,
            len,
            sub_idx: 0,
            sub: Vec::new()
        }
    }

    pub(crate) fn new(
        key: MemoKey<StorageT>,
        len: usize,
        sub: Vec<Rc<Match<StorageT>>>
    ) -> Match<StorageT> {
        Match {
            key,
            len,
            sub_idx: 0,
            sub
        }
    }

    pub(crate) fn first_alt(
        key: MemoKey<StorageT>,
        sub_idx: usize,
        sub: Rc<Match<StorageT>>
    ) -> Match<StorageT> {
        Match {
            key,
            len: sub.len,
            sub_idx,
            sub: vec![sub]
        }
    }

    pub fn key(&self) -> MemoKey<StorageT> {
        self.key
    }

    /// The length of this match in code points.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// For a match of an ordered choice, the index of the alternative which matched; 0 for
    /// everything else.
    pub fn first_matching_sub_idx(&self) -> usize {
        self.sub_idx
    }

    pub fn sub_matches(&self) -> &[Rc<Match<StorageT>>] {
        &self.sub
    }
}

/// The memo table of a single parse. At most one match is stored per key, always the best-ranked
/// one seen so far; entries are never reclaimed. The table keeps hold of the grammar and the
/// input it was parsed with, so post-parse inspection (ASTs, error spans) needs nothing else.
#[derive(Debug)]
pub struct MemoTable<'a, 'b, StorageT> {
    grm: &'a PegGrammar<StorageT>,
    input: &'b str,
    chars: Vec<char>,
    table: FnvHashMap<MemoKey<StorageT>, Rc<Match<StorageT>>>
}

impl<'a, 'b, StorageT: 'static + Debug + Hash + PrimInt + Unsigned> MemoTable<'a, 'b, StorageT>
where
    usize: AsPrimitive<StorageT>
{
    pub fn new(grm: &'a PegGrammar<StorageT>, input: &'b str) -> MemoTable<'a, 'b, StorageT> {
        MemoTable {
            grm,
            input,
            chars: input.chars().collect(),
            table: FnvHashMap::default()
        }
    }

    pub fn grammar(&self) -> &'a PegGrammar<StorageT> {
        self.grm
    }

    pub fn input(&self) -> &'b str {
        self.input
    }

    /// The length of the input in code points.
    pub fn input_len(&self) -> usize {
        self.chars.len()
    }

    pub(crate) fn chars(&self) -> &[char] {
        &self.chars
    }

    /// The substring `[start, start + len)`, both in code points.
    pub fn subinput(&self, start: usize, len: usize) -> String {
        self.chars[start..start + len].iter().cloned().collect()
    }

    /// The match stored for `key`, if any.
    pub fn best_match(&self, key: MemoKey<StorageT>) -> Option<Rc<Match<StorageT>>> {
        self.table.get(&key).cloned()
    }

    /// The match the engine should treat `key` as having. This differs from
    /// [`best_match`](#method.best_match) in two ways: a lookahead is evaluated on the spot,
    /// since for a lookahead the absence of a stored match is meaningful (for a negative one it
    /// is success); and any other clause which can match zero characters yields a zero-length
    /// match anywhere one has not been stored (in particular at the end of the input, which the
    /// bottom-up seeding never reaches). The start-of-input anchor is excluded from the latter:
    /// away from position zero its absence really does mean failure.
    pub fn lookup_best_match(&self, key: MemoKey<StorageT>) -> Option<Rc<Match<StorageT>>> {
        if let Some(m) = self.table.get(&key) {
            return Some(m.clone());
        }
        let clause = self.grm.clause(key.cidx);
        match *clause.kind() {
            ClauseKind::FollowedBy | ClauseKind::NotFollowedBy => {
                parser::try_match(key, self).map(Rc::new)
            }
            ClauseKind::Start => None,
            _ if clause.can_match_zero() => Some(Rc::new(Match::empty(key))),
            _ => None
        }
    }

    /// Store `m` iff it strictly beats the match currently stored for its key: for an ordered
    /// choice a higher-priority (lower-indexed) alternative wins, otherwise a longer match wins.
    /// Returns whether `m` was stored.
    pub(crate) fn set_best_match(&mut self, m: Match<StorageT>) -> bool {
        let key = m.key();
        let replace = match self.table.get(&key) {
            None => true,
            Some(cur) => {
                let is_first = match *self.grm.clause(key.cidx).kind() {
                    ClauseKind::First => true,
                    _ => false
                };
                (is_first && m.first_matching_sub_idx() < cur.first_matching_sub_idx())
                    || m.len() > cur.len()
            }
        };
        if replace {
            self.table.insert(key, Rc::new(m));
        }
        replace
    }

    /// Every stored match for `cidx`, ordered by start position.
    pub fn all_matches(&self, cidx: CIdx<StorageT>) -> Vec<Rc<Match<StorageT>>> {
        let mut out = self
            .table
            .iter()
            .filter(|&(k, _)| k.cidx == cidx)
            .map(|(_, m)| m.clone())
            .collect::<Vec<_>>();
        out.sort_by_key(|m| m.key().start);
        out
    }

    /// Iterate over every `(key, match)` pair in the table, in no particular order.
    pub fn iter<'c>(
        &'c self
    ) -> Box<Iterator<Item = (&'c MemoKey<StorageT>, &'c Rc<Match<StorageT>>)> + 'c> {
        Box::new(self.table.iter())
    }

    /// Scan the input left to right against `recovery_rules` (in order of preference) and return
    /// the spans which none of them could account for, as `(start, end, text)` triples in code
    /// points. Zero-length matches never advance the scan. Panics if a name in `recovery_rules`
    /// is not a rule of the grammar.
    pub fn syntax_errors(&self, recovery_rules: &[&str]) -> Vec<(usize, usize, String)> {
        let cidxs = recovery_rules
            .iter()
            .map(|n| match self.grm.rule_idx(n) {
                Some(ridx) => self.grm.rule_clause(ridx),
                None => panic!("unknown recovery rule '{}'", n)
            })
            .collect::<Vec<_>>();
        let len = self.chars.len();
        let mut out = Vec::new();
        let mut err_start = None;
        let mut i = 0;
        while i < len {
            let mut m = None;
            for &cidx in &cidxs {
                if let Some(x) = self.table.get(&MemoKey { cidx, start: i }) {
                    if x.len() > 0 {
                        m = Some(x.len());
                        break;
                    }
                }
            }
            match m {
                Some(mlen) => {
                    if let Some(s) = err_start.take() {
                        out.push((s, i, self.subinput(s, i - s)));
                    }
                    i += mlen;
                }
                None => {
                    if err_start.is_none() {
                        err_start = Some(i);
                    }
                    i += 1;
                }
            }
        }
        if let Some(s) = err_start {
            out.push((s, len, self.subinput(s, len - s)));
        }
        out
    }
}

#[cfg(test)]
mod test {
    use std::collections::BinaryHeap;

    use peggrammar::peg::ast::*;
    use peggrammar::peg::{PegGrammar, Rule};
    use peggrammar::CIdx;

    use parser::parse;
    use super::{Match, MemoKey, MemoTable};

    #[test]
    fn test_key_priority_order() {
        // Rightmost position first; within a position, lowest clause index first.
        let mut heap = BinaryHeap::new();
        for &(c, s) in &[(3u32, 0usize), (0, 1), (2, 1), (0, 0), (5, 2)] {
            heap.push(MemoKey {
                cidx: CIdx(c),
                start: s
            });
        }
        let mut popped = Vec::new();
        while let Some(k) = heap.pop() {
            popped.push((usize::from(k.cidx), k.start));
        }
        assert_eq!(popped, vec![(5, 2), (0, 1), (2, 1), (0, 0), (3, 0)]);
    }

    #[test]
    fn test_set_best_match() {
        let grm = PegGrammar::new(&[Rule::new(
            "S",
            first(vec![str_lit("ab"), str_lit("a")])
        )])
        .unwrap();
        let cidx = grm.rule_clause(grm.rule_idx("S").unwrap());
        let key = MemoKey { cidx, start: 0 };
        let mut memo = MemoTable::new(&grm, "ab");
        let sub = ::std::rc::Rc::new(Match::terminal(key, 1));

        // For an ordered choice, a lower-indexed alternative beats a longer match...
        assert!(memo.set_best_match(Match::first_alt(key, 1, sub.clone())));
        let longer = ::std::rc::Rc::new(Match::terminal(key, 2));
        assert!(memo.set_best_match(Match::first_alt(key, 0, longer)));
        assert_eq!(memo.best_match(key).unwrap().first_matching_sub_idx(), 0);
        assert_eq!(memo.best_match(key).unwrap().len(), 2);
        // ...and an equal-ranked candidate does not displace the incumbent.
        assert!(!memo.set_best_match(Match::first_alt(key, 0, sub.clone())));
        assert_eq!(memo.best_match(key).unwrap().len(), 2);
    }

    #[test]
    fn test_all_matches_ordered() {
        let grm = PegGrammar::new(&[Rule::new("S", one_or_more(ch('a')))]).unwrap();
        let memo = parse(&grm, "aaa");
        let cidx = grm.rule_clause(grm.rule_idx("S").unwrap());
        let all = memo.all_matches(cidx);
        assert_eq!(all.len(), 3);
        for (i, m) in all.iter().enumerate() {
            assert_eq!(m.key().start, i);
            assert_eq!(m.len(), 3 - i);
        }
    }

    #[test]
    fn test_syntax_errors() {
        let grm = PegGrammar::new(&[Rule::new(
            "S",
            one_or_more(first(vec![ch('x'), ch('y')]))
        )])
        .unwrap();
        let memo = parse(&grm, "xxzzyy");
        assert_eq!(
            memo.syntax_errors(&["S"]),
            vec![(2, 4, "zz".to_string())]
        );

        let memo = parse(&grm, "xyxy");
        assert!(memo.syntax_errors(&["S"]).is_empty());

        let memo = parse(&grm, "xxzz");
        assert_eq!(
            memo.syntax_errors(&["S"]),
            vec![(2, 4, "zz".to_string())]
        );
    }

    #[test]
    fn test_syntax_errors_ignore_zero_len() {
        // A nullable recovery rule matches everywhere with length 0; that must not stall the
        // error scan.
        let grm = PegGrammar::new(&[Rule::new("S", zero_or_more(ch('x')))]).unwrap();
        let memo = parse(&grm, "yy");
        assert_eq!(
            memo.syntax_errors(&["S"]),
            vec![(0, 2, "yy".to_string())]
        );
    }
}
