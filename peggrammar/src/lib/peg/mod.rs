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

use std::fmt;

pub mod ast;
pub mod escape;
pub mod grammar;
mod prepare;

pub use self::grammar::{Clause, ClauseKind, PegGrammar, SubClause};

pub type PrecedenceLevel = u64;

/// The precedence level of one rule within a group of rules sharing a name, together with the
/// associativity of that level. Levels are ordered from lowest (loosest binding) to highest.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Precedence {
    pub level: PrecedenceLevel,
    pub kind: AssocKind
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AssocKind {
    Left,
    Right,
    Nonassoc
}

/// A single user rule: a name, an optional precedence, and a clause built with the factory
/// functions in [`ast`](ast/index.html). Several rules may share a name provided every one of
/// them carries a distinct precedence level.
#[derive(Clone, Debug)]
pub struct Rule {
    pub name: String,
    pub prec: Option<Precedence>,
    pub clause: ast::Expr
}

impl Rule {
    pub fn new(name: &str, clause: ast::Expr) -> Rule {
        Rule {
            name: name.to_string(),
            prec: None,
            clause
        }
    }

    pub fn new_prec(name: &str, prec: Precedence, clause: ast::Expr) -> Rule {
        Rule {
            name: name.to_string(),
            prec: Some(prec),
            clause
        }
    }
}

/// A set of characters, stored as sorted, non-overlapping, inclusive ranges; the set as a whole
/// may be negated. A clause matching against a `CharSet` consumes exactly one character.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CharSet {
    negated: bool,
    ranges: Vec<(char, char)>
}

impl CharSet {
    /// A set containing precisely the characters of `chars`.
    pub fn new(chars: &str) -> CharSet {
        CharSet::from_ranges(&chars.chars().map(|c| (c, c)).collect::<Vec<_>>())
    }

    /// A set containing the union of the inclusive ranges `ranges`. Ranges where the bounds are
    /// out of order are dropped.
    pub fn from_ranges(ranges: &[(char, char)]) -> CharSet {
        let mut rs = ranges
            .iter()
            .filter(|&&(lo, hi)| lo <= hi)
            .cloned()
            .collect::<Vec<_>>();
        rs.sort();
        // Merge overlapping and adjacent ranges so that rendering is canonical.
        let mut merged: Vec<(char, char)> = Vec::with_capacity(rs.len());
        for (lo, hi) in rs {
            if let Some(last) = merged.last_mut() {
                if lo as u32 <= last.1 as u32 + 1 {
                    if hi > last.1 {
                        last.1 = hi;
                    }
                    continue;
                }
            }
            merged.push((lo, hi));
        }
        CharSet {
            negated: false,
            ranges: merged
        }
    }

    pub fn negate(mut self) -> CharSet {
        self.negated = !self.negated;
        self
    }

    /// A set matching any character at all.
    pub fn any() -> CharSet {
        CharSet {
            negated: true,
            ranges: Vec::new()
        }
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn ranges(&self) -> &[(char, char)] {
        &self.ranges
    }

    /// Is this the (non-negated) set which matches no character at all?
    pub fn is_empty(&self) -> bool {
        !self.negated && self.ranges.is_empty()
    }

    pub fn matches(&self, c: char) -> bool {
        self.ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi) != self.negated
    }
}

impl fmt::Display for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.negated && self.ranges.len() == 1 && self.ranges[0].0 == self.ranges[0].1 {
            return write!(f, "{}", escape::quote_char(self.ranges[0].0));
        }
        write!(f, "[")?;
        if self.negated {
            write!(f, "^")?;
        }
        for &(lo, hi) in &self.ranges {
            if lo == hi {
                write!(f, "{}", escape::charset_char(lo))?;
            } else {
                write!(
                    f,
                    "{}-{}",
                    escape::charset_char(lo),
                    escape::charset_char(hi)
                )?;
            }
        }
        write!(f, "]")
    }
}

/// Errors raised while a grammar is prepared. All of these are fatal to grammar construction.
#[derive(Debug, PartialEq)]
pub enum PegGrammarError {
    /// A clause referenced a rule name which is not defined anywhere in the grammar.
    UnresolvedRule(String),
    /// Two rules share a name without forming a precedence group.
    DuplicateRule(String),
    /// A clause was composed in a way which can never be matched (e.g. a rule defined purely in
    /// terms of itself, or a negative lookahead over the empty clause).
    InvalidClauseComposition(String),
    /// Rules sharing a name must all carry precedence levels, and those levels must be distinct.
    PrecedenceGroupInconsistent(String),
    /// The grammar has more clauses than the chosen storage type can index.
    TooManyClauses(usize)
}

impl fmt::Display for PegGrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PegGrammarError::UnresolvedRule(ref n) => write!(f, "Unknown rule '{}'", n),
            PegGrammarError::DuplicateRule(ref n) => {
                write!(f, "Rule '{}' is defined more than once", n)
            }
            PegGrammarError::InvalidClauseComposition(ref s) => {
                write!(f, "Invalid clause composition: {}", s)
            }
            PegGrammarError::PrecedenceGroupInconsistent(ref n) => write!(
                f,
                "The rules named '{}' do not form a consistent precedence group",
                n
            ),
            PegGrammarError::TooManyClauses(n) => write!(
                f,
                "Grammar has {} clauses, more than the storage type can index",
                n
            )
        }
    }
}
