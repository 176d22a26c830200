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

//! A library for building and preparing Parsing Expression Grammars (PEGs) so that they can be
//! matched bottom-up. PEG terminology is not entirely settled, so this library uses the following
//! guidelines for major concepts:
//!
//!   * A *grammar* is a set of *rules*.
//!   * A *rule* maps a name to a single *clause* (and, optionally, a precedence level and an
//!     associativity).
//!   * A *clause* is one parsing expression: a terminal (a character set, a literal string, the
//!     start-of-input anchor, or the empty clause) or an operator over *subclauses* (sequence,
//!     ordered choice, one-or-more, and the two lookaheads).
//!   * A *label* can be attached to any subclause position; labels determine the shape of
//!     abstract syntax trees and have no effect on matching.
//!
//! For example, in the grammar:
//!
//!   R1 <- "a" r:R2 / R2;
//!   R2 <- [0-9]+;
//!
//! there are two rules; R1's clause is an ordered choice whose first alternative is a sequence
//! with two subclauses, the second of which carries the label "r".
//!
//! peggrammar makes the following guarantees about prepared grammars:
//!
//!   * Clauses are numbered from `0` to `clauses_len() - 1` (inclusive) in reverse topological
//!     order: every subclause of a clause has a lower index than the clause itself, except where
//!     rules are (mutually) recursive.
//!   * Clauses are interned: two clauses with the same canonical rendering (see
//!     [`clause_expr`](peg/grammar/struct.PegGrammar.html#method.clause_expr)) are the same
//!     clause, with the same index.
//!   * Rule references and labels present in the input rules are resolved away: no clause in a
//!     prepared grammar is a reference or a bare label.
//!   * The StorageT type used to store clause and rule indices can be infallibly converted into
//!     usize (see [`CIdx`](struct.CIdx.html) and friends for more details).
//!
//! The main function to investigate is
//! [`PegGrammar::new()`](peg/grammar/struct.PegGrammar.html#method.new) and/or
//! [`PegGrammar::new_with_storaget()`](peg/grammar/struct.PegGrammar.html#method.new_with_storaget)
//! which take as input a list of rules built with the factory functions in
//! [`peg::ast`](peg/ast/index.html).

extern crate indexmap;
extern crate num_traits;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;
extern crate vob;

mod idxnewtype;
pub mod peg;

/// Types specifically for clause and rule indices.
pub use idxnewtype::{CIdx, RIdx};
