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

//! Grammar preparation: lower a list of user rules into a `PegGrammar`. The steps, in order:
//! validate clause composition; rewrite precedence groups; lift AST labels onto subclause
//! positions while interning the clause graph (deduplicating on the canonical rendering, with
//! rule references still symbolic); resolve references; order the reachable clauses reverse
//! topologically, terminals first, with recursive rules handled via their cycle heads; compute
//! the can-match-zero fixpoint; wire up seed parents; and collect the clauses which seed
//! matching at every input position.

use std::fmt::Debug;
use std::hash::Hash;
use std::mem;

use indexmap::IndexMap;
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use idxnewtype::{CIdx, RIdx};
use peg::ast::{self, Expr, PREC_ATOM, PREC_FIRST, PREC_LABEL, PREC_LOOKAHEAD, PREC_SEQ,
               PREC_SUFFIX};
use peg::grammar::{Clause, ClauseKind, PegGrammar, RuleInfo, SubClause};
use peg::{escape, AssocKind, PegGrammarError, Precedence, Rule};

/// A rule after precedence rewriting; within one grammar, names are unique from here on.
struct RwRule {
    name: String,
    prec: Option<Precedence>,
    clause: Expr
}

struct ProtoSub {
    idx: usize,
    label: Option<String>
}

enum ProtoKind {
    Clause(ClauseKind),
    /// A not-yet-resolved reference to a rule name.
    Ref(String)
}

/// An arena entry during preparation. `expr` is the canonical rendering, computed while
/// references are still symbolic and kept verbatim thereafter; it doubles as the interning key.
struct Proto {
    kind: ProtoKind,
    sub: Vec<ProtoSub>,
    expr: String
}

impl Proto {
    fn prec(&self) -> u8 {
        match self.kind {
            ProtoKind::Ref(_) => PREC_ATOM,
            ProtoKind::Clause(ref k) => match *k {
                ClauseKind::First => PREC_FIRST,
                ClauseKind::Seq => PREC_SEQ,
                ClauseKind::FollowedBy | ClauseKind::NotFollowedBy => PREC_LOOKAHEAD,
                ClauseKind::OneOrMore => PREC_SUFFIX,
                _ => PREC_ATOM
            }
        }
    }
}

pub(super) fn prepare<StorageT: 'static + Debug + Hash + PrimInt + Unsigned>(
    user_rules: &[Rule]
) -> Result<PegGrammar<StorageT>, PegGrammarError>
where
    usize: AsPrimitive<StorageT>
{
    for r in user_rules {
        r.clause.validate()?;
    }

    let (rw_rules, alias_list) = rewrite_precedence(user_rules)?;

    // Intern every rule's clause tree, lifting labels onto subclause positions as we go.
    let mut arena: Vec<Proto> = Vec::new();
    let mut dedup: IndexMap<String, usize> = IndexMap::new();
    let mut tops: Vec<(usize, Option<String>)> = Vec::with_capacity(rw_rules.len());
    for r in &rw_rules {
        tops.push(intern(&r.clause, &mut arena, &mut dedup));
    }

    let mut name_to_rw: IndexMap<String, usize> = IndexMap::new();
    for (i, r) in rw_rules.iter().enumerate() {
        if name_to_rw.insert(r.name.clone(), i).is_some() {
            return Err(PegGrammarError::DuplicateRule(r.name.clone()));
        }
    }
    let mut aliases: IndexMap<String, String> = IndexMap::new();
    for (bare, target) in alias_list {
        aliases.insert(bare, target);
    }

    // Resolve rule references: rewire every subclause position which points at a reference to
    // the referent rule's top clause, inheriting the referent's label where the position has
    // none of its own. Rule tops which are themselves references resolve the same way.
    let mut fixes = Vec::new();
    for i in 0..arena.len() {
        for (j, sub) in arena[i].sub.iter().enumerate() {
            if let ProtoKind::Ref(_) = arena[sub.idx].kind {
                let (tgt, lbl) = resolve_chain(sub.idx, &arena, &tops, &name_to_rw, &aliases)?;
                fixes.push((i, j, tgt, lbl));
            }
        }
    }
    for (i, j, tgt, lbl) in fixes {
        let sub = &mut arena[i].sub[j];
        sub.idx = tgt;
        if sub.label.is_none() {
            sub.label = lbl;
        }
    }
    for i in 0..tops.len() {
        if let ProtoKind::Ref(_) = arena[tops[i].0].kind {
            let (tgt, lbl) = resolve_chain(tops[i].0, &arena, &tops, &name_to_rw, &aliases)?;
            let own = tops[i].1.clone();
            tops[i] = (tgt, own.or(lbl));
        }
    }

    // Only clauses reachable from some rule survive into the grammar (this also drops the spent
    // reference nodes).
    let mut reachable = Vob::from_elem(arena.len(), false);
    let mut stack = tops.iter().map(|t| t.0).collect::<Vec<_>>();
    while let Some(i) = stack.pop() {
        if !reachable.set(i, true) {
            continue;
        }
        debug_assert!(match arena[i].kind {
            ProtoKind::Clause(_) => true,
            ProtoKind::Ref(_) => false
        });
        for sub in &arena[i].sub {
            stack.push(sub.idx);
        }
    }

    // Reverse topological order: terminals first, then a post-order walk from the top-level
    // clauses, the cycle heads of recursive rules, and finally the rule tops themselves.
    let mut is_sub = Vob::from_elem(arena.len(), false);
    for i in 0..arena.len() {
        if reachable[i] {
            for sub in &arena[i].sub {
                is_sub.set(sub.idx, true);
            }
        }
    }
    let mut droots = Vec::new();
    for i in 0..arena.len() {
        if reachable[i] && !is_sub[i] {
            droots.push(i);
        }
    }
    for t in &tops {
        droots.push(t.0);
    }
    let cycle_heads = find_cycle_heads(&droots, &arena);

    let mut order = Vec::new();
    let mut visited = Vob::from_elem(arena.len(), false);
    for i in 0..arena.len() {
        let term = match arena[i].kind {
            ProtoKind::Clause(ref k) => k.is_terminal(),
            ProtoKind::Ref(_) => false
        };
        if reachable[i] && term {
            visited.set(i, true);
            order.push(i);
        }
    }
    for i in 0..arena.len() {
        if reachable[i] && !is_sub[i] {
            topo_rec(i, &arena, &mut visited, &mut order);
        }
    }
    for i in 0..arena.len() {
        if cycle_heads[i] {
            topo_rec(i, &arena, &mut visited, &mut order);
        }
    }
    for t in &tops {
        topo_rec(t.0, &arena, &mut visited, &mut order);
    }

    if StorageT::from(order.len()).is_none() {
        return Err(PegGrammarError::TooManyClauses(order.len()));
    }
    let mut remap = vec![::std::usize::MAX; arena.len()];
    for (new, &old) in order.iter().enumerate() {
        remap[old] = new;
    }

    let mut clauses = Vec::with_capacity(order.len());
    for &old in &order {
        let p = &arena[old];
        let kind = match p.kind {
            ProtoKind::Clause(ref k) => k.clone(),
            // Preparation must never leave a reference in the graph.
            ProtoKind::Ref(ref n) => panic!("unresolved reference to '{}' survived preparation", n)
        };
        clauses.push(Clause {
            kind,
            sub: p
                .sub
                .iter()
                .map(|s| SubClause {
                    cidx: CIdx::from_usize(remap[s.idx]),
                    label: s.label.clone()
                })
                .collect(),
            expr: p.expr.clone(),
            can_match_zero: false,
            seed_parents: Vec::new(),
            rules: Vec::new()
        });
    }

    // The can-match-zero flags of recursive grammars need iterating to a fixpoint.
    loop {
        let mut changed = false;
        for i in 0..clauses.len() {
            let new = {
                let c = &clauses[i];
                match c.kind {
                    ClauseKind::Nothing
                    | ClauseKind::Start
                    | ClauseKind::FollowedBy
                    | ClauseKind::NotFollowedBy => true,
                    ClauseKind::CharSeq { ref s, .. } => s.is_empty(),
                    ClauseKind::CharSet(ref cs) => cs.is_empty(),
                    ClauseKind::Seq => c
                        .sub
                        .iter()
                        .all(|s| clauses[usize::from(s.cidx)].can_match_zero),
                    ClauseKind::First => c
                        .sub
                        .iter()
                        .any(|s| clauses[usize::from(s.cidx)].can_match_zero),
                    ClauseKind::OneOrMore => clauses[usize::from(c.sub[0].cidx)].can_match_zero
                }
            };
            if new != clauses[i].can_match_zero {
                clauses[i].can_match_zero = new;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    // Seed parents: a subclause seeds its parent if a new match of the subclause at a position
    // can change what the parent matches there. For a sequence that holds for the leading
    // subclauses up to and including the first which cannot match zero characters; for
    // everything else, for every subclause.
    for i in 0..clauses.len() {
        let seq = match clauses[i].kind {
            ClauseKind::Seq => true,
            _ => false
        };
        let subs = mem::replace(&mut clauses[i].sub, Vec::new());
        for s in &subs {
            clauses[usize::from(s.cidx)]
                .seed_parents
                .push(CIdx::from_usize(i));
            if seq && !clauses[usize::from(s.cidx)].can_match_zero {
                break;
            }
        }
        clauses[i].sub = subs;
    }
    for c in &mut clauses {
        c.seed_parents.sort();
        c.seed_parents.dedup();
    }

    let start_seeds = (0..clauses.len())
        .filter(|&i| clauses[i].kind.is_terminal() || clauses[i].can_match_zero)
        .map(CIdx::from_usize)
        .collect::<Vec<_>>();

    let mut infos = rw_rules
        .iter()
        .zip(tops.iter())
        .map(|(r, &(top, ref label))| RuleInfo {
            name: r.name.clone(),
            cidx: CIdx::from_usize(remap[top]),
            label: label.clone(),
            prec: r.prec
        })
        .collect::<Vec<_>>();
    infos.sort_by(|a, b| a.name.cmp(&b.name));
    let mut rule_map = IndexMap::new();
    for (i, ri) in infos.iter().enumerate() {
        rule_map.insert(ri.name.clone(), RIdx::from_usize(i));
    }
    for (bare, target) in &aliases {
        let ridx = rule_map[target.as_str()];
        rule_map.insert(bare.clone(), ridx);
    }
    for (i, ri) in infos.iter().enumerate() {
        clauses[usize::from(ri.cidx)].rules.push(RIdx::from_usize(i));
    }

    Ok(PegGrammar {
        clauses,
        rules: infos,
        rule_map,
        start_seeds
    })
}

/// Intern `e` into the arena, returning its entry and the label lifted off its top, if any.
fn intern(
    e: &Expr,
    arena: &mut Vec<Proto>,
    dedup: &mut IndexMap<String, usize>
) -> (usize, Option<String>) {
    match *e {
        Expr::Label(ref l, ref inner) => {
            let (idx, _) = intern(inner, arena, dedup);
            (idx, Some(l.clone()))
        }
        Expr::RuleRef(ref n) => {
            if let Some(&idx) = dedup.get(n) {
                return (idx, None);
            }
            let idx = arena.len();
            arena.push(Proto {
                kind: ProtoKind::Ref(n.clone()),
                sub: Vec::new(),
                expr: n.clone()
            });
            dedup.insert(n.clone(), idx);
            (idx, None)
        }
        _ => {
            let (kind, children) = match *e {
                Expr::CharSet(ref cs) => (ClauseKind::CharSet(cs.clone()), Vec::new()),
                Expr::CharSeq { ref s, ignore_case } => (
                    ClauseKind::CharSeq {
                        s: s.clone(),
                        ignore_case
                    },
                    Vec::new()
                ),
                Expr::Start => (ClauseKind::Start, Vec::new()),
                Expr::Nothing => (ClauseKind::Nothing, Vec::new()),
                Expr::Seq(ref subs) => (ClauseKind::Seq, subs.iter().collect()),
                Expr::First(ref subs) => (ClauseKind::First, subs.iter().collect()),
                Expr::OneOrMore(ref sub) => (ClauseKind::OneOrMore, vec![&**sub]),
                Expr::FollowedBy(ref sub) => (ClauseKind::FollowedBy, vec![&**sub]),
                Expr::NotFollowedBy(ref sub) => (ClauseKind::NotFollowedBy, vec![&**sub]),
                Expr::RuleRef(_) | Expr::Label(..) => unreachable!()
            };
            let mut subs = Vec::with_capacity(children.len());
            for c in children {
                let (idx, lbl) = intern(c, arena, dedup);
                subs.push(ProtoSub { idx, label: lbl });
            }
            let expr = render(&kind, &subs, arena);
            if let Some(&idx) = dedup.get(&expr) {
                return (idx, None);
            }
            let idx = arena.len();
            arena.push(Proto {
                kind: ProtoKind::Clause(kind),
                sub: subs,
                expr: expr.clone()
            });
            dedup.insert(expr, idx);
            (idx, None)
        }
    }
}

/// Render a clause over already-interned subclauses. This must agree exactly with
/// `ast::Expr`'s `Display` impl, since both produce the canonical form.
fn render(kind: &ClauseKind, subs: &[ProtoSub], arena: &[Proto]) -> String {
    match *kind {
        ClauseKind::CharSet(ref cs) => format!("{}", cs),
        ClauseKind::CharSeq { ref s, ignore_case } => {
            let mut r = escape::quote_str(s);
            if ignore_case {
                r.push('i');
            }
            r
        }
        ClauseKind::Start => "^".to_string(),
        ClauseKind::Nothing => "()".to_string(),
        ClauseKind::Seq => subs
            .iter()
            .map(|s| render_sub(s, arena, PREC_SEQ + 1))
            .collect::<Vec<_>>()
            .join(" "),
        ClauseKind::First => subs
            .iter()
            .map(|s| render_sub(s, arena, PREC_FIRST + 1))
            .collect::<Vec<_>>()
            .join(" / "),
        ClauseKind::OneOrMore => format!("{}+", render_sub(&subs[0], arena, PREC_ATOM)),
        ClauseKind::FollowedBy => format!("&{}", render_sub(&subs[0], arena, PREC_LABEL)),
        ClauseKind::NotFollowedBy => format!("!{}", render_sub(&subs[0], arena, PREC_LABEL))
    }
}

fn render_sub(sub: &ProtoSub, arena: &[Proto], ctx: u8) -> String {
    let p = &arena[sub.idx];
    let inner_ctx = if sub.label.is_some() { PREC_SUFFIX } else { ctx };
    let inner = if p.prec() < inner_ctx {
        format!("({})", p.expr)
    } else {
        p.expr.clone()
    };
    match sub.label {
        Some(ref l) => {
            let s = format!("{}:{}", l, inner);
            if PREC_LABEL < ctx {
                format!("({})", s)
            } else {
                s
            }
        }
        None => inner
    }
}

/// Follow a chain of references starting at arena entry `start`, accumulating rule-level labels
/// along the way. Chains which cycle without passing through a real operator can never match
/// anything.
fn resolve_chain(
    start: usize,
    arena: &[Proto],
    tops: &[(usize, Option<String>)],
    name_to_rw: &IndexMap<String, usize>,
    aliases: &IndexMap<String, String>
) -> Result<(usize, Option<String>), PegGrammarError> {
    let mut cur = start;
    let mut acc: Option<String> = None;
    let mut visited = Vob::from_elem(arena.len(), false);
    loop {
        match arena[cur].kind {
            ProtoKind::Clause(_) => return Ok((cur, acc)),
            ProtoKind::Ref(ref name) => {
                if !visited.set(cur, true) {
                    return Err(PegGrammarError::InvalidClauseComposition(format!(
                        "the definition of rule '{}' cycles back to itself without consuming \
                         anything",
                        name
                    )));
                }
                let rw = match name_to_rw.get(name) {
                    Some(&i) => i,
                    None => match aliases.get(name).and_then(|t| name_to_rw.get(t)) {
                        Some(&i) => i,
                        None => return Err(PegGrammarError::UnresolvedRule(name.clone()))
                    }
                };
                acc = acc.or_else(|| tops[rw].1.clone());
                cur = tops[rw].0;
            }
        }
    }
}

/// Depth-first search marking every subclause reached while it is already on the current search
/// path: those are the heads of clause cycles, and must act as extra roots for the topological
/// ordering so that every member of a cycle receives an index.
fn find_cycle_heads(roots: &[usize], arena: &[Proto]) -> Vob {
    fn rec(i: usize, arena: &[Proto], visited: &mut Vob, finished: &mut Vob, result: &mut Vob) {
        visited.set(i, true);
        for sub in &arena[i].sub {
            if visited[sub.idx] {
                result.set(sub.idx, true);
            } else if !finished[sub.idx] {
                rec(sub.idx, arena, visited, finished, result);
            }
        }
        visited.set(i, false);
        finished.set(i, true);
    }

    let mut result = Vob::from_elem(arena.len(), false);
    let mut visited = Vob::from_elem(arena.len(), false);
    let mut finished = Vob::from_elem(arena.len(), false);
    for &r in roots {
        if !finished[r] {
            rec(r, arena, &mut visited, &mut finished, &mut result);
        }
    }
    result
}

fn topo_rec(i: usize, arena: &[Proto], visited: &mut Vob, order: &mut Vec<usize>) {
    if !visited.set(i, true) {
        return;
    }
    for sub in &arena[i].sub {
        topo_rec(sub.idx, arena, visited, order);
    }
    order.push(i);
}

/// Rewrite each group of same-named rules into one rule per precedence level, wired so that
/// associativity is encoded structurally: level i's self-references move to level i+1, except
/// the leftmost (for left-associative levels) or rightmost (for right-associative levels), which
/// stays at level i. Levels below the highest fall through to the level above; the highest level
/// falls back to the lowest, and its self-references wrap around to it, which is what makes
/// parenthesised subexpressions restart the precedence climb.
fn rewrite_precedence(
    rules: &[Rule]
) -> Result<(Vec<RwRule>, Vec<(String, String)>), PegGrammarError> {
    let mut groups: IndexMap<String, Vec<&Rule>> = IndexMap::new();
    for r in rules {
        groups
            .entry(r.name.clone())
            .or_insert_with(Vec::new)
            .push(r);
    }

    let mut out = Vec::new();
    let mut aliases = Vec::new();
    for (name, group) in &groups {
        if group.len() == 1 {
            let r = group[0];
            out.push(RwRule {
                name: name.clone(),
                prec: r.prec,
                clause: r.clause.clone()
            });
            continue;
        }
        if group.iter().any(|r| r.prec.is_none()) {
            if group.iter().all(|r| r.prec.is_none()) {
                return Err(PegGrammarError::DuplicateRule(name.clone()));
            }
            return Err(PegGrammarError::PrecedenceGroupInconsistent(name.clone()));
        }
        let mut levels = group.clone();
        levels.sort_by_key(|r| r.prec.unwrap().level);
        if levels
            .windows(2)
            .any(|w| w[0].prec.unwrap().level == w[1].prec.unwrap().level)
        {
            return Err(PegGrammarError::PrecedenceGroupInconsistent(name.clone()));
        }
        let k = levels.len();
        for (i, r) in levels.iter().enumerate() {
            let kind = r.prec.unwrap().kind;
            let total = count_self_refs(&r.clause, name);
            let keep = match kind {
                AssocKind::Left if total > 0 => Some(0),
                AssocKind::Right if total > 0 => Some(total - 1),
                _ => None
            };
            let mut seen = 0;
            let body = retarget(&r.clause, name, i, k, keep, &mut seen);
            let fall = if i < k - 1 { i + 1 } else { 0 };
            out.push(RwRule {
                name: level_name(name, i),
                prec: Some(Precedence {
                    level: i as u64,
                    kind
                }),
                clause: ast::first(vec![body, ast::rule_ref(&level_name(name, fall))])
            });
        }
        aliases.push((name.clone(), level_name(name, 0)));
    }
    Ok((out, aliases))
}

fn level_name(name: &str, i: usize) -> String {
    format!("{}[{}]", name, i)
}

fn count_self_refs(e: &Expr, name: &str) -> usize {
    match *e {
        Expr::RuleRef(ref n) => (n == name) as usize,
        Expr::Seq(ref subs) | Expr::First(ref subs) => {
            subs.iter().map(|s| count_self_refs(s, name)).sum()
        }
        Expr::OneOrMore(ref s)
        | Expr::FollowedBy(ref s)
        | Expr::NotFollowedBy(ref s)
        | Expr::Label(_, ref s) => count_self_refs(s, name),
        _ => 0
    }
}

fn retarget(
    e: &Expr,
    name: &str,
    level: usize,
    k: usize,
    keep: Option<usize>,
    seen: &mut usize
) -> Expr {
    match *e {
        Expr::RuleRef(ref n) if n == name => {
            let this = *seen;
            *seen += 1;
            let tgt = if keep == Some(this) {
                level
            } else {
                (level + 1) % k
            };
            Expr::RuleRef(level_name(name, tgt))
        }
        Expr::Seq(ref subs) => Expr::Seq(
            subs.iter()
                .map(|s| retarget(s, name, level, k, keep, seen))
                .collect()
        ),
        Expr::First(ref subs) => Expr::First(
            subs.iter()
                .map(|s| retarget(s, name, level, k, keep, seen))
                .collect()
        ),
        Expr::OneOrMore(ref s) => {
            Expr::OneOrMore(Box::new(retarget(s, name, level, k, keep, seen)))
        }
        Expr::FollowedBy(ref s) => {
            Expr::FollowedBy(Box::new(retarget(s, name, level, k, keep, seen)))
        }
        Expr::NotFollowedBy(ref s) => {
            Expr::NotFollowedBy(Box::new(retarget(s, name, level, k, keep, seen)))
        }
        Expr::Label(ref l, ref s) => Expr::Label(
            l.clone(),
            Box::new(retarget(s, name, level, k, keep, seen))
        ),
        _ => e.clone()
    }
}
