// {{{ Copyright (c) Paul R. Tagliamonte <paultag@debian.org>, 2024
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE. }}}

//! Dependency-field modeling on top of [`crate::dependency::Dependency`].
//!
//! [`crate::dependency::Dependency`] already parses the full
//! `foo (>= 1.0) [amd64] | bar` grammar into `relations: Vec<Relation>` (an
//! AND-list) of `packages: Vec<Package>` (an OR-list, "possibilities" in
//! dpkg's own vocabulary). The package-database's `Dependency`/`DepPossibility`
//! terms from the design are exactly one level of that: one AND-clause
//! (a [`DepClause`], built from one [`crate::dependency::Relation`]) made up
//! of [`DepPossibility`] values (built from one
//! [`crate::dependency::Package`]).

use crate::dependency::{self, VersionOperator};
use crate::pkghash::arch::ArchHandle;
use crate::pkghash::SetId;
use crate::version::Version;

/// Which control field a [`DepClause`] was read from or will be written to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DepType {
    /// `Suggests`
    Suggests,
    /// `Recommends`
    Recommends,
    /// `Depends`
    Depends,
    /// `Pre-Depends`
    PreDepends,
    /// `Breaks`
    Breaks,
    /// `Conflicts`
    Conflicts,
    /// `Provides`
    Provides,
    /// `Replaces`
    Replaces,
    /// `Enhances`
    Enhances,
}

impl DepType {
    /// Canonical control field name for this dependency type.
    pub fn field_name(self) -> &'static str {
        match self {
            DepType::Suggests => "Suggests",
            DepType::Recommends => "Recommends",
            DepType::Depends => "Depends",
            DepType::PreDepends => "Pre-Depends",
            DepType::Breaks => "Breaks",
            DepType::Conflicts => "Conflicts",
            DepType::Provides => "Provides",
            DepType::Replaces => "Replaces",
            DepType::Enhances => "Enhances",
        }
    }

    /// `true` for the three fields that the design gives an implicit
    /// wildcard architecture qualifier, and that forbid `|` alternatives.
    pub fn is_crossgrade_like(self) -> bool {
        matches!(self, DepType::Breaks | DepType::Conflicts | DepType::Replaces)
    }

    /// `true` for `Provides`, which forbids `|` alternatives and only
    /// allows an `=` (or absent) version relation.
    pub fn is_provides(self) -> bool {
        matches!(self, DepType::Provides)
    }

    /// `true` if this dependency type forbids `|` alternatives.
    pub fn forbids_alternatives(self) -> bool {
        self.is_crossgrade_like() || self.is_provides()
    }
}

/// A relational operator on a package version, per `versionsatisfied3` in
/// `lib/dpkg/vercmp.c`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DepRelOp {
    /// No version constraint at all.
    None,
    /// `=`
    Eq,
    /// `<<`
    Lt,
    /// `<=`
    Le,
    /// `>>`
    Gt,
    /// `>=`
    Ge,
}

impl From<VersionOperator> for DepRelOp {
    fn from(op: VersionOperator) -> Self {
        match op {
            VersionOperator::Equal => DepRelOp::Eq,
            VersionOperator::LessThan => DepRelOp::Lt,
            VersionOperator::LessThanOrEqual => DepRelOp::Le,
            VersionOperator::GreaterThan => DepRelOp::Gt,
            VersionOperator::GreaterThanOrEqual => DepRelOp::Ge,
        }
    }
}

impl DepRelOp {
    /// Evaluate `self` against the result of comparing a candidate version
    /// to the constraint's version (`candidate.cmp(&constraint)`).
    pub fn satisfied_by(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            DepRelOp::None => true,
            DepRelOp::Eq => ord == Equal,
            DepRelOp::Lt => ord == Less,
            DepRelOp::Le => ord != Greater,
            DepRelOp::Gt => ord == Greater,
            DepRelOp::Ge => ord != Less,
        }
    }
}

/// One possibility within a [`DepClause`]'s OR-list: a target package set,
/// an optional architecture qualifier, and an optional version constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepPossibility {
    /// The [`SetId`] this possibility targets. Forward links point here;
    /// [`crate::pkghash::PkgHash::link_deps`] threads the matching reverse
    /// link on the target set.
    pub target: SetId,
    /// Explicit or implicit architecture qualifier (`:arch`).
    pub arch_qual: Option<ArchHandle>,
    /// `true` if `arch_qual` was not written explicitly in the field (the
    /// crossgrade-like types default to a wildcard; others default to the
    /// owning pkgbin's own architecture).
    pub arch_is_implicit: bool,
    /// Version relational operator.
    pub relation: DepRelOp,
    /// Version to compare against, if `relation != DepRelOp::None`.
    pub version: Option<Version>,
}

/// One AND-clause of a dependency field: a list of possibilities, any one
/// of which satisfies the clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepClause {
    /// Which control field this clause belongs to.
    pub kind: DepType,
    /// The OR-list of possibilities.
    pub alternatives: Vec<DepPossibility>,
}

/// Error conditions specific to translating a parsed
/// [`crate::dependency::Dependency`] into [`DepClause`]s against a live
/// [`crate::pkghash::PkgHash`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The underlying dependency grammar failed to parse.
    Parse(dependency::Error),
    /// `|` alternatives are forbidden for this [`DepType`].
    AlternativesForbidden(DepType),
    /// `Provides` allows only `=` or no version relation.
    ProvidesRelationNotExact,
}
crate::errors::error_enum!(Error);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "dependency grammar error: {:?}", e),
            Error::AlternativesForbidden(kind) => {
                write!(f, "'|' alternatives are not allowed in {}", kind.field_name())
            }
            Error::ProvidesRelationNotExact => {
                write!(f, "Provides may only use '=' or no version relation")
            }
        }
    }
}

impl From<dependency::Error> for Error {
    fn from(e: dependency::Error) -> Self {
        Error::Parse(e)
    }
}

/// Parse a raw field value (e.g. the text of a `Depends:` field) into
/// [`DepClause`]s of the given `kind`.
///
/// `resolve_pkg` is expected to look a package name up in (and, if
/// necessary, create a slot for it in) the live
/// [`crate::pkghash::PkgHash`]; `resolve_arch` does the same for an
/// architecture qualifier against the table's
/// [`crate::pkghash::arch::ArchTable`]. Both are passed in as closures
/// rather than `&mut` references so this module stays decoupled from the
/// hash table's own borrow shape.
pub fn parse_field<P, A>(
    kind: DepType,
    value: &str,
    mut resolve_pkg: P,
    mut resolve_arch: A,
) -> Result<Vec<DepClause>, Error>
where
    P: FnMut(&str) -> SetId,
    A: FnMut(&str) -> ArchHandle,
{
    if value.trim().is_empty() {
        return Ok(vec![]);
    }
    let parsed: dependency::Dependency = value.parse()?;
    let mut clauses = Vec::with_capacity(parsed.relations.len());

    for relation in parsed.relations {
        if kind.forbids_alternatives() && relation.packages.len() > 1 {
            return Err(Error::AlternativesForbidden(kind));
        }

        let mut alternatives = Vec::with_capacity(relation.packages.len());
        for pkg in relation.packages {
            let target = resolve_pkg(&pkg.name);

            let (arch_qual, arch_is_implicit) = match &pkg.arch {
                Some(arch) => (Some(resolve_arch(&arch.to_string())), false),
                None => (None, true),
            };

            let (relation_op, version) = match pkg.version_constraint {
                Some(vc) => (DepRelOp::from(vc.operator), Some(vc.version)),
                None => (DepRelOp::None, None),
            };

            if kind.is_provides() && !matches!(relation_op, DepRelOp::None | DepRelOp::Eq) {
                return Err(Error::ProvidesRelationNotExact);
            }

            alternatives.push(DepPossibility {
                target,
                arch_qual,
                arch_is_implicit,
                relation: relation_op,
                version,
            });
        }

        clauses.push(DepClause { kind, alternatives });
    }

    Ok(clauses)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pkghash::arch::ArchTable;

    fn resolver(next: &mut usize) -> impl FnMut(&str) -> SetId + '_ {
        move |_name| {
            let id = SetId::from_raw(*next);
            *next += 1;
            id
        }
    }

    #[test]
    fn simple_depends() {
        let mut n = 0;
        let mut arches = ArchTable::new("amd64");
        let clauses = parse_field(
            DepType::Depends,
            "foo, bar (>= 1.0)",
            resolver(&mut n),
            |a| arches.intern(a),
        )
        .unwrap();
        assert_eq!(2, clauses.len());
        assert_eq!(1, clauses[0].alternatives.len());
        assert_eq!(DepRelOp::Ge, clauses[1].alternatives[0].relation);
    }

    #[test]
    fn alternatives_forbidden_in_conflicts() {
        let mut n = 0;
        let mut arches = ArchTable::new("amd64");
        let err = parse_field(DepType::Conflicts, "foo | bar", resolver(&mut n), |a| {
            arches.intern(a)
        })
        .unwrap_err();
        assert!(matches!(err, Error::AlternativesForbidden(DepType::Conflicts)));
    }

    #[test]
    fn provides_rejects_inequality() {
        let mut n = 0;
        let mut arches = ArchTable::new("amd64");
        let err = parse_field(DepType::Provides, "foo (>= 1.0)", resolver(&mut n), |a| {
            arches.intern(a)
        })
        .unwrap_err();
        assert_eq!(Error::ProvidesRelationNotExact, err);
    }

    #[test]
    fn provides_allows_exact() {
        let mut n = 0;
        let mut arches = ArchTable::new("amd64");
        let clauses = parse_field(DepType::Provides, "foo (= 1.0)", resolver(&mut n), |a| {
            arches.intern(a)
        })
        .unwrap();
        assert_eq!(1, clauses.len());
    }

    #[test]
    fn empty_field_is_no_clauses() {
        let mut n = 0;
        let mut arches = ArchTable::new("amd64");
        let clauses = parse_field(DepType::Suggests, "", resolver(&mut n), |a| arches.intern(a))
            .unwrap();
        assert!(clauses.is_empty());
    }
}

// vim: foldmethod=marker
