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

//! [`PackageBin`]: the per-architecture package record, plus the table-driven
//! reader/writer that moves it to and from a [`RawParagraph`] stanza.
//!
//! Field dispatch here is a `match` over the (nickname-rewritten, lowercased)
//! field name rather than a literal table of function pointers: the payload
//! types of the known fields (`String`, `Version`, `Vec<DepClause>`,
//! `Vec<Conffile>`, ...) are too heterogeneous to share one function-pointer
//! signature without boxing every field access, which nothing else in this
//! crate does. [`KNOWN_FIELDS`] still plays the role of the design's field
//! table for membership testing and duplicate-field detection, and
//! [`WRITE_ORDER`] fixes the canonical serialization order.

use crate::control::{Priority, RawField, RawParagraph};
use crate::pkghash::arch::{ArchHandle, ArchKind, ArchTable};
use crate::pkghash::conffile::{self, Conffile};
use crate::pkghash::dependency::{self, DepClause, DepType};
use crate::pkghash::status::{self, Status, StatusField, TriggerState, Want};
use crate::pkghash::SetId;
use crate::version::{self, Version};

/// `Multi-Arch` field value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MultiArch {
    /// No multi-arch behavior (the default when the field is absent).
    No,
    /// This package may be co-installed for multiple architectures at once.
    Same,
    /// This package may satisfy a foreign-architecture dependency.
    Foreign,
    /// A foreign-architecture instance of this package may be explicitly
    /// requested.
    Allowed,
}

impl MultiArch {
    fn as_str(self) -> &'static str {
        match self {
            MultiArch::No => "no",
            MultiArch::Same => "same",
            MultiArch::Foreign => "foreign",
            MultiArch::Allowed => "allowed",
        }
    }
}

impl std::fmt::Display for MultiArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MultiArch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Ok(match s {
            "no" => MultiArch::No,
            "same" => MultiArch::Same,
            "foreign" => MultiArch::Foreign,
            "allowed" => MultiArch::Allowed,
            _ => return Err(Error::InvalidMultiArch(s.to_owned())),
        })
    }
}

/// An unrecognized field, preserved verbatim so it can be written back out
/// unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArbitraryField {
    /// Field name exactly as it was read (no nickname rewrite, no case
    /// folding).
    pub name: String,
    /// Raw field value.
    pub value: String,
}

/// Which kind of stanza a [`PackageBin`] is being parsed from. Controls
/// whether a `Status` field is allowed and which fields `pkg_parse_verify`
/// treats as mandatory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StanzaKind {
    /// A stanza from the status file (or its journal).
    Status,
    /// A stanza from an `available`/Packages-style file.
    Available,
}

/// One parsed per-architecture package record.
#[derive(Clone, Debug, PartialEq)]
pub struct PackageBin {
    /// `Package`
    pub package: String,
    /// `Architecture`, defaulted to the interned empty string if absent.
    pub architecture: ArchHandle,
    /// `Multi-Arch`
    pub multi_arch: Option<MultiArch>,
    /// `Essential: yes`
    pub essential: bool,
    /// `Status`, only meaningful for [`StanzaKind::Status`] stanzas.
    pub status: Option<StatusField>,
    /// `Priority`
    pub priority: Option<Priority>,
    /// `Section`
    pub section: Option<String>,
    /// `Installed-Size`, in kibibytes.
    pub installed_size: Option<u64>,
    /// `Origin`
    pub origin: Option<String>,
    /// `Maintainer`
    pub maintainer: Option<String>,
    /// `Bugs`
    pub bugs: Option<String>,
    /// `Source`
    pub source: Option<String>,
    /// `Version`
    pub version: Option<Version>,
    /// `Config-Version`, forbidden when `status` is `installed` or
    /// `not-installed`.
    pub config_version: Option<Version>,
    /// `Description`
    pub description: Option<String>,
    /// `Filename`, as written by a Packages file.
    pub filename: Option<String>,
    /// `Size`, in bytes.
    pub size: Option<u64>,
    /// `MD5sum`
    pub md5sum: Option<String>,
    /// `MSDOS-Filename`
    pub msdos_filename: Option<String>,
    /// All dependency-family clauses, in the order parsed. Writers group
    /// these back out by [`DepType`] into the fixed field order.
    pub dependencies: Vec<DepClause>,
    /// `Conffiles`
    pub conffiles: Vec<Conffile>,
    /// Trigger names this package has pending for itself.
    pub triggers_pending: Vec<String>,
    /// Package names this package is waiting on.
    pub triggers_awaited: Vec<String>,
    /// Unrecognized fields, preserved in the order they were read.
    pub arbitrary: Vec<ArbitraryField>,
}

impl PackageBin {
    fn empty(architecture: ArchHandle) -> Self {
        PackageBin {
            package: String::new(),
            architecture,
            multi_arch: None,
            essential: false,
            status: None,
            priority: None,
            section: None,
            installed_size: None,
            origin: None,
            maintainer: None,
            bugs: None,
            source: None,
            version: None,
            config_version: None,
            description: None,
            filename: None,
            size: None,
            md5sum: None,
            msdos_filename: None,
            dependencies: Vec::new(),
            conffiles: Vec::new(),
            triggers_pending: Vec::new(),
            triggers_awaited: Vec::new(),
            arbitrary: Vec::new(),
        }
    }
}

/// Error conditions reading or verifying a [`PackageBin`] stanza.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The underlying stanza failed to parse at the deb822 level.
    Paragraph(crate::control::Error),
    /// A known field name (post-nickname-rewrite) appeared twice.
    DuplicateField(String),
    /// An unrecognized field name was shorter than the minimum 2 characters.
    FieldNameTooShort(String),
    /// No `Package` field was present.
    MissingPackage,
    /// A field required by this stanza's [`StanzaKind`] was absent.
    MissingRequiredField(&'static str),
    /// `Status` appeared in an `available` stanza.
    StatusInAvailable,
    /// `Multi-Arch: same` combined with `Architecture: all` or an empty
    /// architecture.
    MultiArchSameIncompatibleArch,
    /// A `Config-Version` field was present on a stanza whose status
    /// forbids it.
    ConfigVersionForbidden,
    /// `Multi-Arch` field had an unrecognized value.
    InvalidMultiArch(String),
    /// A `Status` field failed to parse.
    Status(status::Error),
    /// A `Version` or `Config-Version` field failed to parse.
    Version(version::Error),
    /// A dependency-family field failed to parse.
    Dependency(dependency::Error),
    /// A `Conffiles` line failed to parse.
    Conffile(conffile::Error),
    /// A numeric field (`Installed-Size`, `Size`) was not a valid integer.
    InvalidNumber(&'static str, String),
    /// A `Priority` field had an unrecognized value.
    InvalidPriority(String),
    /// A blank line appeared inside a field value.
    BlankLineInValue,
    /// A literal Ctrl-Z (MS-DOS EOF marker) appeared inside a field value.
    ControlZInValue,
}
crate::errors::error_enum!(Error);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Paragraph(e) => write!(f, "malformed stanza: {:?}", e),
            Error::DuplicateField(n) => write!(f, "duplicate field {:?}", n),
            Error::FieldNameTooShort(n) => write!(f, "field name {:?} is too short", n),
            Error::MissingPackage => write!(f, "stanza has no Package field"),
            Error::MissingRequiredField(n) => write!(f, "missing required field {}", n),
            Error::StatusInAvailable => write!(f, "Status field not allowed in available stanza"),
            Error::MultiArchSameIncompatibleArch => {
                write!(f, "Multi-Arch: same is incompatible with Architecture: all or empty")
            }
            Error::ConfigVersionForbidden => {
                write!(f, "Config-Version not allowed for this package's status")
            }
            Error::InvalidMultiArch(v) => write!(f, "invalid Multi-Arch value {:?}", v),
            Error::Status(e) => write!(f, "{}", e),
            Error::Version(e) => write!(f, "{:?}", e),
            Error::Dependency(e) => write!(f, "{}", e),
            Error::Conffile(e) => write!(f, "{}", e),
            Error::InvalidNumber(field, v) => write!(f, "field {} has invalid number {:?}", field, v),
            Error::InvalidPriority(v) => write!(f, "invalid Priority value {:?}", v),
            Error::BlankLineInValue => write!(f, "blank line in field value"),
            Error::ControlZInValue => write!(f, "literal Ctrl-Z in field value"),
        }
    }
}

impl From<status::Error> for Error {
    fn from(e: status::Error) -> Self {
        Error::Status(e)
    }
}
impl From<version::Error> for Error {
    fn from(e: version::Error) -> Self {
        Error::Version(e)
    }
}
impl From<dependency::Error> for Error {
    fn from(e: dependency::Error) -> Self {
        Error::Dependency(e)
    }
}
impl From<conffile::Error> for Error {
    fn from(e: conffile::Error) -> Self {
        Error::Conffile(e)
    }
}

/// Legacy field-name rewrites applied, case-insensitively, before dispatch.
const NICKNAMES: &[(&str, &str)] = &[
    ("recommended", "Recommends"),
    ("optional", "Suggests"),
    ("class", "Priority"),
    ("package-revision", "Revision"),
    ("package_revision", "Revision"),
];

/// Every field name this stanza reader recognizes (post-nickname-rewrite).
/// Anything else, if at least two characters long, is preserved as an
/// [`ArbitraryField`].
const KNOWN_FIELDS: &[&str] = &[
    "package",
    "essential",
    "status",
    "priority",
    "section",
    "installed-size",
    "origin",
    "maintainer",
    "bugs",
    "architecture",
    "multi-arch",
    "source",
    "version",
    "config-version",
    "replaces",
    "provides",
    "depends",
    "pre-depends",
    "recommends",
    "suggests",
    "breaks",
    "conflicts",
    "enhances",
    "conffiles",
    "filename",
    "size",
    "md5sum",
    "msdos-filename",
    "description",
    "triggers-pending",
    "triggers-awaited",
];

/// The canonical write order fixed by the field table, §6 of the design.
const WRITE_ORDER: &[&str] = KNOWN_FIELDS;

fn rewrite_nickname(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    for (from, to) in NICKNAMES {
        if lower == *from {
            return (*to).to_owned();
        }
    }
    name.to_owned()
}

fn multiline_entries(value: &str) -> impl Iterator<Item = &str> {
    value.lines().filter(|l| !l.is_empty())
}

/// Parse one stanza into a [`PackageBin`].
///
/// `resolve_pkg` and `resolve_arch` are threaded through to the dependency
/// reader exactly as in [`dependency::parse_field`]; `arches` additionally
/// resolves this pkgbin's own `Architecture` field.
pub fn parse<P, A>(
    raw: &RawParagraph,
    kind: StanzaKind,
    arches: &mut ArchTable,
    mut resolve_pkg: P,
    mut resolve_arch: A,
) -> Result<PackageBin, Error>
where
    P: FnMut(&str) -> SetId,
    A: FnMut(&mut ArchTable, &str) -> ArchHandle,
{
    let empty_arch = resolve_arch(arches, "");
    let mut pkg = PackageBin::empty(empty_arch);
    let mut seen = std::collections::HashSet::new();
    let mut have_package = false;

    for field in raw.iter() {
        if field.value.contains('\x1a') {
            return Err(Error::ControlZInValue);
        }

        let canonical = rewrite_nickname(&field.key);
        let lower = canonical.to_ascii_lowercase();

        if !KNOWN_FIELDS.contains(&lower.as_str()) {
            if canonical.len() < 2 {
                return Err(Error::FieldNameTooShort(canonical));
            }
            pkg.arbitrary.push(ArbitraryField {
                name: field.key.clone(),
                value: field.value.clone(),
            });
            continue;
        }

        if !seen.insert(lower.clone()) {
            return Err(Error::DuplicateField(canonical));
        }

        read_known_field(&lower, field, kind, &mut pkg, arches, &mut resolve_pkg, &mut resolve_arch)?;
        if lower == "package" {
            have_package = true;
        }
    }

    if !have_package || pkg.package.is_empty() {
        return Err(Error::MissingPackage);
    }

    pkg_parse_verify(&mut pkg, kind, arches)?;
    Ok(pkg)
}

#[allow(clippy::too_many_arguments)]
fn read_known_field<P, A>(
    lower: &str,
    field: &RawField,
    kind: StanzaKind,
    pkg: &mut PackageBin,
    arches: &mut ArchTable,
    resolve_pkg: &mut P,
    resolve_arch: &mut A,
) -> Result<(), Error>
where
    P: FnMut(&str) -> SetId,
    A: FnMut(&mut ArchTable, &str) -> ArchHandle,
{
    let value = field.value.as_str();
    match lower {
        "package" => pkg.package = value.trim().to_owned(),
        "essential" => pkg.essential = value.trim() == "yes",
        "status" => {
            if kind == StanzaKind::Available {
                return Err(Error::StatusInAvailable);
            }
            pkg.status = Some(value.parse::<StatusField>()?);
        }
        "priority" => {
            pkg.priority =
                Some(value.trim().parse::<Priority>().map_err(|_| Error::InvalidPriority(value.to_owned()))?);
        }
        "section" => pkg.section = Some(value.to_owned()),
        "installed-size" => {
            pkg.installed_size = Some(
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| Error::InvalidNumber("Installed-Size", value.to_owned()))?,
            )
        }
        "origin" => pkg.origin = Some(value.to_owned()),
        "maintainer" => pkg.maintainer = Some(value.to_owned()),
        "bugs" => pkg.bugs = Some(value.to_owned()),
        "architecture" => pkg.architecture = resolve_arch(arches, value.trim()),
        "multi-arch" => pkg.multi_arch = Some(value.trim().parse::<MultiArch>()?),
        "source" => pkg.source = Some(value.to_owned()),
        "version" => pkg.version = Some(value.trim().parse::<Version>()?),
        "config-version" => pkg.config_version = Some(value.trim().parse::<Version>()?),
        "replaces" | "provides" | "depends" | "pre-depends" | "recommends" | "suggests" | "breaks"
        | "conflicts" | "enhances" => {
            let dep_type = dep_type_for_field(lower);
            let mut clauses = dependency::parse_field(
                dep_type,
                value,
                |name| resolve_pkg(name),
                |name| resolve_arch(arches, name),
            )?;
            pkg.dependencies.append(&mut clauses);
        }
        "conffiles" => {
            for line in multiline_entries(value) {
                pkg.conffiles.push(Conffile::parse_line(line)?);
            }
        }
        "filename" => pkg.filename = Some(value.to_owned()),
        "size" => {
            pkg.size = Some(
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| Error::InvalidNumber("Size", value.to_owned()))?,
            )
        }
        "md5sum" => pkg.md5sum = Some(value.trim().to_owned()),
        "msdos-filename" => pkg.msdos_filename = Some(value.to_owned()),
        "description" => pkg.description = Some(value.to_owned()),
        "triggers-pending" => {
            pkg.triggers_pending = multiline_entries(value).map(|s| s.to_owned()).collect();
        }
        "triggers-awaited" => {
            pkg.triggers_awaited = multiline_entries(value).map(|s| s.to_owned()).collect();
        }
        _ => unreachable!("field {:?} is in KNOWN_FIELDS but not dispatched", lower),
    }
    Ok(())
}

fn dep_type_for_field(lower: &str) -> DepType {
    match lower {
        "replaces" => DepType::Replaces,
        "provides" => DepType::Provides,
        "depends" => DepType::Depends,
        "pre-depends" => DepType::PreDepends,
        "recommends" => DepType::Recommends,
        "suggests" => DepType::Suggests,
        "breaks" => DepType::Breaks,
        "conflicts" => DepType::Conflicts,
        "enhances" => DepType::Enhances,
        _ => unreachable!(),
    }
}

fn pkg_parse_verify(pkg: &mut PackageBin, kind: StanzaKind, arches: &ArchTable) -> Result<(), Error> {
    let requires_full_metadata = match kind {
        StanzaKind::Available => true,
        StanzaKind::Status => pkg
            .status
            .map(|s| s.status != Status::NotInstalled)
            .unwrap_or(false),
    };

    if requires_full_metadata {
        if pkg.description.is_none() {
            return Err(Error::MissingRequiredField("Description"));
        }
        if pkg.maintainer.is_none() {
            return Err(Error::MissingRequiredField("Maintainer"));
        }
        if pkg.version.is_none() {
            return Err(Error::MissingRequiredField("Version"));
        }
    }

    if let Some(MultiArch::Same) = pkg.multi_arch {
        match arches.kind(pkg.architecture) {
            ArchKind::All | ArchKind::Empty => return Err(Error::MultiArchSameIncompatibleArch),
            _ => {}
        }
    }

    if let Some(status) = pkg.status {
        if pkg.config_version.is_some() && status.status.forbids_config_version() {
            return Err(Error::ConfigVersionForbidden);
        }

        let trigger_state = TriggerState {
            pending: pkg.triggers_pending.clone(),
            awaited: pkg.triggers_awaited.clone(),
        };
        trigger_state.check(status.status)?;

        if status.status == Status::NotInstalled {
            if !pkg.conffiles.is_empty() {
                log::warn!(
                    "package {} is not-installed but has Conffiles; scrubbing",
                    pkg.package
                );
                pkg.conffiles.clear();
            }

            if matches!(arches.kind(pkg.architecture), ArchKind::Empty | ArchKind::None)
                && !matches!(status.want, Want::Unknown)
            {
                log::warn!(
                    "package {} is not-installed with no arch qualifier; downgrading want to unknown",
                    pkg.package
                );
                pkg.status = Some(StatusField {
                    want: Want::Unknown,
                    ..status
                });
            }
        }
    }

    Ok(())
}

/// Render this `PackageBin` back to a [`RawParagraph`] in the fixed
/// canonical field order.
///
/// `resolve_name` looks a [`SetId`] back up to its package name; dependency
/// possibilities only carry the id, so the writer needs this to render
/// `Depends:`-family fields.
pub fn to_raw_paragraph<N>(pkg: &PackageBin, arches: &ArchTable, mut resolve_name: N) -> RawParagraph
where
    N: FnMut(SetId) -> String,
{
    let mut fields = Vec::new();
    let push = |fields: &mut Vec<RawField>, key: &str, value: String| {
        fields.push(RawField {
            key: key.to_owned(),
            value,
        });
    };

    for name in WRITE_ORDER {
        match *name {
            "package" => push(&mut fields, "Package", pkg.package.clone()),
            "essential" => {
                if pkg.essential {
                    push(&mut fields, "Essential", "yes".to_owned());
                }
            }
            "status" => {
                if let Some(s) = pkg.status {
                    push(&mut fields, "Status", s.to_string());
                }
            }
            "priority" => {
                if let Some(p) = pkg.priority {
                    push(&mut fields, "Priority", p.to_string());
                }
            }
            "section" => {
                if let Some(v) = &pkg.section {
                    push(&mut fields, "Section", v.clone());
                }
            }
            "installed-size" => {
                if let Some(v) = pkg.installed_size {
                    push(&mut fields, "Installed-Size", v.to_string());
                }
            }
            "origin" => {
                if let Some(v) = &pkg.origin {
                    push(&mut fields, "Origin", v.clone());
                }
            }
            "maintainer" => {
                if let Some(v) = &pkg.maintainer {
                    push(&mut fields, "Maintainer", v.clone());
                }
            }
            "bugs" => {
                if let Some(v) = &pkg.bugs {
                    push(&mut fields, "Bugs", v.clone());
                }
            }
            "architecture" => {
                let name = arches.name(pkg.architecture);
                if !name.is_empty() {
                    push(&mut fields, "Architecture", name.to_owned());
                }
            }
            "multi-arch" => {
                if let Some(m) = pkg.multi_arch {
                    push(&mut fields, "Multi-Arch", m.to_string());
                }
            }
            "source" => {
                if let Some(v) = &pkg.source {
                    push(&mut fields, "Source", v.clone());
                }
            }
            "version" => {
                if let Some(v) = &pkg.version {
                    push(&mut fields, "Version", v.to_string());
                }
            }
            "config-version" => {
                if let Some(v) = &pkg.config_version {
                    push(&mut fields, "Config-Version", v.to_string());
                }
            }
            "replaces" | "provides" | "depends" | "pre-depends" | "recommends" | "suggests" | "breaks"
            | "conflicts" | "enhances" => {
                let dep_type = dep_type_for_field(name);
                let rendered = render_dep_field(pkg, dep_type, arches, &mut resolve_name);
                if let Some(rendered) = rendered {
                    push(&mut fields, dep_type.field_name(), rendered);
                }
            }
            "conffiles" => {
                if !pkg.conffiles.is_empty() {
                    let mut v = String::new();
                    for c in &pkg.conffiles {
                        v.push('\n');
                        v.push_str(&c.to_line());
                    }
                    push(&mut fields, "Conffiles", v);
                }
            }
            "filename" => {
                if let Some(v) = &pkg.filename {
                    push(&mut fields, "Filename", v.clone());
                }
            }
            "size" => {
                if let Some(v) = pkg.size {
                    push(&mut fields, "Size", v.to_string());
                }
            }
            "md5sum" => {
                if let Some(v) = &pkg.md5sum {
                    push(&mut fields, "MD5sum", v.clone());
                }
            }
            "msdos-filename" => {
                if let Some(v) = &pkg.msdos_filename {
                    push(&mut fields, "MSDOS-Filename", v.clone());
                }
            }
            "description" => {
                if let Some(v) = &pkg.description {
                    push(&mut fields, "Description", v.clone());
                }
            }
            "triggers-pending" => {
                if !pkg.triggers_pending.is_empty() {
                    let v = pkg
                        .triggers_pending
                        .iter()
                        .fold(String::new(), |mut acc, t| {
                            acc.push('\n');
                            acc.push_str(t);
                            acc
                        });
                    push(&mut fields, "Triggers-Pending", v);
                }
            }
            "triggers-awaited" => {
                if !pkg.triggers_awaited.is_empty() {
                    let v = pkg
                        .triggers_awaited
                        .iter()
                        .fold(String::new(), |mut acc, t| {
                            acc.push('\n');
                            acc.push_str(t);
                            acc
                        });
                    push(&mut fields, "Triggers-Awaited", v);
                }
            }
            _ => unreachable!(),
        }
    }

    for arb in &pkg.arbitrary {
        push(&mut fields, &arb.name, arb.value.clone());
    }

    RawParagraph { fields }
}

fn render_dep_field<N>(pkg: &PackageBin, kind: DepType, arches: &ArchTable, resolve_name: &mut N) -> Option<String>
where
    N: FnMut(SetId) -> String,
{
    let clauses: Vec<&DepClause> = pkg.dependencies.iter().filter(|c| c.kind == kind).collect();
    if clauses.is_empty() {
        return None;
    }
    let rendered: Vec<String> = clauses
        .iter()
        .map(|clause| {
            clause
                .alternatives
                .iter()
                .map(|alt| render_possibility(alt, arches, resolve_name))
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect();
    Some(rendered.join(", "))
}

fn render_possibility<N>(alt: &dependency::DepPossibility, arches: &ArchTable, resolve_name: &mut N) -> String
where
    N: FnMut(SetId) -> String,
{
    let mut s = resolve_name(alt.target);
    if !alt.arch_is_implicit {
        if let Some(arch) = alt.arch_qual {
            s.push(':');
            s.push_str(arches.name(arch));
        }
    }
    if alt.relation != dependency::DepRelOp::None {
        if let Some(v) = &alt.version {
            s.push_str(&format!(" ({} {})", rel_op_str(alt.relation), v));
        }
    }
    s
}

fn rel_op_str(op: dependency::DepRelOp) -> &'static str {
    use dependency::DepRelOp::*;
    match op {
        None => "",
        Eq => "=",
        Lt => "<<",
        Le => "<=",
        Gt => ">>",
        Ge => ">=",
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pkghash::SetId;

    fn resolver(next: &mut usize) -> impl FnMut(&str) -> SetId + '_ {
        move |_name| {
            let id = SetId::from_raw(*next);
            *next += 1;
            id
        }
    }

    #[test]
    fn parse_minimal_status_stanza() {
        let raw = RawParagraph::parse(
            "Package: foo\nStatus: install ok installed\nPriority: optional\nSection: utils\nInstalled-Size: 42\nMaintainer: Someone <a@b.c>\nArchitecture: amd64\nVersion: 1.0-1\nDescription: a thing\n",
        )
        .unwrap();

        let mut arches = ArchTable::new("amd64");
        let mut n = 0;
        let pkg = parse(
            &raw,
            StanzaKind::Status,
            &mut arches,
            resolver(&mut n),
            |arches, name| arches.intern(name),
        )
        .unwrap();

        assert_eq!("foo", pkg.package);
        assert_eq!(Some(Priority::Optional), pkg.priority);
        assert_eq!(Status::Installed, pkg.status.unwrap().status);
        assert_eq!("amd64", arches.name(pkg.architecture));
    }

    #[test]
    fn missing_package_errors() {
        let raw = RawParagraph::parse("Version: 1.0\n").unwrap();
        let mut arches = ArchTable::new("amd64");
        let mut n = 0;
        let err = parse(
            &raw,
            StanzaKind::Status,
            &mut arches,
            resolver(&mut n),
            |arches, name| arches.intern(name),
        )
        .unwrap_err();
        assert_eq!(Error::MissingPackage, err);
    }

    #[test]
    fn status_in_available_is_rejected() {
        let raw = RawParagraph::parse("Package: foo\nStatus: install ok installed\n").unwrap();
        let mut arches = ArchTable::new("amd64");
        let mut n = 0;
        let err = parse(
            &raw,
            StanzaKind::Available,
            &mut arches,
            resolver(&mut n),
            |arches, name| arches.intern(name),
        )
        .unwrap_err();
        assert_eq!(Error::StatusInAvailable, err);
    }

    #[test]
    fn duplicate_field_errors() {
        let raw = RawParagraph::parse("Package: foo\nPackage: bar\n").unwrap();
        let mut arches = ArchTable::new("amd64");
        let mut n = 0;
        let err = parse(
            &raw,
            StanzaKind::Status,
            &mut arches,
            resolver(&mut n),
            |arches, name| arches.intern(name),
        )
        .unwrap_err();
        assert_eq!(Error::DuplicateField("Package".to_owned()), err);
    }

    #[test]
    fn nickname_rewrite_applies() {
        let raw = RawParagraph::parse("Package: foo\nOptional: bar\n").unwrap();
        let mut arches = ArchTable::new("amd64");
        let mut n = 0;
        let pkg = parse(
            &raw,
            StanzaKind::Status,
            &mut arches,
            resolver(&mut n),
            |arches, name| arches.intern(name),
        )
        .unwrap();
        assert_eq!(1, pkg.dependencies.iter().filter(|c| c.kind == DepType::Suggests).count());
    }

    #[test]
    fn unknown_field_too_short_errors() {
        let raw = RawParagraph::parse("Package: foo\nX: 1\n").unwrap();
        let mut arches = ArchTable::new("amd64");
        let mut n = 0;
        let err = parse(
            &raw,
            StanzaKind::Status,
            &mut arches,
            resolver(&mut n),
            |arches, name| arches.intern(name),
        )
        .unwrap_err();
        assert_eq!(Error::FieldNameTooShort("X".to_owned()), err);
    }

    #[test]
    fn arbitrary_field_preserved() {
        let raw = RawParagraph::parse("Package: foo\nXb-Custom: hello\n").unwrap();
        let mut arches = ArchTable::new("amd64");
        let mut n = 0;
        let pkg = parse(
            &raw,
            StanzaKind::Status,
            &mut arches,
            resolver(&mut n),
            |arches, name| arches.intern(name),
        )
        .unwrap();
        assert_eq!("Xb-Custom", pkg.arbitrary[0].name);
        assert_eq!("hello", pkg.arbitrary[0].value);
    }

    #[test]
    fn conffiles_scrubbed_for_not_installed() {
        let raw = RawParagraph::parse(
            "Package: foo\nStatus: purge ok not-installed\nConffiles:\n /etc/foo.conf deadbeefdeadbeefdeadbeefdeadbeef\n",
        )
        .unwrap();
        let mut arches = ArchTable::new("amd64");
        let mut n = 0;
        let pkg = parse(
            &raw,
            StanzaKind::Status,
            &mut arches,
            resolver(&mut n),
            |arches, name| arches.intern(name),
        )
        .unwrap();
        assert!(pkg.conffiles.is_empty());
    }

    #[test]
    fn multi_arch_same_rejects_empty_arch() {
        let raw = RawParagraph::parse("Package: foo\nMulti-Arch: same\n").unwrap();
        let mut arches = ArchTable::new("amd64");
        let mut n = 0;
        let err = parse(
            &raw,
            StanzaKind::Status,
            &mut arches,
            resolver(&mut n),
            |arches, name| arches.intern(name),
        )
        .unwrap_err();
        assert_eq!(Error::MultiArchSameIncompatibleArch, err);
    }

    #[test]
    fn roundtrip_write() {
        let raw = RawParagraph::parse(
            "Package: foo\nStatus: install ok installed\nPriority: optional\nMaintainer: Someone <a@b.c>\nArchitecture: amd64\nVersion: 1.0-1\nDescription: a thing\n",
        )
        .unwrap();
        let mut arches = ArchTable::new("amd64");
        let mut n = 0;
        let pkg = parse(
            &raw,
            StanzaKind::Status,
            &mut arches,
            resolver(&mut n),
            |arches, name| arches.intern(name),
        )
        .unwrap();
        let written = to_raw_paragraph(&pkg, &arches, |_id| "unused".to_owned());
        assert_eq!("foo", written.field("Package").next().unwrap().value);
        assert_eq!("1.0-1", written.field("Version").next().unwrap().value);
    }
}

// vim: foldmethod=marker
