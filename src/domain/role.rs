use std::fmt;

use serde::Serialize;

/// The kinds of objects that object description directives declare.
///
/// Each kind is its own anchor namespace, so `.. query:: $and` and
/// `.. expression:: $and` never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// A database command (`dbcommand`).
    #[serde(rename = "dbcommand")]
    Command,
    /// A shell method.
    Method,
    /// A free function.
    Function,
    /// A generic operator.
    Operator,
    /// A query operator.
    Query,
    /// An update operator.
    Update,
    /// A projection operator.
    Projection,
    /// An aggregation expression operator.
    Expression,
    /// An aggregation pipeline stage.
    Pipeline,
    /// A program or binary.
    Program,
    /// A configuration file setting.
    Setting,
    /// A server parameter.
    Parameter,
    /// A command-line option.
    Option,
    /// A data structure or field.
    Data,
    /// A glossary term.
    Term,
}

impl ObjectKind {
    /// Maps a directive name onto the object kind it declares.
    ///
    /// Glossary terms are declared by the entries of a `glossary` directive
    /// rather than a directive of their own, so [`ObjectKind::Term`] is never
    /// returned here.
    #[must_use]
    pub fn from_directive(name: &str) -> Option<Self> {
        let kind = match name {
            "dbcommand" => Self::Command,
            "method" => Self::Method,
            "function" => Self::Function,
            "operator" => Self::Operator,
            "query" => Self::Query,
            "update" => Self::Update,
            "projection" => Self::Projection,
            "expression" => Self::Expression,
            "pipeline" => Self::Pipeline,
            "program" | "binary" => Self::Program,
            "setting" => Self::Setting,
            "parameter" => Self::Parameter,
            "option" => Self::Option,
            "data" => Self::Data,
            _ => return None,
        };
        Some(kind)
    }

    /// The name used for this namespace in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Command => "dbcommand",
            Self::Method => "method",
            Self::Function => "function",
            Self::Operator => "operator",
            Self::Query => "query",
            Self::Update => "update",
            Self::Projection => "projection",
            Self::Expression => "expression",
            Self::Pipeline => "pipeline",
            Self::Program => "program",
            Self::Setting => "setting",
            Self::Parameter => "parameter",
            Self::Option => "option",
            Self::Data => "data",
            Self::Term => "term",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed vocabulary of inline roles.
///
/// Every kind has exactly one resolution strategy:
///
/// - [`RoleKind::Doc`] targets a document in the corpus
/// - [`RoleKind::Ref`] targets an explicit or section anchor
/// - [`RoleKind::Object`] targets an object declared by a directive of the same
///   kind
/// - [`RoleKind::Issue`] and [`RoleKind::Link`] point outside the corpus and
///   only resolve through the external allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    /// A link to another document.
    Doc,
    /// A link to a labelled location.
    Ref,
    /// A link to an object description.
    Object(ObjectKind),
    /// An issue tracker identifier.
    Issue,
    /// A link into an external site.
    Link,
}

impl RoleKind {
    /// Looks up a role name in the vocabulary.
    ///
    /// Domain-qualified names (`:mongodb:dbcommand:`) are matched on their
    /// last component.
    #[must_use]
    pub fn from_role_name(name: &str) -> Option<Self> {
        let name = name.rsplit(':').next().unwrap_or(name);
        let kind = match name {
            "doc" => Self::Doc,
            "ref" => Self::Ref,
            "issue" => Self::Issue,
            "manual" | "api" | "wiki" | "dochub" | "website" | "source" | "ecosystem" | "driver" => {
                Self::Link
            }
            "command" => Self::Object(ObjectKind::Command),
            "func" => Self::Object(ObjectKind::Function),
            "term" => Self::Object(ObjectKind::Term),
            other => Self::Object(ObjectKind::from_directive(other)?),
        };
        Some(kind)
    }
}
