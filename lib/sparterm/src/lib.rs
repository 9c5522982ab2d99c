#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]

mod blank_node;
pub mod encoding;
pub mod graph;
mod literal;
mod named_node;
mod namespaces;
mod triple;
mod variable;
pub mod vocab;

pub use crate::blank_node::{BlankNode, BlankNodeIdParseError};
pub use crate::encoding::{encode_iri, is_encoded_iri};
pub use crate::graph::Graph;
pub use crate::literal::{Literal, print_quoted_str};
pub use crate::named_node::NamedNode;
pub use crate::namespaces::Namespaces;
pub use crate::triple::{Quad, Subject, Term, Triple};
pub use crate::variable::{Variable, VariableNameParseError};
pub use oxilangtag::LanguageTagParseError;
pub use oxiri::IriParseError;
