//! IRIs of the vocabularies the serializers and parsers need to know about.

pub mod rdf {
    //! [RDF](https://www.w3.org/TR/rdf11-concepts/) vocabulary.

    /// The namespace of the RDF vocabulary.
    pub const NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    /// The first item in the subject RDF list.
    pub const FIRST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#first";
    /// The empty list.
    pub const NIL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#nil";
    /// The object of the subject RDF statement.
    pub const OBJECT: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#object";
    /// The predicate of the subject RDF statement.
    pub const PREDICATE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#predicate";
    /// The rest of the subject RDF list after the first item.
    pub const REST: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#rest";
    /// The class of RDF statements.
    pub const STATEMENT: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Statement";
    /// The subject of the subject RDF statement.
    pub const SUBJECT: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#subject";
    /// The subject is an instance of a class.
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    /// The datatype of XML literal values.
    pub const XML_LITERAL: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#XMLLiteral";
}

pub mod xsd {
    //! [RDF compatible XSD datatypes](https://www.w3.org/TR/rdf11-concepts/#dfn-rdf-compatible-xsd-types).

    /// The namespace of the XSD datatypes.
    pub const NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema#";
    /// Character strings.
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    /// true, false
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    /// Integer numbers.
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    /// 64-bit floating point numbers.
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    /// Arbitrary-precision decimal numbers.
    pub const DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    /// 32-bit floating point numbers.
    pub const FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
}
