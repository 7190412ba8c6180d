//! XSD built-in types
//!
//! The built-in type hierarchy rooted at xs:anyType. Bindings for these
//! types live in [`crate::bindings::xs`]; this module only provides the
//! definitions the binding walker climbs through.

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::codecs::WhiteSpace;
use crate::namespaces::QName;

use super::facets::FacetSet;
use super::types::{ComplexTypeDef, ContentModel, SimpleDerivation, SimpleTypeDef, TypeDefinition, TypeRef};

// =============================================================================
// Type names
// =============================================================================

/// XSD anyType type name
pub const XSD_ANY_TYPE: &str = "anyType";
/// XSD anySimpleType type name
pub const XSD_ANY_SIMPLE_TYPE: &str = "anySimpleType";

/// XSD string type name
pub const XSD_STRING: &str = "string";
/// XSD normalizedString type name
pub const XSD_NORMALIZED_STRING: &str = "normalizedString";
/// XSD token type name
pub const XSD_TOKEN: &str = "token";
/// XSD language type name
pub const XSD_LANGUAGE: &str = "language";
/// XSD Name type name
pub const XSD_NAME: &str = "Name";
/// XSD NCName type name
pub const XSD_NCNAME: &str = "NCName";
/// XSD ID type name
pub const XSD_ID: &str = "ID";
/// XSD IDREF type name
pub const XSD_IDREF: &str = "IDREF";
/// XSD IDREFS type name
pub const XSD_IDREFS: &str = "IDREFS";
/// XSD ENTITY type name
pub const XSD_ENTITY: &str = "ENTITY";
/// XSD ENTITIES type name
pub const XSD_ENTITIES: &str = "ENTITIES";
/// XSD NMTOKEN type name
pub const XSD_NMTOKEN: &str = "NMTOKEN";
/// XSD NMTOKENS type name
pub const XSD_NMTOKENS: &str = "NMTOKENS";

/// XSD boolean type name
pub const XSD_BOOLEAN: &str = "boolean";

/// XSD decimal type name
pub const XSD_DECIMAL: &str = "decimal";
/// XSD integer type name
pub const XSD_INTEGER: &str = "integer";
/// XSD long type name
pub const XSD_LONG: &str = "long";
/// XSD int type name
pub const XSD_INT: &str = "int";
/// XSD short type name
pub const XSD_SHORT: &str = "short";
/// XSD byte type name
pub const XSD_BYTE: &str = "byte";
/// XSD nonNegativeInteger type name
pub const XSD_NON_NEGATIVE_INTEGER: &str = "nonNegativeInteger";
/// XSD positiveInteger type name
pub const XSD_POSITIVE_INTEGER: &str = "positiveInteger";
/// XSD unsignedLong type name
pub const XSD_UNSIGNED_LONG: &str = "unsignedLong";
/// XSD unsignedInt type name
pub const XSD_UNSIGNED_INT: &str = "unsignedInt";
/// XSD unsignedShort type name
pub const XSD_UNSIGNED_SHORT: &str = "unsignedShort";
/// XSD unsignedByte type name
pub const XSD_UNSIGNED_BYTE: &str = "unsignedByte";
/// XSD nonPositiveInteger type name
pub const XSD_NON_POSITIVE_INTEGER: &str = "nonPositiveInteger";
/// XSD negativeInteger type name
pub const XSD_NEGATIVE_INTEGER: &str = "negativeInteger";
/// XSD float type name
pub const XSD_FLOAT: &str = "float";
/// XSD double type name
pub const XSD_DOUBLE: &str = "double";

/// XSD duration type name
pub const XSD_DURATION: &str = "duration";
/// XSD dateTime type name
pub const XSD_DATETIME: &str = "dateTime";
/// XSD date type name
pub const XSD_DATE: &str = "date";
/// XSD time type name
pub const XSD_TIME: &str = "time";
/// XSD gYearMonth type name
pub const XSD_GYEAR_MONTH: &str = "gYearMonth";
/// XSD gYear type name
pub const XSD_GYEAR: &str = "gYear";
/// XSD gMonthDay type name
pub const XSD_GMONTH_DAY: &str = "gMonthDay";
/// XSD gDay type name
pub const XSD_GDAY: &str = "gDay";
/// XSD gMonth type name
pub const XSD_GMONTH: &str = "gMonth";

/// XSD hexBinary type name
pub const XSD_HEX_BINARY: &str = "hexBinary";
/// XSD base64Binary type name
pub const XSD_BASE64_BINARY: &str = "base64Binary";
/// XSD anyURI type name
pub const XSD_ANY_URI: &str = "anyURI";
/// XSD QName type name
pub const XSD_QNAME: &str = "QName";
/// XSD NOTATION type name
pub const XSD_NOTATION: &str = "NOTATION";

const PRIMITIVES: &[&str] = &[
    XSD_STRING,
    XSD_BOOLEAN,
    XSD_DECIMAL,
    XSD_FLOAT,
    XSD_DOUBLE,
    XSD_DURATION,
    XSD_DATETIME,
    XSD_TIME,
    XSD_DATE,
    XSD_GYEAR_MONTH,
    XSD_GYEAR,
    XSD_GMONTH_DAY,
    XSD_GDAY,
    XSD_GMONTH,
    XSD_HEX_BINARY,
    XSD_BASE64_BINARY,
    XSD_ANY_URI,
    XSD_QNAME,
    XSD_NOTATION,
];

/// (name, base) for the derived built-in atomic types
const DERIVED: &[(&str, &str)] = &[
    (XSD_NORMALIZED_STRING, XSD_STRING),
    (XSD_TOKEN, XSD_NORMALIZED_STRING),
    (XSD_LANGUAGE, XSD_TOKEN),
    (XSD_NMTOKEN, XSD_TOKEN),
    (XSD_NAME, XSD_TOKEN),
    (XSD_NCNAME, XSD_NAME),
    (XSD_ID, XSD_NCNAME),
    (XSD_IDREF, XSD_NCNAME),
    (XSD_ENTITY, XSD_NCNAME),
    (XSD_INTEGER, XSD_DECIMAL),
    (XSD_NON_POSITIVE_INTEGER, XSD_INTEGER),
    (XSD_NEGATIVE_INTEGER, XSD_NON_POSITIVE_INTEGER),
    (XSD_LONG, XSD_INTEGER),
    (XSD_INT, XSD_LONG),
    (XSD_SHORT, XSD_INT),
    (XSD_BYTE, XSD_SHORT),
    (XSD_NON_NEGATIVE_INTEGER, XSD_INTEGER),
    (XSD_UNSIGNED_LONG, XSD_NON_NEGATIVE_INTEGER),
    (XSD_UNSIGNED_INT, XSD_UNSIGNED_LONG),
    (XSD_UNSIGNED_SHORT, XSD_UNSIGNED_INT),
    (XSD_UNSIGNED_BYTE, XSD_UNSIGNED_SHORT),
    (XSD_POSITIVE_INTEGER, XSD_NON_NEGATIVE_INTEGER),
];

/// (name, item type) for the built-in list types
const LISTS: &[(&str, &str)] = &[
    (XSD_NMTOKENS, XSD_NMTOKEN),
    (XSD_IDREFS, XSD_IDREF),
    (XSD_ENTITIES, XSD_ENTITY),
];

static BUILTIN_TYPES: Lazy<IndexMap<QName, Arc<TypeDefinition>>> = Lazy::new(|| {
    let mut types = IndexMap::new();
    let mut add = |def: TypeDefinition| {
        if let Some(name) = def.name().cloned() {
            types.insert(name, Arc::new(def));
        }
    };

    add(TypeDefinition::Complex(
        ComplexTypeDef {
            mixed: true,
            any_attribute: true,
            ..ComplexTypeDef::new(Some(QName::xs(XSD_ANY_TYPE)))
        }
        .with_content(ContentModel::Any),
    ));
    add(TypeDefinition::Simple(SimpleTypeDef {
        name: Some(QName::xs(XSD_ANY_SIMPLE_TYPE)),
        derivation: SimpleDerivation::Primitive,
        facets: FacetSet::new(),
    }));

    for name in PRIMITIVES {
        let white_space = if *name == XSD_STRING {
            WhiteSpace::Preserve
        } else {
            WhiteSpace::Collapse
        };
        add(TypeDefinition::Simple(SimpleTypeDef {
            name: Some(QName::xs(*name)),
            derivation: SimpleDerivation::Primitive,
            facets: FacetSet::new().with_white_space(white_space),
        }));
    }

    for (name, base) in DERIVED {
        let facets = match *name {
            XSD_NORMALIZED_STRING => FacetSet::new().with_white_space(WhiteSpace::Replace),
            XSD_TOKEN => FacetSet::new().with_white_space(WhiteSpace::Collapse),
            _ => FacetSet::new(),
        };
        add(TypeDefinition::Simple(
            SimpleTypeDef::restriction(Some(QName::xs(*name)), TypeRef::xs(base)).with_facets(facets),
        ));
    }

    for (name, item) in LISTS {
        let facets = FacetSet {
            min_length: Some(1),
            white_space: Some(WhiteSpace::Collapse),
            ..Default::default()
        };
        add(TypeDefinition::Simple(
            SimpleTypeDef::list(Some(QName::xs(*name)), TypeRef::xs(item)).with_facets(facets),
        ));
    }

    types
});

/// Look up a built-in type definition
pub fn builtin_type(name: &QName) -> Option<Arc<TypeDefinition>> {
    if !name.is_xs() {
        return None;
    }
    BUILTIN_TYPES.get(name).cloned()
}

/// Whether `name` names a built-in type
pub fn is_builtin(name: &QName) -> bool {
    name.is_xs() && BUILTIN_TYPES.contains_key(name)
}

/// Names of all built-in types, anyType first
pub fn builtin_type_names() -> impl Iterator<Item = &'static QName> {
    BUILTIN_TYPES.keys()
}

/// xs:anyType
pub fn any_type() -> Arc<TypeDefinition> {
    match BUILTIN_TYPES.get(&QName::xs(XSD_ANY_TYPE)) {
        Some(def) => def.clone(),
        None => Arc::new(TypeDefinition::Complex(
            ComplexTypeDef::new(Some(QName::xs(XSD_ANY_TYPE))).with_content(ContentModel::Any),
        )),
    }
}
