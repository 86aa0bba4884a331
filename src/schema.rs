//! Response specs — the machine-checkable description of the caller's
//! desired output shape.
//!
//! A [`ResponseSpec`] is a closed grammar over primitives, objects, lists,
//! and optionals. Callers declare their target type by implementing
//! [`ResponseModel`] (blanket impls cover primitives, `Vec<T>`, and
//! `Option<T>`; structs build an [`ObjectSpec`]). The spec drives both the
//! schema document embedded in prompts ([`describe`]) and payload
//! validation ([`validate`](crate::validate::validate)).

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::error::{ForgeError, Result};

/// Nesting bound for spec graphs. A declaration deeper than this is treated
/// as cyclic or runaway and rejected rather than guessed at.
const MAX_DEPTH: usize = 32;

/// The closed grammar of supported output shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseSpec {
    /// JSON boolean.
    Bool,
    /// JSON integer (no fractional part).
    Integer,
    /// JSON number.
    Number,
    /// JSON string.
    String,
    /// The inner shape or JSON null.
    Optional(Box<ResponseSpec>),
    /// JSON array with homogeneous elements.
    List(Box<ResponseSpec>),
    /// JSON object with declared fields.
    Object(ObjectSpec),
}

impl ResponseSpec {
    /// Shorthand for a list spec.
    pub fn list(element: ResponseSpec) -> Self {
        ResponseSpec::List(Box::new(element))
    }

    /// Shorthand for an optional spec.
    pub fn optional(inner: ResponseSpec) -> Self {
        ResponseSpec::Optional(Box::new(inner))
    }

    /// Human-readable name of the expected JSON shape, used in
    /// validation messages.
    pub fn expected(&self) -> &'static str {
        match self {
            ResponseSpec::Bool => "boolean",
            ResponseSpec::Integer => "integer",
            ResponseSpec::Number => "number",
            ResponseSpec::String => "string",
            ResponseSpec::Optional(inner) => inner.expected(),
            ResponseSpec::List(_) => "array",
            ResponseSpec::Object(_) => "object",
        }
    }

    /// Whether this spec accepts JSON null.
    pub fn is_optional(&self) -> bool {
        matches!(self, ResponseSpec::Optional(_))
    }
}

/// An object shape: a named set of field descriptors.
///
/// Built with a chained builder:
///
/// ```
/// use structforge::schema::{ObjectSpec, ResponseSpec};
///
/// let spec = ObjectSpec::new("User")
///     .field("name", ResponseSpec::String)
///     .field_described("age", ResponseSpec::Integer, "Age in whole years");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSpec {
    /// Type name, used as the schema document title.
    pub name: String,
    /// Field descriptors in declaration order.
    pub fields: Vec<FieldSpec>,
}

/// One field of an [`ObjectSpec`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// JSON property name.
    pub name: String,
    /// Shape of the field value. `Optional` fields are not required.
    pub spec: ResponseSpec,
    /// Optional description embedded in the schema document for prompting.
    pub description: Option<String>,
}

impl ObjectSpec {
    /// Create an empty object spec with the given type name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field.
    pub fn field(mut self, name: impl Into<String>, spec: ResponseSpec) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            spec,
            description: None,
        });
        self
    }

    /// Add a field with a description used for prompting.
    pub fn field_described(
        mut self,
        name: impl Into<String>,
        spec: ResponseSpec,
        description: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            spec,
            description: Some(description.into()),
        });
        self
    }
}

impl From<ObjectSpec> for ResponseSpec {
    fn from(obj: ObjectSpec) -> Self {
        ResponseSpec::Object(obj)
    }
}

/// A caller-declared response type: deserializable, with a spec describing
/// its JSON shape.
///
/// Primitives, `Vec<T>`, and `Option<T>` are covered by blanket impls.
/// Structs implement `spec()` with the [`ObjectSpec`] builder:
///
/// ```
/// use serde::Deserialize;
/// use structforge::schema::{ObjectSpec, ResponseModel, ResponseSpec};
///
/// #[derive(Debug, Deserialize, PartialEq)]
/// struct User {
///     name: String,
///     age: i64,
/// }
///
/// impl ResponseModel for User {
///     fn spec() -> ResponseSpec {
///         ObjectSpec::new("User")
///             .field("name", ResponseSpec::String)
///             .field("age", ResponseSpec::Integer)
///             .into()
///     }
/// }
/// ```
pub trait ResponseModel: DeserializeOwned {
    /// The spec describing this type's JSON shape.
    fn spec() -> ResponseSpec;
}

macro_rules! primitive_response_model {
    ($variant:ident => $($ty:ty),+) => {
        $(
            impl ResponseModel for $ty {
                fn spec() -> ResponseSpec {
                    ResponseSpec::$variant
                }
            }
        )+
    };
}

primitive_response_model!(Bool => bool);
primitive_response_model!(Integer => i8, i16, i32, i64, u8, u16, u32, u64);
primitive_response_model!(Number => f32, f64);
primitive_response_model!(String => String);

impl<T: ResponseModel> ResponseModel for Vec<T> {
    fn spec() -> ResponseSpec {
        ResponseSpec::list(T::spec())
    }
}

impl<T: ResponseModel> ResponseModel for Option<T> {
    fn spec() -> ResponseSpec {
        ResponseSpec::optional(T::spec())
    }
}

/// Derive the spec for `T` and check it against the supported grammar.
///
/// Rejects empty object specs, duplicate field names, and nesting beyond
/// the depth bound with [`ForgeError::InvalidConfig`]. Called once per
/// `generate` invocation; the returned spec is never mutated afterwards.
pub fn normalize<T: ResponseModel>() -> Result<ResponseSpec> {
    let spec = T::spec();
    check_supported(&spec, 0)?;
    Ok(spec)
}

fn check_supported(spec: &ResponseSpec, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(ForgeError::InvalidConfig(format!(
            "response spec nests deeper than {} levels; cyclic or runaway type declarations are not supported",
            MAX_DEPTH
        )));
    }
    match spec {
        ResponseSpec::Bool
        | ResponseSpec::Integer
        | ResponseSpec::Number
        | ResponseSpec::String => Ok(()),
        ResponseSpec::Optional(inner) | ResponseSpec::List(inner) => {
            check_supported(inner, depth + 1)
        }
        ResponseSpec::Object(obj) => {
            if obj.fields.is_empty() {
                return Err(ForgeError::InvalidConfig(format!(
                    "object spec '{}' declares no fields",
                    obj.name
                )));
            }
            for (i, field) in obj.fields.iter().enumerate() {
                if obj.fields[..i].iter().any(|f| f.name == field.name) {
                    return Err(ForgeError::InvalidConfig(format!(
                        "object spec '{}' declares field '{}' more than once",
                        obj.name, field.name
                    )));
                }
                check_supported(&field.spec, depth + 1)?;
            }
            Ok(())
        }
    }
}

/// Render a JSON-Schema-like document for a spec, suitable for textual
/// embedding in a prompt.
///
/// Deterministic: the same spec always renders the same document.
pub fn describe(spec: &ResponseSpec) -> Value {
    match spec {
        ResponseSpec::Bool => json!({"type": "boolean"}),
        ResponseSpec::Integer => json!({"type": "integer"}),
        ResponseSpec::Number => json!({"type": "number"}),
        ResponseSpec::String => json!({"type": "string"}),
        ResponseSpec::Optional(inner) => {
            let mut doc = describe(inner);
            if let Some(map) = doc.as_object_mut() {
                map.insert("nullable".to_string(), Value::Bool(true));
            }
            doc
        }
        ResponseSpec::List(element) => json!({
            "type": "array",
            "items": describe(element),
        }),
        ResponseSpec::Object(obj) => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for field in &obj.fields {
                let mut prop = describe(&field.spec);
                if let (Some(map), Some(desc)) = (prop.as_object_mut(), &field.description) {
                    map.insert("description".to_string(), Value::String(desc.clone()));
                }
                properties.insert(field.name.clone(), prop);
                if !field.spec.is_optional() {
                    required.push(Value::String(field.name.clone()));
                }
            }
            json!({
                "type": "object",
                "title": obj.name,
                "properties": Value::Object(properties),
                "required": Value::Array(required),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
        age: i64,
    }

    impl ResponseModel for User {
        fn spec() -> ResponseSpec {
            ObjectSpec::new("User")
                .field("name", ResponseSpec::String)
                .field_described("age", ResponseSpec::Integer, "Age in whole years")
                .into()
        }
    }

    #[test]
    fn primitive_specs() {
        assert_eq!(bool::spec(), ResponseSpec::Bool);
        assert_eq!(i64::spec(), ResponseSpec::Integer);
        assert_eq!(f64::spec(), ResponseSpec::Number);
        assert_eq!(String::spec(), ResponseSpec::String);
    }

    #[test]
    fn container_specs() {
        assert_eq!(
            Vec::<String>::spec(),
            ResponseSpec::list(ResponseSpec::String)
        );
        assert_eq!(
            Option::<i64>::spec(),
            ResponseSpec::optional(ResponseSpec::Integer)
        );
        assert_eq!(
            Vec::<Option<bool>>::spec(),
            ResponseSpec::list(ResponseSpec::optional(ResponseSpec::Bool))
        );
    }

    #[test]
    fn normalize_accepts_object() {
        assert!(normalize::<User>().is_ok());
    }

    #[test]
    fn normalize_rejects_empty_object() {
        #[derive(Debug, Deserialize)]
        struct Empty {}
        impl ResponseModel for Empty {
            fn spec() -> ResponseSpec {
                ObjectSpec::new("Empty").into()
            }
        }
        let err = normalize::<Empty>().unwrap_err();
        assert!(err.to_string().contains("declares no fields"));
    }

    #[test]
    fn normalize_rejects_duplicate_field() {
        #[derive(Debug, Deserialize)]
        struct Dup {
            #[allow(dead_code)]
            a: String,
        }
        impl ResponseModel for Dup {
            fn spec() -> ResponseSpec {
                ObjectSpec::new("Dup")
                    .field("a", ResponseSpec::String)
                    .field("a", ResponseSpec::Integer)
                    .into()
            }
        }
        let err = normalize::<Dup>().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn normalize_rejects_runaway_nesting() {
        #[derive(Debug, Deserialize)]
        struct Deep(#[allow(dead_code)] Vec<Vec<String>>);
        impl ResponseModel for Deep {
            fn spec() -> ResponseSpec {
                let mut spec = ResponseSpec::String;
                for _ in 0..40 {
                    spec = ResponseSpec::list(spec);
                }
                spec
            }
        }
        let err = normalize::<Deep>().unwrap_err();
        assert!(err.to_string().contains("nests deeper"));
    }

    #[test]
    fn describe_object_shape() {
        let doc = describe(&User::spec());
        assert_eq!(doc["type"], "object");
        assert_eq!(doc["title"], "User");
        assert_eq!(doc["properties"]["name"]["type"], "string");
        assert_eq!(doc["properties"]["age"]["type"], "integer");
        assert_eq!(doc["properties"]["age"]["description"], "Age in whole years");
        assert_eq!(doc["required"], json!(["name", "age"]));
    }

    #[test]
    fn describe_optional_field_not_required() {
        let spec: ResponseSpec = ObjectSpec::new("Profile")
            .field("id", ResponseSpec::Integer)
            .field("nickname", ResponseSpec::optional(ResponseSpec::String))
            .into();
        let doc = describe(&spec);
        assert_eq!(doc["required"], json!(["id"]));
        assert_eq!(doc["properties"]["nickname"]["nullable"], true);
    }

    #[test]
    fn describe_list_shape() {
        let doc = describe(&Vec::<String>::spec());
        assert_eq!(doc["type"], "array");
        assert_eq!(doc["items"]["type"], "string");
    }

    #[test]
    fn describe_is_deterministic() {
        let a = serde_json::to_string(&describe(&User::spec())).unwrap();
        let b = serde_json::to_string(&describe(&User::spec())).unwrap();
        assert_eq!(a, b);
    }
}
