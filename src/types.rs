use std::fmt::{self, Display};

use indexmap::IndexMap;

use crate::ast::StructDecl;
use crate::lexer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl Primitive {
    pub fn name(&self) -> &'static str {
        match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub fn size_in_bytes(&self) -> u8 {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Primitive(Primitive),
    Bool,
    Void,
    /// Distinct from `*u8` in the surface language; lowers to pointer-to-u8.
    CString,
    Pointer(Box<TypeInfo>),
    Struct(String),
    /// Integer literal whose concrete width the analyzer picks from context.
    UntypedInt,
    UntypedFloat,
    /// Placeholder for declarations with inferred type (`x := ...`).
    Detect,
    Invalid,
}

/// A resolved or synthesized type, together with the identifier used for
/// diagnostics and the token it originated from. Seeded primitives have no
/// originating token.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    pub kind: TypeKind,
    pub name: String,
    pub token: Option<Token>,
}

impl TypeInfo {
    pub fn new(kind: TypeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            token: None,
        }
    }

    pub fn invalid() -> Self {
        Self::new(TypeKind::Invalid, "")
    }

    pub fn void() -> Self {
        Self::new(TypeKind::Void, "void")
    }

    pub fn detect(token: Token) -> Self {
        Self {
            kind: TypeKind::Detect,
            name: String::new(),
            token: Some(token),
        }
    }

    /// Pointer to `inner`; the identifier grows one `*` per indirection.
    pub fn pointer(inner: TypeInfo, token: Token) -> Self {
        let name = format!("{}*", inner.name);

        Self {
            kind: TypeKind::Pointer(Box::new(inner)),
            name,
            token: Some(token),
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.kind, TypeKind::Invalid)
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Detect => write!(f, "<inferred>"),
            TypeKind::Invalid => write!(f, "<invalid>"),
            TypeKind::UntypedInt => write!(f, "<integer>"),
            TypeKind::UntypedFloat => write!(f, "<float>"),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// Name to type mapping for a compilation unit. Seeded with the primitives
/// and extended with every struct declaration as it is parsed, so later
/// declarations can refer to earlier types.
pub struct TypeRegistry {
    types: IndexMap<String, TypeInfo>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut types = IndexMap::new();

        for primitive in [
            Primitive::I8,
            Primitive::I16,
            Primitive::I32,
            Primitive::I64,
            Primitive::U8,
            Primitive::U16,
            Primitive::U32,
            Primitive::U64,
            Primitive::F32,
            Primitive::F64,
        ] {
            types.insert(
                primitive.name().to_string(),
                TypeInfo::new(TypeKind::Primitive(primitive), primitive.name()),
            );
        }

        types.insert("void".to_string(), TypeInfo::void());
        types.insert("bool".to_string(), TypeInfo::new(TypeKind::Bool, "bool"));

        Self { types }
    }
}

impl TypeRegistry {
    pub fn get(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    /// Lookup for the parser: an unregistered name yields an invalid type
    /// carrying the name, for the analyzer to report.
    pub fn resolve(&self, name: &str) -> TypeInfo {
        self.types.get(name).cloned().unwrap_or_else(|| TypeInfo {
            kind: TypeKind::Invalid,
            name: name.to_string(),
            token: None,
        })
    }

    pub fn add_struct(&mut self, decl: &StructDecl) {
        let name = decl.name.name.clone();

        self.types.insert(
            name.clone(),
            TypeInfo {
                kind: TypeKind::Struct(name.clone()),
                name,
                token: Some(decl.name.token.clone()),
            },
        );
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypeInfo)> {
        self.types.iter()
    }
}
