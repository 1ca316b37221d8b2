pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod source;
pub mod types;

pub use error::Error;
pub use lexer::{Cursor, Lexer, Pos, Token, TokenKind};
pub use parser::{parse_file, Parser};
pub use scope::{Scope, ScopeStack, Symbol, SymbolKind};
pub use source::SourceFile;
pub use types::{Primitive, TypeInfo, TypeKind, TypeRegistry};
