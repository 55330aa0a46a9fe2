pub mod config;
pub mod convert;
pub mod diagnostics;
pub mod error;
pub mod fuzz_helper;
pub mod lex;
pub mod mask;
pub mod mysql_functions;
pub mod normalize;
pub mod placeholders;
pub mod projection;
pub mod translate;
pub mod value;


pub use config::{ConversionConfig, ParamMode};
pub use convert::{ConversionResult, Converter, RawQuery, TestConversion, convert, test_conversion};
pub use diagnostics::{ConversionWarning, Severity};
pub use error::{Error, Result};
pub use value::Value;
