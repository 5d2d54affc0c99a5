pub mod ast;
pub mod checker;
pub mod context;
pub mod contract;
pub mod depends;
pub mod error_codes;
pub mod errors;
pub mod global_refinement;
pub mod globals;
pub mod lexer;
pub mod normalize;
pub mod parser;
pub mod resolve;
pub mod state_refinement;
pub mod tokens;
