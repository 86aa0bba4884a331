//! # structforge
//!
//! Schema-validated structured extraction from LLM output, with
//! error-feedback retries.
//!
//! Models rarely reply with exactly the JSON you asked for. This crate
//! takes a free-form model reply, locates the embedded JSON payload,
//! validates it against a declared response model, and — when validation
//! fails — feeds the failure back to the model as a corrective prompt,
//! bounded by a configurable attempt budget.
//!
//! ## Core Concepts
//!
//! - **[`ResponseModel`](schema::ResponseModel)** — the caller's declared
//!   output shape: primitives, `Vec<T>`, `Option<T>`, or a struct with a
//!   builder-declared [`ObjectSpec`](schema::ObjectSpec).
//! - **[`TextGenerator`]** — the single-method provider capability
//!   (prompt in, text out). Bring your own, or use [`HttpGenerator`] /
//!   [`MockGenerator`].
//! - **[`Forge`]** — the orchestrator: assembles the prompt, calls the
//!   generator, extracts and validates candidates, retries with error
//!   feedback, and returns a typed value.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde::Deserialize;
//! use structforge::{Forge, HttpGenerator};
//! use structforge::schema::{ObjectSpec, ResponseModel, ResponseSpec};
//!
//! #[derive(Debug, Deserialize)]
//! struct User {
//!     name: String,
//!     age: i64,
//! }
//!
//! impl ResponseModel for User {
//!     fn spec() -> ResponseSpec {
//!         ObjectSpec::new("User")
//!             .field("name", ResponseSpec::String)
//!             .field_described("age", ResponseSpec::Integer, "Age in whole years")
//!             .into()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = Arc::new(
//!         HttpGenerator::new("https://api.openai.com", "gpt-4o-mini")
//!             .with_api_key(std::env::var("OPENAI_API_KEY")?),
//!     );
//!
//!     let forge = Forge::<User>::builder(generator).max_retries(2).build();
//!     let user = forge
//!         .generate("Terry Tate 60. Lives in Irvine, United States.")
//!         .await?;
//!
//!     println!("{:?}", user);
//!     Ok(())
//! }
//! ```

pub mod attempt;
pub mod error;
pub mod events;
pub mod extract;
pub mod forge;
pub mod generator;
pub mod prompt;
pub mod resolve;
pub mod schema;
pub mod validate;

pub use attempt::AttemptRecord;
pub use error::{ForgeError, Result};
pub use events::{Event, EventHandler, FnEventHandler};
pub use extract::MatchPattern;
pub use forge::{Derivation, Forge, ForgeBuilder};
pub use generator::{GenerationSettings, HttpGenerator, MockGenerator, TextGenerator};
pub use schema::{ObjectSpec, ResponseModel, ResponseSpec};
pub use validate::{FieldError, ValidationOutcome};
