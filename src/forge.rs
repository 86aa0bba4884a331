//! The retry-driving orchestrator.
//!
//! [`Forge`] owns one configured extraction task: a response model, a
//! prompt template, a candidate-matching pattern, and an attempt budget.
//! Each `generate` call runs the draft → generate → locate → validate loop,
//! feeding validation failures back to the model as corrective prompts
//! until a typed value is derived or the budget runs out.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::attempt::AttemptRecord;
use crate::error::{ForgeError, Result};
use crate::events::{emit, Event, EventHandler};
use crate::extract::{find_candidates, MatchPattern};
use crate::generator::{GenerationSettings, TextGenerator};
use crate::prompt::{assemble, correction_block, PromptContext, DEFAULT_TEMPLATE};
use crate::resolve::resolve;
use crate::schema::{describe, normalize, ResponseModel};
use crate::validate::{render_errors, FieldError, ValidationOutcome};

/// Outcome of a traced `generate` call: the derived value (if any) plus the
/// full attempt history for observability.
#[derive(Debug)]
pub struct Derivation<T> {
    /// The typed value, or `None` when the budget was exhausted in
    /// silent-failure mode.
    pub value: Option<T>,
    /// One record per attempt, in order. When a value was derived, the last
    /// record holds the `Success` outcome.
    pub attempts: Vec<AttemptRecord>,
}

/// Extracts a typed value from LLM output, retrying with error feedback.
///
/// Stateless between calls: the response spec is rebuilt per `generate`
/// invocation and all attempt state lives on the call's stack, so one forge
/// may serve concurrent calls as long as its generator does.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use serde::Deserialize;
/// use structforge::{Forge, MockGenerator};
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
///
/// # tokio_test::block_on(async {
/// let mock = Arc::new(MockGenerator::fixed(
///     r#"Sure! {"name": "Terry Tate", "age": 60}"#,
/// ));
/// let forge = Forge::<User>::builder(mock).build();
/// let user = forge.generate("Terry Tate 60.").await.unwrap();
/// assert_eq!(user, Some(User { name: "Terry Tate".into(), age: 60 }));
/// # });
/// ```
pub struct Forge<T: ResponseModel> {
    generator: Arc<dyn TextGenerator>,
    template: Option<String>,
    pattern: MatchPattern,
    max_retries: u32,
    raise_on_failure: bool,
    event_handler: Option<Arc<dyn EventHandler>>,
    _response: PhantomData<fn() -> T>,
}

impl<T: ResponseModel> Forge<T> {
    /// Create a builder with the default configuration: built-in template,
    /// default match pattern, `max_retries = 3`, `raise_on_failure = true`.
    pub fn builder(generator: Arc<dyn TextGenerator>) -> ForgeBuilder<T> {
        ForgeBuilder {
            generator,
            template: None,
            pattern: MatchPattern::Default,
            max_retries: 3,
            raise_on_failure: true,
            event_handler: None,
            _response: PhantomData,
        }
    }

    /// Generate a typed value from the user input with default per-call
    /// options.
    pub async fn generate(&self, user_input: &str) -> Result<Option<T>> {
        self.generate_with(user_input, &HashMap::new(), &GenerationSettings::new())
            .await
    }

    /// Generate with caller-supplied prompt values and provider settings.
    ///
    /// Returns `Ok(Some)` on success, `Ok(None)` only when the attempt
    /// budget is exhausted in silent-failure mode, and errors per the
    /// [`ForgeError`] taxonomy otherwise.
    pub async fn generate_with(
        &self,
        user_input: &str,
        prompt_values: &HashMap<String, String>,
        settings: &GenerationSettings,
    ) -> Result<Option<T>> {
        let derivation = self
            .generate_traced_with(user_input, prompt_values, settings)
            .await?;
        Ok(derivation.value)
    }

    /// Like [`generate`](Self::generate), but returns the attempt history
    /// alongside the value.
    pub async fn generate_traced(&self, user_input: &str) -> Result<Derivation<T>> {
        self.generate_traced_with(user_input, &HashMap::new(), &GenerationSettings::new())
            .await
    }

    /// Like [`generate_with`](Self::generate_with), but returns the attempt
    /// history alongside the value.
    pub async fn generate_traced_with(
        &self,
        user_input: &str,
        prompt_values: &HashMap<String, String>,
        settings: &GenerationSettings,
    ) -> Result<Derivation<T>> {
        // Spec and base prompt are rebuilt per call; configuration problems
        // surface here, before the first model call.
        let spec = normalize::<T>()?;
        let schema_json = serde_json::to_string_pretty(&describe(&spec))?;
        let ctx = PromptContext {
            schema_json,
            user_input: user_input.to_string(),
            values: prompt_values.clone(),
        };
        let template = self.template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
        let base_prompt = assemble(template, &ctx)?;

        let total = self.max_retries.saturating_add(1);
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut prompt = base_prompt.clone();

        for attempt in 1..=total {
            emit(&self.event_handler, Event::AttemptStart { attempt, total });

            // Transport/provider failures are fatal for the whole call and
            // consume no further attempts.
            let raw = match self.generator.generate_text(&prompt, settings).await {
                Ok(raw) => raw,
                Err(e) => {
                    emit(
                        &self.event_handler,
                        Event::GenerateEnd {
                            attempts: attempt,
                            success: false,
                        },
                    );
                    return Err(e);
                }
            };

            let candidates = find_candidates(&raw, &self.pattern);
            emit(
                &self.event_handler,
                Event::ResponseReceived {
                    attempt,
                    chars: raw.chars().count(),
                    candidates: candidates.len(),
                },
            );

            // A structurally valid payload can still miss the declared Rust
            // type (an integer outside the field's width, for one). That is
            // model noise like any other mismatch: record it and retry.
            let outcome = match resolve(&candidates, &spec) {
                ValidationOutcome::Success(value) => {
                    match serde_json::from_value::<T>(value.clone()) {
                        Ok(typed) => {
                            attempts.push(AttemptRecord {
                                attempt,
                                raw,
                                candidates,
                                outcome: ValidationOutcome::Success(value),
                            });
                            emit(
                                &self.event_handler,
                                Event::GenerateEnd {
                                    attempts: attempt,
                                    success: true,
                                },
                            );
                            return Ok(Derivation {
                                value: Some(typed),
                                attempts,
                            });
                        }
                        Err(e) => ValidationOutcome::Failure(vec![FieldError {
                            path: "$".to_string(),
                            message: format!("value does not fit the declared type: {}", e),
                        }]),
                    }
                }
                failure => failure,
            };

            attempts.push(AttemptRecord {
                attempt,
                raw: raw.clone(),
                candidates,
                outcome: outcome.clone(),
            });

            if let ValidationOutcome::Failure(errors) = outcome {
                if attempt < total {
                    emit(
                        &self.event_handler,
                        Event::RetryStart {
                            attempt: attempt + 1,
                            reason: render_errors(&errors),
                        },
                    );
                    prompt = format!("{}{}", base_prompt, correction_block(&raw, &errors));
                }
            }
        }

        emit(
            &self.event_handler,
            Event::GenerateEnd {
                attempts: total,
                success: false,
            },
        );

        if self.raise_on_failure {
            Err(ForgeError::Exhausted { attempts })
        } else {
            Ok(Derivation {
                value: None,
                attempts,
            })
        }
    }
}

/// Builder for [`Forge`].
pub struct ForgeBuilder<T: ResponseModel> {
    generator: Arc<dyn TextGenerator>,
    template: Option<String>,
    pattern: MatchPattern,
    max_retries: u32,
    raise_on_failure: bool,
    event_handler: Option<Arc<dyn EventHandler>>,
    _response: PhantomData<fn() -> T>,
}

impl<T: ResponseModel> ForgeBuilder<T> {
    /// Use a custom prompt template instead of the built-in one.
    ///
    /// Templates use `{schema}` / `{input}` / named placeholders; missing
    /// schema or input sections are appended automatically (see
    /// [`prompt`](crate::prompt)).
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Number of *additional* attempts after the first. Total model calls
    /// per `generate` are `max_retries + 1`. Zero is valid (single attempt,
    /// no correction).
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override candidate discovery.
    pub fn pattern(mut self, pattern: MatchPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// When false, an exhausted budget yields `Ok(None)` instead of
    /// [`ForgeError::Exhausted`]; attempt history stays available via the
    /// traced variants. Default: true.
    pub fn raise_on_failure(mut self, raise: bool) -> Self {
        self.raise_on_failure = raise;
        self
    }

    /// Receive lifecycle events during `generate` calls.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Build the forge.
    pub fn build(self) -> Forge<T> {
        Forge {
            generator: self.generator,
            template: self.template,
            pattern: self.pattern,
            max_retries: self.max_retries,
            raise_on_failure: self.raise_on_failure,
            event_handler: self.event_handler,
            _response: self._response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FnEventHandler;
    use crate::generator::MockGenerator;
    use crate::schema::{ObjectSpec, ResponseSpec};
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
        age: i64,
    }

    impl ResponseModel for User {
        fn spec() -> ResponseSpec {
            ObjectSpec::new("User")
                .field("name", ResponseSpec::String)
                .field("age", ResponseSpec::Integer)
                .into()
        }
    }

    fn forge_with(mock: &Arc<MockGenerator>) -> ForgeBuilder<User> {
        Forge::<User>::builder(mock.clone())
    }

    #[tokio::test]
    async fn round_trip_object_in_prose() {
        let mock = Arc::new(MockGenerator::fixed(
            r#"prefix {"name": "Terry Tate", "age": 60} suffix"#,
        ));
        let forge = forge_with(&mock).build();
        let user = forge.generate("Terry Tate 60.").await.unwrap();
        assert_eq!(
            user,
            Some(User {
                name: "Terry Tate".into(),
                age: 60
            })
        );
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn initial_prompt_contains_schema_and_input() {
        let mock = Arc::new(MockGenerator::fixed(r#"{"name": "T", "age": 1}"#));
        let forge = forge_with(&mock).build();
        forge.generate("Terry Tate 60.").await.unwrap();

        let prompts = mock.prompts();
        assert!(prompts[0].contains("OUTPUT SCHEMA"));
        assert!(prompts[0].contains("\"title\": \"User\""));
        assert!(prompts[0].contains("Terry Tate 60."));
    }

    #[tokio::test]
    async fn retry_feeds_errors_back_and_recovers() {
        let mock = Arc::new(MockGenerator::new(vec![
            r#"{"name": "Terry Tate"}"#.to_string(),
            r#"{"name": "Terry Tate", "age": 60}"#.to_string(),
        ]));
        let forge = forge_with(&mock).build();
        let derivation = forge.generate_traced("Terry Tate 60.").await.unwrap();

        assert!(derivation.value.is_some());
        assert_eq!(derivation.attempts.len(), 2);
        assert!(derivation.attempts[1].outcome.is_success());
        assert_eq!(mock.calls(), 2);

        // The corrective prompt carries the prior raw reply and the failure.
        let prompts = mock.prompts();
        assert!(prompts[1].contains(r#"{"name": "Terry Tate"}"#));
        assert!(prompts[1].contains("$.age: field is required but missing"));
        assert!(prompts[1].contains("Try again"));
    }

    #[tokio::test]
    async fn attempts_bounded_by_max_retries_plus_one() {
        let mock = Arc::new(MockGenerator::fixed("no payload here"));
        let forge = forge_with(&mock).max_retries(2).build();
        let err = forge.generate("input").await.unwrap_err();

        assert_eq!(mock.calls(), 3);
        match err {
            ForgeError::Exhausted { attempts } => assert_eq!(attempts.len(), 3),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn zero_retries_is_single_attempt() {
        let mock = Arc::new(MockGenerator::fixed("still not json"));
        let forge = forge_with(&mock).max_retries(0).build();
        let err = forge.generate("input").await.unwrap_err();

        assert_eq!(mock.calls(), 1);
        assert!(matches!(err, ForgeError::Exhausted { ref attempts } if attempts.len() == 1));
    }

    #[tokio::test]
    async fn silent_failure_returns_none_with_history() {
        let mock = Arc::new(MockGenerator::fixed("nope"));
        let forge = forge_with(&mock)
            .max_retries(1)
            .raise_on_failure(false)
            .build();
        let derivation = forge.generate_traced("input").await.unwrap();

        assert!(derivation.value.is_none());
        assert_eq!(derivation.attempts.len(), 2);
        assert!(!derivation.attempts[1].outcome.is_success());
    }

    #[tokio::test]
    async fn provider_error_propagates_without_retry() {
        let mock = Arc::new(MockGenerator::failing("rate limited"));
        let forge = forge_with(&mock).max_retries(3).build();
        let err = forge.generate("input").await.unwrap_err();

        assert_eq!(mock.calls(), 1);
        assert!(matches!(err, ForgeError::Provider(reason) if reason == "rate limited"));
    }

    #[tokio::test]
    async fn malformed_json_is_recorded_not_raised() {
        let mock = Arc::new(MockGenerator::fixed(r#"{"name": "Terry", "age": }"#));
        let forge = forge_with(&mock)
            .max_retries(0)
            .raise_on_failure(false)
            .build();
        let derivation = forge.generate_traced("input").await.unwrap();

        match &derivation.attempts[0].outcome {
            ValidationOutcome::Failure(errs) => {
                assert!(errs[0].message.starts_with("invalid JSON:"))
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unresolved_placeholder_fails_before_any_call() {
        let mock = Arc::new(MockGenerator::fixed("unused"));
        let forge = forge_with(&mock)
            .template("{schema} {input} {examples}")
            .build();
        let err = forge.generate("input").await.unwrap_err();

        assert_eq!(mock.calls(), 0);
        assert!(matches!(err, ForgeError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn prompt_values_fill_custom_placeholders() {
        let mock = Arc::new(MockGenerator::fixed(r#"{"name": "T", "age": 1}"#));
        let forge = forge_with(&mock)
            .template("{schema}\nExamples:\n{examples}\n{input}")
            .build();

        let mut values = HashMap::new();
        values.insert("examples".to_string(), "in: x out: y".to_string());
        forge
            .generate_with("input", &values, &GenerationSettings::new())
            .await
            .unwrap();

        assert!(mock.prompts()[0].contains("in: x out: y"));
    }

    #[tokio::test]
    async fn bare_integer_reply_derives_primitive_root() {
        let mock = Arc::new(MockGenerator::fixed("300"));
        let forge = Forge::<i64>::builder(mock.clone()).build();
        let value = forge.generate("How loud in watts?").await.unwrap();
        assert_eq!(value, Some(300));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn bare_string_reply_derives_primitive_root() {
        let mock = Arc::new(MockGenerator::fixed(r#""hello""#));
        let forge = Forge::<String>::builder(mock).build();
        let value = forge.generate("Greet me in one word.").await.unwrap();
        assert_eq!(value, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn out_of_range_integer_is_retried_not_config_error() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Volume {
            level: u8,
        }
        impl ResponseModel for Volume {
            fn spec() -> ResponseSpec {
                ObjectSpec::new("Volume")
                    .field("level", ResponseSpec::Integer)
                    .into()
            }
        }

        let mock = Arc::new(MockGenerator::new(vec![
            r#"{"level": 300}"#.to_string(),
            r#"{"level": 42}"#.to_string(),
        ]));
        let forge = Forge::<Volume>::builder(mock.clone()).build();
        let derivation = forge.generate_traced("Volume at 42.").await.unwrap();

        assert_eq!(derivation.value, Some(Volume { level: 42 }));
        assert_eq!(mock.calls(), 2);
        assert!(!derivation.attempts[0].outcome.is_success());
        // The width mismatch is echoed back like any validation failure.
        assert!(mock.prompts()[1].contains("does not fit the declared type"));
    }

    #[tokio::test]
    async fn out_of_range_primitive_root_recovers_on_retry() {
        let mock = Arc::new(MockGenerator::new(vec![
            "300".to_string(),
            "42".to_string(),
        ]));
        let forge = Forge::<u8>::builder(mock.clone()).max_retries(3).build();
        let value = forge.generate("Pick a byte.").await.unwrap();
        assert_eq!(value, Some(42));
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn max_retries_at_u32_max_does_not_overflow() {
        let mock = Arc::new(MockGenerator::fixed(r#"{"name": "T", "age": 1}"#));
        let forge = forge_with(&mock).max_retries(u32::MAX).build();
        let user = forge.generate("input").await.unwrap();
        assert!(user.is_some());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn list_response_model() {
        let mock = Arc::new(MockGenerator::fixed(
            r#"Here you go: ["Terry Tate", "60", "Irvine", "United States"]"#,
        ));
        let forge = Forge::<Vec<String>>::builder(mock).build();
        let value = forge.generate("Terry Tate 60, Irvine, US").await.unwrap();
        assert_eq!(
            value,
            Some(vec![
                "Terry Tate".to_string(),
                "60".to_string(),
                "Irvine".to_string(),
                "United States".to_string()
            ])
        );
    }

    #[tokio::test]
    async fn later_candidate_used_when_first_is_scratch() {
        let mock = Arc::new(MockGenerator::fixed(
            r#"Draft: {"scratch": true} Final answer: {"name": "Terry", "age": 60}"#,
        ));
        let forge = forge_with(&mock).build();
        let user = forge.generate("input").await.unwrap();
        assert_eq!(user.map(|u| u.name), Some("Terry".to_string()));
    }

    #[tokio::test]
    async fn events_cover_the_lifecycle() {
        let seen: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = Arc::new(FnEventHandler(move |event: Event| {
            sink.lock().unwrap().push(event);
        }));

        let mock = Arc::new(MockGenerator::new(vec![
            "bad".to_string(),
            r#"{"name": "T", "age": 1}"#.to_string(),
        ]));
        let forge = forge_with(&mock).event_handler(handler).build();
        forge.generate("input").await.unwrap();

        let events = seen.lock().unwrap();
        assert!(matches!(events[0], Event::AttemptStart { attempt: 1, total: 4 }));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::RetryStart { attempt: 2, .. })));
        assert!(matches!(
            events.last(),
            Some(Event::GenerateEnd { attempts: 2, success: true })
        ));
    }

    #[tokio::test]
    async fn custom_pattern_drives_discovery() {
        let mock = Arc::new(MockGenerator::fixed("name=Terry age=60"));
        let pattern = MatchPattern::Custom(Arc::new(|_text: &str| {
            vec![r#"{"name": "Terry", "age": 60}"#.to_string()]
        }));
        let forge = forge_with(&mock).pattern(pattern).build();
        let user = forge.generate("input").await.unwrap();
        assert_eq!(user.map(|u| u.age), Some(60));
    }
}
