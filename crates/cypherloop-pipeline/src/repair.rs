//! Bounded generate, validate, repair loop.
//!
//! ```text
//! GENERATING -> VALIDATING -> SUCCESS
//!                   |
//!                   +-> REPAIRING -> VALIDATING   (while attempts < ceiling)
//!                   +-> EXHAUSTED                 (ceiling reached)
//! ```
//!
//! Every draft is normalized before validation. A failed oracle call consumes one
//! attempt; when no draft exists yet the attempt regenerates instead of repairing.
//! Repairs always target the latest draft and the database error it last produced.
//! Oracle calls share the request deadline, so a late attempt fails without waiting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cypherloop_core::error::{PipelineError, PipelineResult};
use cypherloop_core::traits::QueryOracle;
use cypherloop_core::types::{
    AttemptOutcome, FinalState, GraphSchema, RepairRequest, RepairTrace, RetryRecord,
};
use log::{debug, info, warn};

use crate::generator::QueryGenerator;
use crate::oracle_call::{bounded, budget, TimedCall};
use crate::post_processor::PostProcessor;
use crate::validator::Validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Generating,
    Validating,
    Repairing,
    Success,
    Exhausted,
}

/// Per-request inputs that stay fixed across attempts.
pub struct RepairContext<'a> {
    pub question: &'a str,
    pub pruned_schema: &'a GraphSchema,
    pub full_schema: &'a GraphSchema,
    /// End of the request budget; no oracle call runs past it.
    pub deadline: tokio::time::Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub query: String,
    pub state: FinalState,
}

pub struct RepairController {
    oracle: Arc<dyn QueryOracle>,
    generator: QueryGenerator,
    validator: Validator,
    post_processor: PostProcessor,
    max_attempts: u32,
    timeout: Duration,
}

impl RepairController {
    pub fn new(
        oracle: Arc<dyn QueryOracle>,
        generator: QueryGenerator,
        validator: Validator,
        post_processor: PostProcessor,
        max_attempts: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            oracle,
            generator,
            validator,
            post_processor,
            max_attempts,
            timeout,
        }
    }

    pub fn post_processor(&self) -> &PostProcessor {
        &self.post_processor
    }

    async fn repair(&self, ctx: &RepairContext<'_>, draft: &str, error: &str) -> TimedCall<String> {
        let request = RepairRequest {
            question: ctx.question,
            invalid_query: draft,
            error,
            pruned_schema: ctx.pruned_schema,
            full_schema: ctx.full_schema,
        };
        let limit = budget(self.timeout, ctx.deadline);
        bounded("repair", limit, self.oracle.repair_query(&request)).await
    }

    fn transition(from: LoopState, to: LoopState, attempt: u32) -> LoopState {
        debug!("Repair loop {:?} -> {:?} (attempt {})", from, to, attempt);
        to
    }

    /// Runs the loop to SUCCESS or EXHAUSTED. Exhaustion still yields the last draft;
    /// only a loop that never produced any draft ends in `RepairExhausted`.
    pub async fn run(
        &self,
        ctx: &RepairContext<'_>,
        trace: &mut RepairTrace,
    ) -> PipelineResult<LoopOutcome> {
        let mut state = LoopState::Generating;
        let mut draft: Option<String> = None;
        let mut last_error = String::new();
        let mut validation_error = String::new();
        let mut attempt: u32 = 0;
        let mut record: Option<RetryRecord> = None;

        loop {
            match state {
                LoopState::Generating | LoopState::Repairing => {
                    let call = match (&draft, state) {
                        (Some(current), LoopState::Repairing) => {
                            self.repair(ctx, current, &validation_error).await
                        }
                        _ => {
                            self.generator
                                .generate(ctx.question, ctx.pruned_schema, ctx.deadline)
                                .await
                        }
                    };

                    match record.as_mut() {
                        Some(open) => open.repair_time = call.elapsed,
                        None => trace.initial_generation_time = call.elapsed,
                    }

                    match call.result {
                        Ok(reply) => {
                            trace.record_oracle(call.elapsed, &reply.usage);
                            let normalized = self.post_processor.normalize(&reply.value);
                            debug!("Normalized draft: {}", normalized);
                            draft = Some(normalized);
                            state = Self::transition(state, LoopState::Validating, attempt);
                        }
                        Err(e) => {
                            trace.record_oracle(call.elapsed, &Default::default());
                            if let PipelineError::OracleContractViolation { .. } = e {
                                trace.contract_violations.push(e.to_string());
                            }
                            last_error = e.to_string();
                            if let Some(mut failed) = record.take() {
                                failed.outcome = AttemptOutcome::Failed;
                                failed.error = Some(last_error.clone());
                                trace.retries.push(failed);
                            }
                            state = self.after_failure(state, &mut attempt, &mut record);
                        }
                    }
                }
                LoopState::Validating => {
                    let query = draft.as_deref().unwrap_or_default();
                    let started = Instant::now();
                    let validation =
                        tokio::time::timeout_at(ctx.deadline, self.validator.validate(query))
                            .await
                            .unwrap_or_else(|_| {
                                Err(PipelineError::ValidationFailure(
                                    "plan check passed the request deadline".to_string(),
                                ))
                            });
                    let elapsed = started.elapsed();
                    trace.record_validation(elapsed);

                    match record.as_mut() {
                        Some(open) => open.validation_time = elapsed,
                        None => trace.initial_validation_time = elapsed,
                    }

                    match validation {
                        Ok(()) => {
                            if let Some(mut passed) = record.take() {
                                passed.outcome = AttemptOutcome::Success;
                                trace.retries.push(passed);
                            }
                            state = Self::transition(state, LoopState::Success, attempt);
                        }
                        Err(e) => {
                            info!("Validation failed (attempt {}): {}", attempt, e);
                            validation_error = match e {
                                PipelineError::ValidationFailure(message) => message,
                                other => other.to_string(),
                            };
                            last_error = validation_error.clone();
                            if let Some(mut failed) = record.take() {
                                failed.outcome = AttemptOutcome::Failed;
                                failed.error = Some(last_error.clone());
                                trace.retries.push(failed);
                            }
                            state = self.after_failure(state, &mut attempt, &mut record);
                        }
                    }
                }
                LoopState::Success | LoopState::Exhausted => break,
            }
        }

        trace.attempts_used = attempt;
        let final_state = if state == LoopState::Success {
            FinalState::Success
        } else {
            FinalState::Exhausted
        };
        trace.final_state = Some(final_state);

        match (draft, final_state) {
            (Some(query), FinalState::Success) => Ok(LoopOutcome {
                query,
                state: final_state,
            }),
            (Some(query), FinalState::Exhausted) => {
                warn!(
                    "Repair attempts exhausted after {} attempts, returning unvalidated query: {}",
                    attempt, query
                );
                Ok(LoopOutcome {
                    query,
                    state: final_state,
                })
            }
            (None, _) => {
                warn!("Repair attempts exhausted without any draft query");
                Err(PipelineError::RepairExhausted {
                    attempts: attempt,
                    last_error,
                })
            }
        }
    }

    /// Opens the next attempt, or ends the loop when the ceiling is reached.
    fn after_failure(
        &self,
        from: LoopState,
        attempt: &mut u32,
        record: &mut Option<RetryRecord>,
    ) -> LoopState {
        if *attempt >= self.max_attempts {
            return Self::transition(from, LoopState::Exhausted, *attempt);
        }
        *attempt += 1;
        *record = Some(RetryRecord {
            attempt_number: *attempt,
            validation_time: Duration::ZERO,
            repair_time: Duration::ZERO,
            outcome: AttemptOutcome::Failed,
            error: None,
        });
        Self::transition(from, LoopState::Repairing, *attempt)
    }
}
