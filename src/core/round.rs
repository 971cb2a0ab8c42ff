//! # Limit and result validation for one round.
//!
//! Turns the raw outputs of caller code into either a value the loop can act on or a
//! [`PollError`] to publish. Both steps are pure; the actor does the publishing.
//!
//! ```text
//! limit_for(spec, active):
//!   calculate_limit(...) panics  → Err(LimitPanicked)       (schedule skipped)
//!   calculate_limit(...) < 0     → Err(InvalidLimit)        (schedule skipped)
//!   otherwise                    → Ok(limit as usize)
//!
//! accept(batch, limit):          first violation wins, whole batch discarded
//!   Raw(non-array)               → Err(NotASequence)
//!   Raw([.., non-string, ..])    → Err(NonStringInstruction)
//!   len > limit                  → Err(TooManyInstructions)
//!   otherwise                    → Ok(instructions, in order)
//! ```

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde_json::Value;

use crate::error::PollError;
use crate::tasks::{Batch, Instruction, TaskSpec};

/// Computes and checks the limit for a round.
pub(crate) fn limit_for(spec: &TaskSpec, active: &[Instruction]) -> Result<usize, PollError> {
    let limit = catch_unwind(AssertUnwindSafe(|| spec.limit(active))).map_err(|payload| {
        PollError::LimitPanicked {
            message: panic_message(payload.as_ref()),
        }
    })?;
    usize::try_from(limit).map_err(|_| PollError::InvalidLimit { limit })
}

/// Validates a schedule result against the round's limit.
pub(crate) fn accept(batch: Batch, limit: usize) -> Result<Vec<Instruction>, PollError> {
    let instructions = match batch {
        Batch::Instructions(v) => v,
        Batch::Raw(value) => from_raw(value)?,
    };

    if instructions.len() > limit {
        return Err(PollError::TooManyInstructions {
            returned: instructions.len(),
            limit,
        });
    }
    Ok(instructions)
}

fn from_raw(value: Value) -> Result<Vec<Instruction>, PollError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(PollError::NotASequence {
                found: json_type(&other),
            });
        }
    };

    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::String(s) => out.push(s),
            _ => return Err(PollError::NonStringInstruction { index }),
        }
    }
    Ok(out)
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::tasks::{ScheduleConfiguration, ScheduleFn};
    use serde_json::json;

    fn spec(concurrency: usize) -> TaskSpec {
        TaskSpec::new(
            "t",
            ScheduleFn::arc(|_cfg: ScheduleConfiguration| async {
                Ok::<_, BoxError>(Batch::empty())
            }),
        )
        .with_concurrency(concurrency)
    }

    #[test]
    fn test_limit_defaults_to_free_slots() {
        let active = vec!["a".to_string()];
        assert_eq!(limit_for(&spec(3), &active).unwrap(), 2);
    }

    #[test]
    fn test_negative_limit_rejected() {
        let spec = spec(2).with_limit(|_, _| -1);
        assert!(matches!(
            limit_for(&spec, &[]),
            Err(PollError::InvalidLimit { limit: -1 })
        ));
    }

    #[test]
    fn test_panicking_limit_rejected() {
        let spec = spec(2).with_limit(|_, _| panic!("limit store gone"));
        assert!(matches!(
            limit_for(&spec, &[]),
            Err(PollError::LimitPanicked { message }) if message == "limit store gone"
        ));
    }

    #[test]
    fn test_zero_limit_allowed() {
        let spec = spec(2).with_limit(|_, _| 0);
        assert_eq!(limit_for(&spec, &[]).unwrap(), 0);
    }

    #[test]
    fn test_accepts_within_limit_preserving_order() {
        let got = accept(Batch::from(vec!["a", "b"]), 2).unwrap();
        assert_eq!(got, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_over_limit_discards_everything() {
        let err = accept(Batch::from(vec!["1", "2", "3"]), 1).unwrap_err();
        assert!(matches!(
            err,
            PollError::TooManyInstructions {
                returned: 3,
                limit: 1
            }
        ));
    }

    #[test]
    fn test_raw_array_of_strings() {
        let got = accept(Batch::from(json!(["x", "y"])), 5).unwrap();
        assert_eq!(got, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_raw_non_array() {
        let err = accept(Batch::from(json!({"id": "x"})), 5).unwrap_err();
        assert!(matches!(err, PollError::NotASequence { found: "object" }));
        let err = accept(Batch::from(Value::Null), 5).unwrap_err();
        assert!(matches!(err, PollError::NotASequence { found: "null" }));
    }

    #[test]
    fn test_raw_non_string_member() {
        let err = accept(Batch::from(json!(["ok", 7, "also-ok"])), 5).unwrap_err();
        assert!(matches!(err, PollError::NonStringInstruction { index: 1 }));
    }

    #[test]
    fn test_shape_checked_before_count() {
        let err = accept(Batch::from(json!([1, 2, 3])), 1).unwrap_err();
        assert!(matches!(err, PollError::NonStringInstruction { index: 0 }));
    }
}
