//! Execution of single body instructions.

use crate::action::ActionContext;
use crate::error::InstructionError;
use crate::plan::{IncrementOperator, Instruction, Selection, Trigger};
use crate::term::{Literal, Term};
use crate::unify::{unify, Substitution};

use super::Agent;

/// What the frame does after an instruction.
pub(super) enum Step {
    /// Move on; carries the instruction's truth degree.
    Continue(f64),
    /// Wait for a child frame.
    Suspend {
        /// The goal in the parent's variables.
        goal: Literal,
        trigger: Trigger,
        selection: Selection,
    },
}

impl Agent {
    pub(super) fn execute(
        &mut self,
        instruction: &Instruction,
        bindings: &mut Substitution,
    ) -> Result<Step, InstructionError> {
        match instruction {
            Instruction::AddBelief(pattern) => {
                let literal = ground(bindings.apply_literal(pattern))?;
                self.beliefs.add(literal).map_err(rejected)?;
                Ok(Step::Continue(1.0))
            }
            Instruction::RemoveBelief(pattern) => {
                let pattern = bindings.apply_literal(pattern);
                let found = self
                    .beliefs
                    .unify_query(&pattern, bindings)
                    .next()
                    .map(|(literal, s)| (literal.clone(), s));
                // removing an absent belief is not a failure
                if let Some((literal, extended)) = found {
                    self.beliefs.remove(&literal);
                    *bindings = extended;
                }
                Ok(Step::Continue(1.0))
            }
            Instruction::UpdateBelief { old, new } => {
                let pattern = bindings.apply_literal(old);
                let found = self
                    .beliefs
                    .unify_query(&pattern, bindings)
                    .next()
                    .map(|(literal, s)| (literal.clone(), s));
                match found {
                    Some((previous, extended)) => {
                        let replacement = ground(extended.apply_literal(new))?;
                        self.beliefs.update(&previous, replacement).map_err(rejected)?;
                        *bindings = extended;
                    }
                    None => {
                        let replacement = ground(bindings.apply_literal(new))?;
                        self.beliefs.add(replacement).map_err(rejected)?;
                    }
                }
                Ok(Step::Continue(1.0))
            }
            Instruction::Achieve(pattern) => {
                let goal = bindings.apply_literal(pattern);
                let trigger = Trigger::add_goal(self.freshen(goal.clone()));
                let selection = self
                    .select(&trigger)
                    .ok_or_else(|| InstructionError::NoApplicablePlan {
                        trigger: trigger.to_string(),
                    })?;
                Ok(Step::Suspend {
                    goal,
                    trigger,
                    selection,
                })
            }
            Instruction::Post(posted) => {
                let literal = bindings.apply_literal(&posted.literal);
                let literal = if posted.kind.is_goal() {
                    literal
                } else {
                    ground(literal)?
                };
                let literal = self.freshen(literal);
                self.enqueue(Trigger::new(posted.kind, literal));
                Ok(Step::Continue(1.0))
            }
            Instruction::TestGoal(pattern) => {
                let pattern = bindings.apply_literal(pattern);
                let found = self
                    .beliefs
                    .unify_query(&pattern, bindings)
                    .next()
                    .map(|(_, s)| s);
                if let Some(extended) = found {
                    *bindings = extended;
                    return Ok(Step::Continue(1.0));
                }
                let trigger = Trigger::test_goal(self.freshen(pattern.clone()));
                match self.select(&trigger) {
                    Some(selection) => Ok(Step::Suspend {
                        goal: pattern,
                        trigger,
                        selection,
                    }),
                    None => Err(InstructionError::UnificationFailed {
                        context: format!("?{pattern}"),
                    }),
                }
            }
            Instruction::Assign {
                variable,
                expression,
            } => {
                let value = expression.evaluate(bindings, &self.beliefs)?;
                bindings.assign(variable, value.into_term());
                Ok(Step::Continue(1.0))
            }
            Instruction::Unary { variable, operator } => {
                let current = number_of(bindings, variable)?;
                let next = match operator {
                    IncrementOperator::Increment => current + 1.0,
                    IncrementOperator::Decrement => current - 1.0,
                };
                bindings.assign(variable, Term::number(next));
                Ok(Step::Continue(1.0))
            }
            Instruction::Test(expression) => {
                let truth = expression.evaluate(bindings, &self.beliefs)?.truth()?;
                if truth < self.config.success_threshold {
                    return Err(InstructionError::TestFailed {
                        expression: expression.to_string(),
                        degree: truth,
                    });
                }
                Ok(Step::Continue(truth))
            }
            Instruction::Action {
                name,
                arguments,
                returns,
                parallel,
                annotations,
            } => self.call_action(name, arguments, returns, *parallel, annotations, bindings),
        }
    }

    fn call_action(
        &mut self,
        name: &str,
        arguments: &[Term],
        returns: &[String],
        parallel: bool,
        annotations: &[Literal],
        bindings: &mut Substitution,
    ) -> Result<Step, InstructionError> {
        let action = self
            .actions
            .get(name)
            .ok_or_else(|| InstructionError::UnknownAction {
                name: name.to_string(),
            })?;
        let arguments: Vec<Term> = arguments.iter().map(|t| bindings.apply(t)).collect();
        if arguments.len() < action.minimal_arguments() {
            return Err(InstructionError::ArgumentCount {
                name: name.to_string(),
                minimum: action.minimal_arguments(),
                actual: arguments.len(),
            });
        }
        let annotations: Vec<Literal> = annotations.iter().map(|a| bindings.apply_literal(a)).collect();

        let mut results = Vec::new();
        let outcome = {
            let mut context = ActionContext {
                agent: self.id,
                beliefs: &mut self.beliefs,
                bindings,
            };
            action.execute(&mut context, parallel, &arguments, &mut results, &annotations)?
        };
        if !outcome.is_success(self.config.success_threshold) {
            return Err(InstructionError::ActionFailed {
                name: name.to_string(),
                reason: format!("truth {:.3} below threshold", outcome.truth()),
            });
        }

        for (variable, value) in returns.iter().zip(results) {
            *bindings = unify(&Term::var(variable.as_str()), &value, bindings).map_err(|_| {
                InstructionError::UnificationFailed {
                    context: format!("{variable} with {value}"),
                }
            })?;
        }
        Ok(Step::Continue(outcome.truth()))
    }
}

fn number_of(bindings: &Substitution, variable: &str) -> Result<f64, InstructionError> {
    match bindings.value(variable) {
        None | Some(Term::Variable(_)) => Err(InstructionError::UnboundVariable {
            name: variable.to_string(),
        }),
        Some(Term::Number(n)) => Ok(n),
        Some(other) => Err(InstructionError::TypeMismatch {
            expected: "number",
            found: other.to_string(),
        }),
    }
}

fn ground(literal: Literal) -> Result<Literal, InstructionError> {
    if literal.is_ground() {
        Ok(literal)
    } else {
        Err(InstructionError::NonGround {
            literal: literal.to_string(),
        })
    }
}

fn rejected(error: crate::error::EngineError) -> InstructionError {
    InstructionError::TypeMismatch {
        expected: "belief literal",
        found: error.to_string(),
    }
}
