//! Replay walk.
//!
//! Rebuilds the session context from the full token sequence on every
//! request. Rejected tokens stay in the gateway's accumulated text, so
//! every token is re-classified with the same pure validators; given the
//! same text, date and geography data, the walk always lands on the same
//! node with the same bindings.

use chrono::NaiveDate;
use tracing::debug;

use ussd_core::types::Language;

use crate::context::SessionContext;
use crate::error::FlowError;
use crate::graph::{MenuNode, NavigationGraph, NodeId, NodeKind, TerminalAction};
use crate::services::GeographyService;
use crate::validation::{self, Rejection, ValidationResult, Validator};

/// Where a walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    /// The context node is waiting for the next token.
    AwaitingInput,
    /// A terminal node was reached; trailing tokens were ignored.
    Terminal(TerminalAction),
    /// The attempt threshold was exceeded at the context node.
    TooManyAttempts,
}

#[derive(Debug, Clone)]
pub struct Walk {
    pub ctx: SessionContext,
    pub state: WalkState,
}

enum Step {
    Advance(NodeId),
    Reject(Rejection),
}

/// Walks a token sequence over a navigation graph.
pub struct Walker<'a> {
    pub graph: &'a NavigationGraph,
    pub validator: &'a Validator,
    pub geography: &'a dyn GeographyService,
    /// Consecutive rejections tolerated at one node.
    pub max_attempts: u32,
    pub max_menu_items: usize,
}

impl Walker<'_> {
    pub async fn walk(
        &self,
        tokens: &[&str],
        language: Language,
        today: NaiveDate,
    ) -> Result<Walk, FlowError> {
        let mut ctx = SessionContext::new(self.graph.root(), language);
        self.enter(&mut ctx, self.graph.root()).await?;
        let last = tokens.len().saturating_sub(1);

        for (i, token) in tokens.iter().enumerate() {
            if ctx.attempts >= self.max_attempts {
                return Ok(Walk {
                    ctx,
                    state: WalkState::TooManyAttempts,
                });
            }

            let node = self.node(ctx.node)?;
            let step = match &node.kind {
                NodeKind::Terminal(_) => break,
                NodeKind::FixedChoice {
                    choices,
                    case_insensitive,
                } => {
                    let keys = choices.iter().map(|c| c.key.as_str());
                    match validation::choice(token, keys, *case_insensitive) {
                        ValidationResult::Accepted(key) => {
                            match choices.iter().find(|c| c.key == key) {
                                Some(choice) => {
                                    if let Some((field, value)) = &choice.binds {
                                        ctx.bind(*field, value.clone());
                                    }
                                    Step::Advance(choice.next)
                                }
                                None => Step::Reject(Rejection::choice(key)),
                            }
                        }
                        ValidationResult::Rejected(rejection) => Step::Reject(rejection),
                    }
                }
                NodeKind::FreeText {
                    field,
                    validator,
                    next,
                } => match self.validator.validate(*validator, token, today) {
                    ValidationResult::Accepted(value) => {
                        ctx.bind(*field, value);
                        Step::Advance(*next)
                    }
                    ValidationResult::Rejected(rejection) => Step::Reject(rejection),
                },
                NodeKind::Geography { level, next } => {
                    if ctx.options.is_empty() {
                        if *token == "0" {
                            Step::Advance(*next)
                        } else {
                            Step::Reject(Rejection::choice(format!("no {} to pick", level)))
                        }
                    } else {
                        let picked = token
                            .parse::<usize>()
                            .ok()
                            .filter(|n| (1..=ctx.options.len()).contains(n))
                            .map(|n| ctx.options[n - 1].clone());
                        match picked {
                            Some(unit) => {
                                ctx.bind(level.field(), unit.name.clone());
                                ctx.location.push(unit);
                                Step::Advance(*next)
                            }
                            None => Step::Reject(Rejection::choice(format!(
                                "no {} numbered '{}'",
                                level, token
                            ))),
                        }
                    }
                }
            };

            match step {
                Step::Advance(next) => {
                    ctx.consumed.push(token.to_string());
                    ctx.attempts = 0;
                    ctx.rejection = None;
                    self.enter(&mut ctx, next).await?;
                }
                Step::Reject(rejection) => {
                    ctx.attempts += 1;
                    debug!(
                        node = ctx.node,
                        attempts = ctx.attempts,
                        reason = rejection.reason.code(),
                        detail = %rejection.detail,
                        "Token rejected"
                    );
                    ctx.rejection = (i == last).then_some(rejection);
                }
            }
        }

        let state = match self.node(ctx.node)?.kind {
            NodeKind::Terminal(action) => WalkState::Terminal(action),
            _ => WalkState::AwaitingInput,
        };
        Ok(Walk { ctx, state })
    }

    /// Move to `id`, loading options when it is a geography node.
    async fn enter(&self, ctx: &mut SessionContext, id: NodeId) -> Result<(), FlowError> {
        ctx.node = id;
        ctx.options.clear();
        if let NodeKind::Geography { level, .. } = self.node(id)?.kind {
            let parent = match level.parent() {
                None => None,
                Some(parent_level) => match ctx.location.iter().find(|u| u.level == parent_level) {
                    Some(unit) => Some(unit.id),
                    // Parent level was skipped; nothing to offer.
                    None => return Ok(()),
                },
            };
            let mut units = self.geography.children(level, parent).await?;
            units.truncate(self.max_menu_items);
            ctx.options = units;
        }
        Ok(())
    }

    fn node(&self, id: &str) -> Result<&MenuNode, FlowError> {
        self.graph
            .node(id)
            .ok_or_else(|| FlowError::UpstreamUnavailable(format!("navigation graph has no node {}", id)))
    }
}
