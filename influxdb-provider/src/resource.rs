//! Host-facing lifecycle wrapper around a reconciler.
//!
//! [`Resource`] is what the plugin runtime talks to. It checks the declared
//! document, hands the shared connection context to the reconciler and turns
//! every outcome into a state plus diagnostics. Stored state only changes
//! when the remote call and the response decoding both succeeded.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use crate::context::ConnectionContext;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{ProviderError, Result};
use crate::plan;
use crate::reconciler::{Operation, ReadOutcome, Reconciler};
use crate::schema::Schema;

/// Name prefix shared by every resource type of this provider.
pub const TYPE_PREFIX: &str = "influxdb_";

/// State to store after a call, and what happened along the way.
///
/// `state: None` means the resource is not (or no longer) stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResponse<S> {
    pub state: Option<S>,
    pub diagnostics: Diagnostics,
}

impl<S> CallResponse<S> {
    fn new(state: Option<S>, diagnostics: Diagnostics) -> Self {
        Self { state, diagnostics }
    }

    pub fn has_error(&self) -> bool {
        self.diagnostics.has_error()
    }

    pub fn map<T>(self, f: impl FnOnce(S) -> T) -> CallResponse<T> {
        CallResponse {
            state: self.state.map(f),
            diagnostics: self.diagnostics,
        }
    }
}

/// A resource type bound to an optional connection context.
pub struct Resource<R: Reconciler> {
    reconciler: R,
    context: Option<Arc<ConnectionContext>>,
}

impl<R: Reconciler + Default> Default for Resource<R> {
    fn default() -> Self {
        Self::new(R::default())
    }
}

impl<R: Reconciler> Resource<R> {
    pub fn new(reconciler: R) -> Self {
        Self {
            reconciler,
            context: None,
        }
    }

    /// Full type name, e.g. `influxdb_bucket`.
    pub fn type_name(&self) -> String {
        format!("{TYPE_PREFIX}{}", R::TYPE_SUFFIX)
    }

    pub fn schema(&self) -> Schema {
        self.reconciler.schema()
    }

    /// Attach the shared connection context. `None` is ignored so that an
    /// early configure call before the provider is ready does no harm.
    pub fn configure(&mut self, context: Option<Arc<ConnectionContext>>) {
        if let Some(context) = context {
            self.context = Some(context);
        }
    }

    pub fn is_configured(&self) -> bool {
        self.context.is_some()
    }

    fn context(&self) -> Result<&ConnectionContext> {
        self.context.as_deref().ok_or(ProviderError::Unconfigured)
    }

    /// Schema checks followed by the reconciler's own invariants.
    pub fn validate(&self, desired: &R::State) -> Result<()> {
        let document = serde_json::to_value(desired)?;
        self.schema().validate(&document)?;
        self.reconciler.validate(desired)
    }

    /// Merge the declared document with stored state using the schema's plan
    /// modifiers.
    pub fn plan_state(&self, desired: &R::State, stored: Option<&R::State>) -> Result<R::State> {
        let config = serde_json::to_value(desired)?;
        let prior = stored.map(serde_json::to_value).transpose()?;
        let planned = plan::apply(&self.schema(), config, prior.as_ref());
        Ok(serde_json::from_value(planned)?)
    }

    /// Planned state for the host to diff against stored state.
    pub fn plan(&self, desired: &R::State, stored: Option<&R::State>) -> CallResponse<R::State> {
        let mut diagnostics = Diagnostics::new();
        let planned = self
            .plan_state(desired, stored)
            .and_then(|planned| self.validate(&planned).map(|()| planned));
        match planned {
            Ok(planned) => CallResponse::new(Some(planned), diagnostics),
            Err(err) => {
                diagnostics.push(Diagnostic::from_error(Operation::Plan, &err));
                CallResponse::new(stored.cloned(), diagnostics)
            }
        }
    }

    pub async fn create(&self, desired: &R::State) -> CallResponse<R::State> {
        let mut diagnostics = Diagnostics::new();
        diagnostics.extend(self.reconciler.warnings(Operation::Create, desired));

        let result = match self.context() {
            Ok(ctx) => match self.validate(desired) {
                Ok(()) => self.reconciler.create(ctx, desired).await,
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        };

        match result {
            Ok(state) => CallResponse::new(Some(state), diagnostics),
            Err(err) => {
                self.report(Operation::Create, &err, &mut diagnostics);
                CallResponse::new(None, diagnostics)
            }
        }
    }

    pub async fn read(&self, stored: &R::State) -> CallResponse<R::State> {
        let mut diagnostics = Diagnostics::new();
        let result = match self.context() {
            Ok(ctx) => self.reconciler.read(ctx, stored).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(ReadOutcome::Found(state)) => CallResponse::new(Some(state), diagnostics),
            Ok(ReadOutcome::Gone) => {
                diagnostics.add_warning(
                    format!("{} - Resource Not Found", Operation::Read),
                    format!("{} no longer exists, removing from state", self.type_name()),
                );
                CallResponse::new(None, diagnostics)
            }
            Err(err) => {
                self.report(Operation::Read, &err, &mut diagnostics);
                CallResponse::new(Some(stored.clone()), diagnostics)
            }
        }
    }

    /// Plan `desired` against `stored`, then push the result.
    pub async fn update(&self, desired: &R::State, stored: &R::State) -> CallResponse<R::State> {
        let mut diagnostics = Diagnostics::new();
        let result = match self.context() {
            Ok(ctx) => match self.plan_state(desired, Some(stored)) {
                Ok(planned) => {
                    diagnostics.extend(self.reconciler.warnings(Operation::Update, &planned));
                    match self.validate(&planned) {
                        Ok(()) => self.reconciler.update(ctx, &planned, stored).await,
                        Err(err) => Err(err),
                    }
                }
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        };

        match result {
            Ok(state) => CallResponse::new(Some(state), diagnostics),
            Err(err) => {
                self.report(Operation::Update, &err, &mut diagnostics);
                CallResponse::new(Some(stored.clone()), diagnostics)
            }
        }
    }

    pub async fn delete(&self, stored: &R::State) -> CallResponse<R::State> {
        let mut diagnostics = Diagnostics::new();
        let result = match self.context() {
            Ok(ctx) => self.reconciler.delete(ctx, stored).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => CallResponse::new(None, diagnostics),
            Err(err) => {
                self.report(Operation::Delete, &err, &mut diagnostics);
                CallResponse::new(Some(stored.clone()), diagnostics)
            }
        }
    }

    /// Seed state from an existing remote ID. Needs no connection.
    pub fn import(&self, id: &str) -> CallResponse<R::State> {
        let mut diagnostics = Diagnostics::new();
        if id.trim().is_empty() {
            let err = ProviderError::validation("import requires a non-empty ID");
            diagnostics.push(Diagnostic::from_error(Operation::Import, &err));
            return CallResponse::new(None, diagnostics);
        }
        debug!(resource = %self.type_name(), id, "importing");
        CallResponse::new(Some(self.reconciler.import(id)), diagnostics)
    }

    fn report(&self, operation: Operation, err: &ProviderError, diagnostics: &mut Diagnostics) {
        error!(resource = %self.type_name(), %operation, error = %err, "operation failed");
        diagnostics.push(Diagnostic::from_error(operation, err));
    }
}

/// Deserialize a host document into `R`'s state.
pub fn decode_state<R: Reconciler>(document: Value) -> Result<R::State> {
    Ok(serde_json::from_value(document)?)
}
