// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde_json::Value;

use super::{ClearContext, ClearStrategy, ReadContext, ReadStrategy, ReadValue, UpdateContext, UpdateStrategy};
use crate::Error;

/// Always runs the method. Never reads or writes the store.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpReadStrategy;

impl ReadStrategy for NoOpReadStrategy {
    async fn handle(&self, context: &ReadContext) -> Result<ReadValue, Error> {
        context.invoke().await
    }
}

/// Never clears anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpClearStrategy;

impl ClearStrategy for NoOpClearStrategy {
    async fn handle(&self, _context: &ClearContext) -> Result<(), Error> {
        Ok(())
    }
}

/// Hands the result back without writing it.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpUpdateStrategy;

impl UpdateStrategy for NoOpUpdateStrategy {
    async fn handle(&self, context: &UpdateContext) -> Result<Value, Error> {
        Ok(context.result().clone())
    }
}
