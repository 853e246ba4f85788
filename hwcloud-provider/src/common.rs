//! Error helpers shared by resource handlers

use std::fmt;

use hwcloud_core::provider::{ProviderError, ProviderResult};
use hwcloud_core::schema::{AttributeSchema, AttributeType};
use hwcloud_sdk::SdkError;
use log::warn;

use crate::resource_data::ResourceData;

/// Handle an API error on read or delete.
///
/// A 404 clears the ID so the resource is dropped from state; any other
/// error is returned with `message` as its context.
pub fn check_deleted(d: &mut ResourceData, err: SdkError, message: &str) -> ProviderResult<()> {
    if err.is_not_found() {
        warn!("Removing resource {} from state, it is already gone", d.id());
        d.set_id("");
        return Ok(());
    }
    Err(ProviderError::new(message).with_cause(err))
}

/// Split an import ID of the form `{parent_id}/{id}`
pub fn parse_composite_id(import_id: &str, parent: &str) -> ProviderResult<(String, String)> {
    match import_id.split_once('/') {
        Some((p, id)) if !p.is_empty() && !id.is_empty() && !id.contains('/') => {
            Ok((p.to_string(), id.to_string()))
        }
        _ => Err(ProviderError::new(format!(
            "Invalid format specified for import ID, want '{{{}}}/{{id}}', but got '{}'",
            parent, import_id
        ))),
    }
}

/// Map of string tags, as every taggable resource declares it
pub fn tags_schema() -> AttributeSchema {
    AttributeSchema::new("tags", AttributeType::Map(Box::new(AttributeType::String)))
}

/// Region a resource lives in; defaults to the provider region
pub fn region_schema() -> AttributeSchema {
    AttributeSchema::new("region", AttributeType::String)
        .computed()
        .force_new()
}

/// Errors collected while setting many attributes, reported together
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<String>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: impl fmt::Display) {
        self.errors.push(err.to_string());
    }

    /// Record the error of `result`, if any
    pub fn check<E: fmt::Display>(&mut self, result: Result<(), E>) {
        if let Err(e) = result {
            self.push(e);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok` when nothing was collected, else a single error headed by `context`
    pub fn into_result(self, context: &str) -> ProviderResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ProviderError::new(format!("{}: {}", context, self)))
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            1 => write!(f, "1 error occurred:\n\t* {}\n", self.errors[0]),
            n => {
                write!(f, "{} errors occurred:", n)?;
                for e in &self.errors {
                    write!(f, "\n\t* {}", e)?;
                }
                writeln!(f)
            }
        }
    }
}

impl std::error::Error for MultiError {}
