//! Resolution by the `SOAPAction` HTTP header.

use switchyard_core::{Binding, BindingOperation, Message, PublishedService, Wsdl};

use super::value_cache::{ValueCacheResolver, ValueExtractor};
use super::wsdl_operation::{operation_values, OperationValue};
use super::Cost;
use crate::error::ResolutionError;

pub const SOAP_ACTION_HEADER: &str = "SOAPAction";

/// Resolver matching the `SOAPAction` header against the SOAP actions
/// declared by each WSDL operation.
pub type SoapActionResolver = ValueCacheResolver<SoapActionExtractor>;

/// Operation value: the declared SOAP action, empty when none is declared.
/// Request value: the `SOAPAction` header without surrounding quotes, empty
/// when the header is absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct SoapActionExtractor;

impl OperationValue for SoapActionExtractor {
    type Value = String;

    fn operation_value(&self, _: &Wsdl, _: &Binding, op: &BindingOperation) -> Option<String> {
        Some(op.soap_action.clone().unwrap_or_default())
    }
}

impl ValueExtractor for SoapActionExtractor {
    type Value = String;

    fn name(&self) -> &'static str {
        "soap_action"
    }

    fn service_values(&self, service: &PublishedService) -> Result<Vec<String>, ResolutionError> {
        operation_values(self, service)
    }

    fn request_value(&self, message: &Message) -> Result<Option<String>, ResolutionError> {
        let (Some(http), Some(_)) = (message.http(), message.soap()) else {
            return Ok(None);
        };
        let header = http.header(SOAP_ACTION_HEADER)?.unwrap_or_default();
        Ok(Some(strip_quotes(header).to_string()))
    }

    fn is_soap(&self) -> bool {
        true
    }

    fn uses_message_content(&self) -> bool {
        false
    }

    fn cost(&self) -> Cost {
        Cost::Fast
    }
}

fn strip_quotes(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(trimmed)
}
