//! Resolution by payload signature: the ordered top-level element names a
//! request carries, compared with the names each WSDL operation implies.
//!
//! - **rpc** style: one element, the operation name qualified by the
//!   `soap:body` namespace (or the target namespace).
//! - **document** style: one element per input part, taken from the part's
//!   element reference.
//!
//! Operations this cannot interpret are skipped with a warning rather than
//! failing the whole service.

use switchyard_core::{
    Binding, BindingOperation, BindingStyle, Message, PublishedService, QName, Wsdl,
};

use super::value_cache::{ValueCacheResolver, ValueExtractor};
use super::wsdl_operation::{operation_values, OperationValue};
use super::Cost;
use crate::error::ResolutionError;

/// Resolver matching the payload signature against every operation of each
/// service. Used for the strict operation check once a single SOAP service
/// remains.
pub type SoapOperationResolver = ValueCacheResolver<OperationSignatureExtractor>;

#[derive(Debug, Default, Clone, Copy)]
pub struct OperationSignatureExtractor;

impl OperationSignatureExtractor {
    fn document_signature(op: &BindingOperation) -> Option<Vec<QName>> {
        let mut signature = Vec::with_capacity(op.input_parts().len());
        for part in op.input_parts() {
            match (&part.type_name, &part.element_name) {
                (None, Some(element)) => signature.push(element.clone()),
                (Some(_), Some(_)) => {
                    tracing::warn!(
                        operation = %op.name,
                        part = %part.name,
                        "WSDL part declares both a type and an element; skipping operation"
                    );
                    return None;
                }
                (_, None) => {
                    tracing::warn!(
                        operation = %op.name,
                        part = %part.name,
                        "document-style part has no element reference; skipping operation"
                    );
                    return None;
                }
            }
        }
        Some(signature)
    }
}

impl OperationValue for OperationSignatureExtractor {
    type Value = Vec<QName>;

    fn operation_value(
        &self,
        wsdl: &Wsdl,
        binding: &Binding,
        op: &BindingOperation,
    ) -> Option<Vec<QName>> {
        if !op.kind.is_inbound() {
            tracing::debug!(operation = %op.name, kind = ?op.kind, "skipping outbound operation");
            return None;
        }
        let Some(style) = op.effective_style(binding) else {
            tracing::warn!(
                operation = %op.name,
                binding = %binding.name,
                "cannot determine WSDL style; skipping operation"
            );
            return None;
        };
        match style {
            BindingStyle::Rpc => {
                let ns = op
                    .soap_body()
                    .and_then(|body| body.namespace.as_deref())
                    .filter(|ns| !ns.is_empty())
                    .unwrap_or(wsdl.target_namespace.as_str());
                Some(vec![QName::new(ns, op.name.as_str())])
            }
            BindingStyle::Document => Self::document_signature(op),
        }
    }
}

impl ValueExtractor for OperationSignatureExtractor {
    type Value = Vec<QName>;

    fn name(&self) -> &'static str {
        "soap_operation"
    }

    fn service_values(
        &self,
        service: &PublishedService,
    ) -> Result<Vec<Vec<QName>>, ResolutionError> {
        operation_values(self, service)
    }

    fn request_value(&self, message: &Message) -> Result<Option<Vec<QName>>, ResolutionError> {
        Ok(message
            .soap()
            .map(|soap| soap.payload_element_names().to_vec()))
    }

    fn is_soap(&self) -> bool {
        true
    }

    fn uses_message_content(&self) -> bool {
        true
    }

    fn cost(&self) -> Cost {
        Cost::Slow
    }
}
