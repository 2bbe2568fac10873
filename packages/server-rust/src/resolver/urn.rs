//! Resolution by payload namespace URI.

use switchyard_core::{Binding, BindingOperation, Message, PublishedService, Wsdl};

use super::value_cache::{ValueCacheResolver, ValueExtractor};
use super::wsdl_operation::{operation_values, OperationValue};
use super::Cost;
use crate::error::ResolutionError;

/// Resolver matching the namespace of the SOAP payload against the namespace
/// each WSDL operation expects.
pub type UrnResolver = ValueCacheResolver<UrnExtractor>;

/// Operation value, first non-empty of: the `soap:body` namespace, the
/// namespace of the first input part's element, the WSDL target namespace.
/// Request value: the single namespace of the top-level payload elements.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrnExtractor;

impl OperationValue for UrnExtractor {
    type Value = String;

    fn operation_value(&self, wsdl: &Wsdl, _: &Binding, op: &BindingOperation) -> Option<String> {
        let body_ns = op
            .soap_body()
            .and_then(|body| body.namespace.as_deref())
            .filter(|ns| !ns.is_empty());
        let part_ns = || {
            op.input_parts()
                .first()
                .and_then(|part| part.element_name.as_ref())
                .map(|el| el.namespace.as_str())
                .filter(|ns| !ns.is_empty())
        };
        let ns = body_ns
            .or_else(part_ns)
            .unwrap_or(wsdl.target_namespace.as_str());
        Some(ns.to_string())
    }
}

impl ValueExtractor for UrnExtractor {
    type Value = String;

    fn name(&self) -> &'static str {
        "urn"
    }

    fn service_values(&self, service: &PublishedService) -> Result<Vec<String>, ResolutionError> {
        operation_values(self, service)
    }

    fn request_value(&self, message: &Message) -> Result<Option<String>, ResolutionError> {
        let Some(soap) = message.soap() else {
            return Ok(None);
        };
        match soap.payload_namespace_uris().as_slice() {
            [] => Ok(None),
            [ns] => Ok(Some((*ns).to_string())),
            many => Err(ResolutionError::AmbiguousNamespace {
                namespaces: many.iter().map(|ns| (*ns).to_string()).collect(),
            }),
        }
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use switchyard_core::{MessagePart, OperationInput, QName};

    use super::*;
    use crate::audit::testing::RecordingSink;
    use crate::resolver::wsdl_operation::fixtures::{document_op, rpc_op, soap_request, soap_service, wsdl};
    use crate::resolver::{service_set, ResolveResult, ServiceResolver};

    fn value_of(op: &BindingOperation, target_ns: &str) -> String {
        let w = wsdl(target_ns, vec![op.clone()]);
        let (binding, op) = w.binding_operations().next().unwrap();
        UrnExtractor.operation_value(&w, binding, op).unwrap()
    }

    #[test]
    fn body_namespace_wins() {
        let op = rpc_op("op", None, Some("urn:body"));
        assert_eq!(value_of(&op, "urn:target"), "urn:body");
    }

    #[test]
    fn falls_back_to_first_part_element_namespace() {
        let op = document_op(
            "op",
            None,
            &[QName::new("urn:first", "a"), QName::new("urn:second", "b")],
        );
        assert_eq!(value_of(&op, "urn:target"), "urn:first");
    }

    #[test]
    fn falls_back_to_target_namespace() {
        let mut op = rpc_op("op", None, None);
        op.input = Some(OperationInput {
            parts: vec![MessagePart::typed("p", QName::new("urn:types", "T"))],
            body: None,
        });
        assert_eq!(value_of(&op, "urn:target"), "urn:target");
    }

    #[test]
    fn payload_namespace_selects_service() {
        let r = UrnResolver::new(UrnExtractor, Arc::new(RecordingSink::default()));
        let a = soap_service("a", "", wsdl("urn:a", vec![rpc_op("op", None, None)]));
        let b = soap_service("b", "", wsdl("urn:b", vec![rpc_op("op", None, None)]));
        r.service_created(&a).unwrap();
        r.service_created(&b).unwrap();

        let msg = soap_request("/", None, vec![QName::new("urn:b", "op")]);
        let out = r
            .resolve(&msg, &service_set([Arc::clone(&a), Arc::clone(&b)]))
            .unwrap();
        assert!(out.matches().unwrap().contains_key(&b.id));
        assert_eq!(out.matches().unwrap().len(), 1);
    }

    #[test]
    fn empty_payload_is_not_applicable() {
        let msg = soap_request("/", None, vec![QName::local("plain")]);
        assert_eq!(UrnExtractor.request_value(&msg).unwrap(), None);
        let r = UrnResolver::new(UrnExtractor, Arc::new(RecordingSink::default()));
        assert_eq!(
            r.resolve(&msg, &service_set(Vec::new())).unwrap(),
            ResolveResult::NotApplicable
        );
    }

    #[test]
    fn mixed_namespaces_are_ambiguous() {
        let msg = soap_request(
            "/",
            None,
            vec![QName::new("urn:a", "x"), QName::new("urn:b", "y")],
        );
        let err = UrnExtractor.request_value(&msg).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::AmbiguousNamespace { namespaces } if namespaces == vec!["urn:a", "urn:b"]
        ));
    }
}
